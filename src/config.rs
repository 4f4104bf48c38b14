//! Sampling session configuration.
//!
//! Settings come from a JSON file; every field has a default matching the
//! original deployment, so an empty object (or no file at all) is a valid
//! configuration.

use std::error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rppal::spi::{Bus, SlaveSelect};
use serde::Deserialize;

use crate::adc;
use crate::adc::ConversionMode;

type Result<T> = std::result::Result<T, Error>;

/// Configuration errors.
#[derive(Debug)]
pub enum Error {
    /// Reading the configuration file failed.
    Read(io::Error),
    /// The configuration file is not valid JSON.
    Parse(serde_json::Error),
    /// SPI clock outside the converter's supported window.
    ClockRange(u32),
    /// Channel count must cover at least one and at most all inputs.
    ChannelCount(u8),
    /// Settling delay must be nonzero.
    SettleTime,
    /// The Pi has no such SPI bus.
    UnknownBus(u8),
    /// The bus has no such slave-select line.
    UnknownSlaveSelect(u8),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Read(ref e) => Some(e),
            Error::Parse(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read(ref e) =>
                write!(f, "failed to read configuration: {}", e),
            Error::Parse(ref e) =>
                write!(f, "failed to parse configuration: {}", e),
            Error::ClockRange(hz) =>
                write!(f, "SPI clock {} Hz outside the supported {}-{} Hz window",
                       hz, adc::clock::MIN_HZ, adc::clock::MAX_HZ),
            Error::ChannelCount(count) =>
                write!(f, "channel count {} not within 1-{}",
                       count, adc::CHANNEL_COUNT),
            Error::SettleTime =>
                write!(f, "settling delay must be nonzero"),
            Error::UnknownBus(bus) =>
                write!(f, "no SPI bus {}", bus),
            Error::UnknownSlaveSelect(ss) =>
                write!(f, "no slave-select line {}", ss),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Read(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Parse(e)
    }
}

/// Settings for a sampling session.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SPI bus the converter hangs off of.
    pub bus: u8,
    /// Slave-select line wired to the converter.
    pub slave_select: u8,
    /// SPI clock rate in hertz.
    pub clock_hz: u32,
    /// How the converter pairs its inputs.
    pub mode: ConversionMode,
    /// How many of the converter's inputs the loop cycles through.
    pub channels: u8,
    /// Settling time between samples, in microseconds.
    pub settle_us: u64,
    /// Where sampled records get appended.
    pub log_path: PathBuf,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bus: 0,
            slave_select: 0,
            clock_hz: adc::clock::DEFAULT_HZ,
            mode: ConversionMode::SingleEnded,
            channels: 6,
            settle_us: 20,
            log_path: PathBuf::from("/home/pi/Desktop/MCP3008.log"),
        }
    }
}

impl Config {
    /// Read and validate configuration from the JSON file at `path`.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Config::from_json(&text)
    }

    /// Parse and validate configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    /// Settling delay as a `Duration`.
    pub fn settle_time(&self) -> Duration {
        Duration::from_micros(self.settle_us)
    }

    /// The `rppal` bus for the configured bus number.
    pub fn spi_bus(&self) -> Result<Bus> {
        match self.bus {
            0 => Ok(Bus::Spi0),
            1 => Ok(Bus::Spi1),
            bus => Err(Error::UnknownBus(bus)),
        }
    }

    /// The `rppal` slave-select line for the configured number.
    pub fn spi_slave_select(&self) -> Result<SlaveSelect> {
        match self.slave_select {
            0 => Ok(SlaveSelect::Ss0),
            1 => Ok(SlaveSelect::Ss1),
            2 => Ok(SlaveSelect::Ss2),
            ss => Err(Error::UnknownSlaveSelect(ss)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.clock_hz < adc::clock::MIN_HZ || self.clock_hz > adc::clock::MAX_HZ {
            return Err(Error::ClockRange(self.clock_hz));
        }
        if self.channels < 1 || self.channels > adc::CHANNEL_COUNT {
            return Err(Error::ChannelCount(self.channels));
        }
        if self.settle_us == 0 {
            return Err(Error::SettleTime);
        }
        self.spi_bus()?;
        self.spi_slave_select()?;

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn defaults_match_the_deployment() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.clock_hz, 1_000_000);
        assert_eq!(config.channels, 6);
        assert_eq!(config.settle_us, 20);
        assert_eq!(config.mode, ConversionMode::SingleEnded);
    }

    #[test]
    pub fn fields_override_defaults() {
        let text = r#"{ "mode": "differential", "channels": 8, "clock_hz": 500000 }"#;
        let config = Config::from_json(text).unwrap();
        assert_eq!(config.mode, ConversionMode::Differential);
        assert_eq!(config.channels, 8);
        assert_eq!(config.clock_hz, 500_000);
    }

    #[test]
    pub fn clock_outside_the_window_is_rejected() {
        match Config::from_json(r#"{ "clock_hz": 100000 }"#) {
            Err(Error::ClockRange(100_000)) => (),
            other => panic!("expected the clock to be rejected, got {:?}", other),
        }
    }

    #[test]
    pub fn channel_count_is_bounded() {
        match Config::from_json(r#"{ "channels": 9 }"#) {
            Err(Error::ChannelCount(9)) => (),
            other => panic!("expected the count to be rejected, got {:?}", other),
        }
    }

    #[test]
    pub fn zero_settling_delay_is_rejected() {
        match Config::from_json(r#"{ "settle_us": 0 }"#) {
            Err(Error::SettleTime) => (),
            other => panic!("expected the delay to be rejected, got {:?}", other),
        }
    }

    #[test]
    pub fn malformed_json_is_reported() {
        match Config::from_json("{") {
            Err(Error::Parse(_)) => (),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }
}
