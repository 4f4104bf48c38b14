//! Driver for the MCP3008 analog-to-digital converter.
//!
//! The converter answers a 3-byte command frame with a 3-byte reply carrying
//! a 10-bit conversion result. One call, one full-duplex exchange; the bus
//! link is assumed reliable, so a failed transfer is surfaced rather than
//! retried.

use std::error;
use std::fmt;
use std::fmt::Display;

use rppal::spi;
use rppal::spi::Spi;
use serde::Deserialize;

type Result<T> = std::result::Result<T, Error>;

/// Number of analog inputs on the converter.
pub const CHANNEL_COUNT: u8 = 8;

/// SPI clock rates the converter supports.
pub mod clock {
    /// Slowest usable clock.
    pub const MIN_HZ: u32 = 500_000;
    /// Fastest supported clock.
    pub const MAX_HZ: u32 = 32_000_000;
    /// Clock used by the sampling deployment (Fclk = 18 * Fsample).
    pub const DEFAULT_HZ: u32 = 1_000_000;
}

/// Converter-related errors.
#[derive(Debug)]
pub enum Error {
    /// Requested channel does not exist on the converter.
    InvalidChannel(u8),
    /// The underlying SPI transfer failed.
    Bus(spi::Error),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Bus(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidChannel(channel) =>
                write!(f, "channel {} out of range (converter has 0-{})",
                       channel, CHANNEL_COUNT - 1),
            Error::Bus(ref e) => write!(f, "SPI transfer failed: {}", e),
        }
    }
}

impl From<spi::Error> for Error {
    fn from(e: spi::Error) -> Self {
        Error::Bus(e)
    }
}

/// How the converter pairs its inputs for a conversion.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// Each channel measured against ground.
    SingleEnded,
    /// Adjacent channels measured against each other.
    Differential,
}

impl ConversionMode {
    /// Selector bits merged with the channel number in the command frame.
    fn selector(&self) -> u8 {
        match self {
            ConversionMode::SingleEnded => 0x08,
            ConversionMode::Differential => 0x00,
        }
    }
}

/// Channel-read command for the converter.
#[derive(Copy, Clone, Debug)]
pub struct Command {
    mode: ConversionMode,
    channel: u8,
}

impl Command {
    /// Define a command reading `channel` in `mode`.
    ///
    /// A channel the converter does not have is rejected here, before any
    /// bus traffic.
    pub fn new(mode: ConversionMode, channel: u8) -> Result<Command> {
        if channel >= CHANNEL_COUNT {
            Err(Error::InvalidChannel(channel))
        } else {
            Ok(Command { mode, channel })
        }
    }

    /// Encode the command as the 3-byte frame the converter expects.
    ///
    /// Byte 0 carries the start bit and byte 1 the mode and channel
    /// selection in its high nibble. Byte 2 only keeps the clock running
    /// while the low result bits come back.
    pub fn frame(&self) -> [u8; 3] {
        [0x01, (self.mode.selector() + self.channel) << 4, 0x00]
    }
}

/// Raw 3-byte answer from the converter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reply([u8; 3]);

impl Reply {
    /// The 10-bit conversion result, 0-1023.
    ///
    /// The converter returns its two highest result bits in the low bits of
    /// the second reply byte and the remaining eight in the third. The
    /// first byte comes back while the command is still going out and
    /// carries nothing.
    pub fn value(&self) -> u16 {
        ((self.0[1] & 0x03) as u16) << 8 | self.0[2] as u16
    }
}

impl From<[u8; 3]> for Reply {
    fn from(bytes: [u8; 3]) -> Reply {
        Reply(bytes)
    }
}

/// Full-duplex exchange over the SPI bus.
///
/// The driver talks to hardware through this seam so tests can stand in a
/// scripted bus.
pub trait SpiBus {
    /// Clock `write` out while filling `read`; both buffers are the same
    /// length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<usize>;
}

impl SpiBus for Spi {
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<usize> {
        Spi::transfer(self, read, write).map_err(Error::Bus)
    }
}

/// Driver for a converter attached to an SPI bus.
///
/// The conversion mode is fixed for the lifetime of the driver.
#[derive(Debug)]
pub struct Mcp3008<B> {
    bus: B,
    mode: ConversionMode,
}

impl<B: SpiBus> Mcp3008<B> {
    /// Create a driver conversing over `bus`.
    pub fn new(bus: B, mode: ConversionMode) -> Mcp3008<B> {
        Mcp3008 { bus, mode }
    }

    /// Read one conversion from `channel`.
    pub fn read(&mut self, channel: u8) -> Result<u16> {
        let command = Command::new(self.mode, channel)?;
        Ok(self.transact(command)?.value())
    }

    /// Exchange `command` with the converter and return the raw reply.
    ///
    /// Performs exactly one bus transaction.
    pub fn transact(&mut self, command: Command) -> Result<Reply> {
        let frame = command.frame();
        let mut reply = [0u8; 3];
        self.bus.transfer(&mut reply, &frame)?;

        Ok(Reply::from(reply))
    }
}
