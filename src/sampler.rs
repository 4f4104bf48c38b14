//! Round-robin channel sampling.

use std::error;
use std::fmt;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::adc;
use crate::adc::{Mcp3008, SpiBus};
use crate::delay;
use crate::output;
use crate::output::RecordSink;

type Result<T> = std::result::Result<T, SamplingError>;

/// Errors that end a sampling session.
#[derive(Debug)]
pub enum SamplingError {
    /// The bus exchange with the converter failed.
    Bus(adc::Error),
    /// Persisting a record failed.
    Sink(output::Error),
}

impl error::Error for SamplingError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            SamplingError::Bus(ref e) => Some(e),
            SamplingError::Sink(ref e) => Some(e),
        }
    }
}

impl Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SamplingError::Bus(ref e) => write!(f, "converter exchange failed: {}", e),
            SamplingError::Sink(ref e) => write!(f, "record persistence failed: {}", e),
        }
    }
}

/// Walks channel indices in a cycle.
#[derive(Copy, Clone, Debug)]
pub struct Sequencer {
    current: u8,
    count: u8,
}

impl Sequencer {
    /// Create a sequencer cycling through `count` channels.
    ///
    /// `count` must be at least 1.
    pub fn new(count: u8) -> Sequencer {
        Sequencer { current: 0, count }
    }

    /// Channel the next sample should come from; always below the count.
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Step to the next channel, wrapping after the last one.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.count;
    }
}

/// Whether a sampler is still collecting.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum State {
    Running,
    Stopped,
}

/// Round-robin sampler tying the converter to a record sink.
///
/// Owns the sequencer and the per-channel buffer of latest values; both
/// live as long as the session.
#[derive(Debug)]
pub struct Sampler<B> {
    adc: Mcp3008<B>,
    sequencer: Sequencer,
    latest: Vec<u16>,
    settle_time: Duration,
    state: State,
}

impl<B: SpiBus> Sampler<B> {
    /// Create a sampler cycling through the first `channels` inputs,
    /// holding `settle_time` between samples.
    pub fn new(adc: Mcp3008<B>, channels: u8, settle_time: Duration) -> Sampler<B> {
        Sampler {
            adc,
            sequencer: Sequencer::new(channels),
            latest: vec![0; channels as usize],
            settle_time,
            state: State::Running,
        }
    }

    /// Most recent value observed for each sampled channel.
    pub fn latest(&self) -> &[u16] {
        &self.latest
    }

    /// Sample continuously until `stop` is raised or `cycle_limit` runs
    /// out.
    ///
    /// Each cycle reads the sequencer's channel, stores the decoded value,
    /// holds for the settling time, hands the formatted record to `sink`,
    /// and advances to the next channel. A rejected channel index skips the
    /// store and the record but still advances. Bus and sink failures end
    /// the session.
    pub fn run<S>(
        &mut self,
        sink: &mut S,
        stop: &AtomicBool,
        cycle_limit: Option<u64>,
    ) -> Result<()>
    where
        S: RecordSink,
    {
        println!("sampling: started");

        let mut cycles = 0u64;
        while self.state == State::Running {
            if stop.load(Ordering::Relaxed) {
                self.state = State::Stopped;
                break;
            }
            if let Some(limit) = cycle_limit {
                if cycles >= limit {
                    self.state = State::Stopped;
                    break;
                }
            }

            if let Err(e) = self.cycle(sink) {
                self.state = State::Stopped;
                println!("sampling: stopped by error after {} cycles", cycles);
                return Err(e);
            }
            cycles += 1;
        }

        println!("sampling: stopped after {} cycles", cycles);
        Ok(())
    }

    /// One pass of the sampling protocol.
    fn cycle<S: RecordSink>(&mut self, sink: &mut S) -> Result<()> {
        let channel = self.sequencer.current();
        match self.adc.read(channel) {
            Ok(value) => {
                self.latest[channel as usize] = value;
                delay::settle(self.settle_time);
                let record = format!("A{}: {}", channel, value);
                sink.append(&record).map_err(SamplingError::Sink)?;
            },
            // A channel the converter does not have cannot produce data;
            // skip the record but keep the cadence.
            Err(adc::Error::InvalidChannel(_)) => (),
            Err(e) => return Err(SamplingError::Bus(e)),
        }
        self.sequencer.advance();

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use crate::adc::ConversionMode;
    use crate::adc::tests::MockBus;
    use crate::output::tests::VecSink;

    fn sampler_over(reply: [u8; 3], channels: u8) -> Sampler<MockBus> {
        let adc = Mcp3008::new(MockBus::replying(reply), ConversionMode::SingleEnded);
        Sampler::new(adc, channels, Duration::from_micros(1))
    }

    #[test]
    pub fn sequencer_cycles_with_exact_period() {
        let mut sequencer = Sequencer::new(6);
        let observed: Vec<u8> = (0..13)
            .map(|_| {
                let channel = sequencer.current();
                sequencer.advance();
                channel
            })
            .collect();

        assert_eq!(observed, vec![0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    pub fn run_persists_one_record_per_cycle() {
        let mut sampler = sampler_over([0x00, 0x02, 0x34], 3);
        let collector = VecSink::new();
        let mut sink = collector.clone();
        let stop = AtomicBool::new(false);

        sampler.run(&mut sink, &stop, Some(7)).unwrap();

        let expected: Vec<String> = [0, 1, 2, 0, 1, 2, 0]
            .iter()
            .map(|channel| format!("A{}: 564", channel))
            .collect();
        assert_eq!(collector.records(), expected);
    }

    #[test]
    pub fn run_updates_the_latest_buffer() {
        let mut sampler = sampler_over([0x00, 0x03, 0xFF], 2);
        let mut sink = VecSink::new();
        let stop = AtomicBool::new(false);

        sampler.run(&mut sink, &stop, Some(2)).unwrap();

        assert_eq!(sampler.latest(), &[1023, 1023]);
    }

    #[test]
    pub fn stop_flag_halts_the_loop() {
        let mut sampler = sampler_over([0; 3], 2);
        let mut sink = VecSink::new();
        let stop = AtomicBool::new(true);

        sampler.run(&mut sink, &stop, None).unwrap();

        assert_eq!(sampler.state, State::Stopped);
        assert_eq!(sink.records().len(), 0);
    }

    #[test]
    pub fn out_of_range_channel_skips_the_record_but_advances() {
        // Nine channels in the cycle, but the converter only has eight.
        let mut sampler = sampler_over([0x00, 0x02, 0x34], 9);
        let collector = VecSink::new();
        let mut sink = collector.clone();
        let stop = AtomicBool::new(false);

        sampler.run(&mut sink, &stop, Some(9)).unwrap();

        let records = collector.records();
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|record| !record.starts_with("A8")));
    }
}
