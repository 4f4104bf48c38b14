//! MCP3008 channel sampler.
//!
//! Cycles through the converter's analog inputs over SPI and appends each
//! decoded value to a log file as an `A<channel>: <value>` record.

use std::error::Error;
use std::process;
use std::sync::atomic::AtomicBool;

use rppal::gpio::Gpio;
use rppal::spi::{Mode, Spi};

mod adc;
mod config;
mod delay;
mod opts;
mod output;
mod sampler;

use crate::adc::Mcp3008;
use crate::config::Config;
use crate::output::{FileSink, ThreadedSink};
use crate::sampler::Sampler;

fn main() {
    let result = opts::parse();
    if let Err(ref e) = result {
        use opts::Error::*;
        match e {
            Help(msg) => println!("{}", msg),
            _ => println!("Initialization failed.\n{}", e),
        };
        process::exit(1);
    }
    let settings = result.unwrap();

    let result = match settings.config_path {
        Some(ref path) => Config::load(path),
        None => Ok(Config::default()),
    };
    if let Err(ref e) = result {
        println!("Failed to load configuration.\n{}", e);
        process::exit(1);
    }
    let mut configuration = result.unwrap();
    if let Some(path) = settings.log_path {
        configuration.log_path = path;
    }

    println!("sampler: starting up");
    if let Err(e) = run(&configuration, settings.cycle_limit) {
        report_fatal(e.as_ref());
        process::exit(1);
    }
    println!("sampler: done");
}

fn run(configuration: &Config, cycle_limit: Option<u64>) -> Result<(), Box<dyn Error>> {
    // The sampling loop never touches GPIO, but the pins must be claimable
    // before it starts.
    let _gpio = Gpio::new()?;
    println!("sampler: GPIO initialization complete");

    let spi = Spi::new(
        configuration.spi_bus()?,
        configuration.spi_slave_select()?,
        configuration.clock_hz,
        Mode::Mode0,
    )?;
    println!("sampler: SPI initialization complete ({} Hz)", configuration.clock_hz);

    let file_sink = FileSink::open(&configuration.log_path)?;
    let mut sink = ThreadedSink::spawn(file_sink);

    let adc = Mcp3008::new(spi, configuration.mode);
    let mut sampler = Sampler::new(adc, configuration.channels, configuration.settle_time());

    let stop = AtomicBool::new(false);
    let run_result = sampler.run(&mut sink, &stop, cycle_limit);
    sink.finish()?;
    run_result?;

    for (channel, value) in sampler.latest().iter().enumerate() {
        println!("sampler: A{} last read {}", channel, value);
    }

    Ok(())
}

fn report_fatal(error: &dyn Error) {
    println!("sampler: fatal: {}", error);
    let mut cause = error.source();
    while let Some(e) = cause {
        println!("  caused by: {}", e);
        cause = e.source();
    }
}
