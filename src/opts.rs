//! Runtime configuration options.

use std::env;
use std::fmt;
use std::fmt::Display;
use std::path::PathBuf;

use getopts::Options;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Parsing command line failed.
    CLI(getopts::Fail),
    /// User requested to see help, not run the program.
    Help(String),
    /// User passed an invalid option value.
    Invalid(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CLI(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;
        match self {
            CLI(ref e) => write!(f, "bad command line: {}", e),
            Help(ref help_msg) => write!(f, "Program help:\n{}", help_msg),
            Invalid(ref msg) => write!(f, "invalid option value: {}", msg),
        }
    }
}

impl From<getopts::Fail> for Error {
    fn from(e: getopts::Fail) -> Error {
        Error::CLI(e)
    }
}

/// Settings gathered from the command line.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Path of the configuration file, when one was given.
    pub config_path: Option<PathBuf>,
    /// Log destination overriding the configured one.
    pub log_path: Option<PathBuf>,
    /// Stop after this many samples instead of running until interrupted.
    pub cycle_limit: Option<u64>,
}

fn create_options() -> Options {
    let mut opts = Options::new();
    opts.optopt("c", "config", "read settings from a JSON file", "FILE");
    opts.optopt("o", "log", "append records to FILE instead of the configured path", "FILE");
    opts.optopt("n", "cycles", "stop after N samples", "N");
    opts.optflag("h", "help", "show help");

    opts
}

pub fn parse() -> Result<Settings> {
    let opts = create_options();

    let cli_args: Vec<_> = env::args().collect();
    let matches = opts.parse(&cli_args[1..])?;

    if matches.opt_present("h") {
        let brief = format!("Usage: {} [ options ]", &cli_args[0]);
        return Err(Error::Help(opts.usage(&brief)));
    }

    let cycle_limit = match matches.opt_str("cycles") {
        Some(text) => {
            let count = text.parse::<u64>()
                .map_err(|_| Error::Invalid(format!("'{}' is not a cycle count", text)))?;
            Some(count)
        },
        None => None,
    };

    Ok(Settings {
        config_path: matches.opt_str("config").map(PathBuf::from),
        log_path: matches.opt_str("log").map(PathBuf::from),
        cycle_limit,
    })
}
