//! Persistence for sampled records.
//!
//! The sampling loop hands each formatted record to a [`RecordSink`].
//! [`FileSink`] appends records as lines of a log file; [`ThreadedSink`]
//! moves the appends onto a dedicated writer thread so storage latency
//! stays out of the sampling cadence.

use std::error;
use std::fmt;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::thread::JoinHandle;

type Result<T> = std::result::Result<T, Error>;

/// Records the writer queue holds before the sampler blocks on it.
const QUEUE_DEPTH: usize = 64;

/// Persistence errors.
#[derive(Debug)]
pub enum Error {
    /// Writing to the destination failed.
    Io(io::Error),
    /// The writer thread is no longer accepting records.
    Disconnected,
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(ref e) => write!(f, "failed to write record: {}", e),
            Error::Disconnected => write!(f, "record writer is gone"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

/// Destination for formatted sample records.
pub trait RecordSink {
    /// Persist a single record.
    fn append(&mut self, record: &str) -> Result<()>;
}

/// Sink appending records as lines of a log file.
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Open (or create) the log at `path` for appending.
    pub fn open(path: &Path) -> Result<FileSink> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(FileSink { file })
    }
}

impl RecordSink for FileSink {
    fn append(&mut self, record: &str) -> Result<()> {
        self.file.write_all(record.as_bytes())?;
        self.file.write_all(b"\n")?;

        Ok(())
    }
}

/// Sink handing records to a dedicated writer thread.
///
/// Records travel over a bounded queue; `append` only blocks once the
/// writer falls `QUEUE_DEPTH` records behind.
#[derive(Debug)]
pub struct ThreadedSink {
    schannel: SyncSender<String>,
    writer: JoinHandle<Result<()>>,
}

impl ThreadedSink {
    /// Spawn the writer thread draining records into `sink`.
    pub fn spawn<S>(mut sink: S) -> ThreadedSink
    where
        S: RecordSink + Send + 'static,
    {
        let (schannel, rchannel) = mpsc::sync_channel::<String>(QUEUE_DEPTH);
        let writer = thread::Builder::new()
            .name("record-writer".to_string())
            .spawn(move || {
                while let Ok(record) = rchannel.recv() {
                    sink.append(&record)?;
                }

                Ok(())
            })
            .expect("Could not spawn record writer thread.");

        ThreadedSink { schannel, writer }
    }

    /// Stop accepting records and wait for the writer to drain its queue.
    ///
    /// Returns the error that stopped the writer, if one did.
    pub fn finish(self) -> Result<()> {
        let ThreadedSink { schannel, writer } = self;
        drop(schannel);
        match writer.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Disconnected),
        }
    }
}

impl RecordSink for ThreadedSink {
    fn append(&mut self, record: &str) -> Result<()> {
        // A failed send means the writer already died; its own error
        // surfaces through finish().
        self.schannel.send(record.to_string())
            .map_err(|_| Error::Disconnected)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use std::fs;
    use std::sync::{Arc, Mutex};

    /// In-memory sink recording everything that reaches persistence.
    #[derive(Clone, Debug)]
    pub struct VecSink {
        records: Arc<Mutex<Vec<String>>>,
    }

    impl VecSink {
        pub fn new() -> VecSink {
            VecSink {
                records: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn records(&self) -> Vec<String> {
            self.records.lock().unwrap().clone()
        }
    }

    impl RecordSink for VecSink {
        fn append(&mut self, record: &str) -> Result<()> {
            self.records.lock().unwrap().push(record.to_string());

            Ok(())
        }
    }

    #[test]
    pub fn file_sink_appends_newline_terminated_records() {
        let path = std::env::temp_dir()
            .join(format!("mcp3008-sampler-test-{}.log", std::process::id()));
        let _ = fs::remove_file(&path);

        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.append("A0: 512").unwrap();
            sink.append("A1: 12").unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "A0: 512\nA1: 12\n");
        let _ = fs::remove_file(&path);
    }

    #[test]
    pub fn threaded_sink_delivers_every_queued_record() {
        let collector = VecSink::new();
        let mut sink = ThreadedSink::spawn(collector.clone());

        for n in 0..100 {
            sink.append(&format!("A0: {}", n)).unwrap();
        }
        sink.finish().unwrap();

        let records = collector.records();
        assert_eq!(records.len(), 100);
        assert_eq!(records[0], "A0: 0");
        assert_eq!(records[99], "A0: 99");
    }
}
