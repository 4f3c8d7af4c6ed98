use std::error;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::SystemTime;
use std::vec;

use tracing::{debug, warn};

use crate::decoder::{Decoder, DecoderBuilder};
use crate::error::{Error, Result};
use crate::record::Record;

/// Builds a loader that decodes many files concurrently.
///
/// ```no_run
/// #[derive(Debug, Default)]
/// struct Trade {
///     symbol: String,
///     price: f64,
/// }
///
/// dsv::impl_record!(Trade { symbol => "symbol", price => "price" });
///
/// let load = dsv::LoaderBuilder::new()
///     .has_headers(true)
///     .parallelism(4)
///     .load::<Trade, _, _>(vec!["a.csv", "b.csv"])
///     .unwrap();
/// for loaded in load.records() {
///     println!("{}:{} {:?}", loaded.path.display(), loaded.row, loaded.data);
/// }
/// for err in load.errors() {
///     eprintln!("{}", err);
/// }
/// load.wait();
/// ```
#[derive(Clone, Debug)]
pub struct LoaderBuilder {
    decoder: DecoderBuilder,
    parallelism: usize,
    capacity: usize,
}

impl Default for LoaderBuilder {
    fn default() -> LoaderBuilder {
        LoaderBuilder {
            decoder: DecoderBuilder::new(),
            parallelism: 1,
            capacity: 256,
        }
    }
}

impl LoaderBuilder {
    /// Create a new builder with a default configuration.
    pub fn new() -> LoaderBuilder {
        LoaderBuilder::default()
    }

    /// The field delimiter used for every file.
    pub fn delimiter<D: AsRef<[u8]>>(&mut self, delimiter: D) -> &mut LoaderBuilder {
        self.decoder.delimiter(delimiter);
        self
    }

    /// The newline marker used for every file.
    pub fn newline<N: AsRef<[u8]>>(&mut self, newline: N) -> &mut LoaderBuilder {
        self.decoder.newline(newline);
        self
    }

    /// The quote byte used for every file.
    pub fn quote(&mut self, quote: u8) -> &mut LoaderBuilder {
        self.decoder.quote(quote);
        self
    }

    /// Whether every file starts with a header row.
    pub fn has_headers(&mut self, yes: bool) -> &mut LoaderBuilder {
        self.decoder.has_headers(yes);
        self
    }

    /// The maximum number of files decoded at the same time.
    ///
    /// The default is `1`. Zero is treated as `1`.
    pub fn parallelism(&mut self, n: usize) -> &mut LoaderBuilder {
        self.parallelism = n;
        self
    }

    /// The number of decoded records that may wait in the records channel
    /// before the workers block.
    pub fn channel_capacity(&mut self, n: usize) -> &mut LoaderBuilder {
        self.capacity = n;
        self
    }

    /// Start loading `paths`.
    ///
    /// Files are decoded in the background. Records arrive on
    /// [`Load::records`] in file order within each file, but records of
    /// different files interleave. Problems arrive on [`Load::errors`].
    /// A record level error is reported and its file continues, while a
    /// fatal error (see [`Error::is_fatal`]) ends that file. Other files
    /// are never affected.
    ///
    /// This returns an error only when the configuration is unusable.
    pub fn load<T, I, P>(&self, paths: I) -> Result<Load<T>>
    where
        T: Record + Default + Send + 'static,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.decoder.validate()?;
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let workers = self.parallelism.max(1).min(paths.len().max(1));
        let (rec_tx, rec_rx) = mpsc::sync_channel::<Loaded<T>>(self.capacity);
        let (err_tx, err_rx) = mpsc::channel::<LoadError>();
        let queue = Arc::new(Mutex::new(paths.into_iter()));
        let decoder = self.decoder.clone();

        debug!(workers = workers, "starting loader");
        let handle = thread::spawn(move || {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                let worker = Worker {
                    decoder: decoder.clone(),
                    queue: Arc::clone(&queue),
                    records: rec_tx.clone(),
                    errors: err_tx.clone(),
                };
                handles.push(thread::spawn(move || worker.run()));
            }
            // Only the workers may hold senders, so that both channels close
            // once the last worker is done.
            drop(rec_tx);
            drop(err_tx);
            for handle in handles {
                if handle.join().is_err() {
                    warn!("loader worker panicked");
                }
            }
            debug!("loader finished");
        });
        Ok(Load { records: rec_rx, errors: err_rx, handle: handle })
    }
}

/// A record decoded by a loader, with its provenance.
#[derive(Clone, Debug)]
pub struct Loaded<T> {
    /// The file the record was read from.
    pub path: PathBuf,
    /// The row number of the record in its file, starting at `1`. A header
    /// row is not counted.
    pub row: u64,
    /// When the record was decoded.
    pub loaded_at: SystemTime,
    /// The decoded record.
    pub data: T,
}

/// An error reported by a loader, with the file it came from.
#[derive(Debug)]
pub struct LoadError {
    /// The file in which the error occurred.
    pub path: PathBuf,
    /// The underlying error.
    pub err: Error,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.err)
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

/// A running load started by [`LoaderBuilder::load`].
///
/// Drain `records` before `errors`. The records channel closes when every
/// file has been processed, at which point all errors are waiting in the
/// errors channel.
#[derive(Debug)]
pub struct Load<T> {
    records: Receiver<Loaded<T>>,
    errors: Receiver<LoadError>,
    handle: thread::JoinHandle<()>,
}

impl<T> Load<T> {
    /// The channel of decoded records.
    pub fn records(&self) -> &Receiver<Loaded<T>> {
        &self.records
    }

    /// The channel of reported errors.
    pub fn errors(&self) -> &Receiver<LoadError> {
        &self.errors
    }

    /// Wait for every worker to finish.
    ///
    /// Records that were not received are dropped, which unblocks any
    /// worker waiting on a full records channel.
    pub fn wait(self) {
        let Load { records, errors, handle } = self;
        drop(records);
        drop(errors);
        if handle.join().is_err() {
            warn!("loader coordinator panicked");
        }
    }
}

struct Worker<T> {
    decoder: DecoderBuilder,
    queue: Arc<Mutex<vec::IntoIter<PathBuf>>>,
    records: SyncSender<Loaded<T>>,
    errors: Sender<LoadError>,
}

impl<T: Record + Default> Worker<T> {
    fn run(self) {
        while let Some(path) = self.next_path() {
            if !self.load_file(&path) {
                // The consumer is gone.
                return;
            }
        }
    }

    fn next_path(&self) -> Option<PathBuf> {
        match self.queue.lock() {
            Ok(mut queue) => queue.next(),
            Err(_) => None,
        }
    }

    /// Decode one file. Returns false once the records channel is closed.
    fn load_file(&self, path: &Path) -> bool {
        debug!(path = %path.display(), "loading file");
        let mut dec = match self.decoder.from_path(path) {
            Ok(dec) => dec,
            Err(err) => return self.report(path, err),
        };
        let mut row = 0;
        loop {
            match self.next_record(&mut dec) {
                Ok(None) => break,
                Ok(Some(data)) => {
                    row += 1;
                    let loaded = Loaded {
                        path: path.to_path_buf(),
                        row: row,
                        loaded_at: SystemTime::now(),
                        data: data,
                    };
                    if self.records.send(loaded).is_err() {
                        return false;
                    }
                }
                Err(err) => {
                    row += 1;
                    let fatal = err.is_fatal();
                    if !self.report(path, err) {
                        return false;
                    }
                    if fatal {
                        warn!(path = %path.display(), row = row, "abandoning file");
                        return true;
                    }
                }
            }
        }
        debug!(path = %path.display(), rows = row, "finished file");
        true
    }

    fn next_record(&self, dec: &mut Decoder<File>) -> Result<Option<T>> {
        if !dec.advance()? {
            return Ok(None);
        }
        let mut data = T::default();
        dec.decode_into(&mut data)?;
        Ok(Some(data))
    }

    fn report(&self, path: &Path, err: Error) -> bool {
        warn!(path = %path.display(), error = %err, "load error");
        self.errors.send(LoadError { path: path.to_path_buf(), err: err }).is_ok()
    }
}
