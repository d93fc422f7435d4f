//! Trace input: background line readers and the non-blocking drain
//!
//! Readers run as tokio tasks and push raw lines into a bounded channel.
//! The tick-driven side only ever calls [`LineDrain::drain`], which takes
//! whatever is already buffered and returns without waiting.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Read lines from `reader` until EOF, forwarding each to `tx`
///
/// Blocks (asynchronously) when the channel is full, so a slow consumer
/// pushes back on the input rather than growing memory.
pub fn spawn_line_reader<R>(reader: R, tx: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        let mut forwarded: u64 = 0;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        log::debug!("Line channel closed, reader exiting");
                        break;
                    }
                    forwarded += 1;
                }
                Ok(None) => {
                    log::info!("📭 Input reached EOF after {} lines", forwarded);
                    break;
                }
                Err(e) => {
                    log::error!("❌ Input read error after {} lines: {}", forwarded, e);
                    break;
                }
            }
        }
    })
}

/// Follows a trace file like `tail -f`, reopening it on rotation
pub struct TraceTail {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    poll_interval: Duration,
    from_start: bool,
}

impl TraceTail {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            inode: None,
            poll_interval: Duration::from_millis(100),
            from_start: false,
        }
    }

    /// Read existing content first instead of seeking to the end
    pub fn from_start(mut self, from_start: bool) -> Self {
        self.from_start = from_start;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Open the file, seeking to its end unless `from_start` is set
    pub async fn start(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;
        #[cfg(unix)]
        {
            self.inode = Some(file.metadata().await?.ino());
        }

        let mut reader = BufReader::new(file);
        if !self.from_start {
            reader.seek(SeekFrom::End(0)).await?;
        }
        self.file = Some(reader);

        log::info!("📖 Following trace file: {}", self.path.display());
        Ok(())
    }

    /// Next complete line, waiting for the writer if necessary
    pub async fn read_line(&mut self) -> std::io::Result<String> {
        let mut line = String::new();
        loop {
            if self.detect_rotation().await? {
                log::info!("🔄 Trace file rotated, reopening: {}", self.path.display());
                // A rotated file is new content; read it from the top
                self.from_start = true;
                self.start().await?;
                line.clear();
            }

            let Some(reader) = self.file.as_mut() else {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "trace file not opened",
                ));
            };

            if reader.read_line(&mut line).await? == 0 || !line.ends_with('\n') {
                // Partial line: keep what we have and wait for the rest
                sleep(self.poll_interval).await;
                continue;
            }

            let complete = line.trim_end_matches(['\n', '\r']).to_string();
            return Ok(complete);
        }
    }

    async fn detect_rotation(&self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            match tokio::fs::metadata(&self.path).await {
                Ok(metadata) => Ok(self.inode.is_some_and(|old| old != metadata.ino())),
                // Mid-rotation: the old name is gone and the new one not yet created
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        }

        #[cfg(not(unix))]
        {
            Ok(false)
        }
    }
}

/// Forward lines from a followed file into `tx` until the channel closes
pub fn spawn_tail_reader(mut tail: TraceTail, tx: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match tail.read_line().await {
                Ok(line) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("❌ Trace file error: {}", e);
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}

/// Non-blocking consumer end of the line channel
pub struct LineDrain {
    rx: mpsc::Receiver<String>,
    closed: bool,
}

impl LineDrain {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx, closed: false }
    }

    /// Hand every buffered line to `f`; returns how many were handled
    pub fn drain(&mut self, mut f: impl FnMut(String)) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(line) => {
                    f(line);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        handled
    }

    /// True once every sender is gone and the buffer has been emptied
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
