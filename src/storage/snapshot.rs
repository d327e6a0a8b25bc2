//! Snapshot Persistence
//!
//! This module persists the full keyspace to a local file and restores it
//! on startup. The format is line-oriented and length-prefixed, so keys and
//! values may contain spaces, newlines, or arbitrary binary data.
//!
//! ## Record grammar
//!
//! Each record starts with a type byte, a space-separated header of lengths
//! and counts terminated by `\n`, then the raw payload bytes in declared
//! order, then a trailing `\n`:
//!
//! - `K <klen> <vlen>\n<key><value>\n` — string entry
//! - `L <klen> <n>\n<key> <len1>\n<item1> <len2>\n<item2> …\n` — list entry
//! - `H <klen> <n>\n<key> <flen1> <vlen1>\n<field1><value1> …\n` — hash entry
//! - `E <klen> <ms>\n<key>\n` — deadline in milliseconds since the epoch
//!
//! ## Atomicity
//!
//! `dump` clones the keyspace image under the store lock, encodes it, and
//! writes a temp file that is renamed over the target, so a crash mid-write
//! leaves the previous snapshot intact.

use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::storage::Keyspace;

/// How often the snapshot worker writes the keyspace to disk.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(300);

/// A point-in-time clone of the keyspace, ready for encoding.
#[derive(Debug, Default, PartialEq)]
pub struct SnapshotImage {
    pub strings: Vec<(Bytes, Bytes)>,
    pub lists: Vec<(Bytes, Vec<Bytes>)>,
    pub hashes: Vec<(Bytes, Vec<(Bytes, Bytes)>)>,
    /// Deadlines in milliseconds since the Unix epoch.
    pub deadlines: Vec<(Bytes, u64)>,
}

/// Writes a full snapshot of the keyspace to `path`.
///
/// The image is captured under the keyspace lock; file I/O happens after
/// the lock is released.
pub fn dump(keyspace: &Keyspace, path: &Path) -> io::Result<()> {
    let image = keyspace.export();
    let encoded = encode(&image);

    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(&encoded)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a snapshot from `path`, replacing all keyspace state and purging
/// entries that expired while the file sat on disk.
///
/// Returns `Ok(false)` when no snapshot file exists.
pub fn load(keyspace: &Keyspace, path: &Path) -> io::Result<bool> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let image = decode(&raw)?;
    keyspace.import(image);
    Ok(true)
}

/// Encodes a snapshot image to its on-disk representation.
fn encode(image: &SnapshotImage) -> Vec<u8> {
    let mut out = Vec::new();

    for (key, value) in &image.strings {
        out.extend_from_slice(format!("K {} {}\n", key.len(), value.len()).as_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(value);
        out.push(b'\n');
    }

    for (key, items) in &image.lists {
        out.extend_from_slice(format!("L {} {}\n", key.len(), items.len()).as_bytes());
        out.extend_from_slice(key);
        for item in items {
            out.extend_from_slice(format!(" {}\n", item.len()).as_bytes());
            out.extend_from_slice(item);
        }
        out.push(b'\n');
    }

    for (key, pairs) in &image.hashes {
        out.extend_from_slice(format!("H {} {}\n", key.len(), pairs.len()).as_bytes());
        out.extend_from_slice(key);
        for (field, value) in pairs {
            out.extend_from_slice(format!(" {} {}\n", field.len(), value.len()).as_bytes());
            out.extend_from_slice(field);
            out.extend_from_slice(value);
        }
        out.push(b'\n');
    }

    for (key, ms) in &image.deadlines {
        out.extend_from_slice(format!("E {} {}\n", key.len(), ms).as_bytes());
        out.extend_from_slice(key);
        out.push(b'\n');
    }

    out
}

/// Decodes an on-disk snapshot back into an image.
fn decode(raw: &[u8]) -> io::Result<SnapshotImage> {
    let mut image = SnapshotImage::default();
    let mut cursor = Cursor { raw, pos: 0 };

    while !cursor.at_end() {
        let tag = cursor.take_byte()?;
        cursor.expect(b' ')?;

        match tag {
            b'K' => {
                let klen = cursor.take_number()?;
                cursor.expect(b' ')?;
                let vlen = cursor.take_number()?;
                cursor.expect(b'\n')?;
                let key = cursor.take_bytes(klen)?;
                let value = cursor.take_bytes(vlen)?;
                cursor.expect(b'\n')?;
                image.strings.push((key, value));
            }
            b'L' => {
                let klen = cursor.take_number()?;
                cursor.expect(b' ')?;
                let count = cursor.take_number()?;
                cursor.expect(b'\n')?;
                let key = cursor.take_bytes(klen)?;

                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    cursor.expect(b' ')?;
                    let len = cursor.take_number()?;
                    cursor.expect(b'\n')?;
                    items.push(cursor.take_bytes(len)?);
                }
                cursor.expect(b'\n')?;
                image.lists.push((key, items));
            }
            b'H' => {
                let klen = cursor.take_number()?;
                cursor.expect(b' ')?;
                let count = cursor.take_number()?;
                cursor.expect(b'\n')?;
                let key = cursor.take_bytes(klen)?;

                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    cursor.expect(b' ')?;
                    let flen = cursor.take_number()?;
                    cursor.expect(b' ')?;
                    let vlen = cursor.take_number()?;
                    cursor.expect(b'\n')?;
                    let field = cursor.take_bytes(flen)?;
                    let value = cursor.take_bytes(vlen)?;
                    pairs.push((field, value));
                }
                cursor.expect(b'\n')?;
                image.hashes.push((key, pairs));
            }
            b'E' => {
                let klen = cursor.take_number()?;
                cursor.expect(b' ')?;
                let ms = cursor.take_number()? as u64;
                cursor.expect(b'\n')?;
                let key = cursor.take_bytes(klen)?;
                cursor.expect(b'\n')?;
                image.deadlines.push((key, ms));
            }
            other => {
                return Err(corrupt(format!("unknown record tag {:?}", other as char)));
            }
        }
    }

    Ok(image)
}

struct Cursor<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.raw.len()
    }

    fn take_byte(&mut self) -> io::Result<u8> {
        let b = *self.raw.get(self.pos).ok_or_else(|| corrupt("truncated record"))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, expected: u8) -> io::Result<()> {
        let b = self.take_byte()?;
        if b != expected {
            return Err(corrupt(format!(
                "expected {:?}, found {:?}",
                expected as char, b as char
            )));
        }
        Ok(())
    }

    fn take_number(&mut self) -> io::Result<usize> {
        let start = self.pos;
        while self.pos < self.raw.len() && self.raw[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(corrupt("expected number"));
        }
        std::str::from_utf8(&self.raw[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| corrupt("number out of range"))
    }

    fn take_bytes(&mut self, len: usize) -> io::Result<Bytes> {
        if self.pos + len > self.raw.len() {
            return Err(corrupt("truncated payload"));
        }
        let bytes = Bytes::copy_from_slice(&self.raw[self.pos..self.pos + len]);
        self.pos += len;
        Ok(bytes)
    }
}

fn corrupt(msg: impl Into<String>) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, format!("corrupt snapshot: {}", msg.into()))
}

/// Handle to the periodic snapshot task.
///
/// The worker wakes on a fixed interval, writes the keyspace to disk, and
/// performs one final dump when shut down. A dump-serialization mutex keeps
/// at most one dump in flight; a tick that lands while a dump is running is
/// skipped.
#[derive(Debug)]
pub struct SnapshotWorker {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SnapshotWorker {
    /// Starts the snapshot worker.
    pub fn start(keyspace: Arc<Keyspace>, path: PathBuf, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(worker_loop(keyspace, path, interval, shutdown_rx));
        info!(interval_secs = interval.as_secs(), "Snapshot worker started");
        Self { shutdown_tx, task }
    }

    /// Signals shutdown and waits for the final dump to complete.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Snapshot worker task failed");
        }
    }
}

async fn worker_loop(
    keyspace: Arc<Keyspace>,
    path: PathBuf,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let dump_lock = Arc::new(Mutex::new(()));
    let mut ticker = tokio::time::interval(interval);
    // The first tick of a tokio interval fires immediately; the snapshot
    // that matters at t=0 is the one main() just loaded.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Ok(guard) = dump_lock.clone().try_lock_owned() else {
                    debug!("Previous snapshot still running, skipping tick");
                    continue;
                };

                let keyspace = Arc::clone(&keyspace);
                let path = path.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    run_dump(&keyspace, &path).await;
                });
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    // Final dump, serialized behind any dump still in flight.
    let _guard = dump_lock.lock().await;
    run_dump(&keyspace, &path).await;
    info!("Snapshot worker stopped");
}

async fn run_dump(keyspace: &Arc<Keyspace>, path: &Path) {
    let keyspace = Arc::clone(keyspace);
    let path = path.to_path_buf();

    let result = tokio::task::spawn_blocking(move || dump(&keyspace, &path)).await;
    match result {
        Ok(Ok(())) => debug!("Keyspace dumped to disk"),
        Ok(Err(e)) => error!(error = %e, "Snapshot dump failed"),
        Err(e) => error!(error = %e, "Snapshot dump task failed"),
    }
}
