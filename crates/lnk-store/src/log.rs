use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};

/// One committed entry as it is persisted.
///
/// On-disk format is a bare JSON object per record, newline-terminated,
/// with no surrounding container:
/// ```text
/// {"Key":"0","URL":"http://example.com"}
/// {"Key":"1","URL":"http://other.com"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl Record {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }
}

/// Flush/sync strategy for log appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every record (safest, highest latency).
    EveryWrite,
    /// Flush to the OS after every record and rely on its page cache.
    #[default]
    OsDefault,
}

/// Append-only writer for the URL log.
///
/// Never seeks or rewrites: bytes already in the file stay untouched.
pub struct LogWriter {
    writer: BufWriter<File>,
    /// Current end-of-file offset.
    offset: u64,
    sync_mode: SyncMode,
}

impl LogWriter {
    /// Open (or create) the log at `path` for appending.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            writer: BufWriter::new(file),
            offset,
            sync_mode,
        })
    }

    /// Append one record. Returns the byte offset it was written at.
    pub fn append(&mut self, record: &Record) -> StoreResult<u64> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        line.push(b'\n');

        let entry_offset = self.offset;
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            self.writer.get_ref().sync_all()?;
        }
        self.offset += line.len() as u64;

        debug!(offset = entry_offset, key = %record.key, "log append");
        Ok(entry_offset)
    }

    /// Current end-of-file offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// Result of reading a log from the start.
#[derive(Debug, Default)]
pub struct Replay {
    /// Every well-formed record before the first bad one, in file order.
    pub records: Vec<Record>,
    /// Byte length of the prefix holding `records`.
    pub valid_len: u64,
    /// Why decoding stopped early, if it did.
    pub tail_error: Option<StoreError>,
}

/// Decode every record in the log at `path`.
///
/// A missing file yields an empty replay. Decoding stops at the first
/// malformed or truncated object; what came before is returned and the
/// failure is reported as [`StoreError::LogCorrupt`] in `tail_error`. A read
/// error part way through is reported as [`StoreError::LogUnavailable`].
pub fn replay(path: &Path) -> StoreResult<Replay> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no log file; starting empty");
            return Ok(Replay::default());
        }
        Err(e) => {
            return Err(StoreError::LogUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    let mut stream =
        serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<Record>();
    let mut out = Replay::default();

    loop {
        match stream.next() {
            None => break,
            Some(Ok(record)) => {
                out.records.push(record);
                out.valid_len = stream.byte_offset() as u64;
            }
            Some(Err(e)) if e.is_io() => {
                out.tail_error = Some(StoreError::LogUnavailable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                break;
            }
            Some(Err(e)) => {
                out.tail_error = Some(StoreError::LogCorrupt {
                    offset: out.valid_len,
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    debug!(recovered = out.records.len(), valid_len = out.valid_len, "log replay complete");
    Ok(out)
}

/// Sidecar file that receives bytes cut from a damaged log.
pub fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

/// Cut the log at `path` back to its first `valid_len` bytes.
///
/// The removed tail is appended to [`corrupt_path`] first. Returns the number
/// of bytes removed.
pub fn truncate_tail(path: &Path, valid_len: u64) -> StoreResult<u64> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len <= valid_len {
        return Ok(0);
    }

    let mut tail = Vec::with_capacity((len - valid_len) as usize);
    file.seek(SeekFrom::Start(valid_len))?;
    file.read_to_end(&mut tail)?;

    let mut sidecar = OpenOptions::new()
        .create(true)
        .append(true)
        .open(corrupt_path(path))?;
    sidecar.write_all(&tail)?;
    sidecar.sync_all()?;

    file.set_len(valid_len)?;
    file.sync_all()?;
    Ok(len - valid_len)
}

/// Start the single background task that drains `queue` into the log.
///
/// Records are appended strictly in queue order. A failed append is logged
/// and the record dropped. The task exits once every sender is gone and the
/// queue is empty.
pub fn spawn_writer(
    path: PathBuf,
    sync_mode: SyncMode,
    mut queue: mpsc::Receiver<Record>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut writer = match LogWriter::open(&path, sync_mode) {
            Ok(writer) => writer,
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot open log for writing; records will not persist");
                let mut dropped = 0usize;
                while queue.blocking_recv().is_some() {
                    dropped += 1;
                }
                warn!(dropped, "log writer stopped");
                return;
            }
        };

        info!(path = %path.display(), offset = writer.offset(), "log writer started");
        let mut written = 0usize;
        while let Some(record) = queue.blocking_recv() {
            match writer.append(&record) {
                Ok(_) => written += 1,
                Err(e) => {
                    let failure = StoreError::PersistenceWriteFailed {
                        key: record.key,
                        reason: e.to_string(),
                    };
                    error!(error = %failure, "dropping record");
                }
            }
        }
        info!(written, "log writer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(path: &Path) -> String {
        let mut s = String::new();
        File::open(path).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn record_uses_capitalised_field_names() {
        let json = serde_json::to_string(&Record::new("0", "a.com")).unwrap();
        assert_eq!(json, r#"{"Key":"0","URL":"a.com"}"#);
    }

    #[test]
    fn append_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut writer = LogWriter::open(&path, SyncMode::OsDefault).unwrap();

        writer.append(&Record::new("0", "a.com")).unwrap();
        writer.append(&Record::new("1", "b.com")).unwrap();
        drop(writer);

        let replay = replay(&path).unwrap();
        assert!(replay.tail_error.is_none());
        assert_eq!(
            replay.records,
            vec![Record::new("0", "a.com"), Record::new("1", "b.com")]
        );
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        let mut writer = LogWriter::open(&path, SyncMode::EveryWrite).unwrap();

        let off1 = writer.append(&Record::new("0", "a")).unwrap();
        let off2 = writer.append(&Record::new("1", "b")).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
        assert_eq!(writer.offset(), read_all(&path).len() as u64);
    }

    #[test]
    fn reopen_appends_after_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.json");
        LogWriter::open(&path, SyncMode::OsDefault)
            .unwrap()
            .append(&Record::new("0", "a"))
            .unwrap();

        let before = read_all(&path);
        let mut writer = LogWriter::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(writer.offset(), before.len() as u64);
        writer.append(&Record::new("1", "b")).unwrap();

        let after = read_all(&path);
        assert!(after.starts_with(&before));
        assert_eq!(replay(&path).unwrap().records.len(), 2);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let replay = replay(&dir.path().join("absent.json")).unwrap();
        assert!(replay.records.is_empty());
        assert!(replay.tail_error.is_none());
    }

    #[test]
    fn replay_accepts_records_without_separators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.json");
        fs::write(&path, r#"{"Key":"0","URL":"a.com"}{"Key":"1","URL":"b.com"}"#).unwrap();

        let replay = replay(&path).unwrap();
        assert_eq!(replay.records.len(), 2);
        assert_eq!(replay.records[1].url, "b.com");
    }

    #[test]
    fn replay_stops_at_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.json");
        fs::write(
            &path,
            "{\"Key\":\"0\",\"URL\":\"a.com\"}\n{\"Key\":\"1\",\"URL\":\"b.com\"}\n{\"Key\":\"2\",\"UR",
        )
        .unwrap();

        let replay = replay(&path).unwrap();
        assert_eq!(replay.records.len(), 2);
        let good = "{\"Key\":\"0\",\"URL\":\"a.com\"}\n{\"Key\":\"1\",\"URL\":\"b.com\"}";
        assert_eq!(replay.valid_len, good.len() as u64);
        assert!(matches!(
            replay.tail_error,
            Some(StoreError::LogCorrupt { offset, .. }) if offset == replay.valid_len
        ));
    }

    #[test]
    fn truncate_tail_moves_bad_bytes_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{\"Key\":\"0\",\"URL\":\"a.com\"}\n{\"Key\":\"1\",").unwrap();

        let valid_len = replay(&path).unwrap().valid_len;
        let removed = truncate_tail(&path, valid_len).unwrap();

        assert_eq!(read_all(&path), "{\"Key\":\"0\",\"URL\":\"a.com\"}");
        assert_eq!(read_all(&corrupt_path(&path)), "\n{\"Key\":\"1\",");
        assert_eq!(removed, 12);

        let replay = replay(&path).unwrap();
        assert_eq!(replay.records.len(), 1);
        assert!(replay.tail_error.is_none());
    }

    #[test]
    fn truncate_tail_on_clean_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{\"Key\":\"0\",\"URL\":\"a.com\"}\n").unwrap();

        assert_eq!(truncate_tail(&path, 100).unwrap(), 0);
        assert!(!corrupt_path(&path).exists());
    }

    #[test]
    fn corrupt_path_is_a_sibling() {
        let path = Path::new("/var/lib/lnk/store.json");
        assert_eq!(corrupt_path(path), Path::new("/var/lib/lnk/store.json.corrupt"));
    }

    #[test]
    fn replay_stops_at_first_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            "{\"Key\":\"0\",\"URL\":\"a.com\"}\n{\"Nope\":1}\n{\"Key\":\"2\",\"URL\":\"c.com\"}\n",
        )
        .unwrap();

        let replay = replay(&path).unwrap();
        assert_eq!(replay.records, vec![Record::new("0", "a.com")]);
        assert!(replay.tail_error.is_some());
    }

    #[tokio::test]
    async fn writer_task_drains_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_writer(path.clone(), SyncMode::OsDefault, rx);

        for i in 0..10u64 {
            tx.send(Record::new(i.to_string(), format!("u{i}"))).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let keys: Vec<String> = replay(&path)
            .unwrap()
            .records
            .into_iter()
            .map(|r| r.key)
            .collect();
        let expected: Vec<String> = (0..10).map(|i: u64| i.to_string()).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn writer_task_drains_even_when_log_cannot_open() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let (tx, rx) = mpsc::channel(1);
        let handle = spawn_writer(dir.path().to_path_buf(), SyncMode::OsDefault, rx);

        for i in 0..3 {
            tx.send(Record::new(i.to_string(), "x")).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();
    }
}
