//! Append-only, crash-recoverable index file.
//!
//! Each `put_bulk` call is one record:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized IndexRecord)]
//! ```
//! On open the file is replayed front to back into memory. The first record
//! that is truncated, fails its CRC check or does not decode ends the replay
//! and everything from it onwards is cut off, so the in-memory state is
//! always a prefix of the write history. A later record can never be applied
//! on top of a lost one.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use tether_types::ContentAddress;

use crate::error::{IndexError, IndexResult};
use crate::traits::DidAnchorIndex;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct IndexRecord {
    suffixes: Vec<String>,
    address: ContentAddress,
}

/// Durability settings for [`LogDidAnchorIndex`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `fsync` after every record.
    pub sync_every_write: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            sync_every_write: true,
        }
    }
}

struct LogState {
    file: File,
    offset: u64,
    entries: HashMap<String, ContentAddress>,
}

/// File-backed [`DidAnchorIndex`].
pub struct LogDidAnchorIndex {
    path: PathBuf,
    config: LogConfig,
    state: Mutex<LogState>,
}

impl LogDidAnchorIndex {
    /// Open (or create) the index file at `path` and replay it.
    pub fn open(path: impl AsRef<Path>, config: LogConfig) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let replayed = replay(&path)?;
        let (records, valid_len) = (replayed.records, replayed.valid_len);
        let file_len = file.metadata()?.len();
        if replayed.corrupt {
            let backup = corrupt_copy_path(&path);
            fs::copy(&path, &backup)?;
            error!(
                valid_len,
                file_len,
                backup = %backup.display(),
                "corrupt index record; discarding it and every later record"
            );
            file.set_len(valid_len)?;
        } else if valid_len < file_len {
            warn!(valid_len, file_len, "discarding torn index tail");
            file.set_len(valid_len)?;
        }

        let mut entries = HashMap::new();
        for record in &records {
            for suffix in &record.suffixes {
                entries.insert(suffix.clone(), record.address.clone());
            }
        }
        info!(path = %path.display(), records = records.len(), suffixes = entries.len(), "opened DID-anchor index");

        Ok(Self {
            path,
            config,
            state: Mutex::new(LogState {
                file,
                offset: valid_len,
                entries,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of indexed suffixes.
    pub fn len(&self) -> usize {
        self.state.lock().expect("index mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the file so it holds one record per distinct address.
    pub fn compact(&self) -> IndexResult<()> {
        let mut state = self.state.lock().expect("index mutex poisoned");

        let mut grouped: HashMap<&ContentAddress, Vec<String>> = HashMap::new();
        for (suffix, address) in &state.entries {
            grouped.entry(address).or_default().push(suffix.clone());
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        let mut written = 0u64;
        for (address, mut suffixes) in grouped {
            suffixes.sort();
            let frame = encode(&IndexRecord {
                suffixes,
                address: address.clone(),
            })?;
            tmp.write_all(&frame)?;
            written += frame.len() as u64;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| IndexError::Io(e.error))?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        let before = state.offset;
        state.file = file;
        state.offset = written;

        debug!(before, after = written, "compacted DID-anchor index");
        Ok(())
    }
}

impl DidAnchorIndex for LogDidAnchorIndex {
    fn put_bulk(&self, suffixes: &[String], address: &ContentAddress) -> IndexResult<()> {
        if suffixes.is_empty() {
            return Ok(());
        }
        let frame = encode(&IndexRecord {
            suffixes: suffixes.to_vec(),
            address: address.clone(),
        })?;

        let mut state = self.state.lock().expect("index mutex poisoned");
        if let Err(e) = write_frame(&mut state.file, &frame, self.config.sync_every_write) {
            // Drop whatever part of the record reached the file.
            let offset = state.offset;
            state.file.set_len(offset)?;
            return Err(e.into());
        }
        state.offset += frame.len() as u64;
        for suffix in suffixes {
            state.entries.insert(suffix.clone(), address.clone());
        }

        debug!(address = %address.short(), suffixes = suffixes.len(), "indexed anchor");
        Ok(())
    }

    fn get(&self, suffix: &str) -> IndexResult<Option<ContentAddress>> {
        let state = self.state.lock().expect("index mutex poisoned");
        Ok(state.entries.get(suffix).cloned())
    }
}

impl std::fmt::Debug for LogDidAnchorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDidAnchorIndex")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

fn encode(record: &IndexRecord) -> IndexResult<Vec<u8>> {
    let payload =
        bincode::serialize(record).map_err(|e| IndexError::Serialization(e.to_string()))?;
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn write_frame(file: &mut File, frame: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(frame)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

/// Where a corrupt log is copied before it is cut back to its valid prefix.
fn corrupt_copy_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

struct Replay {
    records: Vec<IndexRecord>,
    /// Length of the longest prefix made of intact records.
    valid_len: u64,
    /// Replay stopped at a complete record that was damaged, rather than at
    /// a torn tail.
    corrupt: bool,
}

/// Read intact records up to the first torn or damaged one.
fn replay(path: &Path) -> IndexResult<Replay> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut records = Vec::new();
    let mut offset: u64 = 0;
    let mut corrupt = false;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let end = offset + HEADER_SIZE as u64 + length as u64;
        if length == 0 || end > file_len {
            warn!(offset, length, file_len, "invalid index record length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            error!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; stopping replay");
            corrupt = true;
            break;
        }
        match bincode::deserialize::<IndexRecord>(&payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                error!(offset, error = %e, "undecodable index record; stopping replay");
                corrupt = true;
                break;
            }
        }
        offset = end;
    }

    Ok(Replay {
        records,
        valid_len: offset,
        corrupt,
    })
}
