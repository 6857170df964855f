//! Append-only journal of committed revisions.
//!
//! One JSON line per committed mutation, written under the change feed lock
//! before the in-memory state changes. On open the journal is replayed on top
//! of the latest snapshot; a torn trailing line (crash mid-write) is dropped.

use crate::{
    error::{Error, Result},
    tree::RevNode,
    DocId, Sequence,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One committed mutation: the nodes added to a document's tree under `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub seq: Sequence,
    pub id: DocId,
    pub nodes: Vec<RevNode>,
}

#[derive(Debug)]
pub(crate) struct Journal {
    path: PathBuf,
    file: Mutex<File>,
    sync_writes: bool,
}

impl Journal {
    /// Open (or create) the journal and return its intact records.
    pub(crate) fn open(path: &Path, sync_writes: bool) -> Result<(Self, Vec<JournalRecord>)> {
        let (records, valid_len) = if path.exists() {
            Self::read(path)?
        } else {
            (Vec::new(), 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() > valid_len {
            file.set_len(valid_len)?;
        }

        Ok((
            Self {
                path: path.to_path_buf(),
                file: Mutex::new(file),
                sync_writes,
            },
            records,
        ))
    }

    /// Read every intact record and the byte length they occupy.
    fn read(path: &Path) -> Result<(Vec<JournalRecord>, u64)> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        let mut valid_len = 0u64;
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            let complete = line.ends_with('\n');
            match serde_json::from_str::<JournalRecord>(line.trim_end()) {
                Ok(record) if complete => {
                    records.push(record);
                    valid_len += read as u64;
                }
                Ok(_) | Err(_) => {
                    let mut rest = String::new();
                    if reader.read_line(&mut rest)? != 0 {
                        return Err(Error::Storage(format!(
                            "corrupt journal record after sequence {}",
                            records.last().map_or(0, |r: &JournalRecord| r.seq)
                        )));
                    }
                    tracing::warn!(
                        path = %path.display(),
                        bytes = read,
                        "skipping torn trailing journal record"
                    );
                    break;
                }
            }
        }

        Ok((records, valid_len))
    }

    pub(crate) fn append(&self, record: &JournalRecord) -> Result<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| Error::Storage(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Drop every record (after a snapshot has captured them).
    pub(crate) fn truncate(&self) -> Result<()> {
        let file = self.file.lock();
        file.set_len(0)?;
        if self.sync_writes {
            file.sync_all()?;
        }
        tracing::debug!(path = %self.path.display(), "journal truncated");
        Ok(())
    }
}

/// Replace `path` with `contents` via a temporary file and rename.
pub(crate) fn write_atomic(path: &Path, contents: &str, sync: bool) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        if sync {
            file.sync_all()?;
        }
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
