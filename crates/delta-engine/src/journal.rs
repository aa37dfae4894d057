//! Append-only JSONL journal.
//!
//! One long-lived append handle per run; each record is a single line,
//! fsynced at iteration boundaries. The reader validates the tagged-union
//! shape and the seq invariant and fails fast on any violation.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use delta_types::{EventPayload, JournalEvent};

use crate::{Error, Result};

/// Writer half of the journal
pub struct Journal {
    file: File,
    path: PathBuf,
    next_seq: u64,
}

impl Journal {
    /// Open (or create) the journal for appending.
    ///
    /// Existing contents are validated so a resume inherits a trustworthy
    /// seq counter instead of silently extending a corrupt log.
    pub fn open(path: &Path) -> Result<Self> {
        let existing = if path.exists() {
            read_events(path)?
        } else {
            Vec::new()
        };
        let next_seq = existing.last().map(|e| e.seq + 1).unwrap_or(1);

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, stamping seq and timestamp.
    pub fn append(&mut self, payload: EventPayload) -> Result<JournalEvent> {
        let event = JournalEvent {
            seq: self.next_seq,
            timestamp: Utc::now(),
            payload,
        };
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.next_seq += 1;
        Ok(event)
    }

    /// Flush buffered bytes to stable storage. Called at iteration
    /// boundaries and before every engine exit.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Re-read the whole journal from disk.
    pub fn read_all(&self) -> Result<Vec<JournalEvent>> {
        read_events(&self.path)
    }
}

/// Read and validate a journal file.
pub fn read_events(path: &Path) -> Result<Vec<JournalEvent>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut prev_seq = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            // A trailing partial/empty line can only legally be the last
            // line (crash mid-append); anything else is corruption.
            continue;
        }

        let event: JournalEvent =
            serde_json::from_str(&line).map_err(|err| Error::JournalCorrupt {
                line: line_no,
                message: err.to_string(),
            })?;

        if event.seq <= prev_seq {
            return Err(Error::SeqRegression {
                line: line_no,
                prev: prev_seq,
                next: event.seq,
            });
        }
        prev_seq = event.seq;
        events.push(event);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_types::{ActionStatus, RunStatus};
    use tempfile::TempDir;

    fn journal_path(temp: &TempDir) -> PathBuf {
        temp.path().join("journal.jsonl")
    }

    #[test]
    fn test_seq_is_monotonic_from_one() {
        let temp = TempDir::new().unwrap();
        let mut journal = Journal::open(&journal_path(&temp)).unwrap();

        let first = journal
            .append(EventPayload::SystemMessage {
                content: "a".to_string(),
            })
            .unwrap();
        let second = journal
            .append(EventPayload::SystemMessage {
                content: "b".to_string(),
            })
            .unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let temp = TempDir::new().unwrap();
        let path = journal_path(&temp);
        {
            let mut journal = Journal::open(&path).unwrap();
            journal
                .append(EventPayload::SystemMessage {
                    content: "first".to_string(),
                })
                .unwrap();
            journal.sync().unwrap();
        }

        let mut journal = Journal::open(&path).unwrap();
        let event = journal
            .append(EventPayload::EngineEnd {
                status: RunStatus::Interrupted,
                message: None,
            })
            .unwrap();
        assert_eq!(event.seq, 2);

        let events = journal.read_all().unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_append_only_prefix_stability() {
        let temp = TempDir::new().unwrap();
        let path = journal_path(&temp);
        let mut journal = Journal::open(&path).unwrap();
        journal
            .append(EventPayload::SystemMessage {
                content: "one".to_string(),
            })
            .unwrap();
        journal.sync().unwrap();
        let before = std::fs::read(&path).unwrap();

        journal
            .append(EventPayload::ActionResult {
                iteration: 1,
                action_id: "a".to_string(),
                execution_ref: "e".to_string(),
                status: ActionStatus::Success,
                observation_content: "ok".to_string(),
                exit_code: Some(0),
            })
            .unwrap();
        journal.sync().unwrap();
        let after = std::fs::read(&path).unwrap();

        assert!(after.len() > before.len());
        assert_eq!(&after[..before.len()], &before[..]);
    }

    #[test]
    fn test_corrupt_line_fails_read() {
        let temp = TempDir::new().unwrap();
        let path = journal_path(&temp);
        std::fs::write(
            &path,
            "{\"seq\":1,\"timestamp\":\"2026-01-01T00:00:00Z\",\"type\":\"SYSTEM_MESSAGE\",\"content\":\"x\"}\nnot json\n",
        )
        .unwrap();

        assert!(matches!(
            read_events(&path),
            Err(Error::JournalCorrupt { line: 2, .. })
        ));
    }

    #[test]
    fn test_seq_regression_fails_read() {
        let temp = TempDir::new().unwrap();
        let path = journal_path(&temp);
        std::fs::write(
            &path,
            concat!(
                "{\"seq\":2,\"timestamp\":\"2026-01-01T00:00:00Z\",\"type\":\"SYSTEM_MESSAGE\",\"content\":\"a\"}\n",
                "{\"seq\":2,\"timestamp\":\"2026-01-01T00:00:01Z\",\"type\":\"SYSTEM_MESSAGE\",\"content\":\"b\"}\n",
            ),
        )
        .unwrap();

        assert!(matches!(
            read_events(&path),
            Err(Error::SeqRegression { prev: 2, next: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_event_type_fails_read() {
        let temp = TempDir::new().unwrap();
        let path = journal_path(&temp);
        std::fs::write(
            &path,
            "{\"seq\":1,\"timestamp\":\"2026-01-01T00:00:00Z\",\"type\":\"FUTURE_EVENT\"}\n",
        )
        .unwrap();

        assert!(matches!(
            read_events(&path),
            Err(Error::JournalCorrupt { .. })
        ));
    }
}
