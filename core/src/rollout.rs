use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use swipe_protocol::ConversationEntry;
use tracing::warn;

use crate::conversation::SharedLog;
use crate::error::SwipeResult;
use crate::journal::Journal;

/// Current journal file format version.
pub const JOURNAL_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct JournalHeader {
    version: u8,
    saved_at: DateTime<Utc>,
}

/// File-backed [`Journal`]: one header line followed by one JSON line per
/// conversation entry. Scaffold entries are synthetic prompt carriers and
/// are never written.
///
/// This is the reference persistence adapter for hosts that do not bring
/// their own; hosts with an existing save layer implement [`Journal`]
/// directly and ignore this type.
#[derive(Debug, Clone)]
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a journal back. Malformed entry lines are skipped with a
    /// warning rather than failing the whole load.
    pub async fn load(&self) -> SwipeResult<Vec<ConversationEntry>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mut lines = raw.lines();

        if let Some(first) = lines.next() {
            match serde_json::from_str::<JournalHeader>(first) {
                Ok(header) if header.version > JOURNAL_VERSION => {
                    warn!(
                        version = header.version,
                        "journal written by a newer version; reading best-effort"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!("journal header unreadable: {err}"),
            }
        }

        let mut entries = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConversationEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!("skipping malformed journal line: {err}"),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl Journal for JsonlJournal {
    async fn persist(&self, log: &SharedLog) -> anyhow::Result<()> {
        let entries = log.entries();

        let header = JournalHeader {
            version: JOURNAL_VERSION,
            saved_at: Utc::now(),
        };
        let mut out = serde_json::to_string(&header)?;
        out.push('\n');
        for entry in entries.iter().filter(|entry| !entry.is_scaffold()) {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, out).await?;
        Ok(())
    }
}
