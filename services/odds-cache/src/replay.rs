//! Capture and replay of feed snapshots
//!
//! Every snapshot a poller receives can be captured to a JSON-lines
//! journal together with its receive time and frame. Replaying a journal
//! rebuilds a live and a non-live cache from nothing, using the captured
//! receive times as the clock, so the same journal always yields the same
//! state. A checksum over both stores verifies that.
//!
//! Journal line format:
//!
//! ```text
//! {"kind":"in_play","captured_at":"2013-02-19T14:00:00Z","snapshot":[...8 slots...]}
//! {"kind":"connection_lost","captured_at":"2013-02-19T14:00:05Z"}
//! ```

use std::io::{BufRead, Write};
use std::time::Instant;

use chrono::{DateTime, Utc};
use feed_types::frame::FrameType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::cache::FeedCache;
use crate::config::CacheConfig;
use crate::error::UnexpectedDataError;
use crate::snapshot::RawSnapshot;

/// What a journal line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    /// A snapshot of the live frame.
    InPlay,
    /// A snapshot of the non-live frame.
    NotInPlay,
    /// The feed connection dropped at this point.
    ConnectionLost,
}

impl CaptureKind {
    pub fn frame(self) -> Option<FrameType> {
        match self {
            CaptureKind::InPlay => Some(FrameType::Live),
            CaptureKind::NotInPlay => Some(FrameType::NonLive),
            CaptureKind::ConnectionLost => None,
        }
    }
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub kind: CaptureKind,
    pub captured_at: DateTime<Utc>,
    /// Raw snapshot, kept unvalidated so replay reproduces partial applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
}

impl CaptureRecord {
    pub fn snapshot(frame: FrameType, captured_at: DateTime<Utc>, snapshot: Value) -> Self {
        let kind = match frame {
            FrameType::Live => CaptureKind::InPlay,
            FrameType::NonLive => CaptureKind::NotInPlay,
        };
        Self {
            kind,
            captured_at,
            snapshot: Some(snapshot),
        }
    }

    pub fn connection_lost(captured_at: DateTime<Utc>) -> Self {
        Self {
            kind: CaptureKind::ConnectionLost,
            captured_at,
            snapshot: None,
        }
    }
}

/// Metrics collected during replay.
#[derive(Debug, Clone)]
pub struct ReplayMetrics {
    /// Journal records processed.
    pub records_replayed: u64,
    /// Snapshots merged without error.
    pub snapshots_applied: u64,
    /// Snapshots rejected as malformed (relaxed mode only).
    pub snapshots_failed: u64,
    /// Connection-lost markers seen (relaxed mode only).
    pub connection_losses: u64,
    /// Matches reported created, summed over all snapshots.
    pub created: u64,
    /// Match updates reported, summed over all snapshots.
    pub updated: u64,
    /// Matches reported deleted, summed over all snapshots.
    pub deleted: u64,
    /// Duration of replay in milliseconds.
    pub duration_ms: u128,
    /// Checksum over both caches after replay.
    pub state_checksum: String,
}

/// Result of a replay operation.
pub struct ReplayResult {
    pub live: FeedCache,
    pub non_live: FeedCache,
    pub metrics: ReplayMetrics,
}

/// Errors during capture or replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("journal corruption detected at record {index}: {reason}")]
    JournalCorruption { index: usize, reason: String },

    #[error("malformed snapshot at record {index}: {source}")]
    MalformedSnapshot {
        index: usize,
        #[source]
        source: UnexpectedDataError,
    },

    #[error("connection lost at record {index}")]
    ConnectionLost { index: usize },

    #[error("state checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write records as JSON lines.
pub fn write_capture<W: Write>(mut writer: W, records: &[CaptureRecord]) -> Result<(), ReplayError> {
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSON-lines journal. Blank lines are skipped.
pub fn read_capture<R: BufRead>(reader: R) -> Result<Vec<CaptureRecord>, ReplayError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| ReplayError::JournalCorruption {
            index,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Replays a journal into a fresh pair of caches.
pub struct ReplayEngine {
    /// Feed settings shared by both frames.
    base_config: CacheConfig,
    /// Expected state checksum for validation (if known).
    expected_checksum: Option<String>,
    /// Whether malformed snapshots, connection losses and clock regressions
    /// abort the replay.
    strict: bool,
}

impl ReplayEngine {
    pub fn new(base_config: CacheConfig) -> Self {
        Self {
            base_config,
            expected_checksum: None,
            strict: true,
        }
    }

    /// Set the expected state checksum for post-replay validation.
    pub fn with_expected_checksum(mut self, checksum: String) -> Self {
        self.expected_checksum = Some(checksum);
        self
    }

    /// Count failures instead of aborting.
    pub fn with_relaxed_mode(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn replay(&self, records: &[CaptureRecord]) -> Result<ReplayResult, ReplayError> {
        let start = Instant::now();

        info!(record_count = records.len(), "Starting snapshot replay");

        let mut live = FeedCache::new(self.base_config.with_frame(FrameType::Live));
        let mut non_live = FeedCache::new(self.base_config.with_frame(FrameType::NonLive));

        let mut metrics = ReplayMetrics {
            records_replayed: 0,
            snapshots_applied: 0,
            snapshots_failed: 0,
            connection_losses: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            duration_ms: 0,
            state_checksum: String::new(),
        };
        let mut last_captured_at: Option<DateTime<Utc>> = None;

        for (index, record) in records.iter().enumerate() {
            if let Some(last) = last_captured_at {
                if record.captured_at < last && self.strict {
                    return Err(ReplayError::JournalCorruption {
                        index,
                        reason: format!(
                            "Capture time went backwards: {} after {}",
                            record.captured_at, last
                        ),
                    });
                }
            }
            last_captured_at = Some(record.captured_at);
            metrics.records_replayed += 1;

            let cache = match record.kind.frame() {
                Some(FrameType::Live) => &mut live,
                Some(FrameType::NonLive) => &mut non_live,
                None => {
                    if self.strict {
                        return Err(ReplayError::ConnectionLost { index });
                    }
                    warn!(index, "Connection lost marker in journal");
                    metrics.connection_losses += 1;
                    continue;
                }
            };

            let raw = record.snapshot.as_ref().unwrap_or(&Value::Null);
            let applied = RawSnapshot::from_value(raw)
                .and_then(|snapshot| cache.apply_snapshot_at(&snapshot, record.captured_at));

            match applied {
                Ok(changes) => {
                    metrics.snapshots_applied += 1;
                    metrics.created += changes.created.len() as u64;
                    metrics.updated += changes.updated.len() as u64;
                    metrics.deleted += changes.deleted.len() as u64;
                }
                Err(source) if self.strict => {
                    return Err(ReplayError::MalformedSnapshot { index, source });
                }
                Err(source) => {
                    warn!(index, error = %source, "Skipping malformed snapshot");
                    metrics.snapshots_failed += 1;
                }
            }
        }

        let state_checksum = compute_state_checksum(&live, &non_live);

        if let Some(ref expected) = self.expected_checksum {
            if &state_checksum != expected {
                error!(
                    expected = %expected,
                    actual = %state_checksum,
                    "State checksum mismatch after replay"
                );
                return Err(ReplayError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: state_checksum,
                });
            }
        }

        metrics.duration_ms = start.elapsed().as_millis();
        metrics.state_checksum = state_checksum;

        info!(
            records_replayed = metrics.records_replayed,
            snapshots_applied = metrics.snapshots_applied,
            snapshots_failed = metrics.snapshots_failed,
            duration_ms = metrics.duration_ms,
            "Replay completed successfully"
        );

        Ok(ReplayResult {
            live,
            non_live,
            metrics,
        })
    }
}

/// Checksum over the live store followed by the non-live store.
pub fn compute_state_checksum(live: &FeedCache, non_live: &FeedCache) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"live|");
    live.store().hash_into(&mut hasher);
    hasher.update(b"non_live|");
    non_live.store().hash_into(&mut hasher);
    format!("{:x}", hasher.finalize())
}
