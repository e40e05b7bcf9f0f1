#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session persistence: JSON snapshots kept in a durable key-value store.
//!
//! Saves are idempotent: the serialized session, timestamp excluded, is
//! compared against the last write and identical sessions are not written
//! again. Loads reject snapshots that are unparsable, older than the maximum
//! age, or inconsistent with their own board bounds, and delete them.

mod clock;
mod store;

use std::{collections::HashSet, time::Duration};

use merge_six_core::{
    SessionRecord, TileKind, EXPLOSION_VALUE, MAX_BOARD_SIDE, MAX_STACK_DEPTH,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{KeyValueStore, MemoryStore, StoreError};

/// Key under which the session snapshot is stored.
pub const DEFAULT_KEY: &str = "merge-six.session";

/// Version written into new snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Failures reported while saving or loading a session.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The snapshot could not be encoded or decoded.
    #[error("snapshot is not valid JSON")]
    Json(#[from] serde_json::Error),
    /// No snapshot is stored.
    #[error("no snapshot stored")]
    Missing,
    /// The snapshot is older than the maximum age.
    #[error("snapshot is {age_ms} ms old")]
    Stale {
        /// Age of the snapshot.
        age_ms: u64,
    },
    /// The snapshot was written by a newer format.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    /// The snapshot contradicts its own board bounds or tile rules.
    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),
}

/// Serialized form of a saved session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Authoritative world state.
    #[serde(flatten)]
    pub record: SessionRecord,
    /// Wild meter charge.
    pub wild_meter_raw: f64,
    /// Wall-clock time of the save in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Timestamp-free view of a snapshot used to detect unchanged sessions.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Fingerprint<'a> {
    #[serde(flatten)]
    record: &'a SessionRecord,
    wild_meter_raw: f64,
}

/// Session data recovered from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedSession {
    /// Authoritative world state.
    pub record: SessionRecord,
    /// Wild meter charge.
    pub wild_meter_raw: f64,
}

/// What a save request ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The snapshot was written.
    Written,
    /// The session equals the last written one.
    Unchanged,
    /// The player has not moved on the first board yet.
    NothingToSave,
}

/// Configuration parameters required to construct the persistence manager.
#[derive(Clone, Debug)]
pub struct Config {
    key: String,
    max_age: Duration,
}

impl Config {
    /// Creates a configuration storing snapshots under `key`.
    #[must_use]
    pub fn new(key: impl Into<String>, max_age: Duration) -> Self {
        Self {
            key: key.into(),
            max_age,
        }
    }

    /// Key under which the snapshot is stored.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_KEY, DEFAULT_MAX_AGE)
    }
}

/// Saves and restores session snapshots.
#[derive(Debug)]
pub struct PersistenceManager {
    config: Config,
    last_written: Option<String>,
}

impl PersistenceManager {
    /// Creates a manager that has not written anything yet.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            last_written: None,
        }
    }

    /// Writes the session unless nothing changed or nothing happened yet.
    pub fn save(
        &mut self,
        store: &mut dyn KeyValueStore,
        record: &SessionRecord,
        wild_meter_raw: f64,
        now_ms: u64,
    ) -> Result<SaveOutcome, PersistenceError> {
        if record.board_number <= 1 && record.moves_made_on_board == 0 {
            return Ok(SaveOutcome::NothingToSave);
        }

        let fingerprint = fingerprint(record, wild_meter_raw)?;
        if self.last_written.as_deref() == Some(fingerprint.as_str()) {
            debug!("session unchanged since last save");
            return Ok(SaveOutcome::Unchanged);
        }

        let snapshot = SessionSnapshot {
            version: SNAPSHOT_VERSION,
            record: record.clone(),
            wild_meter_raw,
            timestamp_ms: now_ms,
        };
        let json = serde_json::to_string(&snapshot)?;
        store.set(&self.config.key, &json)?;
        self.last_written = Some(fingerprint);
        info!(
            board = record.board_number,
            score = record.score,
            bytes = json.len(),
            "session saved"
        );
        Ok(SaveOutcome::Written)
    }

    /// Loads and validates the stored session.
    ///
    /// Invalid or stale snapshots are deleted before the error is returned.
    pub fn load(
        &mut self,
        store: &mut dyn KeyValueStore,
        now_ms: u64,
    ) -> Result<LoadedSession, PersistenceError> {
        let Some(json) = store.get(&self.config.key)? else {
            return Err(PersistenceError::Missing);
        };

        match self.decode(&json, now_ms) {
            Ok(snapshot) => {
                self.last_written = Some(fingerprint(&snapshot.record, snapshot.wild_meter_raw)?);
                info!(
                    board = snapshot.record.board_number,
                    score = snapshot.record.score,
                    "session loaded"
                );
                Ok(LoadedSession {
                    record: snapshot.record,
                    wild_meter_raw: snapshot.wild_meter_raw,
                })
            }
            Err(error) => {
                warn!(%error, "discarding stored session");
                store.remove(&self.config.key)?;
                Err(error)
            }
        }
    }

    /// Reads the stored snapshot without validating or deleting it.
    pub fn peek(&self, store: &dyn KeyValueStore) -> Result<Option<SessionSnapshot>, PersistenceError> {
        store
            .get(&self.config.key)?
            .map(|json| serde_json::from_str(&json).map_err(PersistenceError::from))
            .transpose()
    }

    /// Deletes the stored snapshot and forgets the last write.
    pub fn clear(&mut self, store: &mut dyn KeyValueStore) -> Result<(), PersistenceError> {
        self.last_written = None;
        store.remove(&self.config.key)?;
        Ok(())
    }

    fn decode(&self, json: &str, now_ms: u64) -> Result<SessionSnapshot, PersistenceError> {
        let snapshot: SessionSnapshot = serde_json::from_str(json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(snapshot.version));
        }
        let age_ms = now_ms.saturating_sub(snapshot.timestamp_ms);
        let max_age_ms = u64::try_from(self.config.max_age.as_millis()).unwrap_or(u64::MAX);
        if age_ms > max_age_ms {
            return Err(PersistenceError::Stale { age_ms });
        }
        validate(&snapshot)?;
        Ok(snapshot)
    }
}

impl Default for PersistenceManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn fingerprint(record: &SessionRecord, wild_meter_raw: f64) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(&Fingerprint {
        record,
        wild_meter_raw,
    })?)
}

fn validate(snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
    let record = &snapshot.record;
    if record.columns == 0 || record.rows == 0 {
        return Err(PersistenceError::Inconsistent(format!(
            "board has no area ({}x{})",
            record.columns, record.rows
        )));
    }
    if record.columns > MAX_BOARD_SIDE || record.rows > MAX_BOARD_SIDE {
        return Err(PersistenceError::Inconsistent(format!(
            "board {}x{} exceeds {MAX_BOARD_SIDE} cells per side",
            record.columns, record.rows
        )));
    }
    if !snapshot.wild_meter_raw.is_finite() || snapshot.wild_meter_raw < 0.0 {
        return Err(PersistenceError::Inconsistent(format!(
            "wild meter charge {} is invalid",
            snapshot.wild_meter_raw
        )));
    }

    let mut seen = HashSet::new();
    for cell in &record.grid_snapshot {
        if cell.column >= record.columns || cell.row >= record.rows {
            return Err(PersistenceError::Inconsistent(format!(
                "cell ({}, {}) lies outside {}x{}",
                cell.column, cell.row, record.columns, record.rows
            )));
        }
        if !seen.insert((cell.column, cell.row)) {
            return Err(PersistenceError::Inconsistent(format!(
                "cell ({}, {}) appears twice",
                cell.column, cell.row
            )));
        }
        if cell.value > EXPLOSION_VALUE || cell.stack_depth == 0 || cell.stack_depth > MAX_STACK_DEPTH
        {
            return Err(PersistenceError::Inconsistent(format!(
                "cell ({}, {}) holds value {} at depth {}",
                cell.column, cell.row, cell.value, cell.stack_depth
            )));
        }
        if cell.kind == TileKind::Wild && cell.locked {
            return Err(PersistenceError::Inconsistent(format!(
                "cell ({}, {}) holds a locked wild",
                cell.column, cell.row
            )));
        }
    }
    Ok(())
}
