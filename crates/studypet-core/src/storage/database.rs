//! SQLite-based pet and session storage.
//!
//! Provides persistent storage for:
//! - The single pet record
//! - Session history and aggregate statistics
//! - The evolution log
//! - Key-value store for application state

use chrono::{DateTime, Days, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{data_dir, migrations};
use crate::error::DatabaseError;
use crate::events::Event;
use crate::pet::{EvolutionRecord, EvolutionTable, Pet, PetKind, Stage};
use crate::progression::{ProgressObserver, SessionOutcome, SessionResult};

/// One row of `session_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistoryEntry {
    pub id: i64,
    pub session_id: String,
    /// Requested minutes.
    pub session_duration: u32,
    /// Whole minutes studied.
    pub elapsed: u64,
    pub points_awarded: u32,
    pub outcome: SessionOutcome,
    pub multiplier: f64,
    pub created_at: DateTime<Utc>,
}

/// Aggregates over the session history. Days are UTC calendar days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub cancelled_sessions: u64,
    pub minutes_studied: u64,
    pub points_awarded: u64,
    pub evolutions: u64,
    /// Consecutive days with study time, ending today or yesterday.
    pub streak_days: u32,
    pub today_minutes: u64,
    /// Today and the six days before it.
    pub week_minutes: u64,
    pub avg_session_minutes: f64,
}

/// kv key holding the most recent session event as JSON.
pub const LAST_EVENT_KEY: &str = "last_event";

/// SQLite database for the pet and its history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/studypet.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()?.join("studypet.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Pet ──────────────────────────────────────────────────────────

    /// Insert or replace the pet record.
    pub fn save_pet(&self, pet: &Pet) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO pet (id, pet_name, pet_kind, stage_level, progress_points, experience, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                pet_name = excluded.pet_name,
                pet_kind = excluded.pet_kind,
                stage_level = excluded.stage_level,
                progress_points = excluded.progress_points,
                experience = excluded.experience",
            params![
                pet.name(),
                pet.kind().as_str(),
                pet.stage().ordinal(),
                pet.progress_points(),
                i64::try_from(pet.experience()).unwrap_or(i64::MAX),
                pet.created_at().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load the pet, repairing out-of-range values against `table`.
    ///
    /// An unknown stage falls back to the first stage, negative progress to
    /// 0, and progress at or above an evolving stage's limit is clamped just
    /// below it (the terminal stage clamps to its limit).
    ///
    /// # Errors
    /// `Corrupt` if the kind or timestamp cannot be decoded.
    pub fn load_pet(&self, table: &EvolutionTable) -> Result<Option<Pet>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT pet_name, pet_kind, stage_level, progress_points, experience, created_at
                 FROM pet WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, kind, stage_level, progress, experience, created_at)) = row else {
            return Ok(None);
        };

        let kind: PetKind = kind.parse().map_err(|message| DatabaseError::Corrupt {
            table: "pet".into(),
            message,
        })?;
        let created_at = parse_timestamp("pet", &created_at)?;

        let stage = u8::try_from(stage_level)
            .ok()
            .and_then(Stage::from_ordinal)
            .unwrap_or_else(|| {
                warn!(stage_level, "stored stage out of range, falling back to first stage");
                Stage::Egg
            });
        let max = table
            .max_resting_progress(stage.ordinal())
            .map_err(|e| DatabaseError::Corrupt {
                table: "pet".into(),
                message: e.to_string(),
            })?;
        let progress = match u32::try_from(progress.max(0)) {
            Ok(p) if p <= max => p,
            _ => {
                warn!(progress, max, "stored progress out of range, clamping");
                max
            }
        };

        Ok(Some(Pet::from_parts(
            kind,
            &name,
            stage,
            progress,
            u64::try_from(experience).unwrap_or(0),
            created_at,
        )))
    }

    /// Remove the pet and all of its history.
    pub fn delete_pet(&self) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM pet;
             DELETE FROM session_history;
             DELETE FROM evolutions;",
        )?;
        tx.commit()?;
        Ok(())
    }

    // ── History ──────────────────────────────────────────────────────

    /// Append a finished session to the history.
    pub fn record_session(&self, result: &SessionResult) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO session_history
                (session_id, session_duration, elapsed, points_awarded, outcome, multiplier, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.session_id.to_string(),
                result.session_duration,
                i64::try_from(result.elapsed_minutes()).unwrap_or(i64::MAX),
                result.points_awarded,
                result.outcome.as_str(),
                result.multiplier,
                result.created_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn record_evolution(&self, record: &EvolutionRecord) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO evolutions (from_stage, to_stage, points_at_evolution, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.from_stage.ordinal(),
                record.to_stage.ordinal(),
                record.points_at_evolution,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn session_history(&self, limit: usize) -> Result<Vec<SessionHistoryEntry>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, session_duration, elapsed, points_awarded, outcome, multiplier, created_at
             FROM session_history
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(
            params![i64::try_from(limit).unwrap_or(i64::MAX)],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, session_id, session_duration, elapsed, points_awarded, outcome, multiplier, created_at) =
                row?;
            entries.push(SessionHistoryEntry {
                id,
                session_id,
                session_duration,
                elapsed: u64::try_from(elapsed).unwrap_or(0),
                points_awarded,
                outcome: outcome.parse().map_err(|message| DatabaseError::Corrupt {
                    table: "session_history".into(),
                    message,
                })?,
                multiplier,
                created_at: parse_timestamp("session_history", &created_at)?,
            });
        }
        Ok(entries)
    }

    /// Oldest first.
    pub fn evolutions(&self) -> Result<Vec<EvolutionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT from_stage, to_stage, points_at_evolution, created_at
             FROM evolutions ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, u8>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (from, to, points_at_evolution, created_at) = row?;
            let stage = |ordinal: u8| {
                Stage::from_ordinal(ordinal).ok_or_else(|| DatabaseError::Corrupt {
                    table: "evolutions".into(),
                    message: format!("unknown stage {ordinal}"),
                })
            };
            records.push(EvolutionRecord {
                from_stage: stage(from)?,
                to_stage: stage(to)?,
                points_at_evolution,
                timestamp: parse_timestamp("evolutions", &created_at)?,
            });
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<Stats, DatabaseError> {
        self.stats_on(Utc::now().date_naive())
    }

    /// Stats with `today` as the reference day for the streak and the
    /// today/week totals.
    pub fn stats_on(&self, today: NaiveDate) -> Result<Stats, DatabaseError> {
        let mut stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN outcome != 'cancelled' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN outcome = 'cancelled' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(elapsed), 0),
                    COALESCE(SUM(points_awarded), 0)
             FROM session_history",
            [],
            |row| {
                Ok(Stats {
                    total_sessions: row.get(0)?,
                    completed_sessions: row.get(1)?,
                    cancelled_sessions: row.get(2)?,
                    minutes_studied: row.get(3)?,
                    points_awarded: row.get(4)?,
                    ..Stats::default()
                })
            },
        )?;
        stats.evolutions = self
            .conn
            .query_row("SELECT COUNT(*) FROM evolutions", [], |row| row.get(0))?;

        let week_start = today.checked_sub_days(Days::new(6)).unwrap_or(today);
        (stats.today_minutes, stats.week_minutes) = self.conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN date(created_at) = ?1 THEN elapsed ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN date(created_at) BETWEEN ?2 AND ?1 THEN elapsed ELSE 0 END), 0)
             FROM session_history",
            params![today.to_string(), week_start.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.streak_days = self.streak_on(today)?;
        if stats.total_sessions > 0 {
            stats.avg_session_minutes = stats.minutes_studied as f64 / stats.total_sessions as f64;
        }
        Ok(stats)
    }

    /// Days with at least one studied minute, walked back from `today`.
    /// A streak survives until a full day is missed.
    fn streak_on(&self, today: NaiveDate) -> Result<u32, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date(created_at) FROM session_history
             WHERE elapsed > 0
             ORDER BY 1 DESC",
        )?;
        let days = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let yesterday = today.pred_opt();
        let mut streak = 0;
        let mut cursor = today;
        for raw in days {
            let raw = raw?;
            let day = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                DatabaseError::Corrupt {
                    table: "session_history".into(),
                    message: format!("bad day '{raw}': {e}"),
                }
            })?;
            if day > cursor {
                continue;
            }
            if day != cursor && !(streak == 0 && Some(day) == yesterday) {
                break;
            }
            streak += 1;
            match day.pred_opt() {
                Some(prev) => cursor = prev,
                None => break,
            }
        }
        Ok(streak)
    }

    // ── kv ───────────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn parse_timestamp(table: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt {
            table: table.to_string(),
            message: format!("bad timestamp '{raw}': {e}"),
        })
}

/// Persists the pet and its history as sessions finish.
impl ProgressObserver for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn on_event(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.kv_set(LAST_EVENT_KEY, &serde_json::to_string(event)?)?;
        Ok(())
    }

    fn on_session_result(
        &self,
        result: &SessionResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let tx = self.conn.unchecked_transaction()?;
        self.save_pet(&result.pet)?;
        let row = self.record_session(result)?;
        tx.commit()?;
        debug!(row, session = %result.session_id, "session persisted");
        Ok(())
    }

    fn on_evolution(
        &self,
        record: &EvolutionRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.record_evolution(record)?;
        Ok(())
    }
}
