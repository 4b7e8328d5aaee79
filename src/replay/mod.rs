//! Offline replay of recorded telemetry, one JSON payload per line.

mod summary;

use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::EventKind;
use crate::engine::GsiEngine;
use crate::error::GsiError;
use crate::raw::{RawKill, RawSnapshot};

pub use summary::{
    read_replay_summary, summary_sidecar_path, write_replay_summary, FinalScore,
    ReplayEventRecord, ReplaySummary, DEFAULT_MAX_BUFFERED_KILLS,
};
use summary::ReplayRecorder;

const EVENT_KINDS: [EventKind; 10] = [
    EventKind::Data,
    EventKind::RoundEnd,
    EventKind::MatchEnd,
    EventKind::BombPlantStart,
    EventKind::BombPlant,
    EventKind::BombExplode,
    EventKind::BombDefuse,
    EventKind::DefuseStart,
    EventKind::DefuseStop,
    EventKind::Kill,
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplaySettings {
    pub max_buffered_kills: usize,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            max_buffered_kills: DEFAULT_MAX_BUFFERED_KILLS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    Snapshot,
    Incomplete,
    Kill,
    UnresolvedKill,
    Rejected,
}

/// Drives an engine from recorded lines and keeps a summary of what it emitted.
pub struct ReplaySession {
    engine: GsiEngine,
    recorder: Arc<Mutex<ReplayRecorder>>,
}

// A listener that panicked mid-record leaves counters that are still usable.
fn lock_recorder(recorder: &Mutex<ReplayRecorder>) -> MutexGuard<'_, ReplayRecorder> {
    recorder.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ReplaySession {
    pub fn new(mut engine: GsiEngine, settings: &ReplaySettings) -> Self {
        let recorder = Arc::new(Mutex::new(ReplayRecorder::new(
            settings.max_buffered_kills,
        )));

        for kind in EVENT_KINDS {
            let recorder = Arc::clone(&recorder);
            engine.on(kind, move |event| {
                lock_recorder(&recorder).record_event(event);
                Ok(())
            });
        }

        Self { engine, recorder }
    }

    /// Gives access to the engine, e.g. to register extra listeners.
    pub fn engine_mut(&mut self) -> &mut GsiEngine {
        &mut self.engine
    }

    pub fn consume_line(&mut self, line: &str) -> LineOutcome {
        {
            let mut recorder = lock_recorder(&self.recorder);
            recorder.total_lines += 1;
            recorder.current_line = recorder.total_lines;
        }

        if line.trim().is_empty() {
            return LineOutcome::Blank;
        }

        // Listeners lock the recorder while the engine digests the line.
        let outcome = self.digest_line(line);

        let mut recorder = lock_recorder(&self.recorder);
        match outcome {
            LineOutcome::Snapshot => recorder.snapshots += 1,
            LineOutcome::Incomplete => recorder.incomplete_snapshots += 1,
            LineOutcome::Kill => recorder.kill_records += 1,
            LineOutcome::UnresolvedKill => {
                recorder.kill_records += 1;
                recorder.unresolved_kills += 1;
            }
            LineOutcome::Rejected => recorder.rejected_lines += 1,
            LineOutcome::Blank => {}
        }
        outcome
    }

    fn digest_line(&mut self, line: &str) -> LineOutcome {
        let payload = match serde_json::from_str::<Value>(line) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(decode_error = %error, "Skipping line that is not JSON");
                return LineOutcome::Rejected;
            }
        };

        if payload.get("keys").is_some() {
            return match serde_json::from_value::<RawKill>(payload) {
                Ok(raw_kill) => match self.engine.digest_kill(&raw_kill) {
                    Some(_) => LineOutcome::Kill,
                    None => LineOutcome::UnresolvedKill,
                },
                Err(error) => {
                    tracing::warn!(decode_error = %error, "Skipping undecodable kill record");
                    LineOutcome::Rejected
                }
            };
        }

        // Decoded from the text so the roster keeps its payload order.
        let raw_snapshot = match RawSnapshot::from_json(line) {
            Ok(raw_snapshot) => raw_snapshot,
            Err(error) => {
                tracing::warn!(decode_error = %error, "Skipping undecodable snapshot");
                return LineOutcome::Rejected;
            }
        };

        match self.engine.digest(&raw_snapshot) {
            Ok(Some(_)) => LineOutcome::Snapshot,
            Ok(None) => LineOutcome::Incomplete,
            Err(error) => {
                tracing::warn!(digest_error = %error, "Rejected snapshot");
                LineOutcome::Rejected
            }
        }
    }

    /// Consumes every line of `reader`. Only read failures are errors.
    pub fn replay<R: BufRead>(&mut self, reader: R, source: &Path) -> Result<(), GsiError> {
        for line_result in reader.lines() {
            let line = line_result.map_err(|error| GsiError::io(source, error))?;
            self.consume_line(&line);
        }
        Ok(())
    }

    pub fn summary(&self, source_file: Option<&Path>) -> ReplaySummary {
        lock_recorder(&self.recorder).snapshot(source_file)
    }
}
