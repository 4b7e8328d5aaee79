use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::dispatch::{EventKind, GsiEvent};
use crate::error::GsiError;

pub(crate) const REPLAY_SUMMARY_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_MAX_BUFFERED_KILLS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEventRecord {
    pub line_number: u64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub ct: u32,
    pub t: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub total_lines: u64,
    pub snapshots: u64,
    pub incomplete_snapshots: u64,
    pub rejected_lines: u64,
    pub kill_records: u64,
    pub unresolved_kills: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<FinalScore>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub event_counts: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ReplayEventRecord>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub events_dropped_count: u64,
    pub generated_at: String,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Collects what a replay emitted. Structural events (round, match, bomb)
/// are always kept; kills are capped with the oldest dropped first.
#[derive(Debug)]
pub(crate) struct ReplayRecorder {
    pub(crate) current_line: u64,
    pub(crate) total_lines: u64,
    pub(crate) snapshots: u64,
    pub(crate) incomplete_snapshots: u64,
    pub(crate) rejected_lines: u64,
    pub(crate) kill_records: u64,
    pub(crate) unresolved_kills: u64,
    max_buffered_kills: usize,
    map_name: Option<String>,
    final_score: Option<FinalScore>,
    event_counts: BTreeMap<String, u64>,
    events: Vec<ReplayEventRecord>,
    events_dropped_count: u64,
    kills_in_buffer: usize,
}

impl ReplayRecorder {
    pub(crate) fn new(max_buffered_kills: usize) -> Self {
        Self {
            current_line: 0,
            total_lines: 0,
            snapshots: 0,
            incomplete_snapshots: 0,
            rejected_lines: 0,
            kill_records: 0,
            unresolved_kills: 0,
            max_buffered_kills,
            map_name: None,
            final_score: None,
            event_counts: BTreeMap::new(),
            events: Vec::new(),
            events_dropped_count: 0,
            kills_in_buffer: 0,
        }
    }

    pub(crate) fn record_event(&mut self, event: &GsiEvent<'_>) {
        let kind = event.kind();
        *self
            .event_counts
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;

        let mut record = ReplayEventRecord {
            line_number: self.current_line,
            event_type: kind.as_str().to_string(),
            map_name: self.map_name.clone(),
            round: None,
            source: None,
            target: None,
        };

        match event {
            GsiEvent::Data(state) => {
                self.map_name = Some(state.map.name.clone());
                self.final_score = Some(FinalScore {
                    ct: state.map.team_ct.score,
                    t: state.map.team_t.score,
                });
                return;
            }
            GsiEvent::RoundEnd(score) | GsiEvent::MatchEnd(score) => {
                record.map_name = Some(score.map.name.clone());
                record.round = Some(score.map.round);
                record.source = Some(score.winner.name.clone());
                record.target = Some(score.loser.name.clone());
            }
            GsiEvent::BombPlantStart(player)
            | GsiEvent::BombPlant(player)
            | GsiEvent::BombDefuse(player)
            | GsiEvent::DefuseStart(player)
            | GsiEvent::DefuseStop(player) => {
                record.source = player.as_ref().map(|player| player.name.clone());
            }
            GsiEvent::BombExplode => {}
            GsiEvent::Kill(kill) => {
                record.source = Some(kill.killer.name.clone());
                record.target = Some(kill.victim.name.clone());
            }
        }

        self.push_event_with_cap(record);
    }

    fn push_event_with_cap(&mut self, record: ReplayEventRecord) {
        if !is_high_volume_event_type(&record.event_type) {
            self.events.push(record);
            return;
        }

        if self.kills_in_buffer >= self.max_buffered_kills && !self.trim_oldest_kill() {
            self.events_dropped_count = self.events_dropped_count.saturating_add(1);
            return;
        }

        self.events.push(record);
        self.kills_in_buffer = self.kills_in_buffer.saturating_add(1);
    }

    fn trim_oldest_kill(&mut self) -> bool {
        let Some(oldest_kill_index) = self
            .events
            .iter()
            .position(|event| is_high_volume_event_type(&event.event_type))
        else {
            return false;
        };

        self.events.remove(oldest_kill_index);
        self.kills_in_buffer = self.kills_in_buffer.saturating_sub(1);
        self.events_dropped_count = self.events_dropped_count.saturating_add(1);
        true
    }

    pub(crate) fn snapshot(&self, source_file: Option<&Path>) -> ReplaySummary {
        ReplaySummary {
            schema_version: REPLAY_SUMMARY_SCHEMA_VERSION,
            source_file: source_file.map(|path| path.to_string_lossy().to_string()),
            total_lines: self.total_lines,
            snapshots: self.snapshots,
            incomplete_snapshots: self.incomplete_snapshots,
            rejected_lines: self.rejected_lines,
            kill_records: self.kill_records,
            unresolved_kills: self.unresolved_kills,
            map_name: self.map_name.clone(),
            final_score: self.final_score,
            event_counts: self.event_counts.clone(),
            events: self.events.clone(),
            events_dropped_count: self.events_dropped_count,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn is_high_volume_event_type(event_type: &str) -> bool {
    event_type == EventKind::Kill.as_str()
}

/// `match.ndjson` becomes `match.summary.json`; the capture's own extension is replaced.
pub fn summary_sidecar_path(input_path: &Path) -> PathBuf {
    input_path.with_extension("summary.json")
}

pub fn read_replay_summary(sidecar_path: &Path) -> Result<Option<ReplaySummary>, GsiError> {
    let raw_json = match std::fs::read_to_string(sidecar_path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(GsiError::io(sidecar_path, error)),
    };

    Ok(Some(serde_json::from_str::<ReplaySummary>(&raw_json)?))
}

/// Writes via a temporary file and a rename so readers never see a partial sidecar.
pub fn write_replay_summary(sidecar_path: &Path, summary: &ReplaySummary) -> Result<(), GsiError> {
    if let Some(parent_directory) = sidecar_path.parent() {
        if !parent_directory.as_os_str().is_empty() {
            std::fs::create_dir_all(parent_directory)
                .map_err(|error| GsiError::io(parent_directory, error))?;
        }
    }

    let temp_path = temporary_sidecar_path(sidecar_path);
    let serialized = serde_json::to_string_pretty(summary)?;
    std::fs::write(&temp_path, serialized).map_err(|error| GsiError::io(&temp_path, error))?;

    if sidecar_path.exists() {
        std::fs::remove_file(sidecar_path).map_err(|error| GsiError::io(sidecar_path, error))?;
    }

    if let Err(error) = std::fs::rename(&temp_path, sidecar_path) {
        if let Err(cleanup_error) = std::fs::remove_file(&temp_path) {
            tracing::warn!(
                temp_path = %temp_path.display(),
                cleanup_error = %cleanup_error,
                "Failed to remove temporary summary sidecar"
            );
        }
        return Err(GsiError::io(sidecar_path, error));
    }

    Ok(())
}

fn temporary_sidecar_path(sidecar_path: &Path) -> PathBuf {
    let Some(file_name) = sidecar_path.file_name().and_then(|value| value.to_str()) else {
        return sidecar_path.with_extension("summary.json.tmp");
    };

    sidecar_path.with_file_name(format!("{file_name}.tmp"))
}
