use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GsiError;

/// Branding supplied by the host for the team shown on one side of the layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamExtension {
    pub id: String,
    pub name: String,
    pub country: Option<String>,
    pub logo: Option<String>,
    /// Series score; overrides the wire value when non-zero.
    pub map_score: u32,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerExtension {
    pub id: String,
    pub name: String,
    pub steamid: String,
    #[serde(rename = "realName", alias = "real_name")]
    pub real_name: Option<String>,
    pub country: Option<String>,
    pub avatar: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// Team extensions keyed by layout slot rather than by in-game side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideExtensions {
    pub left: Option<TeamExtension>,
    pub right: Option<TeamExtension>,
}

impl SideExtensions {
    /// Splits the slots into `(ct, t)` extensions for the resolved orientation.
    pub fn by_side(&self, ct_on_left: bool) -> (Option<&TeamExtension>, Option<&TeamExtension>) {
        if ct_on_left {
            (self.left.as_ref(), self.right.as_ref())
        } else {
            (self.right.as_ref(), self.left.as_ref())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentityFile {
    teams: SideExtensions,
    players: Vec<PlayerExtension>,
}

/// Read-only lookup of host-owned identity metadata.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    teams: SideExtensions,
    players: HashMap<String, PlayerExtension>,
}

impl IdentityRegistry {
    pub fn new(teams: SideExtensions, players: Vec<PlayerExtension>) -> Self {
        let mut registry = Self {
            teams,
            players: HashMap::new(),
        };
        registry.set_players(players);
        registry
    }

    pub fn from_json_str(raw_json: &str) -> Result<Self, serde_json::Error> {
        let file = serde_json::from_str::<IdentityFile>(raw_json)?;
        Ok(Self::new(file.teams, file.players))
    }

    pub fn load(path: &Path) -> Result<Self, GsiError> {
        let raw_json = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(GsiError::Identity {
                    path: path.to_path_buf(),
                    reason: "file not found".to_string(),
                });
            }
            Err(error) => return Err(GsiError::io(path, error)),
        };

        let registry = Self::from_json_str(&raw_json).map_err(|error| GsiError::Identity {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        tracing::debug!(
            identity_path = %path.display(),
            player_count = registry.players.len(),
            has_left_team = registry.teams.left.is_some(),
            has_right_team = registry.teams.right.is_some(),
            "Loaded identity registry"
        );
        Ok(registry)
    }

    pub fn teams(&self) -> &SideExtensions {
        &self.teams
    }

    pub fn set_teams(&mut self, teams: SideExtensions) {
        self.teams = teams;
    }

    /// Replaces all player extensions. Later entries win on duplicate steamids.
    pub fn set_players(&mut self, players: Vec<PlayerExtension>) {
        self.players = players
            .into_iter()
            .map(|extension| (extension.steamid.clone(), extension))
            .collect();
    }

    pub fn player(&self, steamid: &str) -> Option<&PlayerExtension> {
        self.players.get(steamid)
    }
}
