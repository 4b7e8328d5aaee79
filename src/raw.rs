//! Wire-level game-state-integration payloads.
//!
//! Every section is optional and most scalars are tolerated in either string
//! or numeric encoding. Nothing here is validated beyond what serde needs to
//! build the records; the normalizer decides what a usable snapshot is.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{BombState, MapPhase, RoundBombState, RoundPhase};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSnapshot {
    pub provider: Option<Provider>,
    pub map: Option<RawMap>,
    pub round: Option<RawRound>,
    pub player: Option<RawObservedPlayer>,
    pub allplayers: Option<RawRoster>,
    pub bomb: Option<RawBomb>,
    #[serde(default)]
    pub grenades: BTreeMap<String, Grenade>,
    pub phase_countdowns: Option<RawPhaseCountdowns>,
    pub auth: Option<Auth>,
}

impl RawSnapshot {
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub name: String,
    pub appid: u32,
    pub version: u32,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub steamid: String,
    pub timestamp: u64,
}

/// Whatever keys the host's integration config declares under `auth`.
pub type Auth = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMap {
    pub mode: Option<String>,
    pub name: String,
    pub phase: MapPhase,
    pub round: u32,
    pub team_ct: RawTeam,
    pub team_t: RawTeam,
    pub num_matches_to_win_series: u32,
    pub current_spectators: u32,
    pub souvenirs_total: u32,
    pub round_wins: Option<BTreeMap<u32, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTeam {
    pub score: u32,
    pub consecutive_round_losses: u32,
    pub timeouts_remaining: u32,
    pub matches_won_this_series: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRound {
    pub phase: RoundPhase,
    pub bomb: Option<RoundBombState>,
    pub win_team: Option<String>,
}

/// The player the snapshot is being produced for (spectated or local).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawObservedPlayer {
    #[serde(deserialize_with = "lenient::string")]
    pub steamid: Option<String>,
    pub name: Option<String>,
}

/// Roster entries keyed by steamid, in the order the payload lists them.
///
/// A repeated steamid keeps its first position and takes the later entry.
#[derive(Debug, Clone, Default)]
pub struct RawRoster(pub Vec<(String, RawPlayer)>);

impl RawRoster {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawPlayer)> {
        self.0
            .iter()
            .map(|(steamid, player)| (steamid.as_str(), player))
    }

    pub fn players(&self) -> impl Iterator<Item = &RawPlayer> {
        self.0.iter().map(|(_, player)| player)
    }

    pub fn get(&self, steamid: &str) -> Option<&RawPlayer> {
        self.iter()
            .find(|(entry_steamid, _)| *entry_steamid == steamid)
            .map(|(_, player)| player)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for RawRoster {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RosterVisitor;

        impl<'de> Visitor<'de> for RosterVisitor {
            type Value = RawRoster;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a roster object keyed by steamid")
            }

            fn visit_map<A>(self, mut access: A) -> Result<RawRoster, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, RawPlayer)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((steamid, player)) = access.next_entry::<String, RawPlayer>()? {
                    match entries.iter_mut().find(|(existing, _)| *existing == steamid) {
                        Some(entry) => entry.1 = player,
                        None => entries.push((steamid, player)),
                    }
                }
                Ok(RawRoster(entries))
            }
        }

        deserializer.deserialize_map(RosterVisitor)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPlayer {
    pub name: String,
    pub observer_slot: Option<u8>,
    pub team: Option<String>,
    pub activity: Option<String>,
    pub match_stats: MatchStats,
    pub weapons: BTreeMap<String, Weapon>,
    pub state: RawPlayerState,
    #[serde(deserialize_with = "lenient::string")]
    pub spectarget: Option<String>,
    pub position: Option<String>,
    pub forward: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchStats {
    pub kills: i32,
    pub assists: i32,
    pub deaths: i32,
    pub mvps: i32,
    pub score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    pub name: String,
    pub paintkit: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ammo_clip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ammo_clip_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ammo_reserve: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPlayerState {
    pub health: u32,
    pub armor: u32,
    pub helmet: bool,
    pub defusekit: Option<bool>,
    pub flashed: u32,
    pub smoked: Option<u32>,
    pub burning: u32,
    pub money: u32,
    pub round_kills: u32,
    pub round_killhs: u32,
    pub round_totaldmg: Option<u32>,
    pub equip_value: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBomb {
    pub state: BombState,
    #[serde(deserialize_with = "lenient::number")]
    pub countdown: Option<f64>,
    pub position: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub player: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grenade {
    #[serde(deserialize_with = "lenient::string")]
    pub owner: Option<String>,
    pub position: Option<String>,
    pub velocity: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub lifetime: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub effecttime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flames: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPhaseCountdowns {
    pub phase: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub phase_ends_in: Option<f64>,
}

/// A `player_death` record relayed from the kill feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawKill {
    pub keys: RawKillKeys,
}

impl RawKill {
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawKillKeys {
    pub attacker: RawKillActor,
    pub userid: RawKillActor,
    pub assister: RawKillActor,
    pub assistedflash: bool,
    pub headshot: bool,
    pub weapon: String,
    pub penetrated: u32,
    pub attackerblind: bool,
    pub thrusmoke: bool,
    pub noscope: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawKillActor {
    #[serde(deserialize_with = "lenient::string")]
    pub xuid: Option<String>,
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(text)) => Some(text),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        })
    }

    pub(super) fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string(deserializer)?.unwrap_or_default())
    }

    pub(super) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => match text.trim().parse::<f64>() {
                Ok(parsed) => Some(parsed),
                Err(error) => {
                    tracing::debug!(raw_value = %text, parse_error = %error, "Ignoring unparseable countdown");
                    None
                }
            },
            _ => None,
        })
    }
}
