use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::raw::{Auth, Grenade, MatchStats, Provider, Weapon};
use crate::site::Site;
use crate::vector::Vec3;

pub(crate) const CT_DEFAULT_NAME: &str = "Counter-Terrorists";
pub(crate) const T_DEFAULT_NAME: &str = "Terrorists";
pub(crate) const MAP_MODE: &str = "competitive";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    CT,
    T,
}

impl Side {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "CT" => Some(Self::CT),
            "T" => Some(Self::T),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapPhase {
    Warmup,
    Live,
    Intermission,
    Gameover,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Freezetime,
    Live,
    Over,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Bomb sub-state as reported inside the round block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundBombState {
    Planted,
    Exploded,
    Defused,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BombState {
    Carried,
    Planting,
    Planted,
    Defusing,
    Defused,
    Exploded,
    Dropped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl BombState {
    /// States in which the bomb sits on (or is being placed on) a site.
    pub fn is_on_site(self) -> bool {
        matches!(
            self,
            Self::Planting | Self::Planted | Self::Defusing | Self::Defused
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub score: u32,
    pub logo: Option<String>,
    pub consecutive_round_losses: u32,
    pub timeouts_remaining: u32,
    pub matches_won_this_series: u32,
    pub side: Side,
    pub name: String,
    pub country: Option<String>,
    pub id: Option<String>,
    pub orientation: Orientation,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub health: u32,
    pub armor: u32,
    pub helmet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defusekit: Option<bool>,
    pub flashed: u32,
    pub smoked: u32,
    pub burning: u32,
    pub money: u32,
    pub round_kills: u32,
    pub round_killhs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_totaldmg: Option<u32>,
    pub equip_value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub steamid: String,
    pub name: String,
    pub observer_slot: Option<u8>,
    pub activity: Option<String>,
    pub stats: MatchStats,
    pub weapons: BTreeMap<String, Weapon>,
    pub state: PlayerState,
    pub spectarget: Option<String>,
    pub position: Vec3,
    pub forward: Vec3,
    /// Shared with the map summary; the player does not own its team.
    pub team: Arc<Team>,
    pub avatar: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "realName")]
    pub real_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bomb {
    pub state: BombState,
    pub countdown: Option<f64>,
    pub position: Vec3,
    pub player: Option<Player>,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    pub phase: RoundPhase,
    pub bomb: Option<RoundBombState>,
    pub win_team: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCountdowns {
    pub phase: Option<String>,
    pub phase_ends_in: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapState {
    pub mode: String,
    pub name: String,
    pub phase: MapPhase,
    pub round: u32,
    pub team_ct: Arc<Team>,
    pub team_t: Arc<Team>,
    pub num_matches_to_win_series: u32,
    pub current_spectators: u32,
    pub souvenirs_total: u32,
    pub round_wins: BTreeMap<u32, String>,
}

impl MapState {
    pub fn team(&self, side: Side) -> &Arc<Team> {
        match side {
            Side::CT => &self.team_ct,
            Side::T => &self.team_t,
        }
    }
}

/// Normalized view of one snapshot. Built whole or not at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameState {
    pub provider: Option<Provider>,
    pub round: Option<RoundSummary>,
    /// Roster entry for the player the snapshot was produced for.
    pub player: Option<Player>,
    pub players: Vec<Player>,
    pub bomb: Option<Bomb>,
    pub grenades: BTreeMap<String, Grenade>,
    pub phase_countdowns: PhaseCountdowns,
    pub auth: Option<Auth>,
    pub map: MapState,
}

impl GameState {
    pub fn find_player(&self, steamid: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.steamid == steamid)
    }
}

/// Payload of `roundEnd` and `matchEnd`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub winner: Arc<Team>,
    pub loser: Arc<Team>,
    pub map: MapState,
    #[serde(rename = "mapEnd")]
    pub map_end: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillEvent {
    pub killer: Player,
    pub victim: Player,
    pub assister: Option<Player>,
    pub flashed: bool,
    pub headshot: bool,
    pub weapon: String,
    pub wallbang: bool,
    pub attackerblind: bool,
    pub thrusmoke: bool,
    pub noscope: bool,
}
