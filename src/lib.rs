mod dispatch;
mod engine;
mod error;
mod identity;
mod kill_feed;
mod model;
mod normalize;
mod raw;
pub mod replay;
mod site;
mod transitions;
mod vector;

pub use dispatch::{EventDispatcher, EventKind, GsiEvent, Listener, ListenerId};
pub use engine::GsiEngine;
pub use error::GsiError;
pub use identity::{IdentityRegistry, PlayerExtension, SideExtensions, TeamExtension};
pub use kill_feed::normalize_kill;
pub use model::{
    Bomb, BombState, GameState, KillEvent, MapPhase, MapState, Orientation, PhaseCountdowns,
    Player, PlayerState, RoundBombState, RoundPhase, RoundSummary, Score, Side, Team,
};
pub use normalize::{is_ct_on_left, normalize};
pub use raw::{
    Auth, Grenade, MatchStats, Provider, RawBomb, RawKill, RawKillActor, RawKillKeys, RawMap,
    RawObservedPlayer, RawPhaseCountdowns, RawPlayer, RawPlayerState, RawRoster, RawRound,
    RawSnapshot, RawTeam, Weapon,
};
pub use site::{resolve_site, Site};
pub use transitions::derive_events;
pub use vector::{parse_vector, Vec3};
