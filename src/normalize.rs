use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::GsiError;
use crate::identity::{IdentityRegistry, PlayerExtension, TeamExtension};
use crate::model::{
    Bomb, GameState, MapState, Orientation, PhaseCountdowns, Player, PlayerState, RoundSummary,
    Side, Team, CT_DEFAULT_NAME, MAP_MODE, T_DEFAULT_NAME,
};
use crate::raw::{RawBomb, RawPlayer, RawPlayerState, RawSnapshot, RawTeam};
use crate::site::resolve_site;
use crate::vector::parse_required_vector;

/// Observer slots 2..=5 form the window used to guess which side is on the left.
const LEFT_SLOT_WINDOW_START: u8 = 1;
const LEFT_SLOT_WINDOW_END: u8 = 5;
const LEFT_MAJORITY: usize = 2;

/// Builds the canonical state for one snapshot.
///
/// Returns `Ok(None)` when the roster, map or phase countdown block is
/// missing. A malformed position/forward vector aborts the whole snapshot.
pub fn normalize(
    raw: &RawSnapshot,
    registry: &IdentityRegistry,
) -> Result<Option<GameState>, GsiError> {
    let (Some(roster), Some(raw_map), Some(raw_countdowns)) = (
        raw.allplayers.as_ref(),
        raw.map.as_ref(),
        raw.phase_countdowns.as_ref(),
    ) else {
        tracing::debug!(
            has_roster = raw.allplayers.is_some(),
            has_map = raw.map.is_some(),
            has_phase_countdowns = raw.phase_countdowns.is_some(),
            "Skipping incomplete snapshot"
        );
        return Ok(None);
    };

    let ct_on_left = is_ct_on_left(roster.players());
    let (ct_extension, t_extension) = registry.teams().by_side(ct_on_left);
    let (ct_orientation, t_orientation) = if ct_on_left {
        (Orientation::Left, Orientation::Right)
    } else {
        (Orientation::Right, Orientation::Left)
    };

    let team_ct = Arc::new(build_team(
        Side::CT,
        &raw_map.team_ct,
        ct_extension,
        ct_orientation,
    ));
    let team_t = Arc::new(build_team(
        Side::T,
        &raw_map.team_t,
        t_extension,
        t_orientation,
    ));

    let players = roster
        .iter()
        .map(|(steamid, raw_player)| {
            let team = if raw_player.team.as_deref() == Some("CT") {
                &team_ct
            } else {
                &team_t
            };
            normalize_player(steamid, raw_player, team, registry.player(steamid))
        })
        .collect::<Result<Vec<Player>, GsiError>>()?;

    let observed = raw
        .player
        .as_ref()
        .and_then(|observed| observed.steamid.as_deref())
        .and_then(|steamid| players.iter().find(|player| player.steamid == steamid))
        .cloned();

    let bomb = raw
        .bomb
        .as_ref()
        .map(|raw_bomb| normalize_bomb(raw_bomb, &raw_map.name, &players))
        .transpose()?;

    Ok(Some(GameState {
        provider: raw.provider.clone(),
        round: raw.round.as_ref().map(|round| RoundSummary {
            phase: round.phase,
            bomb: round.bomb,
            win_team: round.win_team.as_deref().and_then(Side::from_wire),
        }),
        player: observed,
        players,
        bomb,
        grenades: raw.grenades.clone(),
        phase_countdowns: PhaseCountdowns {
            phase: raw_countdowns.phase.clone(),
            phase_ends_in: raw_countdowns.phase_ends_in,
        },
        auth: raw.auth.clone(),
        map: MapState {
            mode: MAP_MODE.to_string(),
            name: raw_map.name.clone(),
            phase: raw_map.phase,
            round: raw_map.round,
            team_ct,
            team_t,
            num_matches_to_win_series: raw_map.num_matches_to_win_series,
            current_spectators: raw_map.current_spectators,
            souvenirs_total: raw_map.souvenirs_total,
            round_wins: raw_map.round_wins.clone().unwrap_or_default(),
        },
    }))
}

/// CT goes on the left when more than two CT players sit in observer slots 2..=5.
pub fn is_ct_on_left<'a>(roster: impl IntoIterator<Item = &'a RawPlayer>) -> bool {
    let ct_in_window = roster
        .into_iter()
        .filter(|player| player.team.as_deref() == Some("CT"))
        .filter(|player| {
            player
                .observer_slot
                .is_some_and(|slot| slot > LEFT_SLOT_WINDOW_START && slot <= LEFT_SLOT_WINDOW_END)
        })
        .count();

    ct_in_window > LEFT_MAJORITY
}

fn build_team(
    side: Side,
    raw_team: &RawTeam,
    extension: Option<&TeamExtension>,
    orientation: Orientation,
) -> Team {
    let default_name = match side {
        Side::CT => CT_DEFAULT_NAME,
        Side::T => T_DEFAULT_NAME,
    };

    Team {
        score: raw_team.score,
        logo: extension.and_then(|extension| non_empty(extension.logo.as_ref())),
        consecutive_round_losses: raw_team.consecutive_round_losses,
        timeouts_remaining: raw_team.timeouts_remaining,
        matches_won_this_series: extension
            .map(|extension| extension.map_score)
            .filter(|map_score| *map_score > 0)
            .unwrap_or(raw_team.matches_won_this_series),
        side,
        name: extension
            .and_then(|extension| non_empty(Some(&extension.name)))
            .unwrap_or_else(|| default_name.to_string()),
        country: extension.and_then(|extension| non_empty(extension.country.as_ref())),
        id: extension.and_then(|extension| non_empty(Some(&extension.id))),
        orientation,
        extra: extension
            .map(|extension| extension.extra.clone())
            .unwrap_or_else(BTreeMap::new),
    }
}

fn normalize_player(
    steamid: &str,
    raw_player: &RawPlayer,
    team: &Arc<Team>,
    extension: Option<&PlayerExtension>,
) -> Result<Player, GsiError> {
    let position = parse_required_vector("position", raw_player.position.as_deref())?;
    let forward = parse_required_vector("forward", raw_player.forward.as_deref())?;

    Ok(Player {
        steamid: steamid.to_string(),
        name: extension
            .and_then(|extension| non_empty(Some(&extension.name)))
            .unwrap_or_else(|| raw_player.name.clone()),
        observer_slot: raw_player.observer_slot,
        activity: raw_player.activity.clone(),
        stats: raw_player.match_stats.clone(),
        weapons: raw_player.weapons.clone(),
        state: normalize_player_state(&raw_player.state),
        spectarget: raw_player.spectarget.clone(),
        position,
        forward,
        team: Arc::clone(team),
        avatar: extension.and_then(|extension| non_empty(extension.avatar.as_ref())),
        country: extension.and_then(|extension| non_empty(extension.country.as_ref())),
        real_name: extension.and_then(|extension| non_empty(extension.real_name.as_ref())),
    })
}

fn normalize_player_state(raw_state: &RawPlayerState) -> PlayerState {
    PlayerState {
        health: raw_state.health,
        armor: raw_state.armor,
        helmet: raw_state.helmet,
        defusekit: raw_state.defusekit,
        flashed: raw_state.flashed,
        smoked: raw_state.smoked.unwrap_or(0),
        burning: raw_state.burning,
        money: raw_state.money,
        round_kills: raw_state.round_kills,
        round_killhs: raw_state.round_killhs,
        round_totaldmg: raw_state.round_totaldmg,
        equip_value: raw_state.equip_value,
    }
}

fn normalize_bomb(raw_bomb: &RawBomb, map_name: &str, players: &[Player]) -> Result<Bomb, GsiError> {
    let position = parse_required_vector("bomb.position", raw_bomb.position.as_deref())?;
    let holder = raw_bomb
        .player
        .as_deref()
        .and_then(|steamid| players.iter().find(|player| player.steamid == steamid))
        .cloned();
    let site = if raw_bomb.state.is_on_site() {
        resolve_site(map_name, &position)
    } else {
        None
    };

    Ok(Bomb {
        state: raw_bomb.state,
        countdown: raw_bomb.countdown,
        position,
        player: holder,
        site,
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|text| !text.is_empty()).cloned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{is_ct_on_left, normalize};
    use crate::identity::{IdentityRegistry, PlayerExtension, SideExtensions, TeamExtension};
    use crate::model::{BombState, MapPhase, Orientation, RoundBombState, RoundPhase, Side};
    use crate::raw::{RawPlayer, RawSnapshot};
    use crate::site::Site;
    use serde_json::{json, Value};

    pub(crate) const CT_IDS: [&str; 5] = ["100", "101", "102", "103", "104"];
    pub(crate) const T_IDS: [&str; 5] = ["200", "201", "202", "203", "204"];

    pub(crate) fn roster_entry(side: &str, slot: Option<u8>) -> Value {
        let mut entry = json!({
            "name": format!("{side}-player-{}", slot.unwrap_or(0)),
            "team": side,
            "activity": "playing",
            "match_stats": {"kills": 0, "assists": 0, "deaths": 0, "mvps": 0, "score": 0},
            "weapons": {"weapon_0": {"name": "weapon_knife", "paintkit": "default", "type": "Knife", "state": "holstered"}},
            "state": {"health": 100, "armor": 100, "helmet": true, "flashed": 0, "burning": 0, "money": 800, "round_kills": 0, "round_killhs": 0, "equip_value": 200},
            "position": "10.5, -20, 64",
            "forward": "0, 1, 0"
        });
        if let Some(slot) = slot {
            entry["observer_slot"] = json!(slot);
        }
        entry
    }

    /// Five CT players in slots 1..=5 and five T players in 6..=9, 0.
    pub(crate) fn snapshot_json(ct_score: u32, t_score: u32) -> Value {
        let mut allplayers = serde_json::Map::new();
        for (index, steamid) in CT_IDS.iter().enumerate() {
            allplayers.insert(steamid.to_string(), roster_entry("CT", Some(index as u8 + 1)));
        }
        for (index, steamid) in T_IDS.iter().enumerate() {
            allplayers.insert(
                steamid.to_string(),
                roster_entry("T", Some((index as u8 + 6) % 10)),
            );
        }

        json!({
            "provider": {"name": "Counter-Strike: Global Offensive", "appid": 730, "version": 13987, "steamid": "900", "timestamp": 1700000000},
            "map": {
                "mode": "competitive",
                "name": "de_dust2",
                "phase": "live",
                "round": ct_score + t_score,
                "team_ct": {"score": ct_score, "consecutive_round_losses": 0, "timeouts_remaining": 4, "matches_won_this_series": 0},
                "team_t": {"score": t_score, "consecutive_round_losses": 1, "timeouts_remaining": 4, "matches_won_this_series": 0},
                "num_matches_to_win_series": 0,
                "current_spectators": 3,
                "souvenirs_total": 0
            },
            "round": {"phase": "live"},
            "player": {"steamid": CT_IDS[0], "name": "CT-player-1"},
            "allplayers": allplayers,
            "grenades": {},
            "phase_countdowns": {"phase": "live", "phase_ends_in": "95.3"}
        })
    }

    pub(crate) fn with_bomb(mut snapshot: Value, state: &str, holder: Option<&str>) -> Value {
        let mut bomb = json!({"state": state, "countdown": "40.0", "position": "-400, 100, 10"});
        if let Some(holder) = holder {
            bomb["player"] = json!(holder);
        }
        snapshot["bomb"] = bomb;
        snapshot
    }

    pub(crate) fn with_map_phase(mut snapshot: Value, phase: &str) -> Value {
        snapshot["map"]["phase"] = json!(phase);
        snapshot
    }

    pub(crate) fn decode(snapshot: Value) -> RawSnapshot {
        serde_json::from_value(snapshot).expect("Expected fixture snapshot to decode")
    }

    fn decode_player(entry: Value) -> RawPlayer {
        serde_json::from_value(entry).expect("Expected fixture player to decode")
    }

    #[test]
    fn rejects_snapshots_missing_required_sections() {
        let registry = IdentityRegistry::default();
        for section in ["allplayers", "map", "phase_countdowns"] {
            let mut snapshot = snapshot_json(0, 0);
            snapshot
                .as_object_mut()
                .expect("Fixture must be an object")
                .remove(section);

            let normalized = normalize(&decode(snapshot), &registry)
                .expect("Incomplete snapshot must not be an error");
            assert!(normalized.is_none(), "Snapshot without '{section}' should be incomplete");
        }
    }

    #[test]
    fn builds_teams_with_default_names_without_extensions() {
        let state = normalize(&decode(snapshot_json(5, 3)), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        assert_eq!(state.map.team_ct.name, "Counter-Terrorists");
        assert_eq!(state.map.team_t.name, "Terrorists");
        assert_eq!(state.map.team_ct.side, Side::CT);
        assert_eq!(state.map.team_t.side, Side::T);
        assert_eq!(state.map.team_ct.score, 5);
        assert_eq!(state.map.team_t.consecutive_round_losses, 1);
        assert_eq!(state.map.mode, "competitive");
        assert_eq!(state.map.phase, MapPhase::Live);
        assert_eq!(state.players.len(), 10);
        assert!(state.map.team_ct.logo.is_none());
        assert!(state.map.team_ct.extra.is_empty());
        assert_eq!(state.phase_countdowns.phase_ends_in, Some(95.3));
    }

    #[test]
    fn ct_fills_left_slot_window_when_majority_is_ct() {
        let roster = vec![
            decode_player(roster_entry("CT", Some(2))),
            decode_player(roster_entry("CT", Some(3))),
            decode_player(roster_entry("CT", Some(4))),
            decode_player(roster_entry("T", Some(5))),
            decode_player(roster_entry("T", None)),
        ];

        assert!(is_ct_on_left(roster.iter()));
    }

    #[test]
    fn slot_one_does_not_count_towards_left_window() {
        let roster = vec![
            decode_player(roster_entry("CT", Some(1))),
            decode_player(roster_entry("CT", Some(2))),
            decode_player(roster_entry("CT", Some(3))),
            decode_player(roster_entry("CT", Some(6))),
        ];

        assert!(!is_ct_on_left(roster.iter()));
    }

    #[test]
    fn applies_slot_extensions_for_resolved_orientation() {
        let registry = IdentityRegistry::new(
            SideExtensions {
                left: Some(TeamExtension {
                    id: "navi".to_string(),
                    name: "Natus Vincere".to_string(),
                    country: Some("UA".to_string()),
                    logo: Some("navi.png".to_string()),
                    map_score: 1,
                    extra: [("coach".to_string(), "B1ad3".to_string())].into(),
                }),
                right: Some(TeamExtension {
                    name: "Vitality".to_string(),
                    logo: Some(String::new()),
                    ..TeamExtension::default()
                }),
            },
            Vec::new(),
        );

        let state = normalize(&decode(snapshot_json(2, 2)), &registry)
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        // Fixture puts CT in slots 1..=5, so four CT players sit in the window.
        assert_eq!(state.map.team_ct.orientation, Orientation::Left);
        assert_eq!(state.map.team_t.orientation, Orientation::Right);
        assert_eq!(state.map.team_ct.name, "Natus Vincere");
        assert_eq!(state.map.team_ct.id.as_deref(), Some("navi"));
        assert_eq!(state.map.team_ct.matches_won_this_series, 1);
        assert_eq!(state.map.team_ct.extra.get("coach").map(String::as_str), Some("B1ad3"));
        assert_eq!(state.map.team_t.name, "Vitality");
        assert!(state.map.team_t.logo.is_none(), "Empty logo must not override");
        assert!(state.map.team_t.id.is_none(), "Empty id must not override");
        assert_eq!(state.map.team_t.matches_won_this_series, 0);
    }

    #[test]
    fn merges_player_extensions_and_links_teams() {
        let registry = IdentityRegistry::new(
            SideExtensions::default(),
            vec![PlayerExtension {
                name: "s1mple".to_string(),
                steamid: CT_IDS[1].to_string(),
                real_name: Some("Oleksandr".to_string()),
                avatar: Some("s1mple.png".to_string()),
                ..PlayerExtension::default()
            }],
        );

        let state = normalize(&decode(snapshot_json(0, 0)), &registry)
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        let extended = state.find_player(CT_IDS[1]).expect("Expected CT player");
        assert_eq!(extended.name, "s1mple");
        assert_eq!(extended.real_name.as_deref(), Some("Oleksandr"));
        assert_eq!(extended.avatar.as_deref(), Some("s1mple.png"));
        assert!(extended.country.is_none());
        assert_eq!(extended.team.side, Side::CT);

        let plain = state.find_player(T_IDS[0]).expect("Expected T player");
        assert_eq!(plain.name, "T-player-6");
        assert!(plain.real_name.is_none());
        assert_eq!(plain.team.side, Side::T);
        assert_eq!(plain.position, [10.5, -20.0, 64.0]);
        assert_eq!(plain.forward, [0.0, 1.0, 0.0]);
        assert_eq!(plain.state.smoked, 0, "Missing smoke value is zero");
    }

    #[test]
    fn resolves_observed_player() {
        let state = normalize(&decode(snapshot_json(0, 0)), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");
        assert_eq!(
            state.player.as_ref().map(|player| player.steamid.as_str()),
            Some(CT_IDS[0])
        );

        let mut snapshot = snapshot_json(0, 0);
        snapshot["player"]["steamid"] = json!("999");
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");
        assert!(state.player.is_none());
    }

    #[test]
    fn malformed_player_vector_fails_the_snapshot() {
        let mut snapshot = snapshot_json(0, 0);
        snapshot["allplayers"][T_IDS[2]]["forward"] = json!("0, 1");

        let error = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect_err("Two-component forward vector must fail");
        assert!(error.is_malformed_vector());
    }

    #[test]
    fn resolves_bomb_holder_and_site_when_planted() {
        let snapshot = with_bomb(snapshot_json(0, 0), "planted", Some(T_IDS[3]));
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        let bomb = state.bomb.expect("Expected bomb");
        assert_eq!(bomb.state, BombState::Planted);
        assert_eq!(bomb.countdown, Some(40.0));
        assert_eq!(bomb.position, [-400.0, 100.0, 10.0]);
        assert_eq!(bomb.site, Some(Site::A));
        assert_eq!(
            bomb.player.map(|player| player.steamid),
            Some(T_IDS[3].to_string())
        );
    }

    #[test]
    fn carried_bomb_has_no_site_and_unknown_holder_is_absent() {
        let snapshot = with_bomb(snapshot_json(0, 0), "carried", Some("424242"));
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        let bomb = state.bomb.expect("Expected bomb");
        assert!(bomb.site.is_none());
        assert!(bomb.player.is_none());
    }

    #[test]
    fn unknown_map_leaves_site_unresolved() {
        let mut snapshot = with_bomb(snapshot_json(0, 0), "defusing", None);
        snapshot["map"]["name"] = json!("de_ancient");
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        assert!(state.bomb.expect("Expected bomb").site.is_none());
    }

    #[test]
    fn passes_round_summary_through() {
        let mut snapshot = snapshot_json(4, 5);
        snapshot["round"] = json!({"phase": "over", "bomb": "exploded", "win_team": "T"});
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        let round = state.round.expect("Expected round summary");
        assert_eq!(round.phase, RoundPhase::Over);
        assert_eq!(round.bomb, Some(RoundBombState::Exploded));
        assert_eq!(round.win_team, Some(Side::T));
    }

    #[test]
    fn unknown_round_winner_and_missing_round_are_absent() {
        let mut snapshot = snapshot_json(0, 0);
        snapshot["round"] = json!({"phase": "freezetime", "win_team": "SPECTATOR"});
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");
        let round = state.round.expect("Expected round summary");
        assert_eq!(round.phase, RoundPhase::Freezetime);
        assert!(round.win_team.is_none());
        assert!(round.bomb.is_none());

        let mut snapshot = snapshot_json(0, 0);
        snapshot
            .as_object_mut()
            .expect("Fixture must be an object")
            .remove("round");
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Round block is optional");
        assert!(state.round.is_none());
    }

    #[test]
    fn players_without_ct_side_join_the_t_team() {
        let mut snapshot = snapshot_json(7, 2);
        snapshot["allplayers"][T_IDS[0]]["team"] = json!("SPECTATOR");
        snapshot["allplayers"][T_IDS[1]]
            .as_object_mut()
            .expect("Roster entry must be an object")
            .remove("team");
        let state = normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        for steamid in [T_IDS[0], T_IDS[1]] {
            let player = state.find_player(steamid).expect("Expected roster entry");
            assert_eq!(player.team.side, Side::T, "{steamid} should be linked to T");
            assert_eq!(player.team.score, 2);
        }
        assert_eq!(
            state.find_player(CT_IDS[0]).map(|player| player.team.side),
            Some(Side::CT)
        );
    }

    #[test]
    fn left_extension_lands_on_t_when_t_fills_left_window() {
        let mut snapshot = snapshot_json(1, 1);
        for (index, steamid) in CT_IDS.iter().enumerate() {
            snapshot["allplayers"][*steamid]["observer_slot"] = json!((index + 6) % 10);
        }
        for (index, steamid) in T_IDS.iter().enumerate() {
            snapshot["allplayers"][*steamid]["observer_slot"] = json!(index + 1);
        }
        let registry = IdentityRegistry::new(
            SideExtensions {
                left: Some(TeamExtension {
                    name: "Spirit".to_string(),
                    map_score: 2,
                    ..TeamExtension::default()
                }),
                right: Some(TeamExtension {
                    name: "MOUZ".to_string(),
                    ..TeamExtension::default()
                }),
            },
            Vec::new(),
        );

        let state = normalize(&decode(snapshot), &registry)
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        assert_eq!(state.map.team_t.orientation, Orientation::Left);
        assert_eq!(state.map.team_t.name, "Spirit");
        assert_eq!(state.map.team_t.matches_won_this_series, 2);
        assert_eq!(state.map.team_ct.orientation, Orientation::Right);
        assert_eq!(state.map.team_ct.name, "MOUZ");
        assert_eq!(
            state.find_player(T_IDS[2]).map(|player| player.team.name.as_str()),
            Some("Spirit")
        );
    }

    #[test]
    fn players_follow_roster_order() {
        let mut raw = decode(snapshot_json(0, 0));
        if let Some(roster) = raw.allplayers.as_mut() {
            roster.0.reverse();
        }

        let state = normalize(&raw, &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot");

        let order = state
            .players
            .iter()
            .map(|player| player.steamid.as_str())
            .collect::<Vec<&str>>();
        let mut expected = CT_IDS.iter().chain(T_IDS.iter()).copied().collect::<Vec<&str>>();
        expected.reverse();
        assert_eq!(order, expected);
    }
}
