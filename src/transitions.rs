//! Edge-triggered events derived from two consecutive canonical states.

use std::sync::Arc;

use crate::dispatch::GsiEvent;
use crate::model::{Bomb, BombState, GameState, MapPhase, Score};

struct BombTransition {
    matches: fn(BombState, BombState) -> bool,
    emit: fn(&Bomb, &Bomb) -> GsiEvent<'static>,
}

// Evaluated top to bottom and stops at the first match. A `planting` ->
// `planted` tick must hit the first rule, never the last one.
const BOMB_TRANSITIONS: [BombTransition; 6] = [
    BombTransition {
        matches: |held, next| held == BombState::Planting && next == BombState::Planted,
        emit: |held, _| GsiEvent::BombPlant(held.player.clone()),
    },
    BombTransition {
        matches: |held, next| held != BombState::Exploded && next == BombState::Exploded,
        emit: |_, _| GsiEvent::BombExplode,
    },
    BombTransition {
        matches: |held, next| held != BombState::Defused && next == BombState::Defused,
        emit: |held, _| GsiEvent::BombDefuse(held.player.clone()),
    },
    BombTransition {
        matches: |held, next| held != BombState::Defusing && next == BombState::Defusing,
        emit: |_, next| GsiEvent::DefuseStart(next.player.clone()),
    },
    BombTransition {
        matches: |held, next| held == BombState::Defusing && next != BombState::Defusing,
        emit: |held, _| GsiEvent::DefuseStop(held.player.clone()),
    },
    BombTransition {
        matches: |held, next| held != BombState::Planting && next == BombState::Planting,
        emit: |held, _| GsiEvent::BombPlantStart(held.player.clone()),
    },
];

/// Events for the step from `held` to `next`, in emission order.
///
/// Does not include the trailing `data` event; the engine owns that.
pub fn derive_events(held: &GameState, next: &GameState) -> Vec<GsiEvent<'static>> {
    let mut events = Vec::new();

    if let Some(round_end) = round_end(held, next) {
        events.push(GsiEvent::RoundEnd(round_end));
    }

    if let (Some(held_bomb), Some(next_bomb)) = (held.bomb.as_ref(), next.bomb.as_ref()) {
        if let Some(bomb_event) = bomb_transition(held_bomb, next_bomb) {
            events.push(bomb_event);
        }
    }

    if let Some(match_end) = match_end(held, next) {
        events.push(GsiEvent::MatchEnd(match_end));
    }

    events
}

/// Exactly one side's score moved. Both moving in one tick is not a round end.
fn round_end(held: &GameState, next: &GameState) -> Option<Score> {
    let ct_changed = held.map.team_ct.score != next.map.team_ct.score;
    let t_changed = held.map.team_t.score != next.map.team_t.score;
    if ct_changed == t_changed {
        return None;
    }

    let (winner, loser) = if ct_changed {
        (&next.map.team_ct, &next.map.team_t)
    } else {
        (&next.map.team_t, &next.map.team_ct)
    };

    Some(Score {
        winner: Arc::clone(winner),
        loser: Arc::clone(loser),
        map: next.map.clone(),
        map_end: false,
    })
}

fn bomb_transition(held: &Bomb, next: &Bomb) -> Option<GsiEvent<'static>> {
    BOMB_TRANSITIONS
        .iter()
        .find(|transition| (transition.matches)(held.state, next.state))
        .map(|transition| (transition.emit)(held, next))
}

fn match_end(held: &GameState, next: &GameState) -> Option<Score> {
    if next.map.phase != MapPhase::Gameover || held.map.phase == MapPhase::Gameover {
        return None;
    }

    // Strict comparison: a tied final score names T as the winner.
    // TODO: confirm with overlay consumers whether a draw should emit a winner at all.
    let ct_won = next.map.team_ct.score > next.map.team_t.score;
    let (winner, loser) = if ct_won {
        (&next.map.team_ct, &next.map.team_t)
    } else {
        (&next.map.team_t, &next.map.team_ct)
    };

    Some(Score {
        winner: Arc::clone(winner),
        loser: Arc::clone(loser),
        map: next.map.clone(),
        map_end: true,
    })
}

#[cfg(test)]
mod tests {
    use super::derive_events;
    use crate::dispatch::{EventKind, GsiEvent};
    use crate::identity::IdentityRegistry;
    use crate::model::{GameState, Side};
    use crate::normalize::normalize;
    use crate::normalize::tests::{decode, snapshot_json, with_bomb, with_map_phase, T_IDS};
    use serde_json::Value;

    fn state(snapshot: Value) -> GameState {
        normalize(&decode(snapshot), &IdentityRegistry::default())
            .expect("Expected normalization to succeed")
            .expect("Expected complete snapshot")
    }

    fn kinds(events: &[GsiEvent<'_>]) -> Vec<EventKind> {
        events.iter().map(GsiEvent::kind).collect()
    }

    fn bomb_step(held_state: &str, next_state: &str) -> Vec<GsiEvent<'static>> {
        let held = state(with_bomb(snapshot_json(0, 0), held_state, Some(T_IDS[0])));
        let next = state(with_bomb(snapshot_json(0, 0), next_state, Some(T_IDS[1])));
        derive_events(&held, &next)
    }

    #[test]
    fn single_score_change_is_round_end() {
        let events = derive_events(&state(snapshot_json(5, 3)), &state(snapshot_json(6, 3)));

        assert_eq!(kinds(&events), vec![EventKind::RoundEnd]);
        let GsiEvent::RoundEnd(score) = &events[0] else {
            panic!("Expected round end payload");
        };
        assert_eq!(score.winner.side, Side::CT);
        assert_eq!(score.loser.side, Side::T);
        assert!(!score.map_end);
        assert_eq!(score.map.team_ct.score, 6);
    }

    #[test]
    fn t_score_change_names_t_winner() {
        let events = derive_events(&state(snapshot_json(5, 3)), &state(snapshot_json(5, 4)));
        let GsiEvent::RoundEnd(score) = &events[0] else {
            panic!("Expected round end payload");
        };
        assert_eq!(score.winner.side, Side::T);
    }

    #[test]
    fn both_scores_changing_is_not_round_end() {
        let events = derive_events(&state(snapshot_json(5, 3)), &state(snapshot_json(6, 4)));
        assert!(events.is_empty());
    }

    #[test]
    fn unchanged_scores_emit_nothing() {
        let events = derive_events(&state(snapshot_json(5, 3)), &state(snapshot_json(5, 3)));
        assert!(events.is_empty());
    }

    #[test]
    fn planting_to_planted_is_bomb_plant_with_held_holder() {
        let events = bomb_step("planting", "planted");
        assert_eq!(kinds(&events), vec![EventKind::BombPlant]);
        let GsiEvent::BombPlant(Some(player)) = &events[0] else {
            panic!("Expected planter payload");
        };
        assert_eq!(player.steamid, T_IDS[0]);
    }

    #[test]
    fn carried_to_planting_is_plant_start() {
        assert_eq!(kinds(&bomb_step("carried", "planting")), vec![EventKind::BombPlantStart]);
    }

    #[test]
    fn defuse_start_carries_current_holder() {
        let events = bomb_step("planted", "defusing");
        let GsiEvent::DefuseStart(Some(player)) = &events[0] else {
            panic!("Expected defuser payload");
        };
        assert_eq!(player.steamid, T_IDS[1]);
    }

    #[test]
    fn defusing_to_defused_is_defuse_not_defuse_stop() {
        let events = bomb_step("defusing", "defused");
        assert_eq!(kinds(&events), vec![EventKind::BombDefuse]);
        let GsiEvent::BombDefuse(Some(player)) = &events[0] else {
            panic!("Expected defuser payload");
        };
        assert_eq!(player.steamid, T_IDS[0]);
    }

    #[test]
    fn defusing_to_planted_is_defuse_stop() {
        assert_eq!(kinds(&bomb_step("defusing", "planted")), vec![EventKind::DefuseStop]);
    }

    #[test]
    fn defusing_to_exploded_is_explosion_only() {
        assert_eq!(kinds(&bomb_step("defusing", "exploded")), vec![EventKind::BombExplode]);
    }

    #[test]
    fn sustained_bomb_state_emits_nothing() {
        assert!(bomb_step("planted", "planted").is_empty());
        assert!(bomb_step("carried", "dropped").is_empty());
    }

    #[test]
    fn bomb_events_require_both_bombs() {
        let held = state(snapshot_json(0, 0));
        let next = state(with_bomb(snapshot_json(0, 0), "planting", None));
        assert!(derive_events(&held, &next).is_empty());
    }

    #[test]
    fn entering_gameover_is_match_end() {
        let held = state(snapshot_json(16, 10));
        let next = state(with_map_phase(snapshot_json(16, 10), "gameover"));

        let events = derive_events(&held, &next);
        assert_eq!(kinds(&events), vec![EventKind::MatchEnd]);
        let GsiEvent::MatchEnd(score) = &events[0] else {
            panic!("Expected match end payload");
        };
        assert_eq!(score.winner.side, Side::CT);
        assert_eq!(score.loser.side, Side::T);
        assert!(score.map_end);
    }

    #[test]
    fn tied_final_score_names_t_winner() {
        let held = state(snapshot_json(15, 15));
        let next = state(with_map_phase(snapshot_json(15, 15), "gameover"));
        let events = derive_events(&held, &next);
        let GsiEvent::MatchEnd(score) = &events[0] else {
            panic!("Expected match end payload");
        };
        assert_eq!(score.winner.side, Side::T);
    }

    #[test]
    fn staying_in_gameover_does_not_repeat_match_end() {
        let held = state(with_map_phase(snapshot_json(16, 10), "gameover"));
        let next = state(with_map_phase(snapshot_json(16, 10), "gameover"));
        assert!(derive_events(&held, &next).is_empty());
    }

    #[test]
    fn final_round_emits_round_end_then_match_end() {
        let held = state(snapshot_json(15, 10));
        let next = state(with_map_phase(snapshot_json(16, 10), "gameover"));
        assert_eq!(
            kinds(&derive_events(&held, &next)),
            vec![EventKind::RoundEnd, EventKind::MatchEnd]
        );
    }

    #[test]
    fn round_end_precedes_bomb_event() {
        let held = state(with_bomb(snapshot_json(3, 3), "planted", None));
        let next = state(with_bomb(snapshot_json(3, 4), "exploded", None));
        assert_eq!(
            kinds(&derive_events(&held, &next)),
            vec![EventKind::RoundEnd, EventKind::BombExplode]
        );
    }
}
