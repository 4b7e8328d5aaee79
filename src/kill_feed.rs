use crate::model::{GameState, KillEvent, Player};
use crate::raw::{RawKill, RawKillActor};

/// Kill-feed xuid used when nobody assisted.
const NO_ASSISTER_XUID: &str = "0";

/// Resolves a kill record against the roster of `held`.
///
/// Returns `None` when the killer or the victim is not in the roster; such
/// records are dropped rather than retried.
pub fn normalize_kill(held: &GameState, raw: &RawKill) -> Option<KillEvent> {
    let keys = &raw.keys;
    let killer = find_actor(held, &keys.attacker);
    let victim = find_actor(held, &keys.userid);
    let assister = keys
        .assister
        .xuid
        .as_deref()
        .filter(|xuid| *xuid != NO_ASSISTER_XUID)
        .and_then(|xuid| held.find_player(xuid));

    let (Some(killer), Some(victim)) = (killer, victim) else {
        tracing::debug!(
            attacker = keys.attacker.xuid.as_deref().unwrap_or_default(),
            victim = keys.userid.xuid.as_deref().unwrap_or_default(),
            killer_resolved = killer.is_some(),
            victim_resolved = victim.is_some(),
            "Dropping kill outside the known roster"
        );
        return None;
    };

    Some(KillEvent {
        killer: killer.clone(),
        victim: victim.clone(),
        assister: assister.cloned(),
        flashed: keys.assistedflash,
        headshot: keys.headshot,
        weapon: keys.weapon.clone(),
        wallbang: keys.penetrated > 0,
        attackerblind: keys.attackerblind,
        thrusmoke: keys.thrusmoke,
        noscope: keys.noscope,
    })
}

fn find_actor<'a>(held: &'a GameState, actor: &RawKillActor) -> Option<&'a Player> {
    actor
        .xuid
        .as_deref()
        .and_then(|xuid| held.find_player(xuid))
}
