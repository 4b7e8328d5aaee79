use crate::dispatch::{EventDispatcher, EventKind, GsiEvent, ListenerId};
use crate::error::GsiError;
use crate::identity::{IdentityRegistry, PlayerExtension, SideExtensions};
use crate::kill_feed::normalize_kill;
use crate::model::{GameState, KillEvent};
use crate::normalize::normalize;
use crate::raw::{RawKill, RawSnapshot};
use crate::transitions::derive_events;

/// One tracked match: the last canonical state plus its listeners.
///
/// Calls are expected to be serialized by the caller; the engine does no
/// locking of its own. Independent engines share nothing.
#[derive(Debug, Default)]
pub struct GsiEngine {
    registry: IdentityRegistry,
    dispatcher: EventDispatcher,
    last: Option<GameState>,
    listener_failures: u64,
}

impl GsiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: IdentityRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Normalizes `raw` and feeds it through [`GsiEngine::digest_state`].
    ///
    /// `Ok(None)` means the snapshot was incomplete: nothing was emitted and
    /// the held state is unchanged. The same holds when an error is returned.
    pub fn digest(&mut self, raw: &RawSnapshot) -> Result<Option<&GameState>, GsiError> {
        let Some(state) = normalize(raw, &self.registry)? else {
            return Ok(None);
        };
        Ok(Some(self.digest_state(state)))
    }

    /// Emits the events for the step from the held state to `state`, then
    /// replaces the held state and emits `data`.
    pub fn digest_state(&mut self, state: GameState) -> &GameState {
        let events = match self.last.as_ref() {
            Some(held) => derive_events(held, &state),
            None => Vec::new(),
        };

        let mut failed = 0;
        for event in &events {
            log_transition(event);
            failed += self.dispatcher.dispatch(event);
        }

        let held = self.last.insert(state);
        failed += self.dispatcher.dispatch(&GsiEvent::Data(held));
        self.listener_failures = self.listener_failures.saturating_add(failed as u64);
        held
    }

    /// Resolves a kill-feed record against the held roster and emits `kill`.
    ///
    /// Returns `None` before the first complete snapshot or when the killer
    /// or victim is unknown. Never touches the held state.
    pub fn digest_kill(&mut self, raw: &RawKill) -> Option<KillEvent> {
        let Some(held) = self.last.as_ref() else {
            tracing::debug!("Dropping kill received before the first complete snapshot");
            return None;
        };

        let kill = normalize_kill(held, raw)?;
        let failed = self.dispatcher.dispatch(&GsiEvent::Kill(kill.clone()));
        self.listener_failures = self.listener_failures.saturating_add(failed as u64);
        Some(kill)
    }

    pub fn last(&self) -> Option<&GameState> {
        self.last.as_ref()
    }

    /// Listener calls that returned an error since the engine was created.
    pub fn listener_failures(&self) -> u64 {
        self.listener_failures
    }

    /// Forgets the held state so the next snapshot counts as the first one.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&GsiEvent<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        self.dispatcher.on(kind, listener)
    }

    pub fn remove_listener(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.dispatcher.remove_listener(kind, id)
    }

    pub fn remove_listeners(&mut self, kind: EventKind) -> bool {
        self.dispatcher.remove_listeners(kind)
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn set_registry(&mut self, registry: IdentityRegistry) {
        self.registry = registry;
    }

    pub fn set_teams(&mut self, teams: SideExtensions) {
        self.registry.set_teams(teams);
    }

    pub fn set_players(&mut self, players: Vec<PlayerExtension>) {
        self.registry.set_players(players);
    }
}

fn log_transition(event: &GsiEvent<'_>) {
    match event {
        GsiEvent::RoundEnd(score) | GsiEvent::MatchEnd(score) => {
            tracing::info!(
                event = %event.kind(),
                map = %score.map.name,
                winner = %score.winner.name,
                ct_score = score.map.team_ct.score,
                t_score = score.map.team_t.score,
                "Score transition"
            );
        }
        _ => tracing::debug!(event = %event.kind(), "Bomb transition"),
    }
}
