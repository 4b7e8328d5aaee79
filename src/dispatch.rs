use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::{GameState, KillEvent, Player, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Data,
    RoundEnd,
    MatchEnd,
    BombPlantStart,
    BombPlant,
    BombExplode,
    BombDefuse,
    DefuseStart,
    DefuseStop,
    Kill,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::RoundEnd => "roundEnd",
            Self::MatchEnd => "matchEnd",
            Self::BombPlantStart => "bombPlantStart",
            Self::BombPlant => "bombPlant",
            Self::BombExplode => "bombExplode",
            Self::BombDefuse => "bombDefuse",
            Self::DefuseStart => "defuseStart",
            Self::DefuseStop => "defuseStop",
            Self::Kill => "kill",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payloads, one variant per [`EventKind`].
///
/// `Data` borrows the engine's held state; every other payload is owned so
/// it can outlive the state it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum GsiEvent<'a> {
    Data(&'a GameState),
    RoundEnd(Score),
    MatchEnd(Score),
    BombPlantStart(Option<Player>),
    BombPlant(Option<Player>),
    BombExplode,
    BombDefuse(Option<Player>),
    DefuseStart(Option<Player>),
    DefuseStop(Option<Player>),
    Kill(KillEvent),
}

impl GsiEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::RoundEnd(_) => EventKind::RoundEnd,
            Self::MatchEnd(_) => EventKind::MatchEnd,
            Self::BombPlantStart(_) => EventKind::BombPlantStart,
            Self::BombPlant(_) => EventKind::BombPlant,
            Self::BombExplode => EventKind::BombExplode,
            Self::BombDefuse(_) => EventKind::BombDefuse,
            Self::DefuseStart(_) => EventKind::DefuseStart,
            Self::DefuseStop(_) => EventKind::DefuseStop,
            Self::Kill(_) => EventKind::Kill,
        }
    }
}

/// Listeners are `Send` so an engine can sit behind a lock shared across threads.
pub type Listener = Box<dyn FnMut(&GsiEvent<'_>) -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous fan-out of events to listeners, in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: BTreeMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&GsiEvent<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Returns `false` when no listener list exists for `kind`.
    pub fn remove_listener(&mut self, kind: EventKind, id: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return false;
        };
        listeners.retain(|(listener_id, _)| *listener_id != id);
        true
    }

    pub fn remove_listeners(&mut self, kind: EventKind) -> bool {
        self.listeners.insert(kind, Vec::new());
        true
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Runs every listener for the event's kind and returns how many failed.
    ///
    /// A failing listener is logged and does not stop the remaining ones.
    pub fn dispatch(&mut self, event: &GsiEvent<'_>) -> usize {
        let kind = event.kind();
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return 0;
        };

        let mut failed = 0;
        for (id, listener) in listeners.iter_mut() {
            if let Err(error) = listener(event) {
                failed += 1;
                tracing::warn!(
                    event = %kind,
                    listener_id = id.0,
                    listener_error = %error,
                    "Event listener failed"
                );
            }
        }
        failed
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self
            .listeners
            .iter()
            .map(|(kind, listeners)| (kind.as_str(), listeners.len()))
            .collect::<BTreeMap<&str, usize>>();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}
