//! Shared view of every live actor.
//!
//! Actor tasks replace their own entry after each position update; the
//! scheduler adds entries at start and removes them at goal or stop. Each
//! write swaps a whole snapshot under the lock, so readers always see a
//! consistent set of positions.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use hashbrown::HashMap;
use tokio::sync::broadcast;

use crate::actor::{ActorId, ActorSnapshot};
use crate::grid::Cell;

/// Notifications pushed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Started { actors: usize },
    Moved(ActorSnapshot),
    RouteChanged { id: ActorId },
    GoalReached { id: ActorId, kind: u8, elapsed: Duration },
    FieldChanged,
    Stopped,
}

#[derive(Debug)]
pub(crate) struct Board {
    actors: RwLock<HashMap<ActorId, ActorSnapshot>>,
    routes: RwLock<HashMap<ActorId, Vec<Cell>>>,
    events: broadcast::Sender<SimEvent>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Board {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            actors: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SimEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn insert(&self, snapshot: ActorSnapshot, route: Vec<Cell>) {
        let id = snapshot.id;
        write(&self.actors).insert(id, snapshot);
        write(&self.routes).insert(id, route);
    }

    pub(crate) fn update(&self, snapshot: ActorSnapshot) {
        write(&self.actors).insert(snapshot.id, snapshot.clone());
        self.emit(SimEvent::Moved(snapshot));
    }

    pub(crate) fn set_route(&self, id: ActorId, route: Vec<Cell>) {
        write(&self.routes).insert(id, route);
        self.emit(SimEvent::RouteChanged { id });
    }

    pub(crate) fn retire(&self, id: ActorId) -> Option<ActorSnapshot> {
        write(&self.routes).remove(&id);
        write(&self.actors).remove(&id)
    }

    pub(crate) fn clear(&self) {
        write(&self.actors).clear();
        write(&self.routes).clear();
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.actors).len()
    }

    pub(crate) fn snapshot(&self, id: ActorId) -> Option<ActorSnapshot> {
        read(&self.actors).get(&id).cloned()
    }

    /// All live actors ordered by id.
    pub(crate) fn snapshots(&self) -> Vec<ActorSnapshot> {
        let mut out: Vec<ActorSnapshot> = read(&self.actors).values().cloned().collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub(crate) fn is_occupied(&self, row: usize, column: usize) -> bool {
        read(&self.actors).values().any(|s| s.covers(row, column))
    }

    pub(crate) fn route(&self, id: ActorId) -> Option<Vec<Cell>> {
        read(&self.routes).get(&id).cloned()
    }
}
