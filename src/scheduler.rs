//! Simulation lifecycle: spawning actor tasks, reaping them, publishing new
//! direction fields and applying edits while the simulation runs.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::actor::{Actor, ActorId, ActorSnapshot};
use crate::analyze::{analyze, DirectionField};
use crate::behavior::{ActorExit, Behavior};
use crate::board::{Board, SimEvent};
use crate::config::SimConfig;
use crate::editor::EditError;
use crate::grid::{Cell, CellKind, FieldGrid};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("simulation is already running")]
    AlreadyRunning,
    #[error("simulation is not running")]
    NotRunning,
    #[error("grid has no goal")]
    NoGoal,
    #[error("no tokio runtime available to spawn actor tasks")]
    NoRuntime,
    #[error(transparent)]
    Edit(#[from] EditError),
}

struct Run {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

pub struct Scheduler {
    config: Arc<SimConfig>,
    board: Arc<Board>,
    field_tx: watch::Sender<Arc<DirectionField>>,
    grid: FieldGrid,
    run: Option<Run>,
    next_id: ActorId,
}

impl Scheduler {
    pub fn new(config: SimConfig) -> Self {
        let config = config.sanitized();
        let board = Arc::new(Board::new(config.event_capacity));
        let grid = FieldGrid::new(1, 1);
        let (field_tx, _) = watch::channel(Arc::new(analyze(&grid)));
        Self {
            config: Arc::new(config),
            board,
            field_tx,
            grid,
            run: None,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Spawn one actor per start kind on `grid` and return how many were
    /// spawned. Start markers are cleared from the stored layout.
    pub fn start(&mut self, mut grid: FieldGrid) -> Result<usize, SchedulerError> {
        if self.run.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let starts = grid.actor_starts();
        grid.clear_actor_starts();
        let field = analyze(&grid);
        if field.goals().is_empty() {
            return Err(SchedulerError::NoGoal);
        }
        let field = Arc::new(field);
        self.field_tx.send_replace(Arc::clone(&field));

        self.board.clear();
        self.board.emit(SimEvent::Started {
            actors: starts.len(),
        });

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for &(kind, cell) in &starts {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);

            let variant = self.config.variant_for(kind);
            let mut actor = Actor::new(id, kind, variant, cell, &self.config);
            actor.direction = field.direction(cell.0, cell.1);
            actor.route = field.path(cell.0, cell.1).unwrap_or_default();
            self.board.insert(actor.snapshot(), actor.route.clone());

            let rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
                None => StdRng::from_entropy(),
            };
            let behavior = Behavior::new(
                actor,
                Arc::clone(&self.config),
                self.field_tx.subscribe(),
                Arc::clone(&self.board),
                cancel.child_token(),
                rng,
            );
            tasks.spawn_on(behavior.run(), &handle);
        }

        info!(
            actors = starts.len(),
            rows = grid.rows(),
            columns = grid.columns(),
            goals = field.goals().len(),
            "simulation started"
        );

        let supervisor = handle.spawn(supervise(tasks, Arc::clone(&self.board), Instant::now()));
        self.grid = grid;
        self.run = Some(Run { cancel, supervisor });
        Ok(starts.len())
    }

    /// Cancel every actor task and wait until all of them have exited.
    /// Actor state is discarded afterwards.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let run = self.run.take().ok_or(SchedulerError::NotRunning)?;
        run.cancel.cancel();
        if let Err(err) = run.supervisor.await {
            error!(%err, "supervisor task failed");
        }
        self.board.clear();
        self.board.emit(SimEvent::Stopped);
        info!("simulation stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Whether any live actor overlaps `(row, column)`, including the cell
    /// it is stepping into.
    pub fn is_occupied(&self, row: usize, column: usize) -> bool {
        self.board.is_occupied(row, column)
    }

    /// Actors still on their way to a goal.
    pub fn actor_count(&self) -> usize {
        self.board.len()
    }

    pub fn snapshots(&self) -> Vec<ActorSnapshot> {
        self.board.snapshots()
    }

    pub fn snapshot(&self, id: ActorId) -> Option<ActorSnapshot> {
        self.board.snapshot(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.board.subscribe()
    }

    /// The field actors are currently following.
    pub fn field(&self) -> Arc<DirectionField> {
        Arc::clone(&self.field_tx.borrow())
    }

    pub fn route(&self, id: ActorId) -> Option<Vec<Cell>> {
        self.board.route(id)
    }

    /// Layout of the running simulation, without start markers.
    pub fn grid(&self) -> &FieldGrid {
        &self.grid
    }

    /// Turn `(row, column)` into a wall while the simulation runs.
    ///
    /// Refused on goals and on cells an actor overlaps. Reverted when an
    /// actor that could reach a goal before would be cut off afterwards.
    pub fn place_wall(&mut self, row: usize, column: usize) -> Result<(), SchedulerError> {
        if self.run.is_none() {
            return Err(SchedulerError::NotRunning);
        }
        match self.grid.get(row, column) {
            None => return Err(EditError::OutOfBounds { row, column }.into()),
            Some(CellKind::Goal) => return Err(EditError::GoalCell { row, column }.into()),
            Some(CellKind::Wall) => return Ok(()),
            Some(_) => {}
        }
        if self.board.is_occupied(row, column) {
            return Err(EditError::Occupied { row, column }.into());
        }

        let mut candidate = self.grid.clone();
        candidate.put((row, column), CellKind::Wall);
        let next = analyze(&candidate);
        let current = self.field();

        for s in self.board.snapshots() {
            let [from, to] = s.footprint();
            let covered = [from, to]
                .into_iter()
                .filter_map(|(r, c)| (r >= 0 && c >= 0).then_some((r as usize, c as usize)))
                .chain(s.heading());
            for (r, c) in covered {
                if current.is_reachable(r, c) && !next.is_reachable(r, c) {
                    debug!(row, column, actor = s.id, "wall would strand actor");
                    return Err(EditError::StrandsActor { kind: s.kind }.into());
                }
            }
        }

        self.grid = candidate;
        self.publish(next);
        Ok(())
    }

    /// Open a wall cell while the simulation runs. Returns false when the
    /// cell was not a wall.
    pub fn clear_wall(&mut self, row: usize, column: usize) -> Result<bool, SchedulerError> {
        if self.run.is_none() {
            return Err(SchedulerError::NotRunning);
        }
        match self.grid.get(row, column) {
            None => Err(EditError::OutOfBounds { row, column }.into()),
            Some(CellKind::Wall) => {
                self.grid.put((row, column), CellKind::Empty);
                self.publish(analyze(&self.grid));
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Swap in a freshly analyzed field and recompute every live route from
    /// the cell its actor is heading into.
    fn publish(&self, field: DirectionField) {
        let field = Arc::new(field);
        self.field_tx.send_replace(Arc::clone(&field));
        for s in self.board.snapshots() {
            let route = s
                .heading()
                .and_then(|(r, c)| field.path(r, c).ok())
                .unwrap_or_default();
            self.board.set_route(s.id, route);
        }
        self.board.emit(SimEvent::FieldChanged);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.cancel.cancel();
        }
    }
}

async fn supervise(mut tasks: JoinSet<(ActorId, ActorExit)>, board: Arc<Board>, started: Instant) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, ActorExit::ReachedGoal)) => {
                let elapsed = started.elapsed();
                if let Some(s) = board.retire(id) {
                    info!(actor = id, kind = s.kind, variant = s.variant.name(), ?elapsed, "goal reached");
                    board.emit(SimEvent::GoalReached {
                        id,
                        kind: s.kind,
                        elapsed,
                    });
                }
            }
            Ok((_, ActorExit::Cancelled)) => {}
            Err(err) => error!(%err, "actor task failed"),
        }
    }
}
