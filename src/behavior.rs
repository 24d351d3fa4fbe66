//! The per-actor behavior loop.
//!
//! Each actor runs as one task: read the direction under it, then step,
//! jump or terminate. Animations publish a position every sub-step and sleep
//! in between; those sleeps are the only suspension points and the only
//! places where a stop request is observed.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actor::{Actor, ActorId, ActorState};
use crate::analyze::{neighbor, offset, Direction, DirectionField};
use crate::board::Board;
use crate::config::{SimConfig, Variant};
use crate::grid::Cell;

/// How an actor task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorExit {
    ReachedGoal,
    Cancelled,
}

/// Raised at a suspension point once the simulation has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

enum Flow {
    Continue,
    Finished,
}

pub(crate) fn roll<R: Rng>(rng: &mut R, probability: f32) -> bool {
    probability > 0.0 && rng.gen::<f32>() < probability
}

/// Scatterbrain detour: a uniformly random open neighbor direction, avoiding
/// `current` unless it is the only way out.
pub fn scatter_direction<R: Rng>(
    field: &DirectionField,
    cell: Cell,
    current: Direction,
    rng: &mut R,
) -> Option<Direction> {
    let mut open: Vec<Direction> = Direction::MOVES
        .into_iter()
        .filter(|&d| {
            neighbor(cell, d, field.rows(), field.columns())
                .is_some_and(|(r, c)| !field.is_wall(r, c))
        })
        .collect();
    if open.len() > 1 {
        open.retain(|&d| d != current);
    }
    open.choose(rng).copied()
}

/// Jumper hop over a single wall.
///
/// Candidates are checked in the order +row, -row, +column, -column. The
/// first one with a wall right next to the actor and an open cell behind it
/// is the only one evaluated: the hop is taken when the path from there is at
/// least `min_gain` cells shorter than the current one. Returns the landing
/// cell and its path.
pub fn hop_target(field: &DirectionField, cell: Cell, min_gain: usize) -> Option<(Cell, Vec<Cell>)> {
    let (rows, columns) = (field.rows(), field.columns());
    let landing = [Direction::Down, Direction::Up, Direction::Right, Direction::Left]
        .into_iter()
        .find_map(|dir| {
            let (wr, wc) = neighbor(cell, dir, rows, columns)?;
            let (lr, lc) = offset(cell, dir, 2, rows, columns)?;
            (field.is_wall(wr, wc) && !field.is_wall(lr, lc)).then_some((lr, lc))
        })?;

    let current = field.path(cell.0, cell.1).ok()?;
    let shorter = field.path(landing.0, landing.1).ok()?;
    (current.len() >= shorter.len() + min_gain).then_some((landing, shorter))
}

/// Cells a teleporter may land on: reachable, and at least `min_offset` rows
/// and `min_offset` columns away from every goal.
pub fn teleport_targets(field: &DirectionField, min_offset: usize) -> Vec<Cell> {
    field
        .reachable_cells()
        .filter(|&(r, c)| {
            field
                .goals()
                .iter()
                .all(|&(gr, gc)| r.abs_diff(gr) >= min_offset && c.abs_diff(gc) >= min_offset)
        })
        .collect()
}

pub(crate) struct Behavior {
    actor: Actor,
    config: Arc<SimConfig>,
    field: watch::Receiver<Arc<DirectionField>>,
    board: Arc<Board>,
    cancel: CancellationToken,
    rng: StdRng,
}

impl Behavior {
    pub(crate) fn new(
        actor: Actor,
        config: Arc<SimConfig>,
        field: watch::Receiver<Arc<DirectionField>>,
        board: Arc<Board>,
        cancel: CancellationToken,
        rng: StdRng,
    ) -> Self {
        Self {
            actor,
            config,
            field,
            board,
            cancel,
            rng,
        }
    }

    pub(crate) async fn run(mut self) -> (ActorId, ActorExit) {
        let id = self.actor.id;
        loop {
            match self.tick().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Finished) => return (id, ActorExit::ReachedGoal),
                Err(Cancelled) => return (id, ActorExit::Cancelled),
            }
        }
    }

    /// Latest published field. Held for the rest of the decision so one tick
    /// never mixes two snapshots.
    fn current_field(&self) -> Arc<DirectionField> {
        Arc::clone(&self.field.borrow())
    }

    async fn tick(&mut self) -> Result<Flow, Cancelled> {
        let config = Arc::clone(&self.config);
        let variant = self.actor.variant;
        match variant {
            Variant::Teleporter if roll(&mut self.rng, config.teleporter.probability) => {
                self.teleport().await?;
            }
            Variant::Jumper if roll(&mut self.rng, config.jumper.probability) => {
                self.try_hop()?;
            }
            _ => {}
        }

        let field = self.current_field();
        let (row, column) = self.actor.cell();
        let mut direction = field.direction_at(row, column);

        if variant == Variant::Scatterbrain
            && direction != Direction::AtGoal
            && roll(&mut self.rng, config.scatterbrain_probability)
        {
            direction = self
                .actor
                .grid_cell()
                .and_then(|cell| scatter_direction(&field, cell, direction, &mut self.rng))
                .unwrap_or(Direction::Unreachable);
        }

        self.actor.direction = direction;
        self.actor.state = match direction {
            Direction::AtGoal => ActorState::AtGoal,
            Direction::Unreachable => ActorState::Stuck,
            _ => ActorState::Following,
        };
        if self.actor.state == ActorState::Following
            && variant == Variant::Accelerator
            && roll(&mut self.rng, config.accelerator.probability)
        {
            self.actor.accelerate(&config.accelerator);
        }
        // Observers must see the target cell as taken before the first pause.
        self.publish()?;

        match self.actor.state {
            ActorState::AtGoal => Ok(Flow::Finished),
            ActorState::Stuck => {
                self.jump().await?;
                Ok(Flow::Continue)
            }
            ActorState::Following => {
                self.step(direction).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Move one cell along `direction`, interpolating over the step duration.
    async fn step(&mut self, direction: Direction) -> Result<(), Cancelled> {
        let Some((dr, dc)) = direction.delta() else {
            return Ok(());
        };
        let (row0, column0) = (self.actor.row, self.actor.column);
        let n = self.config.substeps.max(1);
        let pause = self.actor.step_duration(&self.config) / n;

        for i in 1..=n {
            self.pause(pause).await?;
            let p = i as f32 / n as f32;
            self.actor.row = row0 + dr as f32 * p;
            self.actor.column = column0 + dc as f32 * p;
            self.publish()?;
        }
        Ok(())
    }

    /// Hop in place along a parabola.
    async fn jump(&mut self) -> Result<(), Cancelled> {
        let height = self.config.jump_height;
        let duration = self.config.jump_duration();
        self.animate(duration, |p| (-4.0 * height * p * (1.0 - p), 0.0))
            .await
    }

    /// Short diagonal wobble toward the top-left and back.
    async fn vibrate(&mut self) -> Result<(), Cancelled> {
        let duration = self.config.vibrate_duration();
        self.animate(duration, |p| {
            let w = -p * (1.0 - p);
            (w, w)
        })
        .await
    }

    /// Drive `offset` through `shape(p)` for p in (0, 1]. Every shape used
    /// here returns to zero at p = 1.
    async fn animate(
        &mut self,
        duration: Duration,
        shape: impl Fn(f32) -> (f32, f32),
    ) -> Result<(), Cancelled> {
        let n = self.config.substeps.max(1);
        let pause = duration / n;
        for i in 1..=n {
            self.pause(pause).await?;
            let p = i as f32 / n as f32;
            self.actor.offset = shape(p);
            self.publish()?;
        }
        self.actor.offset = (0.0, 0.0);
        Ok(())
    }

    async fn teleport(&mut self) -> Result<(), Cancelled> {
        self.vibrate().await?;
        self.vibrate().await?;

        let field = self.current_field();
        let targets = teleport_targets(&field, self.config.teleporter.min_goal_offset);
        if let Some(&cell) = targets.choose(&mut self.rng) {
            debug!(actor = self.actor.id, row = cell.0, column = cell.1, "teleport");
            self.actor.place(cell);
            self.publish()?;
            let route = field.path(cell.0, cell.1).unwrap_or_default();
            self.record_route(route);
        }

        self.vibrate().await?;
        self.vibrate().await
    }

    fn try_hop(&mut self) -> Result<(), Cancelled> {
        let Some(cell) = self.actor.grid_cell() else {
            return Ok(());
        };
        let field = self.current_field();
        if let Some((landing, route)) = hop_target(&field, cell, self.config.jumper.min_gain) {
            debug!(
                actor = self.actor.id,
                from_row = cell.0,
                from_column = cell.1,
                row = landing.0,
                column = landing.1,
                "hop over wall"
            );
            self.actor.place(landing);
            self.publish()?;
            self.record_route(route);
        }
        Ok(())
    }

    fn record_route(&mut self, route: Vec<Cell>) {
        self.actor.route = route.clone();
        self.board.set_route(self.actor.id, route);
    }

    fn publish(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }
        self.board.update(self.actor.snapshot());
        Ok(())
    }

    async fn pause(&self, duration: Duration) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::board::SimEvent;
    use crate::grid::{CellKind, FieldGrid};
    use rand::SeedableRng;

    fn field(values: &[&[i32]]) -> DirectionField {
        analyze(&FieldGrid::from_values(values).unwrap())
    }

    fn fast_config() -> SimConfig {
        SimConfig {
            time_unit_ms: 200,
            substeps: 4,
            jump_ms: 40,
            ..SimConfig::default()
        }
    }

    fn behavior(
        variant: Variant,
        cell: Cell,
        field: DirectionField,
        config: SimConfig,
    ) -> (Behavior, Arc<Board>) {
        let board = Arc::new(Board::new(256));
        let config = Arc::new(config);
        let actor = Actor::new(1, 2, variant, cell, &config);
        board.insert(actor.snapshot(), Vec::new());
        let (_tx, rx) = watch::channel(Arc::new(field));
        let b = Behavior::new(
            actor,
            config,
            rx,
            Arc::clone(&board),
            CancellationToken::new(),
            StdRng::seed_from_u64(11),
        );
        (b, board)
    }

    fn assert_elapsed(start: time::Instant, millis: u64) {
        let elapsed = start.elapsed();
        let want = Duration::from_millis(millis);
        assert!(
            elapsed >= want && elapsed < want + Duration::from_millis(5),
            "elapsed {elapsed:?}, want {want:?}"
        );
    }

    #[test]
    fn hop_threshold_is_inclusive() {
        // Around the wall: 5 cells. Landing on the goal: 1 cell.
        let f = field(&[&[0, -1, 1], &[0, 0, 0]]);
        assert!(hop_target(&f, (0, 0), 5).is_none());
        let (landing, route) = hop_target(&f, (0, 0), 4).unwrap();
        assert_eq!(landing, (0, 2));
        assert_eq!(route, vec![(0, 2)]);
    }

    #[test]
    fn hop_taken_at_gain_of_exactly_five() {
        // Two goals of opposite parity: down the open column to (6, 0) is 7
        // cells, from the landing cell (0, 2) to (0, 3) is 2.
        let f = field(&[
            &[0, -1, 0, 1],
            &[0, -1, -1, -1],
            &[0, -1, -1, -1],
            &[0, -1, -1, -1],
            &[0, -1, -1, -1],
            &[0, -1, -1, -1],
            &[1, -1, -1, -1],
        ]);
        assert_eq!(f.path(0, 0).unwrap().len(), 7);
        assert_eq!(f.path(0, 2).unwrap().len(), 2);
        assert!(hop_target(&f, (0, 0), 6).is_none());
        let (landing, route) = hop_target(&f, (0, 0), 5).unwrap();
        assert_eq!(landing, (0, 2));
        assert_eq!(route, vec![(0, 2), (0, 3)]);
    }

    #[test]
    fn hop_lands_on_the_shorter_route() {
        let f = field(&[&[0, -1, 0, 1], &[0, -1, 0, -1], &[0, 0, 0, -1]]);
        assert_eq!(f.path(0, 0).unwrap().len(), 8);
        assert!(hop_target(&f, (0, 0), 7).is_none());
        let (landing, route) = hop_target(&f, (0, 0), 6).unwrap();
        assert_eq!(landing, (0, 2));
        assert_eq!(route, vec![(0, 2), (0, 3)]);
    }

    #[test]
    fn hop_only_evaluates_first_structural_candidate() {
        // Below the actor: wall, then a pocket cut off from the goal. The
        // hop to the left would pay off but is never considered.
        let cut_off = field(&[
            &[0, 0, 0],
            &[1, -1, 0],
            &[-1, -1, -1],
            &[0, 0, 0],
        ]);
        assert!(hop_target(&cut_off, (1, 2), 1).is_none());

        let open = field(&[&[0, 0, 0], &[1, -1, 0], &[-1, -1, -1]]);
        let (landing, _) = hop_target(&open, (1, 2), 1).unwrap();
        assert_eq!(landing, (1, 0));
    }

    #[test]
    fn scatter_avoids_walls_and_current_direction() {
        let f = field(&[&[-1, 0, -1], &[0, 0, 1], &[-1, -1, -1]]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let d = scatter_direction(&f, (1, 1), Direction::Right, &mut rng).unwrap();
            assert!(d == Direction::Up || d == Direction::Left, "{d:?}");
        }
    }

    #[test]
    fn scatter_keeps_current_when_it_is_the_only_way() {
        let f = field(&[&[-1, -1, -1], &[-1, 0, 1], &[-1, -1, -1]]);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            scatter_direction(&f, (1, 1), Direction::Right, &mut rng),
            Some(Direction::Right)
        );

        let boxed = field(&[&[1, -1, -1], &[-1, 0, -1], &[-1, -1, -1]]);
        assert_eq!(
            scatter_direction(&boxed, (1, 1), Direction::Unreachable, &mut rng),
            None
        );
    }

    #[test]
    fn teleport_targets_keep_their_distance() {
        let mut grid = FieldGrid::new(12, 12);
        grid.set(0, 0, CellKind::Goal).unwrap();
        grid.set(11, 11, CellKind::Wall).unwrap();
        let f = analyze(&grid);

        let targets = teleport_targets(&f, 5);
        assert_eq!(targets.len(), 7 * 7 - 1);
        assert!(targets.iter().all(|&(r, c)| r >= 5 && c >= 5));
        assert!(!targets.contains(&(11, 11)));
        assert!(teleport_targets(&f, 12).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn base_actor_walks_to_goal() {
        let f = field(&[&[1, 0, 0, 0]]);
        let (b, board) = behavior(Variant::Base, (0, 3), f, fast_config());
        let start = time::Instant::now();
        assert_eq!(b.run().await, (1, ActorExit::ReachedGoal));
        assert_elapsed(start, 600);

        let s = board.snapshot(1).unwrap();
        assert_eq!((s.row, s.column), (0.0, 0.0));
        assert_eq!(s.state, ActorState::AtGoal);
        assert_eq!(s.direction, Direction::AtGoal);
    }

    #[tokio::test(start_paused = true)]
    async fn speedster_takes_half_the_time() {
        let f = field(&[&[1, 0, 0, 0]]);
        let (b, _) = behavior(Variant::Speedster, (0, 3), f, fast_config());
        let start = time::Instant::now();
        assert_eq!(b.run().await.1, ActorExit::ReachedGoal);
        assert_elapsed(start, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn positions_are_published_every_substep() {
        let f = field(&[&[1, 0]]);
        let (b, board) = behavior(Variant::Base, (0, 1), f, fast_config());
        let mut rx = board.subscribe();
        b.run().await;

        let mut columns = Vec::new();
        while let Ok(SimEvent::Moved(s)) = rx.try_recv() {
            columns.push(s.column);
        }
        assert_eq!(columns, vec![1.0, 0.75, 0.5, 0.25, 0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn direction_is_published_before_the_first_pause() {
        let f = field(&[&[1, 0, 0]]);
        let (b, board) = behavior(Variant::Base, (0, 2), f, fast_config());
        let task = tokio::spawn(b.run());

        time::sleep(Duration::from_millis(10)).await;
        let s = board.snapshot(1).unwrap();
        assert_eq!((s.row, s.column), (0.0, 2.0));
        assert_eq!(s.direction, Direction::Left);
        assert_eq!(s.state, ActorState::Following);
        assert!(board.is_occupied(0, 1));
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stranded_actor_jumps_in_place_until_cancelled() {
        let f = field(&[&[1, -1, 0]]);
        let (b, board) = behavior(Variant::Base, (0, 2), f, fast_config());
        let cancel = b.cancel.clone();
        let task = tokio::spawn(b.run());

        time::sleep(Duration::from_millis(105)).await;
        let s = board.snapshot(1).unwrap();
        assert_eq!(s.state, ActorState::Stuck);
        assert_eq!((s.row, s.column), (0.0, 2.0));

        cancel.cancel();
        assert_eq!(task.await.unwrap(), (1, ActorExit::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn eager_jumper_takes_the_shortcut() {
        let f = field(&[&[0, -1, 0, 1], &[0, -1, 0, -1], &[0, 0, 0, -1]]);
        let mut config = fast_config();
        config.jumper.probability = 1.0;
        let (b, board) = behavior(Variant::Jumper, (0, 0), f, config);
        let mut rx = board.subscribe();
        let start = time::Instant::now();
        assert_eq!(b.run().await.1, ActorExit::ReachedGoal);
        // The hop itself is instant; only the step from (0, 2) takes time.
        assert_elapsed(start, 200);

        let mut rerouted = false;
        while let Ok(ev) = rx.try_recv() {
            rerouted |= ev == SimEvent::RouteChanged { id: 1 };
        }
        assert!(rerouted);
        assert_eq!(board.route(1), Some(vec![(0, 2), (0, 3)]));
    }

    #[tokio::test(start_paused = true)]
    async fn eager_teleporter_lands_far_from_goal() {
        let mut grid = FieldGrid::new(8, 8);
        grid.set(0, 0, CellKind::Goal).unwrap();
        let mut config = fast_config();
        config.teleporter.probability = 1.0;
        let (b, board) = behavior(Variant::Teleporter, (0, 1), analyze(&grid), config);
        let mut rx = board.subscribe();
        let task = tokio::spawn(b.run());

        // Two 100 ms vibrates come before the relocation, two after.
        time::sleep(Duration::from_millis(250)).await;
        let s = board.snapshot(1).unwrap();
        assert!(s.row >= 5.0 && s.column >= 5.0, "landed at {s:?}");
        task.abort();

        let mut wobbled = false;
        while let Ok(ev) = rx.try_recv() {
            if let SimEvent::Moved(s) = ev {
                if s.offset != (0.0, 0.0) {
                    wobbled = true;
                    assert!(s.offset.0 < 0.0 && s.offset.0 == s.offset.1);
                }
            }
        }
        assert!(wobbled);
    }
}
