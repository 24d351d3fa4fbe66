//! Layout editing with path-preserving validation.
//!
//! Every edit is tried on a copy of the grid first. It is committed only if
//! the copy still has a goal and every actor start on it still reaches one;
//! after a commit the field and the per-kind routes are recomputed.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::analyze::{analyze, neighbor, Direction, DirectionField};
use crate::grid::{Cell, CellKind, FieldGrid};

/// Road connectivity bits, one per neighbor that is also on a route.
pub const ROAD_UP: u8 = 1;
pub const ROAD_LEFT: u8 = 2;
pub const ROAD_DOWN: u8 = 4;
pub const ROAD_RIGHT: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("cell ({row}, {column}) is outside the grid")]
    OutOfBounds { row: usize, column: usize },
    #[error("the last goal cannot be removed")]
    LastGoal,
    #[error("cell ({row}, {column}) has no path to a goal")]
    UnreachableCell { row: usize, column: usize },
    #[error("edit would leave actor kind {kind} without a path to a goal")]
    StrandsActor { kind: u8 },
    #[error("cell ({row}, {column}) is occupied by an actor")]
    Occupied { row: usize, column: usize },
    #[error("cell ({row}, {column}) is a goal")]
    GoalCell { row: usize, column: usize },
}

/// First actor start kind on `grid` that `field` cannot route to a goal.
pub(crate) fn stranded_start(grid: &FieldGrid, field: &DirectionField) -> Option<u8> {
    grid.actor_starts()
        .into_iter()
        .find(|(_, (r, c))| !field.is_reachable(*r, *c))
        .map(|(kind, _)| kind)
}

#[derive(Debug, Clone)]
pub struct MazeEditor {
    grid: FieldGrid,
    field: Arc<DirectionField>,
    routes: HashMap<u8, Vec<Cell>>,
    route_cells: HashSet<Cell>,
}

impl MazeEditor {
    /// Wrap `grid`, adding a goal if it has none. Fails when an actor start
    /// is already cut off from every goal.
    pub fn new(mut grid: FieldGrid) -> Result<Self, EditError> {
        grid.ensure_goal();
        let field = analyze(&grid);
        if let Some(kind) = stranded_start(&grid, &field) {
            return Err(EditError::StrandsActor { kind });
        }
        let mut editor = Self {
            grid,
            field: Arc::new(field),
            routes: HashMap::new(),
            route_cells: HashSet::new(),
        };
        editor.refresh_routes();
        Ok(editor)
    }

    pub fn grid(&self) -> &FieldGrid {
        &self.grid
    }

    pub fn into_grid(self) -> FieldGrid {
        self.grid
    }

    pub fn field(&self) -> Arc<DirectionField> {
        Arc::clone(&self.field)
    }

    /// Current path from the start of `kind` to its goal.
    pub fn route(&self, kind: u8) -> Option<&[Cell]> {
        self.routes.get(&kind).map(Vec::as_slice)
    }

    /// Set `(row, column)` to `kind`.
    ///
    /// Placing an actor start moves the existing start of that kind; placing
    /// a goal adds another goal. Goals and starts cannot go on an open cell
    /// that is already cut off from every goal.
    pub fn place(&mut self, row: usize, column: usize, kind: CellKind) -> Result<(), EditError> {
        match self.try_place(row, column, kind) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(row, column, ?kind, %err, "edit rejected");
                Err(err)
            }
        }
    }

    /// Reset `(row, column)` to an empty cell.
    pub fn clear(&mut self, row: usize, column: usize) -> Result<(), EditError> {
        self.place(row, column, CellKind::Empty)
    }

    fn try_place(&mut self, row: usize, column: usize, kind: CellKind) -> Result<(), EditError> {
        let previous = self
            .grid
            .get(row, column)
            .ok_or(EditError::OutOfBounds { row, column })?;
        if previous == kind {
            return Ok(());
        }
        if previous == CellKind::Goal && self.grid.goals().len() == 1 {
            return Err(EditError::LastGoal);
        }
        let marks = matches!(kind, CellKind::Goal | CellKind::ActorStart(_));
        if marks && !previous.is_wall() && !self.field.is_reachable(row, column) {
            return Err(EditError::UnreachableCell { row, column });
        }

        let mut candidate = self.grid.clone();
        if let CellKind::ActorStart(k) = kind {
            while let Some((r, c)) = candidate.find(CellKind::ActorStart(k)) {
                candidate.put((r, c), CellKind::Empty);
            }
        }
        candidate.put((row, column), kind);

        let field = analyze(&candidate);
        if let Some(kind) = stranded_start(&candidate, &field) {
            return Err(EditError::StrandsActor { kind });
        }

        self.grid = candidate;
        self.field = Arc::new(field);
        self.refresh_routes();
        Ok(())
    }

    fn refresh_routes(&mut self) {
        self.routes.clear();
        for (kind, (r, c)) in self.grid.actor_starts() {
            if let Ok(route) = self.field.path(r, c) {
                self.routes.insert(kind, route);
            }
        }
        self.route_cells = self.routes.values().flatten().copied().collect();
    }

    /// Which neighbors of a route cell are on a route too, as `ROAD_*` bits.
    /// Zero for cells off every route.
    pub fn road_mask(&self, row: usize, column: usize) -> u8 {
        if !self.route_cells.contains(&(row, column)) {
            return 0;
        }
        let rows = self.grid.rows();
        let columns = self.grid.columns();
        [
            (Direction::Up, ROAD_UP),
            (Direction::Left, ROAD_LEFT),
            (Direction::Down, ROAD_DOWN),
            (Direction::Right, ROAD_RIGHT),
        ]
        .into_iter()
        .filter(|(dir, _)| {
            neighbor((row, column), *dir, rows, columns)
                .is_some_and(|cell| self.route_cells.contains(&cell))
        })
        .fold(0, |mask, (_, bit)| mask | bit)
    }
}
