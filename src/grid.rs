//! Static maze layout: walls, goals and actor start cells.

use thiserror::Error;

/// `(row, column)` coordinate of a grid cell.
pub type Cell = (usize, usize);

pub const WALL_VALUE: i32 = -1;
pub const EMPTY_VALUE: i32 = 0;
pub const GOAL_VALUE: i32 = 1;
/// Smallest value that marks an actor start cell. Every value above it is a
/// distinct actor kind.
pub const FIRST_ACTOR_KIND: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Empty,
    Wall,
    Goal,
    ActorStart(u8),
}

impl CellKind {
    pub fn from_value(v: i32) -> Option<Self> {
        match v {
            WALL_VALUE => Some(CellKind::Wall),
            EMPTY_VALUE => Some(CellKind::Empty),
            GOAL_VALUE => Some(CellKind::Goal),
            v if v >= FIRST_ACTOR_KIND as i32 && v <= u8::MAX as i32 => {
                Some(CellKind::ActorStart(v as u8))
            }
            _ => None,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            CellKind::Wall => WALL_VALUE,
            CellKind::Empty => EMPTY_VALUE,
            CellKind::Goal => GOAL_VALUE,
            CellKind::ActorStart(kind) => kind as i32,
        }
    }

    pub fn is_wall(self) -> bool {
        matches!(self, CellKind::Wall)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid must have at least one row and one column")]
    Empty,
    #[error("row {row} has {found} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("invalid cell value {value} at ({row}, {column})")]
    InvalidValue { row: usize, column: usize, value: i32 },
    #[error("cell ({row}, {column}) is outside the {rows}x{columns} grid")]
    OutOfBounds {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
}

/// Dense row-major maze layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGrid {
    rows: usize,
    columns: usize,
    cells: Vec<CellKind>,
}

impl FieldGrid {
    /// An open grid with no walls, goals or actors. Dimensions are at least 1x1.
    pub fn new(rows: usize, columns: usize) -> Self {
        let rows = rows.max(1);
        let columns = columns.max(1);
        Self {
            rows,
            columns,
            cells: vec![CellKind::Empty; rows * columns],
        }
    }

    pub fn filled(rows: usize, columns: usize, kind: CellKind) -> Self {
        let mut grid = Self::new(rows, columns);
        grid.cells.fill(kind);
        grid
    }

    /// Build a grid from the integer snapshot used by the editing layer:
    /// `-1` wall, `0` empty, `1` goal, `2..` actor start kinds.
    pub fn from_values<R: AsRef<[i32]>>(values: &[R]) -> Result<Self, GridError> {
        let rows = values.len();
        let columns = values.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if rows == 0 || columns == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(rows * columns);
        for (row, line) in values.iter().enumerate() {
            let line = line.as_ref();
            if line.len() != columns {
                return Err(GridError::Ragged {
                    row,
                    expected: columns,
                    found: line.len(),
                });
            }
            for (column, &value) in line.iter().enumerate() {
                let kind = CellKind::from_value(value).ok_or(GridError::InvalidValue {
                    row,
                    column,
                    value,
                })?;
                cells.push(kind);
            }
        }

        Ok(Self {
            rows,
            columns,
            cells,
        })
    }

    pub fn to_values(&self) -> Vec<Vec<i32>> {
        self.cells
            .chunks(self.columns)
            .map(|line| line.iter().map(|k| k.value()).collect())
            .collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn contains(&self, row: usize, column: usize) -> bool {
        row < self.rows && column < self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> Option<CellKind> {
        if !self.contains(row, column) {
            return None;
        }
        Some(self.cells[self.idx(row, column)])
    }

    /// Out-of-bounds cells count as walls.
    pub fn is_wall(&self, row: usize, column: usize) -> bool {
        self.get(row, column).map_or(true, CellKind::is_wall)
    }

    /// Overwrite one cell, returning what was there before.
    pub fn set(&mut self, row: usize, column: usize, kind: CellKind) -> Result<CellKind, GridError> {
        if !self.contains(row, column) {
            return Err(self.out_of_bounds(row, column));
        }
        let idx = self.idx(row, column);
        Ok(std::mem::replace(&mut self.cells[idx], kind))
    }

    /// Overwrite a cell the caller already knows is inside the grid.
    pub(crate) fn put(&mut self, cell: Cell, kind: CellKind) {
        debug_assert!(self.contains(cell.0, cell.1), "cell {cell:?} out of bounds");
        let idx = self.idx(cell.0, cell.1);
        self.cells[idx] = kind;
    }

    pub fn out_of_bounds(&self, row: usize, column: usize) -> GridError {
        GridError::OutOfBounds {
            row,
            column,
            rows: self.rows,
            columns: self.columns,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (Cell, CellKind)> + '_ {
        let columns = self.columns;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &k)| ((i / columns, i % columns), k))
    }

    /// Goal cells in row-major order.
    pub fn goals(&self) -> Vec<Cell> {
        self.cells()
            .filter(|(_, k)| *k == CellKind::Goal)
            .map(|(c, _)| c)
            .collect()
    }

    /// One start cell per distinct actor kind, in row-major order of first
    /// appearance. Later duplicates of a kind are ignored.
    pub fn actor_starts(&self) -> Vec<(u8, Cell)> {
        let mut out: Vec<(u8, Cell)> = Vec::new();
        for (cell, kind) in self.cells() {
            if let CellKind::ActorStart(k) = kind {
                if !out.iter().any(|(seen, _)| *seen == k) {
                    out.push((k, cell));
                }
            }
        }
        out
    }

    pub fn find(&self, kind: CellKind) -> Option<Cell> {
        self.cells().find(|(_, k)| *k == kind).map(|(c, _)| c)
    }

    /// Turn every actor start marker back into an empty cell.
    pub fn clear_actor_starts(&mut self) {
        for k in &mut self.cells {
            if matches!(k, CellKind::ActorStart(_)) {
                *k = CellKind::Empty;
            }
        }
    }

    /// Place a goal at (1, 1) (clamped into the grid) when there is none.
    /// Returns true if a goal was added.
    pub fn ensure_goal(&mut self) -> bool {
        if self.cells.contains(&CellKind::Goal) {
            return false;
        }
        let row = (self.rows - 1).min(1);
        let column = (self.columns - 1).min(1);
        let idx = self.idx(row, column);
        self.cells[idx] = CellKind::Goal;
        true
    }

    fn idx(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }
}
