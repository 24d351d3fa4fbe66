//! Multi-source BFS direction field over a [`FieldGrid`].
//!
//! Every reachable cell gets the direction of its first step toward the
//! nearest goal. The field is a snapshot: it is never edited after
//! [`analyze`] returns, callers compute a fresh one when the grid changes.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use crate::grid::{Cell, CellKind, FieldGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    AtGoal,
    Unreachable,
}

impl Direction {
    /// The four moves, in BFS expansion order.
    pub const MOVES: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// `(d_row, d_column)` for moves, `None` for terminal markers.
    pub fn delta(self) -> Option<(isize, isize)> {
        match self {
            Direction::Up => Some((-1, 0)),
            Direction::Down => Some((1, 0)),
            Direction::Left => Some((0, -1)),
            Direction::Right => Some((0, 1)),
            Direction::AtGoal | Direction::Unreachable => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            other => other,
        }
    }

    pub fn is_move(self) -> bool {
        self.delta().is_some()
    }

    pub fn as_char(self) -> char {
        match self {
            Direction::Up => '^',
            Direction::Down => 'v',
            Direction::Left => '<',
            Direction::Right => '>',
            Direction::AtGoal => 'X',
            Direction::Unreachable => ' ',
        }
    }
}

/// Neighbor of `cell` in direction `dir`, if it lies inside `rows x columns`.
pub fn neighbor(cell: Cell, dir: Direction, rows: usize, columns: usize) -> Option<Cell> {
    offset(cell, dir, 1, rows, columns)
}

/// Cell `distance` steps away from `cell` along `dir`, if inside the grid.
pub fn offset(cell: Cell, dir: Direction, distance: usize, rows: usize, columns: usize) -> Option<Cell> {
    let (dr, dc) = dir.delta()?;
    let row = cell.0.checked_add_signed(dr * distance as isize)?;
    let column = cell.1.checked_add_signed(dc * distance as isize)?;
    (row < rows && column < columns).then_some((row, column))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cell ({row}, {column}) has no path to a goal")]
pub struct UnreachableError {
    pub row: usize,
    pub column: usize,
}

const UNVISITED: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionField {
    rows: usize,
    columns: usize,
    directions: Vec<Direction>,
    distances: Vec<u32>,
    walls: Vec<bool>,
    goals: Vec<Cell>,
}

/// Compute the direction field for `grid`.
///
/// BFS is seeded with every goal at distance 0 (row-major order) and expands
/// Up, Down, Left, Right. A newly discovered cell points back at the cell
/// that discovered it, so FIFO order decides ties between equally near goals.
pub fn analyze(grid: &FieldGrid) -> DirectionField {
    let rows = grid.rows();
    let columns = grid.columns();
    let size = rows * columns;

    let mut directions = vec![Direction::Unreachable; size];
    let mut distances = vec![UNVISITED; size];
    let mut walls = vec![false; size];
    let mut goals = Vec::new();
    let mut queue = VecDeque::new();

    for ((row, column), kind) in grid.cells() {
        let idx = row * columns + column;
        match kind {
            CellKind::Wall => walls[idx] = true,
            CellKind::Goal => {
                directions[idx] = Direction::AtGoal;
                distances[idx] = 0;
                goals.push((row, column));
                queue.push_back((row, column));
            }
            CellKind::Empty | CellKind::ActorStart(_) => {}
        }
    }

    while let Some(cell) = queue.pop_front() {
        let cost = distances[cell.0 * columns + cell.1];
        for dir in Direction::MOVES {
            let Some(nb) = neighbor(cell, dir, rows, columns) else {
                continue;
            };
            let ni = nb.0 * columns + nb.1;
            if walls[ni] || distances[ni] != UNVISITED {
                continue;
            }
            distances[ni] = cost + 1;
            // Discovered by moving `dir` away from the goal side, so the
            // way back is the opposite move.
            directions[ni] = dir.opposite();
            queue.push_back(nb);
        }
    }

    DirectionField {
        rows,
        columns,
        directions,
        distances,
        walls,
        goals,
    }
}

impl DirectionField {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn contains(&self, row: usize, column: usize) -> bool {
        row < self.rows && column < self.columns
    }

    /// Out-of-bounds reads are `Unreachable`.
    pub fn direction(&self, row: usize, column: usize) -> Direction {
        if !self.contains(row, column) {
            return Direction::Unreachable;
        }
        self.directions[self.idx(row, column)]
    }

    /// Signed variant of [`DirectionField::direction`] for callers holding
    /// positions that may have drifted outside the grid.
    pub fn direction_at(&self, row: isize, column: isize) -> Direction {
        if row < 0 || column < 0 {
            return Direction::Unreachable;
        }
        self.direction(row as usize, column as usize)
    }

    /// BFS distance to the nearest goal, `None` when unreachable.
    pub fn distance(&self, row: usize, column: usize) -> Option<u32> {
        if !self.contains(row, column) {
            return None;
        }
        let d = self.distances[self.idx(row, column)];
        (d != UNVISITED).then_some(d)
    }

    pub fn is_reachable(&self, row: usize, column: usize) -> bool {
        self.distance(row, column).is_some()
    }

    /// Out-of-bounds cells count as walls.
    pub fn is_wall(&self, row: usize, column: usize) -> bool {
        if !self.contains(row, column) {
            return true;
        }
        self.walls[self.idx(row, column)]
    }

    pub fn goals(&self) -> &[Cell] {
        &self.goals
    }

    pub fn reachable_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let columns = self.columns;
        self.distances
            .iter()
            .enumerate()
            .filter(|(_, d)| **d != UNVISITED)
            .map(move |(i, _)| (i / columns, i % columns))
    }

    /// Shortest path from `(row, column)` to its goal, both endpoints included.
    pub fn path(&self, row: usize, column: usize) -> Result<Vec<Cell>, UnreachableError> {
        let err = UnreachableError { row, column };
        let distance = self.distance(row, column).ok_or(err)?;

        let mut path = Vec::with_capacity(distance as usize + 1);
        let mut cell = (row, column);
        // Each move lowers the distance by one.
        for _ in 0..=distance {
            path.push(cell);
            match self.direction(cell.0, cell.1) {
                Direction::AtGoal => return Ok(path),
                Direction::Unreachable => return Err(err),
                dir => {
                    cell = neighbor(cell, dir, self.rows, self.columns).ok_or(err)?;
                }
            }
        }
        Err(err)
    }

    fn idx(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }
}

impl fmt::Display for DirectionField {
    /// One line per row: arrows for moves, `X` for goals, `#` for walls and
    /// a blank for unreachable open cells.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for column in 0..self.columns {
                let c = if self.is_wall(row, column) {
                    '#'
                } else {
                    self.direction(row, column).as_char()
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate;

    fn grid(values: &[&[i32]]) -> FieldGrid {
        FieldGrid::from_values(values).unwrap()
    }

    /// Reference BFS distances computed independently of the field.
    fn brute_distance(grid: &FieldGrid, start: Cell) -> Option<u32> {
        let mut seen = vec![false; grid.rows() * grid.columns()];
        let mut queue = VecDeque::from([(start, 0u32)]);
        seen[start.0 * grid.columns() + start.1] = true;
        while let Some((cell, d)) = queue.pop_front() {
            if grid.get(cell.0, cell.1) == Some(CellKind::Goal) {
                return Some(d);
            }
            for dir in Direction::MOVES {
                if let Some(nb) = neighbor(cell, dir, grid.rows(), grid.columns()) {
                    let i = nb.0 * grid.columns() + nb.1;
                    if !seen[i] && !grid.is_wall(nb.0, nb.1) {
                        seen[i] = true;
                        queue.push_back((nb, d + 1));
                    }
                }
            }
        }
        None
    }

    #[test]
    fn open_three_by_three_path() {
        let mut g = FieldGrid::new(3, 3);
        g.set(0, 0, CellKind::Goal).unwrap();
        let field = analyze(&g);

        let path = field.path(2, 2).unwrap();
        assert_eq!(path, vec![(2, 2), (2, 1), (2, 0), (1, 0), (0, 0)]);
        assert_eq!(field.distance(2, 2), Some(4));
        assert_eq!(field.direction(0, 0), Direction::AtGoal);
    }

    #[test]
    fn walled_in_cell_is_unreachable() {
        let g = grid(&[
            &[1, -1, 0],
            &[-1, 0, -1],
            &[0, -1, 0],
        ]);
        let field = analyze(&g);
        assert_eq!(field.direction(1, 1), Direction::Unreachable);
        assert_eq!(field.path(1, 1), Err(UnreachableError { row: 1, column: 1 }));
        assert_eq!(field.direction(0, 1), Direction::Unreachable);
    }

    #[test]
    fn out_of_bounds_path_fails() {
        let field = analyze(&grid(&[&[1, 0]]));
        assert_eq!(field.direction(5, 0), Direction::Unreachable);
        assert_eq!(field.direction_at(-1, 0), Direction::Unreachable);
        assert!(field.path(0, 2).is_err());
    }

    #[test]
    fn directions_point_at_discoverer() {
        let field = analyze(&grid(&[&[0, 1, 0], &[0, -1, 0]]));
        assert_eq!(field.direction(0, 0), Direction::Right);
        assert_eq!(field.direction(0, 2), Direction::Left);
        assert_eq!(field.direction(1, 0), Direction::Up);
        assert_eq!(field.direction(1, 2), Direction::Up);
        assert!(field.is_wall(1, 1));
    }

    #[test]
    fn nearest_of_several_goals_wins() {
        let field = analyze(&grid(&[&[1, 0, 0, 0, 0, 0, 1]]));
        assert_eq!(field.distance(0, 2), Some(2));
        assert_eq!(field.direction(0, 2), Direction::Left);
        assert_eq!(field.distance(0, 5), Some(1));
        assert_eq!(field.direction(0, 5), Direction::Right);
        assert_eq!(field.goals(), &[(0, 0), (0, 6)]);
    }

    #[test]
    fn no_goal_means_everything_unreachable() {
        let field = analyze(&FieldGrid::new(4, 4));
        assert_eq!(field.reachable_cells().count(), 0);
    }

    #[test]
    fn field_properties_hold_on_generated_mazes() {
        for seed in [1u64, 7, 42, 99] {
            let g = generate::carve(15, 21, seed);
            let field = analyze(&g);
            assert_eq!(field, analyze(&g), "analysis must be deterministic");

            let limit = g.rows() * g.columns();
            for ((row, column), kind) in g.cells() {
                let expected = brute_distance(&g, (row, column));
                if kind.is_wall() {
                    assert_eq!(field.direction(row, column), Direction::Unreachable);
                    continue;
                }
                assert_eq!(field.distance(row, column), expected);
                match expected {
                    Some(d) => {
                        let path = field.path(row, column).unwrap();
                        assert_eq!(path.len(), d as usize + 1);
                        assert!(path.len() <= limit);
                        let last = path[path.len() - 1];
                        assert_eq!(field.direction(last.0, last.1), Direction::AtGoal);
                        for w in path.windows(2) {
                            let (a, b) = (w[0], w[1]);
                            assert_eq!(
                                field.distance(b.0, b.1).unwrap() + 1,
                                field.distance(a.0, a.1).unwrap()
                            );
                        }
                    }
                    None => assert!(field.path(row, column).is_err()),
                }
            }
        }
    }

    #[test]
    fn renders_arrows() {
        let field = analyze(&grid(&[&[0, 1], &[-1, 0]]));
        assert_eq!(field.to_string(), ">X\n#^\n");
    }
}
