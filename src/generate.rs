//! Random perfect-maze layouts for demos and benchmarks.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::grid::{Cell, CellKind, FieldGrid};

/// Carve a maze with a randomized depth-first walk.
///
/// Rooms sit on odd coordinates and the walls between them are knocked out as
/// the walk advances, so every room is connected by exactly one path. Even
/// dimensions are shrunk to the next odd value; the minimum is 3x3. The goal
/// is placed in the bottom-right room.
pub fn carve(rows: usize, columns: usize, seed: u64) -> FieldGrid {
    let rows = odd_at_least_3(rows);
    let columns = odd_at_least_3(columns);
    let mut grid = FieldGrid::filled(rows, columns, CellKind::Wall);

    let room_rows = rows / 2;
    let room_cols = columns / 2;
    let mut rng = StdRng::seed_from_u64(seed ^ 0xA5A5_5A5A);
    let mut visited = vec![false; room_rows * room_cols];

    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    visited[0] = true;
    grid.put((1, 1), CellKind::Empty);

    while let Some(&(y, x)) = stack.last() {
        let mut neighbors: Vec<(usize, usize)> = Vec::with_capacity(4);
        if y > 0 && !visited[(y - 1) * room_cols + x] {
            neighbors.push((y - 1, x));
        }
        if x + 1 < room_cols && !visited[y * room_cols + x + 1] {
            neighbors.push((y, x + 1));
        }
        if y + 1 < room_rows && !visited[(y + 1) * room_cols + x] {
            neighbors.push((y + 1, x));
        }
        if x > 0 && !visited[y * room_cols + x - 1] {
            neighbors.push((y, x - 1));
        }

        let Some(&(ny, nx)) = neighbors.choose(&mut rng) else {
            stack.pop();
            continue;
        };

        // Open the target room and the wall cell between the two rooms.
        grid.put((2 * ny + 1, 2 * nx + 1), CellKind::Empty);
        grid.put((y + ny + 1, x + nx + 1), CellKind::Empty);
        visited[ny * room_cols + nx] = true;
        stack.push((ny, nx));
    }

    grid.put((2 * room_rows - 1, 2 * room_cols - 1), CellKind::Goal);
    grid
}

/// Knock out `count` random interior walls that separate two open cells,
/// turning the perfect maze into one with loops and shortcuts.
pub fn braid(grid: &mut FieldGrid, count: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED_B4A1);
    let mut candidates: Vec<Cell> = grid
        .cells()
        .filter(|((r, c), k)| {
            k.is_wall()
                && *r > 0
                && *c > 0
                && *r + 1 < grid.rows()
                && *c + 1 < grid.columns()
                && ((!grid.is_wall(r - 1, *c) && !grid.is_wall(r + 1, *c))
                    || (!grid.is_wall(*r, c - 1) && !grid.is_wall(*r, c + 1)))
        })
        .map(|(cell, _)| cell)
        .collect();
    candidates.shuffle(&mut rng);
    for (r, c) in candidates.into_iter().take(count) {
        grid.put((r, c), CellKind::Empty);
    }
}

/// Put one start marker per kind on distinct random empty cells.
/// Kinds that do not fit are skipped.
pub fn place_starts(grid: &mut FieldGrid, kinds: &[u8], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x0D0D_E5);
    let mut free: Vec<Cell> = grid
        .cells()
        .filter(|(_, k)| *k == CellKind::Empty)
        .map(|(c, _)| c)
        .collect();
    for &kind in kinds {
        if free.is_empty() {
            break;
        }
        let pick = rng.gen_range(0..free.len());
        let (r, c) = free.swap_remove(pick);
        grid.put((r, c), CellKind::ActorStart(kind));
    }
}

fn odd_at_least_3(n: usize) -> usize {
    let n = n.max(3);
    if n % 2 == 0 {
        n - 1
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;

    #[test]
    fn maze_regenerates_deterministically() {
        let a = carve(11, 15, 123);
        let b = carve(11, 15, 123);
        assert_eq!(a, b);
        assert_ne!(a, carve(11, 15, 124));
    }

    #[test]
    fn every_room_reaches_the_goal() {
        let grid = carve(21, 31, 9);
        assert_eq!(grid.rows(), 21);
        assert_eq!(grid.columns(), 31);
        assert_eq!(grid.goals(), vec![(19, 29)]);

        let field = analyze(&grid);
        for ((r, c), kind) in grid.cells() {
            assert_eq!(kind.is_wall(), !field.is_reachable(r, c), "cell ({r}, {c})");
        }
    }

    #[test]
    fn even_dimensions_shrink_to_odd() {
        let grid = carve(10, 2, 1);
        assert_eq!((grid.rows(), grid.columns()), (9, 3));
    }

    #[test]
    fn braiding_only_opens_walls() {
        let mut grid = carve(15, 15, 3);
        let before = grid.cells().filter(|(_, k)| k.is_wall()).count();
        braid(&mut grid, 5, 3);
        let after = grid.cells().filter(|(_, k)| k.is_wall()).count();
        assert_eq!(before - after, 5);
        assert_eq!(grid.goals().len(), 1);
    }

    #[test]
    fn starts_land_on_distinct_empty_cells() {
        let mut grid = carve(9, 9, 5);
        place_starts(&mut grid, &[2, 3, 4], 5);
        let starts = grid.actor_starts();
        assert_eq!(starts.len(), 3);
        let field = analyze(&grid);
        for (_, (r, c)) in starts {
            assert!(field.is_reachable(r, c));
        }
    }
}
