//! Per-actor simulation state and the read-only snapshot handed to observers.

use std::time::Duration;

use crate::analyze::Direction;
use crate::config::{AcceleratorConfig, SimConfig, Variant};
use crate::grid::Cell;

pub type ActorId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Stepping along the direction field.
    Following,
    /// Standing on a cell without a usable direction; jumps in place.
    Stuck,
    /// Terminal: the actor stands on a goal.
    AtGoal,
}

/// What a renderer needs to draw one actor. Published whole, so readers
/// never observe half of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub kind: u8,
    pub variant: Variant,
    /// Integer part is the current cell, fractional part the progress of the
    /// active step.
    pub row: f32,
    pub column: f32,
    /// Visual displacement of jump and vibrate animations, in cells.
    pub offset: (f32, f32),
    pub direction: Direction,
    pub speed: f32,
    pub state: ActorState,
}

impl ActorSnapshot {
    /// Cells the actor currently overlaps: the cell it left and the cell it
    /// is entering. Both are the same when it stands still.
    pub fn footprint(&self) -> [(isize, isize); 2] {
        [
            (self.row.floor() as isize, self.column.floor() as isize),
            (self.row.ceil() as isize, self.column.ceil() as isize),
        ]
    }

    /// The cell a following actor is stepping into. At a whole-number
    /// position this is the neighbor along `direction`.
    fn target(&self) -> Option<(isize, isize)> {
        if self.state != ActorState::Following {
            return None;
        }
        let (dr, dc) = self.direction.delta()?;
        let [from, to] = self.footprint();
        let (r, c) = match self.direction {
            Direction::Down | Direction::Right => from,
            _ => to,
        };
        Some((r + dr, c + dc))
    }

    /// Whether the actor overlaps `(row, column)` or is about to enter it.
    pub fn covers(&self, row: usize, column: usize) -> bool {
        let cell = (row as isize, column as isize);
        self.footprint().contains(&cell) || self.target() == Some(cell)
    }

    /// The cell the actor is moving into, or the one it stands on.
    pub fn heading(&self) -> Option<Cell> {
        let (r, c) = self.target().unwrap_or(self.footprint()[0]);
        (r >= 0 && c >= 0).then_some((r as usize, c as usize))
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub kind: u8,
    pub variant: Variant,
    pub row: f32,
    pub column: f32,
    pub offset: (f32, f32),
    pub direction: Direction,
    /// Multiplier on the nominal step duration.
    pub speed: f32,
    /// Next speed drop of an accelerator.
    pub decrement: f32,
    pub state: ActorState,
    /// Most recently recorded path to a goal.
    pub route: Vec<Cell>,
}

impl Actor {
    pub fn new(id: ActorId, kind: u8, variant: Variant, cell: Cell, config: &SimConfig) -> Self {
        Self {
            id,
            kind,
            variant,
            row: cell.0 as f32,
            column: cell.1 as f32,
            offset: (0.0, 0.0),
            direction: Direction::Unreachable,
            speed: config.initial_speed(variant),
            decrement: config.accelerator.initial_decrement,
            state: ActorState::Following,
            route: Vec::new(),
        }
    }

    /// Current discrete cell, possibly outside the grid.
    pub fn cell(&self) -> (isize, isize) {
        (self.row.floor() as isize, self.column.floor() as isize)
    }

    /// Current discrete cell if it has non-negative coordinates.
    pub fn grid_cell(&self) -> Option<Cell> {
        let (r, c) = self.cell();
        (r >= 0 && c >= 0).then_some((r as usize, c as usize))
    }

    /// Move instantly onto `cell`, dropping any animation offset.
    pub fn place(&mut self, cell: Cell) {
        self.row = cell.0 as f32;
        self.column = cell.1 as f32;
        self.offset = (0.0, 0.0);
    }

    pub fn step_duration(&self, config: &SimConfig) -> Duration {
        config.time_unit().mul_f32(self.speed)
    }

    /// One accelerator trigger: shorten the step duration by the current
    /// decrement, then shrink the decrement. Neither goes below its floor.
    pub fn accelerate(&mut self, config: &AcceleratorConfig) {
        if self.speed > config.speed_floor {
            self.speed = (self.speed - self.decrement).max(config.speed_floor);
        }
        if self.decrement > 0.0 {
            self.decrement = (self.decrement - config.decrement_decay).max(0.0);
        }
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            kind: self.kind,
            variant: self.variant,
            row: self.row,
            column: self.column,
            offset: self.offset,
            direction: self.direction,
            speed: self.speed,
            state: self.state,
        }
    }
}
