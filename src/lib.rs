//! Maze direction fields and a concurrent actor simulation that walks them.

pub mod actor;
pub mod analyze;
pub mod behavior;
mod board;
pub mod config;
pub mod editor;
pub mod generate;
pub mod grid;
pub mod scheduler;

pub use actor::{ActorId, ActorSnapshot, ActorState};
pub use analyze::{analyze, Direction, DirectionField, UnreachableError};
pub use behavior::ActorExit;
pub use board::SimEvent;
pub use config::{AcceleratorConfig, JumperConfig, SimConfig, TeleporterConfig, Variant};
pub use editor::{EditError, MazeEditor};
pub use grid::{Cell, CellKind, FieldGrid, GridError};
pub use scheduler::{Scheduler, SchedulerError};
