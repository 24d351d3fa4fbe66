//! Simulation tuning.
//!
//! Every constant here is gameplay tuning rather than an invariant; the
//! defaults reproduce the classic behavior of each actor variant.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::FIRST_ACTOR_KIND;

/// Movement policy of an actor, picked from its start kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Variant {
    Base,
    Speedster,
    Accelerator,
    Scatterbrain,
    Jumper,
    Teleporter,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Base => "base",
            Variant::Speedster => "speedster",
            Variant::Accelerator => "accelerator",
            Variant::Scatterbrain => "scatterbrain",
            Variant::Jumper => "jumper",
            Variant::Teleporter => "teleporter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Some(Variant::Base),
            "speedster" => Some(Variant::Speedster),
            "accelerator" => Some(Variant::Accelerator),
            "scatterbrain" => Some(Variant::Scatterbrain),
            "jumper" => Some(Variant::Jumper),
            "teleporter" => Some(Variant::Teleporter),
            _ => None,
        }
    }
}

fn default_time_unit_ms() -> u64 {
    1000
}

fn default_substeps() -> u32 {
    16
}

fn default_jump_ms() -> u64 {
    200
}

fn default_jump_height() -> f32 {
    0.25
}

fn default_speedster_factor() -> f32 {
    0.5
}

fn default_scatterbrain_probability() -> f32 {
    0.2
}

fn default_variants() -> Vec<Variant> {
    vec![
        Variant::Base,
        Variant::Speedster,
        Variant::Accelerator,
        Variant::Scatterbrain,
        Variant::Jumper,
        Variant::Teleporter,
    ]
}

fn default_event_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AcceleratorConfig {
    /// Chance per step that the actor's speed multiplier drops.
    #[cfg_attr(feature = "serde", serde(default = "AcceleratorConfig::default_probability"))]
    pub probability: f32,
    /// First drop applied to the speed multiplier.
    #[cfg_attr(feature = "serde", serde(default = "AcceleratorConfig::default_decrement"))]
    pub initial_decrement: f32,
    /// How much the drop itself shrinks after every trigger.
    #[cfg_attr(feature = "serde", serde(default = "AcceleratorConfig::default_decay"))]
    pub decrement_decay: f32,
    #[cfg_attr(feature = "serde", serde(default = "AcceleratorConfig::default_floor"))]
    pub speed_floor: f32,
}

impl AcceleratorConfig {
    fn default_probability() -> f32 {
        0.1
    }

    fn default_decrement() -> f32 {
        0.25
    }

    fn default_decay() -> f32 {
        0.05
    }

    fn default_floor() -> f32 {
        0.25
    }
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            probability: Self::default_probability(),
            initial_decrement: Self::default_decrement(),
            decrement_decay: Self::default_decay(),
            speed_floor: Self::default_floor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JumperConfig {
    #[cfg_attr(feature = "serde", serde(default = "JumperConfig::default_probability"))]
    pub probability: f32,
    /// A hop over a wall is only taken when it shortens the remaining path
    /// by at least this many cells.
    #[cfg_attr(feature = "serde", serde(default = "JumperConfig::default_min_gain"))]
    pub min_gain: usize,
}

impl JumperConfig {
    fn default_probability() -> f32 {
        0.2
    }

    fn default_min_gain() -> usize {
        5
    }
}

impl Default for JumperConfig {
    fn default() -> Self {
        Self {
            probability: Self::default_probability(),
            min_gain: Self::default_min_gain(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TeleporterConfig {
    #[cfg_attr(feature = "serde", serde(default = "TeleporterConfig::default_probability"))]
    pub probability: f32,
    /// Landing cells must be at least this far from every goal, in rows and
    /// in columns.
    #[cfg_attr(feature = "serde", serde(default = "TeleporterConfig::default_min_goal_offset"))]
    pub min_goal_offset: usize,
    #[cfg_attr(feature = "serde", serde(default = "TeleporterConfig::default_vibrate_ms"))]
    pub vibrate_ms: u64,
}

impl TeleporterConfig {
    fn default_probability() -> f32 {
        0.2
    }

    fn default_min_goal_offset() -> usize {
        5
    }

    fn default_vibrate_ms() -> u64 {
        100
    }
}

impl Default for TeleporterConfig {
    fn default() -> Self {
        Self {
            probability: Self::default_probability(),
            min_goal_offset: Self::default_min_goal_offset(),
            vibrate_ms: Self::default_vibrate_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimConfig {
    /// Nominal duration of one cell step.
    #[cfg_attr(feature = "serde", serde(default = "default_time_unit_ms"))]
    pub time_unit_ms: u64,
    /// Position updates published per animation.
    #[cfg_attr(feature = "serde", serde(default = "default_substeps"))]
    pub substeps: u32,
    /// Duration of the in-place jump of a stuck actor.
    #[cfg_attr(feature = "serde", serde(default = "default_jump_ms"))]
    pub jump_ms: u64,
    /// Peak of the jump arc, in cells.
    #[cfg_attr(feature = "serde", serde(default = "default_jump_height"))]
    pub jump_height: f32,
    /// Step duration multiplier of the speedster.
    #[cfg_attr(feature = "serde", serde(default = "default_speedster_factor"))]
    pub speedster_factor: f32,
    #[cfg_attr(feature = "serde", serde(default = "default_scatterbrain_probability"))]
    pub scatterbrain_probability: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub accelerator: AcceleratorConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub jumper: JumperConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub teleporter: TeleporterConfig,
    /// Variant per actor kind; index 0 is kind 2. Kinds past the end are `Base`.
    #[cfg_attr(feature = "serde", serde(default = "default_variants"))]
    pub variants: Vec<Variant>,
    /// Seed for per-actor randomness. `None` draws from OS entropy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: Option<u64>,
    /// Buffered events per subscriber before slow readers start lagging.
    #[cfg_attr(feature = "serde", serde(default = "default_event_capacity"))]
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: default_time_unit_ms(),
            substeps: default_substeps(),
            jump_ms: default_jump_ms(),
            jump_height: default_jump_height(),
            speedster_factor: default_speedster_factor(),
            scatterbrain_probability: default_scatterbrain_probability(),
            accelerator: AcceleratorConfig::default(),
            jumper: JumperConfig::default(),
            teleporter: TeleporterConfig::default(),
            variants: default_variants(),
            seed: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl SimConfig {
    /// Clamp every field into a range the engine can run with.
    pub fn sanitized(mut self) -> Self {
        self.time_unit_ms = self.time_unit_ms.clamp(1, 60_000);
        self.substeps = self.substeps.clamp(1, 1_000);
        self.jump_ms = self.jump_ms.clamp(1, 60_000);
        self.jump_height = self.jump_height.clamp(0.0, 1.0);
        self.speedster_factor = self.speedster_factor.clamp(0.01, 100.0);
        self.scatterbrain_probability = self.scatterbrain_probability.clamp(0.0, 1.0);

        let a = &mut self.accelerator;
        a.probability = a.probability.clamp(0.0, 1.0);
        a.speed_floor = a.speed_floor.clamp(0.01, 1.0);
        a.initial_decrement = a.initial_decrement.max(0.0);
        a.decrement_decay = a.decrement_decay.max(0.0);

        self.jumper.probability = self.jumper.probability.clamp(0.0, 1.0);
        self.teleporter.probability = self.teleporter.probability.clamp(0.0, 1.0);
        self.teleporter.vibrate_ms = self.teleporter.vibrate_ms.clamp(1, 60_000);
        self.event_capacity = self.event_capacity.clamp(16, 1 << 20);
        self
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn jump_duration(&self) -> Duration {
        Duration::from_millis(self.jump_ms)
    }

    pub fn vibrate_duration(&self) -> Duration {
        Duration::from_millis(self.teleporter.vibrate_ms)
    }

    pub fn variant_for(&self, kind: u8) -> Variant {
        kind.checked_sub(FIRST_ACTOR_KIND)
            .and_then(|i| self.variants.get(i as usize).copied())
            .unwrap_or(Variant::Base)
    }

    /// Initial step duration multiplier for a fresh actor of `variant`.
    pub fn initial_speed(&self, variant: Variant) -> f32 {
        match variant {
            Variant::Speedster => self.speedster_factor,
            _ => 1.0,
        }
    }
}
