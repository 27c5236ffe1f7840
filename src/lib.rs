use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod flock;

pub use flock::{Boid, Flock};

/// Tunable coefficients for the simulation, replaced wholesale between
/// frames by whoever drives the loop. A change to `total_boids` is a reseed
/// request, not a value [`Flock`] picks up on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    pub turn_factor: f32,
    pub visible_range: f32,
    pub protected_range: f32,
    pub centering_factor: f32,
    pub avoid_factor: f32,
    pub matching_factor: f32,
    pub bias_val: f32,

    pub max_speed: f32,
    pub min_speed: f32,

    pub left_margin: f32,
    pub right_margin: f32,
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub far_margin: f32,
    pub close_margin: f32,

    pub total_boids: usize,

    /// Render-only: ask the renderer to draw the margin box. No effect on
    /// the simulation math.
    pub show_boundary: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            turn_factor: 0.1,
            visible_range: 0.5,
            protected_range: 0.5,
            centering_factor: 0.01,
            avoid_factor: 0.08,
            matching_factor: 0.05,
            bias_val: 0.002,

            max_speed: 5.0,
            min_speed: 2.0,

            left_margin: -2.5,
            right_margin: 2.5,
            top_margin: 2.0,
            bottom_margin: -2.0,
            far_margin: 2.5,
            close_margin: -2.5,

            total_boids: 500,

            show_boundary: false,
        }
    }
}

impl SimulationParameters {
    /// Loads parameters from a JSON file. Missing fields fall back to the
    /// defaults, so a file only needs to name the values it overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read parameter file '{}'", path.display()))?;
        let params: SimulationParameters = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON from '{}'", path.display()))?;
        params.validate()?;
        Ok(params)
    }

    /// Sanity checks for the intake layer. The simulation core assumes a
    /// well-formed record and never validates; reject bad input here before
    /// it reaches a [`Flock`].
    pub fn validate(&self) -> Result<()> {
        if self.total_boids == 0 {
            anyhow::bail!("total_boids must be greater than 0");
        }
        if self.visible_range <= 0.0 {
            anyhow::bail!("visible_range must be positive");
        }
        if self.protected_range <= 0.0 {
            anyhow::bail!("protected_range must be positive");
        }
        if self.min_speed < 0.0 {
            anyhow::bail!("min_speed must not be negative");
        }
        if self.min_speed > self.max_speed {
            anyhow::bail!(
                "min_speed ({}) must not exceed max_speed ({})",
                self.min_speed,
                self.max_speed
            );
        }
        if self.left_margin >= self.right_margin {
            anyhow::bail!("left_margin must be less than right_margin");
        }
        if self.bottom_margin >= self.top_margin {
            anyhow::bail!("bottom_margin must be less than top_margin");
        }
        if self.close_margin >= self.far_margin {
            anyhow::bail!("close_margin must be less than far_margin");
        }
        Ok(())
    }
}
