//! Index configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Tuning knobs for the quadtree index.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Starting value for the smallest non-degenerate extent seen by the
    /// tree. It only shrinks as smaller envelopes are inserted, and pads
    /// degenerate envelopes for cell placement.
    #[serde(default = "default_initial_min_extent")]
    pub initial_min_extent: f64,
    /// Upper bound on grow-until-containment iterations when computing a
    /// cell. Exceeding it means an internal invariant was violated.
    #[serde(default = "default_max_growth_steps")]
    pub max_growth_steps: u32,
}

impl IndexConfig {
    /// Load configuration from `spatial.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("spatial.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No spatial.toml found, using default index config");
            Ok(Self::default())
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            initial_min_extent: default_initial_min_extent(),
            max_growth_steps: default_max_growth_steps(),
        }
    }
}

fn default_initial_min_extent() -> f64 {
    1.0
}
// The f64 exponent range spans roughly 2046 levels, so a cell can double at
// most that many times before the arithmetic itself gives out.
fn default_max_growth_steps() -> u32 {
    2048
}
