//! Background reflectivity to convective search radius.

use crate::config::ConvRadiusConfig;
use crate::error::Result;
use crate::grid::{is_valid, Grid, MISSING_VALUE};

/// Piecewise-linear ramp from background dBZ to convective radius (km).
///
/// ```text
///  radius
///    max ┤            ┌──────
///        │           /
///    min ┼──────────┘
///        └──────────┬───┬────── background dBZ
///                 min  max
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvectiveRadiusFunction {
    config: ConvRadiusConfig,
}

impl ConvectiveRadiusFunction {
    /// Build the ramp, rejecting inverted or degenerate settings.
    pub fn new(config: ConvRadiusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConvRadiusConfig {
        &self.config
    }

    /// Convective radius for one background value; missing stays missing.
    pub fn radius_km(&self, bg_dbz: f32) -> f32 {
        if !is_valid(bg_dbz) {
            return MISSING_VALUE;
        }
        let cfg = &self.config;
        let bg = bg_dbz as f64;
        let radius = if bg <= cfg.min_dbz {
            cfg.min_radius_km
        } else if bg >= cfg.max_dbz {
            cfg.max_radius_km
        } else {
            let frac = (bg - cfg.min_dbz) / (cfg.max_dbz - cfg.min_dbz);
            cfg.min_radius_km + frac * (cfg.max_radius_km - cfg.min_radius_km)
        };
        radius as f32
    }

    /// Evaluate the ramp at every cell of a background grid.
    pub fn compute_grid(&self, background: &Grid<f32>) -> Grid<f32> {
        let mut radius = background.clone();
        for val in radius.as_mut_slice() {
            *val = self.radius_km(*val);
        }
        radius
    }
}
