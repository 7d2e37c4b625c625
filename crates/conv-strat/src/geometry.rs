//! Grid geometry for reflectivity volumes.

use serde::{Deserialize, Serialize};

use crate::error::{ConvStratError, Result};

/// Kilometres per degree of arc on a sphere of the WGS84 mean radius
/// (6371.0088 km).
pub const KM_PER_DEG_AT_EQ: f64 = 111.198838;

/// Horizontal and vertical layout of a Cartesian or lat/lon volume.
///
/// For lat/lon grids `dx`, `dy`, `minx`, `miny` are in degrees; the km
/// spacing used for kernels is evaluated at the grid's central latitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64,
    pub minx: f64,
    pub miny: f64,
    /// Height of each vertical level in km.
    pub z_km: Vec<f64>,
    pub is_lat_lon: bool,
}

impl GridGeometry {
    /// Create and validate a geometry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        minx: f64,
        miny: f64,
        z_km: Vec<f64>,
        is_lat_lon: bool,
    ) -> Result<Self> {
        let geom = Self {
            nx,
            ny,
            dx,
            dy,
            minx,
            miny,
            z_km,
            is_lat_lon,
        };
        geom.validate()?;
        Ok(geom)
    }

    /// Cartesian geometry with uniform level spacing, handy for synthetic volumes.
    pub fn cartesian(nx: usize, ny: usize, dx_km: f64, dy_km: f64, z_km: Vec<f64>) -> Result<Self> {
        Self::new(nx, ny, dx_km, dy_km, 0.0, 0.0, z_km, false)
    }

    /// Check dimensions and spacing.
    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(ConvStratError::invalid_geometry(format!(
                "grid must be at least 1x1, got {}x{}",
                self.nx, self.ny
            )));
        }
        if self.z_km.is_empty() {
            return Err(ConvStratError::invalid_geometry("grid must have at least one level"));
        }
        if !(self.dx.is_finite() && self.dx > 0.0) || !(self.dy.is_finite() && self.dy > 0.0) {
            return Err(ConvStratError::invalid_geometry(format!(
                "grid spacing must be positive, got dx={} dy={}",
                self.dx, self.dy
            )));
        }
        if self.z_km.iter().any(|z| !z.is_finite()) {
            return Err(ConvStratError::invalid_geometry("level heights must be finite"));
        }
        if self.is_lat_lon && self.mean_lat_deg().abs() >= 90.0 {
            return Err(ConvStratError::invalid_geometry(
                "lat/lon grid must be centred away from the poles",
            ));
        }
        Ok(())
    }

    pub fn nz(&self) -> usize {
        self.z_km.len()
    }

    /// Cells per horizontal level.
    pub fn n_plane(&self) -> usize {
        self.nx * self.ny
    }

    /// Cells in the full volume.
    pub fn n_volume(&self) -> usize {
        self.n_plane() * self.nz()
    }

    /// Latitude of the grid centre (lat/lon grids only).
    pub fn mean_lat_deg(&self) -> f64 {
        self.miny + self.ny as f64 * self.dy / 2.0
    }

    /// Cell width in km.
    pub fn dx_km(&self) -> f64 {
        if self.is_lat_lon {
            self.dx * KM_PER_DEG_AT_EQ * self.mean_lat_deg().to_radians().cos()
        } else {
            self.dx
        }
    }

    /// Cell height in km.
    pub fn dy_km(&self) -> f64 {
        if self.is_lat_lon {
            self.dy * KM_PER_DEG_AT_EQ
        } else {
            self.dy
        }
    }

    /// Indices of the levels whose height lies in `[min_ht_km, max_ht_km]`.
    pub fn levels_in_band(&self, min_ht_km: f64, max_ht_km: f64) -> Vec<usize> {
        self.z_km
            .iter()
            .enumerate()
            .filter(|(_, &z)| z >= min_ht_km && z <= max_ht_km)
            .map(|(iz, _)| iz)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_grid() {
        assert!(GridGeometry::cartesian(0, 5, 1.0, 1.0, vec![1.0]).is_err());
        assert!(GridGeometry::cartesian(5, 0, 1.0, 1.0, vec![1.0]).is_err());
        assert!(GridGeometry::cartesian(5, 5, 1.0, 1.0, vec![]).is_err());
    }

    #[test]
    fn test_rejects_bad_spacing() {
        assert!(GridGeometry::cartesian(5, 5, 0.0, 1.0, vec![1.0]).is_err());
        assert!(GridGeometry::cartesian(5, 5, 1.0, -1.0, vec![1.0]).is_err());
        assert!(GridGeometry::cartesian(5, 5, f64::NAN, 1.0, vec![1.0]).is_err());
    }

    #[test]
    fn test_cartesian_spacing_is_passthrough() {
        let geom = GridGeometry::cartesian(10, 20, 0.5, 2.0, vec![1.0, 2.0]).unwrap();
        assert_eq!(geom.dx_km(), 0.5);
        assert_eq!(geom.dy_km(), 2.0);
        assert_eq!(geom.n_plane(), 200);
        assert_eq!(geom.n_volume(), 400);
    }

    #[test]
    fn test_latlon_spacing_uses_central_latitude() {
        // 0.01 deg cells, 100 rows starting at 59.5N -> centre at 60N
        let geom =
            GridGeometry::new(100, 100, 0.01, 0.01, 10.0, 59.5, vec![1.0], true).unwrap();
        assert!((geom.mean_lat_deg() - 60.0).abs() < 1e-9);
        assert!((geom.dy_km() - 1.11198838).abs() < 1e-6);
        // cos(60) = 0.5
        assert!((geom.dx_km() - 0.55599419).abs() < 1e-6);
    }

    #[test]
    fn test_levels_in_band() {
        let geom =
            GridGeometry::cartesian(2, 2, 1.0, 1.0, vec![0.5, 1.5, 2.5, 3.5, 4.5]).unwrap();
        assert_eq!(geom.levels_in_band(1.0, 3.5), vec![1, 2, 3]);
        assert_eq!(geom.levels_in_band(0.0, 30.0), vec![0, 1, 2, 3, 4]);
        assert!(geom.levels_in_band(10.0, 20.0).is_empty());
    }
}
