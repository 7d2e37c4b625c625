//! Common test fixtures for conv-strat tests.
//!
//! Plain tuples and constants only, so this crate does not depend on the
//! partitioner itself.

/// Grid geometries for testing.
pub mod grid {
    /// Geometry description: (nx, ny, dx, dy, minx, miny, is_lat_lon).
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GridSpec {
        pub nx: usize,
        pub ny: usize,
        pub dx: f64,
        pub dy: f64,
        pub minx: f64,
        pub miny: f64,
        pub is_lat_lon: bool,
    }

    /// Small 10 x 10 km Cartesian grid at 1 km spacing.
    pub const SMALL_KM: GridSpec = GridSpec {
        nx: 10,
        ny: 10,
        dx: 1.0,
        dy: 1.0,
        minx: 0.0,
        miny: 0.0,
        is_lat_lon: false,
    };

    /// Typical radar mosaic tile at 1 km spacing.
    pub const MOSAIC_TILE_KM: GridSpec = GridSpec {
        nx: 200,
        ny: 200,
        dx: 1.0,
        dy: 1.0,
        minx: -100.0,
        miny: -100.0,
        is_lat_lon: false,
    };

    /// 0.01 degree lat/lon grid centred near 40N.
    pub const LATLON_MIDLAT: GridSpec = GridSpec {
        nx: 50,
        ny: 50,
        dx: 0.01,
        dy: 0.01,
        minx: -105.25,
        miny: 39.75,
        is_lat_lon: true,
    };

    /// 0.01 degree lat/lon grid straddling the equator.
    pub const LATLON_EQUATOR: GridSpec = GridSpec {
        nx: 20,
        ny: 20,
        dx: 0.01,
        dy: 0.01,
        minx: 0.0,
        miny: -0.1,
        is_lat_lon: true,
    };
}

/// Reflectivity values (dBZ) representative of common echo types.
pub mod dbz {
    /// Light stratiform rain.
    pub const LIGHT_RAIN: f32 = 15.0;
    /// Moderate stratiform rain, above the default min valid dBZ.
    pub const MODERATE_RAIN: f32 = 30.0;
    /// Strong convective core, above the default definite-convection dBZ.
    pub const CONVECTIVE_CORE: f32 = 55.0;
    /// Below any useful threshold.
    pub const CLEAR_AIR: f32 = -5.0;
}

/// Standard vertical level sets (km).
pub mod levels {
    /// Five levels at 1 km spacing.
    pub const FIVE_KM: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    /// A single level, for 2-D input.
    pub const SINGLE: [f64; 1] = [2.0];
    /// Twenty levels from 0.5 to 10 km.
    pub fn twenty_half_km() -> Vec<f64> {
        crate::z_levels(20, 0.5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlon_fixtures_are_lat_lon() {
        assert!(grid::LATLON_MIDLAT.is_lat_lon);
        assert!(grid::LATLON_EQUATOR.is_lat_lon);
        assert!(!grid::SMALL_KM.is_lat_lon);
    }

    #[test]
    fn test_dbz_ordering() {
        assert!(dbz::CLEAR_AIR < dbz::LIGHT_RAIN);
        assert!(dbz::LIGHT_RAIN < dbz::MODERATE_RAIN);
        assert!(dbz::MODERATE_RAIN < dbz::CONVECTIVE_CORE);
    }

    #[test]
    fn test_level_sets_ascend() {
        let levels = levels::twenty_half_km();
        assert_eq!(levels.len(), 20);
        assert!(levels.windows(2).all(|w| w[1] > w[0]));
        assert!(levels::FIVE_KM.windows(2).all(|w| w[1] > w[0]));
    }
}
