//! The partition orchestrator.
//!
//! [`ConvStratFinder`] owns the configuration (which persists across
//! volumes), the current grid geometry, a kernel cache, and the output
//! grids of the most recent volume.

use tracing::{debug, info, instrument, warn};

use crate::background::{compute_background, compute_column_max};
use crate::config::{ConvRadiusConfig, ConvStratConfig};
use crate::echo_type::{
    compute_convectivity, compute_echo_type_2d, compute_echo_type_3d, summarize_echo_type, EchoType,
    HeightThresholds, StormClump,
};
use crate::error::{ConvStratError, Result};
use crate::geometry::GridGeometry;
use crate::grid::{Grid, MissingValue};
use crate::kernel::KernelCache;
use crate::partition::{classify, decompose, expand_convective, Category, PartitionStats};
use crate::radius::ConvectiveRadiusFunction;
use crate::texture::{summarize_texture, TextureComputer};
use crate::tops::{compute_echo_tops, compute_partition_tops};

/// Every grid produced for one volume.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOutputs {
    /// Input reflectivity mapped onto the internal missing convention.
    pub dbz: Grid<f32>,
    pub col_max_dbz: Grid<f32>,
    pub background_dbz: Grid<f32>,
    pub conv_radius_km: Grid<f32>,
    pub fraction_active: Grid<f32>,
    pub vol_texture: Grid<f32>,
    pub mean_texture: Grid<f32>,
    pub max_texture: Grid<f32>,
    /// Column categories before convective expansion.
    pub unexpanded_partition: Grid<Category>,
    pub partition: Grid<Category>,
    pub convective_dbz: Grid<f32>,
    pub stratiform_dbz: Grid<f32>,
    pub echo_top_km: Grid<f32>,
    pub conv_top_km: Grid<f32>,
    pub strat_top_km: Grid<f32>,
    /// Per-cell convectivity (0..1) derived from texture.
    pub convectivity_3d: Grid<f32>,
    /// Column max of `convectivity_3d` over the height band.
    pub max_convectivity: Grid<f32>,
    pub echo_type_3d: Grid<EchoType>,
    /// Highest echo type in each column.
    pub echo_type_2d: Grid<EchoType>,
    /// Convective clumps large enough to be typed as a whole.
    pub clumps: Vec<StormClump>,
    pub stats: PartitionStats,
}

/// Convective/stratiform partition of gridded reflectivity volumes.
///
/// ```ignore
/// use conv_strat::ConvStratFinder;
///
/// let mut finder = ConvStratFinder::new();
/// finder.set_min_valid_dbz(15.0);
/// finder.set_compute_conv_radius(20.0, 40.0, 1.0, 5.0, 11.0)?;
/// finder.set_grid(nx, ny, dx, dy, minx, miny, z_km, false)?;
///
/// finder.compute_partition(&dbz, -9999.0)?;
/// let partition = finder.partition_bytes();
/// ```
#[derive(Debug, Default)]
pub struct ConvStratFinder {
    config: ConvStratConfig,
    geometry: Option<GridGeometry>,
    /// Per-column shallow/deep heights; constant from config when unset.
    ht_thresholds: Option<HeightThresholds>,
    kernels: KernelCache,
    outputs: Option<PartitionOutputs>,
}

impl ConvStratFinder {
    /// Create a finder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a finder from a validated configuration.
    pub fn with_config(config: ConvStratConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &ConvStratConfig {
        &self.config
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: ConvStratConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Set the grid for the next volume(s).
    ///
    /// Outputs of the previous volume are released. On error the previous
    /// geometry and outputs are kept.
    #[allow(clippy::too_many_arguments)]
    pub fn set_grid(
        &mut self,
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        minx: f64,
        miny: f64,
        z_km: Vec<f64>,
        is_lat_lon: bool,
    ) -> Result<()> {
        let geometry = GridGeometry::new(nx, ny, dx, dy, minx, miny, z_km, is_lat_lon)?;
        self.set_geometry(geometry)
    }

    /// Set the grid from an existing geometry.
    ///
    /// Per-column height thresholds are dropped in favour of the constant ones.
    pub fn set_geometry(&mut self, geometry: GridGeometry) -> Result<()> {
        geometry.validate()?;
        debug!(
            nx = geometry.nx,
            ny = geometry.ny,
            nz = geometry.nz(),
            dx_km = geometry.dx_km(),
            dy_km = geometry.dy_km(),
            is_lat_lon = geometry.is_lat_lon,
            "Grid set"
        );
        self.geometry = Some(geometry);
        self.ht_thresholds = None;
        self.free_arrays();
        Ok(())
    }

    pub fn geometry(&self) -> Option<&GridGeometry> {
        self.geometry.as_ref()
    }

    // ------------------------------------------------------------------
    // Configuration setters
    // ------------------------------------------------------------------

    pub fn set_min_valid_ht_km(&mut self, ht_km: f64) {
        self.config.min_valid_ht_km = ht_km;
    }

    pub fn set_max_valid_ht_km(&mut self, ht_km: f64) {
        self.config.max_valid_ht_km = ht_km;
    }

    pub fn set_min_valid_dbz(&mut self, dbz: f64) {
        self.config.min_valid_dbz = dbz;
    }

    pub fn set_dbz_for_definite_convection(&mut self, dbz: f64) {
        self.config.dbz_for_definite_convection = dbz;
    }

    /// Configure the background-dependent convective radius.
    ///
    /// Inverted dBZ or radius limits are rejected and the previous
    /// settings are kept.
    pub fn set_compute_conv_radius(
        &mut self,
        min_dbz: f64,
        max_dbz: f64,
        min_radius_km: f64,
        max_radius_km: f64,
        background_radius_km: f64,
    ) -> Result<()> {
        let conv_radius = ConvRadiusConfig {
            min_dbz,
            max_dbz,
            min_radius_km,
            max_radius_km,
            background_radius_km,
        };
        conv_radius.validate()?;
        self.config.conv_radius = conv_radius;
        Ok(())
    }

    pub fn set_texture_radius_km(&mut self, radius_km: f64) {
        self.config.texture_radius_km = radius_km;
    }

    pub fn set_min_valid_fraction_for_texture(&mut self, fraction: f64) {
        self.config.min_valid_fraction_for_texture = fraction;
    }

    pub fn set_min_texture_for_convection(&mut self, texture: f64) {
        self.config.min_texture_for_convection = texture;
    }

    pub fn set_dbz_for_echo_tops(&mut self, dbz: f64) {
        self.config.dbz_for_echo_tops = dbz;
    }

    pub fn set_use_dbz_col_max(&mut self, use_col_max: bool) {
        self.config.use_dbz_col_max = use_col_max;
    }

    pub fn set_use_multiple_threads(&mut self, use_threads: bool) {
        self.config.use_multiple_threads = use_threads;
    }

    /// Texture limits for the 0..1 convectivity ramp.
    pub fn set_texture_limits(&mut self, low: f64, high: f64) {
        self.config.echo_type.texture_limit_low = low;
        self.config.echo_type.texture_limit_high = high;
    }

    pub fn set_min_convectivity_for_convective(&mut self, convectivity: f64) {
        self.config.echo_type.min_convectivity_for_convective = convectivity;
    }

    pub fn set_max_convectivity_for_stratiform(&mut self, convectivity: f64) {
        self.config.echo_type.max_convectivity_for_stratiform = convectivity;
    }

    pub fn set_min_vol_for_convective_km3(&mut self, vol_km3: f64) {
        self.config.echo_type.min_vol_for_convective_km3 = vol_km3;
    }

    pub fn set_min_vert_extent_for_convective_km(&mut self, extent_km: f64) {
        self.config.echo_type.min_vert_extent_for_convective_km = extent_km;
    }

    /// Use the same shallow and deep heights in every column, replacing
    /// any per-column thresholds.
    pub fn set_constant_ht_thresholds(&mut self, shallow_ht_km: f64, deep_ht_km: f64) {
        self.config.echo_type.shallow_ht_km = shallow_ht_km;
        self.config.echo_type.deep_ht_km = deep_ht_km;
        self.ht_thresholds = None;
    }

    /// Per-column shallow and deep heights for the current grid.
    ///
    /// Both planes must hold `nx * ny` values. They apply until the next
    /// `set_grid` or `set_constant_ht_thresholds`.
    pub fn set_grid_ht_thresholds(&mut self, shallow_ht_km: &[f32], deep_ht_km: &[f32]) -> Result<()> {
        let geometry = self.geometry.as_ref().ok_or(ConvStratError::GridNotSet)?;
        let thresholds = HeightThresholds::from_planes(
            geometry.nx,
            geometry.ny,
            shallow_ht_km.to_vec(),
            deep_ht_km.to_vec(),
        )?;
        self.ht_thresholds = Some(thresholds);
        Ok(())
    }

    fn height_thresholds(&self, nx: usize, ny: usize) -> HeightThresholds {
        match &self.ht_thresholds {
            Some(thresholds) if thresholds.fits(nx, ny) => thresholds.clone(),
            _ => HeightThresholds::constant(
                nx,
                ny,
                self.config.echo_type.shallow_ht_km,
                self.config.echo_type.deep_ht_km,
            ),
        }
    }

    // ------------------------------------------------------------------
    // Computation
    // ------------------------------------------------------------------

    /// Partition a volume whose missing samples equal `missing_val`.
    pub fn compute_partition(&mut self, dbz: &[f32], missing_val: f32) -> Result<()> {
        self.compute_partition_with(dbz, MissingValue::new(missing_val))
    }

    /// Partition a volume with an explicit missing/bad convention.
    ///
    /// Validation happens before anything is released, so on error the
    /// outputs of the previous volume remain readable.
    #[instrument(skip_all, fields(len = dbz.len()))]
    pub fn compute_partition_with(&mut self, dbz: &[f32], missing: MissingValue) -> Result<()> {
        let geometry = self.geometry.clone().ok_or(ConvStratError::GridNotSet)?;
        geometry.validate()?;
        self.config.validate()?;
        let radius_fn = ConvectiveRadiusFunction::new(self.config.conv_radius)?;
        if dbz.len() != geometry.n_volume() {
            return Err(ConvStratError::dimension_mismatch(geometry.n_volume(), dbz.len()));
        }

        self.free_arrays();
        self.log_settings(&geometry);

        let outputs = self.run(&geometry, &radius_fn, dbz, missing)?;
        info!(
            nx = geometry.nx,
            ny = geometry.ny,
            nz = geometry.nz(),
            convective = outputs.stats.convective,
            stratiform = outputs.stats.stratiform,
            missing = outputs.stats.missing,
            convective_fraction = outputs.stats.convective_fraction(),
            clumps = outputs.clumps.len(),
            "Partition complete"
        );
        self.outputs = Some(outputs);
        Ok(())
    }

    fn run(
        &mut self,
        geometry: &GridGeometry,
        radius_fn: &ConvectiveRadiusFunction,
        input: &[f32],
        missing: MissingValue,
    ) -> Result<PartitionOutputs> {
        let cfg = self.config.clone();
        let parallel = cfg.use_multiple_threads;
        let (nx, ny, nz) = (geometry.nx, geometry.ny, geometry.nz());
        let (dx_km, dy_km) = (geometry.dx_km(), geometry.dy_km());

        let normalized: Vec<f32> = input.iter().map(|&v| missing.normalize(v)).collect();
        let dbz = Grid::from_vec(normalized, nx, ny, nz)?;
        let levels = geometry.levels_in_band(cfg.min_valid_ht_km, cfg.max_valid_ht_km);
        if levels.is_empty() {
            warn!(
                min_ht_km = cfg.min_valid_ht_km,
                max_ht_km = cfg.max_valid_ht_km,
                "No levels inside the valid height band, every column will be missing"
            );
        }

        // background and convective radius
        let col_max_dbz = compute_column_max(&dbz, &levels);
        let bg_kernel = self.kernels.circular(cfg.conv_radius.background_radius_km, dx_km, dy_km);
        let background_dbz = compute_background(&col_max_dbz, &bg_kernel, parallel);
        let conv_radius_km = radius_fn.compute_grid(&background_dbz);

        // texture
        let tex_kernel = self.kernels.widened(cfg.texture_radius_km, dx_km, dy_km);
        let computer =
            TextureComputer::new(&tex_kernel, cfg.min_valid_fraction_for_texture, parallel);
        let fraction_active = computer.compute_fraction_active(&col_max_dbz);
        let vol_texture = if cfg.use_dbz_col_max {
            computer.compute_from_col_max(&col_max_dbz, &dbz, &levels)
        } else {
            computer.compute_volume(&dbz, &levels)
        };
        let (mean_texture, max_texture) = summarize_texture(&vol_texture, &levels);

        // echo type
        let convectivity_3d = compute_convectivity(
            &vol_texture,
            &fraction_active,
            cfg.min_valid_fraction_for_texture,
            &cfg.echo_type,
        );
        let (echo_type_3d, clumps) = if nz == 1 {
            (compute_echo_type_2d(&convectivity_3d, &cfg.echo_type), Vec::new())
        } else {
            let thresholds = self.height_thresholds(nx, ny);
            compute_echo_type_3d(&convectivity_3d, geometry, &thresholds, &cfg.echo_type)
        };
        let (echo_type_2d, max_convectivity) = summarize_echo_type(
            &echo_type_3d,
            &convectivity_3d,
            &fraction_active,
            &levels,
            cfg.min_valid_fraction_for_texture,
        );

        // classification
        let unexpanded_partition = classify(&col_max_dbz, &fraction_active, &mean_texture, &cfg);
        let partition = expand_convective(&unexpanded_partition, &conv_radius_km, geometry, parallel);
        let (convective_dbz, stratiform_dbz) = decompose(&dbz, &partition);

        let echo_top_km = compute_echo_tops(&dbz, geometry, &levels, cfg.dbz_for_echo_tops);
        let (conv_top_km, strat_top_km) = compute_partition_tops(&dbz, &partition, geometry, &levels);
        let stats = PartitionStats::from_grid(&partition);

        Ok(PartitionOutputs {
            dbz,
            col_max_dbz,
            background_dbz,
            conv_radius_km,
            fraction_active,
            vol_texture,
            mean_texture,
            max_texture,
            unexpanded_partition,
            partition,
            convective_dbz,
            stratiform_dbz,
            echo_top_km,
            conv_top_km,
            strat_top_km,
            convectivity_3d,
            max_convectivity,
            echo_type_3d,
            echo_type_2d,
            clumps,
            stats,
        })
    }

    /// Release every per-volume grid. Safe to call repeatedly.
    pub fn free_arrays(&mut self) {
        self.outputs = None;
    }

    fn log_settings(&self, geometry: &GridGeometry) {
        let cfg = &self.config;
        debug!(
            min_valid_ht_km = cfg.min_valid_ht_km,
            max_valid_ht_km = cfg.max_valid_ht_km,
            min_valid_dbz = cfg.min_valid_dbz,
            dbz_for_definite_convection = cfg.dbz_for_definite_convection,
            texture_radius_km = cfg.texture_radius_km,
            min_valid_fraction_for_texture = cfg.min_valid_fraction_for_texture,
            min_texture_for_convection = cfg.min_texture_for_convection,
            use_dbz_col_max = cfg.use_dbz_col_max,
            "ConvStratFinder settings"
        );
        debug!(
            min_dbz = cfg.conv_radius.min_dbz,
            max_dbz = cfg.conv_radius.max_dbz,
            min_radius_km = cfg.conv_radius.min_radius_km,
            max_radius_km = cfg.conv_radius.max_radius_km,
            background_radius_km = cfg.conv_radius.background_radius_km,
            "Convective radius settings"
        );
        let echo = &cfg.echo_type;
        debug!(
            texture_limit_low = echo.texture_limit_low,
            texture_limit_high = echo.texture_limit_high,
            min_convectivity_for_convective = echo.min_convectivity_for_convective,
            max_convectivity_for_stratiform = echo.max_convectivity_for_stratiform,
            min_vol_for_convective_km3 = echo.min_vol_for_convective_km3,
            min_vert_extent_for_convective_km = echo.min_vert_extent_for_convective_km,
            shallow_ht_km = echo.shallow_ht_km,
            deep_ht_km = echo.deep_ht_km,
            per_column_ht = self.ht_thresholds.is_some(),
            "Echo type settings"
        );
        debug!(
            nx = geometry.nx,
            ny = geometry.ny,
            minx = geometry.minx,
            miny = geometry.miny,
            dx_km = geometry.dx_km(),
            dy_km = geometry.dy_km(),
            z_km = ?geometry.z_km,
            "Grid settings"
        );
    }

    // ------------------------------------------------------------------
    // Getters: valid until the next compute_partition, set_grid or free_arrays
    // ------------------------------------------------------------------

    /// All outputs of the most recent volume.
    pub fn outputs(&self) -> Option<&PartitionOutputs> {
        self.outputs.as_ref()
    }

    /// Take ownership of the outputs, leaving the finder empty.
    pub fn take_outputs(&mut self) -> Option<PartitionOutputs> {
        self.outputs.take()
    }

    pub fn dbz(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.dbz)
    }

    pub fn col_max_dbz(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.col_max_dbz)
    }

    pub fn background_dbz(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.background_dbz)
    }

    pub fn conv_radius_km(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.conv_radius_km)
    }

    pub fn fraction_active(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.fraction_active)
    }

    pub fn vol_texture(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.vol_texture)
    }

    pub fn mean_texture(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.mean_texture)
    }

    pub fn max_texture(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.max_texture)
    }

    pub fn unexpanded_partition(&self) -> Option<&Grid<Category>> {
        self.outputs.as_ref().map(|o| &o.unexpanded_partition)
    }

    pub fn partition(&self) -> Option<&Grid<Category>> {
        self.outputs.as_ref().map(|o| &o.partition)
    }

    /// The partition as the byte grid written by grid writers.
    pub fn partition_bytes(&self) -> Option<Vec<u8>> {
        self.partition()
            .map(|p| p.as_slice().iter().map(|c| c.as_u8()).collect())
    }

    pub fn convective_dbz(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.convective_dbz)
    }

    pub fn stratiform_dbz(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.stratiform_dbz)
    }

    pub fn echo_top_km(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.echo_top_km)
    }

    pub fn conv_top_km(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.conv_top_km)
    }

    pub fn strat_top_km(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.strat_top_km)
    }

    pub fn convectivity_3d(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.convectivity_3d)
    }

    pub fn max_convectivity(&self) -> Option<&Grid<f32>> {
        self.outputs.as_ref().map(|o| &o.max_convectivity)
    }

    pub fn echo_type_3d(&self) -> Option<&Grid<EchoType>> {
        self.outputs.as_ref().map(|o| &o.echo_type_3d)
    }

    pub fn echo_type_2d(&self) -> Option<&Grid<EchoType>> {
        self.outputs.as_ref().map(|o| &o.echo_type_2d)
    }

    /// The column echo type as a byte grid.
    pub fn echo_type_2d_bytes(&self) -> Option<Vec<u8>> {
        self.echo_type_2d()
            .map(|e| e.as_slice().iter().map(|t| t.as_u8()).collect())
    }

    pub fn clumps(&self) -> Option<&[StormClump]> {
        self.outputs.as_ref().map(|o| o.clumps.as_slice())
    }

    pub fn partition_stats(&self) -> Option<PartitionStats> {
        self.outputs.as_ref().map(|o| o.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MISSING_VALUE;

    fn finder_with_grid(n: usize, nz: usize) -> ConvStratFinder {
        let mut finder = ConvStratFinder::new();
        finder.set_use_multiple_threads(false);
        let z_km = (0..nz).map(|i| 1.0 + i as f64).collect();
        finder.set_grid(n, n, 1.0, 1.0, 0.0, 0.0, z_km, false).unwrap();
        finder
    }

    #[test]
    fn test_compute_without_grid_fails() {
        let mut finder = ConvStratFinder::new();
        assert_eq!(
            finder.compute_partition(&[1.0], MISSING_VALUE),
            Err(ConvStratError::GridNotSet)
        );
    }

    #[test]
    fn test_set_grid_rejects_malformed_geometry() {
        let mut finder = finder_with_grid(4, 2);
        assert!(finder.set_grid(0, 4, 1.0, 1.0, 0.0, 0.0, vec![1.0], false).is_err());
        // previous geometry survives
        assert_eq!(finder.geometry().map(|g| g.nx), Some(4));
    }

    #[test]
    fn test_dimension_mismatch_keeps_previous_outputs() {
        let mut finder = finder_with_grid(4, 2);
        finder.compute_partition(&vec![30.0; 32], MISSING_VALUE).unwrap();
        let before = finder.outputs().cloned();
        assert!(before.is_some());

        let err = finder.compute_partition(&vec![30.0; 31], MISSING_VALUE).unwrap_err();
        assert_eq!(err, ConvStratError::dimension_mismatch(32, 31));
        assert_eq!(finder.outputs().cloned(), before);
    }

    #[test]
    fn test_invalid_conv_radius_is_rejected_immediately() {
        let mut finder = ConvStratFinder::new();
        let before = finder.config().conv_radius;
        assert!(finder.set_compute_conv_radius(40.0, 20.0, 1.0, 5.0, 11.0).is_err());
        assert!(finder.set_compute_conv_radius(20.0, 40.0, 6.0, 5.0, 11.0).is_err());
        assert_eq!(finder.config().conv_radius, before);
        assert!(finder.set_compute_conv_radius(25.0, 45.0, 2.0, 6.0, 9.0).is_ok());
        assert_eq!(finder.config().conv_radius.max_radius_km, 6.0);
    }

    #[test]
    fn test_invalid_setter_value_surfaces_at_compute() {
        let mut finder = finder_with_grid(3, 1);
        finder.set_min_valid_fraction_for_texture(2.0);
        let err = finder.compute_partition(&[20.0; 9], MISSING_VALUE).unwrap_err();
        assert!(matches!(err, ConvStratError::InvalidConfig(_)));
        assert!(finder.outputs().is_none());
    }

    #[test]
    fn test_free_arrays_is_idempotent() {
        let mut finder = finder_with_grid(3, 1);
        finder.compute_partition(&[20.0; 9], MISSING_VALUE).unwrap();
        assert!(finder.partition().is_some());
        finder.free_arrays();
        finder.free_arrays();
        assert!(finder.partition().is_none());
        assert!(finder.vol_texture().is_none());
    }

    #[test]
    fn test_set_grid_releases_outputs() {
        let mut finder = finder_with_grid(3, 1);
        finder.compute_partition(&[20.0; 9], MISSING_VALUE).unwrap();
        finder.set_grid(5, 5, 1.0, 1.0, 0.0, 0.0, vec![1.0], false).unwrap();
        assert!(finder.outputs().is_none());
    }

    #[test]
    fn test_bad_value_treated_as_missing() {
        let mut finder = finder_with_grid(2, 1);
        let dbz = [-888.0, -999.0, 30.0, f32::NAN];
        finder
            .compute_partition_with(&dbz, MissingValue::with_bad(-999.0, -888.0))
            .unwrap();
        let partition = finder.partition_bytes().unwrap();
        assert_eq!(partition, vec![0, 0, Category::Stratiform.as_u8(), 0]);
    }

    #[test]
    fn test_kernel_cache_bounded_across_drifting_latitudes() {
        let mut finder = ConvStratFinder::new();
        finder.set_use_multiple_threads(false);
        for i in 0..50 {
            let miny = 30.0 + i as f64 * 0.05;
            finder.set_grid(4, 4, 0.01, 0.01, -100.0, miny, vec![1.0], true).unwrap();
            finder.compute_partition(&[25.0; 16], MISSING_VALUE).unwrap();
            assert!(finder.kernels.len() <= finder.kernels.capacity());
        }
        assert_eq!(finder.kernels.len(), finder.kernels.capacity());
    }

    #[test]
    fn test_grid_ht_thresholds_need_matching_grid() {
        let mut finder = ConvStratFinder::new();
        assert_eq!(
            finder.set_grid_ht_thresholds(&[3.0; 9], &[8.0; 9]),
            Err(ConvStratError::GridNotSet)
        );

        let mut finder = finder_with_grid(3, 2);
        assert_eq!(
            finder.set_grid_ht_thresholds(&[3.0; 4], &[8.0; 9]),
            Err(ConvStratError::dimension_mismatch(9, 4))
        );
        assert!(finder.set_grid_ht_thresholds(&[3.0; 9], &[8.0; 9]).is_ok());
        assert!(finder.ht_thresholds.is_some());

        // a new grid falls back to the constant thresholds
        finder.set_grid(3, 3, 1.0, 1.0, 0.0, 0.0, vec![1.0, 2.0], false).unwrap();
        assert!(finder.ht_thresholds.is_none());

        finder.set_grid_ht_thresholds(&[3.0; 9], &[8.0; 9]).unwrap();
        finder.set_constant_ht_thresholds(5.0, 10.0);
        assert!(finder.ht_thresholds.is_none());
        assert_eq!(finder.config().echo_type.deep_ht_km, 10.0);
    }

    #[test]
    fn test_inverted_texture_limits_surface_at_compute() {
        let mut finder = finder_with_grid(3, 1);
        finder.set_texture_limits(30.0, 0.0);
        let err = finder.compute_partition(&[20.0; 9], MISSING_VALUE).unwrap_err();
        assert!(matches!(err, ConvStratError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_persists_across_volumes() {
        let mut finder = finder_with_grid(3, 1);
        finder.set_min_valid_dbz(25.0);
        finder.compute_partition(&[20.0; 9], MISSING_VALUE).unwrap();
        finder.set_grid(4, 4, 1.0, 1.0, 0.0, 0.0, vec![1.0], false).unwrap();
        finder.compute_partition(&[20.0; 16], MISSING_VALUE).unwrap();
        assert_eq!(finder.config().min_valid_dbz, 25.0);
        assert_eq!(finder.partition_stats().map(|s| s.stratiform), Some(16));
    }
}
