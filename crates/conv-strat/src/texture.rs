//! Reflectivity texture: the local spread of dBZ within a circular kernel.
//!
//! Texture at a cell is the mean absolute deviation of the valid kernel
//! values from their own mean. MAD rather than variance keeps a handful of
//! very strong gates inside an otherwise uniform stratiform kernel from
//! dominating the statistic.

use tracing::{debug, instrument};

use crate::grid::{is_valid, Grid, MISSING_VALUE};
use crate::kernel::{sweep_rows, CircularKernel};

/// Computes texture planes with a fixed kernel and coverage threshold.
#[derive(Debug, Clone, Copy)]
pub struct TextureComputer<'a> {
    kernel: &'a CircularKernel,
    min_valid_fraction: f64,
    parallel: bool,
}

impl<'a> TextureComputer<'a> {
    pub fn new(kernel: &'a CircularKernel, min_valid_fraction: f64, parallel: bool) -> Self {
        Self {
            kernel,
            min_valid_fraction,
            parallel,
        }
    }

    /// Texture of a single `nx` x `ny` plane.
    ///
    /// A cell is missing if its own value is missing or if fewer than
    /// `min_valid_fraction` of the kernel cells (off-grid cells included
    /// in the total) hold valid data.
    pub fn compute_plane(&self, plane: &[f32], nx: usize, ny: usize) -> Vec<f32> {
        let mut out = vec![MISSING_VALUE; nx * ny];
        sweep_rows(&mut out, nx, self.parallel, |x, y| self.texture_at(plane, x, y, nx, ny));
        out
    }

    /// Texture of every level in `levels`; other levels stay missing.
    #[instrument(skip_all, fields(levels = levels.len(), kernel_cells = self.kernel.len()))]
    pub fn compute_volume(&self, dbz: &Grid<f32>, levels: &[usize]) -> Grid<f32> {
        let (nx, ny) = (dbz.nx(), dbz.ny());
        let mut texture = Grid::filled(nx, ny, dbz.nz(), MISSING_VALUE);
        for &iz in levels {
            let plane = self.compute_plane(dbz.level(iz), nx, ny);
            texture.level_mut(iz).copy_from_slice(&plane);
            debug!(level = iz, valid = plane.iter().filter(|v| is_valid(**v)).count(), "Texture level done");
        }
        texture
    }

    /// Texture computed once on the column-max plane, then copied to every
    /// level in `levels` where the volume has data.
    #[instrument(skip_all, fields(levels = levels.len()))]
    pub fn compute_from_col_max(&self, col_max: &Grid<f32>, dbz: &Grid<f32>, levels: &[usize]) -> Grid<f32> {
        let (nx, ny) = (dbz.nx(), dbz.ny());
        let col_texture = self.compute_plane(col_max.level(0), nx, ny);
        let mut texture = Grid::filled(nx, ny, dbz.nz(), MISSING_VALUE);
        for &iz in levels {
            let dbz_level = dbz.level(iz);
            for ((out, &t), &d) in texture.level_mut(iz).iter_mut().zip(&col_texture).zip(dbz_level) {
                if is_valid(d) {
                    *out = t;
                }
            }
        }
        texture
    }

    /// Fraction of kernel cells around each column whose column max is valid.
    pub fn compute_fraction_active(&self, col_max: &Grid<f32>) -> Grid<f32> {
        let (nx, ny) = (col_max.nx(), col_max.ny());
        let values = col_max.level(0);
        let total = self.kernel.len().max(1) as f64;
        let mut fraction = Grid::plane(nx, ny, 0.0f32);
        sweep_rows(fraction.as_mut_slice(), nx, self.parallel, |x, y| {
            let count = self
                .kernel
                .neighbours(x, y, nx, ny)
                .filter(|(idx, _)| is_valid(values[*idx]))
                .count();
            (count as f64 / total) as f32
        });
        fraction
    }

    #[inline]
    fn texture_at(&self, plane: &[f32], x: usize, y: usize, nx: usize, ny: usize) -> f32 {
        if !is_valid(plane[y * nx + x]) {
            return MISSING_VALUE;
        }

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for (idx, _) in self.kernel.neighbours(x, y, nx, ny) {
            let val = plane[idx];
            if is_valid(val) {
                sum += val as f64;
                count += 1;
            }
        }

        let fraction = count as f64 / self.kernel.len().max(1) as f64;
        if count == 0 || fraction < self.min_valid_fraction {
            return MISSING_VALUE;
        }

        let mean = sum / count as f64;
        let abs_dev: f64 = self
            .kernel
            .neighbours(x, y, nx, ny)
            .map(|(idx, _)| plane[idx])
            .filter(|v| is_valid(*v))
            .map(|v| (v as f64 - mean).abs())
            .sum();

        (abs_dev / count as f64) as f32
    }
}

/// Mean and max of the valid per-level texture in each column, over `levels`.
pub fn summarize_texture(texture_3d: &Grid<f32>, levels: &[usize]) -> (Grid<f32>, Grid<f32>) {
    let (nx, ny) = (texture_3d.nx(), texture_3d.ny());
    let n = nx * ny;
    let mut sums = vec![0.0f64; n];
    let mut counts = vec![0usize; n];
    let mut max_texture = Grid::plane(nx, ny, MISSING_VALUE);

    for &iz in levels {
        let level = texture_3d.level(iz);
        for (i, &t) in level.iter().enumerate() {
            if !is_valid(t) {
                continue;
            }
            sums[i] += t as f64;
            counts[i] += 1;
            let max = &mut max_texture.as_mut_slice()[i];
            if !is_valid(*max) || t > *max {
                *max = t;
            }
        }
    }

    let mut mean_texture = Grid::plane(nx, ny, MISSING_VALUE);
    for ((out, &sum), &count) in mean_texture.as_mut_slice().iter_mut().zip(&sums).zip(&counts) {
        if count > 0 {
            *out = (sum / count as f64) as f32;
        }
    }

    (mean_texture, max_texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::is_missing;

    const M: f32 = MISSING_VALUE;

    #[test]
    fn test_uniform_plane_has_zero_texture() {
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.0, false);
        let plane = vec![30.0f32; 25];
        let tex = tc.compute_plane(&plane, 5, 5);
        assert!(tex.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn test_mean_absolute_deviation() {
        // 3x1 plane [10, 20, 60], kernel reaches 1 cell
        // centre: values 10, 20, 60 -> mean 30, |dev| 20, 10, 30 -> MAD 20
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.0, false);
        let tex = tc.compute_plane(&[10.0, 20.0, 60.0], 3, 1);
        assert!((tex[1] - 20.0).abs() < 1e-5);
        // left edge: values 10, 20 -> mean 15 -> MAD 5
        assert!((tex[0] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_missing_centre_gives_missing_texture() {
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.0, false);
        let tex = tc.compute_plane(&[10.0, M, 60.0], 3, 1);
        assert!(is_missing(tex[1]));
        assert!(!is_missing(tex[0]));
    }

    #[test]
    fn test_insufficient_coverage_gives_missing_texture() {
        // 5-cell cross kernel; corner of a 3x3 plane sees 3 cells -> 0.6
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        assert_eq!(kernel.len(), 5);
        let plane = vec![20.0f32; 9];

        let strict = TextureComputer::new(&kernel, 0.7, false).compute_plane(&plane, 3, 3);
        assert!(is_missing(strict[0]));
        assert_eq!(strict[4], 0.0);

        let loose = TextureComputer::new(&kernel, 0.6, false).compute_plane(&plane, 3, 3);
        assert_eq!(loose[0], 0.0);
    }

    #[test]
    fn test_fraction_active_counts_off_grid_as_inactive() {
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.25, false);
        let col_max = Grid::from_vec(vec![20.0, M, 20.0, 20.0], 2, 2, 1).unwrap();
        let frac = tc.compute_fraction_active(&col_max);
        // (0,0): itself, (1,0) missing, (0,1) valid -> 2/5
        assert!((frac.as_slice()[0] - 0.4).abs() < 1e-6);
        // (1,1): itself, (0,1) valid, (1,0) missing -> 2/5
        assert!((frac.as_slice()[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_volume_texture_skips_levels_outside_band() {
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.0, true);
        let dbz = Grid::filled(4, 4, 3, 25.0f32);
        let tex = tc.compute_volume(&dbz, &[1]);
        assert!(tex.level(0).iter().all(|v| is_missing(*v)));
        assert!(tex.level(1).iter().all(|&v| v == 0.0));
        assert!(tex.level(2).iter().all(|v| is_missing(*v)));
    }

    #[test]
    fn test_col_max_texture_copied_to_valid_levels() {
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.0, false);
        // 3x1 plane, 2 levels; level 1 missing in the middle
        let dbz = Grid::from_vec(vec![10.0, 20.0, 60.0, 5.0, M, 5.0], 3, 1, 2).unwrap();
        let col_max = Grid::from_vec(vec![10.0, 20.0, 60.0], 3, 1, 1).unwrap();
        let tex = tc.compute_from_col_max(&col_max, &dbz, &[0, 1]);

        assert!((tex.get(1, 0, 0).unwrap() - 20.0).abs() < 1e-5);
        assert!(is_missing(tex.get(1, 0, 1).unwrap()));
        assert!((tex.get(0, 0, 1).unwrap() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_summarize_texture() {
        // 2x1 plane, 3 levels
        let tex = Grid::from_vec(vec![2.0, M, 4.0, M, 9.0, M], 2, 1, 3).unwrap();

        let (mean, max) = summarize_texture(&tex, &[0, 1, 2]);
        assert!((mean.as_slice()[0] - 5.0).abs() < 1e-6);
        assert_eq!(max.as_slice()[0], 9.0);
        assert!(is_missing(mean.as_slice()[1]));
        assert!(is_missing(max.as_slice()[1]));

        let (mean, max) = summarize_texture(&tex, &[0, 1]);
        assert!((mean.as_slice()[0] - 3.0).abs() < 1e-6);
        assert_eq!(max.as_slice()[0], 4.0);
    }
}
