//! Column-maximum reflectivity and the kernel-averaged background field.

use tracing::instrument;

use crate::grid::{is_valid, Grid, MISSING_VALUE};
use crate::kernel::{sweep_rows, CircularKernel};

/// Maximum valid reflectivity in each column over the given levels.
///
/// A column is missing only if every sampled level is missing.
pub fn compute_column_max(dbz: &Grid<f32>, levels: &[usize]) -> Grid<f32> {
    let mut col_max = Grid::plane(dbz.nx(), dbz.ny(), MISSING_VALUE);
    let out = col_max.as_mut_slice();

    for &iz in levels {
        for (max, &val) in out.iter_mut().zip(dbz.level(iz)) {
            if !is_valid(val) {
                continue;
            }
            if !is_valid(*max) || val > *max {
                *max = val;
            }
        }
    }

    col_max
}

/// Mean of the valid column-max values within `kernel` of each cell.
///
/// Kernels that run off the grid edge average whatever in-bounds subset
/// remains; a cell with no valid values in its kernel is missing.
#[instrument(skip_all, fields(kernel_cells = kernel.len()))]
pub fn compute_background(col_max: &Grid<f32>, kernel: &CircularKernel, parallel: bool) -> Grid<f32> {
    let nx = col_max.nx();
    let ny = col_max.ny();
    let values = col_max.level(0);

    let mut background = Grid::plane(nx, ny, MISSING_VALUE);
    sweep_rows(background.as_mut_slice(), nx, parallel, |x, y| {
        kernel_mean(values, kernel, x, y, nx, ny)
    });

    background
}

#[inline]
fn kernel_mean(values: &[f32], kernel: &CircularKernel, x: usize, y: usize, nx: usize, ny: usize) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (idx, _) in kernel.neighbours(x, y, nx, ny) {
        let val = values[idx];
        if is_valid(val) {
            sum += val as f64;
            count += 1;
        }
    }
    if count == 0 {
        MISSING_VALUE
    } else {
        (sum / count as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::is_missing;

    const M: f32 = MISSING_VALUE;

    #[test]
    fn test_column_max_skips_missing() {
        // 2x1 plane, 3 levels
        let data = vec![
            10.0, M, //
            30.0, M, //
            M, M,
        ];
        let dbz = Grid::from_vec(data, 2, 1, 3).unwrap();
        let col_max = compute_column_max(&dbz, &[0, 1, 2]);

        assert_eq!(col_max.get(0, 0, 0), Some(30.0));
        assert!(is_missing(col_max.get(1, 0, 0).unwrap()));
    }

    #[test]
    fn test_column_max_handles_negative_dbz() {
        let dbz = Grid::from_vec(vec![-20.0, -5.0], 1, 1, 2).unwrap();
        let col_max = compute_column_max(&dbz, &[0, 1]);
        assert_eq!(col_max.get(0, 0, 0), Some(-5.0));
    }

    #[test]
    fn test_column_max_respects_level_selection() {
        let dbz = Grid::from_vec(vec![10.0, 50.0, 20.0], 1, 1, 3).unwrap();
        let col_max = compute_column_max(&dbz, &[0, 2]);
        assert_eq!(col_max.get(0, 0, 0), Some(20.0));
    }

    #[test]
    fn test_background_averages_valid_cells() {
        // 3x1 plane: [10, missing, 30], radius 1 cell
        let col_max = Grid::from_vec(vec![10.0, M, 30.0], 3, 1, 1).unwrap();
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let bg = compute_background(&col_max, &kernel, false);

        assert_eq!(bg.get(0, 0, 0), Some(10.0));
        assert_eq!(bg.get(1, 0, 0), Some(20.0));
        assert_eq!(bg.get(2, 0, 0), Some(30.0));
    }

    #[test]
    fn test_background_missing_when_kernel_empty() {
        let col_max = Grid::from_vec(vec![M, M, M, 40.0], 4, 1, 1).unwrap();
        let kernel = CircularKernel::new(1.0, 1.0, 1.0);
        let bg = compute_background(&col_max, &kernel, false);

        assert!(is_missing(bg.get(0, 0, 0).unwrap()));
        assert!(is_missing(bg.get(1, 0, 0).unwrap()));
        assert_eq!(bg.get(2, 0, 0), Some(40.0));
    }

    #[test]
    fn test_background_corner_with_oversized_kernel() {
        let values: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let col_max = Grid::from_vec(values, 3, 3, 1).unwrap();
        let kernel = CircularKernel::new(50.0, 1.0, 1.0);
        let bg = compute_background(&col_max, &kernel, true);

        // every cell sees the whole grid: mean of 0..9 = 4
        for &v in bg.as_slice() {
            assert!((v - 4.0).abs() < 1e-6);
        }
    }
}
