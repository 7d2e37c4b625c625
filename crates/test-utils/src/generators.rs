//! Synthetic reflectivity generators.
//!
//! Volumes are flat `Vec<f32>` in (z, y, x) order with x varying fastest,
//! the layout the partitioner consumes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sentinel used by the generators for missing samples.
pub const TEST_MISSING: f32 = -9999.0;

/// Flat index of (x, y, z) in an x-fastest volume.
#[inline]
pub fn volume_index(nx: usize, ny: usize, x: usize, y: usize, z: usize) -> usize {
    z * nx * ny + y * nx + x
}

/// Evenly spaced level heights starting at `base_km`.
///
/// # Example
///
/// ```
/// use test_utils::z_levels;
///
/// assert_eq!(z_levels(3, 0.5, 1.0), vec![0.5, 1.5, 2.5]);
/// ```
pub fn z_levels(nz: usize, base_km: f64, spacing_km: f64) -> Vec<f64> {
    (0..nz).map(|i| base_km + i as f64 * spacing_km).collect()
}

/// A volume with the same dBZ everywhere.
pub fn uniform_volume(nx: usize, ny: usize, nz: usize, dbz: f32) -> Vec<f32> {
    vec![dbz; nx * ny * nz]
}

/// A uniform background with a rectangular block of stronger echo.
///
/// The block covers columns `x0..x0 + width` and rows `y0..y0 + height`
/// on every level; it is clipped at the grid edge.
#[allow(clippy::too_many_arguments)]
pub fn block_storm_volume(
    nx: usize,
    ny: usize,
    nz: usize,
    background_dbz: f32,
    core_dbz: f32,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
) -> Vec<f32> {
    let mut data = uniform_volume(nx, ny, nz, background_dbz);
    for z in 0..nz {
        for y in y0..(y0 + height).min(ny) {
            for x in x0..(x0 + width).min(nx) {
                data[volume_index(nx, ny, x, y, z)] = core_dbz;
            }
        }
    }
    data
}

/// A single Gaussian cell centred at (`cx`, `cy`) in grid units, constant
/// with height.
///
/// Cells further than three sigma from the centre hold `background_dbz`.
#[allow(clippy::too_many_arguments)]
pub fn gaussian_cell_volume(
    nx: usize,
    ny: usize,
    nz: usize,
    cx: f32,
    cy: f32,
    sigma: f32,
    peak_dbz: f32,
    background_dbz: f32,
) -> Vec<f32> {
    let mut plane = Vec::with_capacity(nx * ny);
    for y in 0..ny {
        for x in 0..nx {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let r2 = dx * dx + dy * dy;
            if r2 > 9.0 * sigma * sigma {
                plane.push(background_dbz);
            } else {
                let weight = (-r2 / (2.0 * sigma * sigma)).exp();
                plane.push(background_dbz + (peak_dbz - background_dbz) * weight);
            }
        }
    }
    plane.repeat(nz)
}

/// A checkerboard plane alternating between `low` and `high`, repeated on
/// every level. Gives the maximum texture a kernel can see.
pub fn checkerboard_volume(nx: usize, ny: usize, nz: usize, low: f32, high: f32) -> Vec<f32> {
    let plane: Vec<f32> = (0..ny)
        .flat_map(|y| (0..nx).map(move |x| if (x + y) % 2 == 0 { low } else { high }))
        .collect();
    plane.repeat(nz)
}

/// Uniform noise in `[min_dbz, max_dbz)` from a fixed seed.
pub fn noise_volume(nx: usize, ny: usize, nz: usize, min_dbz: f32, max_dbz: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..nx * ny * nz).map(|_| rng.gen_range(min_dbz..max_dbz)).collect()
}

/// Mark every level of the given columns as missing.
pub fn with_missing_columns(mut data: Vec<f32>, nx: usize, ny: usize, columns: &[(usize, usize)]) -> Vec<f32> {
    let nz = data.len() / (nx * ny).max(1);
    for &(x, y) in columns {
        for z in 0..nz {
            data[volume_index(nx, ny, x, y, z)] = TEST_MISSING;
        }
    }
    data
}

/// Mark every column on the levels `levels` as missing.
pub fn with_missing_levels(mut data: Vec<f32>, nx: usize, ny: usize, levels: &[usize]) -> Vec<f32> {
    let n_plane = nx * ny;
    for &z in levels {
        data[z * n_plane..(z + 1) * n_plane].fill(TEST_MISSING);
    }
    data
}
