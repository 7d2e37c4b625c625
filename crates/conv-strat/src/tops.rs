//! Echo-top heights and the tops of the convective and stratiform parts.

use crate::geometry::GridGeometry;
use crate::grid::{is_valid, Grid, MISSING_VALUE};
use crate::partition::Category;

/// Height (km) of the highest level in `levels` whose dBZ reaches
/// `dbz_threshold`; missing where no level does.
pub fn compute_echo_tops(
    dbz: &Grid<f32>,
    geometry: &GridGeometry,
    levels: &[usize],
    dbz_threshold: f64,
) -> Grid<f32> {
    let mut tops = Grid::plane(dbz.nx(), dbz.ny(), MISSING_VALUE);
    for &iz in levels {
        let ht = geometry.z_km[iz] as f32;
        for (top, &val) in tops.as_mut_slice().iter_mut().zip(dbz.level(iz)) {
            if is_valid(val) && val as f64 >= dbz_threshold && (!is_valid(*top) || ht > *top) {
                *top = ht;
            }
        }
    }
    tops
}

/// Tops of the convective and stratiform echo: for each column of the
/// given category, the height of the highest level in `levels` with valid dBZ.
pub fn compute_partition_tops(
    dbz: &Grid<f32>,
    partition: &Grid<Category>,
    geometry: &GridGeometry,
    levels: &[usize],
) -> (Grid<f32>, Grid<f32>) {
    let (nx, ny) = (dbz.nx(), dbz.ny());
    let mut conv_top = Grid::plane(nx, ny, MISSING_VALUE);
    let mut strat_top = Grid::plane(nx, ny, MISSING_VALUE);
    let categories = partition.as_slice();

    for &iz in levels {
        let ht = geometry.z_km[iz] as f32;
        let level = dbz.level(iz);
        let cells = conv_top
            .as_mut_slice()
            .iter_mut()
            .zip(strat_top.as_mut_slice().iter_mut())
            .zip(level)
            .zip(categories);
        for (((ctop, stop), &val), &cat) in cells {
            if !is_valid(val) {
                continue;
            }
            let top = match cat {
                Category::Convective => ctop,
                Category::Stratiform => stop,
                Category::Missing => continue,
            };
            if !is_valid(*top) || ht > *top {
                *top = ht;
            }
        }
    }

    (conv_top, strat_top)
}
