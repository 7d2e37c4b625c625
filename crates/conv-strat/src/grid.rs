//! Dense grid buffers and the missing-value convention.
//!
//! All derived grids use a single internal sentinel ([`MISSING_VALUE`]).
//! Every comparison against it goes through [`is_valid`] / [`is_missing`],
//! so kernel code never compares floats against a magic number directly.

use serde::{Deserialize, Serialize};

use crate::error::{ConvStratError, Result};

/// Sentinel written into every float grid where no value is available.
pub const MISSING_VALUE: f32 = -9999.0;

/// Returns true if `value` carries data under the internal convention.
#[inline]
pub fn is_valid(value: f32) -> bool {
    !is_missing(value)
}

/// Returns true if `value` is the internal sentinel or NaN.
#[inline]
pub fn is_missing(value: f32) -> bool {
    value.is_nan() || value == MISSING_VALUE
}

/// Missing-data convention of an incoming volume.
///
/// Grid readers usually carry both a `missing_data_value` and a
/// `bad_data_value`; both are treated as "no data". NaN is always missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissingValue {
    pub missing: f32,
    pub bad: Option<f32>,
}

impl MissingValue {
    /// Convention with a single sentinel.
    pub fn new(missing: f32) -> Self {
        Self { missing, bad: None }
    }

    /// Convention with distinct missing and bad sentinels.
    pub fn with_bad(missing: f32, bad: f32) -> Self {
        Self {
            missing,
            bad: Some(bad),
        }
    }

    /// Check whether an input sample is missing under this convention.
    #[inline]
    pub fn is_missing(&self, value: f32) -> bool {
        value.is_nan() || value == self.missing || self.bad == Some(value)
    }

    /// Map an input sample onto the internal convention.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        if self.is_missing(value) {
            MISSING_VALUE
        } else {
            value
        }
    }
}

impl Default for MissingValue {
    fn default() -> Self {
        Self::new(MISSING_VALUE)
    }
}

/// Dense row-major buffer: x varies fastest, then y, then z.
///
/// Two-dimensional grids are stored with `nz == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    data: Vec<T>,
    nx: usize,
    ny: usize,
    nz: usize,
}

impl<T: Copy> Grid<T> {
    /// Create a grid with every cell set to `fill`.
    pub fn filled(nx: usize, ny: usize, nz: usize, fill: T) -> Self {
        Self {
            data: vec![fill; nx * ny * nz],
            nx,
            ny,
            nz,
        }
    }

    /// Create a single-level grid with every cell set to `fill`.
    pub fn plane(nx: usize, ny: usize, fill: T) -> Self {
        Self::filled(nx, ny, 1, fill)
    }

    /// Wrap an existing buffer, checking that its length matches.
    pub fn from_vec(data: Vec<T>, nx: usize, ny: usize, nz: usize) -> Result<Self> {
        let expected = nx * ny * nz;
        if data.len() != expected {
            return Err(ConvStratError::dimension_mismatch(expected, data.len()));
        }
        Ok(Self { data, nx, ny, nz })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Number of cells in one horizontal level.
    pub fn plane_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of (x, y, z), or None if out of bounds.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        if x >= self.nx || y >= self.ny || z >= self.nz {
            return None;
        }
        Some((z * self.ny + y) * self.nx + x)
    }

    /// Bounds-checked read.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<T> {
        self.index(x, y, z).map(|i| self.data[i])
    }

    /// Bounds-checked write. Returns false if (x, y, z) is outside the grid.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> bool {
        match self.index(x, y, z) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// The cells of level `z`, or an empty slice if out of range.
    pub fn level(&self, z: usize) -> &[T] {
        if z >= self.nz {
            return &[];
        }
        let n = self.plane_len();
        &self.data[z * n..(z + 1) * n]
    }

    /// Mutable view of level `z`, or an empty slice if out of range.
    pub fn level_mut(&mut self, z: usize) -> &mut [T] {
        if z >= self.nz {
            return &mut [];
        }
        let n = self.plane_len();
        &mut self.data[z * n..(z + 1) * n]
    }

    /// Values of column (x, y) from the lowest level up.
    pub fn column(&self, x: usize, y: usize) -> impl Iterator<Item = T> + '_ {
        let start = if x < self.nx && y < self.ny {
            y * self.nx + x
        } else {
            self.data.len()
        };
        self.data.iter().skip(start).step_by(self.plane_len().max(1)).copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// True if `other` has the same dimensions.
    pub fn same_shape<U: Copy>(&self, other: &Grid<U>) -> bool {
        self.nx == other.nx && self.ny == other.ny && self.nz == other.nz
    }
}

impl Grid<f32> {
    /// Number of cells holding valid data.
    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|&&v| is_valid(v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_predicates() {
        assert!(is_missing(MISSING_VALUE));
        assert!(is_missing(f32::NAN));
        assert!(is_valid(0.0));
        assert!(is_valid(-32.0));
    }

    #[test]
    fn test_missing_value_normalize() {
        let mv = MissingValue::with_bad(-999.0, -888.0);
        assert_eq!(mv.normalize(-999.0), MISSING_VALUE);
        assert_eq!(mv.normalize(-888.0), MISSING_VALUE);
        assert_eq!(mv.normalize(f32::NAN), MISSING_VALUE);
        assert_eq!(mv.normalize(35.0), 35.0);
    }

    #[test]
    fn test_grid_indexing_is_x_fastest() {
        let data: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let grid = Grid::from_vec(data, 4, 3, 2).unwrap();

        assert_eq!(grid.get(0, 0, 0), Some(0.0));
        assert_eq!(grid.get(1, 0, 0), Some(1.0));
        assert_eq!(grid.get(0, 1, 0), Some(4.0));
        assert_eq!(grid.get(0, 0, 1), Some(12.0));
        assert_eq!(grid.get(4, 0, 0), None);
        assert_eq!(grid.get(0, 0, 2), None);
    }

    #[test]
    fn test_grid_from_vec_rejects_wrong_length() {
        let err = Grid::from_vec(vec![0.0f32; 5], 2, 2, 1).unwrap_err();
        assert_eq!(err, ConvStratError::dimension_mismatch(4, 5));
    }

    #[test]
    fn test_column_and_level() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let grid = Grid::from_vec(data, 2, 2, 3).unwrap();

        let col: Vec<f32> = grid.column(1, 1).collect();
        assert_eq!(col, vec![3.0, 7.0, 11.0]);
        assert_eq!(grid.level(2), &[8.0, 9.0, 10.0, 11.0]);
        assert!(grid.level(3).is_empty());
        assert_eq!(grid.column(5, 5).count(), 0);
    }

    #[test]
    fn test_set_out_of_bounds() {
        let mut grid = Grid::plane(2, 2, 0u8);
        assert!(grid.set(1, 1, 0, 7));
        assert!(!grid.set(2, 0, 0, 7));
        assert_eq!(grid.as_slice(), &[0, 0, 0, 7]);
    }
}
