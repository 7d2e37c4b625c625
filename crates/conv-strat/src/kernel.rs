//! Circular neighbourhood kernels and the row-parallel sweep shared by
//! the background, texture and expansion passes.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Tolerance on the radius test so that a radius of exactly N cells
/// includes the cell N steps away.
const RADIUS_EPSILON_KM: f64 = 1.0e-6;

/// Widening step applied when a texture kernel is too narrow for the grid.
const WIDEN_FACTOR: f64 = 1.1;

/// Minimum rounded half-width, in cells, of a texture kernel.
pub const MIN_TEXTURE_HALF_WIDTH: usize = 2;

/// Default number of kernels kept by a [`KernelCache`].
pub const DEFAULT_KERNEL_CACHE_CAPACITY: usize = 8;

/// One member of a circular kernel, relative to the kernel centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelOffset {
    pub dx: isize,
    pub dy: isize,
    /// Distance from the centre in km.
    pub dist_km: f64,
}

/// All cells within `radius_km` of a centre cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularKernel {
    offsets: Vec<KernelOffset>,
    radius_km: f64,
    half_nx: isize,
    half_ny: isize,
}

impl CircularKernel {
    /// Build a kernel of `radius_km` for cells of `dx_km` x `dy_km`.
    ///
    /// The centre cell is always a member, so a zero or negative radius
    /// yields a single-cell kernel.
    pub fn new(radius_km: f64, dx_km: f64, dy_km: f64) -> Self {
        let radius_km = if radius_km.is_finite() { radius_km.max(0.0) } else { 0.0 };
        let half_nx = half_width(radius_km, dx_km);
        let half_ny = half_width(radius_km, dy_km);

        let mut offsets = Vec::new();
        for jy in -half_ny..=half_ny {
            let yy = jy as f64 * dy_km;
            for jx in -half_nx..=half_nx {
                let xx = jx as f64 * dx_km;
                let dist_km = (xx * xx + yy * yy).sqrt();
                if dist_km <= radius_km + RADIUS_EPSILON_KM {
                    offsets.push(KernelOffset {
                        dx: jx,
                        dy: jy,
                        dist_km,
                    });
                }
            }
        }

        Self {
            offsets,
            radius_km,
            half_nx,
            half_ny,
        }
    }

    /// Build a kernel whose rounded half-width, `floor(r / d + 0.5)`, is at
    /// least `min_half` cells along both axes, growing the radius in 10%
    /// steps if needed. Membership is still `dist <= radius`.
    pub fn widened(radius_km: f64, dx_km: f64, dy_km: f64, min_half: usize) -> Self {
        let min_half = min_half as isize;
        let mut radius = if radius_km > 0.0 && radius_km.is_finite() {
            radius_km
        } else {
            dx_km.min(dy_km)
        };
        while rounded_half_width(radius, dx_km) < min_half || rounded_half_width(radius, dy_km) < min_half {
            radius *= WIDEN_FACTOR;
        }
        Self::new(radius, dx_km, dy_km)
    }

    pub fn offsets(&self) -> &[KernelOffset] {
        &self.offsets
    }

    /// Number of member cells, including any that fall off the grid.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Half-widths in cells (x, y).
    pub fn half_widths(&self) -> (usize, usize) {
        (self.half_nx as usize, self.half_ny as usize)
    }

    /// In-bounds members around (x, y) on an `nx` x `ny` plane, as
    /// (flat plane index, offset). Members off the grid are skipped.
    #[inline]
    pub fn neighbours(
        &self,
        x: usize,
        y: usize,
        nx: usize,
        ny: usize,
    ) -> impl Iterator<Item = (usize, &KernelOffset)> + '_ {
        self.offsets.iter().filter_map(move |off| {
            let xx = x as isize + off.dx;
            let yy = y as isize + off.dy;
            if xx < 0 || yy < 0 || xx >= nx as isize || yy >= ny as isize {
                None
            } else {
                Some((yy as usize * nx + xx as usize, off))
            }
        })
    }
}

#[inline]
fn half_width(radius_km: f64, cell_km: f64) -> isize {
    ((radius_km + RADIUS_EPSILON_KM) / cell_km).floor() as isize
}

#[inline]
fn rounded_half_width(radius_km: f64, cell_km: f64) -> isize {
    (radius_km / cell_km + 0.5).floor() as isize
}

/// Key for cached kernels: radius and cell spacing, compared bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KernelKey {
    radius_bits: u64,
    dx_bits: u64,
    dy_bits: u64,
    widened: bool,
}

impl KernelKey {
    fn new(radius_km: f64, dx_km: f64, dy_km: f64, widened: bool) -> Self {
        Self {
            radius_bits: radius_km.to_bits(),
            dx_bits: dx_km.to_bits(),
            dy_bits: dy_km.to_bits(),
            widened,
        }
    }
}

/// Kernels keyed by radius and geometry, reused across volumes.
///
/// Bounded LRU: a stream of lat/lon volumes whose mean latitude drifts
/// produces a new dx for every volume, so old spacings are evicted.
pub struct KernelCache {
    kernels: LruCache<KernelKey, Arc<CircularKernel>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_KERNEL_CACHE_CAPACITY)
    }

    /// Cache holding at most `capacity` kernels (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            kernels: LruCache::new(capacity),
        }
    }

    /// Fetch or build a plain circular kernel.
    pub fn circular(&mut self, radius_km: f64, dx_km: f64, dy_km: f64) -> Arc<CircularKernel> {
        let key = KernelKey::new(radius_km, dx_km, dy_km, false);
        if let Some(kernel) = self.kernels.get(&key) {
            return Arc::clone(kernel);
        }
        let kernel = Arc::new(CircularKernel::new(radius_km, dx_km, dy_km));
        debug!(
            radius_km,
            cells = kernel.len(),
            half_nx = kernel.half_nx,
            half_ny = kernel.half_ny,
            "Built circular kernel"
        );
        self.kernels.put(key, Arc::clone(&kernel));
        kernel
    }

    /// Fetch or build a texture kernel widened to
    /// [`MIN_TEXTURE_HALF_WIDTH`] cells per axis.
    pub fn widened(&mut self, radius_km: f64, dx_km: f64, dy_km: f64) -> Arc<CircularKernel> {
        let key = KernelKey::new(radius_km, dx_km, dy_km, true);
        if let Some(kernel) = self.kernels.get(&key) {
            return Arc::clone(kernel);
        }
        let kernel = Arc::new(CircularKernel::widened(
            radius_km,
            dx_km,
            dy_km,
            MIN_TEXTURE_HALF_WIDTH,
        ));
        if kernel.radius_km() > radius_km {
            warn!(
                requested_km = radius_km,
                effective_km = kernel.radius_km(),
                "Texture radius too small for grid spacing, kernel widened"
            );
        }
        self.kernels.put(key, Arc::clone(&kernel));
        kernel
    }

    /// Number of cached kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Maximum number of kernels kept.
    pub fn capacity(&self) -> usize {
        self.kernels.cap().get()
    }

    pub fn clear(&mut self) {
        self.kernels.clear();
    }
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelCache")
            .field("len", &self.kernels.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Fill an `nx`-wide plane by evaluating `f(x, y)` for every cell.
///
/// With `parallel` set, rows are distributed across the rayon pool; each
/// output cell is written by exactly one worker and `f` only reads shared
/// inputs, so both paths produce identical output.
pub fn sweep_rows<T, F>(out: &mut [T], nx: usize, parallel: bool, f: F)
where
    T: Send,
    F: Fn(usize, usize) -> T + Sync,
{
    if nx == 0 {
        return;
    }
    if parallel {
        out.par_chunks_mut(nx).enumerate().for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = f(x, y);
            }
        });
    } else {
        out.chunks_mut(nx).enumerate().for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = f(x, y);
            }
        });
    }
}
