//! Three-dimensional echo typing.
//!
//! Texture is mapped to a 0..1 convectivity, cells above the convective
//! threshold are grouped into face-connected 3-D clumps, and every clump
//! and remaining cell gets a height-based echo subtype. The 2-D echo type
//! is the highest subtype found in each column.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::EchoTypeConfig;
use crate::error::Result;
use crate::geometry::GridGeometry;
use crate::grid::{is_valid, Grid, MISSING_VALUE};

/// Echo type of a grid cell or column.
///
/// Byte values leave gaps between the families so that range checks
/// (stratiform, mixed, convective) are plain comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum EchoType {
    #[default]
    Missing = 0,
    StratiformLow = 14,
    /// Stratiform on single-level input, where no height subtype applies.
    Stratiform = 15,
    StratiformMid = 16,
    StratiformHigh = 18,
    Mixed = 25,
    /// Convection sitting on top of stratiform echo.
    ConvectiveElevated = 32,
    ConvectiveShallow = 34,
    /// Convective on single-level input.
    Convective = 35,
    ConvectiveMid = 36,
    ConvectiveDeep = 38,
}

impl EchoType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Missing),
            14 => Some(Self::StratiformLow),
            15 => Some(Self::Stratiform),
            16 => Some(Self::StratiformMid),
            18 => Some(Self::StratiformHigh),
            25 => Some(Self::Mixed),
            32 => Some(Self::ConvectiveElevated),
            34 => Some(Self::ConvectiveShallow),
            35 => Some(Self::Convective),
            36 => Some(Self::ConvectiveMid),
            38 => Some(Self::ConvectiveDeep),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::StratiformLow => "stratiform_low",
            Self::Stratiform => "stratiform",
            Self::StratiformMid => "stratiform_mid",
            Self::StratiformHigh => "stratiform_high",
            Self::Mixed => "mixed",
            Self::ConvectiveElevated => "convective_elevated",
            Self::ConvectiveShallow => "convective_shallow",
            Self::Convective => "convective",
            Self::ConvectiveMid => "convective_mid",
            Self::ConvectiveDeep => "convective_deep",
        }
    }

    pub fn is_stratiform(self) -> bool {
        (Self::StratiformLow..=Self::StratiformHigh).contains(&self)
    }

    pub fn is_convective(self) -> bool {
        self >= Self::ConvectiveElevated
    }
}

impl std::fmt::Display for EchoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shallow and deep height thresholds for every column (km).
#[derive(Debug, Clone, PartialEq)]
pub struct HeightThresholds {
    shallow_km: Grid<f32>,
    deep_km: Grid<f32>,
}

impl HeightThresholds {
    /// The same thresholds in every column.
    pub fn constant(nx: usize, ny: usize, shallow_km: f64, deep_km: f64) -> Self {
        Self {
            shallow_km: Grid::plane(nx, ny, shallow_km as f32),
            deep_km: Grid::plane(nx, ny, deep_km as f32),
        }
    }

    /// Per-column thresholds, e.g. derived from a freezing-level analysis.
    pub fn from_planes(nx: usize, ny: usize, shallow_km: Vec<f32>, deep_km: Vec<f32>) -> Result<Self> {
        Ok(Self {
            shallow_km: Grid::from_vec(shallow_km, nx, ny, 1)?,
            deep_km: Grid::from_vec(deep_km, nx, ny, 1)?,
        })
    }

    pub fn shallow_km(&self) -> &Grid<f32> {
        &self.shallow_km
    }

    pub fn deep_km(&self) -> &Grid<f32> {
        &self.deep_km
    }

    /// True when the thresholds cover an `nx` x `ny` plane.
    pub fn fits(&self, nx: usize, ny: usize) -> bool {
        self.shallow_km.nx() == nx && self.shallow_km.ny() == ny
    }
}

/// Map one texture value to convectivity.
///
/// Below the low limit (or missing) the result is missing; above the high
/// limit it is 1.
#[inline]
pub fn convectivity_from_texture(texture: f32, cfg: &EchoTypeConfig) -> f32 {
    if !is_valid(texture) || (texture as f64) < cfg.texture_limit_low {
        return MISSING_VALUE;
    }
    if texture as f64 > cfg.texture_limit_high {
        return 1.0;
    }
    ((texture as f64 - cfg.texture_limit_low) / (cfg.texture_limit_high - cfg.texture_limit_low)) as f32
}

/// Convectivity of every cell of `texture`; missing in columns whose
/// kernel coverage is below `min_valid_fraction`.
pub fn compute_convectivity(
    texture: &Grid<f32>,
    fraction_active: &Grid<f32>,
    min_valid_fraction: f64,
    cfg: &EchoTypeConfig,
) -> Grid<f32> {
    let mut convectivity = Grid::filled(texture.nx(), texture.ny(), texture.nz(), MISSING_VALUE);
    let fraction = fraction_active.level(0);
    for iz in 0..texture.nz() {
        let cells = convectivity
            .level_mut(iz)
            .iter_mut()
            .zip(texture.level(iz))
            .zip(fraction);
        for ((out, &tex), &frac) in cells {
            if frac as f64 >= min_valid_fraction {
                *out = convectivity_from_texture(tex, cfg);
            }
        }
    }
    convectivity
}

/// Face-connected 3-D regions of cells whose convectivity reaches
/// `min_convectivity`.
///
/// Each clump lists flat volume indices in ascending order; clumps are
/// ordered by their lowest index.
pub fn find_clumps(convectivity: &Grid<f32>, min_convectivity: f64) -> Vec<Vec<usize>> {
    let (nx, ny, nz) = (convectivity.nx(), convectivity.ny(), convectivity.nz());
    let n_plane = nx * ny;
    let values = convectivity.as_slice();
    let is_member = |idx: usize| is_valid(values[idx]) && values[idx] as f64 >= min_convectivity;

    let mut visited = vec![false; values.len()];
    let mut queue = VecDeque::new();
    let mut clumps = Vec::new();

    for seed in 0..values.len() {
        if visited[seed] || !is_member(seed) {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut cells = Vec::new();

        while let Some(idx) = queue.pop_front() {
            cells.push(idx);
            let x = idx % nx;
            let y = (idx % n_plane) / nx;
            let z = idx / n_plane;

            let mut neighbours = [None; 6];
            if x > 0 {
                neighbours[0] = Some(idx - 1);
            }
            if x + 1 < nx {
                neighbours[1] = Some(idx + 1);
            }
            if y > 0 {
                neighbours[2] = Some(idx - nx);
            }
            if y + 1 < ny {
                neighbours[3] = Some(idx + nx);
            }
            if z > 0 {
                neighbours[4] = Some(idx - n_plane);
            }
            if z + 1 < nz {
                neighbours[5] = Some(idx + n_plane);
            }

            for next in neighbours.into_iter().flatten() {
                if !visited[next] && is_member(next) {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        cells.sort_unstable();
        clumps.push(cells);
    }

    clumps
}

/// Thickness of level `iz`: one-sided difference at the ends, centred
/// in between. Zero for single-level grids.
pub fn level_thickness_km(z_km: &[f64], iz: usize) -> f64 {
    let nz = z_km.len();
    if nz < 2 || iz >= nz {
        return 0.0;
    }
    if iz == 0 {
        z_km[1] - z_km[0]
    } else if iz == nz - 1 {
        z_km[iz] - z_km[iz - 1]
    } else {
        (z_km[iz + 1] - z_km[iz - 1]) / 2.0
    }
}

/// A 3-D convective clump and its geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct StormClump {
    cells: Vec<usize>,
    volume_km3: f64,
    vert_extent_km: f64,
    n_shallow: usize,
    n_mid: usize,
    n_deep: usize,
    echo_type: EchoType,
}

impl StormClump {
    /// Measure a clump given as flat volume indices.
    pub fn new(cells: Vec<usize>, geometry: &GridGeometry, thresholds: &HeightThresholds) -> Self {
        let n_plane = geometry.n_plane();
        let cell_area_km2 = geometry.dx_km() * geometry.dy_km();
        let shallow = thresholds.shallow_km.as_slice();
        let deep = thresholds.deep_km.as_slice();

        let mut volume_km3 = 0.0;
        let mut min_z = f64::MAX;
        let mut max_z = f64::MIN;
        let (mut n_shallow, mut n_mid, mut n_deep) = (0, 0, 0);

        for &idx in &cells {
            let iz = idx / n_plane;
            let i2d = idx % n_plane;
            let z = geometry.z_km[iz];
            min_z = min_z.min(z);
            max_z = max_z.max(z);
            volume_km3 += cell_area_km2 * level_thickness_km(&geometry.z_km, iz);

            if z <= shallow[i2d] as f64 {
                n_shallow += 1;
            } else if z >= deep[i2d] as f64 {
                n_deep += 1;
            } else {
                n_mid += 1;
            }
        }

        let vert_extent_km = if cells.is_empty() { 0.0 } else { max_z - min_z };
        Self {
            cells,
            volume_km3,
            vert_extent_km,
            n_shallow,
            n_mid,
            n_deep,
            echo_type: EchoType::Missing,
        }
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn volume_km3(&self) -> f64 {
        self.volume_km3
    }

    pub fn vert_extent_km(&self) -> f64 {
        self.vert_extent_km
    }

    /// Cell counts (shallow, mid, deep).
    pub fn layer_counts(&self) -> (usize, usize, usize) {
        (self.n_shallow, self.n_mid, self.n_deep)
    }

    pub fn fraction_shallow(&self) -> f64 {
        self.n_shallow as f64 / self.cells.len().max(1) as f64
    }

    pub fn fraction_deep(&self) -> f64 {
        self.n_deep as f64 / self.cells.len().max(1) as f64
    }

    /// Echo type assigned by [`StormClump::classify`].
    pub fn echo_type(&self) -> EchoType {
        self.echo_type
    }

    /// Whether the cells directly under the clump are mostly stratiform.
    ///
    /// Missing cells below count against it. A clump touching the lowest
    /// level never has stratiform below.
    pub fn stratiform_below(&self, convectivity: &Grid<f32>, cfg: &EchoTypeConfig) -> bool {
        let n_plane = convectivity.plane_len();
        let values = convectivity.as_slice();
        let mut n_miss = 0usize;
        let mut n_strat = 0usize;

        for &idx in &self.cells {
            if idx < n_plane {
                return false;
            }
            let below = values[idx - n_plane];
            if !is_valid(below) {
                n_miss += 1;
            } else if (below as f64) < cfg.min_convectivity_for_convective {
                n_strat += 1;
            }
        }

        let total = n_miss + n_strat;
        total > 0 && n_strat as f64 / total as f64 > cfg.min_strat_fraction_for_strat_below
    }

    /// Decide the clump's echo type from its size, shape and what lies
    /// beneath it.
    pub fn classify(&mut self, convectivity: &Grid<f32>, cfg: &EchoTypeConfig) -> EchoType {
        self.echo_type = if self.volume_km3 < cfg.min_vol_for_convective_km3
            || self.vert_extent_km < cfg.min_vert_extent_for_convective_km
        {
            EchoType::Mixed
        } else if self.fraction_shallow() < cfg.max_shallow_conv_fraction_for_elevated
            && self.stratiform_below(convectivity, cfg)
        {
            if self.fraction_deep() < cfg.max_deep_conv_fraction_for_elevated {
                EchoType::ConvectiveElevated
            } else {
                EchoType::Mixed
            }
        } else if self.fraction_shallow() > cfg.min_conv_fraction_for_shallow {
            EchoType::ConvectiveShallow
        } else if self.fraction_deep() > cfg.min_conv_fraction_for_deep {
            EchoType::ConvectiveDeep
        } else {
            EchoType::ConvectiveMid
        };
        self.echo_type
    }
}

/// Echo type of every cell of a multi-level volume.
///
/// Clumps reaching the minimum volume are classified as a whole; every
/// other cell with non-zero convectivity is mixed or stratiform by
/// height. Returns the typed volume and the retained clumps.
#[instrument(skip_all, fields(nz = convectivity.nz()))]
pub fn compute_echo_type_3d(
    convectivity: &Grid<f32>,
    geometry: &GridGeometry,
    thresholds: &HeightThresholds,
    cfg: &EchoTypeConfig,
) -> (Grid<EchoType>, Vec<StormClump>) {
    let (nx, ny, nz) = (convectivity.nx(), convectivity.ny(), convectivity.nz());
    let n_plane = nx * ny;
    let mut echo_type = Grid::filled(nx, ny, nz, EchoType::Missing);

    let all = find_clumps(convectivity, cfg.min_convectivity_for_convective);
    let n_all = all.len();
    let mut clumps: Vec<StormClump> = all
        .into_iter()
        .map(|cells| StormClump::new(cells, geometry, thresholds))
        .filter(|clump| clump.volume_km3() >= cfg.min_vol_for_convective_km3)
        .collect();
    debug!(
        clumps = n_all,
        retained = clumps.len(),
        min_vol_km3 = cfg.min_vol_for_convective_km3,
        "Convective clumps"
    );

    let types = echo_type.as_mut_slice();
    for clump in &mut clumps {
        let category = clump.classify(convectivity, cfg);
        for &idx in clump.cells() {
            types[idx] = category;
        }
    }

    let values = convectivity.as_slice();
    let shallow = thresholds.shallow_km.as_slice();
    let deep = thresholds.deep_km.as_slice();
    for (idx, (out, &conv)) in types.iter_mut().zip(values).enumerate() {
        if *out != EchoType::Missing || !is_valid(conv) || conv == 0.0 {
            continue;
        }
        if conv as f64 > cfg.max_convectivity_for_stratiform {
            *out = EchoType::Mixed;
            continue;
        }
        let z = geometry.z_km[idx / n_plane];
        let i2d = idx % n_plane;
        *out = if z <= shallow[i2d] as f64 {
            EchoType::StratiformLow
        } else if z >= deep[i2d] as f64 {
            EchoType::StratiformHigh
        } else {
            EchoType::StratiformMid
        };
    }

    (echo_type, clumps)
}

/// Echo type of single-level input, where neither clumps nor height
/// subtypes apply.
pub fn compute_echo_type_2d(convectivity: &Grid<f32>, cfg: &EchoTypeConfig) -> Grid<EchoType> {
    let mut echo_type = Grid::filled(convectivity.nx(), convectivity.ny(), convectivity.nz(), EchoType::Missing);
    for (out, &conv) in echo_type.as_mut_slice().iter_mut().zip(convectivity.as_slice()) {
        if !is_valid(conv) || conv == 0.0 {
            continue;
        }
        let conv = conv as f64;
        *out = if conv <= cfg.max_convectivity_for_stratiform {
            EchoType::Stratiform
        } else if conv >= cfg.min_convectivity_for_convective {
            EchoType::Convective
        } else {
            EchoType::Mixed
        };
    }
    echo_type
}

/// Column summaries over `levels`: the highest echo type and the maximum
/// convectivity. Columns whose kernel coverage is below
/// `min_valid_fraction` stay missing.
pub fn summarize_echo_type(
    echo_type_3d: &Grid<EchoType>,
    convectivity: &Grid<f32>,
    fraction_active: &Grid<f32>,
    levels: &[usize],
    min_valid_fraction: f64,
) -> (Grid<EchoType>, Grid<f32>) {
    let (nx, ny) = (echo_type_3d.nx(), echo_type_3d.ny());
    let mut echo_type_2d = Grid::plane(nx, ny, EchoType::Missing);
    let mut max_convectivity = Grid::plane(nx, ny, MISSING_VALUE);
    let active: Vec<bool> = fraction_active
        .level(0)
        .iter()
        .map(|&f| f as f64 >= min_valid_fraction)
        .collect();

    for &iz in levels {
        let cells = echo_type_2d
            .as_mut_slice()
            .iter_mut()
            .zip(max_convectivity.as_mut_slice().iter_mut())
            .zip(echo_type_3d.level(iz).iter().zip(convectivity.level(iz)))
            .zip(&active);
        for (((et, cmax), (&et3, &c3)), &is_active) in cells {
            if !is_active {
                continue;
            }
            *et = (*et).max(et3);
            if is_valid(c3) && (!is_valid(*cmax) || c3 > *cmax) {
                *cmax = c3;
            }
        }
    }

    (echo_type_2d, max_convectivity)
}
