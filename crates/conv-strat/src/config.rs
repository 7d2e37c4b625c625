//! Configuration for the convective/stratiform partition.
//!
//! The surrounding application owns where settings come from (parameter
//! files, command line); it hands them over either field by field through
//! the finder's setters or as a JSON document via [`ConvStratConfig::from_json`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConvStratError, Result};

/// Settings for the background-dBZ to convective-radius ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvRadiusConfig {
    /// Background dBZ at or below which the minimum radius applies.
    pub min_dbz: f64,
    /// Background dBZ at or above which the maximum radius applies.
    pub max_dbz: f64,
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    /// Radius of the kernel used to average column-max dBZ into the background.
    pub background_radius_km: f64,
}

impl Default for ConvRadiusConfig {
    fn default() -> Self {
        Self {
            min_dbz: 20.0,
            max_dbz: 40.0,
            min_radius_km: 1.0,
            max_radius_km: 5.0,
            background_radius_km: 11.0,
        }
    }
}

impl ConvRadiusConfig {
    /// Validate the ramp settings. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_dbz < self.max_dbz) {
            return Err(ConvStratError::invalid_config(format!(
                "conv radius min_dbz ({}) must be < max_dbz ({})",
                self.min_dbz, self.max_dbz
            )));
        }
        if !(self.min_radius_km >= 0.0) {
            return Err(ConvStratError::invalid_config(format!(
                "conv radius min_radius_km ({}) must be >= 0",
                self.min_radius_km
            )));
        }
        if !(self.min_radius_km <= self.max_radius_km) || !self.max_radius_km.is_finite() {
            return Err(ConvStratError::invalid_config(format!(
                "conv radius min_radius_km ({}) must be <= max_radius_km ({})",
                self.min_radius_km, self.max_radius_km
            )));
        }
        if !(self.background_radius_km >= 0.0) || !self.background_radius_km.is_finite() {
            return Err(ConvStratError::invalid_config(format!(
                "background_radius_km ({}) must be >= 0",
                self.background_radius_km
            )));
        }
        Ok(())
    }
}

/// Settings for the 3-D echo-type classification: texture to
/// convectivity mapping, convective clump filters and height subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoTypeConfig {
    /// Texture (dB) at which convectivity is 0.
    pub texture_limit_low: f64,
    /// Texture (dB) at which convectivity reaches 1.
    pub texture_limit_high: f64,
    /// Convectivity at or above which a cell can join a convective clump.
    pub min_convectivity_for_convective: f64,
    /// Convectivity at or below which a cell is stratiform.
    pub max_convectivity_for_stratiform: f64,
    /// Clumps smaller than this are not treated as convective.
    pub min_vol_for_convective_km3: f64,
    /// Clumps shallower than this are mixed, not convective.
    pub min_vert_extent_for_convective_km: f64,
    /// Height at or below which echo counts as shallow (km).
    pub shallow_ht_km: f64,
    /// Height at or above which echo counts as deep (km).
    pub deep_ht_km: f64,
    /// Deep cell fraction above which a clump is deep convection.
    pub min_conv_fraction_for_deep: f64,
    /// Shallow cell fraction above which a clump is shallow convection.
    pub min_conv_fraction_for_shallow: f64,
    /// Elevated clumps have a shallow fraction below this...
    pub max_shallow_conv_fraction_for_elevated: f64,
    /// ...and a deep fraction below this.
    pub max_deep_conv_fraction_for_elevated: f64,
    /// Stratiform fraction of the cells under a clump for it to count as
    /// sitting on stratiform echo.
    pub min_strat_fraction_for_strat_below: f64,
}

impl Default for EchoTypeConfig {
    fn default() -> Self {
        Self {
            texture_limit_low: 0.0,
            texture_limit_high: 30.0,
            min_convectivity_for_convective: 0.5,
            max_convectivity_for_stratiform: 0.4,
            min_vol_for_convective_km3: 20.0,
            min_vert_extent_for_convective_km: 1.0,
            shallow_ht_km: 4.5,
            deep_ht_km: 9.0,
            min_conv_fraction_for_deep: 0.05,
            min_conv_fraction_for_shallow: 0.95,
            max_shallow_conv_fraction_for_elevated: 0.05,
            max_deep_conv_fraction_for_elevated: 0.25,
            min_strat_fraction_for_strat_below: 0.9,
        }
    }
}

impl EchoTypeConfig {
    /// Validate the echo-type settings. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if !(self.texture_limit_low < self.texture_limit_high) || !self.texture_limit_high.is_finite() {
            return Err(ConvStratError::invalid_config(format!(
                "texture_limit_low ({}) must be < texture_limit_high ({})",
                self.texture_limit_low, self.texture_limit_high
            )));
        }
        if !(self.max_convectivity_for_stratiform <= self.min_convectivity_for_convective) {
            return Err(ConvStratError::invalid_config(format!(
                "max_convectivity_for_stratiform ({}) must be <= min_convectivity_for_convective ({})",
                self.max_convectivity_for_stratiform, self.min_convectivity_for_convective
            )));
        }
        if !(self.shallow_ht_km <= self.deep_ht_km) {
            return Err(ConvStratError::invalid_config(format!(
                "shallow_ht_km ({}) must be <= deep_ht_km ({})",
                self.shallow_ht_km, self.deep_ht_km
            )));
        }
        if !(self.min_vol_for_convective_km3 >= 0.0) || !(self.min_vert_extent_for_convective_km >= 0.0) {
            return Err(ConvStratError::invalid_config(
                "clump volume and vertical extent limits must be >= 0",
            ));
        }
        let fractions = [
            ("min_convectivity_for_convective", self.min_convectivity_for_convective),
            ("max_convectivity_for_stratiform", self.max_convectivity_for_stratiform),
            ("min_conv_fraction_for_deep", self.min_conv_fraction_for_deep),
            ("min_conv_fraction_for_shallow", self.min_conv_fraction_for_shallow),
            ("max_shallow_conv_fraction_for_elevated", self.max_shallow_conv_fraction_for_elevated),
            ("max_deep_conv_fraction_for_elevated", self.max_deep_conv_fraction_for_elevated),
            ("min_strat_fraction_for_strat_below", self.min_strat_fraction_for_strat_below),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConvStratError::invalid_config(format!(
                    "{} ({}) must be in [0, 1]",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// All thresholds and radii that persist across volumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvStratConfig {
    /// Lowest level height included in column statistics (km).
    pub min_valid_ht_km: f64,
    /// Highest level height included in column statistics (km).
    pub max_valid_ht_km: f64,

    /// Columns whose max dBZ is below this are always stratiform.
    pub min_valid_dbz: f64,
    /// Columns whose max dBZ reaches this are always convective.
    pub dbz_for_definite_convection: f64,

    /// Radius of the texture kernel (km).
    pub texture_radius_km: f64,
    /// Minimum fraction of kernel cells with data before texture is trusted.
    pub min_valid_fraction_for_texture: f64,
    /// Mean texture (dB) at or above which a column is convective.
    pub min_texture_for_convection: f64,

    /// Background-dependent convective radius.
    pub conv_radius: ConvRadiusConfig,

    /// 3-D echo-type classification.
    pub echo_type: EchoTypeConfig,

    /// Threshold for echo-top heights (dBZ).
    pub dbz_for_echo_tops: f64,
    /// Compute texture on the column-max field instead of level by level.
    pub use_dbz_col_max: bool,
    /// Split kernel sweeps across the rayon thread pool.
    pub use_multiple_threads: bool,
}

impl Default for ConvStratConfig {
    fn default() -> Self {
        Self {
            min_valid_ht_km: 0.0,
            max_valid_ht_km: 30.0,
            min_valid_dbz: 10.0,
            dbz_for_definite_convection: 53.0,
            texture_radius_km: 7.0,
            min_valid_fraction_for_texture: 0.25,
            min_texture_for_convection: 6.0,
            conv_radius: ConvRadiusConfig::default(),
            echo_type: EchoTypeConfig::default(),
            dbz_for_echo_tops: 18.0,
            use_dbz_col_max: false,
            use_multiple_threads: true,
        }
    }
}

impl ConvStratConfig {
    /// Parse a JSON document; absent fields take their defaults.
    ///
    /// The document and its nested sections must be JSON objects; serde
    /// would otherwise accept a positional array.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        require_object(&value, "config")?;
        for section in ["conv_radius", "echo_type"] {
            if let Some(nested) = value.get(section) {
                require_object(nested, section)?;
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_valid_ht_km <= self.max_valid_ht_km) {
            return Err(ConvStratError::invalid_config(format!(
                "min_valid_ht_km ({}) must be <= max_valid_ht_km ({})",
                self.min_valid_ht_km, self.max_valid_ht_km
            )));
        }

        if !(self.texture_radius_km > 0.0) || !self.texture_radius_km.is_finite() {
            return Err(ConvStratError::invalid_config(format!(
                "texture_radius_km ({}) must be > 0",
                self.texture_radius_km
            )));
        }

        if !(0.0..=1.0).contains(&self.min_valid_fraction_for_texture) {
            return Err(ConvStratError::invalid_config(format!(
                "min_valid_fraction_for_texture ({}) must be in [0, 1]",
                self.min_valid_fraction_for_texture
            )));
        }

        if self.min_valid_dbz.is_nan()
            || self.dbz_for_definite_convection.is_nan()
            || self.min_texture_for_convection.is_nan()
            || self.dbz_for_echo_tops.is_nan()
        {
            return Err(ConvStratError::invalid_config("thresholds must not be NaN"));
        }

        self.conv_radius.validate()?;
        self.echo_type.validate()
    }
}

fn require_object(value: &Value, what: &str) -> Result<()> {
    if value.is_object() {
        return Ok(());
    }
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    Err(ConvStratError::Serialization(format!(
        "{} must be a JSON object, got {}",
        what, kind
    )))
}
