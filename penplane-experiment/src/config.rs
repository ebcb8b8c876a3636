use penplane_core::{MarkerLayout, ProjectionConvention, Side};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// How far from the canvas centre a target is placed.
///
/// Both placements have been used for the same task and they move the target
/// by a lot, so neither is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetConvention {
    /// Target centre sits `distance` from the canvas centre.
    FullDistance,
    /// Target centre sits `distance / 2` from the canvas centre, so the two
    /// alternating targets are `distance` apart.
    #[default]
    HalfDistance,
}

impl OffsetConvention {
    pub fn centre_offset_px(&self, distance_px: f64) -> f64 {
        match self {
            OffsetConvention::FullDistance => distance_px,
            OffsetConvention::HalfDistance => distance_px / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackMode {
    /// One burst per accepted bin change while touching.
    MotionCoupled,
    /// Drive continuously while touching.
    Continuous,
    #[default]
    Off,
}

/// Quantisation of the pen position for motion-coupled feedback. The range
/// is in millimetres from the display's left edge whatever the projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinConfig {
    pub count: usize,
    pub range_min_mm: f64,
    pub range_max_mm: f64,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            count: 100,
            range_min_mm: 0.0,
            range_max_mm: 344.0,
        }
    }
}

impl BinConfig {
    pub fn bin_width_mm(&self) -> f64 {
        (self.range_max_mm - self.range_min_mm) / self.count as f64
    }

    /// The same bins with the range moved by `-origin_mm`.
    pub fn shifted(&self, origin_mm: f64) -> Self {
        Self {
            count: self.count,
            range_min_mm: self.range_min_mm - origin_mm,
            range_max_mm: self.range_max_mm - origin_mm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub participant_id: String,
    pub target_widths_px: Vec<f64>,
    pub target_distances_px: Vec<f64>,
    /// Index into the width/distance lists.
    pub difficulty_level: usize,
    pub trial_count: usize,
    /// Leading trials left out of summary averages.
    pub warmup_trials: usize,
    pub canvas_width_px: f64,
    pub screen_width_mm: f64,
    pub touch_threshold_mm: f64,
    pub hysteresis_fraction: f64,
    pub projection: ProjectionConvention,
    pub target_offset: OffsetConvention,
    pub initial_side: Side,
    pub feedback: FeedbackMode,
    pub bins: BinConfig,
    pub layout: MarkerLayout,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            participant_id: "test".to_string(),
            target_widths_px: vec![80.0],
            target_distances_px: vec![240.0],
            difficulty_level: 0,
            trial_count: 10,
            warmup_trials: 3,
            canvas_width_px: 1920.0,
            screen_width_mm: 346.0,
            touch_threshold_mm: 8.0,
            hysteresis_fraction: 0.3,
            projection: ProjectionConvention::ReferenceEdge,
            target_offset: OffsetConvention::HalfDistance,
            initial_side: Side::Right,
            feedback: FeedbackMode::Off,
            bins: BinConfig::default(),
            layout: MarkerLayout::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

impl ExperimentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a `.json` file as JSON and anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_widths_px.is_empty() {
            return Err(invalid("target_widths_px", "at least one width is required"));
        }
        if self.target_widths_px.len() != self.target_distances_px.len() {
            return Err(invalid(
                "target_distances_px",
                format!(
                    "{} distances for {} widths",
                    self.target_distances_px.len(),
                    self.target_widths_px.len()
                ),
            ));
        }
        for &w in &self.target_widths_px {
            positive("target_widths_px", w)?;
        }
        for &d in &self.target_distances_px {
            positive("target_distances_px", d)?;
        }
        if self.difficulty_level >= self.target_widths_px.len() {
            return Err(invalid(
                "difficulty_level",
                format!(
                    "level {} but only {} configured",
                    self.difficulty_level,
                    self.target_widths_px.len()
                ),
            ));
        }
        if self.trial_count == 0 {
            return Err(invalid("trial_count", "must be at least 1"));
        }
        positive("canvas_width_px", self.canvas_width_px)?;
        positive("screen_width_mm", self.screen_width_mm)?;
        positive("touch_threshold_mm", self.touch_threshold_mm)?;
        if !(0.0..1.0).contains(&self.hysteresis_fraction) {
            return Err(invalid(
                "hysteresis_fraction",
                format!("must be in [0, 1), got {}", self.hysteresis_fraction),
            ));
        }
        if self.bins.count == 0 {
            return Err(invalid("bins.count", "must be at least 1"));
        }
        if !(self.bins.range_max_mm > self.bins.range_min_mm) {
            return Err(invalid("bins.range_max_mm", "must exceed bins.range_min_mm"));
        }
        if !self.layout.is_distinct() {
            return Err(invalid("layout", "marker indices must be distinct"));
        }
        Ok(())
    }

    /// Bin range expressed in the projection's local `x` frame.
    pub fn local_bins(&self) -> BinConfig {
        self.bins.shifted(self.projection.x_origin_mm(self.screen_width_mm))
    }

    pub fn target_width_px(&self) -> f64 {
        self.target_widths_px[self.difficulty_level]
    }

    pub fn target_distance_px(&self) -> f64 {
        self.target_distances_px[self.difficulty_level]
    }

    /// Fitts index of difficulty of the active level, bits.
    pub fn index_of_difficulty(&self) -> f64 {
        index_of_difficulty(self.target_distance_px(), self.target_width_px())
    }
}

/// Shannon formulation: `log2(D / W + 1)`.
pub fn index_of_difficulty(distance: f64, width: f64) -> f64 {
    (distance / width + 1.0).log2()
}
