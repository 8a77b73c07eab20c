use crate::error::{MatchError, MatchResult};
use crate::{CorrelationWindow, Matcher, MatchingMode, MatchingParams};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete matcher configuration with all settings
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatcherConfig {
    pub mode: MatchingMode,
    pub window: CorrelationWindow,
    /// Image dimensions
    pub img_rows: i32,
    pub img_cols: i32,
    /// Search geometry
    pub max_disparity: i32,
    pub epipolar_range: i32,
    /// Quality filter: keep a best match only if its distance is strictly
    /// below this
    pub filter_dist: u32,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl MatcherConfig {
    /// Create new configuration with default settings
    pub fn new(img_rows: i32, img_cols: i32) -> Self {
        Self {
            mode: MatchingMode::Stereo,
            window: CorrelationWindow::SparseCw16,
            img_rows,
            img_cols,
            max_disparity: img_cols / 10,
            epipolar_range: 3,
            filter_dist: u32::MAX,
            name: None,
            description: None,
        }
    }

    /// Stereo preset for well-rectified pairs: tight epipolar band,
    /// conservative quality filter.
    pub fn stereo_preset(img_rows: i32, img_cols: i32) -> Self {
        Self {
            mode: MatchingMode::Stereo,
            window: CorrelationWindow::SparseCw16,
            img_rows,
            img_cols,
            max_disparity: img_cols / 8,
            epipolar_range: 3,
            filter_dist: 48,
            name: Some("Stereo".to_string()),
            description: Some("Rectified stereo pairs with small vertical drift".to_string()),
        }
    }

    /// Wide-baseline preset: larger disparity range and epipolar band,
    /// denser correlation window.
    pub fn wide_baseline_preset(img_rows: i32, img_cols: i32) -> Self {
        Self {
            mode: MatchingMode::Stereo,
            window: CorrelationWindow::DenseCw5,
            img_rows,
            img_cols,
            max_disparity: img_cols / 4,
            epipolar_range: 7,
            filter_dist: 96,
            name: Some("Wide Baseline".to_string()),
            description: Some("Larger search range for poorly rectified pairs".to_string()),
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    pub fn with_filter_dist(mut self, filter_dist: u32) -> Self {
        self.filter_dist = filter_dist;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> MatchResult<()> {
        if self.img_rows <= 0 || self.img_cols <= 0 {
            return Err(MatchError::InvalidDimensions {
                rows: self.img_rows,
                cols: self.img_cols,
            });
        }
        if self.max_disparity < 0 || self.max_disparity >= self.img_cols {
            return Err(MatchError::InvalidDisparity {
                max_disparity: self.max_disparity,
                cols: self.img_cols,
            });
        }
        Ok(())
    }

    /// Bind the configuration to a census image layout and produce the
    /// matching parameters.
    pub fn into_params(&self, census_stride: i32, census_px_step: i32) -> MatchResult<MatchingParams> {
        self.validate()?;
        Ok(MatchingParams::new(
            self.mode,
            self.window,
            self.max_disparity,
            self.epipolar_range,
            census_stride,
            census_px_step,
        )?
        .with_filter_dist(self.filter_dist))
    }

    /// Build a ready-to-run matcher for the configured image size.
    pub fn build(&self, census_stride: i32, census_px_step: i32) -> MatchResult<Matcher> {
        let params = self.into_params(census_stride, census_px_step)?;
        Matcher::new(params, self.img_rows, self.img_cols)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "MatcherConfig: {}x{}, mode={:?}, window={:?}, max_disparity={}, epipolar_range={}, filter_dist={}",
            self.img_cols, self.img_rows, self.mode, self.window,
            self.max_disparity, self.epipolar_range, self.filter_dist
        )
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}
