//! Processing configuration shared by every transform stage

use crate::core::beam_transform::BeamGeometry;
use crate::types::{VelprofError, VelprofResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Percent-good masking parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParams {
    /// A beam sample below this percent-good is treated as bad
    pub percent_good_threshold: i32,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            percent_good_threshold: 25,
        }
    }
}

/// Row-parallel execution parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelParams {
    /// Batches with fewer time rows than this run sequentially
    pub min_rows: usize,
}

impl Default for ParallelParams {
    fn default() -> Self {
        Self { min_rows: 512 }
    }
}

/// Top-level processing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub beam: BeamGeometry,
    pub quality: QualityParams,
    pub parallel: ParallelParams,
}

impl ProcessingConfig {
    /// Load a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> VelprofResult<Self> {
        let path_ref = path.as_ref();
        log::info!("Loading processing configuration: {}", path_ref.display());
        let contents = fs::read_to_string(path_ref)?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(contents: &str) -> VelprofResult<Self> {
        let config: ProcessingConfig = serde_json::from_str(contents)?;
        config.validate()?;
        log::debug!("Processing configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> VelprofResult<()> {
        let angle = self.beam.beam_angle_deg;
        if !(angle > 0.0 && angle < 90.0) {
            return Err(VelprofError::Config(format!(
                "beam angle must lie strictly between 0 and 90 degrees, got {}",
                angle
            )));
        }

        let threshold = self.quality.percent_good_threshold;
        if !(0..=100).contains(&threshold) {
            return Err(VelprofError::Config(format!(
                "percent-good threshold must be within 0..=100, got {}",
                threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ProcessingConfig::default();
        assert_eq!(config.beam.beam_angle_deg, 20.0);
        assert!(config.beam.convex);
        assert_eq!(config.quality.percent_good_threshold, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ProcessingConfig::from_json_str(r#"{"quality": {"percent_good_threshold": 50}}"#)
                .unwrap();
        assert_eq!(config.quality.percent_good_threshold, 50);
        assert_eq!(config.beam.beam_angle_deg, 20.0);
        assert_eq!(config.parallel.min_rows, 512);
    }

    #[test]
    fn test_rejects_invalid_beam_angle() {
        let result = ProcessingConfig::from_json_str(r#"{"beam": {"beam_angle_deg": 95.0}}"#);
        assert!(matches!(result, Err(VelprofError::Config(_))));
    }

    #[test]
    fn test_load_reads_json_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(br#"{"beam": {"beam_angle_deg": 30.0, "convex": false}}"#)
            .unwrap();
        let path = temp.into_temp_path();

        let config = ProcessingConfig::load(&path).unwrap();
        assert_eq!(config.beam.beam_angle_deg, 30.0);
        assert!(!config.beam.convex);
    }
}
