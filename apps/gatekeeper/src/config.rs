//! Station configuration.
//!
//! Loaded from `<config dir>/gatekeeper/config.toml` or a path given on the command line.
//! Every section and key is optional; missing ones take the defaults below.

use std::convert::TryFrom;
use std::path::{Path, PathBuf};

use dpfp_rs::{
    CaptureParams, CompressionAlgorithm, FingerPosition, FmdFormat, ImageFormat, ImageProcessing,
    Priority, Threshold, WsqTarget,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sdk: SdkConfig,
    pub capture: CaptureConfig,
    pub matching: MatchingConfig,
    pub enrollment: EnrollmentConfig,
    pub compression: CompressionConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Where the vendor libraries and the reader are found.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Explicit path of the reader library; the platform search path is used otherwise.
    pub device_library: Option<PathBuf>,
    pub matching_library: Option<PathBuf>,
    pub compression_library: Option<PathBuf>,
    /// Reader to open; the first one found when unset.
    pub reader: Option<String>,
    pub priority: Option<ReaderPriority>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReaderPriority {
    Cooperative,
    Exclusive,
}

impl From<ReaderPriority> for Priority {
    fn from(priority: ReaderPriority) -> Self {
        match priority {
            ReaderPriority::Cooperative => Priority::Cooperative,
            ReaderPriority::Exclusive => Priority::Exclusive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub timeout_ms: u32,
    pub image_format: RecordFormat,
    pub processing: Processing,
    pub resolution: u32,
    /// Status polling interval while waiting for a finger.
    pub poll_ms: u64,
    pub finger_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            timeout_ms: 5000,
            image_format: RecordFormat::Iso,
            processing: Processing::Enhanced,
            resolution: 500,
            poll_ms: 100,
            finger_timeout_ms: 10_000,
        }
    }
}

impl CaptureConfig {
    pub fn params(&self) -> CaptureParams {
        CaptureParams {
            image_format: self.image_format.into(),
            processing: self.processing.into(),
            resolution: self.resolution,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordFormat {
    Pixels,
    Ansi,
    Iso,
}

impl From<RecordFormat> for ImageFormat {
    fn from(format: RecordFormat) -> Self {
        match format {
            RecordFormat::Pixels => ImageFormat::PixelBuffer,
            RecordFormat::Ansi => ImageFormat::Ansi381,
            RecordFormat::Iso => ImageFormat::Iso19794,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Processing {
    Default,
    Piv,
    Enhanced,
    Unprocessed,
}

impl From<Processing> for ImageProcessing {
    fn from(processing: Processing) -> Self {
        match processing {
            Processing::Default => ImageProcessing::Default,
            Processing::Piv => ImageProcessing::Piv,
            Processing::Enhanced => ImageProcessing::Enhanced,
            Processing::Unprocessed => ImageProcessing::Unprocessed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub format: TemplateFormat,
    /// Scores below this count as a match.
    pub threshold: u32,
    pub max_candidates: usize,
    pub policy: MatchPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            format: TemplateFormat::Ansi,
            threshold: Threshold::default().value(),
            max_candidates: 10,
            policy: MatchPolicy::FirstMatch,
        }
    }
}

impl MatchingConfig {
    pub fn threshold(&self) -> Threshold {
        Threshold(self.threshold)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateFormat {
    Ansi,
    Iso,
}

impl From<TemplateFormat> for FmdFormat {
    fn from(format: TemplateFormat) -> Self {
        match format {
            TemplateFormat::Ansi => FmdFormat::Ansi378_2004,
            TemplateFormat::Iso => FmdFormat::Iso19794_2_2005,
        }
    }
}

/// How verification walks the stored items of a user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Stop at the first item scoring below the threshold.
    FirstMatch,
    /// Compare every item and keep the lowest score.
    BestMatch,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    pub scans: usize,
    /// Bounds on the size of a captured ISO 19794-4 record, envelope included. Records of
    /// other formats are held to the same raster size, so the bounds move with their
    /// envelope length.
    pub min_image_bytes: usize,
    pub max_image_bytes: usize,
    /// Finger position code stored in the templates, 0 for unknown.
    pub finger: i32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        EnrollmentConfig {
            scans: 4,
            min_image_bytes: 10_000,
            max_image_bytes: 200_046,
            finger: 0,
        }
    }
}

impl EnrollmentConfig {
    pub fn finger_position(&self) -> FingerPosition {
        FingerPosition::try_from(self.finger).unwrap_or_else(|_| {
            warn!(finger = self.finger, "unknown finger position, recording as unknown");
            FingerPosition::Unknown
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub algorithm: WsqAlgorithm,
    pub bitrate_x100: u32,
    pub tolerance_aw: u32,
    /// Target compressed size in bytes; overrides the bitrate when set.
    pub target_size: Option<u32>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            algorithm: WsqAlgorithm::Nist,
            bitrate_x100: 75,
            tolerance_aw: 10,
            target_size: None,
        }
    }
}

impl CompressionConfig {
    pub fn target(&self) -> WsqTarget {
        match self.target_size {
            Some(size) => WsqTarget::Size {
                size,
                tolerance_aw: self.tolerance_aw,
            },
            None => WsqTarget::Bitrate {
                bitrate_x100: self.bitrate_x100,
                tolerance_aw: self.tolerance_aw,
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WsqAlgorithm {
    Nist,
    Aware,
}

impl From<WsqAlgorithm> for CompressionAlgorithm {
    fn from(algorithm: WsqAlgorithm) -> Self {
        match algorithm {
            WsqAlgorithm::Nist => CompressionAlgorithm::Nist,
            WsqAlgorithm::Aware => CompressionAlgorithm::Aware,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub data_dir: PathBuf,
    /// Write every compressed scan next to the database rows.
    pub write_wsq_files: bool,
    pub dump_raw: bool,
    pub dump_png: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        StorageConfig {
            database: data_dir.join("gatekeeper.db"),
            data_dir,
            write_wsq_files: true,
            dump_raw: false,
            dump_png: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub file: bool,
    /// Log directory; `<data_dir>/logs` when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: true,
            directory: None,
        }
    }
}

impl Config {
    /// Loads the configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; a file that exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::IoError {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.clone(),
            source,
        })?;
        if FingerPosition::try_from(config.enrollment.finger).is_err() {
            return Err(ConfigError::InvalidFinger {
                path,
                finger: config.enrollment.finger,
            });
        }

        Ok(config)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("logs"))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(
        "invalid finger position {finger} in config file '{}', expected 0 to 10",
        path.display()
    )]
    InvalidFinger { path: PathBuf, finger: i32 },
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatekeeper")
        .join("config.toml")
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatekeeper")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.capture.timeout_ms, 5000);
        assert_eq!(config.matching.threshold, 100);
        assert_eq!(config.enrollment.scans, 4);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[sdk]
reader = "ExampleReader"
priority = "exclusive"

[matching]
threshold = 2147
policy = "best-match"

[compression]
target_size = 8192
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sdk.reader.as_deref(), Some("ExampleReader"));
        assert_eq!(config.sdk.priority, Some(ReaderPriority::Exclusive));
        assert_eq!(config.matching.threshold(), Threshold(2147));
        assert_eq!(config.matching.policy, MatchPolicy::BestMatch);
        assert_eq!(config.matching.max_candidates, 10);
        assert_eq!(
            config.compression.target(),
            WsqTarget::Size {
                size: 8192,
                tolerance_aw: 10
            }
        );
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn example_file_lists_defaults() {
        let config: Config = toml::from_str(include_str!("../gatekeeper.example.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[matching]\nthreshold = \"low\"\n").unwrap();

        match Config::load(Some(&path)) {
            Err(ConfigError::ParseError { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn capture_params_follow_config() {
        let config = CaptureConfig {
            image_format: RecordFormat::Ansi,
            ..CaptureConfig::default()
        };
        let params = config.params();
        assert_eq!(params.image_format, ImageFormat::Ansi381);
        assert_eq!(params.processing, ImageProcessing::Enhanced);
        assert_eq!(params.resolution, 500);
    }

    #[test]
    fn unknown_finger_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[enrollment]\nfinger = 42\n").unwrap();

        match Config::load(Some(&path)) {
            Err(ConfigError::InvalidFinger { finger, .. }) => assert_eq!(finger, 42),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unknown_finger_code_falls_back() {
        let config = EnrollmentConfig {
            finger: 42,
            ..EnrollmentConfig::default()
        };
        assert_eq!(config.finger_position(), FingerPosition::Unknown);
    }
}
