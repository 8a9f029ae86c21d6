//! Configuration parsing and validation for attendod
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Check-in/check-out windows per record kind
//! - Daily auto-timeout triggers and evidence timing
//! - Validation with clear error messages

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Loading configuration");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Policy::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use attendo_api::RecordKind;
    use attendo_util::WallClock;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn parse_minimal_config() {
        let policy = parse_config("config_version = 1").unwrap();
        assert_eq!(policy.window(RecordKind::FaceToFace).to_string(), "08:00-17:00");
        assert_eq!(policy.window(RecordKind::Async).to_string(), "08:00-19:00");
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [service]
            socket_path = "/run/attendod/attendod.sock"
            data_dir = "/var/lib/attendod"
            catch_up_on_start = false

            [schedule.face_to_face]
            start = "07:30"
            end = "16:30"
            sweep_at = "17:00"
            evidence = "check_out"

            [schedule.async]
            end = "20:00"
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.service.socket_path, PathBuf::from("/run/attendod/attendod.sock"));
        assert!(!policy.service.catch_up_on_start);

        assert_eq!(policy.face_to_face.window.to_string(), "07:30-16:30");
        assert_eq!(policy.face_to_face.sweep_at, WallClock::new(17, 0).unwrap());
        assert_eq!(policy.evidence_timing(), EvidenceTiming::CheckOut);

        assert_eq!(policy.asynchronous.window.to_string(), "08:00-20:00");
        assert_eq!(policy.asynchronous.sweep_at, WallClock::new(20, 0).unwrap());
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_schedule() {
        let config = r#"
            config_version = 1

            [schedule.async]
            start = "19:00"
            end = "08:00"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = 1").unwrap();
        writeln!(file, "[schedule.face_to_face]").unwrap();
        writeln!(file, "evidence = \"check_in\"").unwrap();

        let policy = load_config(file.path()).unwrap();
        assert_eq!(policy.evidence_timing(), EvidenceTiming::CheckIn);
    }
}
