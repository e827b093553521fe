use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");
const SUPPORTED_VERSION: &str = "1.0";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ServiceConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: ServiceConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks the schema cannot express.
pub fn validate_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.upload_directory.trim().is_empty() || config.output_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "upload_directory and output_directory must not be empty".to_string(),
        });
    }

    if config.upload_directory == config.output_directory {
        return Err(ConfigError::Validation {
            message: "upload_directory and output_directory must differ".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let positive = [
        ("conversion_timeout_secs", config.conversion_timeout_secs),
        ("retention_secs", config.retention_secs),
        ("sweep_interval_secs", Some(config.sweep_interval_secs)),
        ("max_upload_bytes", config.max_upload_bytes),
    ];
    for (name, value) in positive {
        if value == Some(0) {
            return Err(ConfigError::Validation {
                message: format!("{} must be at least 1", name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use std::path::PathBuf;

    #[test]
    fn test_load_minimal_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "upload_directory": "/srv/uploads",
            "output_directory": "/srv/outputs"
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.upload_directory, "/srv/uploads");
        assert_eq!(config.output_directory, "/srv/outputs");
        assert_eq!(config.work_directory(), PathBuf::from("/srv/outputs/.work"));
        assert!(config.worker_count >= 1);
        assert_eq!(config.sweep_interval_secs, 60);
        assert!(config.conversion_timeout_secs.is_none());
        assert!(config.retention_secs.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "upload_directory": "/srv/uploads",
            "output_directory": "/srv/outputs",
            "work_directory": "/tmp/docshift",
            "worker_count": 3,
            "conversion_timeout_secs": 30,
            "retention_secs": 3600,
            "sweep_interval_secs": 10,
            "max_upload_bytes": 1048576,
            "logging": { "level": "docshift=debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.work_directory(), PathBuf::from("/tmp/docshift"));
        assert_eq!(config.conversion_timeout_secs, Some(30));
        assert_eq!(config.retention_secs, Some(3600));
        assert_eq!(config.max_upload_bytes, Some(1048576));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_required_field() {
        let config_json = r#"{ "version": "1.0", "upload_directory": "/in" }"#;
        let err = load_config_from_str(config_json).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_zero_workers_rejected_by_schema() {
        let config_json = r#"
        {
            "version": "1.0",
            "upload_directory": "/in",
            "output_directory": "/out",
            "worker_count": 0
        }
        "#;
        assert!(matches!(
            load_config_from_str(config_json),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "upload_directory": "/in",
            "output_directory": "/out",
            "logging": { "format": "pretty" }
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let config_json = r#"
        {
            "version": "2.0",
            "upload_directory": "/in",
            "output_directory": "/out"
        }
        "#;
        let err = load_config_from_str(config_json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_same_directories_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "upload_directory": "/data",
            "output_directory": "/data"
        }
        "#;
        let err = load_config_from_str(config_json).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_validate_config_in_code() {
        let mut config = ServiceConfig::new("/in", "/out");
        assert!(validate_config(&config).is_ok());

        config.conversion_timeout_secs = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("docshift.json");
        std::fs::write(
            &path,
            r#"{ "version": "1.0", "upload_directory": "/in", "output_directory": "/out" }"#,
        )
        .unwrap();

        assert!(load_config(&path).is_ok());
        assert!(matches!(
            load_config(temp_dir.path().join("missing.json")),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
