//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
            _ => ConfigError::Io(e),
        })?;
        Self::load_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::finish(Config::default())),
            Err(e) => Err(e),
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(Self::finish(config))
    }

    fn finish(mut config: Config) -> Config {
        config.storage.data_dir = Self::expand_path_buf(&config.storage.data_dir);
        config
    }

    /// Expand environment variables in the format `${VAR}`.
    ///
    /// Comment lines are copied unchanged.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "<env pattern>".to_string(),
            message: e.to_string(),
        })?;

        let mut result = String::with_capacity(content.len());
        for line in content.split_inclusive('\n') {
            if line.trim_start().starts_with('#') {
                result.push_str(line);
                continue;
            }

            let mut expanded = line.to_string();
            for cap in re.captures_iter(line) {
                let var_name = &cap[1];
                let var_value = std::env::var(var_name)
                    .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
                expanded = expanded.replace(&cap[0], &var_value);
            }
            result.push_str(&expanded);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/backups`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }

    fn expand_path_buf(path: &Path) -> PathBuf {
        match path.to_str() {
            Some(s) => PathBuf::from(Self::expand_path(s)),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.scheduler.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [server]
            host = "0.0.0.0"
            port = 3000
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [storage]
            data_dir = "/var/lib/treesync"
            jobs_file = "jobs.json"
            log_dir = "runs"

            [scheduler]
            timezone = "UTC"
            misfire_grace_secs = 120

            [sync]
            program = "/usr/local/bin/rsync"
            base_args = ["-a", "--delete", "-x"]
            accepted_exit_codes = [0, 24]
            metadata_changes_trigger_sync = false
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.storage.jobs_path(), PathBuf::from("/var/lib/treesync/jobs.json"));
        assert_eq!(config.storage.log_path(), PathBuf::from("/var/lib/treesync/runs"));
        assert_eq!(config.scheduler.misfire_grace_secs, 120);
        assert_eq!(config.sync.program, "/usr/local/bin/rsync");
        assert_eq!(config.sync.base_args.len(), 3);
        assert_eq!(config.sync.accepted_exit_codes, vec![0, 24]);
        assert!(!config.sync.metadata_changes_trigger_sync);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 5000").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/treesync.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_nonexistent_file() {
        let config =
            ConfigLoader::load_or_default(Path::new("/nonexistent/path/treesync.toml")).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.sync.program, "rsync");
    }

    #[test]
    fn test_load_invalid_toml() {
        let content = "invalid = [unclosed";
        let result = ConfigLoader::load_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: This test runs in isolation and sets a unique test-only env var
        unsafe {
            std::env::set_var("TREESYNC_TEST_DATA_DIR", "/srv/treesync");
        }
        let content = r#"
            [storage]
            data_dir = "${TREESYNC_TEST_DATA_DIR}"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/treesync"));
        unsafe {
            std::env::remove_var("TREESYNC_TEST_DATA_DIR");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${NONEXISTENT_TREESYNC_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_env_vars_in_comments_are_ignored() {
        let content = r#"
            # Values may reference ${NONEXISTENT_TREESYNC_VAR_12345}.
              # indented ${ALSO_NOT_SET_TREESYNC}
            [server]
            port = 9000
        "#;
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert!(expanded.contains("${NONEXISTENT_TREESYNC_VAR_12345}"));

        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/backups");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/backups"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(ConfigLoader::expand_path("/data"), "/data");
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let content = include_str!("../../../config/treesync.example.toml");
        let config = ConfigLoader::load_str(content).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.storage.jobs_file, defaults.storage.jobs_file);
        assert_eq!(config.scheduler.timezone, defaults.scheduler.timezone);
        assert_eq!(config.sync.base_args, defaults.sync.base_args);
        assert_eq!(config.sync.accepted_exit_codes, defaults.sync.accepted_exit_codes);
        assert!(crate::ConfigValidator::validate(&config).is_valid());
    }
}
