//! Configuration validation.

use chrono_tz::Tz;

use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_storage(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_sync(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        if config.storage.jobs_file.is_empty() {
            result.add_error(ValidationError::new(
                "storage.jobs_file",
                "Job table file name cannot be empty",
            ));
        }

        if config.storage.log_dir.is_empty() {
            result.add_error(ValidationError::new(
                "storage.log_dir",
                "Log directory cannot be empty",
            ));
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        if config.scheduler.timezone.parse::<Tz>().is_err() {
            result.add_error(ValidationError::new(
                "scheduler.timezone",
                format!("Unknown timezone '{}'", config.scheduler.timezone),
            ));
        }

        if config.scheduler.misfire_grace_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "scheduler.misfire_grace_secs",
                "A zero grace window drops every firing that is even slightly late",
            ));
        }
    }

    fn validate_sync(config: &Config, result: &mut ValidationResult) {
        let sync = &config.sync;

        if sync.program.is_empty() {
            result.add_error(ValidationError::new("sync.program", "Program cannot be empty"));
        }

        if !sync.is_accepted(0) {
            result.add_error(ValidationError::new(
                "sync.accepted_exit_codes",
                "Exit code 0 must be accepted",
            ));
        }

        if sync.base_args.iter().any(|a| a == "--dry-run" || a == "-n") {
            result.add_error(ValidationError::new(
                "sync.base_args",
                "Base arguments must not make the real run non-mutating",
            ));
        }

        if sync.preview_args.is_empty() {
            result.add_error(ValidationError::new(
                "sync.preview_args",
                "Preview arguments cannot be empty",
            ));
        }

        if !sync.base_args.iter().any(|a| a.starts_with("--delete")) {
            result.add_warning(ValidationWarning::new(
                "sync.base_args",
                "Without --delete the target becomes a superset of the source, not a mirror",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
