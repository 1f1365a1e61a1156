//! Prefixed environment-variable loading with type conversion, trimmed to
//! the getters this workspace's binaries need.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("environment variable not found: {var}")]
    NotFound { var: String },
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
    #[error("type conversion error for {var}: {reason}")]
    ConversionError { var: String, reason: String },
}

pub struct EnvConfigLoader {
    prefix: Option<String>,
    required: Vec<String>,
    defaults: HashMap<String, String>,
}

impl EnvConfigLoader {
    pub fn new() -> Self {
        Self {
            prefix: None,
            required: Vec::new(),
            defaults: HashMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn require(mut self, var: impl Into<String>) -> Self {
        self.required.push(var.into());
        self
    }

    pub fn default(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(var.into(), value.into());
        self
    }

    pub fn get(&self, var: &str) -> Result<String, EnvError> {
        let full_var = self.make_var_name(var);
        env::var(&full_var).or_else(|_| {
            self.defaults
                .get(var)
                .cloned()
                .ok_or_else(|| EnvError::NotFound {
                    var: full_var.clone(),
                })
        })
    }

    pub fn get_optional(&self, var: &str) -> Option<String> {
        let full_var = self.make_var_name(var);
        env::var(&full_var).ok().or_else(|| self.defaults.get(var).cloned())
    }

    pub fn get_int(&self, var: &str) -> Result<i64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::ConversionError {
            var: self.make_var_name(var),
            reason: format!("cannot parse as integer: {e}"),
        })
    }

    pub fn get_uint(&self, var: &str) -> Result<u64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::ConversionError {
            var: self.make_var_name(var),
            reason: format!("cannot parse as unsigned integer: {e}"),
        })
    }

    pub fn get_float(&self, var: &str) -> Result<f64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::ConversionError {
            var: self.make_var_name(var),
            reason: format!("cannot parse as float: {e}"),
        })
    }

    pub fn get_bool(&self, var: &str) -> Result<bool, EnvError> {
        let value = self.get(var)?;
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(EnvError::InvalidValue {
                var: self.make_var_name(var),
                reason: format!("invalid boolean value: {value}"),
            }),
        }
    }

    /// Supports "30s", "5m", "1h", "500ms", and a bare number of seconds.
    pub fn get_duration(&self, var: &str) -> Result<Duration, EnvError> {
        let value = self.get(var)?;
        parse_duration(&value).map_err(|e| EnvError::ConversionError {
            var: self.make_var_name(var),
            reason: format!("cannot parse as duration: {e}"),
        })
    }

    pub fn get_list(&self, var: &str) -> Result<Vec<String>, EnvError> {
        let value = self.get(var)?;
        Ok(value.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        for var in &self.required {
            self.get(var)?;
        }
        Ok(())
    }

    fn make_var_name(&self, var: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{}", var.to_uppercase()),
            None => var.to_uppercase(),
        }
    }
}

impl Default for EnvConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if let Some(num) = s.strip_suffix("ms") {
        let n: u64 = num.parse().map_err(|e| format!("invalid milliseconds: {e}"))?;
        Ok(Duration::from_millis(n))
    } else if let Some(num) = s.strip_suffix('s') {
        let n: u64 = num.parse().map_err(|e| format!("invalid seconds: {e}"))?;
        Ok(Duration::from_secs(n))
    } else if let Some(num) = s.strip_suffix('m') {
        let n: u64 = num.parse().map_err(|e| format!("invalid minutes: {e}"))?;
        Ok(Duration::from_secs(n * 60))
    } else if let Some(num) = s.strip_suffix('h') {
        let n: u64 = num.parse().map_err(|e| format!("invalid hours: {e}"))?;
        Ok(Duration::from_secs(n * 3600))
    } else if let Ok(n) = s.parse::<u64>() {
        Ok(Duration::from_secs(n))
    } else {
        Err(format!("invalid duration format: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_reads_prefixed_var() {
        env::set_var("TEST_VALUE", "123");
        let loader = EnvConfigLoader::new().with_prefix("TEST_");
        assert_eq!(loader.get("VALUE").unwrap(), "123");
        assert_eq!(loader.get_int("VALUE").unwrap(), 123);
        env::remove_var("TEST_VALUE");
    }

    #[test]
    fn loader_falls_back_to_default() {
        let loader = EnvConfigLoader::new()
            .with_prefix("MISSING_")
            .default("timeout", "60");
        assert_eq!(loader.get_int("timeout").unwrap(), 60);
    }

    #[test]
    fn loader_validates_required() {
        let loader = EnvConfigLoader::new().with_prefix("VALID_").require("REQUIRED");
        assert!(loader.validate().is_err());
        env::set_var("VALID_REQUIRED", "present");
        assert!(loader.validate().is_ok());
        env::remove_var("VALID_REQUIRED");
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
    }
}
