//! # Inner Loop Configuration
//!
//! `MamlConfig` is plain serde data so it can live in a JSON experiment
//! file next to the rest of a training setup. Missing fields fall back to
//! the defaults below.

use super::MamlError;
use crate::tensor::TensorData;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which parameters the unconditioned evaluation pass reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnconditionedSource {
    /// The fully adapted generation, in reuse-only mode.
    #[default]
    AdaptedCache,
    /// The un-adapted parameters of the store, in reuse-only mode.
    BaseParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MamlConfig {
    /// Inner-loop step size. Initial value of every learned rate when
    /// `learn_inner_lr` is set.
    pub learning_rate: TensorData,
    /// Backpropagate through the inner gradients. When false the scaled
    /// gradient is a constant for outer differentiation (first-order MAML).
    pub use_second_order: bool,
    /// Only parameters whose name starts with this prefix are adapted.
    pub var_scope: Option<String>,
    /// One trainable learning-rate scalar per adapted parameter.
    pub learn_inner_lr: bool,
    pub unconditioned_source: UnconditionedSource,
}

impl Default for MamlConfig {
    fn default() -> Self {
        MamlConfig {
            learning_rate: 0.001,
            use_second_order: true,
            var_scope: None,
            learn_inner_lr: false,
            unconditioned_source: UnconditionedSource::AdaptedCache,
        }
    }
}

impl MamlConfig {
    pub fn new(learning_rate: TensorData) -> Self {
        MamlConfig {
            learning_rate,
            ..Default::default()
        }
    }

    pub fn with_second_order(mut self, use_second_order: bool) -> Self {
        self.use_second_order = use_second_order;
        self
    }

    pub fn with_var_scope(mut self, var_scope: impl Into<String>) -> Self {
        self.var_scope = Some(var_scope.into());
        self
    }

    pub fn with_learned_inner_lr(mut self, learn_inner_lr: bool) -> Self {
        self.learn_inner_lr = learn_inner_lr;
        self
    }

    pub fn with_unconditioned_source(mut self, source: UnconditionedSource) -> Self {
        self.unconditioned_source = source;
        self
    }

    /// Checks the invariants the inner loop relies on.
    pub fn validate(&self) -> Result<(), MamlError> {
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(MamlError::InvalidConfig(format!(
                "learning_rate must be finite and >= 0, got {}",
                self.learning_rate
            )));
        }
        if matches!(self.var_scope.as_deref(), Some("")) {
            return Err(MamlError::InvalidConfig(
                "var_scope must not be empty; use None to adapt every parameter".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, MamlError> {
        let config: MamlConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, MamlError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = MamlConfig::default();
        assert_eq!(config.learning_rate, 0.001);
        assert!(config.use_second_order);
        assert!(config.var_scope.is_none());
        assert!(!config.learn_inner_lr);
        assert_eq!(config.unconditioned_source, UnconditionedSource::AdaptedCache);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = MamlConfig::from_json_str(
            r#"{"learning_rate": 0.1, "var_scope": "encoder", "unconditioned_source": "base_parameters"}"#,
        )
        .unwrap();
        assert_eq!(config.learning_rate, 0.1);
        assert_eq!(config.var_scope.as_deref(), Some("encoder"));
        assert!(config.use_second_order);
        assert_eq!(config.unconditioned_source, UnconditionedSource::BaseParameters);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            MamlConfig::new(-1.0).validate(),
            Err(MamlError::InvalidConfig(_))
        ));
        assert!(matches!(
            MamlConfig::new(f32::NAN).validate(),
            Err(MamlError::InvalidConfig(_))
        ));
        assert!(matches!(
            MamlConfig::default().with_var_scope("").validate(),
            Err(MamlError::InvalidConfig(_))
        ));
        assert!(matches!(
            MamlConfig::from_json_str("{not json"),
            Err(MamlError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("rtorch_maml_config_that_does_not_exist.json");
        assert!(matches!(MamlConfig::from_json_file(path), Err(MamlError::Io(_))));
    }
}
