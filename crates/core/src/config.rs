//! Configuration loading from the environment.
//!
//! Values come from process environment variables, with an optional `.env`
//! file loaded first. [`Config::builder`] covers programmatic overrides such as
//! command-line flags.

use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

pub const ENGINE_VAR: &str = "MASK_SHOT_ENGINE";
pub const ENGINE_ARGS_VAR: &str = "MASK_SHOT_ENGINE_ARGS";
pub const MODEL_VAR: &str = "MASK_SHOT_MODEL";
pub const TEMP_DIR_VAR: &str = "MASK_SHOT_TEMP_DIR";
pub const THRESHOLD_VAR: &str = "MASK_SHOT_THRESHOLD";

pub const DEFAULT_MODEL: &str = "sam2.1_b.pt";
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Program implementing the engine protocol.
    pub engine_program: String,
    pub engine_args: Vec<String>,
    /// Model identifier forwarded to the engine untouched.
    pub model_name: String,
    /// Directory receiving the encoded engine input.
    pub temp_dir: PathBuf,
    /// Probability above which an engine pixel counts as foreground.
    pub threshold: f32,
}

impl Config {
    /// Loads the full configuration; the engine program is required.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let builder = ConfigBuilder::from_env()?;
        if !builder.has_engine() {
            return Err(AppError::MissingEnvVar(format!(
                "{ENGINE_VAR} must be set in environment or .env file"
            )));
        }
        builder.build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

fn default_temp_dir() -> PathBuf {
    env::temp_dir().join("mask-shot")
}

/// Step-by-step construction of a [`Config`], validated in [`ConfigBuilder::build`].
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    engine_program: Option<String>,
    engine_args: Vec<String>,
    model_name: Option<String>,
    temp_dir: Option<PathBuf>,
    threshold: Option<f32>,
}

impl ConfigBuilder {
    /// Builder pre-filled from whichever variables are set in the process
    /// environment. Nothing is required yet, so command-line flags can supply
    /// the rest before [`ConfigBuilder::build`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::default();

        if let Some(program) = lookup(ENGINE_VAR) {
            builder = builder.with_engine(program);
        }
        if let Some(raw) = lookup(ENGINE_ARGS_VAR) {
            builder = builder.with_engine_args(raw.split_whitespace().map(str::to_string).collect());
        }
        if let Some(model) = lookup(MODEL_VAR) {
            builder = builder.with_model(model);
        }
        if let Some(dir) = lookup(TEMP_DIR_VAR) {
            builder = builder.with_temp_dir(dir);
        }
        if let Some(raw) = lookup(THRESHOLD_VAR) {
            let threshold = raw
                .trim()
                .parse::<f32>()
                .map_err(|e| AppError::config(format!("{THRESHOLD_VAR} is not a number: {e}")))?;
            builder = builder.with_threshold(threshold);
        }

        Ok(builder)
    }

    pub fn has_engine(&self) -> bool {
        self.engine_program.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub fn with_engine(mut self, program: impl Into<String>) -> Self {
        self.engine_program = Some(program.into());
        self
    }

    pub fn with_engine_args(mut self, args: Vec<String>) -> Self {
        self.engine_args = args;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<Config> {
        let engine_program = self
            .engine_program
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::config("engine program must not be empty"))?;

        let threshold = self.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(AppError::config(format!(
                "threshold must be inside (0, 1), got {threshold}"
            )));
        }

        Ok(Config {
            engine_program,
            engine_args: self.engine_args,
            model_name: self.model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temp_dir: self.temp_dir.unwrap_or_else(default_temp_dir),
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let config = Config::builder().with_engine("sam-engine").build().unwrap();
        assert_eq!(config.engine_program, "sam-engine");
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert!(config.engine_args.is_empty());
        assert!(config.temp_dir.ends_with("mask-shot"));
    }

    #[test]
    fn builder_rejects_blank_engine() {
        let err = Config::builder().with_engine("   ").build().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn builder_rejects_threshold_outside_unit_interval() {
        for bad in [0.0, 1.0, -0.2, 3.0] {
            let result = Config::builder()
                .with_engine("sam-engine")
                .with_threshold(bad)
                .build();
            assert!(result.is_err(), "threshold {bad} should be rejected");
        }
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn optional_variables_are_read_without_an_engine() {
        let vars = [
            (MODEL_VAR, "sam2.1_l.pt"),
            (THRESHOLD_VAR, " 0.8 "),
            (ENGINE_ARGS_VAR, "--device  cpu"),
            (TEMP_DIR_VAR, "/var/tmp/masks"),
        ];
        let builder = ConfigBuilder::from_lookup(lookup(&vars)).unwrap();
        assert!(!builder.has_engine());

        let config = builder.with_engine("/opt/sam/run").build().unwrap();
        assert_eq!(config.engine_program, "/opt/sam/run");
        assert_eq!(config.model_name, "sam2.1_l.pt");
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.engine_args, vec!["--device", "cpu"]);
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/masks"));
    }

    #[test]
    fn malformed_threshold_variable_is_a_config_error() {
        let vars = [(ENGINE_VAR, "sam"), (THRESHOLD_VAR, "high")];
        let err = ConfigBuilder::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains(THRESHOLD_VAR));
    }
}
