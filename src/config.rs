//! Bridge configuration
//!
//! Loaded from an optional TOML file, then overridden by `MATLAB_MCP_*`
//! environment variables. Every field has a default, so an empty file (or no
//! file) yields a working configuration for a `matlab` on `PATH`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Interpreter process settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Scratch script settings.
    #[serde(default)]
    pub scratch: ScratchConfig,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

/// How to start the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable to run (e.g. "matlab", "octave-cli").
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Command-line arguments.
    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,
    /// Working directory of the interpreter; inherited when absent.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Prompt the interpreter prints before reading a command.
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

/// Where and how scratch scripts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchConfig {
    /// Directory for scratch scripts; the system temp dir when absent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// File name prefix. Script names must be valid identifiers.
    #[serde(default = "default_scratch_prefix")]
    pub prefix: String,
    /// Script extension without the dot.
    #[serde(default = "default_scratch_extension")]
    pub extension: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_executable() -> String {
    "matlab".to_string()
}

fn default_engine_args() -> Vec<String> {
    vec![
        "-nodesktop".to_string(),
        "-nosplash".to_string(),
        "-nodisplay".to_string(),
    ]
}

fn default_prompt() -> String {
    ">> ".to_string()
}

fn default_scratch_prefix() -> String {
    "mcp_bridge_".to_string()
}

fn default_scratch_extension() -> String {
    "m".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            scratch: ScratchConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: default_engine_args(),
            working_directory: None,
            prompt: default_prompt(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: default_scratch_prefix(),
            extension: default_scratch_extension(),
        }
    }
}

impl ScratchConfig {
    /// Directory scratch scripts are created in.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl BridgeConfig {
    /// Load from `path` if given, then apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `MATLAB_MCP_*` environment variables on top of the current
    /// values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(executable) = std::env::var("MATLAB_MCP_EXECUTABLE") {
            self.engine.executable = executable;
        }
        if let Ok(args) = std::env::var("MATLAB_MCP_ARGS") {
            self.engine.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(dir) = std::env::var("MATLAB_MCP_WORKDIR") {
            self.engine.working_directory = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("MATLAB_MCP_SCRATCH_DIR") {
            self.scratch.directory = Some(PathBuf::from(dir));
        }
        if let Ok(filter) = std::env::var("MATLAB_MCP_LOG") {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.executable.trim().is_empty() {
            anyhow::bail!("engine.executable must not be empty");
        }

        // The interpreter refuses to run scripts whose names are not identifiers.
        let mut prefix = self.scratch.prefix.chars();
        let starts_with_letter = prefix.next().is_some_and(|c| c.is_ascii_alphabetic());
        if !starts_with_letter || !prefix.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            anyhow::bail!(
                "scratch.prefix '{}' must start with a letter and contain only letters, digits and '_'",
                self.scratch.prefix
            );
        }

        let extension = &self.scratch.extension;
        if extension.is_empty() || extension.contains('.') {
            anyhow::bail!(
                "scratch.extension '{}' must be non-empty and given without a dot",
                extension
            );
        }

        if let Some(dir) = &self.engine.working_directory {
            if !dir.is_dir() {
                anyhow::bail!(
                    "engine.working_directory {} is not a directory",
                    dir.display()
                );
            }
        }

        Ok(())
    }
}
