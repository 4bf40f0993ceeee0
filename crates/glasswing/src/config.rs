//! # Host Configuration
//!
//! Loaded once at startup from an optional TOML file, then overridden by
//! the command line. Every field has a default, so an empty file (or no
//! file) is a valid configuration.
//!
//! ```toml
//! [module]
//! path = "app.wasm"
//!
//! [window]
//! title = "Glasswing"
//! width = 1280
//! height = 720
//!
//! [input]
//! wheel_line_pixels = 100.0
//! ime = false
//!
//! [renderer]
//! vsync = true
//! power_preference = "high-performance"
//!
//! [log]
//! filter = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors. All of them stop the host before a window opens.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`HostConfig`].
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// `--help` was given.
    #[error("{}", USAGE)]
    Help,

    /// Bad command line.
    #[error("{0}\n\n{}", USAGE)]
    Usage(String),

    /// Neither the command line nor the file names a module.
    #[error("no module given\n\n{}", USAGE)]
    MissingModule,

    /// A value is out of range.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Dotted key of the setting.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Command line help.
pub const USAGE: &str = "usage: glasswing [--config <file.toml>] [module.wasm]";

/// Full host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Which module to run.
    pub module: ModuleConfig,
    /// Initial window.
    pub window: WindowConfig,
    /// Input translation.
    pub input: InputConfig,
    /// GPU setup.
    pub renderer: RendererConfig,
    /// Log filter.
    pub log: LogConfig,
}

/// `[module]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Path of the compiled module.
    pub path: Option<PathBuf>,
}

/// `[window]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text.
    pub title: String,
    /// Logical width.
    pub width: u32,
    /// Logical height.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Glasswing".to_owned(),
            width: 1280,
            height: 720,
        }
    }
}

/// `[input]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Pixels per wheel line for line-based scroll devices.
    pub wheel_line_pixels: f32,
    /// Take text from IME commits instead of key presses.
    pub ime: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            wheel_line_pixels: 100.0,
            ime: false,
        }
    }
}

/// Adapter choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    /// Discrete GPU when there is one.
    #[default]
    HighPerformance,
    /// Integrated GPU when there is one.
    LowPower,
}

/// `[renderer]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Wait for vertical sync when presenting.
    pub vsync: bool,
    /// Adapter choice.
    pub power_preference: PowerPreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: PowerPreference::default(),
        }
    }
}

/// `[log]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins over it.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl HostConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// I/O, parse and range errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Syntax errors and unknown value types.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Builds the final configuration from command line arguments
    /// (program name excluded).
    ///
    /// # Errors
    ///
    /// Usage errors, config file errors, and a missing module path.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let cli = CliArgs::parse(args)?;
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(module) = cli.module {
            config.module.path = Some(module);
        }
        if config.module.path.is_none() {
            return Err(ConfigError::MissingModule);
        }
        config.validate()?;
        Ok(config)
    }

    /// Range checks.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                key: "window.width/height",
                reason: "must be non-zero",
            });
        }
        let wheel = self.input.wheel_line_pixels;
        if !wheel.is_finite() || wheel <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "input.wheel_line_pixels",
                reason: "must be a positive number",
            });
        }
        Ok(())
    }
}

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// `--config <file>`
    pub config: Option<PathBuf>,
    /// Positional module path.
    pub module: Option<PathBuf>,
}

impl CliArgs {
    /// Parses arguments (program name excluded).
    ///
    /// # Errors
    ///
    /// [`ConfigError::Help`] for `--help`; [`ConfigError::Usage`] for unknown
    /// flags, a missing flag value or a second positional argument.
    pub fn parse<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::Usage(format!("{arg} needs a file")))?;
                    cli.config = Some(PathBuf::from(path));
                }
                "--help" | "-h" => return Err(ConfigError::Help),
                flag if flag.starts_with('-') => {
                    return Err(ConfigError::Usage(format!("unknown option {flag}")));
                }
                _ if cli.module.is_some() => {
                    return Err(ConfigError::Usage(format!("unexpected argument {arg}")));
                }
                _ => cli.module = Some(PathBuf::from(arg)),
            }
        }
        Ok(cli)
    }
}
