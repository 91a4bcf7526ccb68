//! Configuration management for the image previewer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PREVIEWER_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use image_previewer::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! println!("Listening on {}", config.bind_address());
//! println!("Caching up to {} previews", config.cache_capacity);
//! ```
//!
//! # Environment Variables
//!
//! All configuration options can be set via environment variables with the `PREVIEWER_` prefix:
//!
//! - `PREVIEWER_HOST` - Server bind address (default: 0.0.0.0)
//! - `PREVIEWER_PORT` - Server port (default: 8080)
//! - `PREVIEWER_CACHE_CAPACITY` - Max previews to cache, 0 disables caching (default: 100)
//! - `PREVIEWER_MAX_SOURCE_SIZE` - Max source image size in bytes (default: 10MB)
//! - `PREVIEWER_MAX_BODY_SIZE` - Max inbound request body in bytes (default: 1MB)
//! - `PREVIEWER_TIMEOUT` - Per-request deadline in seconds (default: 10)
//! - `PREVIEWER_MAX_DIMENSION` - Largest accepted width or height (default: 4096)
//! - `PREVIEWER_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `PREVIEWER_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `PREVIEWER_LOG_LEVEL` - error, warn, info, debug or trace (default: info)
//! - `PREVIEWER_LOG_OUTPUT` - `stdout` or a file path to append to (default: stdout)

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::fetch::DEFAULT_MAX_SOURCE_SIZE;
use crate::preview::{DEFAULT_PREVIEW_CACHE_CAPACITY, MAX_OUTPUT_DIMENSION};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default inbound request body limit (1MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default largest accepted width or height.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log output value meaning standard output.
pub const STDOUT_LOG_OUTPUT: &str = "stdout";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Previewer - an on-demand image resizing proxy.
///
/// Fetches a remote image, fills the requested box with it and serves the
/// result in the source's own format, caching recent previews in memory.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-previewer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PREVIEWER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PREVIEWER_PORT")]
    pub port: u16,

    /// Maximum inbound request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_SIZE, env = "PREVIEWER_MAX_BODY_SIZE")]
    pub max_body_size: usize,

    /// Deadline for one preview request in seconds, source fetch included.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "PREVIEWER_TIMEOUT")]
    pub timeout: u64,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of previews to keep in cache (0 disables caching).
    #[arg(long, default_value_t = DEFAULT_PREVIEW_CACHE_CAPACITY, env = "PREVIEWER_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PREVIEWER_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // Preview Configuration
    // =========================================================================
    /// Maximum source image size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_SOURCE_SIZE, env = "PREVIEWER_MAX_SOURCE_SIZE")]
    pub max_source_size: usize,

    /// Largest accepted target width or height in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "PREVIEWER_MAX_DIMENSION")]
    pub max_dimension: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PREVIEWER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Log level: error, warn, info, debug or trace.
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "PREVIEWER_LOG_LEVEL")]
    pub log_level: String,

    /// Where to write logs: `stdout` or a file path (appended to).
    #[arg(long, default_value = STDOUT_LOG_OUTPUT, env = "PREVIEWER_LOG_OUTPUT")]
    pub log_output: String,

    /// Enable verbose logging (debug level, overrides --log-level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.max_dimension == 0 || self.max_dimension > MAX_OUTPUT_DIMENSION {
            return Err(format!(
                "max_dimension must be between 1 and {}",
                MAX_OUTPUT_DIMENSION
            ));
        }

        if self.max_source_size == 0 {
            return Err("max_source_size must be greater than 0".to_string());
        }
        if self.max_body_size == 0 {
            return Err("max_body_size must be greater than 0".to_string());
        }

        if normalize_level(&self.log_level).is_none() {
            return Err(format!(
                "unknown log level '{}', expected one of: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }
        if self.log_output.trim().is_empty() {
            return Err("log_output must be 'stdout' or a file path".to_string());
        }

        Ok(())
    }

    /// Default `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        let level = if self.verbose {
            "debug"
        } else {
            normalize_level(&self.log_level).unwrap_or(DEFAULT_LOG_LEVEL)
        };
        format!("image_previewer={level},tower_http={level}")
    }

    /// Log destination, or `None` for standard output.
    pub fn log_file(&self) -> Option<PathBuf> {
        let output = self.log_output.trim();
        if output.is_empty() || output.eq_ignore_ascii_case(STDOUT_LOG_OUTPUT) {
            None
        } else {
            Some(PathBuf::from(output))
        }
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request deadline as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => Some("warn"),
        other => LOG_LEVELS.iter().copied().find(|l| *l == other),
    }
}

// =============================================================================
// Tests
// =============================================================================
