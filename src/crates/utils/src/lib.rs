//! Shared helpers for taskwatch.
//!
//! This crate provides the HTTP plumbing and configuration loading used by the
//! task monitor and its command-line adapter.
//!
//! # Modules
//!
//! ## Client (`client`)
//!
//! JSON-over-HTTP client that carries the Django CSRF token on mutating
//! requests:
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_cookie_header("sessionid=abc; csrftoken=xyz");
//!
//! let client = HttpClient::new(config)?;
//! let status = client.get_json("https://host/ml_app/api/datasets/1/audit/", &[]).await?;
//! ```
//!
//! ## Config (`config`)
//!
//! Environment variable and file loading:
//!
//! ```rust,ignore
//! use utils::config::{get_env_parse_opt, load_config_file};
//!
//! let interval: Option<u64> = get_env_parse_opt("TASKWATCH_INTERVAL_MS")?;
//! let config: MyConfig = load_config_file("taskwatch.yaml")?;
//! ```
//!
//! # Features
//!
//! - `client` - HTTP client (enabled by default)
//! - `config` - Configuration utilities (enabled by default)

pub mod error;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "config")]
pub mod config;

// Re-export commonly used types
pub use error::{Result, UtilsError};

#[cfg(feature = "client")]
pub use client::{csrf, ClientConfig, HttpClient};

#[cfg(feature = "config")]
pub use config::{get_env_opt, get_env_parse_opt, load_config_file, ConfigFormat};
