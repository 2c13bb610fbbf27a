//! Error types shared by the flightdeck crates.

use thiserror::Error;

/// Main error type for the non-GPU layers (window, config, io).
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or surface handle errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan surface creation errors raised outside the RHI layer
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values that parse but cannot be used
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
