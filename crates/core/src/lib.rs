//! Core utilities for the flightdeck renderer.
//!
//! This crate provides foundational types and utilities used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame clock
//! - Configuration management

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AssetConfig, Config, VulkanConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging, init_logging_with};
pub use timer::FrameClock;
