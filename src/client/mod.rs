//! Connection manager module.
//!
//! This module provides the main entry point for receiving print jobs.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Registry and command surface |
//! | [`ConnectionManagerBuilder`] | Fluent configuration builder |
//! | [`ConnectTarget`] | Server host, path and token |
//! | [`ConnectOptions`] | Timeouts, limits and reconnection policy |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for manager configuration.
pub mod builder;

/// Core manager implementation.
pub mod core;

/// Connection target and options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use core::ConnectionManager;
pub use options::{ConnectOptions, ConnectTarget};
