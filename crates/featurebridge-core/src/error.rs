// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the feature bridge.

use thiserror::Error;

/// Top-level error type for all feature bridge operations.
///
/// Only the configuration family is ever returned to a caller. Callback
/// failures are built for logging and then swallowed by the engine.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Configuration errors --
    #[error("max queue size must be greater than zero (got {0})")]
    InvalidQueueSize(usize),

    #[error("action expiry must be greater than zero")]
    InvalidExpiry,

    #[error("scope name must not be blank")]
    BlankScopeName,

    // -- Callback failures --
    #[error("callback for feature {feature} panicked: {message}")]
    CallbackPanicked { feature: String, message: String },

    // -- Diagnostics export --
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether this error belongs to the construction-time validation family.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidQueueSize(_) | BridgeError::InvalidExpiry | BridgeError::BlankScopeName
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
