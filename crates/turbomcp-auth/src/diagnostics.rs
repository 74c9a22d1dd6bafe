//! Non-fatal events raised while maintaining the key store
//!
//! Skipped JWKs and failed automatic refreshes do not fail any caller, so they
//! are reported to a [`DiagnosticSink`]. The default sink logs them.

use std::fmt;

use tracing::warn;

/// A non-fatal event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A JWK Set entry could not be turned into key material
    SkippedKey {
        /// Position in the `keys` array
        index: usize,
        /// `kid` of the entry, when readable
        kid: Option<String>,
        /// Construction error
        reason: String,
    },
    /// A timer-driven JWK Set refresh failed
    RefreshFailed {
        /// Refresh error
        reason: String,
    },
}

/// Receiver of [`Diagnostic`]s
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    /// Handle one event
    fn report(&self, diagnostic: Diagnostic);
}

/// Sink that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::SkippedKey { index, kid, reason } => {
                warn!(index, kid = ?kid, reason = %reason, "Skipped unsupported JWK");
            }
            Diagnostic::RefreshFailed { reason } => {
                warn!(error = %reason, "Failed to auto-update JWK Set");
            }
        }
    }
}
