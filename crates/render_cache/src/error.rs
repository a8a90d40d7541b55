//! Error types for the render cache
//!
//! Two layers of failure are distinguished:
//!
//! - [`DeviceError`]: a graphics device call failed (buffer creation, lock,
//!   draw). Carries the name of the failing device operation.
//! - [`CacheError`]: everything the cache reports to its callers. Lookup and
//!   capacity problems are detected at the API boundary before any device
//!   call is made; device failures are wrapped.

use std::collections::TryReserveError;

use crate::cache::StaticBufferId;
use crate::config::ConfigError;
use crate::effect::EffectId;
use crate::material::MaterialKey;

/// A graphics device operation failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Device operation `{operation}` failed: {reason}")]
pub struct DeviceError {
    /// Name of the device operation that failed (e.g. `"lock"`)
    pub operation: &'static str,
    /// Backend-provided description of the failure
    pub reason: String,
}

impl DeviceError {
    /// Create a new device error for the named operation
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by the render cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Material key is not known to the skin provider
    #[error("Unknown material: {0:?}")]
    UnknownMaterial(MaterialKey),

    /// Static buffer id is not (or no longer) registered with the cache
    #[error("Unknown static buffer: {0:?}")]
    UnknownBuffer(StaticBufferId),

    /// Effect id is not registered with the cache
    #[error("Unknown effect: {0:?}")]
    UnknownEffect(EffectId),

    /// Raw vertex layout id does not name a supported layout
    #[error("Unsupported vertex layout id: {0}")]
    UnsupportedLayout(u32),

    /// Raw primitive id does not name a supported primitive kind
    #[error("Unsupported primitive kind id: {0}")]
    UnsupportedPrimitive(u32),

    /// Geometry payload is malformed (empty, misaligned, bad index)
    #[error("Invalid payload: {reason}")]
    InvalidPayload {
        /// What is wrong with the payload
        reason: String,
    },

    /// A single payload is larger than the buffer that must hold it
    #[error("{what} capacity exceeded: {requested} > {capacity}")]
    CapacityExceeded {
        /// Which capacity was exceeded
        what: &'static str,
        /// Number of elements requested
        requested: usize,
        /// Maximum number of elements available
        capacity: usize,
    },

    /// Growing internal bookkeeping failed
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// Graphics device failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Invalid cache configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Shorthand for an [`CacheError::InvalidPayload`] error
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Whether this error originated in the graphics device
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

/// Result type for render cache operations
pub type CacheResult<T> = Result<T, CacheError>;
