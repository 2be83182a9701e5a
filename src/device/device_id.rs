//! Output channel identification type.

use std::sync::Arc;

/// Identifier for an output channel in the engine's registry.
///
/// `DeviceId` is a lightweight, cloneable identifier. It uses `Arc<str>`
/// internally for efficient cloning and comparison, and usually carries the
/// device name the channel routes to - but the engine treats it as opaque,
/// so any unique label works.
///
/// # Example
///
/// ```
/// use route_audio::DeviceId;
///
/// let speakers = DeviceId::new("speakers");
/// let hdmi = DeviceId::new("hdmi");
///
/// assert_ne!(speakers, hdmi);
/// assert_eq!(speakers, DeviceId::new("speakers"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates a new id from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
