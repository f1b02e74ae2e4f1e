//! Source name type.

use std::sync::Arc;

/// Name of a registered source.
///
/// Used as the queue key, the artifact file stem and the tag on every
/// [`RecorderEvent`](crate::RecorderEvent). Backed by `Arc<str>`, so clones
/// are a pointer copy.
///
/// # Example
///
/// ```
/// use session_recorder::SourceId;
///
/// let cam = SourceId::new("cam");
/// assert_eq!(cam, SourceId::from("cam"));
/// assert_eq!(cam.as_str(), "cam");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Creates a new source ID from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_source_id_equality() {
        assert_eq!(SourceId::new("cam"), SourceId::new("cam"));
        assert_ne!(SourceId::new("cam"), SourceId::new("log"));
    }

    #[test]
    fn test_source_id_display() {
        let id = SourceId::new("front-camera");
        assert_eq!(format!("{id}"), "front-camera");
    }

    #[test]
    fn test_source_id_str_lookup() {
        let mut map = HashMap::new();
        map.insert(SourceId::new("cam"), 1);
        assert_eq!(map.get("cam"), Some(&1));
        assert_eq!(map.get("log"), None);
    }
}
