//! Context configuration.

use crate::value::HostValue;

/// Filename attached to sources evaluated without one.
pub const DEFAULT_FILENAME: &str = "<eval>";

/// Default bound on value nesting when marshalling.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default bound on array elements plus map entries read from one script
/// value.
pub const DEFAULT_MAX_ELEMENTS: usize = 1 << 20;

/// Settings fixed when a [`Context`](crate::Context) is created.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Value returned in place of functions and other unconvertible script
    /// values. `None` uses the process-wide
    /// [`ComplexObject`](crate::ComplexObject) sentinel; `Some(v)` returns
    /// `v` as is, including `Null` and `Boolean(false)`.
    pub complex_object: Option<HostValue>,

    /// Filename used by `evaluate` and `execute`.
    /// Default: `"<eval>"`
    pub default_filename: String,

    /// Maximum nesting of arrays and maps in either direction.
    /// Default: 512
    pub max_depth: usize,

    /// Maximum number of array elements and map entries, counted across the
    /// whole value, converted out of the engine. Array holes count too.
    /// Default: 1048576
    pub max_elements: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            complex_object: None,
            default_filename: DEFAULT_FILENAME.to_owned(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complex_object(mut self, value: impl Into<HostValue>) -> Self {
        self.complex_object = Some(value.into());
        self
    }

    pub fn default_filename(mut self, filename: impl Into<String>) -> Self {
        self.default_filename = filename.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_elements(mut self, elements: usize) -> Self {
        self.max_elements = elements;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::default();
        assert!(config.complex_object.is_none());
        assert_eq!(config.default_filename, "<eval>");
        assert_eq!(config.max_depth, 512);
        assert_eq!(config.max_elements, 1_048_576);
    }

    #[test]
    fn test_builder() {
        let config = ContextConfig::new()
            .complex_object(false)
            .default_filename("app.js")
            .max_depth(4)
            .max_elements(10);
        assert_eq!(config.complex_object, Some(HostValue::Boolean(false)));
        assert_eq!(config.default_filename, "app.js");
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_elements, 10);
    }
}
