//! Property paths such as `a.b.c`, given as separate keys.

/// Keys traversed left to right from the global object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PropertyPath {
    fn from(key: &str) -> Self {
        Self(vec![key.to_owned()])
    }
}

impl From<String> for PropertyPath {
    fn from(key: String) -> Self {
        Self(vec![key])
    }
}

impl From<&[&str]> for PropertyPath {
    fn from(keys: &[&str]) -> Self {
        Self::new(keys.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for PropertyPath {
    fn from(keys: [&str; N]) -> Self {
        Self::new(keys)
    }
}

impl From<Vec<String>> for PropertyPath {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

impl From<Vec<&str>> for PropertyPath {
    fn from(keys: Vec<&str>) -> Self {
        Self::new(keys)
    }
}
