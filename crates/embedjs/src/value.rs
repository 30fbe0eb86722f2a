//! Host-side value model
//!
//! [`HostValue`] is the only shape data takes after crossing the boundary.
//! Numbers are always `f64`; integer conversions are lossy past 2^53.

use std::fmt;
use std::rc::Rc;

use crate::bridge::Invocation;
use crate::codec::{HostText, to_engine_text};
use crate::error::EncodingError;
use crate::registry::ComplexObject;

type Callback = dyn Fn(&mut Invocation<'_, '_>) -> anyhow::Result<HostValue>;

/// Host code callable from script.
#[derive(Clone)]
pub struct HostFunction(Rc<Callback>);

impl HostFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Invocation<'_, '_>) -> anyhow::Result<HostValue> + 'static,
    {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, invocation: &mut Invocation<'_, '_>) -> anyhow::Result<HostValue> {
        (self.0)(invocation)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction(..)")
    }
}

/// A host value with no engine representation, identified by its type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Foreign {
    type_name: &'static str,
}

impl Foreign {
    pub fn of<T: ?Sized>(_value: &T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// A value on the host side of the boundary.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// `null` or `undefined`
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    /// Key/value pairs. Only string keys convert; order is not significant.
    Map(Vec<(HostValue, HostValue)>),
    /// A script value that could not be converted
    ComplexObject(ComplexObject),
    Callable(HostFunction),
    Foreign(Foreign),
}

impl HostValue {
    /// Build a host string from text in any supported encoding.
    pub fn from_text(text: HostText) -> Result<Self, EncodingError> {
        to_engine_text(text).map(Self::String)
    }

    /// Build a map from string keys.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<HostValue>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Self::String(k.into()), v.into()))
                .collect(),
        )
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut Invocation<'_, '_>) -> anyhow::Result<HostValue> + 'static,
    {
        Self::Callable(HostFunction::new(f))
    }

    /// Name of the variant, or the captured type name for foreign values.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::ComplexObject(_) => "complex object",
            Self::Callable(_) => "callable",
            Self::Foreign(foreign) => foreign.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a string key in a map.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => maps_equal(a, b),
            (Self::ComplexObject(a), Self::ComplexObject(b)) => a == b,
            (Self::Callable(a), Self::Callable(b)) => a.ptr_eq(b),
            (Self::Foreign(a), Self::Foreign(b)) => a == b,
            _ => false,
        }
    }
}

fn maps_equal(a: &[(HostValue, HostValue)], b: &[(HostValue, HostValue)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|entry| {
        let found = b
            .iter()
            .enumerate()
            .find(|(i, other)| !used[*i] && *other == entry)
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for HostValue {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(f64, f32, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<ComplexObject> for HostValue {
    fn from(sentinel: ComplexObject) -> Self {
        Self::ComplexObject(sentinel)
    }
}

impl From<HostFunction> for HostValue {
    fn from(f: HostFunction) -> Self {
        Self::Callable(f)
    }
}

impl From<Foreign> for HostValue {
    fn from(foreign: Foreign) -> Self {
        Self::Foreign(foreign)
    }
}
