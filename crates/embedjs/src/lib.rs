//! Embed a JavaScript VM and exchange values with it.
//!
//! A [`Context`] owns one engine. Host code evaluates source, reads and calls
//! script properties and installs host functions; values cross the boundary
//! as [`HostValue`] and failures come back as a typed [`Error`].
//!
//! # Example
//!
//! ```
//! use embedjs::{Context, Error, HostValue};
//!
//! let mut ctx = Context::new().unwrap();
//! assert_eq!(
//!     ctx.evaluate("[1, [2, 3]]").unwrap(),
//!     HostValue::from(vec![HostValue::from(1), HostValue::from(vec![2, 3])])
//! );
//!
//! let err = ctx.get_property("missing").unwrap_err();
//! assert_eq!(err, Error::reference("identifier 'missing' undefined"));
//! ```
//!
//! # Conversions
//!
//! | script value | host value |
//! |--------------|------------|
//! | `null`, `undefined` | [`HostValue::Null`] |
//! | boolean, number, string | `Boolean`, `Number`, `String` |
//! | array | `Array` |
//! | plain object | `Map` of own enumerable string keys, function members omitted |
//! | function, symbol, big integer | the [`ComplexObject`] sentinel, or the configured override |
//!
//! Strings containing a lone surrogate fail with [`EncodingError`].
//!
//! # Thread Safety
//!
//! [`Context`] is `!Send` and `!Sync`:
//!
//! ```compile_fail
//! use embedjs::Context;
//! use std::thread;
//!
//! let ctx = Context::new().unwrap();
//! thread::spawn(move || {
//!     let _ = ctx.is_valid(); // Error: Context is !Send
//! });
//! ```
//!
//! ```compile_fail
//! use embedjs::Context;
//!
//! fn assert_sync<T: Sync>() {}
//! assert_sync::<Context>(); // Error: Context is !Sync
//! ```
//!
//! The [`ComplexObject`] sentinel is shared by every context in the process.

mod bridge;
mod classify;
pub mod codec;
pub mod config;
mod context;
pub mod error;
mod marshal;
mod path;
mod registry;
mod value;

pub use bridge::Invocation;
pub use codec::HostText;
pub use config::ContextConfig;
pub use context::Context;
pub use error::{EncodingError, Error, Result};
pub use path::PropertyPath;
pub use registry::ComplexObject;
pub use value::{Foreign, HostFunction, HostValue};
