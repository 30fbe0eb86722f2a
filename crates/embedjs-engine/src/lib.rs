//! Stack-based handle over an embedded ECMAScript VM.
//!
//! This crate owns the VM and nothing else: it knows how to push and pop
//! typed values, compile and run source, look up and call properties,
//! register native callbacks and report fatal aborts. Conversion to and
//! from host values lives in `embedjs`.
//!
//! # Example
//!
//! ```
//! use embedjs_engine::{Engine, EngineError};
//!
//! let mut engine = Engine::new().unwrap();
//! let sum = engine
//!     .protect(|stack| {
//!         stack.compile_and_run(b"1 + 1", "<eval>")?;
//!         let n = stack.get_number(0);
//!         stack.pop()?;
//!         Ok::<_, EngineError>(n)
//!     })
//!     .unwrap();
//! assert_eq!(sum, 2.0);
//! ```
//!
//! # Thread Safety
//!
//! [`Engine`] is `!Send` and `!Sync`. The VM and its collector are tied to
//! the thread that created them.
//!
//! ```compile_fail
//! use embedjs_engine::Engine;
//! use std::thread;
//!
//! let engine = Engine::new().unwrap();
//! thread::spawn(move || {
//!     let _ = engine.is_alive(); // Error: Engine is !Send
//! });
//! ```

mod engine;
mod error;
mod stack;
pub mod text;

pub use engine::{Engine, FatalHook};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use stack::{NativeFn, SlotType, Stack};
