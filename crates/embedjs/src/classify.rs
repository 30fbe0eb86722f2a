//! Thrown value → [`Error`]
//!
//! Must run while the thrown value is still the top slot: name, message and
//! stack are read first, then the value is popped.

use embedjs_engine::{EngineError, EngineResult, SlotType, Stack};

use crate::codec::from_engine_text_lossy;
use crate::error::{Error, Result};

/// Map an engine failure to an [`Error`] on the spot.
pub(crate) fn check<T>(stack: &mut Stack<'_>, result: EngineResult<T>) -> Result<T> {
    result.map_err(|err| classify(stack, err))
}

/// Classify `err`. For [`EngineError::Thrown`] the thrown value is consumed.
pub(crate) fn classify(stack: &mut Stack<'_>, err: EngineError) -> Error {
    match err {
        EngineError::Fatal(reason) => Error::Internal(reason),
        EngineError::Thrown => {
            let Some(top) = stack.depth().checked_sub(1) else {
                return stack.fatal("thrown value missing from stack").into();
            };
            let error = read_thrown(stack, top);
            stack.set_depth(top);
            error
        }
    }
}

fn read_thrown(stack: &mut Stack<'_>, idx: usize) -> Error {
    let is_object = matches!(
        stack.slot_type(idx),
        SlotType::Object | SlotType::Array | SlotType::Function
    );
    let (name, message, trace) = if is_object {
        (
            text_prop(stack, idx, b"name"),
            text_prop(stack, idx, b"message"),
            text_prop(stack, idx, b"stack"),
        )
    } else {
        (None, None, None)
    };

    let message = message.unwrap_or_else(|| match stack.to_display_string(idx) {
        Some(text) => from_engine_text_lossy(&text),
        None => {
            tracing::warn!("thrown value could not be converted to a string");
            String::from("unprintable thrown value")
        }
    });

    match name.as_deref() {
        Some("ReferenceError") => Error::Reference { message },
        Some("TypeError") => Error::Type { message },
        Some("SyntaxError") => Error::Syntax { message },
        _ => Error::Script {
            name: name.unwrap_or_else(|| "Error".into()),
            message,
            stack: trace,
        },
    }
}

/// String coercion of property `key`, `None` when absent or unreadable.
fn text_prop(stack: &mut Stack<'_>, idx: usize, key: &[u8]) -> Option<String> {
    let base = stack.depth();
    let text = match stack.get_prop(idx, key) {
        Ok(_) if !stack.slot_type(base).is_nullish() => stack.to_display_string(base),
        _ => None,
    };
    stack.set_depth(base);
    text.map(|bytes| from_engine_text_lossy(&bytes))
}
