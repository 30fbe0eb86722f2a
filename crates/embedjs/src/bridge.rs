//! Host callables exposed as script functions
//!
//! The script-side function object holds no host state: everything the call
//! needs is captured by the native closure, so script code reassigning or
//! deleting properties of the function cannot reach it.

use std::rc::Rc;

use embedjs_engine::{EngineError, EngineResult, ErrorKind, NativeFn, Stack};

use crate::error::{Error, Result};
use crate::marshal::Marshaller;
use crate::value::{HostFunction, HostValue};

/// Arguments and receiver of a call from script into host code.
pub struct Invocation<'s, 'a> {
    stack: &'s mut Stack<'a>,
    marshaller: &'s Marshaller,
    args: Vec<HostValue>,
}

impl<'s, 'a> Invocation<'s, 'a> {
    /// Converted arguments, left to right.
    pub fn args(&self) -> &[HostValue] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&HostValue> {
        self.args.get(index)
    }

    /// Convert the `this` binding. Conversion happens on each call and
    /// follows the same rules as any other engine value.
    pub fn this(&mut self) -> Result<HostValue> {
        self.stack.dup(0)?;
        self.marshaller.pop(self.stack)
    }
}

/// Push a script function that runs `function`.
pub(crate) fn push_function(
    stack: &mut Stack<'_>,
    name: &str,
    function: HostFunction,
    marshaller: Rc<Marshaller>,
) {
    let body: NativeFn = Rc::new(move |stack: &mut Stack<'_>| -> EngineResult<bool> {
        invoke(stack, &function, &marshaller)
    });
    stack.push_native_function(name, body);
}

fn invoke(stack: &mut Stack<'_>, function: &HostFunction, marshaller: &Rc<Marshaller>) -> EngineResult<bool> {
    let argc = stack.depth().saturating_sub(1);
    let mut args = Vec::with_capacity(argc);
    for i in 1..=argc {
        stack.dup(i)?;
        match marshaller.pop(stack) {
            Ok(value) => args.push(value),
            Err(err) => return raise(stack, ErrorKind::TypeError, &err),
        }
    }

    let outcome = {
        let mut invocation = Invocation {
            stack: &mut *stack,
            marshaller,
            args,
        };
        function.call(&mut invocation)
    };

    match outcome {
        Ok(value) => match marshaller.push(stack, &value) {
            Ok(()) => Ok(true),
            Err(err) => raise(stack, ErrorKind::TypeError, &err),
        },
        Err(err) => match err.downcast_ref::<Error>() {
            Some(err) => raise(stack, kind_of(err), err),
            None => {
                stack.push_error(ErrorKind::Error, &format!("{err:#}"));
                Err(EngineError::Thrown)
            }
        },
    }
}

/// Throw `err` into the script, unless the stack is already beyond saving.
fn raise(stack: &mut Stack<'_>, kind: ErrorKind, err: &Error) -> EngineResult<bool> {
    if stack.is_poisoned() {
        return Err(EngineError::Fatal(err.message()));
    }
    stack.push_error(kind, &err.message());
    Err(EngineError::Thrown)
}

fn kind_of(err: &Error) -> ErrorKind {
    match err {
        Error::Reference { .. } => ErrorKind::ReferenceError,
        Error::Type { .. } | Error::ArgumentType(_) => ErrorKind::TypeError,
        Error::Syntax { .. } => ErrorKind::SyntaxError,
        _ => ErrorKind::Error,
    }
}
