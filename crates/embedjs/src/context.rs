//! Script context: one engine plus the operations exposed to the host
//!
//! Every operation checks validity first, runs inside
//! [`Engine::protect`], and restores the value stack to its entry depth on
//! every exit path.

use std::cell::Cell;
use std::rc::Rc;

use embedjs_engine::{Engine, Stack};

use crate::bridge::{self, Invocation};
use crate::classify::{check, classify};
use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::marshal::Marshaller;
use crate::path::PropertyPath;
use crate::value::{HostFunction, HostValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Valid,
    Invalid,
}

/// An isolated script environment.
///
/// # Thread Safety
///
/// `Context` is `!Send` and `!Sync`. Use one context per thread; callers
/// serialise access themselves.
///
/// # Example
///
/// ```
/// use embedjs::{Context, HostValue};
///
/// let mut ctx = Context::new().unwrap();
/// ctx.execute("function id(a) { return a }").unwrap();
/// let value = ctx.call_property("id", &[HostValue::from("Hei")]).unwrap();
/// assert_eq!(value, HostValue::from("Hei"));
/// ```
pub struct Context {
    engine: Engine,
    state: Rc<Cell<State>>,
    marshaller: Rc<Marshaller>,
    config: ContextConfig,
}

impl Context {
    /// Create a context with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Result<Self> {
        let mut engine = Engine::new()?;

        let state = Rc::new(Cell::new(State::Valid));
        let flag = Rc::clone(&state);
        engine.register_fatal_hook(move |reason| {
            flag.set(State::Invalid);
            tracing::error!(reason, "context invalidated by fatal engine error");
        });

        let marshaller = Rc::new(Marshaller::new(
            config.complex_object.clone(),
            config.max_depth,
            config.max_elements,
        ));
        tracing::debug!(
            max_depth = config.max_depth,
            max_elements = config.max_elements,
            "created script context"
        );

        Ok(Self {
            engine,
            state,
            marshaller,
            config,
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Whether the context can still run code. Turns `false` for good once
    /// the engine aborts.
    pub fn is_valid(&self) -> bool {
        self.state.get() == State::Valid && self.engine.is_alive()
    }

    /// Current depth of the engine value stack; `0` between operations.
    pub fn stack_depth(&self) -> usize {
        self.engine.stack_depth()
    }

    /// Run `source` and convert its completion value.
    pub fn evaluate(&mut self, source: &str) -> Result<HostValue> {
        let filename = self.config.default_filename.clone();
        self.evaluate_with_filename(source, &filename)
    }

    pub fn evaluate_with_filename(&mut self, source: &str, filename: &str) -> Result<HostValue> {
        tracing::trace!(filename, "evaluate");
        self.run(|stack, marshaller| {
            let ran = stack.compile_and_run(source.as_bytes(), filename);
            check(stack, ran)?;
            marshaller.pop(stack)
        })
    }

    /// Run `source` for its side effects. The completion value is dropped
    /// without conversion, so its shape can never make this fail.
    pub fn execute(&mut self, source: &str) -> Result<()> {
        let filename = self.config.default_filename.clone();
        self.execute_with_filename(source, &filename)
    }

    pub fn execute_with_filename(&mut self, source: &str, filename: &str) -> Result<()> {
        tracing::trace!(filename, "execute");
        self.run(|stack, _| {
            let ran = stack.compile_and_run(source.as_bytes(), filename);
            check(stack, ran)?;
            stack.pop()?;
            Ok(())
        })
    }

    /// Read a global property, or a nested one given several keys.
    ///
    /// A missing root is a [`Error::Reference`]; a missing nested key reads
    /// as `Null`; stepping through `null`/`undefined` is a [`Error::Type`].
    pub fn get_property(&mut self, path: impl Into<PropertyPath>) -> Result<HostValue> {
        let path = non_empty(path.into())?;
        tracing::trace!(path = ?path.keys(), "get property");
        self.run(|stack, marshaller| {
            resolve(stack, &path)?;
            marshaller.pop(stack)
        })
    }

    /// Call the function at `path` with the object holding it as `this`.
    pub fn call_property(
        &mut self,
        path: impl Into<PropertyPath>,
        args: &[HostValue],
    ) -> Result<HostValue> {
        let path = non_empty(path.into())?;
        tracing::trace!(path = ?path.keys(), argc = args.len(), "call property");
        self.run(|stack, marshaller| {
            resolve(stack, &path)?;
            let function = stack.depth() - 1;
            stack.dup(function)?;
            stack.dup(function - 1)?;
            call_with(stack, marshaller, args)
        })
    }

    /// Evaluate `source` to a function and call it with `args`.
    ///
    /// ```
    /// use embedjs::{Context, HostValue};
    ///
    /// let mut ctx = Context::new().unwrap();
    /// let sum = ctx
    ///     .call_iife("(function(a, b) { return a + b })", &[1.into(), 2.into()])
    ///     .unwrap();
    /// assert_eq!(sum, HostValue::Number(3.0));
    /// ```
    pub fn call_iife(&mut self, source: &str, args: &[HostValue]) -> Result<HostValue> {
        let filename = self.config.default_filename.clone();
        tracing::trace!(filename, argc = args.len(), "call iife");
        self.run(|stack, marshaller| {
            let ran = stack.compile_and_run(source.as_bytes(), &filename);
            check(stack, ran)?;
            stack.push_undefined();
            call_with(stack, marshaller, args)
        })
    }

    /// Install `function` as global `name`.
    ///
    /// ```
    /// use embedjs::{Context, HostValue};
    ///
    /// let mut ctx = Context::new().unwrap();
    /// ctx.define_function("square", |call| {
    ///     let x = call.arg(0).and_then(HostValue::as_f64).unwrap_or(0.0);
    ///     Ok(HostValue::from(x * x))
    /// })
    /// .unwrap();
    /// assert_eq!(ctx.evaluate("square(2)").unwrap(), HostValue::Number(4.0));
    /// ```
    pub fn define_function<F>(&mut self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&mut Invocation<'_, '_>) -> anyhow::Result<HostValue> + 'static,
    {
        self.define_host_function(name, HostFunction::new(function))
    }

    pub fn define_host_function(&mut self, name: &str, function: HostFunction) -> Result<()> {
        tracing::debug!(name, "defining host function");
        self.run(|stack, marshaller| {
            bridge::push_function(stack, name, function, Rc::clone(marshaller));
            let stored = stack.put_global(name.as_bytes());
            check(stack, stored)
        })
    }

    /// Force a full garbage collection cycle.
    pub fn gc(&mut self) -> Result<()> {
        self.ensure_valid()?;
        self.engine.collect_garbage();
        Ok(())
    }

    /// Abort the engine as if it had hit an internal error. The context is
    /// invalid afterwards.
    pub fn inject_fatal(&mut self, reason: &str) -> Error {
        self.engine.fatal(reason).into()
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::internal("context is unusable after a fatal engine error"))
        }
    }

    fn run<T>(
        &mut self,
        f: impl FnOnce(&mut Stack<'_>, &Rc<Marshaller>) -> Result<T>,
    ) -> Result<T> {
        self.ensure_valid()?;
        let marshaller = Rc::clone(&self.marshaller);
        self.engine.protect(|stack| {
            let base = stack.depth();
            let mut stack = scopeguard::guard_on_success(stack, move |stack| stack.set_depth(base));
            f(&mut **stack, &marshaller)
        })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("valid", &self.is_valid())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn non_empty(path: PropertyPath) -> Result<PropertyPath> {
    if path.is_empty() {
        Err(Error::ArgumentType("property path must not be empty".into()))
    } else {
        Ok(path)
    }
}

/// Leave `[.., parent, value]` on the stack.
fn resolve(stack: &mut Stack<'_>, path: &PropertyPath) -> Result<()> {
    let Some((root, rest)) = path.keys().split_first() else {
        return Err(Error::ArgumentType("property path must not be empty".into()));
    };

    stack.push_global_object();
    let global = stack.depth() - 1;
    let found = stack.get_prop(global, root.as_bytes());
    if !check(stack, found)? {
        return Err(Error::reference(format!("identifier '{root}' undefined")));
    }

    for key in rest {
        let base = stack.depth() - 1;
        if stack.slot_type(base).is_nullish() {
            return Err(Error::type_error("invalid base value"));
        }
        let found = stack.get_prop(base, key.as_bytes());
        check(stack, found)?;
    }
    Ok(())
}

/// With `[func, this]` on top, push `args`, call and convert the result.
fn call_with(stack: &mut Stack<'_>, marshaller: &Rc<Marshaller>, args: &[HostValue]) -> Result<HostValue> {
    for arg in args {
        marshaller.push(stack, arg)?;
    }
    stack
        .call_method(args.len())
        .map_err(|err| classify(stack, err))?;
    marshaller.pop(stack)
}
