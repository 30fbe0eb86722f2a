//! Engine handle: one VM instance plus its value stack

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use boa_engine::builtins::error::Error as ErrorData;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::property::PropertyDescriptor;
use boa_engine::{Context as Vm, JsResult, JsString, JsValue, NativeFunction, js_string};

use crate::error::{EngineError, EngineResult, FatalAbort};
use crate::stack::Stack;

/// Callback run when the VM aborts. It fires at most once.
pub type FatalHook = Box<dyn FnOnce(&str)>;

const DEAD: &str = "engine was aborted by an earlier fatal error";

/// Owns exactly one VM.
///
/// All work happens inside [`Engine::protect`], which hands out a [`Stack`]
/// and turns anything that escapes the VM (panics, poisoned stacks) into a
/// fatal abort.
///
/// # Thread Safety
///
/// `Engine` is `!Send` and `!Sync`: the VM and its garbage collector are
/// bound to the thread that created them.
pub struct Engine {
    vm: Option<Box<Vm>>,
    slots: Vec<JsValue>,
    hook: Option<FatalHook>,
}

impl Engine {
    /// Allocate a fresh VM.
    pub fn new() -> EngineResult<Self> {
        let mut vm = Vm::builder()
            .build()
            .map_err(|e| EngineError::Fatal(format!("VM creation failed: {e}")))?;
        install_error_stack(&mut vm)
            .map_err(|e| EngineError::Fatal(format!("VM setup failed: {e}")))?;
        tracing::debug!("allocated script VM");
        Ok(Self {
            vm: Some(Box::new(vm)),
            slots: Vec::new(),
            hook: None,
        })
    }

    /// Install the callback that observes a fatal abort, replacing any
    /// previous one.
    pub fn register_fatal_hook(&mut self, hook: impl FnOnce(&str) + 'static) {
        self.hook = Some(Box::new(hook));
    }

    /// Whether the VM can still be used.
    pub fn is_alive(&self) -> bool {
        self.vm.is_some()
    }

    /// Number of values held on the value stack.
    pub fn stack_depth(&self) -> usize {
        self.slots.len()
    }

    /// Run `f` against the value stack.
    ///
    /// A panic escaping `f` (including from native callbacks deep inside the
    /// VM) or a stack poisoned by an invariant violation aborts the engine:
    /// the fatal hook runs before this returns, and the error is reported as
    /// [`EngineError::Fatal`] converted into `E`.
    pub fn protect<T, E>(&mut self, f: impl FnOnce(&mut Stack<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<EngineError>,
    {
        let Some(vm) = self.vm.as_deref_mut() else {
            return Err(EngineError::Fatal(DEAD.to_owned()).into());
        };
        let slots = &mut self.slots;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut stack = Stack::new(vm, slots);
            let result = f(&mut stack);
            (result, stack.take_poison())
        }));

        match outcome {
            Ok((result, None)) => result,
            Ok((_, Some(reason))) => Err(self.abort(&reason).into()),
            Err(payload) => Err(self.abort(&panic_reason(payload.as_ref())).into()),
        }
    }

    /// Abort the VM on purpose.
    pub fn fatal(&mut self, reason: &str) -> EngineError {
        if !self.is_alive() {
            return EngineError::Fatal(DEAD.to_owned());
        }
        self.abort(reason)
    }

    /// Force a full garbage collection cycle.
    pub fn collect_garbage(&mut self) {
        if self.is_alive() {
            boa_gc::force_collect();
        }
    }

    fn abort(&mut self, reason: &str) -> EngineError {
        tracing::error!(reason, "fatal engine error, VM abandoned");

        // The VM may be mid-operation; it is leaked rather than torn down.
        if let Some(vm) = self.vm.take() {
            std::mem::forget(vm);
        }
        std::mem::forget(std::mem::take(&mut self.slots));

        if let Some(hook) = self.hook.take() {
            hook(reason);
        }
        EngineError::Fatal(reason.to_owned())
    }
}

/// Give every error object a `stack` accessor that reports where it was
/// created, as `Name: message (file:line:column)`. Assigning `stack` stores
/// an own property instead.
fn install_error_stack(vm: &mut Vm) -> JsResult<()> {
    let getter = FunctionObjectBuilder::new(vm.realm(), NativeFunction::from_fn_ptr(error_stack))
        .name(js_string!("get stack"))
        .build();
    let setter = FunctionObjectBuilder::new(vm.realm(), NativeFunction::from_fn_ptr(set_error_stack))
        .name(js_string!("set stack"))
        .length(1)
        .build();

    let prototype = vm.intrinsics().constructors().error().prototype();
    prototype.define_property_or_throw(
        js_string!("stack"),
        PropertyDescriptor::builder()
            .get(getter)
            .set(setter)
            .enumerable(false)
            .configurable(true),
        vm,
    )?;
    Ok(())
}

fn error_stack(this: &JsValue, _: &[JsValue], _: &mut Vm) -> JsResult<JsValue> {
    match this.as_object() {
        Some(object) if object.is::<ErrorData>() => {
            Ok(JsString::from(this.display().to_string()).into())
        }
        _ => Ok(JsValue::undefined()),
    }
}

fn set_error_stack(this: &JsValue, args: &[JsValue], vm: &mut Vm) -> JsResult<JsValue> {
    if let Some(object) = this.as_object() {
        let value = args.first().cloned().unwrap_or_else(JsValue::undefined);
        object.define_property_or_throw(
            js_string!("stack"),
            PropertyDescriptor::builder()
                .value(value)
                .writable(true)
                .enumerable(false)
                .configurable(true),
            vm,
        )?;
    }
    Ok(JsValue::undefined())
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(FatalAbort(reason)) = payload.downcast_ref::<FatalAbort>() {
        reason.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic inside engine: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic inside engine: {message}")
    } else {
        "panic inside engine".to_owned()
    }
}
