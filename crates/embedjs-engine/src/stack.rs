//! Value stack over the VM
//!
//! Every primitive here either pushes exactly one slot, pops exactly the
//! slots it documents, or leaves the stack untouched. Failing primitives
//! that report [`EngineError::Thrown`] leave the thrown value on top.

use std::panic;
use std::path::Path;
use std::rc::Rc;

use boa_engine::builtins::error::Error as ErrorData;
use boa_engine::builtins::object::OrdinaryObject;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::object::builtins::JsArray;
use boa_engine::property::{PropertyDescriptor, PropertyKey};
use boa_engine::{
    Context as Vm, JsError, JsNativeError, JsNativeErrorKind, JsObject, JsResult, JsString,
    JsValue, NativeFunction, Source, js_string,
};

use crate::error::{EngineError, EngineResult, ErrorKind, FatalAbort};
use crate::text::{decode_units, encode_units};

/// Host code invoked from script.
///
/// On entry the stack holds `[this, arg0, .., argN-1]`. Return `Ok(true)` to
/// hand the top slot back to the script, `Ok(false)` to return `undefined`,
/// and `Err(EngineError::Thrown)` to throw the top slot.
pub type NativeFn = Rc<dyn Fn(&mut Stack<'_>) -> EngineResult<bool>>;

/// Type tag of a stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    /// Index past the top of the stack
    None,
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    /// Plain (non-callable, non-array) object
    Object,
    Array,
    Function,
    /// Symbols, big integers and anything else without a host shape
    Other,
}

impl SlotType {
    fn of(value: &JsValue) -> Self {
        if value.is_undefined() {
            Self::Undefined
        } else if value.is_null() {
            Self::Null
        } else if value.is_boolean() {
            Self::Boolean
        } else if value.is_number() {
            Self::Number
        } else if value.is_string() {
            Self::String
        } else if let Some(object) = value.as_object() {
            if object.is_callable() {
                Self::Function
            } else if object.is_array() {
                Self::Array
            } else {
                Self::Object
            }
        } else {
            Self::Other
        }
    }

    /// Whether property lookups on this slot are rejected.
    pub fn is_nullish(self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }
}

/// A view of the value stack bound to a live VM.
///
/// Obtained from [`Engine::protect`](crate::Engine::protect) or handed to a
/// [`NativeFn`]. Indices are absolute, counted from the bottom of this view.
pub struct Stack<'a> {
    vm: &'a mut Vm,
    slots: &'a mut Vec<JsValue>,
    poison: Option<String>,
}

impl<'a> Stack<'a> {
    pub(crate) fn new(vm: &'a mut Vm, slots: &'a mut Vec<JsValue>) -> Self {
        Self {
            vm,
            slots,
            poison: None,
        }
    }

    pub(crate) fn take_poison(&mut self) -> Option<String> {
        self.poison.take()
    }

    /// Record an internal invariant violation. The engine aborts once control
    /// returns to it.
    pub fn fatal(&mut self, reason: impl Into<String>) -> EngineError {
        let reason = reason.into();
        if self.poison.is_none() {
            self.poison = Some(reason.clone());
        }
        EngineError::Fatal(reason)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poison.is_some()
    }

    // ------------------------------------------------------------------
    // Depth management
    // ------------------------------------------------------------------

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Drop every slot above `depth`.
    pub fn set_depth(&mut self, depth: usize) {
        if self.is_poisoned() {
            return;
        }
        if depth > self.slots.len() {
            let _ = self.fatal(format!(
                "cannot raise stack depth from {} to {depth}",
                self.slots.len()
            ));
            return;
        }
        self.slots.truncate(depth);
    }

    pub fn pop(&mut self) -> EngineResult<()> {
        self.take_top().map(drop)
    }

    /// Push a copy of the slot at `idx`.
    pub fn dup(&mut self, idx: usize) -> EngineResult<()> {
        let value = self.slot(idx)?;
        self.slots.push(value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pushing
    // ------------------------------------------------------------------

    pub fn push_undefined(&mut self) {
        self.slots.push(JsValue::undefined());
    }

    pub fn push_null(&mut self) {
        self.slots.push(JsValue::null());
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.slots.push(JsValue::from(value));
    }

    pub fn push_number(&mut self, value: f64) {
        self.slots.push(JsValue::from(value));
    }

    /// Push engine text (CESU-8 or UTF-8).
    pub fn push_string(&mut self, text: &[u8]) {
        self.slots.push(JsValue::from(engine_string(text)));
    }

    pub fn push_global_object(&mut self) {
        let global = self.vm.global_object();
        self.slots.push(global.into());
    }

    /// Push an empty array and return its index.
    pub fn push_array(&mut self) -> usize {
        let array = JsArray::new(self.vm);
        self.slots.push(array.into());
        self.slots.len() - 1
    }

    /// Pop the top slot and append it to the array at `array`.
    pub fn append(&mut self, array: usize) -> EngineResult<()> {
        let object = self.object_at(array)?;
        let array = match JsArray::from_object(object) {
            Ok(array) => array,
            Err(_) => return Err(self.fatal(format!("slot {array} is not an array"))),
        };
        let value = self.take_top()?;
        let pushed = array.push(value, self.vm);
        self.check(pushed).map(drop)
    }

    /// Push an empty plain object and return its index.
    pub fn push_object(&mut self) -> usize {
        let object = JsObject::with_object_proto(self.vm.intrinsics());
        self.slots.push(object.into());
        self.slots.len() - 1
    }

    /// Pop the top slot and store it as own property `key` of the object at
    /// `object`.
    pub fn put_prop(&mut self, object: usize, key: &[u8]) -> EngineResult<()> {
        let target = self.object_at(object)?;
        let value = self.take_top()?;
        let defined = target.create_data_property_or_throw(engine_string(key), value, self.vm);
        self.check(defined).map(drop)
    }

    /// Push a new error object built by constructor `kind`.
    pub fn push_error(&mut self, kind: ErrorKind, message: &str) {
        let native = match kind {
            ErrorKind::Error => JsNativeError::error(),
            ErrorKind::TypeError => JsNativeError::typ(),
            ErrorKind::ReferenceError => JsNativeError::reference(),
            ErrorKind::SyntaxError => JsNativeError::syntax(),
            ErrorKind::RangeError => JsNativeError::range(),
        };
        let object = native.with_message(message.to_owned()).to_opaque(self.vm);
        self.slots.push(object.into());
    }

    /// Push a function that runs `body` when called from script.
    pub fn push_native_function(&mut self, name: &str, body: NativeFn) {
        let callback = move |this: &JsValue, args: &[JsValue], vm: &mut Vm| -> JsResult<JsValue> {
            let mut slots = Vec::with_capacity(args.len() + 1);
            slots.push(this.clone());
            slots.extend_from_slice(args);

            let mut stack = Stack::new(vm, &mut slots);
            let outcome = body(&mut stack);
            if let Some(reason) = stack.take_poison() {
                panic::panic_any(FatalAbort(reason));
            }

            match outcome {
                Ok(true) => Ok(slots.pop().unwrap_or_else(JsValue::undefined)),
                Ok(false) => Ok(JsValue::undefined()),
                Err(EngineError::Thrown) => Err(JsError::from_opaque(
                    slots.pop().unwrap_or_else(JsValue::undefined),
                )),
                Err(EngineError::Fatal(reason)) => panic::panic_any(FatalAbort(reason)),
            }
        };

        // SAFETY: the closure only captures `body`, host code behind an `Rc`
        // that holds no garbage-collected values.
        let native = unsafe { NativeFunction::from_closure(callback) };
        let function = FunctionObjectBuilder::new(self.vm.realm(), native)
            .name(JsString::from(name))
            .length(0)
            .constructor(false)
            .build();
        self.slots.push(function.into());
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn slot_type(&self, idx: usize) -> SlotType {
        self.slots.get(idx).map_or(SlotType::None, SlotType::of)
    }

    pub fn get_boolean(&self, idx: usize) -> bool {
        self.slots
            .get(idx)
            .and_then(JsValue::as_boolean)
            .unwrap_or(false)
    }

    pub fn get_number(&self, idx: usize) -> f64 {
        self.slots
            .get(idx)
            .and_then(JsValue::as_number)
            .unwrap_or(f64::NAN)
    }

    /// Engine text of a string slot, `None` for any other slot.
    pub fn get_string(&self, idx: usize) -> Option<Vec<u8>> {
        let value = self.slots.get(idx)?;
        let string = value.as_string()?;
        Some(encode_units(&string.to_vec()))
    }

    /// String coercion of any slot. Coercion runs script (`toString`), so a
    /// throwing or missing slot yields `None`.
    pub fn to_display_string(&mut self, idx: usize) -> Option<Vec<u8>> {
        let value = self.slots.get(idx)?.clone();
        let string = value.to_string(self.vm).ok()?;
        Some(encode_units(&string.to_vec()))
    }

    /// Length of the array at `idx`.
    pub fn array_length(&mut self, idx: usize) -> EngineResult<usize> {
        let object = self.object_at(idx)?;
        let array = match JsArray::from_object(object) {
            Ok(array) => array,
            Err(_) => return Err(self.fatal(format!("slot {idx} is not an array"))),
        };
        let length = array.length(self.vm);
        self.check(length).map(|len| len as usize)
    }

    /// Push element `index` of the array at `idx`.
    pub fn get_index(&mut self, idx: usize, index: usize) -> EngineResult<()> {
        let object = self.object_at(idx)?;
        let value = object.get(index as u64, self.vm);
        let value = self.check(value)?;
        self.slots.push(value);
        Ok(())
    }

    /// Own enumerable string keys of the object at `idx`, in engine text.
    ///
    /// Keys come from the object's own internal methods; nothing on the
    /// global object is consulted. Integer-like keys are listed first, in
    /// ascending order, as strings.
    pub fn own_keys(&mut self, idx: usize) -> EngineResult<Vec<Vec<u8>>> {
        let object = self.object_at(idx)?;
        let listed = object.own_property_keys(self.vm);
        let listed = self.check(listed)?;

        let target = JsValue::from(object);
        let mut keys = Vec::with_capacity(listed.len());
        for key in listed {
            let name = match &key {
                PropertyKey::String(name) => name.clone(),
                PropertyKey::Index(_) => JsString::from(key.to_string()),
                PropertyKey::Symbol(_) => continue,
            };
            let enumerable = OrdinaryObject::property_is_enumerable(&target, &[key.into()], self.vm);
            if self.check(enumerable)?.to_boolean() {
                keys.push(encode_units(&name.to_vec()));
            }
        }
        Ok(keys)
    }

    /// Push property `key` of the slot at `idx`. Returns whether the property
    /// exists (own or inherited); a missing property pushes `undefined`.
    pub fn get_prop(&mut self, idx: usize, key: &[u8]) -> EngineResult<bool> {
        let base = self.slot(idx)?;
        let key = engine_string(key);

        let object = base.to_object(self.vm);
        let object = self.check(object)?;
        let exists = object.has_property(key.clone(), self.vm);
        let exists = self.check(exists)?;
        let value = object.get(key, self.vm);
        let value = self.check(value)?;

        self.slots.push(value);
        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Pop the top slot and store it as global property `name`.
    pub fn put_global(&mut self, name: &[u8]) -> EngineResult<()> {
        let value = self.take_top()?;
        let global = self.vm.global_object();
        let stored = global.set(engine_string(name), value, true, self.vm);
        self.check(stored).map(drop)
    }

    /// Compile `source` as a global script, run it and push its completion
    /// value.
    pub fn compile_and_run(&mut self, source: &[u8], filename: &str) -> EngineResult<()> {
        tracing::trace!(filename, bytes = source.len(), "compiling script");
        let path = Path::new(filename);
        let result = self.vm.eval(Source::from_bytes(source).with_path(path));
        let value = self.check(result)?;
        self.slots.push(value);
        Ok(())
    }

    /// Call with `[func, this, arg1..argN]` on top of the stack, replacing
    /// those slots with the result.
    pub fn call_method(&mut self, nargs: usize) -> EngineResult<()> {
        if self.slots.len() < nargs + 2 {
            return Err(self.fatal(format!(
                "call with {nargs} arguments on a stack of depth {}",
                self.slots.len()
            )));
        }

        let args = self.slots.split_off(self.slots.len() - nargs);
        let this = self.take_top()?;
        let func = self.take_top()?;

        let Some(callable) = func.as_callable() else {
            self.push_error(ErrorKind::TypeError, "not callable");
            return Err(EngineError::Thrown);
        };

        let result = callable.call(&this, &args, self.vm);
        let value = self.check(result)?;
        self.slots.push(value);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn slot(&mut self, idx: usize) -> EngineResult<JsValue> {
        match self.slots.get(idx) {
            Some(value) => Ok(value.clone()),
            None => Err(self.fatal(format!(
                "stack index {idx} out of range (depth {})",
                self.slots.len()
            ))),
        }
    }

    fn object_at(&mut self, idx: usize) -> EngineResult<JsObject> {
        let value = self.slot(idx)?;
        match value.as_object() {
            Some(object) => Ok(object),
            None => Err(self.fatal(format!("slot {idx} is not an object"))),
        }
    }

    fn take_top(&mut self) -> EngineResult<JsValue> {
        match self.slots.pop() {
            Some(value) => Ok(value),
            None => Err(self.fatal("value stack underflow")),
        }
    }

    /// Move a VM failure onto the stack as a thrown value.
    fn check<T>(&mut self, result: JsResult<T>) -> EngineResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let thrown = self.thrown_value(err);
                self.slots.push(thrown);
                Err(EngineError::Thrown)
            }
        }
    }

    fn thrown_value(&mut self, err: JsError) -> JsValue {
        // Runtime limit errors have no script-side object; surface them as
        // RangeError like a stack exhaustion would be.
        let value = match err.as_native() {
            Some(native) if matches!(native.kind, JsNativeErrorKind::RuntimeLimit) => {
                let message = native.message().to_owned();
                JsNativeError::range()
                    .with_message(message)
                    .to_opaque(self.vm)
                    .into()
            }
            _ => err.to_opaque(self.vm),
        };

        if let Some(object) = value.as_object()
            && object.is::<ErrorData>()
        {
            self.attach_trace(&object, &err);
        }
        value
    }

    /// Record the backtrace of `err` as own `stack` of the error object
    /// leaving the VM. A `stack` the script set itself is kept.
    fn attach_trace(&mut self, object: &JsObject, err: &JsError) {
        let key = js_string!("stack");
        if !matches!(object.has_own_property(key.clone(), self.vm), Ok(false)) {
            return;
        }
        let trace = PropertyDescriptor::builder()
            .value(JsString::from(err.to_string()))
            .writable(true)
            .enumerable(false)
            .configurable(true);
        // Frozen errors keep the trace from `Error.prototype.stack`.
        let _ = object.define_property_or_throw(key, trace, self.vm);
    }
}

fn engine_string(text: &[u8]) -> JsString {
    JsString::from(decode_units(text).as_slice())
}
