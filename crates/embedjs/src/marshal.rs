//! Host values ⇄ stack slots
//!
//! `push` leaves exactly one new slot on success and none on failure; `pop`
//! always consumes the top slot.

use std::rc::Rc;

use embedjs_engine::{SlotType, Stack};

use crate::bridge;
use crate::classify::check;
use crate::codec::from_engine_text;
use crate::error::{Error, Result};
use crate::registry::ComplexObject;
use crate::value::HostValue;

#[derive(Debug)]
pub(crate) struct Marshaller {
    complex: Option<HostValue>,
    max_depth: usize,
    max_elements: usize,
}

impl Marshaller {
    pub(crate) fn new(complex: Option<HostValue>, max_depth: usize, max_elements: usize) -> Self {
        Self {
            complex,
            max_depth,
            max_elements,
        }
    }

    /// Push `value` as one engine value.
    pub(crate) fn push(self: &Rc<Self>, stack: &mut Stack<'_>, value: &HostValue) -> Result<()> {
        let base = stack.depth();
        let pushed = self.push_value(stack, value, 0);
        if pushed.is_err() {
            stack.set_depth(base);
        }
        pushed
    }

    fn push_value(self: &Rc<Self>, stack: &mut Stack<'_>, value: &HostValue, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::ArgumentType(too_deep(self.max_depth)));
        }

        match value {
            HostValue::Null => stack.push_null(),
            HostValue::Boolean(b) => stack.push_boolean(*b),
            HostValue::Number(n) => stack.push_number(*n),
            HostValue::String(s) => stack.push_string(s.as_bytes()),
            HostValue::Array(items) => {
                let array = stack.push_array();
                for item in items {
                    self.push_value(stack, item, depth + 1)?;
                    let appended = stack.append(array);
                    check(stack, appended)?;
                }
            }
            HostValue::Map(entries) => {
                let object = stack.push_object();
                for (key, item) in entries {
                    let HostValue::String(key) = key else {
                        return Err(unsupported(key));
                    };
                    self.push_value(stack, item, depth + 1)?;
                    let stored = stack.put_prop(object, key.as_bytes());
                    check(stack, stored)?;
                }
            }
            HostValue::Callable(function) => {
                bridge::push_function(stack, "", function.clone(), Rc::clone(self));
            }
            HostValue::ComplexObject(_) | HostValue::Foreign(_) => return Err(unsupported(value)),
        }
        Ok(())
    }

    /// Convert and pop the top slot.
    pub(crate) fn pop(&self, stack: &mut Stack<'_>) -> Result<HostValue> {
        let Some(top) = stack.depth().checked_sub(1) else {
            return Err(stack.fatal("no value to convert").into());
        };
        let mut budget = self.max_elements;
        let value = self.read(stack, top, 0, &mut budget);
        stack.set_depth(top);
        value
    }

    /// Convert the slot at `idx`. `budget` is the number of array elements
    /// and map entries still allowed; it is charged before anything is read.
    fn read(
        &self,
        stack: &mut Stack<'_>,
        idx: usize,
        depth: usize,
        budget: &mut usize,
    ) -> Result<HostValue> {
        if depth > self.max_depth {
            return Err(Error::type_error(too_deep(self.max_depth)));
        }

        match stack.slot_type(idx) {
            SlotType::None => Err(stack.fatal(format!("no value at slot {idx}")).into()),
            SlotType::Undefined | SlotType::Null => Ok(HostValue::Null),
            SlotType::Boolean => Ok(HostValue::Boolean(stack.get_boolean(idx))),
            SlotType::Number => Ok(HostValue::Number(stack.get_number(idx))),
            SlotType::String => {
                let text = stack.get_string(idx).unwrap_or_default();
                Ok(HostValue::String(from_engine_text(&text)?))
            }
            SlotType::Array => {
                let length = stack.array_length(idx);
                let length = check(stack, length)?;
                self.charge(budget, length)?;
                let mut items = Vec::with_capacity(length);
                for i in 0..length {
                    let base = stack.depth();
                    let fetched = stack.get_index(idx, i);
                    check(stack, fetched)?;
                    let item = self.read(stack, base, depth + 1, budget);
                    stack.set_depth(base);
                    items.push(item?);
                }
                Ok(HostValue::Array(items))
            }
            SlotType::Object => {
                let keys = stack.own_keys(idx);
                let keys = check(stack, keys)?;
                self.charge(budget, keys.len())?;
                let mut entries = Vec::with_capacity(keys.len());
                for key in keys {
                    let base = stack.depth();
                    let fetched = stack.get_prop(idx, &key);
                    check(stack, fetched)?;
                    if stack.slot_type(base) == SlotType::Function {
                        stack.set_depth(base);
                        continue;
                    }
                    let item = self.read(stack, base, depth + 1, budget);
                    stack.set_depth(base);
                    entries.push((HostValue::String(from_engine_text(&key)?), item?));
                }
                Ok(HostValue::Map(entries))
            }
            SlotType::Function | SlotType::Other => Ok(self.complex()),
        }
    }

    fn charge(&self, budget: &mut usize, count: usize) -> Result<()> {
        match budget.checked_sub(count) {
            Some(left) => {
                *budget = left;
                Ok(())
            }
            None => Err(Error::type_error(format!(
                "value has more than {} elements",
                self.max_elements
            ))),
        }
    }

    fn complex(&self) -> HostValue {
        match &self.complex {
            Some(value) => value.clone(),
            None => HostValue::ComplexObject(ComplexObject::instance()),
        }
    }
}

fn unsupported(value: &HostValue) -> Error {
    Error::ArgumentType(format!("unsupported type {}", value.type_name()))
}

fn too_deep(max_depth: usize) -> String {
    format!("value nesting exceeds maximum depth of {max_depth}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Foreign;
    use embedjs_engine::Engine;
    use serial_test::serial;

    struct Opaque;

    fn marshaller() -> Rc<Marshaller> {
        Rc::new(Marshaller::new(None, 8, 64))
    }

    fn round_trip(value: &HostValue) -> Result<HostValue> {
        let mut engine = Engine::new().unwrap();
        let m = marshaller();
        engine.protect(|stack| {
            m.push(stack, value)?;
            let back = m.pop(stack)?;
            assert_eq!(stack.depth(), 0);
            Ok(back)
        })
    }

    fn read_source(m: &Marshaller, source: &str) -> Result<HostValue> {
        let mut engine = Engine::new().unwrap();
        engine.protect(|stack| {
            stack.compile_and_run(source.as_bytes(), "test.js")?;
            m.pop(stack)
        })
    }

    #[test]
    fn test_nested_structures_survive() {
        let value = HostValue::map([
            ("name", HostValue::from("widget")),
            ("sizes", HostValue::from(vec![1, 2, 3])),
            ("nested", HostValue::map([("ok", true)])),
            ("nothing", HostValue::Null),
        ]);
        assert_eq!(round_trip(&value).unwrap(), value);
    }

    #[test]
    fn test_unsupported_values_fail_identically() {
        let foreign = HostValue::from(Foreign::of(&Opaque));
        let cases = [
            foreign.clone(),
            HostValue::Array(vec![HostValue::from(1), foreign.clone()]),
            HostValue::map([("key", foreign.clone())]),
            HostValue::Map(vec![(foreign.clone(), HostValue::from(1))]),
        ];
        for case in &cases {
            match round_trip(case) {
                Err(Error::ArgumentType(message)) => assert!(message.contains("Opaque"), "{message}"),
                other => panic!("expected argument type error, got {other:?}"),
            }
        }

        let numeric_key = HostValue::Map(vec![(HostValue::from(123), HostValue::from(1))]);
        assert_eq!(
            round_trip(&numeric_key),
            Err(Error::ArgumentType("unsupported type number".into()))
        );
    }

    #[test]
    fn test_failed_push_restores_depth() {
        let mut engine = Engine::new().unwrap();
        let m = marshaller();
        let value = HostValue::Array(vec![
            HostValue::from(1),
            HostValue::map([("deep", HostValue::from(Foreign::of(&Opaque)))]),
        ]);
        engine
            .protect(|stack| {
                stack.push_number(7.0);
                assert!(m.push(stack, &value).is_err());
                assert_eq!(stack.depth(), 1);
                stack.set_depth(0);
                Ok::<_, Error>(())
            })
            .unwrap();
    }

    #[test]
    #[serial]
    fn test_complex_values_become_sentinel() {
        let m = marshaller();
        let sentinel = HostValue::ComplexObject(ComplexObject::instance());
        assert_eq!(read_source(&m, "(function() {})").unwrap(), sentinel);
        assert_eq!(read_source(&m, "Symbol('s')").unwrap(), sentinel);
        assert_eq!(
            read_source(&m, "[1, function() {}, 'x']").unwrap(),
            HostValue::Array(vec![1.into(), sentinel.clone(), "x".into()])
        );
    }

    #[test]
    fn test_override_is_returned_verbatim() {
        let m = Marshaller::new(Some(HostValue::Boolean(false)), 8, 64);
        assert_eq!(
            read_source(&m, "(function() {})").unwrap(),
            HostValue::Boolean(false)
        );
        assert_eq!(
            read_source(&m, "({ a: Symbol('s') })").unwrap(),
            HostValue::map([("a", false)])
        );
    }

    #[test]
    fn test_function_members_and_inherited_properties_are_omitted() {
        let m = marshaller();
        let value = read_source(
            &m,
            "var proto = { inherited: 1 };
             var o = Object.create(proto);
             o.own = 2;
             o.method = function() {};
             Object.defineProperty(o, 'hidden', { value: 3, enumerable: false });
             o",
        )
        .unwrap();
        assert_eq!(value, HostValue::map([("own", 2)]));
    }

    #[test]
    fn test_depth_limit_in_both_directions() {
        let m = marshaller();
        let err = read_source(&m, "var a = []; a.push(a); a").unwrap_err();
        assert_eq!(
            err,
            Error::type_error("value nesting exceeds maximum depth of 8")
        );

        let mut deep = HostValue::Null;
        for _ in 0..10 {
            deep = HostValue::Array(vec![deep]);
        }
        assert!(matches!(round_trip(&deep), Err(Error::ArgumentType(_))));
    }

    #[test]
    fn test_huge_array_length_is_refused() {
        let m = marshaller();
        let err = read_source(&m, "var a = []; a.length = 4294967295; a").unwrap_err();
        assert_eq!(err, Error::type_error("value has more than 64 elements"));
    }

    #[test]
    fn test_element_budget_spans_the_whole_value() {
        let m = marshaller();
        let err = read_source(&m, "[new Array(40), new Array(40)]").unwrap_err();
        assert_eq!(err, Error::type_error("value has more than 64 elements"));

        let value = read_source(&m, "[new Array(30), { a: 1, b: 2 }]").unwrap();
        let HostValue::Array(items) = value else {
            panic!("expected array");
        };
        assert_eq!(items[0], HostValue::Array(vec![HostValue::Null; 30]));
    }

    #[test]
    fn test_sparse_array_holes_become_null() {
        let m = marshaller();
        assert_eq!(
            read_source(&m, "var a = []; a[3] = 'x'; a").unwrap(),
            HostValue::Array(vec![
                HostValue::Null,
                HostValue::Null,
                HostValue::Null,
                "x".into()
            ])
        );
    }

    #[test]
    fn test_keys_ignore_replaced_object_keys() {
        let m = marshaller();
        assert_eq!(
            read_source(&m, "Object.keys = 5; ({ a: 1 })").unwrap(),
            HostValue::map([("a", 1)])
        );
        assert_eq!(
            read_source(&m, "Object.keys = function() { return ['a', 'zzz']; }; ({ a: 1 })").unwrap(),
            HostValue::map([("a", 1)])
        );
    }

    #[test]
    fn test_integer_keys_are_strings() {
        let m = marshaller();
        assert_eq!(
            read_source(&m, "({ b: 1, 2: 'two', 0: 'zero' })").unwrap(),
            HostValue::map([("0", HostValue::from("zero")), ("2", "two".into()), ("b", 1.into())])
        );
    }

    #[test]
    fn test_throwing_getter_is_a_script_error() {
        let m = marshaller();
        let err = read_source(&m, "({ get a() { throw new TypeError('no peeking'); } })").unwrap_err();
        assert_eq!(err, Error::type_error("no peeking"));
    }

    #[test]
    fn test_undefined_becomes_null() {
        let m = marshaller();
        assert_eq!(read_source(&m, "undefined").unwrap(), HostValue::Null);
        assert_eq!(
            read_source(&m, "({ a: undefined })").unwrap(),
            HostValue::map([("a", HostValue::Null)])
        );
    }
}
