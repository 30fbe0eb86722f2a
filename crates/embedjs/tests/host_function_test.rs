//! Host functions called from script

use std::cell::RefCell;
use std::rc::Rc;

use embedjs::{Context, Error, Foreign, HostFunction, HostValue};

#[test]
fn test_define_function() {
    let mut ctx = Context::new().unwrap();
    ctx.define_function("square", |call| {
        let x = call.arg(0).and_then(HostValue::as_f64).unwrap_or(f64::NAN);
        Ok(HostValue::from(x * x))
    })
    .unwrap();
    assert_eq!(ctx.evaluate("square(2)").unwrap(), HostValue::Number(4.0));
    assert_eq!(ctx.call_property("square", &[3.into()]).unwrap(), HostValue::Number(9.0));
    assert_eq!(ctx.evaluate("typeof square").unwrap(), HostValue::from("function"));
}

#[test]
fn test_host_function_receives_structures() {
    let mut ctx = Context::new().unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    ctx.define_function("record", move |call| {
        log.borrow_mut().extend(call.args().iter().cloned());
        Ok(HostValue::Null)
    })
    .unwrap();

    ctx.execute("record('a', [1, 2], {k: null}, undefined)").unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![
            HostValue::from("a"),
            HostValue::from(vec![1, 2]),
            HostValue::map([("k", HostValue::Null)]),
            HostValue::Null,
        ]
    );
}

#[test]
fn test_host_error_is_catchable_in_script() {
    let mut ctx = Context::new().unwrap();
    ctx.define_function("fail", |_| Err(anyhow::anyhow!("host said no")))
        .unwrap();

    let caught = ctx
        .evaluate("try { fail(); 'unreachable' } catch (e) { e.message }")
        .unwrap();
    assert_eq!(caught, HostValue::from("host said no"));
    assert!(ctx.is_valid());

    let err = ctx.evaluate("fail()").unwrap_err();
    assert_eq!(err.error_type(), "Error");
    assert_eq!(err.message(), "host said no");
}

#[test]
fn test_host_reference_error_keeps_its_kind() {
    let mut ctx = Context::new().unwrap();
    ctx.define_function("lookup", |call| {
        let key = call.arg(0).and_then(HostValue::as_str).unwrap_or_default();
        Err(Error::reference(format!("identifier '{key}' undefined")).into())
    })
    .unwrap();

    let err = ctx.evaluate("lookup('x')").unwrap_err();
    assert_eq!(err, Error::reference("identifier 'x' undefined"));
}

#[test]
fn test_unconvertible_argument_throws_type_error() {
    let mut ctx = Context::new().unwrap();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    ctx.define_function("count", move |_| {
        *counter.borrow_mut() += 1;
        Ok(HostValue::Null)
    })
    .unwrap();

    let caught = ctx
        .evaluate("try { count(String.fromCharCode(0xD800)) } catch (e) { e instanceof TypeError }")
        .unwrap();
    assert_eq!(caught, HostValue::Boolean(true));
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn test_unconvertible_return_value_throws_type_error() {
    struct Socket;
    let mut ctx = Context::new().unwrap();
    ctx.define_function("open", |_| Ok(HostValue::from(Foreign::of(&Socket))))
        .unwrap();

    let err = ctx.evaluate("open()").unwrap_err();
    match err {
        Error::Type { message } => assert!(message.contains("Socket"), "{message}"),
        other => panic!("expected type error, got {other:?}"),
    }
}

#[test]
fn test_this_binding() {
    let mut ctx = Context::new().unwrap();
    ctx.define_function("describe", |call| {
        let this = call.this()?;
        Ok(this.get("label").cloned().unwrap_or(HostValue::Null))
    })
    .unwrap();

    let value = ctx
        .evaluate("var thing = { label: 'lamp', describe: describe }; thing.describe()")
        .unwrap();
    assert_eq!(value, HostValue::from("lamp"));
}

#[test]
fn test_callable_arguments_and_results() {
    let mut ctx = Context::new().unwrap();
    ctx.execute("function apply(f, x) { return f(x) }").unwrap();

    let double = HostValue::function(|call| {
        let x = call.arg(0).and_then(HostValue::as_f64).unwrap_or(0.0);
        Ok(HostValue::from(x * 2.0))
    });
    let result = ctx.call_property("apply", &[double, 21.into()]).unwrap();
    assert_eq!(result, HostValue::Number(42.0));

    ctx.define_function("adder", |call| {
        let base = call.arg(0).and_then(HostValue::as_f64).unwrap_or(0.0);
        Ok(HostValue::function(move |inner| {
            let n = inner.arg(0).and_then(HostValue::as_f64).unwrap_or(0.0);
            Ok(HostValue::from(base + n))
        }))
    })
    .unwrap();
    assert_eq!(ctx.evaluate("adder(10)(5)").unwrap(), HostValue::Number(15.0));
}

#[test]
fn test_function_object_tampering() {
    let mut ctx = Context::new().unwrap();
    ctx.define_host_function(
        "echo",
        HostFunction::new(|call| Ok(call.arg(0).cloned().unwrap_or(HostValue::Null))),
    )
    .unwrap();

    let value = ctx
        .evaluate(
            "echo.name = 'x'; echo.length = 42; echo.data = null;
             Object.defineProperty(echo, 'call', { value: null });
             delete echo.prototype;
             echo('still works')",
        )
        .unwrap();
    assert_eq!(value, HostValue::from("still works"));
}

#[test]
fn test_redefining_replaces_function() {
    let mut ctx = Context::new().unwrap();
    ctx.define_function("version", |_| Ok(1.into())).unwrap();
    ctx.define_function("version", |_| Ok(2.into())).unwrap();
    assert_eq!(ctx.evaluate("version()").unwrap(), HostValue::Number(2.0));
    assert_eq!(ctx.stack_depth(), 0);
}
