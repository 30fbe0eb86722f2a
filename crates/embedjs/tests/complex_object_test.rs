//! The complex-object sentinel and its per-context override

use embedjs::{ComplexObject, Context, ContextConfig, Error, HostValue};
use serial_test::serial;

#[test]
#[serial]
fn test_functions_become_sentinel() {
    let mut ctx = Context::new().unwrap();
    assert_eq!(
        ctx.evaluate("(function() {})").unwrap(),
        HostValue::ComplexObject(ComplexObject::instance())
    );
}

#[test]
#[serial]
fn test_sentinel_is_stable_across_calls_and_gc() {
    let mut ctx = Context::new().unwrap();
    let first = ctx.evaluate("(function() {})").unwrap();

    // unrelated garbage on both sides of the boundary
    let garbage: Vec<Vec<String>> = (0..100)
        .map(|_| (0..1000).map(|_| " ".repeat(100)).collect())
        .collect();
    drop(garbage);
    ctx.execute("for (var i = 0; i < 10000; i++) { [i, {i: i}, 'x' + i] }")
        .unwrap();
    ctx.gc().unwrap();

    let second = ctx.evaluate("(function() {})").unwrap();
    assert_eq!(first, second);

    let mut other = Context::new().unwrap();
    assert_eq!(other.evaluate("(function() {})").unwrap(), first);
}

#[test]
#[serial]
fn test_sentinel_survives_reset() {
    ComplexObject::reset();
    let garbage: Vec<_> = (0..100).map(|_| vec![0u8; 100_000]).collect();
    drop(garbage);
    let instance = ComplexObject::instance();
    assert_eq!(instance, ComplexObject::instance());

    let mut ctx = Context::new().unwrap();
    assert_eq!(
        ctx.evaluate("Symbol('s')").unwrap(),
        HostValue::ComplexObject(instance)
    );
}

#[test]
#[serial]
fn test_nested_complex_values_are_replaced_in_place() {
    let mut ctx = Context::new().unwrap();
    let sentinel = HostValue::ComplexObject(ComplexObject::instance());
    assert_eq!(
        ctx.evaluate("[1, function() {}, [Symbol('x')]]").unwrap(),
        HostValue::Array(vec![1.into(), sentinel.clone(), HostValue::Array(vec![sentinel])])
    );
}

#[test]
fn test_function_members_are_omitted() {
    let mut ctx = Context::new().unwrap();
    assert_eq!(
        ctx.evaluate("({a: 1, f: function() {}})").unwrap(),
        HostValue::map([("a", 1)])
    );
}

#[test]
fn test_override_value() {
    let config = ContextConfig::new().complex_object("<complex>");
    let mut ctx = Context::with_config(config).unwrap();
    assert_eq!(ctx.evaluate("(function() {})").unwrap(), HostValue::from("<complex>"));
    assert_eq!(
        ctx.evaluate("[Symbol('a')]").unwrap(),
        HostValue::from(vec!["<complex>"])
    );
}

#[test]
fn test_falsy_overrides_propagate() {
    let mut ctx = Context::with_config(ContextConfig::new().complex_object(false)).unwrap();
    assert_eq!(ctx.evaluate("(function() {})").unwrap(), HostValue::Boolean(false));

    let mut ctx =
        Context::with_config(ContextConfig::new().complex_object(HostValue::Null)).unwrap();
    assert_eq!(ctx.evaluate("(function() {})").unwrap(), HostValue::Null);
}

#[test]
#[serial]
fn test_sentinel_cannot_be_sent_back() {
    let mut ctx = Context::new().unwrap();
    ctx.execute("function id(a) { return a }").unwrap();
    let sentinel = ctx.evaluate("(function() {})").unwrap();
    let err = ctx.call_property("id", &[sentinel]).unwrap_err();
    assert_eq!(err, Error::ArgumentType("unsupported type complex object".into()));
}
