#![allow(dead_code)]

use std::rc::Rc;

use fastexpr::interp::Evaluator;
use fastexpr::meta::{ClassDef, EnumDef, Ty};
use fastexpr::tree::ExprRef;
use fastexpr::try_compile;
use fastexpr::value::{Callable, Object, Value};

/// Compile through the fast path and invoke. Every result is cross-checked
/// against the general evaluator running the same tree with the same
/// arguments; callables can only be compared by invoking them, so those are
/// left to the caller.
pub fn compile_and_check(lambda: &ExprRef, args: &[Value]) -> Value {
    let compiled = try_compile(lambda).expect("fast path refused a supported tree");
    let fast = compiled.invoke(args).expect("compiled callable faulted");
    let slow = eval_reference(lambda, args);
    match (&fast, &slow) {
        (Value::Func(_), Value::Func(_)) => {}
        _ => assert_eq!(fast, slow, "compiled and evaluated results diverge"),
    }
    fast
}

/// Run the lambda through the general evaluator only.
pub fn eval_reference(lambda: &ExprRef, args: &[Value]) -> Value {
    let callable = Evaluator::new().callable_of(lambda).expect("lambda root");
    callable.invoke(args).expect("evaluator faulted")
}

pub fn compile(lambda: &ExprRef) -> Callable {
    try_compile(lambda).expect("fast path refused a supported tree")
}

/// A small reference type with one int field, handy as a non-inline
/// constant.
pub fn point_class() -> Rc<ClassDef> {
    ClassDef::new("Point", vec![("x", Ty::Int)])
}

pub fn point(class: &Rc<ClassDef>, x: i64) -> Value {
    Value::Obj(Object::with_fields(class, vec![Value::Int(x)]))
}

pub fn color_enum() -> Rc<EnumDef> {
    EnumDef::new("Color", &[("red", 0), ("green", 1), ("blue", 2)])
}
