use std::rc::Rc;

use fastexpr::meta::{ClassDef, FnSig, Ty};
use fastexpr::tree::{CompareOp, Expr, ParamExpr};
use fastexpr::value::{Object, Value};

mod common;
use common::{compile, compile_and_check, point, point_class};

fn func_ty(params: Vec<Ty>, ret: Ty) -> Ty {
    Ty::Func(Rc::new(FnSig { params, ret }))
}

#[test]
fn test_bound_constant_member_access() {
    // () => boundObject.text where boundObject is a reference-typed
    // constant holding "hi". One constant slot; the hidden closure argument
    // exists even though the callable declares no parameters.
    let class = ClassDef::new("Holder", vec![("text", Ty::Str)]);
    let obj = Value::Obj(Object::with_fields(&class, vec![Value::str("hi")]));
    let lambda = Expr::lambda(
        vec![],
        Expr::field(
            Expr::constant(obj, Ty::Class(class.clone())),
            class.field("text").unwrap(),
        ),
        Ty::Str,
    );
    assert_eq!(compile_and_check(&lambda, &[]), Value::str("hi"));
    assert!(compile(&lambda).target.is_some());
}

#[test]
fn test_object_typed_value_constant_boxes() {
    // An int constant declared as object takes a slot and surfaces boxed;
    // comparing two of them is value equality on the underlying int.
    let lhs = Expr::constant(Value::Int(5), Ty::Object);
    let rhs = Expr::constant(Value::Int(5), Ty::Object);
    let lambda = Expr::lambda(vec![], Expr::compare(CompareOp::Eq, lhs, rhs), Ty::Bool);
    assert_eq!(compile_and_check(&lambda, &[]), Value::Bool(true));
    assert!(compile(&lambda).target.is_some());
}

#[test]
fn test_nested_lambda_captures_parameter() {
    // (x) => () => x; the returned callable observes the value passed at
    // construction time, construction by construction.
    let x = ParamExpr::new("x", Ty::Int);
    let inner = Expr::lambda(vec![], Expr::param(&x), Ty::Int);
    let outer = Expr::lambda(vec![x], inner, func_ty(vec![], Ty::Int));

    let compiled = compile(&outer);
    let first = compiled.invoke(&[Value::Int(7)]).unwrap();
    let Value::Func(f) = first else { panic!("expected a callable") };
    assert_eq!(f.invoke(&[]).unwrap(), Value::Int(7));

    let second = compiled.invoke(&[Value::Int(8)]).unwrap();
    let Value::Func(g) = second else { panic!("expected a callable") };
    assert_eq!(g.invoke(&[]).unwrap(), Value::Int(8));
}

#[test]
fn test_transitive_capture_through_two_levels() {
    // (x) => () => () => x: the innermost lambda reaches a parameter two
    // scopes out; each intermediate closure carries it through.
    let x = ParamExpr::new("x", Ty::Int);
    let innermost = Expr::lambda(vec![], Expr::param(&x), Ty::Int);
    let middle = Expr::lambda(vec![], innermost, func_ty(vec![], Ty::Int));
    let outer = Expr::lambda(vec![x], middle, func_ty(vec![], func_ty(vec![], Ty::Int)));

    let compiled = compile(&outer);
    let mid = compiled.invoke(&[Value::Int(31)]).unwrap();
    let Value::Func(mid) = mid else { panic!("expected a callable") };
    let inner = mid.invoke(&[]).unwrap();
    let Value::Func(inner) = inner else { panic!("expected a callable") };
    assert_eq!(inner.invoke(&[]).unwrap(), Value::Int(31));
}

#[test]
fn test_two_lambdas_share_one_capture() {
    // (x) => (() => x)() == (() => x)(): the same free parameter is
    // captured by two nested lambdas; the capture list stays deduplicated
    // and both inner closures get threaded the live value.
    let x = ParamExpr::new("x", Ty::Int);
    let l1 = Expr::lambda(vec![], Expr::param(&x), Ty::Int);
    let l2 = Expr::lambda(vec![], Expr::param(&x), Ty::Int);
    let body = Expr::compare(
        CompareOp::Eq,
        Expr::invoke(l1, vec![]),
        Expr::invoke(l2, vec![]),
    );
    let outer = Expr::lambda(vec![x], body, Ty::Bool);
    assert_eq!(compile_and_check(&outer, &[Value::Int(12)]), Value::Bool(true));
}

#[test]
fn test_nested_lambda_with_own_parameter() {
    // (x) => (y) => y == x
    let x = ParamExpr::new("x", Ty::Int);
    let y = ParamExpr::new("y", Ty::Int);
    let inner = Expr::lambda(
        vec![y.clone()],
        Expr::compare(CompareOp::Eq, Expr::param(&y), Expr::param(&x)),
        Ty::Bool,
    );
    let outer = Expr::lambda(vec![x], inner, func_ty(vec![Ty::Int], Ty::Bool));

    let compiled = compile(&outer);
    let Value::Func(is_seven) = compiled.invoke(&[Value::Int(7)]).unwrap() else {
        panic!("expected a callable")
    };
    assert_eq!(is_seven.invoke(&[Value::Int(7)]).unwrap(), Value::Bool(true));
    assert_eq!(is_seven.invoke(&[Value::Int(8)]).unwrap(), Value::Bool(false));
}

#[test]
fn test_capture_alongside_constants() {
    // Constants come first in slot order, captured parameters after; a body
    // mixing both still reads each slot back correctly.
    let class = point_class();
    let marker = point(&class, 99);
    let x = ParamExpr::new("x", Ty::Int);
    let inner_body = Expr::compare(
        CompareOp::Eq,
        Expr::field(
            Expr::constant(marker, Ty::Class(class.clone())),
            class.field("x").unwrap(),
        ),
        Expr::param(&x),
    );
    let inner = Expr::lambda(vec![], inner_body, Ty::Bool);
    let outer = Expr::lambda(vec![x], inner, func_ty(vec![], Ty::Bool));

    let compiled = compile(&outer);
    let Value::Func(check) = compiled.invoke(&[Value::Int(99)]).unwrap() else {
        panic!("expected a callable")
    };
    assert_eq!(check.invoke(&[]).unwrap(), Value::Bool(true));
    let Value::Func(check) = compiled.invoke(&[Value::Int(7)]).unwrap() else {
        panic!("expected a callable")
    };
    assert_eq!(check.invoke(&[]).unwrap(), Value::Bool(false));
}
