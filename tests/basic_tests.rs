use std::rc::Rc;

use fastexpr::meta::{FnSig, Ty};
use fastexpr::tree::{CompareOp, Expr, ParamExpr};
use fastexpr::try_compile;
use fastexpr::value::Value;

mod common;
use common::{color_enum, compile, compile_and_check};

#[test]
fn test_constant_body() {
    // () => 42
    let lambda = Expr::lambda(vec![], Expr::constant(Value::Int(42), Ty::Int), Ty::Int);
    let result = compile_and_check(&lambda, &[]);
    assert_eq!(result, Value::Int(42));

    // Inline-encodable constants never allocate a closure.
    let compiled = compile(&lambda);
    assert!(compiled.target.is_none());
}

#[test]
fn test_inline_constant_kinds() {
    let cases = vec![
        (Expr::constant(Value::Float(2.5), Ty::Float), Ty::Float, Value::Float(2.5)),
        (Expr::constant(Value::Bool(true), Ty::Bool), Ty::Bool, Value::Bool(true)),
        (Expr::constant(Value::str("hi"), Ty::Str), Ty::Str, Value::str("hi")),
        (Expr::constant(Value::Null, Ty::Object), Ty::Object, Value::Null),
        (Expr::constant(Value::Type(Ty::Int), Ty::Type), Ty::Type, Value::Type(Ty::Int)),
        (Expr::constant(Value::Int(-1), Ty::Int), Ty::Int, Value::Int(-1)),
        (Expr::constant(Value::Int(300), Ty::Int), Ty::Int, Value::Int(300)),
        (Expr::constant(Value::Int(1 << 40), Ty::Int), Ty::Int, Value::Int(1 << 40)),
    ];
    for (body, ret, expected) in cases {
        let lambda = Expr::lambda(vec![], body, ret);
        assert_eq!(compile_and_check(&lambda, &[]), expected);
        assert!(compile(&lambda).target.is_none());
    }

    let color = color_enum();
    let lambda = Expr::lambda(
        vec![],
        Expr::constant(Value::Enum(color.clone(), 2), Ty::Enum(color.clone())),
        Ty::Enum(color.clone()),
    );
    assert_eq!(compile_and_check(&lambda, &[]), Value::Enum(color, 2));
}

#[test]
fn test_param_eq_constant() {
    // (x) => x == 1
    let x = ParamExpr::new("x", Ty::Int);
    let lambda = Expr::lambda(
        vec![x.clone()],
        Expr::compare(CompareOp::Eq, Expr::param(&x), Expr::constant(Value::Int(1), Ty::Int)),
        Ty::Bool,
    );
    assert_eq!(compile_and_check(&lambda, &[Value::Int(1)]), Value::Bool(true));
    assert_eq!(compile_and_check(&lambda, &[Value::Int(2)]), Value::Bool(false));
    assert!(compile(&lambda).target.is_none());
}

#[test]
fn test_all_comparisons() {
    let ops = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ];
    for op in ops {
        let a = ParamExpr::new("a", Ty::Int);
        let b = ParamExpr::new("b", Ty::Int);
        let lambda = Expr::lambda(
            vec![a.clone(), b.clone()],
            Expr::compare(op, Expr::param(&a), Expr::param(&b)),
            Ty::Bool,
        );
        for (x, y) in [(1, 2), (2, 1), (3, 3), (-5, 5)] {
            let expected = match op {
                CompareOp::Eq => x == y,
                CompareOp::Ne => x != y,
                CompareOp::Lt => x < y,
                CompareOp::Le => x <= y,
                CompareOp::Gt => x > y,
                CompareOp::Ge => x >= y,
            };
            assert_eq!(
                compile_and_check(&lambda, &[Value::Int(x), Value::Int(y)]),
                Value::Bool(expected),
                "{:?} on ({}, {})",
                op,
                x,
                y
            );
        }
    }
}

#[test]
fn test_float_comparison() {
    let a = ParamExpr::new("a", Ty::Float);
    let lambda = Expr::lambda(
        vec![a.clone()],
        Expr::compare(CompareOp::Lt, Expr::param(&a), Expr::constant(Value::Float(1.5), Ty::Float)),
        Ty::Bool,
    );
    assert_eq!(compile_and_check(&lambda, &[Value::Float(1.0)]), Value::Bool(true));
    assert_eq!(compile_and_check(&lambda, &[Value::Float(2.0)]), Value::Bool(false));
}

#[test]
fn test_string_equality() {
    let s = ParamExpr::new("s", Ty::Str);
    let lambda = Expr::lambda(
        vec![s.clone()],
        Expr::compare(CompareOp::Eq, Expr::param(&s), Expr::constant(Value::str("yes"), Ty::Str)),
        Ty::Bool,
    );
    assert_eq!(compile_and_check(&lambda, &[Value::str("yes")]), Value::Bool(true));
    assert_eq!(compile_and_check(&lambda, &[Value::str("no")]), Value::Bool(false));
}

#[test]
fn test_argument_numbering_without_closure() {
    // Six parameters, body returns the last; exercises the short-form
    // argument load with no closure shift.
    let params: Vec<_> = (0..6).map(|i| ParamExpr::new(&format!("p{}", i), Ty::Int)).collect();
    let lambda = Expr::lambda(params.clone(), Expr::param(&params[5]), Ty::Int);
    let args: Vec<Value> = (0..6).map(Value::Int).collect();
    assert_eq!(compile_and_check(&lambda, &args), Value::Int(5));
}

#[test]
fn test_argument_numbering_with_closure() {
    // A non-inline constant forces the hidden closure argument, shifting
    // every declared parameter up by one; the last of five parameters still
    // reads back correctly.
    let class = common::point_class();
    let marker = common::point(&class, 4);
    let params: Vec<_> = (0..5).map(|i| ParamExpr::new(&format!("p{}", i), Ty::Int)).collect();
    let body = Expr::compare(
        CompareOp::Eq,
        Expr::param(&params[4]),
        Expr::field(
            Expr::constant(marker, Ty::Class(class.clone())),
            class.field("x").unwrap(),
        ),
    );
    let lambda = Expr::lambda(params.clone(), body, Ty::Bool);
    let args: Vec<Value> = (0..5).map(Value::Int).collect();
    assert_eq!(compile_and_check(&lambda, &args), Value::Bool(true));
    assert!(compile(&lambda).target.is_some());
}

#[test]
fn test_recompile_is_equivalent() {
    let x = ParamExpr::new("x", Ty::Int);
    let lambda = Expr::lambda(
        vec![x.clone()],
        Expr::compare(CompareOp::Ge, Expr::param(&x), Expr::constant(Value::Int(10), Ty::Int)),
        Ty::Bool,
    );
    let first = try_compile(&lambda).expect("supported");
    let second = try_compile(&lambda).expect("supported");
    for v in [-3, 9, 10, 11] {
        assert_eq!(
            first.invoke(&[Value::Int(v)]).unwrap(),
            second.invoke(&[Value::Int(v)]).unwrap()
        );
    }
}

#[test]
fn test_callable_signature() {
    let x = ParamExpr::new("x", Ty::Int);
    let lambda = Expr::lambda(vec![x.clone()], Expr::param(&x), Ty::Int);
    let compiled = compile(&lambda);
    assert_eq!(*compiled.sig, FnSig { params: vec![Ty::Int], ret: Ty::Int });
    // Wrong arity faults instead of misreading arguments.
    assert!(compiled.invoke(&[]).is_err());
}

#[test]
fn test_invoke_of_constant_callable() {
    // Pre-compile an identity function, embed it as a delegate-valued
    // constant, and invoke it. Delegate constants always take a slot.
    let x = ParamExpr::new("x", Ty::Int);
    let identity = compile(&Expr::lambda(vec![x.clone()], Expr::param(&x), Ty::Int));
    let sig = identity.sig.clone();

    let y = ParamExpr::new("y", Ty::Int);
    let lambda = Expr::lambda(
        vec![y.clone()],
        Expr::invoke(
            Expr::constant(Value::Func(identity), Ty::Func(Rc::new((*sig).clone()))),
            vec![Expr::param(&y)],
        ),
        Ty::Int,
    );
    assert_eq!(compile_and_check(&lambda, &[Value::Int(9)]), Value::Int(9));
    assert!(compile(&lambda).target.is_some());
}
