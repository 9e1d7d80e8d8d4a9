use fastexpr::meta::{ClassDef, Ty};
use fastexpr::tree::{ArithOp, Expr, MemberBinding, MemberSource, ParamExpr};
use fastexpr::try_compile;
use fastexpr::value::Value;

mod common;
use common::{eval_reference, point_class};

#[test]
fn test_arithmetic_falls_back() {
    // (x) => x + 1 is outside the supported subset; the fast path refuses
    // and the general evaluator picks it up.
    let x = ParamExpr::new("x", Ty::Int);
    let lambda = Expr::lambda(
        vec![x.clone()],
        Expr::arith(ArithOp::Add, Expr::param(&x), Expr::constant(Value::Int(1), Ty::Int)),
        Ty::Int,
    );
    assert!(try_compile(&lambda).is_none());
    assert_eq!(eval_reference(&lambda, &[Value::Int(2)]), Value::Int(3));
}

#[test]
fn test_conditional_falls_back() {
    let c = ParamExpr::new("c", Ty::Bool);
    let lambda = Expr::lambda(
        vec![c.clone()],
        Expr::conditional(
            Expr::param(&c),
            Expr::constant(Value::Int(1), Ty::Int),
            Expr::constant(Value::Int(2), Ty::Int),
        ),
        Ty::Int,
    );
    assert!(try_compile(&lambda).is_none());
    assert_eq!(eval_reference(&lambda, &[Value::Bool(false)]), Value::Int(2));
}

#[test]
fn test_unsupported_node_inside_nested_lambda_propagates() {
    // The nested compile fails, so the whole tree is unsupported.
    let x = ParamExpr::new("x", Ty::Int);
    let inner = Expr::lambda(
        vec![],
        Expr::arith(ArithOp::Mul, Expr::param(&x), Expr::param(&x)),
        Ty::Int,
    );
    let outer = Expr::lambda(vec![x], inner, Ty::Object);
    assert!(try_compile(&outer).is_none());
}

#[test]
fn test_non_assignment_binding_falls_back() {
    let inner_class = point_class();
    let outer_class = ClassDef::new("Wrapper", vec![("inner", Ty::Class(inner_class.clone()))]);
    let lambda = Expr::lambda(
        vec![],
        Expr::member_init(
            Expr::new_obj(outer_class.ctor(vec![]), vec![]),
            vec![MemberBinding::Nested {
                member: MemberSource::Field(outer_class.field("inner").unwrap()),
                bindings: vec![MemberBinding::Assign {
                    member: MemberSource::Field(inner_class.field("x").unwrap()),
                    value: Expr::constant(Value::Int(1), Ty::Int),
                }],
            }],
        ),
        Ty::Class(outer_class.clone()),
    );
    assert!(try_compile(&lambda).is_none());
}

#[test]
fn test_convert_to_object_falls_back() {
    let x = ParamExpr::new("x", Ty::Str);
    let lambda = Expr::lambda(
        vec![x.clone()],
        Expr::convert(Expr::param(&x), Ty::Object),
        Ty::Object,
    );
    assert!(try_compile(&lambda).is_none());
    // The general evaluator treats the upcast as identity.
    assert_eq!(eval_reference(&lambda, &[Value::str("s")]), Value::str("s"));
}

#[test]
fn test_property_without_getter_falls_back() {
    let class = point_class();
    let write_only = class.prop_backed("x", false, false, true).unwrap();
    let p = ParamExpr::new("p", Ty::Class(class.clone()));
    let lambda = Expr::lambda(
        vec![p.clone()],
        Expr::property(Expr::param(&p), write_only),
        Ty::Int,
    );
    assert!(try_compile(&lambda).is_none());
}

#[test]
fn test_property_without_setter_falls_back() {
    let class = point_class();
    let read_only = class.prop_backed("x", false, true, false).unwrap();
    let lambda = Expr::lambda(
        vec![],
        Expr::member_init(
            Expr::new_obj(class.ctor(vec![]), vec![]),
            vec![MemberBinding::Assign {
                member: MemberSource::Property(read_only),
                value: Expr::constant(Value::Int(1), Ty::Int),
            }],
        ),
        Ty::Class(class.clone()),
    );
    assert!(try_compile(&lambda).is_none());
}

#[test]
fn test_non_lambda_root_falls_back() {
    let not_a_lambda = Expr::constant(Value::Int(1), Ty::Int);
    assert!(try_compile(&not_a_lambda).is_none());
}
