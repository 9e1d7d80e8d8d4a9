use std::rc::Rc;

use proptest::prelude::*;

use fastexpr::meta::Ty;
use fastexpr::tree::{CompareOp, Expr, ParamExpr};
use fastexpr::try_compile;
use fastexpr::value::{ArrayObj, Value};

mod common;
use common::{compile_and_check, point, point_class};

fn compare_ops() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
    ]
}

fn expected_compare(op: CompareOp, a: i64, b: i64) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    }
}

proptest! {
    /// Compiled comparisons agree with the evaluator and with plain Rust
    /// over the full integer range.
    #[test]
    fn prop_comparisons_match_the_evaluator(
        a in any::<i64>(),
        b in any::<i64>(),
        op in compare_ops(),
    ) {
        let pa = ParamExpr::new("a", Ty::Int);
        let pb = ParamExpr::new("b", Ty::Int);
        let lambda = Expr::lambda(
            vec![pa.clone(), pb.clone()],
            Expr::compare(op, Expr::param(&pa), Expr::param(&pb)),
            Ty::Bool,
        );
        let result = compile_and_check(&lambda, &[Value::Int(a), Value::Int(b)]);
        prop_assert_eq!(result, Value::Bool(expected_compare(op, a, b)));
    }

    /// Inline integer constants of every encoding form survive the trip
    /// through an array literal unchanged.
    #[test]
    fn prop_int_arrays_round_trip(values in proptest::collection::vec(any::<i64>(), 0..20)) {
        let items = values.iter().map(|v| Expr::constant(Value::Int(*v), Ty::Int)).collect();
        let lambda = Expr::lambda(
            vec![],
            Expr::new_array(Ty::Int, items),
            Ty::Array(Rc::new(Ty::Int)),
        );
        let expected = Value::Arr(ArrayObj::of(
            Ty::Int,
            values.iter().map(|v| Value::Int(*v)).collect(),
        ));
        prop_assert_eq!(compile_and_check(&lambda, &[]), expected);
    }

    /// Slot-order agreement: every element is a distinct non-inline
    /// constant, so slot count tracks element count and the cases cross the
    /// fixed-arity/array-slab boundary. Values must come back in analyzer
    /// order regardless of layout.
    #[test]
    fn prop_slot_order_is_preserved_across_layouts(
        values in proptest::collection::vec(any::<i64>(), 0..=16),
    ) {
        let class = point_class();
        let items: Vec<_> = values
            .iter()
            .map(|v| Expr::constant(point(&class, *v), Ty::Class(class.clone())))
            .collect();
        let lambda = Expr::lambda(
            vec![],
            Expr::new_array(Ty::Class(class.clone()), items),
            Ty::Array(Rc::new(Ty::Class(class.clone()))),
        );
        let result = compile_and_check(&lambda, &[]);
        let arr = match result {
            Value::Arr(a) => a,
            other => panic!("expected an array, got {:?}", other),
        };
        let got = arr.items.borrow();
        prop_assert_eq!(got.len(), values.len());
        for (item, v) in got.iter().zip(&values) {
            prop_assert_eq!(item, &point(&class, *v));
        }
    }

    /// Compiling the same tree twice yields functionally equal callables.
    #[test]
    fn prop_recompiling_gives_equivalent_callables(
        a in any::<i64>(),
        b in any::<i64>(),
        op in compare_ops(),
    ) {
        let pa = ParamExpr::new("a", Ty::Int);
        let pb = ParamExpr::new("b", Ty::Int);
        let lambda = Expr::lambda(
            vec![pa.clone(), pb.clone()],
            Expr::compare(op, Expr::param(&pa), Expr::param(&pb)),
            Ty::Bool,
        );
        let first = try_compile(&lambda).expect("supported");
        let second = try_compile(&lambda).expect("supported");
        let args = [Value::Int(a), Value::Int(b)];
        prop_assert_eq!(
            first.invoke(&args).expect("invoke"),
            second.invoke(&args).expect("invoke")
        );
    }
}
