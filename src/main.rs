use fastexpr::interp::Evaluator;
use fastexpr::meta::{ClassDef, Ty};
use fastexpr::tree::{CompareOp, Expr, MemberBinding, MemberSource, ParamExpr};
use fastexpr::try_compile;
use fastexpr::value::Value;

fn main() {
    // (x) => x == 1
    let x = ParamExpr::new("x", Ty::Int);
    let eq_one = Expr::lambda(
        vec![x.clone()],
        Expr::compare(CompareOp::Eq, Expr::param(&x), Expr::constant(Value::Int(1), Ty::Int)),
        Ty::Bool,
    );
    let compiled = try_compile(&eq_one).expect("supported tree");
    println!("(1 == 1) => {:?}", compiled.invoke(&[Value::Int(1)]).unwrap());
    println!("(2 == 1) => {:?}", compiled.invoke(&[Value::Int(2)]).unwrap());

    // (a, b) => new Pair { first = a, second = b }
    let pair = ClassDef::new("Pair", vec![("first", Ty::Str), ("second", Ty::Str)]);
    let first = pair.prop_backed("first", false, true, true).unwrap();
    let second = pair.prop_backed("second", false, true, true).unwrap();
    let a = ParamExpr::new("a", Ty::Str);
    let b = ParamExpr::new("b", Ty::Str);
    let make_pair = Expr::lambda(
        vec![a.clone(), b.clone()],
        Expr::member_init(
            Expr::new_obj(pair.ctor(vec![]), vec![]),
            vec![
                MemberBinding::Assign {
                    member: MemberSource::Property(first),
                    value: Expr::param(&a),
                },
                MemberBinding::Assign {
                    member: MemberSource::Property(second),
                    value: Expr::param(&b),
                },
            ],
        ),
        Ty::Class(pair.clone()),
    );
    let compiled = try_compile(&make_pair).expect("supported tree");
    let result = compiled.invoke(&[Value::str("x"), Value::str("y")]).unwrap();
    println!("pair => {:?}", result);

    // (x) => () => x, constructed per call
    let x = ParamExpr::new("x", Ty::Int);
    let inner = Expr::lambda(vec![], Expr::param(&x), Ty::Int);
    let outer = Expr::lambda(vec![x], inner, Ty::Func(std::rc::Rc::new(fastexpr::meta::FnSig {
        params: vec![],
        ret: Ty::Int,
    })));
    let compiled = try_compile(&outer).expect("supported tree");
    let adder = compiled.invoke(&[Value::Int(7)]).unwrap();
    if let Value::Func(f) = adder {
        println!("captured => {:?}", f.invoke(&[]).unwrap());
    }

    // The general evaluator agrees with the compiled result.
    let ev = Evaluator::new();
    let slow = ev.callable_of(&eq_one).expect("lambda root");
    println!("evaluator (2 == 1) => {:?}", slow.invoke(&[Value::Int(2)]).unwrap());
}
