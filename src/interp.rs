//! The general tree evaluator.
//!
//! This is the slow path the fast compiler falls back to: it walks the tree
//! directly and accepts a wider grammar than the compiler (arithmetic,
//! conditionals, nested member bindings). Tests also use it as the oracle
//! the compiled engine is checked against.

use std::rc::Rc;

use gc::Gc;

use crate::meta::FnSig;
use crate::tree::{ArithOp, CompareOp, Expr, ExprRef, MemberBinding, MemberSource, Param};
use crate::value::{
    greater_than, invoke_method, less_than, ref_eq, ArrayObj, CallableBody, CallableObj, Object,
    RtError, TreeFn, Value,
};

pub type Env = Vec<(Param, Value)>;

pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Evaluator {
        Evaluator
    }

    /// Wrap a lambda tree as an invocable value without compiling it.
    /// Returns `None` when the root is not a lambda.
    pub fn callable_of(&self, lambda: &ExprRef) -> Option<crate::value::Callable> {
        let Expr::Lambda { params, body, ret } = &**lambda else {
            return None;
        };
        let sig = Rc::new(FnSig {
            params: params.iter().map(|p| p.ty.clone()).collect(),
            ret: ret.clone(),
        });
        Some(Gc::new(CallableObj {
            sig,
            target: None,
            body: CallableBody::Tree(TreeFn {
                params: params.clone(),
                body: body.clone(),
                env: Vec::new(),
            }),
        }))
    }

    pub fn eval(&self, expr: &ExprRef, env: &Env) -> Result<Value, RtError> {
        eval_expr(expr, env)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a tree-backed callable: rebind its parameters over the captured
/// environment snapshot and evaluate the body.
pub(crate) fn call_tree(tree: &TreeFn, args: &[Value]) -> Result<Value, RtError> {
    let mut env = tree.env.clone();
    for (p, v) in tree.params.iter().zip(args) {
        env.push((p.clone(), v.clone()));
    }
    eval_expr(&tree.body, &env)
}

fn eval_expr(expr: &ExprRef, env: &Env) -> Result<Value, RtError> {
    match &**expr {
        Expr::Parameter(p) => env
            .iter()
            .rev()
            .find(|(q, _)| Rc::ptr_eq(q, p))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RtError::UnboundParameter(p.name.clone())),
        Expr::Constant { value, .. } => Ok(value.clone()),
        Expr::Convert { operand, target } => {
            let v = eval_expr(operand, env)?;
            if !v.is_of(target) {
                return Err(RtError::InvalidCast { from: v.type_name(), to: target.name() });
            }
            Ok(v)
        }
        Expr::ArrayIndex { array, index } => {
            let arr = eval_expr(array, env)?;
            let idx = eval_expr(index, env)?;
            match (arr, idx) {
                (Value::Arr(a), Value::Int(i)) => {
                    let items = a.items.borrow();
                    if i < 0 || i as usize >= items.len() {
                        Err(RtError::IndexOutOfRange { index: i, len: items.len() })
                    } else {
                        Ok(items[i as usize].clone())
                    }
                }
                (Value::Null, _) => Err(RtError::NullReference),
                (a, _) => Err(RtError::TypeMismatch {
                    expected: "array".to_string(),
                    got: a.type_name(),
                }),
            }
        }
        Expr::New { ctor, args } => {
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                vals.push(eval_expr(a, env)?);
            }
            let obj = Object::new_default(&ctor.class);
            {
                let mut fields = obj.fields.borrow_mut();
                for (value, &field_index) in vals.into_iter().zip(&ctor.field_map) {
                    fields[field_index] = value;
                }
            }
            Ok(Value::Obj(obj))
        }
        Expr::NewArrayInit { elem, items } => {
            let mut vals = Vec::with_capacity(items.len());
            for item in items {
                vals.push(eval_expr(item, env)?);
            }
            Ok(Value::Arr(ArrayObj::of(elem.clone(), vals)))
        }
        Expr::MemberInit { new, bindings } => {
            let obj = eval_expr(new, env)?;
            apply_bindings(&obj, bindings, env)?;
            Ok(obj)
        }
        Expr::Call { target, method, args } => {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            if let Some(t) = target {
                call_args.push(eval_expr(t, env)?);
            }
            for a in args {
                call_args.push(eval_expr(a, env)?);
            }
            invoke_method(method, &call_args)
        }
        Expr::Member { target, member } => {
            let receiver = match target {
                Some(t) => Some(eval_expr(t, env)?),
                None => None,
            };
            read_member(receiver.as_ref(), member)
        }
        Expr::Lambda { params, body, ret } => {
            let sig = Rc::new(FnSig {
                params: params.iter().map(|p| p.ty.clone()).collect(),
                ret: ret.clone(),
            });
            Ok(Value::Func(Gc::new(CallableObj {
                sig,
                target: None,
                body: CallableBody::Tree(TreeFn {
                    params: params.clone(),
                    body: body.clone(),
                    env: env.clone(),
                }),
            })))
        }
        Expr::Invoke { target, args } => {
            let callee = eval_expr(target, env)?;
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                vals.push(eval_expr(a, env)?);
            }
            match callee {
                Value::Func(c) => c.invoke(&vals),
                Value::Null => Err(RtError::NullReference),
                v => Err(RtError::NotInvokable(v.type_name())),
            }
        }
        Expr::Compare { op, lhs, rhs } => {
            let a = eval_expr(lhs, env)?;
            let b = eval_expr(rhs, env)?;
            let result = match op {
                CompareOp::Eq => ref_eq(&a, &b),
                CompareOp::Ne => !ref_eq(&a, &b),
                CompareOp::Lt => less_than(&a, &b)?,
                CompareOp::Gt => greater_than(&a, &b)?,
                // Complements, matching the compiled encodings bit for bit.
                CompareOp::Le => !greater_than(&a, &b)?,
                CompareOp::Ge => !less_than(&a, &b)?,
            };
            Ok(Value::Bool(result))
        }
        Expr::Arith { op, lhs, rhs } => {
            let a = eval_expr(lhs, env)?;
            let b = eval_expr(rhs, env)?;
            arith(*op, a, b)
        }
        Expr::Conditional { cond, then_branch, else_branch } => {
            match eval_expr(cond, env)? {
                Value::Bool(true) => eval_expr(then_branch, env),
                Value::Bool(false) => eval_expr(else_branch, env),
                v => Err(RtError::TypeMismatch {
                    expected: "bool".to_string(),
                    got: v.type_name(),
                }),
            }
        }
    }
}

fn apply_bindings(obj: &Value, bindings: &[MemberBinding], env: &Env) -> Result<(), RtError> {
    for binding in bindings {
        match binding {
            MemberBinding::Assign { member, value } => {
                let v = eval_expr(value, env)?;
                write_member(obj, member, v)?;
            }
            MemberBinding::Nested { member, bindings } => {
                let inner = read_member(Some(obj), member)?;
                apply_bindings(&inner, bindings, env)?;
            }
        }
    }
    Ok(())
}

fn read_member(receiver: Option<&Value>, member: &MemberSource) -> Result<Value, RtError> {
    match member {
        MemberSource::Static(s) => Ok(s.class.statics[s.index].value.borrow().clone()),
        MemberSource::Field(f) => {
            let obj = instance_of(receiver, &f.class.name)?;
            if !Rc::ptr_eq(&obj.class, &f.class) {
                return Err(RtError::TypeMismatch {
                    expected: f.class.name.clone(),
                    got: obj.class.name.clone(),
                });
            }
            Ok(obj.fields.borrow()[f.index].clone())
        }
        MemberSource::Property(p) => {
            let getter = p.getter.clone().ok_or_else(|| RtError::MissingAccessor {
                prop: p.name.clone(),
                accessor: "getter",
            })?;
            let receiver = receiver.cloned().ok_or(RtError::NullReference)?;
            invoke_method(&getter, &[receiver])
        }
    }
}

fn write_member(obj: &Value, member: &MemberSource, value: Value) -> Result<(), RtError> {
    match member {
        MemberSource::Static(s) => {
            *s.class.statics[s.index].value.borrow_mut() = value;
            Ok(())
        }
        MemberSource::Field(f) => {
            let instance = instance_of(Some(obj), &f.class.name)?;
            if !Rc::ptr_eq(&instance.class, &f.class) {
                return Err(RtError::TypeMismatch {
                    expected: f.class.name.clone(),
                    got: instance.class.name.clone(),
                });
            }
            instance.fields.borrow_mut()[f.index] = value;
            Ok(())
        }
        MemberSource::Property(p) => {
            let setter = p.setter.clone().ok_or_else(|| RtError::MissingAccessor {
                prop: p.name.clone(),
                accessor: "setter",
            })?;
            invoke_method(&setter, &[obj.clone(), value])?;
            Ok(())
        }
    }
}

fn instance_of<'a>(receiver: Option<&'a Value>, class_name: &str) -> Result<&'a Gc<Object>, RtError> {
    match receiver {
        Some(Value::Obj(o)) => Ok(o),
        Some(Value::Null) | None => Err(RtError::NullReference),
        Some(v) => Err(RtError::TypeMismatch {
            expected: class_name.to_string(),
            got: v.type_name(),
        }),
    }
}

fn arith(op: ArithOp, a: Value, b: Value) -> Result<Value, RtError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => match op {
            ArithOp::Add => Ok(Value::Int(x.wrapping_add(y))),
            ArithOp::Sub => Ok(Value::Int(x.wrapping_sub(y))),
            ArithOp::Mul => Ok(Value::Int(x.wrapping_mul(y))),
            ArithOp::Div => {
                if y == 0 {
                    Err(RtError::DivisionByZero)
                } else {
                    Ok(Value::Int(x.wrapping_div(y)))
                }
            }
        },
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(apply_float(op, x, y))),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(apply_float(op, x as f64, y))),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(apply_float(op, x, y as f64))),
        (a, b) => Err(RtError::TypeMismatch {
            expected: "numeric operands".to_string(),
            got: format!("{} and {}", a.type_name(), b.type_name()),
        }),
    }
}

fn apply_float(op: ArithOp, x: f64, y: f64) -> f64 {
    match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
    }
}
