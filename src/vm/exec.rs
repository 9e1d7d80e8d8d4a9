//! Execution of finalized methods.
//!
//! The supported expression grammar contains no control flow, so a method
//! body is a straight line of instructions ending in `Ret`. Execution walks
//! the instruction stream once over an operand stack.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::meta::Ty;
use crate::value::{
    greater_than, invoke_method, less_than, ref_eq, ArrayObj, Object, RtError, Value,
};

use super::method::{Method, Op};

fn pop(stack: &mut Vec<Value>) -> Result<Value, RtError> {
    stack.pop().ok_or(RtError::StackUnderflow)
}

fn arg(args: &[Value], index: usize) -> Result<Value, RtError> {
    args.get(index).cloned().ok_or(RtError::ArityMismatch {
        expected: index + 1,
        got: args.len(),
    })
}

fn pop_array(stack: &mut Vec<Value>) -> Result<gc::Gc<ArrayObj>, RtError> {
    match pop(stack)? {
        Value::Arr(a) => Ok(a),
        Value::Null => Err(RtError::NullReference),
        v => Err(RtError::TypeMismatch { expected: "array".to_string(), got: v.type_name() }),
    }
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i64, RtError> {
    match pop(stack)? {
        Value::Int(i) => Ok(i),
        v => Err(RtError::TypeMismatch { expected: "int".to_string(), got: v.type_name() }),
    }
}

fn check_index(index: i64, len: usize) -> Result<usize, RtError> {
    if index < 0 || index as usize >= len {
        Err(RtError::IndexOutOfRange { index, len })
    } else {
        Ok(index as usize)
    }
}

/// Run a method against its full argument list (closure argument included
/// when the method is bound) and return the value left by `Ret`.
pub fn run(method: &Method, args: &[Value]) -> Result<Value, RtError> {
    if args.len() != method.params.len() {
        return Err(RtError::ArityMismatch { expected: method.params.len(), got: args.len() });
    }

    let mut stack: Vec<Value> = Vec::with_capacity(8);
    let mut locals: Vec<Value> = method.locals.iter().map(Ty::default_value).collect();

    for op in &method.ops {
        match op {
            Op::LoadArg0 => stack.push(arg(args, 0)?),
            Op::LoadArg1 => stack.push(arg(args, 1)?),
            Op::LoadArg2 => stack.push(arg(args, 2)?),
            Op::LoadArg3 => stack.push(arg(args, 3)?),
            Op::LoadArgS(i) => stack.push(arg(args, *i as usize)?),
            Op::LoadArg(i) => stack.push(arg(args, *i as usize)?),
            Op::LoadLocal(i) => match locals.get(*i as usize) {
                Some(v) => stack.push(v.clone()),
                None => return Err(RtError::IndexOutOfRange { index: *i as i64, len: locals.len() }),
            },
            Op::StoreLocal(i) => {
                let value = pop(&mut stack)?;
                match locals.get_mut(*i as usize) {
                    Some(slot) => *slot = value,
                    None => {
                        return Err(RtError::IndexOutOfRange { index: *i as i64, len: locals.len() })
                    }
                }
            }
            Op::LoadNull => stack.push(Value::Null),
            Op::LoadBool(b) => stack.push(Value::Bool(*b)),
            Op::LoadIntM1 => stack.push(Value::Int(-1)),
            Op::LoadInt0 => stack.push(Value::Int(0)),
            Op::LoadInt1 => stack.push(Value::Int(1)),
            Op::LoadInt2 => stack.push(Value::Int(2)),
            Op::LoadInt3 => stack.push(Value::Int(3)),
            Op::LoadInt4 => stack.push(Value::Int(4)),
            Op::LoadInt5 => stack.push(Value::Int(5)),
            Op::LoadInt6 => stack.push(Value::Int(6)),
            Op::LoadInt7 => stack.push(Value::Int(7)),
            Op::LoadInt8 => stack.push(Value::Int(8)),
            Op::LoadIntS(v) => stack.push(Value::Int(*v as i64)),
            Op::LoadInt(v) => stack.push(Value::Int(*v)),
            Op::LoadFloat(v) => stack.push(Value::Float(*v)),
            Op::LoadStr(s) => stack.push(Value::Str(s.clone())),
            Op::LoadEnum(def, v) => stack.push(Value::Enum(def.clone(), *v)),
            Op::LoadToken(ty) => stack.push(Value::Type(ty.clone())),
            // Values are uniformly represented, so boxing is a type-level
            // transition with no payload change.
            Op::Box(_) => {}
            Op::CastClass(ty) => {
                let top = stack.last().ok_or(RtError::StackUnderflow)?;
                if !top.is_of(ty) {
                    return Err(RtError::InvalidCast { from: top.type_name(), to: ty.name() });
                }
            }
            Op::NewArr(elem) => {
                let len = pop_int(&mut stack)?;
                if len < 0 {
                    return Err(RtError::IndexOutOfRange { index: len, len: 0 });
                }
                let items = (0..len).map(|_| elem.default_value()).collect();
                stack.push(Value::Arr(ArrayObj::of(elem.clone(), items)));
            }
            Op::NewObj(ctor) => {
                let argc = ctor.params.len();
                if stack.len() < argc {
                    return Err(RtError::StackUnderflow);
                }
                let ctor_args: SmallVec<[Value; 4]> = stack.drain(stack.len() - argc..).collect();
                let obj = Object::new_default(&ctor.class);
                {
                    let mut fields = obj.fields.borrow_mut();
                    for (value, &field_index) in ctor_args.into_iter().zip(&ctor.field_map) {
                        fields[field_index] = value;
                    }
                }
                stack.push(Value::Obj(obj));
            }
            Op::LoadElem => {
                let index = pop_int(&mut stack)?;
                let array = pop_array(&mut stack)?;
                let items = array.items.borrow();
                let i = check_index(index, items.len())?;
                stack.push(items[i].clone());
            }
            Op::LoadElemAddr => {
                let index = pop_int(&mut stack)?;
                let array = pop_array(&mut stack)?;
                let i = check_index(index, array.items.borrow().len())?;
                stack.push(Value::ElemAddr(array, i));
            }
            Op::StoreElem => {
                let value = pop(&mut stack)?;
                let index = pop_int(&mut stack)?;
                let array = pop_array(&mut stack)?;
                let mut items = array.items.borrow_mut();
                let i = check_index(index, items.len())?;
                items[i] = value;
            }
            Op::StoreObj(_) => {
                let value = pop(&mut stack)?;
                match pop(&mut stack)? {
                    Value::ElemAddr(array, i) => {
                        let mut items = array.items.borrow_mut();
                        let len = items.len();
                        match items.get_mut(i) {
                            Some(slot) => *slot = value,
                            None => return Err(RtError::IndexOutOfRange { index: i as i64, len }),
                        }
                    }
                    v => {
                        return Err(RtError::TypeMismatch {
                            expected: "element address".to_string(),
                            got: v.type_name(),
                        })
                    }
                }
            }
            Op::LoadField(field) => {
                let obj = match pop(&mut stack)? {
                    Value::Obj(o) => o,
                    Value::Null => return Err(RtError::NullReference),
                    v => {
                        return Err(RtError::TypeMismatch {
                            expected: field.class.name.clone(),
                            got: v.type_name(),
                        })
                    }
                };
                if !Rc::ptr_eq(&obj.class, &field.class) {
                    return Err(RtError::TypeMismatch {
                        expected: field.class.name.clone(),
                        got: obj.class.name.clone(),
                    });
                }
                let fields = obj.fields.borrow();
                stack.push(fields[field.index].clone());
            }
            Op::StoreField(field) => {
                let value = pop(&mut stack)?;
                let obj = match pop(&mut stack)? {
                    Value::Obj(o) => o,
                    Value::Null => return Err(RtError::NullReference),
                    v => {
                        return Err(RtError::TypeMismatch {
                            expected: field.class.name.clone(),
                            got: v.type_name(),
                        })
                    }
                };
                if !Rc::ptr_eq(&obj.class, &field.class) {
                    return Err(RtError::TypeMismatch {
                        expected: field.class.name.clone(),
                        got: obj.class.name.clone(),
                    });
                }
                obj.fields.borrow_mut()[field.index] = value;
            }
            Op::LoadStatic(field) => {
                let value = field.class.statics[field.index].value.borrow().clone();
                stack.push(value);
            }
            Op::StoreStatic(field) => {
                let value = pop(&mut stack)?;
                *field.class.statics[field.index].value.borrow_mut() = value;
            }
            Op::Call(m) | Op::CallVirt(m) => {
                let receiver = if m.is_static { 0 } else { 1 };
                let argc = m.params.len() + receiver;
                if stack.len() < argc {
                    return Err(RtError::StackUnderflow);
                }
                let call_args: SmallVec<[Value; 4]> = stack.drain(stack.len() - argc..).collect();
                if matches!(op, Op::CallVirt(_))
                    && receiver == 1
                    && matches!(call_args[0], Value::Null)
                {
                    return Err(RtError::NullReference);
                }
                let ret = invoke_method(m, &call_args)?;
                if m.ret != Ty::Void {
                    stack.push(ret);
                }
            }
            Op::Ceq => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(Value::Bool(ref_eq(&a, &b)));
            }
            Op::Clt => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(Value::Bool(less_than(&a, &b)?));
            }
            Op::Cgt => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(Value::Bool(greater_than(&a, &b)?));
            }
            Op::Dup => {
                let top = stack.last().ok_or(RtError::StackUnderflow)?.clone();
                stack.push(top);
            }
            Op::Ret => return pop(&mut stack),
        }
    }

    Err(RtError::MissingReturn)
}
