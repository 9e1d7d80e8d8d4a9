//! Runtime values.
//!
//! Primitives live inline; objects, arrays and callables live on the
//! garbage-collected heap. Structural equality (`PartialEq`) is what tests
//! and callers compare with; the comparison opcodes use [`ref_eq`], which is
//! identity for heap values.

use std::fmt;
use std::rc::Rc;

use gc::{Finalize, Gc, GcCell, Trace};
use smallvec::SmallVec;
use thiserror::Error;

use crate::meta::{ClassDef, EnumDef, FnSig, MethodBody, MethodDef, Ty};
use crate::tree::{ExprRef, Param};
use crate::vm::method::Method;

/// A fault raised while running a compiled method or evaluating a tree.
/// Compilation itself never raises these; malformed input is allowed to
/// fault at invocation time.
#[derive(Debug, Clone, Error)]
pub enum RtError {
    #[error("null reference")]
    NullReference,
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String },
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
    #[error("parameter `{0}` is not bound")]
    UnboundParameter(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("method body fell through without returning")]
    MissingReturn,
    #[error("property `{prop}` has no {accessor}")]
    MissingAccessor { prop: String, accessor: &'static str },
    #[error("value of type {0} is not invocable")]
    NotInvokable(String),
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<String>),
    Enum(Rc<EnumDef>, i64),
    Type(Ty),
    Obj(Gc<Object>),
    Arr(Gc<ArrayObj>),
    Func(Callable),
    /// Address of an array element, produced only inside method bodies by
    /// the element-address opcode and consumed by the store-object opcode.
    ElemAddr(Gc<ArrayObj>, usize),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::new(s.to_string()))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Enum(def, _) => def.name.clone(),
            Value::Type(_) => "type".to_string(),
            Value::Obj(o) => o.class.name.clone(),
            Value::Arr(a) => format!("{}[]", a.elem.name()),
            Value::Func(c) => Ty::Func(c.sig.clone()).name(),
            Value::ElemAddr(..) => "element address".to_string(),
        }
    }

    /// The runtime type of this value, used when boxing.
    pub fn runtime_ty(&self) -> Ty {
        match self {
            Value::Null => Ty::Object,
            Value::Int(_) => Ty::Int,
            Value::Float(_) => Ty::Float,
            Value::Bool(_) => Ty::Bool,
            Value::Str(_) => Ty::Str,
            Value::Enum(def, _) => Ty::Enum(def.clone()),
            Value::Type(_) => Ty::Type,
            Value::Obj(o) => Ty::Class(o.class.clone()),
            Value::Arr(a) => Ty::Array(Rc::new(a.elem.clone())),
            Value::Func(c) => Ty::Func(c.sig.clone()),
            Value::ElemAddr(..) => Ty::Object,
        }
    }

    /// Checked-cast test: is this value assignable to `ty`?
    pub fn is_of(&self, ty: &Ty) -> bool {
        if matches!(ty, Ty::Object) {
            return true;
        }
        match (self, ty) {
            (Value::Null, _) => !ty.is_value_type(),
            (Value::Int(_), Ty::Int) => true,
            (Value::Float(_), Ty::Float) => true,
            (Value::Bool(_), Ty::Bool) => true,
            (Value::Str(_), Ty::Str) => true,
            (Value::Type(_), Ty::Type) => true,
            (Value::Enum(def, _), Ty::Enum(e)) => Rc::ptr_eq(def, e),
            (Value::Obj(o), Ty::Class(c)) => Rc::ptr_eq(&o.class, c),
            (Value::Arr(a), Ty::Array(e)) => a.elem == **e,
            (Value::Func(c), Ty::Func(s)) => *c.sig == **s,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(d, a), Value::Enum(e, b)) => Rc::ptr_eq(d, e) && a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => {
                Rc::ptr_eq(&a.class, &b.class) && *a.fields.borrow() == *b.fields.borrow()
            }
            (Value::Arr(a), Value::Arr(b)) => {
                a.elem == b.elem && *a.items.borrow() == *b.items.borrow()
            }
            (Value::Func(a), Value::Func(b)) => Gc::ptr_eq(a, b),
            (Value::ElemAddr(a, i), Value::ElemAddr(b, j)) => Gc::ptr_eq(a, b) && i == j,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Enum(def, v) => match def.variants.iter().find(|(_, val)| val == v) {
                Some((name, _)) => write!(f, "{}::{}", def.name, name),
                None => write!(f, "{}({})", def.name, v),
            },
            Value::Type(ty) => write!(f, "typeof({})", ty),
            Value::Obj(o) => {
                write!(f, "{} {{", o.class.name)?;
                for (i, v) in o.fields.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {:?}", o.class.fields[i].name, v)?;
                }
                write!(f, " }}")
            }
            Value::Arr(a) => write!(f, "{:?}", &*a.items.borrow()),
            Value::Func(c) => write!(f, "{}", Ty::Func(c.sig.clone())),
            Value::ElemAddr(_, i) => write!(f, "&[{}]", i),
        }
    }
}

impl Finalize for Value {}
unsafe impl Trace for Value {
    unsafe fn trace(&self) {
        match self {
            Value::Obj(o) => o.trace(),
            Value::Arr(a) => a.trace(),
            Value::Func(c) => c.trace(),
            Value::ElemAddr(a, _) => a.trace(),
            _ => {}
        }
    }
    unsafe fn root(&self) {
        match self {
            Value::Obj(o) => o.root(),
            Value::Arr(a) => a.root(),
            Value::Func(c) => c.root(),
            Value::ElemAddr(a, _) => a.root(),
            _ => {}
        }
    }
    unsafe fn unroot(&self) {
        match self {
            Value::Obj(o) => o.unroot(),
            Value::Arr(a) => a.unroot(),
            Value::Func(c) => c.unroot(),
            Value::ElemAddr(a, _) => a.unroot(),
            _ => {}
        }
    }
    fn finalize_glue(&self) {
        self.finalize();
        match self {
            Value::Obj(o) => o.finalize_glue(),
            Value::Arr(a) => a.finalize_glue(),
            Value::Func(c) => c.finalize_glue(),
            Value::ElemAddr(a, _) => a.finalize_glue(),
            _ => {}
        }
    }
}

/// A heap instance of a class. Fields are stored in declaration order.
pub struct Object {
    pub class: Rc<ClassDef>,
    pub fields: GcCell<Vec<Value>>,
}

impl Object {
    pub fn with_fields(class: &Rc<ClassDef>, fields: Vec<Value>) -> Gc<Object> {
        Gc::new(Object { class: class.clone(), fields: GcCell::new(fields) })
    }

    pub fn new_default(class: &Rc<ClassDef>) -> Gc<Object> {
        let fields = class.fields.iter().map(|f| f.ty.default_value()).collect();
        Self::with_fields(class, fields)
    }
}

impl Finalize for Object {}
unsafe impl Trace for Object {
    unsafe fn trace(&self) {
        self.fields.trace();
    }
    unsafe fn root(&self) {
        self.fields.root();
    }
    unsafe fn unroot(&self) {
        self.fields.unroot();
    }
    fn finalize_glue(&self) {
        self.finalize();
        self.fields.finalize_glue();
    }
}

/// A single-dimensional array with a fixed element type.
pub struct ArrayObj {
    pub elem: Ty,
    pub items: GcCell<Vec<Value>>,
}

impl ArrayObj {
    pub fn of(elem: Ty, items: Vec<Value>) -> Gc<ArrayObj> {
        Gc::new(ArrayObj { elem, items: GcCell::new(items) })
    }
}

impl Finalize for ArrayObj {}
unsafe impl Trace for ArrayObj {
    unsafe fn trace(&self) {
        self.items.trace();
    }
    unsafe fn root(&self) {
        self.items.root();
    }
    unsafe fn unroot(&self) {
        self.items.unroot();
    }
    fn finalize_glue(&self) {
        self.finalize();
        self.items.finalize_glue();
    }
}

/// An invocable value: a compiled method bound to an optional closure
/// object, or a tree-backed function from the general evaluator.
pub struct CallableObj {
    pub sig: Rc<FnSig>,
    pub target: Option<Value>,
    pub body: CallableBody,
}

pub type Callable = Gc<CallableObj>;

pub enum CallableBody {
    Method(Rc<Method>),
    Tree(TreeFn),
}

/// A lambda evaluated by the general evaluator, with its captured
/// environment snapshot.
pub struct TreeFn {
    pub params: Vec<Param>,
    pub body: ExprRef,
    pub env: Vec<(Param, Value)>,
}

impl CallableObj {
    pub fn invoke(&self, args: &[Value]) -> Result<Value, RtError> {
        if args.len() != self.sig.params.len() {
            return Err(RtError::ArityMismatch {
                expected: self.sig.params.len(),
                got: args.len(),
            });
        }
        match &self.body {
            CallableBody::Method(method) => {
                let mut full: SmallVec<[Value; 4]> = SmallVec::new();
                if let Some(target) = &self.target {
                    full.push(target.clone());
                }
                full.extend(args.iter().cloned());
                crate::vm::exec::run(method, &full)
            }
            CallableBody::Tree(tree) => crate::interp::call_tree(tree, args),
        }
    }
}

impl Finalize for CallableObj {}
unsafe impl Trace for CallableObj {
    unsafe fn trace(&self) {
        self.target.trace();
        if let CallableBody::Tree(t) = &self.body {
            for (_, v) in &t.env {
                v.trace();
            }
        }
    }
    unsafe fn root(&self) {
        self.target.root();
        if let CallableBody::Tree(t) = &self.body {
            for (_, v) in &t.env {
                v.root();
            }
        }
    }
    unsafe fn unroot(&self) {
        self.target.unroot();
        if let CallableBody::Tree(t) = &self.body {
            for (_, v) in &t.env {
                v.unroot();
            }
        }
    }
    fn finalize_glue(&self) {
        self.finalize();
        self.target.finalize_glue();
        if let CallableBody::Tree(t) = &self.body {
            for (_, v) in &t.env {
                v.finalize_glue();
            }
        }
    }
}

/// Equality with the comparison-opcode discipline: primitives by value,
/// heap values by identity.
pub fn ref_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Enum(d, x), Value::Enum(e, y)) => Rc::ptr_eq(d, e) && x == y,
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Obj(x), Value::Obj(y)) => Gc::ptr_eq(x, y),
        (Value::Arr(x), Value::Arr(y)) => Gc::ptr_eq(x, y),
        (Value::Func(x), Value::Func(y)) => Gc::ptr_eq(x, y),
        _ => false,
    }
}

pub fn less_than(a: &Value, b: &Value) -> Result<bool, RtError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x < y),
        (Value::Float(x), Value::Float(y)) => Ok(x < y),
        (Value::Int(x), Value::Float(y)) => Ok((*x as f64) < *y),
        (Value::Float(x), Value::Int(y)) => Ok(*x < *y as f64),
        (Value::Enum(d, x), Value::Enum(e, y)) if Rc::ptr_eq(d, e) => Ok(x < y),
        _ => Err(RtError::TypeMismatch {
            expected: "comparable operands".to_string(),
            got: format!("{} and {}", a.type_name(), b.type_name()),
        }),
    }
}

pub fn greater_than(a: &Value, b: &Value) -> Result<bool, RtError> {
    less_than(b, a)
}

/// Applies a method handle to already-evaluated arguments (receiver first
/// for instance methods). Shared by the dispatch loop and the evaluator.
pub fn invoke_method(method: &MethodDef, args: &[Value]) -> Result<Value, RtError> {
    match &method.body {
        MethodBody::Native(f) => f(args),
        MethodBody::FieldGet(i) => {
            let obj = receiver_obj(args)?;
            let fields = obj.fields.borrow();
            fields.get(*i).cloned().ok_or(RtError::IndexOutOfRange {
                index: *i as i64,
                len: fields.len(),
            })
        }
        MethodBody::FieldSet(i) => {
            let value = args.get(1).cloned().ok_or(RtError::StackUnderflow)?;
            let obj = receiver_obj(args)?;
            let mut fields = obj.fields.borrow_mut();
            let len = fields.len();
            match fields.get_mut(*i) {
                Some(slot) => {
                    *slot = value;
                    Ok(Value::Null)
                }
                None => Err(RtError::IndexOutOfRange { index: *i as i64, len }),
            }
        }
        MethodBody::CallableInvoke => {
            let callable = receiver_callable(args)?;
            callable.invoke(&args[1..])
        }
        MethodBody::CallableTarget => {
            let callable = receiver_callable(args)?;
            Ok(callable.target.clone().unwrap_or(Value::Null))
        }
        MethodBody::TypeFromHandle => args.first().cloned().ok_or(RtError::StackUnderflow),
    }
}

fn receiver_obj(args: &[Value]) -> Result<&Gc<Object>, RtError> {
    match args.first() {
        Some(Value::Obj(o)) => Ok(o),
        Some(Value::Null) | None => Err(RtError::NullReference),
        Some(v) => Err(RtError::TypeMismatch {
            expected: "object instance".to_string(),
            got: v.type_name(),
        }),
    }
}

fn receiver_callable(args: &[Value]) -> Result<&Callable, RtError> {
    match args.first() {
        Some(Value::Func(c)) => Ok(c),
        Some(Value::Null) | None => Err(RtError::NullReference),
        Some(v) => Err(RtError::NotInvokable(v.type_name())),
    }
}
