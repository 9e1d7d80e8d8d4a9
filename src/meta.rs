//! Runtime type and member metadata.
//!
//! The compiler addresses fields, properties, constructors and methods
//! through the handle types defined here, and asks types the questions it
//! needs for emission (`is_value_type`, `is_enum`). Classes expose their
//! fields as an explicit ordered list, so slot-to-field resolution never
//! depends on enumeration order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::value::{RtError, Value};

/// A runtime type descriptor.
#[derive(Clone)]
pub enum Ty {
    Void,
    Int,
    Float,
    Bool,
    Str,
    /// The universal reference type; everything is assignable to it.
    Object,
    /// The reified-type type: values are type descriptors themselves.
    Type,
    Enum(Rc<EnumDef>),
    Class(Rc<ClassDef>),
    Array(Rc<Ty>),
    Func(Rc<FnSig>),
}

impl Ty {
    pub fn is_value_type(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float | Ty::Bool | Ty::Enum(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Ty::Enum(_))
    }

    /// The zero value of this type, used to pre-fill captured slots and
    /// fresh locals.
    pub fn default_value(&self) -> Value {
        match self {
            Ty::Int => Value::Int(0),
            Ty::Float => Value::Float(0.0),
            Ty::Bool => Value::Bool(false),
            Ty::Enum(def) => Value::Enum(def.clone(), 0),
            _ => Value::Null,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Ty::Void => "void".to_string(),
            Ty::Int => "int".to_string(),
            Ty::Float => "float".to_string(),
            Ty::Bool => "bool".to_string(),
            Ty::Str => "string".to_string(),
            Ty::Object => "object".to_string(),
            Ty::Type => "type".to_string(),
            Ty::Enum(def) => def.name.clone(),
            Ty::Class(def) => def.name.clone(),
            Ty::Array(elem) => format!("{}[]", elem.name()),
            Ty::Func(sig) => {
                let params: Vec<String> = sig.params.iter().map(Ty::name).collect();
                format!("fn({}) -> {}", params.join(", "), sig.ret.name())
            }
        }
    }
}

impl PartialEq for Ty {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Ty::Void, Ty::Void)
            | (Ty::Int, Ty::Int)
            | (Ty::Float, Ty::Float)
            | (Ty::Bool, Ty::Bool)
            | (Ty::Str, Ty::Str)
            | (Ty::Object, Ty::Object)
            | (Ty::Type, Ty::Type) => true,
            (Ty::Enum(a), Ty::Enum(b)) => Rc::ptr_eq(a, b),
            (Ty::Class(a), Ty::Class(b)) => Rc::ptr_eq(a, b),
            (Ty::Array(a), Ty::Array(b)) => a == b,
            (Ty::Func(a), Ty::Func(b)) => **a == **b,
            _ => false,
        }
    }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The signature of a callable value.
#[derive(Clone, Debug, PartialEq)]
pub struct FnSig {
    pub params: Vec<Ty>,
    pub ret: Ty,
}

/// An enumeration type: named constants over an integer underlying type.
#[derive(Debug)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: &str, variants: &[(&str, i64)]) -> Rc<EnumDef> {
        Rc::new(EnumDef {
            name: name.to_string(),
            variants: variants.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
        })
    }
}

/// An instance field declaration.
#[derive(Debug)]
pub struct FieldDef {
    pub name: String,
    pub ty: Ty,
}

/// A static field with its storage.
pub struct StaticFieldDef {
    pub name: String,
    pub ty: Ty,
    pub value: RefCell<Value>,
}

/// A reference-type blueprint: named, with fields in declaration order.
pub struct ClassDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub statics: Vec<StaticFieldDef>,
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.name)
    }
}

impl ClassDef {
    pub fn new(name: &str, fields: Vec<(&str, Ty)>) -> Rc<ClassDef> {
        Self::with_statics(name, fields, Vec::new())
    }

    pub fn with_statics(
        name: &str,
        fields: Vec<(&str, Ty)>,
        statics: Vec<(&str, Ty, Value)>,
    ) -> Rc<ClassDef> {
        Rc::new(ClassDef {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(n, ty)| FieldDef { name: n.to_string(), ty })
                .collect(),
            statics: statics
                .into_iter()
                .map(|(n, ty, value)| StaticFieldDef {
                    name: n.to_string(),
                    ty,
                    value: RefCell::new(value),
                })
                .collect(),
        })
    }

    pub fn field(self: &Rc<Self>, name: &str) -> Option<FieldRef> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(FieldRef { class: self.clone(), index })
    }

    pub fn field_at(self: &Rc<Self>, index: usize) -> FieldRef {
        FieldRef { class: self.clone(), index }
    }

    pub fn static_field(self: &Rc<Self>, name: &str) -> Option<StaticFieldRef> {
        let index = self.statics.iter().position(|f| f.name == name)?;
        Some(StaticFieldRef { class: self.clone(), index })
    }

    /// A constructor whose i-th argument is stored into field `field_map[i]`;
    /// unmapped fields start at their type's zero value.
    pub fn ctor(self: &Rc<Self>, field_map: Vec<usize>) -> CtorRef {
        let params = field_map.iter().map(|&i| self.fields[i].ty.clone()).collect();
        Rc::new(CtorDef { class: self.clone(), params, field_map })
    }

    /// A property backed by the named field, with the requested accessors.
    pub fn prop_backed(
        self: &Rc<Self>,
        field_name: &str,
        is_virtual: bool,
        with_getter: bool,
        with_setter: bool,
    ) -> Option<PropRef> {
        let index = self.fields.iter().position(|f| f.name == field_name)?;
        let ty = self.fields[index].ty.clone();
        let getter = with_getter.then(|| {
            Rc::new(MethodDef {
                name: format!("get_{}", field_name),
                is_static: false,
                is_virtual,
                params: Vec::new(),
                ret: ty.clone(),
                body: MethodBody::FieldGet(index),
            })
        });
        let setter = with_setter.then(|| {
            Rc::new(MethodDef {
                name: format!("set_{}", field_name),
                is_static: false,
                is_virtual,
                params: vec![ty.clone()],
                ret: Ty::Void,
                body: MethodBody::FieldSet(index),
            })
        });
        Some(Rc::new(PropDef {
            name: field_name.to_string(),
            ty,
            is_virtual,
            getter,
            setter,
        }))
    }
}

/// Handle to an instance field: defining class plus declaration index.
#[derive(Clone)]
pub struct FieldRef {
    pub class: Rc<ClassDef>,
    pub index: usize,
}

impl FieldRef {
    pub fn ty(&self) -> Ty {
        self.class.fields[self.index].ty.clone()
    }

    pub fn name(&self) -> String {
        self.class.fields[self.index].name.clone()
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class.name, self.class.fields[self.index].name)
    }
}

/// Handle to a static field.
#[derive(Clone)]
pub struct StaticFieldRef {
    pub class: Rc<ClassDef>,
    pub index: usize,
}

impl StaticFieldRef {
    pub fn ty(&self) -> Ty {
        self.class.statics[self.index].ty.clone()
    }

    pub fn name(&self) -> String {
        self.class.statics[self.index].name.clone()
    }
}

impl fmt::Debug for StaticFieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class.name, self.class.statics[self.index].name)
    }
}

/// A constructor handle.
pub struct CtorDef {
    pub class: Rc<ClassDef>,
    pub params: Vec<Ty>,
    pub field_map: Vec<usize>,
}

pub type CtorRef = Rc<CtorDef>;

impl fmt::Debug for CtorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::new/{}", self.class.name, self.params.len())
    }
}

/// A property: typed, optionally virtual, with optional accessor methods.
#[derive(Debug)]
pub struct PropDef {
    pub name: String,
    pub ty: Ty,
    pub is_virtual: bool,
    pub getter: Option<MethodRef>,
    pub setter: Option<MethodRef>,
}

pub type PropRef = Rc<PropDef>;

/// Native method bodies are plain function pointers over the value model.
pub type NativeFn = fn(&[Value]) -> Result<Value, RtError>;

/// How a method executes when called.
pub enum MethodBody {
    Native(NativeFn),
    /// Read the receiver's field at the given declaration index.
    FieldGet(usize),
    /// Write the receiver's field at the given declaration index.
    FieldSet(usize),
    /// The receiver is a callable; apply it to the remaining arguments.
    CallableInvoke,
    /// The receiver is a callable; produce its bound closure (or null).
    CallableTarget,
    /// Resolve a type token into a reified type value.
    TypeFromHandle,
}

/// A method handle. Instance methods receive the receiver as argument 0.
pub struct MethodDef {
    pub name: String,
    pub is_static: bool,
    pub is_virtual: bool,
    /// Explicit parameter types, receiver excluded.
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub body: MethodBody,
}

pub type MethodRef = Rc<MethodDef>;

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.params.len())
    }
}

impl MethodDef {
    pub fn native(
        name: &str,
        is_static: bool,
        is_virtual: bool,
        params: Vec<Ty>,
        ret: Ty,
        body: NativeFn,
    ) -> MethodRef {
        Rc::new(MethodDef {
            name: name.to_string(),
            is_static,
            is_virtual,
            params,
            ret,
            body: MethodBody::Native(body),
        })
    }
}

/// Handles for the platform's own helper methods. Building one is a couple
/// of small allocations, so the write-once handle caches of the original
/// system collapse into these constructors.
pub mod intrinsics {
    use super::*;

    /// Resolves a pushed type token into a reified type value.
    pub fn type_from_handle() -> MethodRef {
        Rc::new(MethodDef {
            name: "type_from_handle".to_string(),
            is_static: true,
            is_virtual: false,
            params: vec![Ty::Type],
            ret: Ty::Type,
            body: MethodBody::TypeFromHandle,
        })
    }

    /// Accessor for a callable's bound closure object.
    pub fn callable_target() -> MethodRef {
        Rc::new(MethodDef {
            name: "target".to_string(),
            is_static: false,
            is_virtual: false,
            params: Vec::new(),
            ret: Ty::Object,
            body: MethodBody::CallableTarget,
        })
    }

    /// The `invoke` method of the given callable signature.
    pub fn callable_invoke(sig: &Rc<FnSig>) -> MethodRef {
        Rc::new(MethodDef {
            name: "invoke".to_string(),
            is_static: false,
            is_virtual: true,
            params: sig.params.clone(),
            ret: sig.ret.clone(),
            body: MethodBody::CallableInvoke,
        })
    }
}
