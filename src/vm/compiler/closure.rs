//! Closure layout and materialization.
//!
//! Slot `i` of a closure maps to either field `i` of a fixed-arity product
//! class (small closures) or element `i` of a single array slab (large
//! ones). The closure object is built before emission; captured-parameter
//! slots start at their type's zero value and are overwritten at runtime
//! whenever a nested lambda is constructed.

use std::rc::Rc;

use enum_display::EnumDisplay;

use crate::meta::{ClassDef, FieldDef, Ty};
use crate::value::{ArrayObj, Object, Value};
use crate::vm::method::{MethodBuilder, Op};

use super::analyzer::ClosureInfo;

/// Largest slot count that still gets a fixed-arity product class; bigger
/// closures fall back to the array slab.
pub const MAX_FIXED: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumDisplay)]
pub enum LayoutKind {
    /// One typed field per slot, in slot order.
    Fields,
    /// A single reference-array field carrying all slots, boxed as needed.
    Slab,
}

/// The physical form of one closure, fixed at materialization time.
pub struct ClosureLayout {
    pub kind: LayoutKind,
    pub class: Rc<ClassDef>,
    /// The closure instance passed as the hidden 0th argument.
    pub object: Value,
}

impl ClosureLayout {
    pub fn ty(&self) -> Ty {
        Ty::Class(self.class.clone())
    }
}

/// Build the closure object for an analyzed body and record its layout.
///
/// Slot values follow slot order: constants carry their value as-is,
/// captured parameters start at their zero value, nested-lambda slots hold
/// the already-compiled callable.
pub fn materialize(info: &mut ClosureInfo) {
    let count = info.slot_count();
    let mut slot_tys = Vec::with_capacity(count);
    let mut slot_vals = Vec::with_capacity(count);
    for c in &info.constants {
        slot_tys.push(c.ty.clone());
        slot_vals.push(c.value.clone());
    }
    for p in &info.captured {
        slot_tys.push(p.ty.clone());
        slot_vals.push(p.ty.default_value());
    }
    for nl in &info.nested {
        slot_tys.push(Ty::Func(nl.callable.sig.clone()));
        slot_vals.push(Value::Func(nl.callable.clone()));
    }

    let layout = if count <= MAX_FIXED {
        let class = Rc::new(ClassDef {
            name: format!("Closure{}", count),
            fields: slot_tys
                .iter()
                .enumerate()
                .map(|(i, ty)| FieldDef { name: format!("v{}", i + 1), ty: ty.clone() })
                .collect(),
            statics: Vec::new(),
        });
        let object = Value::Obj(Object::with_fields(&class, slot_vals));
        ClosureLayout { kind: LayoutKind::Fields, class, object }
    } else {
        let class = Rc::new(ClassDef {
            name: "ClosureSlab".to_string(),
            fields: vec![FieldDef {
                name: "items".to_string(),
                ty: Ty::Array(Rc::new(Ty::Object)),
            }],
            statics: Vec::new(),
        });
        let slab = Value::Arr(ArrayObj::of(Ty::Object, slot_vals));
        let object = Value::Obj(Object::with_fields(&class, vec![slab]));
        ClosureLayout { kind: LayoutKind::Slab, class, object }
    };
    info.layout = Some(layout);
}

/// Emit a load of slot `slot` with static type `ty`, assuming the closure
/// is the method's 0th argument.
pub fn emit_slot_load(mb: &mut MethodBuilder, layout: &ClosureLayout, slot: usize, ty: &Ty) {
    mb.emit(Op::LoadArg0);
    match layout.kind {
        LayoutKind::Fields => {
            mb.emit(Op::LoadField(layout.class.field_at(slot)));
        }
        LayoutKind::Slab => {
            mb.emit(Op::LoadField(layout.class.field_at(0)));
            mb.emit_load_int(slot as i64);
            mb.emit(Op::LoadElem);
            if *ty != Ty::Object {
                mb.emit(Op::CastClass(ty.clone()));
            }
        }
    }
}
