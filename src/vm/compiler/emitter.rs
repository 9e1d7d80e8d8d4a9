//! The emission pass: walks the tree a second time and appends bytecode for
//! each supported node kind, addressing captured values through the slot
//! layout fixed by the analyzer.
//!
//! Argument numbering: when a closure exists it is the hidden 0th argument
//! and every declared parameter shifts up by one; with no closure the
//! declared parameters start at 0.

use std::rc::Rc;

use crate::meta::{intrinsics, MethodRef, Ty};
use crate::tree::{CompareOp, Expr, ExprRef, MemberBinding, MemberSource, Param};
use crate::value::Value;
use crate::vm::method::{MethodBuilder, Op};

use super::analyzer::{encodable_inline, ClosureInfo};
use super::closure::{self, ClosureLayout, LayoutKind};
use super::compiler::Unsupported;

pub struct Emitter<'a> {
    mb: &'a mut MethodBuilder,
    params: &'a [Param],
    closure: Option<&'a ClosureInfo>,
}

fn layout_of<'b>(info: &'b ClosureInfo) -> Result<&'b ClosureLayout, Unsupported> {
    info.layout
        .as_ref()
        .ok_or_else(|| Unsupported::MissingSlot("closure layout".to_string()))
}

impl<'a> Emitter<'a> {
    pub fn new(
        mb: &'a mut MethodBuilder,
        params: &'a [Param],
        closure: Option<&'a ClosureInfo>,
    ) -> Emitter<'a> {
        Emitter { mb, params, closure }
    }

    fn shift(&self) -> usize {
        usize::from(self.closure.is_some())
    }

    /// Emit code leaving the value of `expr` on the operand stack.
    pub fn emit_expr(&mut self, expr: &ExprRef) -> Result<(), Unsupported> {
        match &**expr {
            Expr::Parameter(p) => self.emit_parameter(p),
            Expr::Constant { value, ty } => self.emit_constant(expr, value, ty),
            Expr::Convert { operand, target } => {
                // A cast up to the root type is a no-op with murky
                // semantics; it stays on the fallback path.
                if *target == Ty::Object {
                    return Err(Unsupported::CastToObject);
                }
                self.emit_expr(operand)?;
                self.mb.emit(Op::CastClass(target.clone()));
                Ok(())
            }
            Expr::ArrayIndex { array, index } => {
                self.emit_expr(array)?;
                self.emit_expr(index)?;
                self.mb.emit(Op::LoadElem);
                Ok(())
            }
            Expr::New { ctor, args } => {
                for a in args {
                    self.emit_expr(a)?;
                }
                self.mb.emit(Op::NewObj(ctor.clone()));
                Ok(())
            }
            Expr::NewArrayInit { elem, items } => self.emit_new_array(elem, items),
            Expr::MemberInit { new, bindings } => self.emit_member_init(new, bindings),
            Expr::Call { target, method, args } => {
                if let Some(t) = target {
                    self.emit_expr(t)?;
                }
                for a in args {
                    self.emit_expr(a)?;
                }
                self.emit_method_call(method);
                Ok(())
            }
            Expr::Member { target, member } => self.emit_member_read(target.as_ref(), member),
            Expr::Lambda { .. } => self.emit_lambda(expr),
            Expr::Invoke { target, args } => {
                let Ty::Func(sig) = target.ty() else {
                    return Err(Unsupported::Node("invoke of a non-callable value"));
                };
                self.emit_expr(target)?;
                for a in args {
                    self.emit_expr(a)?;
                }
                self.mb.emit(Op::CallVirt(intrinsics::callable_invoke(&sig)));
                Ok(())
            }
            Expr::Compare { op, lhs, rhs } => {
                self.emit_expr(lhs)?;
                self.emit_expr(rhs)?;
                self.emit_compare(*op);
                Ok(())
            }
            other => Err(Unsupported::Node(other.kind_name())),
        }
    }

    /// Push a parameter: a declared one from its (shifted) argument slot,
    /// a free one from the closure slot the analyzer gave it.
    fn emit_parameter(&mut self, param: &Param) -> Result<(), Unsupported> {
        if let Some(k) = self.params.iter().position(|p| Rc::ptr_eq(p, param)) {
            self.mb.emit_load_arg(k + self.shift());
            return Ok(());
        }
        let info = self
            .closure
            .ok_or_else(|| Unsupported::CaptureNotFound(param.name.clone()))?;
        let slot = info
            .captured_slot(param)
            .ok_or_else(|| Unsupported::CaptureNotFound(param.name.clone()))?;
        closure::emit_slot_load(self.mb, layout_of(info)?, slot, &param.ty);
        Ok(())
    }

    fn emit_constant(
        &mut self,
        node: &ExprRef,
        value: &Value,
        ty: &Ty,
    ) -> Result<(), Unsupported> {
        if encodable_inline(value, ty) {
            match value {
                Value::Null => self.mb.emit(Op::LoadNull),
                Value::Int(i) => self.mb.emit_load_int(*i),
                Value::Float(f) => self.mb.emit(Op::LoadFloat(*f)),
                Value::Bool(b) => self.mb.emit(Op::LoadBool(*b)),
                Value::Str(s) => self.mb.emit(Op::LoadStr(s.clone())),
                Value::Enum(def, v) => self.mb.emit(Op::LoadEnum(def.clone(), *v)),
                Value::Type(t) => {
                    self.mb.emit(Op::LoadToken(t.clone()));
                    self.mb.emit(Op::Call(intrinsics::type_from_handle()));
                }
                other => return Err(Unsupported::MissingSlot(other.type_name())),
            }
            return Ok(());
        }
        let info = self
            .closure
            .ok_or_else(|| Unsupported::MissingSlot("constant".to_string()))?;
        let slot = info
            .constant_slot(node)
            .ok_or_else(|| Unsupported::MissingSlot("constant".to_string()))?;
        closure::emit_slot_load(self.mb, layout_of(info)?, slot, ty);
        // A value type sitting behind an object-typed slot surfaces boxed.
        if *ty == Ty::Object && value.runtime_ty().is_value_type() {
            self.mb.emit(Op::Box(value.runtime_ty()));
        }
        Ok(())
    }

    fn emit_new_array(&mut self, elem: &Ty, items: &[ExprRef]) -> Result<(), Unsupported> {
        let local = self.mb.declare_local(Ty::Array(Rc::new(elem.clone())));
        self.mb.emit_load_int(items.len() as i64);
        self.mb.emit(Op::NewArr(elem.clone()));
        self.mb.emit(Op::StoreLocal(local));
        for (i, item) in items.iter().enumerate() {
            self.mb.emit(Op::LoadLocal(local));
            self.mb.emit_load_int(i as i64);
            if elem.is_value_type() {
                // Value-typed elements go through the element address.
                self.mb.emit(Op::LoadElemAddr);
                self.emit_expr(item)?;
                self.mb.emit(Op::StoreObj(elem.clone()));
            } else {
                self.emit_expr(item)?;
                self.mb.emit(Op::StoreElem);
            }
        }
        self.mb.emit(Op::LoadLocal(local));
        Ok(())
    }

    fn emit_member_init(
        &mut self,
        new: &ExprRef,
        bindings: &[MemberBinding],
    ) -> Result<(), Unsupported> {
        self.emit_expr(new)?;
        let local = self.mb.declare_local(new.ty());
        self.mb.emit(Op::StoreLocal(local));
        for binding in bindings {
            let MemberBinding::Assign { member, value } = binding else {
                return Err(Unsupported::MemberBinding);
            };
            self.mb.emit(Op::LoadLocal(local));
            self.emit_expr(value)?;
            match member {
                MemberSource::Field(f) => self.mb.emit(Op::StoreField(f.clone())),
                MemberSource::Property(p) => {
                    let setter = p
                        .setter
                        .clone()
                        .ok_or_else(|| Unsupported::NoSetter(p.name.clone()))?;
                    self.emit_method_call(&setter);
                }
                MemberSource::Static(_) => return Err(Unsupported::MemberBinding),
            }
        }
        self.mb.emit(Op::LoadLocal(local));
        Ok(())
    }

    fn emit_member_read(
        &mut self,
        target: Option<&ExprRef>,
        member: &MemberSource,
    ) -> Result<(), Unsupported> {
        match member {
            MemberSource::Static(s) => {
                self.mb.emit(Op::LoadStatic(s.clone()));
                Ok(())
            }
            MemberSource::Field(f) => {
                let t = target
                    .ok_or(Unsupported::Node("instance member access without a target"))?;
                self.emit_expr(t)?;
                self.mb.emit(Op::LoadField(f.clone()));
                Ok(())
            }
            MemberSource::Property(p) => {
                let getter = p
                    .getter
                    .clone()
                    .ok_or_else(|| Unsupported::NoGetter(p.name.clone()))?;
                if let Some(t) = target {
                    self.emit_expr(t)?;
                }
                self.emit_method_call(&getter);
                Ok(())
            }
        }
    }

    /// Construct a nested-lambda value: load the compiled callable from its
    /// slot, then thread every live captured value into the inner closure so
    /// each construction observes the current outer state.
    fn emit_lambda(&mut self, node: &ExprRef) -> Result<(), Unsupported> {
        let info = self
            .closure
            .ok_or_else(|| Unsupported::MissingSlot("nested lambda".to_string()))?;
        let (slot, nested) = info
            .nested_entry(node)
            .ok_or_else(|| Unsupported::MissingSlot("nested lambda".to_string()))?;
        closure::emit_slot_load(self.mb, layout_of(info)?, slot, &node.ty());

        let Some(inner) = &nested.inner else {
            return Ok(());
        };
        if inner.captured.is_empty() {
            return Ok(());
        }
        let inner_layout = layout_of(inner)?;
        for (j, param) in inner.captured.iter().enumerate() {
            self.mb.emit(Op::Dup);
            self.mb.emit(Op::Call(intrinsics::callable_target()));
            let inner_slot = inner.constants.len() + j;
            match inner_layout.kind {
                LayoutKind::Fields => {
                    self.emit_parameter(param)?;
                    self.mb
                        .emit(Op::StoreField(inner_layout.class.field_at(inner_slot)));
                }
                LayoutKind::Slab => {
                    self.mb.emit(Op::LoadField(inner_layout.class.field_at(0)));
                    self.mb.emit_load_int(inner_slot as i64);
                    self.emit_parameter(param)?;
                    if param.ty.is_value_type() {
                        self.mb.emit(Op::Box(param.ty.clone()));
                    }
                    self.mb.emit(Op::StoreElem);
                }
            }
        }
        Ok(())
    }

    fn emit_method_call(&mut self, method: &MethodRef) {
        if method.is_virtual {
            self.mb.emit(Op::CallVirt(method.clone()));
        } else {
            self.mb.emit(Op::Call(method.clone()));
        }
    }

    fn emit_compare(&mut self, op: CompareOp) {
        match op {
            CompareOp::Eq => self.mb.emit(Op::Ceq),
            CompareOp::Lt => self.mb.emit(Op::Clt),
            CompareOp::Gt => self.mb.emit(Op::Cgt),
            // The remaining three are complements of the first three.
            CompareOp::Ne => {
                self.mb.emit(Op::Ceq);
                self.mb.emit(Op::LoadBool(false));
                self.mb.emit(Op::Ceq);
            }
            CompareOp::Le => {
                self.mb.emit(Op::Cgt);
                self.mb.emit(Op::LoadBool(false));
                self.mb.emit(Op::Ceq);
            }
            CompareOp::Ge => {
                self.mb.emit(Op::Clt);
                self.mb.emit(Op::LoadBool(false));
                self.mb.emit(Op::Ceq);
            }
        }
    }
}
