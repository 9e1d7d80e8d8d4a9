//! Binding analysis: the first of the two passes.
//!
//! Walks the tree once and records everything the compiled body will need a
//! closure slot for: constants that cannot be encoded inline, parameters
//! that are free in this body, and nested lambdas (which are compiled
//! through the full pipeline on the spot). The slot order fixed here —
//! constants, then captured parameters, then nested lambdas — is what the
//! emitter addresses against, so neither side may reorder.

use std::rc::Rc;

use tracing::debug;

use crate::meta::Ty;
use crate::tree::{Expr, ExprRef, MemberBinding, Param};
use crate::value::{Callable, Value};

use super::closure::ClosureLayout;
use super::compiler::{self, Unsupported};

/// A constant that needs a slot, with its declared type.
pub struct ConstSlot {
    pub node: ExprRef,
    pub value: Value,
    pub ty: Ty,
}

/// A nested lambda compiled during analysis.
pub struct NestedLambda {
    pub node: ExprRef,
    pub callable: Callable,
    pub inner: Option<Rc<ClosureInfo>>,
}

/// Everything one lambda captures, in slot order, plus the physical layout
/// once the closure object has been materialized.
pub struct ClosureInfo {
    pub constants: Vec<ConstSlot>,
    pub captured: Vec<Param>,
    pub nested: Vec<NestedLambda>,
    pub layout: Option<ClosureLayout>,
}

impl ClosureInfo {
    fn new() -> ClosureInfo {
        ClosureInfo {
            constants: Vec::new(),
            captured: Vec::new(),
            nested: Vec::new(),
            layout: None,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.constants.len() + self.captured.len() + self.nested.len()
    }

    /// Global slot of a constant node, by node identity.
    pub fn constant_slot(&self, node: &ExprRef) -> Option<usize> {
        self.constants.iter().position(|c| Rc::ptr_eq(&c.node, node))
    }

    /// Global slot of a captured parameter, by identity.
    pub fn captured_slot(&self, param: &Param) -> Option<usize> {
        self.captured
            .iter()
            .position(|p| Rc::ptr_eq(p, param))
            .map(|i| self.constants.len() + i)
    }

    /// Global slot and entry of a nested lambda, by node identity,
    /// searching last-to-first.
    pub fn nested_entry(&self, node: &ExprRef) -> Option<(usize, &NestedLambda)> {
        let base = self.constants.len() + self.captured.len();
        self.nested
            .iter()
            .enumerate()
            .rev()
            .find(|(_, nl)| Rc::ptr_eq(&nl.node, node))
            .map(|(i, nl)| (base + i, nl))
    }
}

/// Whether a constant can be emitted as an inline literal. Callable values
/// always take a slot, whatever their declared type.
pub fn encodable_inline(value: &Value, ty: &Ty) -> bool {
    if matches!(value, Value::Func(_)) {
        return false;
    }
    if matches!(value, Value::Null) {
        return true;
    }
    matches!(ty, Ty::Int | Ty::Float | Ty::Bool | Ty::Str | Ty::Type) || ty.is_enum()
}

/// Analyze `body` against its declared parameter list. `Ok(None)` means the
/// body captures nothing and the compiled method needs no closure argument.
pub fn analyze(body: &ExprRef, params: &[Param]) -> Result<Option<ClosureInfo>, Unsupported> {
    let mut analyzer = Analyzer { params, info: None };
    analyzer.scan(body)?;
    Ok(analyzer.info)
}

struct Analyzer<'a> {
    params: &'a [Param],
    info: Option<ClosureInfo>,
}

impl Analyzer<'_> {
    fn info_mut(&mut self) -> &mut ClosureInfo {
        self.info.get_or_insert_with(ClosureInfo::new)
    }

    fn is_declared(&self, param: &Param) -> bool {
        self.params.iter().any(|p| Rc::ptr_eq(p, param))
    }

    /// Record a free parameter, deduplicating by identity.
    fn capture(&mut self, param: &Param) {
        let info = self.info_mut();
        if !info.captured.iter().any(|p| Rc::ptr_eq(p, param)) {
            info.captured.push(param.clone());
        }
    }

    fn scan(&mut self, expr: &ExprRef) -> Result<(), Unsupported> {
        match &**expr {
            Expr::Constant { value, ty } => {
                if !encodable_inline(value, ty) {
                    self.info_mut().constants.push(ConstSlot {
                        node: expr.clone(),
                        value: value.clone(),
                        ty: ty.clone(),
                    });
                }
                Ok(())
            }
            Expr::Parameter(p) => {
                if !self.is_declared(p) {
                    self.capture(p);
                }
                Ok(())
            }
            Expr::Call { target, args, .. } => {
                if let Some(t) = target {
                    self.scan(t)?;
                }
                for a in args {
                    self.scan(a)?;
                }
                Ok(())
            }
            Expr::Member { target, .. } => {
                if let Some(t) = target {
                    self.scan(t)?;
                }
                Ok(())
            }
            Expr::New { args, .. } => {
                for a in args {
                    self.scan(a)?;
                }
                Ok(())
            }
            Expr::NewArrayInit { items, .. } => {
                for item in items {
                    self.scan(item)?;
                }
                Ok(())
            }
            Expr::MemberInit { new, bindings } => {
                self.scan(new)?;
                for binding in bindings {
                    match binding {
                        MemberBinding::Assign { value, .. } => self.scan(value)?,
                        MemberBinding::Nested { member, .. } => {
                            debug!(member = %member.name(), "member binding is not an assignment");
                            return Err(Unsupported::MemberBinding);
                        }
                    }
                }
                Ok(())
            }
            Expr::Lambda { .. } => {
                // Nested lambdas go through the full pipeline right here; a
                // failed nested compile makes the whole tree unsupported.
                let (callable, inner) = compiler::compile_nested(expr)?;
                let inner_captures: Vec<Param> = match &inner {
                    Some(info) => info.captured.clone(),
                    None => Vec::new(),
                };
                self.info_mut().nested.push(NestedLambda {
                    node: expr.clone(),
                    callable,
                    inner,
                });
                // Whatever the nested lambda captures that this body does
                // not itself declare is free here too, from a still
                // further-out scope.
                for p in &inner_captures {
                    if !self.is_declared(p) {
                        self.capture(p);
                    }
                }
                Ok(())
            }
            Expr::Invoke { target, args } => {
                self.scan(target)?;
                for a in args {
                    self.scan(a)?;
                }
                Ok(())
            }
            Expr::Convert { operand, .. } => self.scan(operand),
            Expr::ArrayIndex { array, index } => {
                self.scan(array)?;
                self.scan(index)
            }
            Expr::Compare { lhs, rhs, .. } => {
                self.scan(lhs)?;
                self.scan(rhs)
            }
            other => {
                debug!(kind = other.kind_name(), "node kind outside the fast path");
                Err(Unsupported::Node(other.kind_name()))
            }
        }
    }
}
