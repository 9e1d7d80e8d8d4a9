//! The compile driver and the public surface of the fast path.
//!
//! A compile either produces an invocable callable or the single
//! "unsupported" outcome (`None`), on which callers fall back to the
//! general evaluator. Well-formed input never makes the fast path panic or
//! surface an error; malformed input may yield a callable that faults when
//! invoked.

use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::meta::{FnSig, Ty};
use crate::tree::{Expr, ExprRef, Param};
use crate::value::Callable;
use crate::vm::method::{MethodBuilder, Op};

use super::analyzer::{self, ClosureInfo};
use super::closure;
use super::emitter::Emitter;

/// Why the fast path refused a tree. Flattened to `None` at the public
/// surface; the reason is only observable through debug logging.
#[derive(Debug, Clone, Error)]
pub enum Unsupported {
    #[error("unsupported expression kind: {0}")]
    Node(&'static str),
    #[error("member initializer is not a plain assignment")]
    MemberBinding,
    #[error("property `{0}` has no getter")]
    NoGetter(String),
    #[error("property `{0}` has no setter")]
    NoSetter(String),
    #[error("conversion targeting the root object type")]
    CastToObject,
    #[error("captured parameter `{0}` cannot be located in any closure")]
    CaptureNotFound(String),
    #[error("no closure slot recorded for {0}")]
    MissingSlot(String),
}

/// Compile a lambda tree into a callable, or `None` when any node falls
/// outside the supported subset.
pub fn try_compile(lambda: &ExprRef) -> Option<Callable> {
    let Expr::Lambda { params, body, ret } = &**lambda else {
        debug!(kind = lambda.kind_name(), "fast path takes lambda roots only");
        return None;
    };
    flatten(compile_parts(body, params, ret))
}

/// Low-level form: compile a bare body against an explicit parameter list
/// and return type. Nested compiles use this shape internally.
pub fn try_compile_body(body: &ExprRef, params: &[Param], ret: &Ty) -> Option<Callable> {
    flatten(compile_parts(body, params, ret))
}

fn flatten(result: Result<(Callable, Option<Rc<ClosureInfo>>), Unsupported>) -> Option<Callable> {
    match result {
        Ok((callable, _)) => Some(callable),
        Err(reason) => {
            debug!(%reason, "fast path refused, falling back");
            None
        }
    }
}

/// Full pipeline for one lambda, keeping the closure info so an enclosing
/// analysis can propagate captures and thread values at emission time.
pub(super) fn compile_nested(
    node: &ExprRef,
) -> Result<(Callable, Option<Rc<ClosureInfo>>), Unsupported> {
    let Expr::Lambda { params, body, ret } = &**node else {
        return Err(Unsupported::Node(node.kind_name()));
    };
    compile_parts(body, params, ret)
}

fn compile_parts(
    body: &ExprRef,
    params: &[Param],
    ret: &Ty,
) -> Result<(Callable, Option<Rc<ClosureInfo>>), Unsupported> {
    let mut info = analyzer::analyze(body, params)?;
    if let Some(ci) = info.as_mut() {
        closure::materialize(ci);
        if let Some(layout) = &ci.layout {
            trace!(
                constants = ci.constants.len(),
                captured = ci.captured.len(),
                nested = ci.nested.len(),
                layout = %layout.kind,
                "closure materialized"
            );
        }
    }

    // Method signature: hidden closure argument first when one exists, then
    // the declared parameters.
    let mut arg_tys: Vec<Ty> = Vec::with_capacity(params.len() + 1);
    if let Some(layout) = info.as_ref().and_then(|ci| ci.layout.as_ref()) {
        arg_tys.push(layout.ty());
    }
    arg_tys.extend(params.iter().map(|p| p.ty.clone()));

    let mut mb = MethodBuilder::new("lambda", arg_tys, ret.clone(), false);
    let mut em = Emitter::new(&mut mb, params, info.as_ref());
    em.emit_expr(body)?;
    mb.emit(Op::Ret);

    let sig = Rc::new(FnSig {
        params: params.iter().map(|p| p.ty.clone()).collect(),
        ret: ret.clone(),
    });
    let target = info
        .as_ref()
        .and_then(|ci| ci.layout.as_ref())
        .map(|layout| layout.object.clone());
    Ok((mb.into_callable(sig, target), info.map(Rc::new)))
}
