use std::rc::Rc;

use enum_display::EnumDisplay;

use crate::meta::{CtorRef, FieldRef, FnSig, MethodRef, PropRef, StaticFieldRef, Ty};
use crate::value::Value;

/// A parameter declaration. Parameters are shared nodes: every occurrence of
/// the same parameter in a tree points at the same allocation, and all lookups
/// (declared lists, capture lists) go by pointer identity.
#[derive(Debug)]
pub struct ParamExpr {
    pub name: String,
    pub ty: Ty,
}

pub type Param = Rc<ParamExpr>;

impl ParamExpr {
    pub fn new(name: &str, ty: Ty) -> Param {
        Rc::new(ParamExpr { name: name.to_string(), ty })
    }
}

pub type ExprRef = Rc<Expr>;

/// The six numeric comparisons understood by the fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumDisplay)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Binary arithmetic. Only the general evaluator handles these; the fast
/// path reports them as unsupported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumDisplay)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Where a member access resolves to.
#[derive(Clone, Debug)]
pub enum MemberSource {
    Field(FieldRef),
    Static(StaticFieldRef),
    Property(PropRef),
}

impl MemberSource {
    pub fn ty(&self) -> Ty {
        match self {
            MemberSource::Field(f) => f.ty(),
            MemberSource::Static(s) => s.ty(),
            MemberSource::Property(p) => p.ty.clone(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            MemberSource::Field(f) => f.name(),
            MemberSource::Static(s) => s.name(),
            MemberSource::Property(p) => p.name.clone(),
        }
    }
}

/// A member-initializer binding. Only plain assignments compile; the nested
/// form exists so the tree model covers what the general evaluator accepts.
#[derive(Debug)]
pub enum MemberBinding {
    Assign { member: MemberSource, value: ExprRef },
    Nested { member: MemberSource, bindings: Vec<MemberBinding> },
}

/// An expression-tree node. Nodes are immutable once built and shared via
/// `Rc`; node identity is `Rc` pointer identity.
#[derive(Debug)]
pub enum Expr {
    Parameter(Param),
    Constant { value: Value, ty: Ty },
    Convert { operand: ExprRef, target: Ty },
    ArrayIndex { array: ExprRef, index: ExprRef },
    New { ctor: CtorRef, args: Vec<ExprRef> },
    NewArrayInit { elem: Ty, items: Vec<ExprRef> },
    MemberInit { new: ExprRef, bindings: Vec<MemberBinding> },
    Call { target: Option<ExprRef>, method: MethodRef, args: Vec<ExprRef> },
    Member { target: Option<ExprRef>, member: MemberSource },
    Lambda { params: Vec<Param>, body: ExprRef, ret: Ty },
    Invoke { target: ExprRef, args: Vec<ExprRef> },
    Compare { op: CompareOp, lhs: ExprRef, rhs: ExprRef },
    Arith { op: ArithOp, lhs: ExprRef, rhs: ExprRef },
    Conditional { cond: ExprRef, then_branch: ExprRef, else_branch: ExprRef },
}

impl Expr {
    pub fn constant(value: Value, ty: Ty) -> ExprRef {
        Rc::new(Expr::Constant { value, ty })
    }

    pub fn param(p: &Param) -> ExprRef {
        Rc::new(Expr::Parameter(p.clone()))
    }

    pub fn convert(operand: ExprRef, target: Ty) -> ExprRef {
        Rc::new(Expr::Convert { operand, target })
    }

    pub fn array_index(array: ExprRef, index: ExprRef) -> ExprRef {
        Rc::new(Expr::ArrayIndex { array, index })
    }

    pub fn new_obj(ctor: CtorRef, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::New { ctor, args })
    }

    pub fn new_array(elem: Ty, items: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::NewArrayInit { elem, items })
    }

    pub fn member_init(new: ExprRef, bindings: Vec<MemberBinding>) -> ExprRef {
        Rc::new(Expr::MemberInit { new, bindings })
    }

    pub fn call(target: Option<ExprRef>, method: MethodRef, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Call { target, method, args })
    }

    pub fn field(target: ExprRef, field: FieldRef) -> ExprRef {
        Rc::new(Expr::Member { target: Some(target), member: MemberSource::Field(field) })
    }

    pub fn static_field(field: StaticFieldRef) -> ExprRef {
        Rc::new(Expr::Member { target: None, member: MemberSource::Static(field) })
    }

    pub fn property(target: ExprRef, prop: PropRef) -> ExprRef {
        Rc::new(Expr::Member { target: Some(target), member: MemberSource::Property(prop) })
    }

    pub fn lambda(params: Vec<Param>, body: ExprRef, ret: Ty) -> ExprRef {
        Rc::new(Expr::Lambda { params, body, ret })
    }

    pub fn invoke(target: ExprRef, args: Vec<ExprRef>) -> ExprRef {
        Rc::new(Expr::Invoke { target, args })
    }

    pub fn compare(op: CompareOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Rc::new(Expr::Compare { op, lhs, rhs })
    }

    pub fn arith(op: ArithOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Rc::new(Expr::Arith { op, lhs, rhs })
    }

    pub fn conditional(cond: ExprRef, then_branch: ExprRef, else_branch: ExprRef) -> ExprRef {
        Rc::new(Expr::Conditional { cond, then_branch, else_branch })
    }

    /// The static type of this node.
    pub fn ty(&self) -> Ty {
        match self {
            Expr::Parameter(p) => p.ty.clone(),
            Expr::Constant { ty, .. } => ty.clone(),
            Expr::Convert { target, .. } => target.clone(),
            Expr::ArrayIndex { array, .. } => match array.ty() {
                Ty::Array(elem) => (*elem).clone(),
                _ => Ty::Object,
            },
            Expr::New { ctor, .. } => Ty::Class(ctor.class.clone()),
            Expr::NewArrayInit { elem, .. } => Ty::Array(Rc::new(elem.clone())),
            Expr::MemberInit { new, .. } => new.ty(),
            Expr::Call { method, .. } => method.ret.clone(),
            Expr::Member { member, .. } => member.ty(),
            Expr::Lambda { params, ret, .. } => Ty::Func(Rc::new(FnSig {
                params: params.iter().map(|p| p.ty.clone()).collect(),
                ret: ret.clone(),
            })),
            Expr::Invoke { target, .. } => match target.ty() {
                Ty::Func(sig) => sig.ret.clone(),
                _ => Ty::Object,
            },
            Expr::Compare { .. } => Ty::Bool,
            Expr::Arith { lhs, .. } => lhs.ty(),
            Expr::Conditional { then_branch, .. } => then_branch.ty(),
        }
    }

    /// Node-kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Parameter(_) => "parameter",
            Expr::Constant { .. } => "constant",
            Expr::Convert { .. } => "convert",
            Expr::ArrayIndex { .. } => "array-index",
            Expr::New { .. } => "new",
            Expr::NewArrayInit { .. } => "new-array-init",
            Expr::MemberInit { .. } => "member-init",
            Expr::Call { .. } => "call",
            Expr::Member { .. } => "member-access",
            Expr::Lambda { .. } => "lambda",
            Expr::Invoke { .. } => "invoke",
            Expr::Compare { .. } => "compare",
            Expr::Arith { .. } => "arithmetic",
            Expr::Conditional { .. } => "conditional",
        }
    }
}
