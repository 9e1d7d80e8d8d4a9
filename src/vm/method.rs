//! The dynamic-method facility: an instruction sink that accepts a stream
//! of virtual-machine instructions and finalizes into an invocable method,
//! optionally bound to a closure object as its hidden 0th argument.

use std::rc::Rc;

use gc::Gc;

use crate::meta::{CtorRef, EnumDef, FieldRef, FnSig, MethodRef, StaticFieldRef, Ty};
use crate::value::{Callable, CallableBody, CallableObj, Value};

/// One virtual-machine instruction. Instructions operate on an operand
/// stack; the argument and integer loads come in dense, short and wide
/// forms and the builder picks the narrowest one that fits.
#[derive(Clone, Debug)]
pub enum Op {
    LoadArg0,
    LoadArg1,
    LoadArg2,
    LoadArg3,
    LoadArgS(u8),
    LoadArg(u16),
    LoadLocal(u16),
    StoreLocal(u16),
    LoadNull,
    LoadBool(bool),
    LoadIntM1,
    LoadInt0,
    LoadInt1,
    LoadInt2,
    LoadInt3,
    LoadInt4,
    LoadInt5,
    LoadInt6,
    LoadInt7,
    LoadInt8,
    LoadIntS(i8),
    LoadInt(i64),
    LoadFloat(f64),
    LoadStr(Rc<String>),
    LoadEnum(Rc<EnumDef>, i64),
    /// Push a raw type token; resolved to a reified type by the
    /// type-from-handle intrinsic.
    LoadToken(Ty),
    Box(Ty),
    CastClass(Ty),
    NewArr(Ty),
    NewObj(CtorRef),
    LoadElem,
    LoadElemAddr,
    StoreElem,
    StoreObj(Ty),
    LoadField(FieldRef),
    StoreField(FieldRef),
    LoadStatic(StaticFieldRef),
    StoreStatic(StaticFieldRef),
    Call(MethodRef),
    CallVirt(MethodRef),
    Ceq,
    Clt,
    Cgt,
    Dup,
    Ret,
}

/// A finalized method body: signature, local slots and instruction stream.
pub struct Method {
    pub name: String,
    /// Full argument types, including the hidden closure argument when the
    /// method is meant to be bound.
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub locals: Vec<Ty>,
    pub ops: Vec<Op>,
    pub listing: Option<String>,
}

impl Method {
    /// The instruction listing, if it was recorded at build time.
    pub fn disassemble(&self) -> String {
        match &self.listing {
            Some(l) => l.clone(),
            None => {
                let mut out = String::new();
                for op in &self.ops {
                    out.push_str(&format!("{:?}\n", op));
                }
                out
            }
        }
    }
}

/// Instruction sink for one method under construction.
pub struct MethodBuilder {
    name: String,
    params: Vec<Ty>,
    ret: Ty,
    locals: Vec<Ty>,
    ops: Vec<Op>,
    listing: String,
    generate_listing: bool,
}

impl MethodBuilder {
    pub fn new(name: &str, params: Vec<Ty>, ret: Ty, generate_listing: bool) -> MethodBuilder {
        MethodBuilder {
            name: name.to_string(),
            params,
            ret,
            locals: Vec::new(),
            ops: Vec::new(),
            listing: String::new(),
            generate_listing,
        }
    }

    /// Declare a local slot of the given type; locals start at the type's
    /// zero value.
    pub fn declare_local(&mut self, ty: Ty) -> u16 {
        let index = self.locals.len() as u16;
        self.locals.push(ty);
        index
    }

    pub fn emit(&mut self, op: Op) {
        if self.generate_listing {
            self.listing += &format!("{:?}\n", op);
        }
        self.ops.push(op);
    }

    /// Push the argument at `index`, using the dense opcodes for 0..=3, the
    /// short form up to 255 and the wide form beyond.
    pub fn emit_load_arg(&mut self, index: usize) {
        let op = match index {
            0 => Op::LoadArg0,
            1 => Op::LoadArg1,
            2 => Op::LoadArg2,
            3 => Op::LoadArg3,
            i if i <= u8::MAX as usize => Op::LoadArgS(i as u8),
            i => Op::LoadArg(i as u16),
        };
        self.emit(op);
    }

    /// Push an integer literal, using the dense opcodes for -1..=8, the
    /// one-byte form for i8 and the wide form otherwise.
    pub fn emit_load_int(&mut self, value: i64) {
        let op = match value {
            -1 => Op::LoadIntM1,
            0 => Op::LoadInt0,
            1 => Op::LoadInt1,
            2 => Op::LoadInt2,
            3 => Op::LoadInt3,
            4 => Op::LoadInt4,
            5 => Op::LoadInt5,
            6 => Op::LoadInt6,
            7 => Op::LoadInt7,
            8 => Op::LoadInt8,
            v if v >= i8::MIN as i64 && v <= i8::MAX as i64 => Op::LoadIntS(v as i8),
            v => Op::LoadInt(v),
        };
        self.emit(op);
    }

    pub fn finalize(self) -> Method {
        Method {
            name: self.name,
            params: self.params,
            ret: self.ret,
            locals: self.locals,
            ops: self.ops,
            listing: if self.generate_listing { Some(self.listing) } else { None },
        }
    }

    /// Finalize into an invocable callable, optionally bound to a closure
    /// object passed as the hidden 0th argument on every invocation.
    pub fn into_callable(self, sig: Rc<FnSig>, target: Option<Value>) -> Callable {
        let method = Rc::new(self.finalize());
        Gc::new(CallableObj { sig, target, body: CallableBody::Method(method) })
    }
}
