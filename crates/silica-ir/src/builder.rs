//! Op construction and rewriting
//!
//! [`Rewriter`] carries an insertion point into one region of a module and
//! provides the constructors the lowering passes build RTL with. Replacement
//! and erasure go through the rewriter so the insertion point stays valid
//! while ops before it are removed.

use crate::ir::{
    ClockEdge, CmpPred, EventControl, Module, OpData, OpId, OpKind, RegionRef, Type, Value,
};

/// Maps an LTL clock edge to the event control of the `always` block it
/// lowers to
pub fn event_control_for_edge(edge: ClockEdge) -> EventControl {
    match edge {
        ClockEdge::Pos => EventControl::PosEdge,
        ClockEdge::Neg => EventControl::NegEdge,
        ClockEdge::Both => EventControl::Edge,
    }
}

/// Insertion-point-carrying op builder over a mutable module
pub struct Rewriter<'m> {
    module: &'m mut Module,
    region: RegionRef,
    index: usize,
}

impl<'m> Rewriter<'m> {
    /// Rewriter inserting immediately before `op`
    pub fn before(module: &'m mut Module, op: OpId) -> Self {
        let (region, index) = module
            .position_of(op)
            .unwrap_or_else(|| panic!("operation {:?} is not in any region", op));
        Self {
            module,
            region,
            index,
        }
    }

    /// Rewriter appending to the end of the module body
    pub fn at_end(module: &'m mut Module) -> Self {
        let index = module.body.len();
        Self {
            module,
            region: RegionRef::Top,
            index,
        }
    }

    /// The underlying module
    pub fn module(&self) -> &Module {
        self.module
    }

    /// Create an operation at the insertion point and return its id
    pub fn create(&mut self, kind: OpKind, operands: Vec<Value>, result_ty: Option<Type>) -> OpId {
        let id = self.module.alloc_op(OpData::new(kind, operands, result_ty));
        self.module.insert_in_region(self.region, self.index, id);
        self.index += 1;
        id
    }

    /// Create an operation and return its result value
    pub fn create_value(&mut self, kind: OpKind, operands: Vec<Value>, result_ty: Type) -> Value {
        let id = self.create(kind, operands, Some(result_ty));
        Value::Result(id)
    }

    /// Create a block-structured operation, populating its body with `build`
    pub fn create_with_body(
        &mut self,
        kind: OpKind,
        operands: Vec<Value>,
        build: impl FnOnce(&mut Self),
    ) -> OpId {
        let id = self.create(kind, operands, None);
        let saved = (self.region, self.index);
        self.region = RegionRef::Body(id);
        self.index = 0;
        build(self);
        (self.region, self.index) = saved;
        id
    }

    /// Integer constant of the given width
    pub fn constant(&mut self, width: u32, value: i64) -> Value {
        self.create_value(OpKind::Constant { value }, vec![], Type::Int(width))
    }

    /// Bitwise AND; the result takes the type of `lhs`
    pub fn and(&mut self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs);
        self.create_value(OpKind::And, vec![lhs, rhs], ty)
    }

    /// Bitwise OR
    pub fn or(&mut self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs);
        self.create_value(OpKind::Or, vec![lhs, rhs], ty)
    }

    /// Bitwise XOR
    pub fn xor(&mut self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs);
        self.create_value(OpKind::Xor, vec![lhs, rhs], ty)
    }

    /// Addition
    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        let ty = self.module.value_type(lhs);
        self.create_value(OpKind::Add, vec![lhs, rhs], ty)
    }

    /// Comparison, 1-bit result
    pub fn cmp(&mut self, pred: CmpPred, lhs: Value, rhs: Value) -> Value {
        self.create_value(OpKind::Cmp { pred }, vec![lhs, rhs], Type::Int(1))
    }

    /// 2:1 select
    pub fn mux(&mut self, cond: Value, then_value: Value, else_value: Value) -> Value {
        let ty = self.module.value_type(then_value);
        self.create_value(OpKind::Mux, vec![cond, then_value, else_value], ty)
    }

    /// Register without a reset port
    pub fn reg(
        &mut self,
        name: impl Into<String>,
        next: Value,
        clock: Value,
        initial: Option<i64>,
    ) -> Value {
        let ty = self.module.value_type(next);
        self.create_value(
            OpKind::Reg {
                name: name.into(),
                initial,
            },
            vec![next, clock],
            ty,
        )
    }

    /// Register reset to `reset_value` while `reset` is high
    pub fn reg_with_reset(
        &mut self,
        name: impl Into<String>,
        next: Value,
        clock: Value,
        reset: Value,
        reset_value: Value,
        initial: Option<i64>,
    ) -> Value {
        let ty = self.module.value_type(next);
        self.create_value(
            OpKind::Reg {
                name: name.into(),
                initial,
            },
            vec![next, clock, reset, reset_value],
            ty,
        )
    }

    /// Cast a 1-bit signal to a clock, folding when the value already is one
    pub fn to_clock(&mut self, value: Value) -> Value {
        if self.module.value_type(value).is_clock() {
            return value;
        }
        self.create_value(OpKind::ToClock, vec![value], Type::Clock)
    }

    /// Replace every use of `op`'s result with `value` and erase `op`
    pub fn replace_op(&mut self, op: OpId, value: Value) {
        self.module.replace_all_uses(Value::Result(op), value);
        self.erase_op(op);
    }

    /// Create a new operation at the insertion point and use it to replace `op`
    pub fn replace_op_with(
        &mut self,
        op: OpId,
        kind: OpKind,
        operands: Vec<Value>,
        result_ty: Type,
    ) -> Value {
        let value = self.create_value(kind, operands, result_ty);
        self.replace_op(op, value);
        value
    }

    /// Erase an operation, keeping the insertion point consistent
    pub fn erase_op(&mut self, op: OpId) {
        let pos = self
            .module
            .region(self.region)
            .iter()
            .position(|&o| o == op);
        self.module.erase_op(op);
        if let Some(p) = pos {
            if p < self.index {
                self.index -= 1;
            }
        }
    }
}
