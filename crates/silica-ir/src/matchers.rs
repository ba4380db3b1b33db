//! Pattern matcher combinators
//!
//! Binding matchers that walk an operation tree top-down, check shapes, and
//! capture matched operands and operations into `&mut Option<_>` slots.
//! Matching never mutates the IR and never panics; on a failed root match,
//! partial bindings are left in an unspecified state and must not be read.

use crate::ir::{Module, OpId, OpKind, Type, Value};

/// A matcher over a single value
pub trait ValuePattern {
    /// Try to match `value`; bindings are committed only on success
    fn match_value(&mut self, module: &Module, value: Value) -> bool;
}

/// Matches any value of 1-bit integer type and captures it
pub struct AnyBool<'a> {
    slot: &'a mut Option<Value>,
}

pub fn any_bool(slot: &mut Option<Value>) -> AnyBool<'_> {
    AnyBool { slot }
}

impl ValuePattern for AnyBool<'_> {
    fn match_value(&mut self, module: &Module, value: Value) -> bool {
        if !module.value_type(value).is_bool() {
            return false;
        }
        *self.slot = Some(value);
        true
    }
}

/// Matches a 1-bit constant of value 1
pub struct One;

pub fn one() -> One {
    One
}

impl ValuePattern for One {
    fn match_value(&mut self, module: &Module, value: Value) -> bool {
        let Some(op) = module.defining_op(value) else {
            return false;
        };
        matches!(module.op(op).kind, OpKind::Constant { value: 1 })
            && module.value_type(value) == Type::Int(1)
    }
}

/// Operand sub-matchers of a [`BindOp`]; implemented for tuples
pub trait OperandPatterns {
    fn arity(&self) -> usize;
    fn match_operands(&mut self, module: &Module, operands: &[Value]) -> bool;
}

impl OperandPatterns for () {
    fn arity(&self) -> usize {
        0
    }
    fn match_operands(&mut self, _module: &Module, _operands: &[Value]) -> bool {
        true
    }
}

impl<A: ValuePattern> OperandPatterns for (A,) {
    fn arity(&self) -> usize {
        1
    }
    fn match_operands(&mut self, module: &Module, operands: &[Value]) -> bool {
        self.0.match_value(module, operands[0])
    }
}

impl<A: ValuePattern, B: ValuePattern> OperandPatterns for (A, B) {
    fn arity(&self) -> usize {
        2
    }
    fn match_operands(&mut self, module: &Module, operands: &[Value]) -> bool {
        self.0.match_value(module, operands[0]) && self.1.match_value(module, operands[1])
    }
}

impl<A: ValuePattern, B: ValuePattern, C: ValuePattern> OperandPatterns for (A, B, C) {
    fn arity(&self) -> usize {
        3
    }
    fn match_operands(&mut self, module: &Module, operands: &[Value]) -> bool {
        self.0.match_value(module, operands[0])
            && self.1.match_value(module, operands[1])
            && self.2.match_value(module, operands[2])
    }
}

/// Matches a value defined by an operation satisfying `kind`, with each
/// operand matched by the corresponding sub-matcher; captures the operation
pub struct BindOp<'a, P> {
    kind: fn(&OpKind) -> bool,
    slot: &'a mut Option<OpId>,
    operands: P,
}

pub fn bind_op<P: OperandPatterns>(
    kind: fn(&OpKind) -> bool,
    slot: &mut Option<OpId>,
    operands: P,
) -> BindOp<'_, P> {
    BindOp {
        kind,
        slot,
        operands,
    }
}

impl<P: OperandPatterns> ValuePattern for BindOp<'_, P> {
    fn match_value(&mut self, module: &Module, value: Value) -> bool {
        let Some(op) = module.defining_op(value) else {
            return false;
        };
        let data = module.op(op);
        if !(self.kind)(&data.kind) {
            return false;
        }
        if data.operands.len() != self.operands.arity() {
            return false;
        }
        if !self.operands.match_operands(module, &data.operands) {
            return false;
        }
        *self.slot = Some(op);
        true
    }
}
