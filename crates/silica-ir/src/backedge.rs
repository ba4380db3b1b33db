//! Back-edges: placeholder values for one-pass construction of feedback
//!
//! A register whose combinational input mentions its own output cannot be
//! built front-to-back without a placeholder. [`BackedgeBuilder`] vends
//! placeholder values of a requested type; binding a [`Backedge`] rewrites
//! every use with the real value and retires the placeholder. A builder
//! dropped with unbound edges is a programming error and panics.

use crate::builder::Rewriter;
use crate::ir::{OpId, OpKind, Type, Value};

/// A placeholder value, uniquely owned by the scope that created it
#[derive(Debug)]
pub struct Backedge {
    op: OpId,
    ty: Type,
}

impl Backedge {
    /// The placeholder value; usable as an operand until the edge is set
    pub fn value(&self) -> Value {
        Value::Result(self.op)
    }
}

/// Scoped vendor of back-edges
#[derive(Debug, Default)]
pub struct BackedgeBuilder {
    unresolved: Vec<OpId>,
}

impl BackedgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vend a placeholder of the given type at the rewriter's insertion point
    pub fn backedge(&mut self, rw: &mut Rewriter, ty: Type) -> Backedge {
        let op = rw.create(OpKind::Backedge, vec![], Some(ty));
        self.unresolved.push(op);
        Backedge { op, ty }
    }

    /// Bind a back-edge: every use of the placeholder is rewritten to `value`.
    ///
    /// Consumes the edge, so an edge can be set at most once.
    pub fn set(&mut self, rw: &mut Rewriter, edge: Backedge, value: Value) {
        assert_eq!(
            rw.module().value_type(value),
            edge.ty,
            "backedge bound to a value of a different type"
        );
        rw.replace_op(edge.op, value);
        self.unresolved.retain(|&o| o != edge.op);
    }
}

impl Drop for BackedgeBuilder {
    fn drop(&mut self) {
        if !self.unresolved.is_empty() && !std::thread::panicking() {
            panic!(
                "{} backedge(s) dropped without being set",
                self.unresolved.len()
            );
        }
    }
}
