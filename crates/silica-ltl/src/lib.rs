#![allow(dead_code, unused_variables, unused_imports)]
//! silica LTL lowering - clocked assertions down to core RTL
//!
//! This crate provides:
//! - Lowering of `has_been_reset` to a self-feeding latch
//! - Lowering of clocked LTL assertion shapes (non-overlapping implication
//!   with fixed delay, overlapping implication, plain clocked property) to
//!   `always` blocks with immediate assertions
//! - A legality check: no verification op survives the pass

mod lower;

use silica_ir::{Module, OpKind};
use thiserror::Error;
use tracing::debug;

/// Errors reported by the lowering pass
#[derive(Error, Debug)]
pub enum LowerError {
    #[error("in module '{module}': delay must have a length of 0")]
    NonZeroDelayLength { module: String },
    #[error("in module '{module}': assert property format is invalid")]
    InvalidPropertyShape { module: String },
    #[error("in module '{module}': {count} verification op(s) remain after lowering")]
    IllegalOpsRemain { module: String, count: usize },
}

pub type LowerResult<T> = Result<T, LowerError>;

/// Lower every verification op in the module to core RTL.
///
/// On success, no op of the verification layer remains; the LTL ops that
/// expressed the matched assertions are erased. Any unrecognized assertion
/// shape fails the whole pass and leaves that assertion unchanged.
pub fn lower_to_core(module: &mut Module) -> LowerResult<()> {
    let mut worklist = Vec::new();
    module.walk(|id, op| {
        if op.kind.is_verif() {
            worklist.push(id);
        }
    });
    debug!(
        module = %module.name,
        count = worklist.len(),
        "lowering verification ops"
    );

    for id in worklist {
        // A previous rewrite may have consumed the op.
        if module.try_op(id).is_none() {
            continue;
        }
        if matches!(module.op(id).kind, OpKind::HasBeenReset) {
            lower::lower_has_been_reset(module, id);
        } else if matches!(module.op(id).kind, OpKind::VerifAssert { .. }) {
            lower::lower_assert(module, id)?;
        }
    }

    // Target legality: the verification layer must be gone.
    let mut remaining = 0usize;
    module.walk(|_, op| {
        if op.kind.is_verif() {
            remaining += 1;
        }
    });
    if remaining > 0 {
        return Err(LowerError::IllegalOpsRemain {
            module: module.name.clone(),
            count: remaining,
        });
    }
    Ok(())
}
