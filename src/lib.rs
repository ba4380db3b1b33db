//! silica - hardware IR lowering to RTL assertions and BTOR2
//!
//! Two passes over a shared structural IR:
//! - [`lower_to_core`]: clocked LTL assertion shapes and reset tracking down
//!   to gates, registers and immediate assertions
//! - [`emit_btor2`]: flat BTOR2 transition-system text for bounded model
//!   checking
//!
//! The passes are independent; [`compile_to_btor2`] chains them for designs
//! whose assertions still live in the LTL layer.

pub use silica_btor2::{emit_design, emit_design_with, emit_module, EmitterOptions, MODULE_BANNER};
pub use silica_ir::{
    Backedge, BackedgeBuilder, ClockEdge, CmpPred, Design, EventControl, Module, OpData, OpId,
    OpKind, PortDirection, PortInfo, Rewriter, Type, Value,
};
pub use silica_ltl::{lower_to_core, LowerError, LowerResult};

use anyhow::Result;
use tracing::debug;

/// Emit BTOR2 for a design whose modules are already in core form
pub fn emit_btor2(design: &Design) -> String {
    silica_btor2::emit_design(design)
}

/// Lower every module's assertions to core form, then emit BTOR2
pub fn compile_to_btor2(design: &mut Design) -> Result<String> {
    for module in &mut design.modules {
        debug!(module = %module.name, "lowering assertions to core");
        silica_ltl::lower_to_core(module)?;
    }
    Ok(silica_btor2::emit_design(design))
}
