//! The per-module BTOR2 emitter
//!
//! Emission state and one generation routine per BTOR2 instruction family.
//! Every emitted line consumes exactly one LID; every operand referenced by
//! a line must already have one, except register `next` arcs which are
//! deferred by construction. Operations outside the supported set contribute
//! no proof obligation and are skipped silently.

use indexmap::IndexMap;
use silica_ir::{Design, Module, OpData, OpId, OpKind, PortDirection, PortInfo, Type, Value};
use tracing::debug;

use crate::MODULE_BANNER;

/// Emission options
#[derive(Debug, Clone)]
pub struct EmitterOptions {
    /// Print the module separator banner after each module
    pub banner: bool,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        Self { banner: true }
    }
}

/// Emit every module of a design, separated by the module banner
pub fn emit_design(design: &Design) -> String {
    emit_design_with(design, &EmitterOptions::default())
}

/// Emit every module of a design with explicit options
pub fn emit_design_with(design: &Design, options: &EmitterOptions) -> String {
    let mut out = String::new();
    for module in &design.modules {
        out.push_str(&emit_module(module));
        if options.banner {
            out.push_str(MODULE_BANNER);
        }
    }
    out
}

/// Emit a single module as BTOR2 text, without a trailing banner
pub fn emit_module(module: &Module) -> String {
    let emitter = Emitter::new(module);
    let out = emitter.run();
    debug!(
        module = %module.name,
        lines = out.lines().count(),
        "emitted btor2"
    );
    out
}

/// Per-module emission state
struct Emitter<'m> {
    module: &'m Module,
    out: String,
    /// Next line identifier; consumed exactly once per emitted line
    lid: u64,
    /// LID of the input named exactly `reset`, if the module has one
    reset_lid: Option<u64>,
    /// width -> LID of its `sort bitvec` line
    sort_by_width: IndexMap<u32, u64>,
    /// (value, width) -> LID; populated for the zero constant only
    const_by_value: IndexMap<(i64, u32), u64>,
    /// op -> LID of its most recent line
    op_lid: IndexMap<OpId, u64>,
    /// wire inlining: alias op -> original op
    alias: IndexMap<OpId, OpId>,
    /// input port argument index -> LID
    input_lid: IndexMap<u32, u64>,
    /// registers in module order, drained once at the end of the walk
    reg_ops: Vec<OpId>,
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module) -> Self {
        Self {
            module,
            out: String::new(),
            lid: 1,
            reset_lid: None,
            sort_by_width: IndexMap::new(),
            const_by_value: IndexMap::new(),
            op_lid: IndexMap::new(),
            alias: IndexMap::new(),
            input_lid: IndexMap::new(),
            reg_ops: Vec::new(),
        }
    }

    fn run(mut self) -> String {
        let module = self.module;

        // Ports first: inputs get explicit declarations, outputs contribute
        // nothing to the proof obligations.
        for port in &module.ports {
            self.visit_port(port);
        }

        self.walk_region(&module.body, None);
        self.finalize_registers();
        self.out
    }

    /// Claim the next line identifier
    fn take_lid(&mut self) -> u64 {
        let lid = self.lid;
        self.lid += 1;
        lid
    }

    /// Result type of an operation that must have one
    fn result_ty(&self, id: OpId, data: &OpData) -> Type {
        data.result_ty
            .unwrap_or_else(|| panic!("operation {:?} has no result type", id))
    }

    /// Follow wire aliases to the original operation
    fn resolve_alias(&self, mut op: OpId) -> OpId {
        while let Some(&original) = self.alias.get(&op) {
            op = original;
        }
        op
    }

    /// LID of a value, resolving aliases and falling back to input ports
    fn lookup_lid(&self, value: Value) -> Option<u64> {
        match value {
            Value::Result(op) => self.op_lid.get(&self.resolve_alias(op)).copied(),
            Value::Arg(idx) => self.input_lid.get(&idx).copied(),
        }
    }

    /// LID of a value that must already have been emitted
    fn operand_lid(&self, value: Value) -> u64 {
        self.lookup_lid(value)
            .unwrap_or_else(|| panic!("operand {:?} has no emitted btor2 line", value))
    }

    /// LID of an already-emitted sort
    fn sort_lid(&self, width: u32) -> u64 {
        *self
            .sort_by_width
            .get(&width)
            .unwrap_or_else(|| panic!("no sort emitted for width {}", width))
    }

    /// Make sure the sort for the given type exists and return its width
    fn require_sort(&mut self, ty: Type) -> u32 {
        let width = ty
            .bit_width()
            .unwrap_or_else(|| panic!("type {:?} has no bit width", ty));
        self.gen_sort(width);
        width
    }

    /// `<lid> sort bitvec <width>`, once per width
    fn gen_sort(&mut self, width: u32) {
        if self.sort_by_width.contains_key(&width) {
            return;
        }
        self.sort_by_width.insert(width, self.lid);
        let lid = self.take_lid();
        self.out.push_str(&format!("{} sort bitvec {}\n", lid, width));
    }

    /// `<lid> input <sid> <name>`
    fn gen_input(&mut self, width: u32, name: &str) {
        let sid = self.sort_lid(width);
        let lid = self.take_lid();
        self.out.push_str(&format!("{} input {} {}\n", lid, sid, name));
    }

    /// `<lid> constd <sid> <value>`
    fn gen_const(&mut self, op: OpId, value: i64, width: u32) {
        self.op_lid.insert(op, self.lid);
        let sid = self.sort_lid(width);
        let lid = self.take_lid();
        self.out
            .push_str(&format!("{} constd {} {}\n", lid, sid, value));
    }

    /// `<lid> zero <sid>`, once per width
    fn gen_zero(&mut self, width: u32) {
        if self.const_by_value.contains_key(&(0, width)) {
            return;
        }
        let sid = self.sort_lid(width);
        self.const_by_value.insert((0, width), self.lid);
        let lid = self.take_lid();
        self.out.push_str(&format!("{} zero {}\n", lid, sid));
    }

    fn zero_lid(&self, width: u32) -> u64 {
        *self
            .const_by_value
            .get(&(0, width))
            .unwrap_or_else(|| panic!("no zero emitted for width {}", width))
    }

    /// `<lid> <inst> <sid> <op1> <op2>`
    fn gen_binop(&mut self, inst: &str, op: OpId, lhs: Value, rhs: Value, width: u32) {
        self.op_lid.insert(op, self.lid);
        let sid = self.sort_lid(width);
        let lhs_lid = self.operand_lid(lhs);
        let rhs_lid = self.operand_lid(rhs);
        let lid = self.take_lid();
        self.out.push_str(&format!(
            "{} {} {} {} {}\n",
            lid, inst, sid, lhs_lid, rhs_lid
        ));
    }

    /// `<lid> slice <sid> <op> <high> <low>`
    fn gen_slice(&mut self, op: OpId, operand: Value, low_bit: u32, width: u32) {
        self.op_lid.insert(op, self.lid);
        let sid = self.sort_lid(width);
        let operand_lid = self.operand_lid(operand);
        let lid = self.take_lid();
        self.out.push_str(&format!(
            "{} slice {} {} {} {}\n",
            lid,
            sid,
            operand_lid,
            low_bit + width - 1,
            low_bit
        ));
    }

    /// `<lid> <inst> <sid> <op>`, the operand given as a raw LID
    fn gen_unary(&mut self, inst: &str, op: OpId, operand_lid: u64, width: u32) {
        self.op_lid.insert(op, self.lid);
        let sid = self.sort_lid(width);
        let lid = self.take_lid();
        self.out
            .push_str(&format!("{} {} {} {}\n", lid, inst, sid, operand_lid));
    }

    /// `<lid> ite <sid> <cond> <then> <else>`, operands as raw LIDs
    fn gen_ite_lids(
        &mut self,
        op: Option<OpId>,
        cond_lid: u64,
        then_lid: u64,
        else_lid: u64,
        width: u32,
    ) -> u64 {
        if let Some(op) = op {
            self.op_lid.insert(op, self.lid);
        }
        let sid = self.sort_lid(width);
        let lid = self.take_lid();
        self.out.push_str(&format!(
            "{} ite {} {} {} {}\n",
            lid, sid, cond_lid, then_lid, else_lid
        ));
        lid
    }

    /// `<lid> implies <sid> <lhs> <rhs>` over the 1-bit sort
    fn gen_implies(&mut self, op: OpId, lhs_lid: u64, rhs_lid: u64) -> u64 {
        self.op_lid.insert(op, self.lid);
        let sid = self.sort_lid(1);
        let lid = self.take_lid();
        self.out.push_str(&format!(
            "{} implies {} {} {}\n",
            lid, sid, lhs_lid, rhs_lid
        ));
        lid
    }

    /// `<lid> bad <op>`
    fn gen_bad(&mut self, expr_lid: u64) {
        let lid = self.take_lid();
        self.out.push_str(&format!("{} bad {}\n", lid, expr_lid));
    }

    /// `<lid> constraint <op>`
    fn gen_constraint(&mut self, expr_lid: u64) {
        let lid = self.take_lid();
        self.out
            .push_str(&format!("{} constraint {}\n", lid, expr_lid));
    }

    /// `<lid> state <sid> <name>`
    fn gen_state(&mut self, op: OpId, width: u32, name: &str) {
        self.op_lid.insert(op, self.lid);
        let sid = self.sort_lid(width);
        let lid = self.take_lid();
        self.out.push_str(&format!("{} state {} {}\n", lid, sid, name));
    }

    /// `<lid> next <sid> <state> <value>`
    fn gen_next(&mut self, width: u32, state_lid: u64, value_lid: u64) {
        let sid = self.sort_lid(width);
        let lid = self.take_lid();
        self.out.push_str(&format!(
            "{} next {} {} {}\n",
            lid, sid, state_lid, value_lid
        ));
    }

    /// Input declarations. Outputs and clock-typed inputs are skipped; the
    /// input named exactly `reset` doubles as the register reset condition.
    fn visit_port(&mut self, port: &PortInfo) {
        if port.direction != PortDirection::Input || port.ty.is_clock() {
            return;
        }
        let width = self.require_sort(port.ty);
        self.input_lid.insert(port.arg_index, self.lid);
        if port.name == "reset" {
            self.reset_lid = Some(self.lid);
        }
        self.gen_input(width, &port.name);
    }

    fn walk_region(&mut self, region: &[OpId], enclosing_if: Option<OpId>) {
        let module = self.module;
        for &id in region {
            let data = module.op(id);
            match &data.kind {
                // A conditional block gates the assertions inside it.
                OpKind::If => self.walk_region(&data.body, Some(id)),
                OpKind::Always { .. } => self.walk_region(&data.body, enclosing_if),
                _ => self.visit(id, data, enclosing_if),
            }
        }
    }

    fn visit(&mut self, id: OpId, data: &OpData, enclosing_if: Option<OpId>) {
        match &data.kind {
            OpKind::Constant { value } => {
                let width = self.require_sort(self.result_ty(id, data));
                self.gen_const(id, *value, width);
            }
            // Wires produce no line; they alias whatever drives them.
            OpKind::Wire { .. } => match data.operands[0] {
                Value::Result(def) => {
                    self.alias.insert(id, def);
                }
                Value::Arg(idx) => {
                    if let Some(&lid) = self.input_lid.get(&idx) {
                        self.op_lid.insert(id, lid);
                    }
                }
            },
            OpKind::Output => {}
            OpKind::Add
            | OpKind::Sub
            | OpKind::Mul
            | OpKind::DivU
            | OpKind::DivS
            | OpKind::ModS
            | OpKind::Shl
            | OpKind::ShrU
            | OpKind::ShrS
            | OpKind::And
            | OpKind::Or
            | OpKind::Xor
            | OpKind::Concat => {
                let inst = binop_mnemonic(&data.kind);
                let width = self.require_sort(self.result_ty(id, data));
                self.gen_binop(inst, id, data.operands[0], data.operands[1], width);
            }
            OpKind::Extract { low_bit } => {
                let width = self.require_sort(self.result_ty(id, data));
                self.gen_slice(id, data.operands[0], *low_bit, width);
            }
            OpKind::Cmp { pred } => {
                // Comparison results are always 1 bit wide.
                self.gen_sort(1);
                let inst = match pred.mnemonic() {
                    "ne" => "neq",
                    other => other,
                };
                self.gen_binop(inst, id, data.operands[0], data.operands[1], 1);
            }
            OpKind::Mux => {
                let width = self.require_sort(self.result_ty(id, data));
                let cond = self.operand_lid(data.operands[0]);
                let then_lid = self.operand_lid(data.operands[1]);
                let else_lid = self.operand_lid(data.operands[2]);
                self.gen_ite_lids(Some(id), cond, then_lid, else_lid, width);
            }
            OpKind::Assert { .. } => {
                let expr = data.operands[0];
                self.gen_sort(1);
                // An assertion under an `if` only has to hold when the
                // condition does: en -> expr. The inverted obligation is
                // what the checker falsifies.
                let inverted_src = match enclosing_if {
                    Some(if_op) => {
                        let en = self.module.op(if_op).operands[0];
                        let en_lid = self.operand_lid(en);
                        let expr_lid = self.operand_lid(expr);
                        self.gen_implies(if_op, en_lid, expr_lid)
                    }
                    None => self.operand_lid(expr),
                };
                self.gen_unary("not", id, inverted_src, 1);
                let not_lid = self.op_lid[&id];
                self.gen_bad(not_lid);
            }
            OpKind::Assume => {
                let expr_lid = self.operand_lid(data.operands[0]);
                self.gen_constraint(expr_lid);
            }
            OpKind::Reg { name, .. } => {
                let width = self.require_sort(self.result_ty(id, data));
                self.gen_state(id, width, name);
                // The transition arc is deferred until the next value has a
                // line of its own.
                self.reg_ops.push(id);
            }
            // Anything else contributes no proof obligation.
            _ => {}
        }
    }

    /// Deferred register transitions: `state <= reset ? 0 : next`
    fn finalize_registers(&mut self) {
        let module = self.module;
        let regs = std::mem::take(&mut self.reg_ops);
        for reg in regs {
            let data = module.op(reg);
            let next = data.operands[0];
            let width = self.require_sort(self.result_ty(reg, data));
            let state_lid = *self
                .op_lid
                .get(&reg)
                .unwrap_or_else(|| panic!("register {:?} has no state line", reg));
            let next_lid = self.operand_lid(next);

            match self.reset_lid {
                Some(reset_lid) => {
                    // Reset values are assumed to be zero.
                    self.gen_zero(width);
                    let zero_lid = self.zero_lid(width);
                    let ite_lid =
                        self.gen_ite_lids(None, reset_lid, zero_lid, next_lid, width);
                    // Rebind the next expression to the gated update.
                    if let Some(next_op) = module.defining_op(next) {
                        let root = self.resolve_alias(next_op);
                        self.op_lid.insert(root, ite_lid);
                    }
                    self.gen_next(width, state_lid, ite_lid);
                }
                None => {
                    self.gen_next(width, state_lid, next_lid);
                }
            }
        }
    }
}

/// BTOR2 mnemonic for a binary operation kind
fn binop_mnemonic(kind: &OpKind) -> &'static str {
    match kind {
        OpKind::Add => "add",
        OpKind::Sub => "sub",
        OpKind::Mul => "mul",
        OpKind::DivU => "udiv",
        OpKind::DivS => "sdiv",
        OpKind::ModS => "smod",
        OpKind::Shl => "sll",
        OpKind::ShrU => "srl",
        OpKind::ShrS => "sra",
        OpKind::And => "and",
        OpKind::Or => "or",
        OpKind::Xor => "xor",
        OpKind::Concat => "concat",
        other => panic!("operation {:?} is not a binary btor2 op", other),
    }
}
