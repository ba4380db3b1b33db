//! Conversion rules for the verification layer
//!
//! Two rewrites: reset-tracking (`has_been_reset`) becomes a self-feeding
//! latch, and clocked property assertions become `always` blocks with
//! immediate assertions. Assertion shapes are recognized in order: a
//! non-overlapping implication with a fixed delay, an overlapping
//! implication, then a plain clocked property. Everything else is rejected
//! with a diagnostic.

use silica_ir::matchers::{any_bool, bind_op, one, ValuePattern};
use silica_ir::{
    event_control_for_edge, BackedgeBuilder, CmpPred, Module, OpId, OpKind, Rewriter, Type, Value,
};
use tracing::trace;

use crate::LowerError;

fn is_ltl_clock(kind: &OpKind) -> bool {
    matches!(kind, OpKind::LtlClock { .. })
}

fn is_ltl_disable(kind: &OpKind) -> bool {
    matches!(kind, OpKind::LtlDisable)
}

fn is_ltl_implication(kind: &OpKind) -> bool {
    matches!(kind, OpKind::LtlImplication)
}

fn is_ltl_concat(kind: &OpKind) -> bool {
    matches!(kind, OpKind::LtlConcat)
}

fn is_ltl_delay(kind: &OpKind) -> bool {
    matches!(kind, OpKind::LtlDelay { .. })
}

/// Bindings of the non-overlapping implication shape
/// `clock(disable(implication(concat(a, delay(1)), b), d), clk)`
struct NoiMatch {
    clock_op: OpId,
    disable_op: OpId,
    impl_op: OpId,
    concat_op: OpId,
    delay_op: OpId,
    antecedent: Value,
    consequent: Value,
    disable_cond: Value,
    ltl_clock: Value,
}

/// Bindings of the overlapping implication shape
/// `clock(disable(implication(a, b), d), clk)`
struct OiMatch {
    clock_op: OpId,
    disable_op: OpId,
    impl_op: OpId,
    antecedent: Value,
    consequent: Value,
    disable_cond: Value,
    ltl_clock: Value,
}

/// Bindings of the plain clocked property shape `clock(disable(x, d), clk)`
struct GeneralMatch {
    clock_op: OpId,
    disable_op: OpId,
    input: Value,
    disable_cond: Value,
    ltl_clock: Value,
}

fn match_noi(module: &Module, property: Value) -> Option<NoiMatch> {
    let mut clock_op = None;
    let mut disable_op = None;
    let mut impl_op = None;
    let mut concat_op = None;
    let mut delay_op = None;
    let mut antecedent = None;
    let mut consequent = None;
    let mut disable_cond = None;
    let mut ltl_clock = None;

    let matched = bind_op(
        is_ltl_clock,
        &mut clock_op,
        (
            bind_op(
                is_ltl_disable,
                &mut disable_op,
                (
                    bind_op(
                        is_ltl_implication,
                        &mut impl_op,
                        (
                            bind_op(
                                is_ltl_concat,
                                &mut concat_op,
                                (
                                    any_bool(&mut antecedent),
                                    bind_op(is_ltl_delay, &mut delay_op, (one(),)),
                                ),
                            ),
                            any_bool(&mut consequent),
                        ),
                    ),
                    any_bool(&mut disable_cond),
                ),
            ),
            any_bool(&mut ltl_clock),
        ),
    )
    .match_value(module, property);

    if !matched {
        return None;
    }
    Some(NoiMatch {
        clock_op: clock_op?,
        disable_op: disable_op?,
        impl_op: impl_op?,
        concat_op: concat_op?,
        delay_op: delay_op?,
        antecedent: antecedent?,
        consequent: consequent?,
        disable_cond: disable_cond?,
        ltl_clock: ltl_clock?,
    })
}

fn match_oi(module: &Module, property: Value) -> Option<OiMatch> {
    let mut clock_op = None;
    let mut disable_op = None;
    let mut impl_op = None;
    let mut antecedent = None;
    let mut consequent = None;
    let mut disable_cond = None;
    let mut ltl_clock = None;

    let matched = bind_op(
        is_ltl_clock,
        &mut clock_op,
        (
            bind_op(
                is_ltl_disable,
                &mut disable_op,
                (
                    bind_op(
                        is_ltl_implication,
                        &mut impl_op,
                        (any_bool(&mut antecedent), any_bool(&mut consequent)),
                    ),
                    any_bool(&mut disable_cond),
                ),
            ),
            any_bool(&mut ltl_clock),
        ),
    )
    .match_value(module, property);

    if !matched {
        return None;
    }
    Some(OiMatch {
        clock_op: clock_op?,
        disable_op: disable_op?,
        impl_op: impl_op?,
        antecedent: antecedent?,
        consequent: consequent?,
        disable_cond: disable_cond?,
        ltl_clock: ltl_clock?,
    })
}

fn match_general(module: &Module, property: Value) -> Option<GeneralMatch> {
    let mut clock_op = None;
    let mut disable_op = None;
    let mut input = None;
    let mut disable_cond = None;
    let mut ltl_clock = None;

    let matched = bind_op(
        is_ltl_clock,
        &mut clock_op,
        (
            bind_op(
                is_ltl_disable,
                &mut disable_op,
                (any_bool(&mut input), any_bool(&mut disable_cond)),
            ),
            any_bool(&mut ltl_clock),
        ),
    )
    .match_value(module, property);

    if !matched {
        return None;
    }
    Some(GeneralMatch {
        clock_op: clock_op?,
        disable_op: disable_op?,
        input: input?,
        disable_cond: disable_cond?,
        ltl_clock: ltl_clock?,
    })
}

/// Builds `!a || b` at the rewriter's insertion point
fn make_implication(rw: &mut Rewriter, antecedent: Value, consequent: Value) -> Value {
    let const_one = rw.constant(1, 1);
    let not_a = rw.xor(antecedent, const_one);
    rw.or(not_a, consequent)
}

/// Builds the RTL for `a ##n true |-> b`: a saturating delay counter, a
/// pipeline of `n` antecedent registers, and the condition
/// `count < n || (!a_{n-1} || b) || disable`.
fn make_non_overlapping_implication(
    module: &mut Module,
    at: OpId,
    antecedent: Value,
    consequent: Value,
    delay_cycles: u64,
    ltl_clock: Value,
    disable_cond: Value,
) -> Value {
    // The counter saturates at delay_cycles, so log2(n) + 1 bits suffice.
    let width = (64 - delay_cycles.leading_zeros()).max(1);

    let mut rw = Rewriter::before(module, at);
    let const_zero = rw.constant(width, 0);
    let const_one = rw.constant(width, 1);

    let mut bb = BackedgeBuilder::new();
    let count = bb.backedge(&mut rw, Type::Int(width));

    // count' = (count == n) ? n : count + 1, cleared while disabled
    let count_inc = rw.add(count.value(), const_one);
    let count_max = rw.constant(width, delay_cycles as i64);
    let at_max = rw.cmp(CmpPred::Eq, count.value(), count_max);
    let count_next = rw.mux(at_max, count_max, count_inc);
    let clock = rw.to_clock(ltl_clock);
    let count_reg = rw.reg_with_reset(
        "delay_",
        count_next,
        clock,
        disable_cond,
        const_zero,
        Some(0),
    );
    bb.set(&mut rw, count, count_reg);

    // Antecedent pipeline a_0 .. a_{n-1}, every stage cleared while disabled
    let reset_val = rw.constant(1, 0);
    let mut a_i = rw.reg_with_reset(
        "antecedent_0",
        antecedent,
        clock,
        disable_cond,
        reset_val,
        Some(0),
    );
    for i in 1..delay_cycles {
        a_i = rw.reg_with_reset(
            format!("antecedent_{}", i),
            a_i,
            clock,
            disable_cond,
            reset_val,
            Some(0),
        );
    }

    // count < n || (!a_{n-1} || b) || disable
    let below_max = rw.cmp(CmpPred::Ult, count_reg, count_max);
    let const_one_a = rw.constant(1, 1);
    let not_a = rw.xor(a_i, const_one_a);
    let impl_a = rw.or(not_a, consequent);
    let lhs = rw.or(below_max, impl_a);
    rw.or(lhs, disable_cond)
}

/// Lowers `has_been_reset(clock, reset)` to a latch that is 1 from the cycle
/// after reset was first asserted onward, reading 0 while reset is high.
pub(crate) fn lower_has_been_reset(module: &mut Module, op: OpId) {
    let clock = module.op(op).operands[0];
    let reset = module.op(op).operands[1];

    let mut rw = Rewriter::before(module, op);
    let const_one = rw.constant(1, 1);

    // The register feeds itself through an OR with the reset, so it stays 1
    // forever once the reset has been seen. It must not itself be reset.
    let mut bb = BackedgeBuilder::new();
    let reg_out = bb.backedge(&mut rw, Type::Int(1));
    let or_reset = rw.or(reset, reg_out.value());
    let clk = rw.to_clock(clock);
    let reg = rw.reg("hbr", or_reset, clk, Some(0));
    bb.set(&mut rw, reg_out, reg);

    // Read 0 during an active reset cycle: hbr && !reset
    let not_reset = rw.xor(reset, const_one);
    rw.replace_op_with(op, OpKind::And, vec![reg, not_reset], Type::Int(1));
}

/// Lowers a clocked property assertion to an `always` block with an
/// immediate assertion, erasing the consumed LTL operations.
pub(crate) fn lower_assert(module: &mut Module, op: OpId) -> Result<(), LowerError> {
    let property = module.op(op).operands[0];
    let label = match &module.op(op).kind {
        OpKind::VerifAssert { label } => label.clone(),
        kind => unreachable!("lower_assert on non-assert op {:?}", kind),
    };

    let clock_op;
    let disable_op;
    let disable_cond;
    let ltl_clock;
    let mut impl_op = None;
    let mut concat_op = None;
    let mut delay_op = None;
    let disable_input;

    if let Some(noi) = match_noi(module, property) {
        let (delay, length) = match module.op(noi.delay_op).kind {
            OpKind::LtlDelay { delay, length } => (delay, length),
            _ => unreachable!("bound delay op has wrong kind"),
        };
        // The ##n offset is carried by the delay attribute; a non-trivial
        // window cannot be encoded with a fixed pipeline.
        if length != 0 {
            return Err(LowerError::NonZeroDelayLength {
                module: module.name.clone(),
            });
        }
        trace!(delay, "lowering non-overlapping implication");
        disable_input = make_non_overlapping_implication(
            module,
            op,
            noi.antecedent,
            noi.consequent,
            delay,
            noi.ltl_clock,
            noi.disable_cond,
        );
        clock_op = noi.clock_op;
        disable_op = noi.disable_op;
        disable_cond = noi.disable_cond;
        ltl_clock = noi.ltl_clock;
        impl_op = Some(noi.impl_op);
        concat_op = Some(noi.concat_op);
        delay_op = Some(noi.delay_op);
    } else if let Some(oi) = match_oi(module, property) {
        trace!("lowering overlapping implication");
        let mut rw = Rewriter::before(module, op);
        disable_input = make_implication(&mut rw, oi.antecedent, oi.consequent);
        clock_op = oi.clock_op;
        disable_op = oi.disable_op;
        disable_cond = oi.disable_cond;
        ltl_clock = oi.ltl_clock;
        impl_op = Some(oi.impl_op);
    } else if let Some(general) = match_general(module, property) {
        trace!("lowering plain clocked assertion");
        disable_input = general.input;
        clock_op = general.clock_op;
        disable_op = general.disable_op;
        disable_cond = general.disable_cond;
        ltl_clock = general.ltl_clock;
    } else {
        return Err(LowerError::InvalidPropertyShape {
            module: module.name.clone(),
        });
    }

    let mut rw = Rewriter::before(module, op);

    // A disabled assertion is vacuously true: disable || body
    let disable_val = rw.replace_op_with(
        disable_op,
        OpKind::Or,
        vec![disable_cond, disable_input],
        Type::Int(1),
    );

    // always @(edge clock) { assert(cond, label) }
    let edge = match rw.module().op(clock_op).kind {
        OpKind::LtlClock { edge } => edge,
        ref kind => unreachable!("bound clock op has wrong kind {:?}", kind),
    };
    let event = event_control_for_edge(edge);
    rw.create_with_body(OpKind::Always { event }, vec![ltl_clock], |rw| {
        rw.create(OpKind::Assert { label }, vec![disable_val], None);
    });

    // Retire the consumed ops, uses-first.
    rw.erase_op(op);
    rw.erase_op(clock_op);
    if let Some(id) = impl_op {
        rw.erase_op(id);
    }
    if let Some(id) = concat_op {
        rw.erase_op(id);
    }
    if let Some(id) = delay_op {
        rw.erase_op(id);
    }
    Ok(())
}
