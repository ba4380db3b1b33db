//! Tests for the LTL-to-core lowering pass

use std::collections::HashMap;

use silica_ir::{
    ClockEdge, CmpPred, EventControl, Module, OpData, OpId, OpKind, PortDirection, Type, Value,
};
use silica_ltl::{lower_to_core, LowerError};

/// Build `assert(clock(disable(implication(a, b), d), clk))`
fn overlapping_implication_module() -> Module {
    let mut m = Module::new("oi");
    let clk = m.add_port("clk", PortDirection::Input, Type::Int(1));
    let a = m.add_port("a", PortDirection::Input, Type::Int(1));
    let b = m.add_port("b", PortDirection::Input, Type::Int(1));
    let d = m.add_port("d", PortDirection::Input, Type::Int(1));

    let impl_op = m.append_op(OpData::new(
        OpKind::LtlImplication,
        vec![a, b],
        Some(Type::Property),
    ));
    let disable = m.append_op(OpData::new(
        OpKind::LtlDisable,
        vec![Value::Result(impl_op), d],
        Some(Type::Property),
    ));
    let clock = m.append_op(OpData::new(
        OpKind::LtlClock {
            edge: ClockEdge::Pos,
        },
        vec![Value::Result(disable), clk],
        Some(Type::Property),
    ));
    m.append_op(OpData::new(
        OpKind::VerifAssert {
            label: Some("oi".to_string()),
        },
        vec![Value::Result(clock)],
        None,
    ));
    m
}

/// Build `assert(clock(disable(implication(concat(a, delay(1, n, length)), b), d), clk))`
fn non_overlapping_implication_module(delay: u64, length: u64) -> Module {
    let mut m = Module::new("noi");
    let clk = m.add_port("clk", PortDirection::Input, Type::Int(1));
    let a = m.add_port("a", PortDirection::Input, Type::Int(1));
    let b = m.add_port("b", PortDirection::Input, Type::Int(1));
    let d = m.add_port("d", PortDirection::Input, Type::Int(1));

    let one = m.append_op(OpData::new(
        OpKind::Constant { value: 1 },
        vec![],
        Some(Type::Int(1)),
    ));
    let delay_op = m.append_op(OpData::new(
        OpKind::LtlDelay { delay, length },
        vec![Value::Result(one)],
        Some(Type::Sequence),
    ));
    let concat = m.append_op(OpData::new(
        OpKind::LtlConcat,
        vec![a, Value::Result(delay_op)],
        Some(Type::Sequence),
    ));
    let impl_op = m.append_op(OpData::new(
        OpKind::LtlImplication,
        vec![Value::Result(concat), b],
        Some(Type::Property),
    ));
    let disable = m.append_op(OpData::new(
        OpKind::LtlDisable,
        vec![Value::Result(impl_op), d],
        Some(Type::Property),
    ));
    let clock = m.append_op(OpData::new(
        OpKind::LtlClock {
            edge: ClockEdge::Pos,
        },
        vec![Value::Result(disable), clk],
        Some(Type::Property),
    ));
    m.append_op(OpData::new(
        OpKind::VerifAssert { label: None },
        vec![Value::Result(clock)],
        None,
    ));
    m
}

/// The single `always` block and the assertion inside it
fn find_assertion(m: &Module) -> (OpId, OpId) {
    let mut found = None;
    m.walk(|id, op| {
        if let OpKind::Always { .. } = op.kind {
            assert_eq!(op.body.len(), 1, "always block should hold one assertion");
            found = Some((id, op.body[0]));
        }
    });
    found.expect("no always block after lowering")
}

fn collect_registers(m: &Module) -> Vec<OpId> {
    let mut regs = Vec::new();
    m.walk(|id, op| {
        if matches!(op.kind, OpKind::Reg { .. }) {
            regs.push(id);
        }
    });
    regs
}

fn assert_no_verif_or_ltl(m: &Module) {
    m.walk(|_, op| {
        assert!(!op.kind.is_verif(), "verif op survived lowering: {:?}", op.kind);
        assert!(!op.kind.is_ltl(), "ltl op survived lowering: {:?}", op.kind);
    });
}

// === A tiny register-level evaluator for semantic checks ===

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn eval(m: &Module, value: Value, inputs: &HashMap<u32, u64>, state: &HashMap<OpId, u64>) -> u64 {
    match value {
        Value::Arg(idx) => inputs[&idx],
        Value::Result(id) => {
            let op = m.op(id);
            let w = m.value_type(value).bit_width().unwrap_or(1);
            match &op.kind {
                OpKind::Constant { value } => (*value as u64) & mask(w),
                OpKind::Reg { .. } => state[&id],
                OpKind::Wire { .. } | OpKind::ToClock => eval(m, op.operands[0], inputs, state),
                OpKind::And => {
                    eval(m, op.operands[0], inputs, state) & eval(m, op.operands[1], inputs, state)
                }
                OpKind::Or => {
                    eval(m, op.operands[0], inputs, state) | eval(m, op.operands[1], inputs, state)
                }
                OpKind::Xor => {
                    eval(m, op.operands[0], inputs, state) ^ eval(m, op.operands[1], inputs, state)
                }
                OpKind::Add => (eval(m, op.operands[0], inputs, state)
                    .wrapping_add(eval(m, op.operands[1], inputs, state)))
                    & mask(w),
                OpKind::Mux => {
                    if eval(m, op.operands[0], inputs, state) != 0 {
                        eval(m, op.operands[1], inputs, state)
                    } else {
                        eval(m, op.operands[2], inputs, state)
                    }
                }
                OpKind::Cmp { pred } => {
                    let lhs = eval(m, op.operands[0], inputs, state);
                    let rhs = eval(m, op.operands[1], inputs, state);
                    let r = match pred {
                        CmpPred::Eq => lhs == rhs,
                        CmpPred::Ne => lhs != rhs,
                        CmpPred::Ult => lhs < rhs,
                        other => panic!("evaluator does not handle {:?}", other),
                    };
                    r as u64
                }
                other => panic!("evaluator does not handle {:?}", other),
            }
        }
    }
}

/// Initial register state from the power-on values
fn initial_state(m: &Module) -> HashMap<OpId, u64> {
    collect_registers(m)
        .into_iter()
        .map(|id| {
            let init = match &m.op(id).kind {
                OpKind::Reg { initial, .. } => initial.unwrap_or(0) as u64,
                _ => unreachable!(),
            };
            (id, init)
        })
        .collect()
}

/// One clock edge: every register latches reset ? reset_value : next
fn step(m: &Module, inputs: &HashMap<u32, u64>, state: &HashMap<OpId, u64>) -> HashMap<OpId, u64> {
    let mut next_state = HashMap::new();
    for id in collect_registers(m) {
        let op = m.op(id);
        let next = if op.operands.len() >= 4 && eval(m, op.operands[2], inputs, state) != 0 {
            eval(m, op.operands[3], inputs, state)
        } else {
            eval(m, op.operands[0], inputs, state)
        };
        next_state.insert(id, next);
    }
    next_state
}

// === Overlapping implication ===

#[test]
fn oi_lowers_to_immediate_assertion() {
    let mut m = overlapping_implication_module();
    lower_to_core(&mut m).unwrap();
    assert_no_verif_or_ltl(&m);

    let (always, assertion) = find_assertion(&m);
    assert!(matches!(
        m.op(always).kind,
        OpKind::Always {
            event: EventControl::PosEdge
        }
    ));
    // The always block is sensitive to the clock port.
    assert_eq!(m.op(always).operands, vec![Value::Arg(0)]);
    assert!(matches!(
        &m.op(assertion).kind,
        OpKind::Assert { label: Some(l) } if l == "oi"
    ));
}

#[test]
fn oi_condition_is_disable_or_not_a_or_b() {
    let mut m = overlapping_implication_module();
    lower_to_core(&mut m).unwrap();

    let (_, assertion) = find_assertion(&m);
    let a = Value::Arg(1);
    let b = Value::Arg(2);
    let d = Value::Arg(3);

    // d || (!a || b)
    let cond = m.op(assertion).operands[0];
    let outer = m.defining_op(cond).unwrap();
    assert!(matches!(m.op(outer).kind, OpKind::Or));
    assert_eq!(m.op(outer).operands[0], d);

    let impl_or = m.defining_op(m.op(outer).operands[1]).unwrap();
    assert!(matches!(m.op(impl_or).kind, OpKind::Or));
    assert_eq!(m.op(impl_or).operands[1], b);

    let not_a = m.defining_op(m.op(impl_or).operands[0]).unwrap();
    assert!(matches!(m.op(not_a).kind, OpKind::Xor));
    assert_eq!(m.op(not_a).operands[0], a);
}

#[test]
fn oi_condition_semantics() {
    let mut m = overlapping_implication_module();
    lower_to_core(&mut m).unwrap();
    let (_, assertion) = find_assertion(&m);
    let cond = m.op(assertion).operands[0];
    let state = initial_state(&m);

    // (a, b, d) -> expected d || !a || b
    for (a, b, d, expected) in [
        (0, 0, 0, 1),
        (1, 0, 0, 0),
        (1, 1, 0, 1),
        (1, 0, 1, 1),
        (0, 1, 0, 1),
    ] {
        let inputs = HashMap::from([(0, 0), (1, a), (2, b), (3, d)]);
        assert_eq!(eval(&m, cond, &inputs, &state), expected, "a={a} b={b} d={d}");
    }
}

// === Non-overlapping implication ===

#[test]
fn noi_builds_counter_and_pipeline() {
    let mut m = non_overlapping_implication_module(3, 0);
    lower_to_core(&mut m).unwrap();
    assert_no_verif_or_ltl(&m);

    let regs = collect_registers(&m);
    assert_eq!(regs.len(), 4, "counter plus three pipeline stages");

    // The saturating counter fits 0..=3 in two bits.
    let counter = regs
        .iter()
        .find(|&&id| matches!(&m.op(id).kind, OpKind::Reg { name, .. } if name == "delay_"))
        .copied()
        .expect("no delay counter register");
    assert_eq!(m.op(counter).result_ty, Some(Type::Int(2)));

    // Pipeline stages chain antecedent_0 -> antecedent_1 -> antecedent_2.
    let stage = |n: &str| {
        regs.iter()
            .find(|&&id| matches!(&m.op(id).kind, OpKind::Reg { name, .. } if name == n))
            .copied()
            .unwrap_or_else(|| panic!("missing register {}", n))
    };
    let a0 = stage("antecedent_0");
    let a1 = stage("antecedent_1");
    let a2 = stage("antecedent_2");
    assert_eq!(m.op(a0).operands[0], Value::Arg(1), "stage 0 reads a");
    assert_eq!(m.op(a1).operands[0], Value::Result(a0));
    assert_eq!(m.op(a2).operands[0], Value::Result(a1));

    // Every stage and the counter are cleared by the disable condition.
    let d = Value::Arg(3);
    for &reg in &regs {
        assert_eq!(m.op(reg).operands[2], d, "register not reset by disable");
    }
}

#[test]
fn noi_condition_shape() {
    let mut m = non_overlapping_implication_module(3, 0);
    lower_to_core(&mut m).unwrap();

    let (_, assertion) = find_assertion(&m);
    let d = Value::Arg(3);

    // d || ((count < 3 || (!a_2 || b)) || d)
    let cond = m.op(assertion).operands[0];
    let outer = m.defining_op(cond).unwrap();
    assert!(matches!(m.op(outer).kind, OpKind::Or));
    assert_eq!(m.op(outer).operands[0], d);

    let body = m.defining_op(m.op(outer).operands[1]).unwrap();
    assert!(matches!(m.op(body).kind, OpKind::Or));
    assert_eq!(m.op(body).operands[1], d);

    let lhs = m.defining_op(m.op(body).operands[0]).unwrap();
    assert!(matches!(m.op(lhs).kind, OpKind::Or));
    let below = m.defining_op(m.op(lhs).operands[0]).unwrap();
    assert!(matches!(m.op(below).kind, OpKind::Cmp { pred: CmpPred::Ult }));
    let limit = m.defining_op(m.op(below).operands[1]).unwrap();
    assert!(matches!(m.op(limit).kind, OpKind::Constant { value: 3 }));
}

#[test]
fn noi_checks_consequent_after_three_cycles() {
    let mut m = non_overlapping_implication_module(3, 0);
    lower_to_core(&mut m).unwrap();
    let (_, assertion) = find_assertion(&m);
    let cond = m.op(assertion).operands[0];

    // a fires at cycle 0, so b is due at cycle 3.
    let a_trace = [1u64, 0, 0, 0, 0, 0];
    let run = |b_trace: [u64; 6]| -> Vec<u64> {
        let mut state = initial_state(&m);
        let mut out = Vec::new();
        for t in 0..6 {
            let inputs = HashMap::from([(0, 0), (1, a_trace[t]), (2, b_trace[t]), (3, 0)]);
            out.push(eval(&m, cond, &inputs, &state));
            state = step(&m, &inputs, &state);
        }
        out
    };

    // b arrives on time: the assertion holds every cycle.
    assert_eq!(run([0, 0, 0, 1, 0, 0]), vec![1, 1, 1, 1, 1, 1]);
    // b never arrives: the assertion fails exactly when the obligation is due.
    assert_eq!(run([0, 0, 0, 0, 0, 0]), vec![1, 1, 1, 0, 1, 1]);
}

#[test]
fn noi_with_nonzero_length_is_rejected() {
    let mut m = non_overlapping_implication_module(3, 1);
    let err = lower_to_core(&mut m).unwrap_err();
    assert!(matches!(err, LowerError::NonZeroDelayLength { .. }));
}

// === General assert-property ===

#[test]
fn plain_clocked_property_is_gated_by_disable() {
    let mut m = Module::new("plain");
    let clk = m.add_port("clk", PortDirection::Input, Type::Int(1));
    let x = m.add_port("x", PortDirection::Input, Type::Int(1));
    let d = m.add_port("d", PortDirection::Input, Type::Int(1));
    let disable = m.append_op(OpData::new(
        OpKind::LtlDisable,
        vec![x, d],
        Some(Type::Property),
    ));
    let clock = m.append_op(OpData::new(
        OpKind::LtlClock {
            edge: ClockEdge::Neg,
        },
        vec![Value::Result(disable), clk],
        Some(Type::Property),
    ));
    m.append_op(OpData::new(
        OpKind::VerifAssert { label: None },
        vec![Value::Result(clock)],
        None,
    ));

    lower_to_core(&mut m).unwrap();
    assert_no_verif_or_ltl(&m);

    let (always, assertion) = find_assertion(&m);
    assert!(matches!(
        m.op(always).kind,
        OpKind::Always {
            event: EventControl::NegEdge
        }
    ));
    // d || x
    let cond = m.op(assertion).operands[0];
    let or = m.defining_op(cond).unwrap();
    assert!(matches!(m.op(or).kind, OpKind::Or));
    assert_eq!(m.op(or).operands, vec![d, x]);
}

#[test]
fn unclocked_assertion_is_rejected() {
    let mut m = Module::new("bad");
    let a = m.add_port("a", PortDirection::Input, Type::Int(1));
    let b = m.add_port("b", PortDirection::Input, Type::Int(1));
    let impl_op = m.append_op(OpData::new(
        OpKind::LtlImplication,
        vec![a, b],
        Some(Type::Property),
    ));
    m.append_op(OpData::new(
        OpKind::VerifAssert { label: None },
        vec![Value::Result(impl_op)],
        None,
    ));

    let err = lower_to_core(&mut m).unwrap_err();
    assert!(matches!(err, LowerError::InvalidPropertyShape { .. }));
}

// === has_been_reset ===

#[test]
fn has_been_reset_trace() {
    let mut m = Module::new("hbr");
    let clk = m.add_port("clk", PortDirection::Input, Type::Int(1));
    let reset = m.add_port("reset", PortDirection::Input, Type::Int(1));
    let hbr = m.append_op(OpData::new(
        OpKind::HasBeenReset,
        vec![clk, reset],
        Some(Type::Int(1)),
    ));
    let out = m.append_op(OpData::new(OpKind::Output, vec![Value::Result(hbr)], None));

    lower_to_core(&mut m).unwrap();
    assert_no_verif_or_ltl(&m);

    // The latch itself must not be reset, only fed back through the OR.
    let regs = collect_registers(&m);
    assert_eq!(regs.len(), 1);
    assert_eq!(m.op(regs[0]).operands.len(), 2, "hbr register has no reset port");

    let observed = m.op(out).operands[0];
    let mut state = initial_state(&m);
    let mut trace = Vec::new();
    for r in [1u64, 1, 0, 0, 1, 0] {
        let inputs = HashMap::from([(0, 0), (1, r)]);
        trace.push(eval(&m, observed, &inputs, &state));
        state = step(&m, &inputs, &state);
    }
    assert_eq!(trace, vec![0, 0, 1, 1, 0, 1]);
}
