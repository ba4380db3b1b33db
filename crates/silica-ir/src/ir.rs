//! Core IR - operations, values, types and modules
//!
//! This represents hardware designs at a level suitable for:
//! - Assertion lowering (LTL shapes down to gates and registers)
//! - BTOR2 emission for bounded model checking
//! - Structural inspection by pattern matchers
//!
//! Operations live in an arena owned by their [`Module`]; regions (the module
//! body and the bodies of `always`/`if` blocks) are ordered lists of [`OpId`]s.
//! A [`Value`] names either an operation result or a module port, and two
//! values are equal iff they name the same SSA definition.

use serde::{Deserialize, Serialize};

/// Operation identifier, an index into the owning module's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(pub u32);

/// An SSA value: the result of an operation or a module port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Result of the operation with the given id
    Result(OpId),
    /// Module port (block argument) by declaration index
    Arg(u32),
}

/// Types carried by values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Signless integer of the given width
    Int(u32),
    /// Clock signal
    Clock,
    /// LTL property
    Property,
    /// LTL sequence
    Sequence,
}

impl Type {
    /// Bit width of the type, if it has one.
    ///
    /// Clock, property and sequence values occupy a single bit.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Type::Int(w) => Some(*w),
            Type::Clock | Type::Property | Type::Sequence => Some(1),
        }
    }

    /// True for a 1-bit signless integer
    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Int(1))
    }

    /// True for the clock type
    pub fn is_clock(&self) -> bool {
        matches!(self, Type::Clock)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// Port of a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Port type
    pub ty: Type,
    /// Block argument index backing this port
    pub arg_index: u32,
}

/// Clock edge attribute of an LTL clock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockEdge {
    Pos,
    Neg,
    Both,
}

/// Event control of a procedural `always` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventControl {
    PosEdge,
    NegEdge,
    Edge,
}

/// Comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpPred {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPred {
    /// Predicate name as spelled in the IR
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Ult => "ult",
            CmpPred::Ule => "ule",
            CmpPred::Ugt => "ugt",
            CmpPred::Uge => "uge",
            CmpPred::Slt => "slt",
            CmpPred::Sle => "sle",
            CmpPred::Sgt => "sgt",
            CmpPred::Sge => "sge",
        }
    }
}

/// Operation kinds across the structural, combinational, sequential,
/// procedural, LTL and verification layers of the IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    // === Structural ===
    /// Integer constant; the width comes from the result type
    Constant { value: i64 },
    /// Named wire, a transparent alias of its operand
    Wire { name: String },
    /// Module output terminator (operands are the output port values)
    Output,

    // === Combinational ===
    Add,
    Sub,
    Mul,
    DivU,
    DivS,
    ModS,
    Shl,
    ShrU,
    ShrS,
    And,
    Or,
    Xor,
    Concat,
    /// Bit extraction starting at `low_bit`; the width comes from the result type
    Extract { low_bit: u32 },
    /// Integer comparison, 1-bit result
    Cmp { pred: CmpPred },
    /// 2:1 select (operands: cond, then, else)
    Mux,

    // === Sequential ===
    /// Register (operands: next, clock, and optionally reset, reset_value).
    /// `initial` is the power-on value.
    Reg { name: String, initial: Option<i64> },
    /// Cast of a 1-bit signal to the clock type
    ToClock,

    // === Procedural ===
    /// `always @(event clock)` block; the single operand is the clock signal
    Always { event: EventControl },
    /// Conditional block gating its body on the single operand
    If,
    /// Immediate assertion of the single operand
    Assert { label: Option<String> },
    /// Assumption of the single operand
    Assume,

    // === LTL ===
    /// Associates a property with a clock (operands: input, clock)
    LtlClock { edge: ClockEdge },
    /// Gates a property with a disable condition (operands: input, condition)
    LtlDisable,
    /// Implication between a sequence and a property
    LtlImplication,
    /// Sequence concatenation
    LtlConcat,
    /// Fixed sequence delay of `delay` cycles over a window of `length`
    LtlDelay { delay: u64, length: u64 },

    // === Verification ===
    /// Assertion of an LTL property
    VerifAssert { label: Option<String> },
    /// 1 once reset has been asserted and deasserted (operands: clock, reset)
    HasBeenReset,

    /// Placeholder vended by the back-edge builder; must never survive
    /// construction
    Backedge,
}

impl OpKind {
    /// True for operations of the verification layer
    pub fn is_verif(&self) -> bool {
        matches!(self, OpKind::VerifAssert { .. } | OpKind::HasBeenReset)
    }

    /// True for operations of the LTL layer
    pub fn is_ltl(&self) -> bool {
        matches!(
            self,
            OpKind::LtlClock { .. }
                | OpKind::LtlDisable
                | OpKind::LtlImplication
                | OpKind::LtlConcat
                | OpKind::LtlDelay { .. }
        )
    }
}

/// An operation in the arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpData {
    /// Kind tag with attributes
    pub kind: OpKind,
    /// Operand values in order
    pub operands: Vec<Value>,
    /// Result type, if the operation produces a value
    pub result_ty: Option<Type>,
    /// Nested region for block-structured operations (`always`, `if`)
    pub body: Vec<OpId>,
}

impl OpData {
    /// Operation with no nested region
    pub fn new(kind: OpKind, operands: Vec<Value>, result_ty: Option<Type>) -> Self {
        Self {
            kind,
            operands,
            result_ty,
            body: Vec::new(),
        }
    }
}

/// A region an operation can be inserted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRef {
    /// The module body
    Top,
    /// The nested body of the given operation
    Body(OpId),
}

/// A hardware module: ports plus an ordered body of operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Input/output ports in declaration order
    pub ports: Vec<PortInfo>,
    /// Operation arena; erased slots are tombstoned
    ops: Vec<Option<OpData>>,
    /// Top-level region in program order
    pub body: Vec<OpId>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: Vec::new(),
            ops: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Declare a port and return the value naming it
    pub fn add_port(&mut self, name: impl Into<String>, direction: PortDirection, ty: Type) -> Value {
        let arg_index = self.ports.len() as u32;
        self.ports.push(PortInfo {
            name: name.into(),
            direction,
            ty,
            arg_index,
        });
        Value::Arg(arg_index)
    }

    /// Port backing the given argument index
    pub fn port(&self, arg_index: u32) -> &PortInfo {
        &self.ports[arg_index as usize]
    }

    /// Allocate an operation in the arena without placing it in a region
    pub fn alloc_op(&mut self, data: OpData) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(Some(data));
        id
    }

    /// Allocate an operation and append it to the module body
    pub fn append_op(&mut self, data: OpData) -> OpId {
        let id = self.alloc_op(data);
        self.body.push(id);
        id
    }

    /// Borrow a live operation; panics if the id was erased
    pub fn op(&self, id: OpId) -> &OpData {
        self.ops[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("use of erased operation {:?}", id))
    }

    /// Mutably borrow a live operation
    pub fn op_mut(&mut self, id: OpId) -> &mut OpData {
        self.ops[id.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("use of erased operation {:?}", id))
    }

    /// Borrow an operation if it is still live
    pub fn try_op(&self, id: OpId) -> Option<&OpData> {
        self.ops.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    /// The result value of an operation
    pub fn result(&self, id: OpId) -> Value {
        debug_assert!(self.op(id).result_ty.is_some(), "operation has no result");
        Value::Result(id)
    }

    /// Type of a value
    pub fn value_type(&self, value: Value) -> Type {
        match value {
            Value::Result(id) => self
                .op(id)
                .result_ty
                .unwrap_or_else(|| panic!("operation {:?} has no result", id)),
            Value::Arg(idx) => self.port(idx).ty,
        }
    }

    /// Defining operation of a value, if it is an operation result
    pub fn defining_op(&self, value: Value) -> Option<OpId> {
        match value {
            Value::Result(id) => Some(id),
            Value::Arg(_) => None,
        }
    }

    /// Rewrite every use of `from` to `to`, in every region
    pub fn replace_all_uses(&mut self, from: Value, to: Value) {
        for slot in self.ops.iter_mut() {
            if let Some(op) = slot {
                for operand in op.operands.iter_mut() {
                    if *operand == from {
                        *operand = to;
                    }
                }
            }
        }
    }

    /// True if any live operation references the value
    pub fn has_uses(&self, value: Value) -> bool {
        self.ops
            .iter()
            .flatten()
            .any(|op| op.operands.contains(&value))
    }

    /// Region contents in order
    pub fn region(&self, region: RegionRef) -> &[OpId] {
        match region {
            RegionRef::Top => &self.body,
            RegionRef::Body(op) => &self.op(op).body,
        }
    }

    /// Insert an already-allocated operation into a region at `index`
    pub fn insert_in_region(&mut self, region: RegionRef, index: usize, id: OpId) {
        match region {
            RegionRef::Top => self.body.insert(index, id),
            RegionRef::Body(op) => self.op_mut(op).body.insert(index, id),
        }
    }

    /// Region and position an operation currently occupies
    pub fn position_of(&self, id: OpId) -> Option<(RegionRef, usize)> {
        if let Some(pos) = self.body.iter().position(|&o| o == id) {
            return Some((RegionRef::Top, pos));
        }
        for (i, slot) in self.ops.iter().enumerate() {
            if let Some(op) = slot {
                if let Some(pos) = op.body.iter().position(|&o| o == id) {
                    return Some((RegionRef::Body(OpId(i as u32)), pos));
                }
            }
        }
        None
    }

    /// Erase an operation from its region and tombstone the arena slot.
    ///
    /// The operation's result must be unused.
    pub fn erase_op(&mut self, id: OpId) {
        debug_assert!(
            !self.has_uses(Value::Result(id)),
            "erasing operation {:?} that still has uses",
            id
        );
        if let Some((region, pos)) = self.position_of(id) {
            match region {
                RegionRef::Top => {
                    self.body.remove(pos);
                }
                RegionRef::Body(parent) => {
                    self.op_mut(parent).body.remove(pos);
                }
            }
        }
        self.ops[id.0 as usize] = None;
    }

    /// Pre-order walk over every operation, recursing into nested bodies
    pub fn walk(&self, mut f: impl FnMut(OpId, &OpData)) {
        self.walk_region(&self.body, &mut f);
    }

    fn walk_region(&self, region: &[OpId], f: &mut impl FnMut(OpId, &OpData)) {
        for &id in region {
            let op = self.op(id);
            f(id, op);
            if !op.body.is_empty() {
                self.walk_region(&op.body, f);
            }
        }
    }
}

/// A design: the unit the module walker iterates over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    /// Design name
    pub name: String,
    /// Top-level modules
    pub modules: Vec<Module>,
}

impl Design {
    /// Create an empty design
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    /// Add a module to the design
    pub fn add_module(&mut self, module: Module) {
        self.modules.push(module);
    }
}
