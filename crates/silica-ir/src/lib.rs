#![allow(dead_code, unused_variables, unused_imports)]
//! silica IR - structural hardware IR with LTL and verification layers
//!
//! This crate provides:
//! - The operation/value/type data model shared by all passes
//! - A rewriter with insertion points for pass-driven construction
//! - Back-edges for one-pass construction of feedback loops
//! - Binding pattern matcher combinators

pub mod backedge;
pub mod builder;
pub mod ir;
pub mod matchers;

// Re-export main types
pub use backedge::{Backedge, BackedgeBuilder};
pub use builder::{event_control_for_edge, Rewriter};
pub use ir::{
    ClockEdge, CmpPred, Design, EventControl, Module, OpData, OpId, OpKind, PortDirection,
    PortInfo, RegionRef, Type, Value,
};
pub use matchers::{any_bool, bind_op, one, ValuePattern};
