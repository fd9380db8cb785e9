//! WGSL front end shared by every driver.
//!
//! Stages are parsed and validated with naga, then their interfaces are
//! reflected so two stages can be linked into a program layout with named
//! uniform slots.

mod compile;
mod link;
mod uniforms;

pub use compile::{
    BindingKind, CompiledStage, IoType, IoVar, ResourceDecl, ScalarClass, ShaderStage,
    UniformField, UniformType, compile_stage,
};
pub use link::{ProgramLayout, SlotTarget, UniformSlot, VERTEX_INPUT_LOCATIONS, link};
pub use uniforms::UniformState;
