//! # Mini-Program Component Compiler
//!
//! Lowers a JSX class component into two artifacts: a rewritten class
//! whose `_createData` method computes the view data, and a declarative
//! template in the WXML dialect (`wx:if` / `wx:for` / `{{ }}`).
//!
//! ## Rewriting Invariants
//!
//! 1. **Span edits only**: the output class is the input source with a
//!    sorted list of byte-range replacements applied. No AST is ever
//!    printed, so untouched code keeps its exact formatting.
//! 2. **Outermost edit wins**: when a replacement encloses another, the
//!    inner one is dropped; enclosing rewrites always carry the already
//!    rewritten text of their interior.
//! 3. **Deterministic names**: every synthesized identifier
//!    (`anonymousState__temp*`, `loopArray*`, `$anonymousCallee__*`,
//!    `funPrivate*`, `ref_*`) comes from per-compile counters, so equal
//!    input produces byte-equal output.
//! 4. **Data/view split**: anything the template cannot express is
//!    hoisted into `_createData` and published through
//!    `Object.assign(this.__state, …)`; the template only ever reads
//!    plain data names.
//! 5. **Hard errors carry positions**: every contract violation maps to
//!    a stable `M-ERR-*` code with a 1-based line/column and the source
//!    line it points at. Degradable conditions are `M-WARN-*` warnings
//!    on the result instead.

mod ast_util;
mod class_transform;
mod classify;
mod compile;
mod constants;
mod emit;
mod error;
mod ir;
mod options;
mod props;
mod render;

#[cfg(test)]
mod conformance_tests;

pub use compile::{compile, resolve_adapter};
pub use emit::{emit_compressed, emit_pretty};
pub use error::{CompilerError, Warning};
pub use ir::{
    Attribute, AttributeValue, ComponentUsage, RefDescriptor, RefKind, TemplateNode,
    TransformResult,
};
pub use options::{Adapter, CompileOptions};
