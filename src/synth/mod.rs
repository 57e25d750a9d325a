//! Synthesis pass
//!
//! Builds functions and constructs through the defaults cascade, routes
//! permission grants into per-function policies, and renders the result.

pub mod app;
pub mod construct;
pub mod output;

pub use app::{App, ConstructId, FunctionId, FunctionRecord};
pub use construct::{Construct, ConstructKind, FunctionDefinition, SubResource};
pub use output::{
    ConstructOutput, FunctionOutput, PolicyDocument, PolicyStatement, SynthOutput, UnitOutput,
};
