//! Static type inference and consistency checking over an externally
//! supplied syntax tree.
//!
//! The engine runs two passes. The declaration pass populates a [`CodeBase`]
//! with class/function/constant skeletons typed from signatures and doc
//! comments; the analysis pass walks each file again, threading a context
//! through scopes and synthesizing union types for expressions, reporting
//! [`Issue`]s as it goes. [`engine::analyze_program`] wires the passes into a
//! whole-batch run.

pub mod analysis;
mod arguments;
mod assignment;
pub mod ast;
pub mod builtins;
pub mod codebase;
pub mod comment;
pub mod config;
pub mod context;
pub mod declaration;
pub mod engine;
pub mod flow;
pub mod fqsen;
pub mod issue;
pub mod types;

pub use ast::{Node, NodeKind};
pub use codebase::{AnalysisError, Clazz, CodeBase, FunctionLike};
pub use config::Config;
pub use engine::analyze_program;
pub use fqsen::Fqsen;
pub use issue::{Issue, IssueCollector, IssueKind};
pub use types::{Type, UnionType};
