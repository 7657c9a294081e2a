//! brine-wire-compiler
//!
//! This crate implements:
//!  1) The type catalog and the schema model with its builders,
//!  2) A tokenizer + parser for `.wire` schema files,
//!  3) The resolver and verifier (scoped names, size fields, defaults, recursion),
//!  4) The layout engine and encoding rules,
//!  5) The wire plan consumed by runtimes (`compile_schema` → `Plan`),
//!  6) Error types (`SchemaError`) and `CompilerOptions`.

pub mod ast;
pub mod compiler;
pub mod encoding;
pub mod error;
pub mod layout;
pub mod options;
pub mod parser;
pub mod plan;
pub mod resolver;
pub mod tokenizer;
pub mod types;
pub mod utils;
pub mod verifier;

pub use compiler::{compile_schema, compile_schema_file, compile_schema_with, compile_scope};
pub use encoding::Encoding;
pub use error::SchemaError;
pub use layout::{Anchor, Placement};
pub use options::CompilerOptions;
pub use plan::{
    CasePlan, DeclPlan, EnumPlan, ListPlan, MapPlan, MemberPlan, Plan, StructPlan, SwitchPlan,
};
