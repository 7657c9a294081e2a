use log::debug;

use crate::{
    ast::Scope,
    error::SchemaError,
    options::CompilerOptions,
    parser::parse_schema,
    plan::{plan_schema, Plan},
    resolver::Resolver,
    tokenizer::tokenize_schema,
    verifier::verify_schema,
};

/// Compile a textual schema into `(Scope, Plan)` with default options.
/// Returns `Err(SchemaError)` if tokenization, parsing or validation fails.
pub fn compile_schema(text: &str) -> Result<(Scope, Plan), SchemaError> {
    compile_schema_with(text, &CompilerOptions::default())
}

pub fn compile_schema_with(
    text: &str,
    options: &CompilerOptions,
) -> Result<(Scope, Plan), SchemaError> {
    let tokens = tokenize_schema(text)?;
    let scope = parse_schema(&tokens, options)?;
    let plan = compile_scope(&scope, options)?;
    Ok((scope, plan))
}

/// Validates a schema model built in code and plans it. Nothing is planned
/// unless the whole schema is valid.
pub fn compile_scope(scope: &Scope, options: &CompilerOptions) -> Result<Plan, SchemaError> {
    let resolver = Resolver::new(scope);
    resolver.validate()?;
    verify_schema(&resolver, options)?;
    let plan = plan_schema(&resolver, options)?;
    debug!("planned {} declarations", plan.len());
    Ok(plan)
}

/// Reads and compiles a schema file.
pub fn compile_schema_file(
    path: impl AsRef<std::path::Path>,
    options: &CompilerOptions,
) -> Result<(Scope, Plan), SchemaError> {
    let text = std::fs::read_to_string(path)?;
    compile_schema_with(&text, options)
}
