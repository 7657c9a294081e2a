use std::collections::HashMap;

use crate::{
    ast::Declaration,
    error::SchemaError,
    options::CompilerOptions,
    resolver::{Entry, Resolved, Resolver},
    types::TypeRef,
    utils::quote,
};

/// Whole-schema checks that run after resolution: reserved names and
/// recursive nesting. Returns the first violation found.
pub fn verify_schema(resolver: &Resolver, options: &CompilerOptions) -> Result<(), SchemaError> {
    for entry in resolver.entries() {
        let name = entry.decl.name();
        if options.reserved_names.iter().any(|reserved| reserved == name) {
            return Err(SchemaError::declaration(
                &entry.path,
                format!("the type name {} is reserved", quote(name)),
            ));
        }
    }

    let mut state: HashMap<String, u8> = HashMap::new();
    for entry in resolver.entries() {
        check_recursion(resolver, entry, &mut state)?;
    }
    Ok(())
}

/// Every declaration `entry` embeds directly.
fn nested<'r, 'a>(
    resolver: &'r Resolver<'a>,
    entry: &'r Entry<'a>,
) -> Result<Vec<&'r Entry<'a>>, SchemaError> {
    let mut types: Vec<(&TypeRef, &[String])> = Vec::new();
    match entry.decl {
        Declaration::Struct(_) | Declaration::List(_) => {
            for scoped in resolver.members(entry)? {
                types.push((scoped.member.declared_type(), scoped.scope));
                types.extend(scoped.member.type_args.iter().map(|arg| (arg, scoped.scope)));
            }
        }
        Declaration::Union(decl) => {
            for case in &decl.cases {
                types.push((case.member.declared_type(), entry.scope.as_slice()));
                types.extend(case.member.type_args.iter().map(|arg| (arg, entry.scope.as_slice())));
            }
        }
        Declaration::Variant(decl) => {
            let scope = entry.scope.as_slice();
            types.extend(decl.cases.iter().filter_map(|c| c.ty.as_ref()).map(|ty| (ty, scope)));
        }
        Declaration::Enum(decl) => {
            types.extend(decl.backing.iter().map(|ty| (ty, entry.scope.as_slice())));
        }
        Declaration::Map(decl) => {
            types.push((&decl.key, entry.scope.as_slice()));
            types.push((&decl.value, entry.scope.as_slice()));
        }
        Declaration::Typedef(_) => return Ok(vec![resolver.target(entry)?]),
    }

    let mut found = Vec::new();
    for (ty, scope) in types {
        if let Resolved::Named { target, .. } = resolver.resolve(ty, scope, &entry.path)? {
            found.push(target);
        }
    }
    Ok(found)
}

fn check_recursion(
    resolver: &Resolver,
    entry: &Entry,
    state: &mut HashMap<String, u8>,
) -> Result<(), SchemaError> {
    match state.get(&entry.path) {
        Some(1) => {
            return Err(SchemaError::RecursiveType {
                decl: entry.path.clone(),
            })
        }
        Some(2) => return Ok(()),
        _ => {}
    }
    state.insert(entry.path.clone(), 1);
    for child in nested(resolver, entry)? {
        check_recursion(resolver, child, state)?;
    }
    state.insert(entry.path.clone(), 2);
    Ok(())
}
