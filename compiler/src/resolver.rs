//! Name resolution and whole-schema validation.
//!
//! References are looked up in the scope that declares them first, then in
//! each enclosing scope outward; names starting with `::` are taken from the
//! root. Typedefs resolve to the declaration they rename.

use brine_wire_schema::{fits_signed, fits_unsigned, max_length};
use log::{debug, trace};
use std::collections::{BTreeMap, HashSet};

use crate::{
    ast::{check_size_field, Declaration, DefaultValue, MemberDecl, Scope, VariantDecl},
    error::SchemaError,
    types::{TypeKind, TypeName, TypeRef},
};

/// A declaration together with where it lives.
#[derive(Debug)]
pub struct Entry<'a> {
    /// Absolute name, e.g. `geo::Point`.
    pub path:  String,
    /// Names of the enclosing scopes, outermost first.
    pub scope: Vec<String>,
    pub decl:  &'a Declaration,
}

/// Outcome of resolving a [`TypeRef`].
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'r, 'a> {
    Primitive { kind: TypeKind, bits: Option<u8> },
    /// `entry` is the declaration named; `target` is what it finally denotes
    /// once typedefs are followed.
    Named { entry: &'r Entry<'a>, target: &'r Entry<'a> },
}

impl<'r, 'a> Resolved<'r, 'a> {
    pub fn target_decl(&self) -> Option<&'a Declaration> {
        match self {
            Resolved::Named { target, .. } => Some(target.decl),
            Resolved::Primitive { .. } => None,
        }
    }
}

/// A member paired with the scope its type names are resolved from.
#[derive(Debug, Clone, Copy)]
pub struct ScopedMember<'r, 'a> {
    pub member: &'a MemberDecl,
    pub scope:  &'r [String],
}

pub struct Resolver<'a> {
    entries: BTreeMap<String, Entry<'a>>,
}

pub(crate) fn join_path(scope: &[String], name: &str) -> String {
    let mut parts: Vec<&str> = scope.iter().map(String::as_str).collect();
    parts.push(name);
    parts.join("::")
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a Scope) -> Resolver<'a> {
        let mut entries = BTreeMap::new();
        root.walk(&mut Vec::new(), &mut |scope, decl| {
            let path = join_path(scope, decl.name());
            entries.insert(
                path.clone(),
                Entry {
                    path,
                    scope: scope.to_vec(),
                    decl,
                },
            );
        });
        Resolver { entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry<'a>> {
        self.entries.values()
    }

    pub fn entry(&self, path: &str) -> Option<&Entry<'a>> {
        self.entries.get(path)
    }

    /// Looks `name` up from inside `from`, walking outward.
    pub fn lookup(
        &self,
        name: &TypeName,
        from: &[String],
        decl: &str,
    ) -> Result<&Entry<'a>, SchemaError> {
        let relative = name.segments.join("::");
        let found = if name.absolute {
            self.entries.get(&relative)
        } else {
            (0..=from.len())
                .rev()
                .find_map(|depth| self.entries.get(&join_path(&from[..depth], &relative)))
        };
        found.ok_or_else(|| SchemaError::ReferenceNotFound {
            decl:  decl.to_string(),
            token: name.to_string(),
        })
    }

    /// Follows typedefs from `entry` to the declaration they denote.
    pub fn target<'r>(&'r self, entry: &'r Entry<'a>) -> Result<&'r Entry<'a>, SchemaError> {
        let mut current = entry;
        for _ in 0..=self.entries.len() {
            match current.decl {
                Declaration::Typedef(typedef) => {
                    let TypeRef::Dynamic(name) = &typedef.original else {
                        return Err(SchemaError::declaration(
                            &current.path,
                            "a typedef must rename a declaration",
                        ));
                    };
                    current = self.lookup(name, &current.scope, &current.path)?;
                }
                _ => return Ok(current),
            }
        }
        Err(SchemaError::RecursiveType {
            decl: entry.path.clone(),
        })
    }

    pub fn resolve<'r>(
        &'r self,
        ty: &TypeRef,
        from: &[String],
        decl: &str,
    ) -> Result<Resolved<'r, 'a>, SchemaError> {
        match ty {
            TypeRef::Primitive { kind, bits } => Ok(Resolved::Primitive {
                kind: *kind,
                bits: *bits,
            }),
            TypeRef::Dynamic(name) => {
                let entry = self.lookup(name, from, decl)?;
                let target = self.target(entry)?;
                trace!("{} resolves to {} in {}", name, target.path, decl);
                Ok(Resolved::Named { entry, target })
            }
        }
    }

    fn supertype<'r>(&'r self, entry: &'r Entry<'a>) -> Result<Option<&'r Entry<'a>>, SchemaError> {
        let Declaration::Struct(decl) = entry.decl else {
            return Ok(None);
        };
        let Some(supertype) = &decl.supertype else {
            return Ok(None);
        };
        match self.resolve(supertype, &entry.scope, &entry.path)? {
            Resolved::Named { target, .. } if matches!(target.decl, Declaration::Struct(_)) => {
                Ok(Some(target))
            }
            _ => Err(SchemaError::declaration(
                &entry.path,
                format!("supertype {} is not a struct", supertype),
            )),
        }
    }

    /// Supertype chain of a struct, nearest first, starting with itself.
    fn lineage<'r>(&'r self, entry: &'r Entry<'a>) -> Result<Vec<&'r Entry<'a>>, SchemaError> {
        let mut chain = vec![entry];
        let mut current = entry;
        while let Some(parent) = self.supertype(current)? {
            if chain.iter().any(|e| e.path == parent.path) {
                return Err(SchemaError::RecursiveType {
                    decl: entry.path.clone(),
                });
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// The discriminator id of a struct. Zero ids are inherited from the
    /// nearest supertype with a non-zero id.
    pub fn type_id(&self, entry: &Entry<'a>) -> Result<u32, SchemaError> {
        for ancestor in self.lineage(entry)? {
            if let Declaration::Struct(decl) = ancestor.decl {
                if decl.type_id != 0 {
                    return Ok(decl.type_id);
                }
            }
        }
        Ok(0)
    }

    /// Effective members of a struct or list: inherited members first.
    pub fn members<'r>(
        &'r self,
        entry: &'r Entry<'a>,
    ) -> Result<Vec<ScopedMember<'r, 'a>>, SchemaError> {
        let mut members = Vec::new();
        match entry.decl {
            Declaration::Struct(_) => {
                for ancestor in self.lineage(entry)?.into_iter().rev() {
                    if let Declaration::Struct(decl) = ancestor.decl {
                        let scope: &'r [String] = &ancestor.scope;
                        members.extend(
                            decl.members.iter().map(move |member| ScopedMember { member, scope }),
                        );
                    }
                }
            }
            Declaration::List(decl) => {
                let scope: &'r [String] = &entry.scope;
                members
                    .extend(decl.members.iter().map(move |member| ScopedMember { member, scope }));
            }
            _ => {}
        }
        Ok(members)
    }

    /// Runs every cross-declaration check.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for entry in self.entries.values() {
            debug!("validating {} {}", entry.decl.keyword(), entry.path);
            self.validate_entry(entry)?;
        }
        Ok(())
    }

    fn validate_entry(&self, entry: &Entry<'a>) -> Result<(), SchemaError> {
        let path = entry.path.as_str();
        match entry.decl {
            Declaration::Struct(_) | Declaration::List(_) => {
                if let Declaration::List(list) = entry.decl {
                    for framing in [&list.length_type, &list.field_count_type] {
                        match framing.kind() {
                            Some(kind) if kind.is_unsigned() && kind.width().is_some() => {}
                            _ => {
                                let msg = format!(
                                    "list framing {} must be a fixed unsigned integer",
                                    framing
                                );
                                return Err(SchemaError::declaration(path, msg));
                            }
                        }
                    }
                }
                self.type_id(entry)?;
                let members = self.members(entry)?;
                let mut names = HashSet::new();
                for scoped in &members {
                    if !names.insert(scoped.member.name.as_str()) {
                        return Err(SchemaError::Duplicate {
                            scope: path.to_string(),
                            name:  scoped.member.name.clone(),
                        });
                    }
                    self.validate_member(path, scoped)?;
                }
                validate_size_fields(path, &members)?;
            }
            Declaration::Union(decl) => {
                let kind = self.discriminator(path, &decl.kind_type)?;
                for case in &decl.cases {
                    check_tag(path, kind, case.tag)?;
                    self.validate_member(path, &ScopedMember {
                        member: &case.member,
                        scope:  &entry.scope,
                    })?;
                }
            }
            Declaration::Variant(decl) => {
                let kind = self.discriminator(path, &decl.kind_type)?;
                for case in &decl.cases {
                    check_tag(path, kind, case.tag)?;
                    let Some(ty) = &case.ty else { continue };
                    match self.resolve(ty, &entry.scope, path)? {
                        Resolved::Primitive { kind, bits } if !is_value_type(kind, bits) => {
                            let msg = format!("{} cannot be a variant case", ty);
                            return Err(SchemaError::declaration(path, msg));
                        }
                        _ => {}
                    }
                }
            }
            Declaration::Enum(decl) => {
                let bad_backing = || {
                    SchemaError::declaration(path, "enum backing must be an integer or a variant")
                };
                match &decl.backing {
                    None => {
                        for value in &decl.values {
                            check_tag(path, TypeKind::Uint8, value.ordinal)?;
                        }
                    }
                    Some(backing) => match self.resolve(backing, &entry.scope, path)? {
                        Resolved::Primitive { kind, .. } if kind.is_integer() => {
                            for value in &decl.values {
                                check_tag(path, kind, value.ordinal)?;
                            }
                        }
                        Resolved::Named { target, .. } => {
                            let Declaration::Variant(variant) = target.decl else {
                                return Err(bad_backing());
                            };
                            for value in &decl.values {
                                if !self.variant_accepts_int(target, variant, value.ordinal)? {
                                    let msg = format!(
                                        "ordinal {} does not fit backing {}",
                                        value.ordinal, backing
                                    );
                                    return Err(SchemaError::declaration(path, msg));
                                }
                            }
                        }
                        _ => return Err(bad_backing()),
                    },
                }
            }
            Declaration::Map(decl) => {
                let template = &decl.template;
                if template.kind() != Some(TypeKind::Map) || template.framing_bits().is_none() {
                    return Err(SchemaError::declaration(
                        path,
                        format!("{} is not a map template", decl.template),
                    ));
                }
                let bad_key = || {
                    let msg =
                        format!("map key {} must be an integer, string, enum or variant", decl.key);
                    SchemaError::declaration(path, msg)
                };
                match self.resolve(&decl.key, &entry.scope, path)? {
                    Resolved::Primitive { kind, .. } if kind.is_integer() || kind.is_string() => {}
                    Resolved::Named { target, .. } => match target.decl {
                        Declaration::Enum(_) | Declaration::Variant(_) => {}
                        _ => return Err(bad_key()),
                    },
                    _ => return Err(bad_key()),
                }
                match self.resolve(&decl.value, &entry.scope, path)? {
                    Resolved::Primitive { kind, bits } if !is_value_type(kind, bits) => {
                        return Err(SchemaError::declaration(
                            path,
                            format!("map value {} needs a declaration", decl.value),
                        ));
                    }
                    _ => {}
                }
            }
            Declaration::Typedef(_) => {
                self.target(entry)?;
            }
        }
        Ok(())
    }

    fn discriminator(&self, path: &str, ty: &TypeRef) -> Result<TypeKind, SchemaError> {
        match ty.kind() {
            Some(kind) if kind.is_integer() => Ok(kind),
            _ => Err(SchemaError::declaration(
                path,
                format!("discriminator {} must be an integer type", ty),
            )),
        }
    }

    fn validate_member(
        &self,
        path: &str,
        scoped: &ScopedMember<'_, 'a>,
    ) -> Result<(), SchemaError> {
        let member = scoped.member;
        let field = member.name.as_str();
        let invalid = |msg: String| Err(SchemaError::member(path, field, msg));
        let resolved = self.resolve(member.declared_type(), scoped.scope, path)?;

        match resolved {
            Resolved::Primitive {
                kind: TypeKind::Array,
                ..
            } => {
                let [item] = member.type_args.as_slice() else {
                    return invalid("an array takes exactly one item type".to_string());
                };
                if member.is_sized() {
                    return invalid("a length-prefixed array cannot be sized".to_string());
                }
                let item_type = self.resolve(item, scoped.scope, path)?;
                if let Resolved::Primitive { kind, bits } = item_type {
                    if !is_value_type(kind, bits) {
                        return invalid(format!("{} cannot be an array item", item));
                    }
                }
            }
            Resolved::Primitive { kind, bits } => {
                if !member.type_args.is_empty() {
                    return invalid(format!("{} takes no type arguments", kind.keyword()));
                }
                if kind == TypeKind::Octets && bits.is_some() && member.is_sized() {
                    return invalid("self-describing octets cannot be sized".to_string());
                }
                if !is_value_type(kind, bits) && kind != TypeKind::Octets {
                    return invalid(format!("{} needs a declaration", kind.keyword()));
                }
            }
            Resolved::Named { .. } => {
                if !member.type_args.is_empty() {
                    return invalid("declared types take no type arguments".to_string());
                }
            }
        }

        self.validate_default(path, member, resolved)
    }

    fn validate_default(
        &self,
        path: &str,
        member: &MemberDecl,
        resolved: Resolved<'_, 'a>,
    ) -> Result<(), SchemaError> {
        let field = member.name.as_str();
        let invalid = |msg: String| Err(SchemaError::default_value(path, field, msg));
        let declared = member.declared_type();

        if member.is_sized() {
            return match &member.default {
                DefaultValue::Absent => Ok(()),
                DefaultValue::Null if member.size_name.is_some() => Ok(()),
                _ => invalid(
                    "a sized member only accepts a null default with a size field".to_string(),
                ),
            };
        }

        match (&member.default, resolved) {
            (DefaultValue::Absent, _) => Ok(()),
            (DefaultValue::Null, Resolved::Primitive { kind, bits }) => {
                let nullable = kind.is_string()
                    || kind == TypeKind::Array
                    || (kind == TypeKind::Octets && bits.is_some());
                if nullable {
                    Ok(())
                } else {
                    invalid(format!("{} is not nullable", declared))
                }
            }
            (DefaultValue::Null, Resolved::Named { target, .. }) => match target.decl {
                Declaration::Variant(v) if v.missing_field_value.is_some() => Ok(()),
                _ => invalid(format!("{} has no missing-field case", declared)),
            },
            (DefaultValue::Int(value), Resolved::Primitive { kind, .. }) if kind.is_integer() => {
                if int_fits(declared.kind().unwrap_or(kind), *value) {
                    Ok(())
                } else {
                    invalid(format!("{} does not fit {}", value, declared))
                }
            }
            (DefaultValue::Int(value), Resolved::Named { target, .. }) => match target.decl {
                Declaration::Enum(e) if e.values.iter().any(|v| v.ordinal == *value) => Ok(()),
                Declaration::Variant(v) if self.variant_accepts_int(target, v, *value)? => Ok(()),
                _ => invalid(format!("{} is not a valid {}", value, declared)),
            },
            (DefaultValue::Text(text), Resolved::Primitive { kind, .. }) if kind.is_string() => {
                let bits = kind.bits().unwrap_or(8);
                if text.len() <= max_length(bits) {
                    Ok(())
                } else {
                    invalid(format!("text is too long for {}", declared))
                }
            }
            (DefaultValue::Text(text), Resolved::Named { target, .. }) => match target.decl {
                Declaration::Variant(v) if self.variant_accepts_text(target, v, text)? => Ok(()),
                _ => invalid(format!("text is not a valid {}", declared)),
            },
            (DefaultValue::Symbol(symbol), Resolved::Named { target, .. }) => match target.decl {
                Declaration::Enum(e) if e.ordinal_of(symbol).is_some() => Ok(()),
                _ => invalid(format!("{} is not a value of {}", symbol, declared)),
            },
            (default, _) => invalid(format!("{:?} is not valid for {}", default, declared)),
        }
    }

    /// Whether some integer case of `variant` can carry `value`.
    pub fn variant_accepts_int(
        &self,
        entry: &Entry<'a>,
        variant: &VariantDecl,
        value: i64,
    ) -> Result<bool, SchemaError> {
        for case in &variant.cases {
            let Some(ty) = &case.ty else { continue };
            if let Resolved::Primitive { kind, .. } = self.resolve(ty, &entry.scope, &entry.path)? {
                if kind.is_integer() && int_fits(kind, value) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn variant_accepts_text(
        &self,
        entry: &Entry<'a>,
        variant: &VariantDecl,
        text: &str,
    ) -> Result<bool, SchemaError> {
        for case in &variant.cases {
            let Some(ty) = &case.ty else { continue };
            if let Resolved::Primitive { kind, .. } = self.resolve(ty, &entry.scope, &entry.path)? {
                if kind.is_string() && text.len() <= max_length(kind.bits().unwrap_or(8)) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Primitive kinds that can stand alone as a value (case payload, map
/// value, array item).
fn is_value_type(kind: TypeKind, bits: Option<u8>) -> bool {
    kind.is_integer() || kind.is_string() || (kind == TypeKind::Octets && bits.is_some())
}

/// Whether `value` is representable by the integer `kind`.
pub fn int_fits(kind: TypeKind, value: i64) -> bool {
    let Some(bits) = kind.bits() else {
        return false;
    };
    if kind.is_unsigned() {
        fits_unsigned(value as i128, bits)
    } else {
        fits_signed(value as i128, bits)
    }
}

fn check_tag(path: &str, kind: TypeKind, tag: i64) -> Result<(), SchemaError> {
    if int_fits(kind, tag) {
        Ok(())
    } else {
        Err(SchemaError::declaration(path, format!("{} does not fit {}", tag, kind.keyword())))
    }
}

/// Size fields over the effective member list, so a dependent may be sized
/// by a member its struct inherits. Each size field sizes one dependent.
fn validate_size_fields(path: &str, members: &[ScopedMember]) -> Result<(), SchemaError> {
    let mut claimed = HashSet::new();
    for (index, scoped) in members.iter().enumerate() {
        let dependent = scoped.member;
        let Some(size_name) = &dependent.size_name else {
            continue;
        };
        let size_error = |msg: String| SchemaError::InvalidSizeField {
            decl:  path.to_string(),
            field: dependent.name.clone(),
            msg,
        };
        let Some(size) = members[..index].iter().position(|m| &m.member.name == size_name) else {
            return Err(size_error(format!("size field {} must be an earlier member", size_name)));
        };
        check_size_field(path, dependent, members[size].member)?;
        if !claimed.insert(size) {
            return Err(size_error("size field already sizes another member".to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{options::CompilerOptions, parser::parse_schema, tokenizer::tokenize_schema};

    fn scope(text: &str) -> Scope {
        parse_schema(&tokenize_schema(text).unwrap(), &CompilerOptions::default()).unwrap()
    }

    fn validate(text: &str) -> Result<(), SchemaError> {
        let root = scope(text);
        Resolver::new(&root).validate()
    }

    #[test]
    fn inner_declarations_shadow_outer() {
        let root = scope(
            "struct Point { int8 x; }
             scope geo {
                 struct Point { int16 x; int16 y; }
                 scope inner { struct Line { Point a; ::Point b; } }
             }",
        );
        let resolver = Resolver::new(&root);
        let from = vec!["geo".to_string(), "inner".to_string()];
        let near = resolver.lookup(&TypeName::parse("Point"), &from, "Line").unwrap();
        assert_eq!(near.path, "geo::Point");
        let far = resolver.lookup(&TypeName::parse("::Point"), &from, "Line").unwrap();
        assert_eq!(far.path, "Point");
        let qualified = resolver.lookup(&TypeName::parse("geo::Point"), &[], "x").unwrap();
        assert_eq!(qualified.path, "geo::Point");
    }

    #[test]
    fn missing_reference_names_token() {
        let err = validate("struct S { Nope n; }").unwrap_err();
        assert!(matches!(err, SchemaError::ReferenceNotFound { ref token, ref decl } if token == "Nope" && decl == "S"));
    }

    #[test]
    fn type_id_is_inherited() {
        let root = scope(
            "struct Base [7] { int8 a; }
             struct Mid extends Base { int8 b; }
             struct Leaf extends Mid { int8 c; }",
        );
        let resolver = Resolver::new(&root);
        let leaf = resolver.entry("Leaf").unwrap();
        assert_eq!(resolver.type_id(leaf).unwrap(), 7);
        let names: Vec<&str> = resolver
            .members(leaf)
            .unwrap()
            .iter()
            .map(|m| m.member.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn supertype_cycles_are_rejected() {
        let err = validate("struct A extends B { int8 a; } struct B extends A { int8 b; }").unwrap_err();
        assert!(matches!(err, SchemaError::RecursiveType { .. }));
    }

    #[test]
    fn size_fields_may_be_inherited() {
        assert!(validate("struct A { uint8 n; } struct B extends A { octets d[n]; }").is_ok());
        let nullable = "struct A { int8 n; } struct B extends A { string8 s; octets d[n] = null; }";
        assert!(validate(nullable).is_ok());
        let invalid = [
            "struct A { int8 n; } struct B extends A { octets d[n]; }",
            "struct A { uint8 n = 1; } struct B extends A { octets d[n]; }",
            "struct A { uint8 n; } struct B extends A { octets d[m]; }",
            "struct A { uint8 n; octets a[n]; } struct B extends A { octets d[n]; }",
            "struct A { uint8 n; } struct B extends A { octets d[n]; uint8 e[n]; }",
        ];
        for text in invalid {
            let err = validate(text);
            assert!(matches!(err, Err(SchemaError::InvalidSizeField { .. })), "{}", text);
        }
    }

    #[test]
    fn typedefs_resolve_to_target() {
        let root = scope("struct P { int8 x; } typedef P as Q; typedef Q as R;");
        let resolver = Resolver::new(&root);
        let r = resolver.entry("R").unwrap();
        assert_eq!(resolver.target(r).unwrap().path, "P");
        assert!(validate("typedef A as B; typedef B as A;").is_err());
    }

    #[test]
    fn default_compatibility() {
        assert!(validate("struct S { uint8 a = 255; }").is_ok());
        assert!(matches!(validate("struct S { uint8 a = 256; }"), Err(SchemaError::InvalidDefault { .. })));
        assert!(matches!(validate("struct S { int8 a = null; }"), Err(SchemaError::InvalidDefault { .. })));
        assert!(validate("struct S { string8 a = null; string16 b = \"x\"; }").is_ok());
        assert!(validate("enum E { A, B } struct S { E e = B; }").is_ok());
        assert!(matches!(validate("enum E { A } struct S { E e = C; }"), Err(SchemaError::InvalidDefault { .. })));
        assert!(validate("variant V switch (uint8) { case 0: missing; case 1: int8; } struct S { V v = null; V w = 3; }").is_ok());
    }

    #[test]
    fn discriminators_and_tags() {
        assert!(validate("union U switch (string8) { case 1: int8 a; }").is_err());
        assert!(validate("variant V switch (uint8) { case 300: int8; }").is_err());
        assert!(validate("enum E (int8) { A = 200 }").is_err());
        assert!(validate("list<varint32, uint8> L { int8 a; }").is_err());
        assert!(validate("list<int16, uint8> L { int8 a; }").is_err());
        assert!(validate("variant V switch (uint8) { case 1: int8; case 2: int32; } enum E (V) { A = 200 }").is_ok());
    }

    #[test]
    fn map_shapes() {
        assert!(validate("struct P { int8 x; } map M map32<string8, P>;").is_ok());
        assert!(validate("struct P { int8 x; } map M map32<P, int8>;").is_err());
        assert!(validate("map M array32<int8, int8>;").is_err());
    }

    #[test]
    fn member_shapes() {
        assert!(validate("struct S { array32<varint32> a; }").is_ok());
        assert!(validate("struct S { array32 a; }").is_err());
        assert!(validate("struct S { octets8 a[4]; }").is_err());
        assert!(validate("struct S { int8<int8> a; }").is_err());
    }
}
