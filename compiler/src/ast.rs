//! Schema model. Nodes are assembled through builders which check the
//! invariants local to a declaration; once built, a [`Scope`] tree is only
//! ever read.

use brine_wire_schema::ByteOrder;
use serde::Serialize;
use std::collections::HashSet;

use crate::{
    error::SchemaError,
    types::{TypeKind, TypeRef},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DefaultValue {
    Absent,
    Null,
    Int(i64),
    Text(String),
    Symbol(String),
}

impl DefaultValue {
    pub fn is_present(&self) -> bool {
        !matches!(self, DefaultValue::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberDecl {
    pub name:         String,
    /// Storage type. Unsigned integers are stored with the signed tag of
    /// the same width.
    pub ty:           TypeRef,
    /// Secondary types, e.g. the item type of `array32<T>`.
    pub type_args:    Vec<TypeRef>,
    pub unsigned_ty:  Option<TypeRef>,
    pub fixed_length: Option<usize>,
    pub size_name:    Option<String>,
    pub default:      DefaultValue,
    pub byte_order:   ByteOrder,
    pub required:     bool,
    pub used_as_size: bool,
}

impl MemberDecl {
    /// The type as declared in the schema (unsigned tag if any).
    pub fn declared_type(&self) -> &TypeRef {
        self.unsigned_ty.as_ref().unwrap_or(&self.ty)
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned_ty.is_some()
    }

    /// Whether this member is repeated (`T[N]` or `T[size]`).
    pub fn is_sized(&self) -> bool {
        self.fixed_length.is_some() || self.size_name.is_some()
    }
}

pub struct MemberBuilder {
    member: MemberDecl,
}

impl MemberBuilder {
    pub fn new(name: &str, ty: TypeRef) -> MemberBuilder {
        let (ty, unsigned_ty) = match ty.kind() {
            Some(kind) if kind.is_unsigned() => {
                (TypeRef::primitive(kind.signed_storage()), Some(ty))
            }
            _ => (ty, None),
        };
        MemberBuilder {
            member: MemberDecl {
                name: name.to_string(),
                ty,
                type_args: Vec::new(),
                unsigned_ty,
                fixed_length: None,
                size_name: None,
                default: DefaultValue::Absent,
                byte_order: ByteOrder::Native,
                required: false,
                used_as_size: false,
            },
        }
    }

    pub fn type_arg(mut self, ty: TypeRef) -> Self {
        self.member.type_args.push(ty);
        self
    }

    pub fn fixed_length(mut self, length: usize) -> Self {
        self.member.fixed_length = Some(length);
        self
    }

    pub fn size_field(mut self, name: &str) -> Self {
        self.member.size_name = Some(name.to_string());
        self
    }

    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.member.default = value;
        self
    }

    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.member.byte_order = order;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.member.required = required;
        self
    }

    pub fn build(self) -> MemberDecl {
        self.member
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructDecl {
    pub name:      String,
    pub type_id:   u32,
    pub supertype: Option<TypeRef>,
    pub members:   Vec<MemberDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionCase {
    pub tag:    i64,
    pub member: MemberDecl,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionDecl {
    pub name:      String,
    pub kind_type: TypeRef,
    pub cases:     Vec<UnionCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantCase {
    pub tag: i64,
    /// `None` only for the missing-field case.
    pub ty:  Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantDecl {
    pub name:                String,
    pub kind_type:           TypeRef,
    pub cases:               Vec<VariantCase>,
    pub missing_field_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListDecl {
    pub name:             String,
    pub length_type:      TypeRef,
    pub field_count_type: TypeRef,
    pub members:          Vec<MemberDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    pub name:    String,
    pub ordinal: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDecl {
    pub name:    String,
    pub backing: Option<TypeRef>,
    pub values:  Vec<EnumValue>,
}

impl EnumDecl {
    pub fn ordinal_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.ordinal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapDecl {
    pub name:     String,
    pub template: TypeRef,
    pub key:      TypeRef,
    pub value:    TypeRef,
}

impl MapDecl {
    pub fn new(name: &str, template: TypeRef, key: TypeRef, value: TypeRef) -> MapDecl {
        MapDecl {
            name: name.to_string(),
            template,
            key,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedefDecl {
    pub name:     String,
    pub original: TypeRef,
}

impl TypedefDecl {
    pub fn new(original: TypeRef, name: &str) -> TypedefDecl {
        TypedefDecl {
            name: name.to_string(),
            original,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Declaration {
    Struct(StructDecl),
    Union(UnionDecl),
    Variant(VariantDecl),
    List(ListDecl),
    Enum(EnumDecl),
    Map(MapDecl),
    Typedef(TypedefDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Struct(d) => &d.name,
            Declaration::Union(d) => &d.name,
            Declaration::Variant(d) => &d.name,
            Declaration::List(d) => &d.name,
            Declaration::Enum(d) => &d.name,
            Declaration::Map(d) => &d.name,
            Declaration::Typedef(d) => &d.name,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Declaration::Struct(_) => "struct",
            Declaration::Union(_) => TypeKind::Union.keyword(),
            Declaration::Variant(_) => TypeKind::Variant.keyword(),
            Declaration::List(_) => TypeKind::List.keyword(),
            Declaration::Enum(_) => TypeKind::Enum.keyword(),
            Declaration::Map(_) => TypeKind::Map.keyword(),
            Declaration::Typedef(_) => "typedef",
        }
    }
}

macro_rules! into_declaration {
    ($($decl:ident => $variant:ident),* $(,)?) => {
        $(impl From<$decl> for Declaration {
            fn from(decl: $decl) -> Declaration {
                Declaration::$variant(decl)
            }
        })*
    };
}

into_declaration! {
    StructDecl => Struct, UnionDecl => Union, VariantDecl => Variant, ListDecl => List,
    EnumDecl => Enum, MapDecl => Map, TypedefDecl => Typedef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scope {
    pub name:         String,
    pub depth:        usize,
    pub scopes:       Vec<Scope>,
    pub declarations: Vec<Declaration>,
}

impl Scope {
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name() == name)
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name == name)
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Struct(s) => Some(s),
            _ => None,
        })
    }

    /// Visits every declaration beneath this scope with its scope path.
    pub fn walk<'a>(
        &'a self,
        path: &mut Vec<String>,
        visit: &mut dyn FnMut(&[String], &'a Declaration),
    ) {
        for decl in &self.declarations {
            visit(path, decl);
        }
        for child in &self.scopes {
            path.push(child.name.clone());
            child.walk(path, visit);
            path.pop();
        }
    }

    fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        for child in &mut self.scopes {
            child.set_depth(depth + 1);
        }
    }
}

pub struct ScopeBuilder {
    name:         String,
    scopes:       Vec<Scope>,
    declarations: Vec<Declaration>,
}

impl ScopeBuilder {
    pub fn new(name: &str) -> ScopeBuilder {
        ScopeBuilder {
            name:         name.to_string(),
            scopes:       Vec::new(),
            declarations: Vec::new(),
        }
    }

    /// The unnamed root scope.
    pub fn root() -> ScopeBuilder {
        ScopeBuilder::new("")
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn declare(mut self, decl: impl Into<Declaration>) -> Self {
        self.declarations.push(decl.into());
        self
    }

    pub fn build(self) -> Result<Scope, SchemaError> {
        let mut seen = HashSet::new();
        let names = self
            .declarations
            .iter()
            .map(Declaration::name)
            .chain(self.scopes.iter().map(|s| s.name.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(SchemaError::Duplicate {
                    scope: display_scope(&self.name),
                    name:  name.to_string(),
                });
            }
        }

        let mut scope = Scope {
            name:         self.name,
            depth:        0,
            scopes:       self.scopes,
            declarations: self.declarations,
        };
        scope.set_depth(0);
        Ok(scope)
    }
}

fn display_scope(name: &str) -> String {
    if name.is_empty() {
        "<root>".to_string()
    } else {
        name.to_string()
    }
}

/// Rules a size field must satisfy for `dependent`. A nullable dependent
/// needs a signed size field so that a negative size can mean null.
pub(crate) fn check_size_field(
    decl: &str,
    dependent: &MemberDecl,
    size: &MemberDecl,
) -> Result<(), SchemaError> {
    let size_error = |msg: &str| SchemaError::InvalidSizeField {
        decl:  decl.to_string(),
        field: dependent.name.clone(),
        msg:   msg.to_string(),
    };
    let nullable = dependent.default == DefaultValue::Null;
    if size.default.is_present() {
        return Err(size_error("size field cannot have a default"));
    }
    if !size.ty.is_fixed_int() || size.is_sized() {
        return Err(size_error("size field must be a fixed-width integer"));
    }
    if nullable && size.is_unsigned() {
        return Err(size_error("size field of a nullable member must be signed"));
    }
    if !nullable && !size.is_unsigned() {
        return Err(size_error("size field must be unsigned"));
    }
    Ok(())
}

/// Checks member-local invariants and marks size fields. Shared by structs,
/// lists and union cases. When `inherits` is set a size field may also name
/// a supertype member; the resolver checks those.
fn validate_members(
    decl: &str,
    members: &mut [MemberDecl],
    allow_required: bool,
    inherits: bool,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for i in 0..members.len() {
        let member = &members[i];
        if !seen.insert(member.name.clone()) {
            return Err(SchemaError::Duplicate {
                scope: decl.to_string(),
                name:  member.name.clone(),
            });
        }
        if member.fixed_length.is_some() && member.size_name.is_some() {
            return Err(SchemaError::member(
                decl,
                &member.name,
                "fixed length and size field are mutually exclusive",
            ));
        }
        if member.fixed_length == Some(0) {
            return Err(SchemaError::member(decl, &member.name, "fixed length must be positive"));
        }
        if member.required && !allow_required {
            return Err(SchemaError::member(decl, &member.name, "required is only valid in lists"));
        }
        if member.required && member.default.is_present() {
            return Err(SchemaError::default_value(
                decl,
                &member.name,
                "a required member cannot have a default",
            ));
        }
        if member.ty.kind() == Some(TypeKind::Octets)
            && member.ty.framing_bits().is_none()
            && !member.is_sized()
        {
            return Err(SchemaError::member(
                decl,
                &member.name,
                "octets need a fixed length, a size field or a length prefix",
            ));
        }

        let Some(size_name) = &member.size_name else {
            continue;
        };
        let size_error = |msg: String| SchemaError::InvalidSizeField {
            decl:  decl.to_string(),
            field: member.name.clone(),
            msg,
        };

        let Some(j) = members[..i].iter().position(|m| &m.name == size_name) else {
            if inherits && !members.iter().any(|m| &m.name == size_name) {
                continue;
            }
            return Err(size_error(format!("size field {} must be an earlier member", size_name)));
        };
        check_size_field(decl, member, &members[j])?;
        if members[j].used_as_size {
            return Err(size_error("size field already sizes another member".to_string()));
        }
        members[j].used_as_size = true;
    }
    Ok(())
}

pub struct StructBuilder {
    decl: StructDecl,
}

impl StructBuilder {
    pub fn new(name: &str) -> StructBuilder {
        StructBuilder {
            decl: StructDecl {
                name:      name.to_string(),
                type_id:   0,
                supertype: None,
                members:   Vec::new(),
            },
        }
    }

    pub fn type_id(mut self, type_id: u32) -> Self {
        self.decl.type_id = type_id;
        self
    }

    pub fn supertype(mut self, supertype: TypeRef) -> Self {
        self.decl.supertype = Some(supertype);
        self
    }

    pub fn member(mut self, member: MemberDecl) -> Self {
        self.decl.members.push(member);
        self
    }

    pub fn build(mut self) -> Result<StructDecl, SchemaError> {
        let inherits = self.decl.supertype.is_some();
        validate_members(&self.decl.name, &mut self.decl.members, false, inherits)?;
        Ok(self.decl)
    }
}

pub struct ListBuilder {
    decl: ListDecl,
}

impl ListBuilder {
    pub fn new(name: &str) -> ListBuilder {
        ListBuilder {
            decl: ListDecl {
                name:             name.to_string(),
                length_type:      TypeRef::UINT32,
                field_count_type: TypeRef::UINT32,
                members:          Vec::new(),
            },
        }
    }

    pub fn framing(mut self, length_type: TypeRef, field_count_type: TypeRef) -> Self {
        self.decl.length_type = length_type;
        self.decl.field_count_type = field_count_type;
        self
    }

    pub fn member(mut self, member: MemberDecl) -> Self {
        self.decl.members.push(member);
        self
    }

    pub fn build(mut self) -> Result<ListDecl, SchemaError> {
        for framing in [&self.decl.length_type, &self.decl.field_count_type] {
            if !framing.is_fixed_int() {
                return Err(SchemaError::declaration(
                    &self.decl.name,
                    format!("list framing type {} must be a fixed-width integer", framing),
                ));
            }
        }
        validate_members(&self.decl.name, &mut self.decl.members, true, false)?;
        Ok(self.decl)
    }
}

pub struct UnionBuilder {
    decl: UnionDecl,
}

impl UnionBuilder {
    pub fn new(name: &str, kind_type: TypeRef) -> UnionBuilder {
        UnionBuilder {
            decl: UnionDecl {
                name: name.to_string(),
                kind_type,
                cases: Vec::new(),
            },
        }
    }

    pub fn case(mut self, tag: i64, member: MemberDecl) -> Self {
        self.decl.cases.push(UnionCase { tag, member });
        self
    }

    pub fn build(self) -> Result<UnionDecl, SchemaError> {
        let name = &self.decl.name;
        if self.decl.cases.is_empty() {
            return Err(SchemaError::declaration(name, "a union needs at least one case"));
        }
        check_unique_tags(name, self.decl.cases.iter().map(|c| c.tag))?;
        let mut members: Vec<MemberDecl> =
            self.decl.cases.iter().map(|c| c.member.clone()).collect();
        validate_members(name, &mut members, false, false)?;
        if let Some(member) = members.iter().find(|m| m.size_name.is_some()) {
            return Err(SchemaError::member(
                name,
                &member.name,
                "union cases cannot use a size field",
            ));
        }
        Ok(self.decl)
    }
}

pub struct VariantBuilder {
    decl:          VariantDecl,
    extra_missing: bool,
}

impl VariantBuilder {
    pub fn new(name: &str, kind_type: TypeRef) -> VariantBuilder {
        VariantBuilder {
            decl:          VariantDecl {
                name: name.to_string(),
                kind_type,
                cases: Vec::new(),
                missing_field_value: None,
            },
            extra_missing: false,
        }
    }

    pub fn case(mut self, tag: i64, ty: TypeRef) -> Self {
        self.decl.cases.push(VariantCase { tag, ty: Some(ty) });
        self
    }

    /// Designates `tag` as the zero-payload missing-field case.
    pub fn missing(mut self, tag: i64) -> Self {
        if self.decl.missing_field_value.is_some() {
            self.extra_missing = true;
        }
        self.decl.missing_field_value = Some(tag);
        self.decl.cases.push(VariantCase { tag, ty: None });
        self
    }

    pub fn build(self) -> Result<VariantDecl, SchemaError> {
        let name = &self.decl.name;
        if self.extra_missing {
            return Err(SchemaError::declaration(
                name,
                "only one case may be the missing-field case",
            ));
        }
        if self.decl.cases.iter().all(|c| c.ty.is_none()) {
            return Err(SchemaError::declaration(name, "a variant needs at least one typed case"));
        }
        check_unique_tags(name, self.decl.cases.iter().map(|c| c.tag))?;
        Ok(self.decl)
    }
}

pub struct EnumBuilder {
    decl: EnumDecl,
}

impl EnumBuilder {
    pub fn new(name: &str) -> EnumBuilder {
        EnumBuilder {
            decl: EnumDecl {
                name:    name.to_string(),
                backing: None,
                values:  Vec::new(),
            },
        }
    }

    pub fn backing(mut self, backing: TypeRef) -> Self {
        self.decl.backing = Some(backing);
        self
    }

    /// Adds a value; without an explicit ordinal it follows the previous one.
    pub fn value(mut self, name: &str, ordinal: Option<i64>) -> Self {
        let ordinal =
            ordinal.unwrap_or_else(|| self.decl.values.last().map_or(0, |v| v.ordinal + 1));
        self.decl.values.push(EnumValue {
            name: name.to_string(),
            ordinal,
        });
        self
    }

    pub fn build(self) -> Result<EnumDecl, SchemaError> {
        let name = &self.decl.name;
        if self.decl.values.is_empty() {
            return Err(SchemaError::declaration(name, "an enum needs at least one value"));
        }
        let mut names = HashSet::new();
        let mut ordinals = HashSet::new();
        for value in &self.decl.values {
            if !names.insert(value.name.as_str()) {
                return Err(SchemaError::Duplicate {
                    scope: name.clone(),
                    name:  value.name.clone(),
                });
            }
            if !ordinals.insert(value.ordinal) {
                return Err(SchemaError::declaration(
                    name,
                    format!("ordinal {} is used twice", value.ordinal),
                ));
            }
        }
        Ok(self.decl)
    }
}

fn check_unique_tags(decl: &str, tags: impl Iterator<Item = i64>) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for tag in tags {
        if !seen.insert(tag) {
            return Err(SchemaError::declaration(decl, format!("case {} is used twice", tag)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, ty: TypeRef) -> MemberBuilder {
        MemberBuilder::new(name, ty)
    }

    #[test]
    fn unsigned_members_use_signed_storage() {
        let m = member("port", TypeRef::UINT16).build();
        assert_eq!(m.ty, TypeRef::INT16);
        assert_eq!(m.unsigned_ty, Some(TypeRef::UINT16));
        assert_eq!(m.declared_type(), &TypeRef::UINT16);
    }

    #[test]
    fn size_field_is_marked() {
        let decl = StructBuilder::new("Frame")
            .member(member("length", TypeRef::UINT8).build())
            .member(member("payload", TypeRef::OCTETS).size_field("length").build())
            .build()
            .unwrap();
        assert!(decl.members[0].used_as_size);
        assert!(!decl.members[1].used_as_size);
    }

    #[test]
    fn nullable_dependent_needs_signed_size() {
        let err = StructBuilder::new("Frame")
            .member(member("length", TypeRef::UINT8).build())
            .member(
                member("payload", TypeRef::OCTETS)
                    .size_field("length")
                    .default_value(DefaultValue::Null)
                    .build(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSizeField { ref field, .. } if field == "payload"));

        let ok = StructBuilder::new("Frame")
            .member(member("length", TypeRef::INT8).build())
            .member(
                member("payload", TypeRef::OCTETS)
                    .size_field("length")
                    .default_value(DefaultValue::Null)
                    .build(),
            )
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn size_field_rules() {
        let later = StructBuilder::new("Frame")
            .member(member("payload", TypeRef::OCTETS).size_field("length").build())
            .member(member("length", TypeRef::UINT8).build())
            .build();
        assert!(matches!(later, Err(SchemaError::InvalidSizeField { .. })));

        let defaulted = StructBuilder::new("Frame")
            .member(member("length", TypeRef::UINT8).default_value(DefaultValue::Int(0)).build())
            .member(member("payload", TypeRef::OCTETS).size_field("length").build())
            .build();
        assert!(matches!(defaulted, Err(SchemaError::InvalidSizeField { .. })));

        let varint = StructBuilder::new("Frame")
            .member(member("length", TypeRef::VARINT32).build())
            .member(member("payload", TypeRef::OCTETS).size_field("length").build())
            .build();
        assert!(matches!(varint, Err(SchemaError::InvalidSizeField { .. })));

        let shared = StructBuilder::new("Frame")
            .member(member("length", TypeRef::UINT8).build())
            .member(member("a", TypeRef::OCTETS).size_field("length").build())
            .member(member("b", TypeRef::OCTETS).size_field("length").build())
            .build();
        assert!(matches!(shared, Err(SchemaError::InvalidSizeField { ref field, .. }) if field == "b"));

        let inherited = StructBuilder::new("Frame")
            .supertype(TypeRef::dynamic("Header"))
            .member(member("payload", TypeRef::OCTETS).size_field("length").build())
            .build();
        assert!(inherited.is_ok());

        let forward = StructBuilder::new("Frame")
            .supertype(TypeRef::dynamic("Header"))
            .member(member("payload", TypeRef::OCTETS).size_field("length").build())
            .member(member("length", TypeRef::UINT8).build())
            .build();
        assert!(matches!(forward, Err(SchemaError::InvalidSizeField { .. })));
    }

    #[test]
    fn required_only_in_lists() {
        let err = StructBuilder::new("S")
            .member(member("a", TypeRef::INT8).required(true).build())
            .build();
        assert!(matches!(err, Err(SchemaError::InvalidMember { .. })));

        let list = ListBuilder::new("L")
            .member(member("a", TypeRef::INT8).required(true).build())
            .build()
            .unwrap();
        assert!(list.members[0].required);
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = ScopeBuilder::root()
            .declare(EnumBuilder::new("Color").value("RED", None).build().unwrap())
            .declare(StructBuilder::new("Color").build().unwrap())
            .build();
        assert!(matches!(err, Err(SchemaError::Duplicate { ref name, .. }) if name == "Color"));
    }

    #[test]
    fn enum_ordinals_follow_previous() {
        let decl = EnumBuilder::new("Color")
            .value("RED", None)
            .value("GREEN", Some(5))
            .value("BLUE", None)
            .build()
            .unwrap();
        let ordinals: Vec<i64> = decl.values.iter().map(|v| v.ordinal).collect();
        assert_eq!(ordinals, vec![0, 5, 6]);
        assert_eq!(decl.ordinal_of("BLUE"), Some(6));
    }

    #[test]
    fn variant_allows_one_missing_case() {
        let err = VariantBuilder::new("V", TypeRef::UINT8)
            .missing(0x40)
            .missing(0x41)
            .case(0x42, TypeRef::INT32)
            .build();
        assert!(err.is_err());
        let ok = VariantBuilder::new("V", TypeRef::UINT8)
            .missing(0x40)
            .case(0x42, TypeRef::INT32)
            .build()
            .unwrap();
        assert_eq!(ok.missing_field_value, Some(0x40));
    }

    #[test]
    fn scope_depths_are_assigned() {
        let inner = ScopeBuilder::new("inner").build().unwrap();
        let outer = ScopeBuilder::new("outer").scope(inner).build().unwrap();
        let root = ScopeBuilder::root().scope(outer).build().unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.scopes[0].depth, 1);
        assert_eq!(root.scopes[0].scopes[0].depth, 2);
    }
}
