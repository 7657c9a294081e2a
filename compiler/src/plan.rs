//! Wire plan: every declaration's members with their placement and encoding.
//! This is the compiler's output; a backend or the runtime interpreter only
//! ever consumes a plan.

use brine_wire_schema::ByteOrder;
use log::{debug, trace};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    ast::{Declaration, DefaultValue, EnumValue, MemberDecl},
    encoding::{member_encoding, value_encoding, Encoding},
    error::SchemaError,
    layout::{layout_members, Placement},
    options::CompilerOptions,
    resolver::{Entry, Resolved, Resolver, ScopedMember},
    types::{TypeKind, TypeRef},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberPlan {
    pub name:         String,
    pub index:        usize,
    pub encoding:     Encoding,
    pub placement:    Placement,
    /// Enum symbols are already turned into ordinals.
    pub default:      DefaultValue,
    pub required:     bool,
    pub used_as_size: bool,
    /// Index of the member holding this member's size.
    pub size_field:   Option<usize>,
    /// Index of the member this one sizes.
    pub size_of:      Option<usize>,
    /// Runtime accessor that reads this member.
    pub accessor:     &'static str,
}

impl MemberPlan {
    pub fn has_default(&self) -> bool {
        self.default.is_present()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructPlan {
    pub name:       String,
    pub type_id:    u32,
    pub members:    Vec<MemberPlan>,
    pub end:        Placement,
    pub fixed_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPlan {
    pub name:        String,
    /// Byte length of everything after the length prefix.
    pub length:      Encoding,
    /// Number of members present.
    pub field_count: Encoding,
    pub members:     Vec<MemberPlan>,
    pub end:         Placement,
}

impl ListPlan {
    /// Bytes taken by the length and field count prefixes.
    pub fn header_size(&self) -> usize {
        self.length.fixed_width().unwrap_or(0) + self.field_count.fixed_width().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CasePlan {
    pub tag:      i64,
    /// Union cases carry a member name; variant cases do not.
    pub name:     Option<String>,
    /// `None` for the missing-field case.
    pub encoding: Option<Encoding>,
}

/// Discriminated payloads: unions and variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchPlan {
    pub name:    String,
    pub kind:    Encoding,
    pub cases:   Vec<CasePlan>,
    pub missing: Option<i64>,
}

impl SwitchPlan {
    pub fn case(&self, tag: i64) -> Option<&CasePlan> {
        self.cases.iter().find(|c| c.tag == tag)
    }

    pub fn case_named(&self, name: &str) -> Option<&CasePlan> {
        self.cases.iter().find(|c| c.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumPlan {
    pub name:    String,
    pub backing: Encoding,
    pub values:  Vec<EnumValue>,
}

impl EnumPlan {
    pub fn ordinal(&self, symbol: &str) -> Option<i64> {
        self.values.iter().find(|v| v.name == symbol).map(|v| v.ordinal)
    }

    pub fn symbol(&self, ordinal: i64) -> Option<&str> {
        self.values.iter().find(|v| v.ordinal == ordinal).map(|v| v.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPlan {
    pub name:   String,
    /// Width and order of both the length and the field count prefix.
    pub length: Encoding,
    pub key:    Encoding,
    pub value:  Encoding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeclPlan {
    Struct(StructPlan),
    List(ListPlan),
    Union(SwitchPlan),
    Variant(SwitchPlan),
    Enum(EnumPlan),
    Map(MapPlan),
}

impl DeclPlan {
    pub fn name(&self) -> &str {
        match self {
            DeclPlan::Struct(p) => &p.name,
            DeclPlan::List(p) => &p.name,
            DeclPlan::Union(p) | DeclPlan::Variant(p) => &p.name,
            DeclPlan::Enum(p) => &p.name,
            DeclPlan::Map(p) => &p.name,
        }
    }

    fn rename(mut self, name: &str) -> DeclPlan {
        let slot = match &mut self {
            DeclPlan::Struct(p) => &mut p.name,
            DeclPlan::List(p) => &mut p.name,
            DeclPlan::Union(p) | DeclPlan::Variant(p) => &mut p.name,
            DeclPlan::Enum(p) => &mut p.name,
            DeclPlan::Map(p) => &mut p.name,
        };
        *slot = name.to_string();
        self
    }

    /// Members of structs and lists.
    pub fn members(&self) -> &[MemberPlan] {
        match self {
            DeclPlan::Struct(p) => &p.members,
            DeclPlan::List(p) => &p.members,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub decls: BTreeMap<String, DeclPlan>,
}

impl Plan {
    /// Looks a declaration up by absolute name or, failing that, by a simple
    /// name that only one declaration carries.
    pub fn find(&self, name: &str) -> Option<&DeclPlan> {
        let name = name.strip_prefix("::").unwrap_or(name);
        if let Some(plan) = self.decls.get(name) {
            return Some(plan);
        }
        let mut matches = self
            .decls
            .iter()
            .filter(|(path, _)| path.rsplit("::").next() == Some(name))
            .map(|(_, plan)| plan);
        match (matches.next(), matches.next()) {
            (Some(plan), None) => Some(plan),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Builds the plan of every declaration. Expects a validated resolver.
pub fn plan_schema(resolver: &Resolver, options: &CompilerOptions) -> Result<Plan, SchemaError> {
    let mut plan = Plan::default();
    for entry in resolver.entries() {
        debug!("planning {} {}", entry.decl.keyword(), entry.path);
        let target = resolver.target(entry)?;
        let decl_plan =
            plan_entry(resolver, target, options.default_byte_order)?.rename(&entry.path);
        plan.decls.insert(entry.path.clone(), decl_plan);
    }
    Ok(plan)
}

fn encodings(members: &[MemberPlan]) -> Vec<Encoding> {
    members.iter().map(|m| m.encoding.clone()).collect()
}

fn plan_entry(
    resolver: &Resolver,
    entry: &Entry,
    order: ByteOrder,
) -> Result<DeclPlan, SchemaError> {
    let path = entry.path.as_str();
    let framing = |ty: &TypeRef| {
        ty.kind()
            .and_then(|kind| Encoding::integer(kind, order))
            .ok_or_else(|| SchemaError::declaration(path, format!("{} cannot frame a value", ty)))
    };

    Ok(match entry.decl {
        Declaration::Struct(_) => {
            let members = plan_members(resolver, entry)?;
            let layout = layout_members(&encodings(&members));
            DeclPlan::Struct(StructPlan {
                name: entry.path.clone(),
                type_id: resolver.type_id(entry)?,
                members: place(members, &layout.placements),
                end: layout.end,
                fixed_size: layout.fixed_size,
            })
        }
        Declaration::List(decl) => {
            let members = plan_members(resolver, entry)?;
            let layout = layout_members(&encodings(&members));
            DeclPlan::List(ListPlan {
                name:        entry.path.clone(),
                length:      framing(&decl.length_type)?,
                field_count: framing(&decl.field_count_type)?,
                members:     place(members, &layout.placements),
                end:         layout.end,
            })
        }
        Declaration::Union(decl) => {
            let mut cases = Vec::with_capacity(decl.cases.len());
            for case in &decl.cases {
                let scoped = ScopedMember {
                    member: &case.member,
                    scope:  &entry.scope,
                };
                cases.push(CasePlan {
                    tag:      case.tag,
                    name:     Some(case.member.name.clone()),
                    encoding: Some(member_encoding(resolver, &scoped, &[], path)?),
                });
            }
            DeclPlan::Union(SwitchPlan {
                name: entry.path.clone(),
                kind: framing(&decl.kind_type)?,
                cases,
                missing: None,
            })
        }
        Declaration::Variant(decl) => {
            let mut cases = Vec::with_capacity(decl.cases.len());
            for case in &decl.cases {
                let encoding = match &case.ty {
                    Some(ty) => Some(value_encoding(resolver, ty, &[], &entry.scope, path, order)?),
                    None => None,
                };
                cases.push(CasePlan {
                    tag: case.tag,
                    name: None,
                    encoding,
                });
            }
            DeclPlan::Variant(SwitchPlan {
                name: entry.path.clone(),
                kind: framing(&decl.kind_type)?,
                cases,
                missing: decl.missing_field_value,
            })
        }
        Declaration::Enum(decl) => {
            let backing = match &decl.backing {
                None => framing(&TypeRef::UINT8)?,
                Some(ty) => value_encoding(resolver, ty, &[], &entry.scope, path, order)?,
            };
            DeclPlan::Enum(EnumPlan {
                name: entry.path.clone(),
                backing,
                values: decl.values.clone(),
            })
        }
        Declaration::Map(decl) => {
            let bits = decl.template.framing_bits().unwrap_or(32);
            DeclPlan::Map(MapPlan {
                name:   entry.path.clone(),
                length: Encoding::Int {
                    bits,
                    signed: false,
                    order,
                },
                key:    value_encoding(resolver, &decl.key, &[], &entry.scope, path, order)?,
                value:  value_encoding(resolver, &decl.value, &[], &entry.scope, path, order)?,
            })
        }
        Declaration::Typedef(_) => {
            return Err(SchemaError::declaration(path, "typedef was not resolved"));
        }
    })
}

fn plan_members(resolver: &Resolver, entry: &Entry) -> Result<Vec<MemberPlan>, SchemaError> {
    let path = entry.path.as_str();
    let scoped = resolver.members(entry)?;
    let siblings: Vec<&MemberDecl> = scoped.iter().map(|s| s.member).collect();

    let mut members = Vec::with_capacity(scoped.len());
    for (index, member) in scoped.iter().enumerate() {
        let encoding = member_encoding(resolver, member, &siblings, path)?;
        let default = resolve_default(resolver, member, path)?;
        let accessor = match member.member.declared_type().kind() {
            Some(kind) if !member.member.is_sized() => kind.accessor(),
            Some(TypeKind::Octets) => TypeKind::Octets.accessor(),
            _ => "get",
        };
        members.push(MemberPlan {
            name: member.member.name.clone(),
            index,
            size_field: encoding.size_field(),
            size_of: None,
            encoding,
            placement: Placement::Static(0),
            default,
            required: member.member.required,
            used_as_size: false,
            accessor,
        });
    }

    for index in 0..members.len() {
        if let Some(size_field) = members[index].size_field {
            members[size_field].size_of = Some(index);
            members[size_field].used_as_size = true;
        }
    }
    Ok(members)
}

fn place(mut members: Vec<MemberPlan>, placements: &[Placement]) -> Vec<MemberPlan> {
    for (member, placement) in members.iter_mut().zip(placements) {
        trace!("{} at {:?}", member.name, placement);
        member.placement = *placement;
    }
    members
}

/// Turns enum symbols into ordinals so runtimes never need the schema model.
fn resolve_default(
    resolver: &Resolver,
    scoped: &ScopedMember,
    path: &str,
) -> Result<DefaultValue, SchemaError> {
    let member = scoped.member;
    let DefaultValue::Symbol(symbol) = &member.default else {
        return Ok(member.default.clone());
    };
    let resolved = resolver.resolve(member.declared_type(), scoped.scope, path)?;
    if let Resolved::Named { target, .. } = resolved {
        if let Declaration::Enum(decl) = target.decl {
            if let Some(ordinal) = decl.ordinal_of(symbol) {
                return Ok(DefaultValue::Int(ordinal));
            }
        }
    }
    Err(SchemaError::default_value(
        path,
        &member.name,
        format!("{} is not an enum value", symbol),
    ))
}
