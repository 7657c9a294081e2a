//! Per-member encoding rules. An [`Encoding`] tells a reader or writer
//! exactly how a value sits on the wire; declarations are referenced by
//! absolute name and looked up in the plan.

use brine_wire_schema::ByteOrder;
use serde::Serialize;

use crate::{
    ast::{Declaration, MemberDecl},
    error::SchemaError,
    resolver::{Resolved, Resolver, ScopedMember},
    types::{TypeKind, TypeRef},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// Fixed-width integer of `bits / 8` bytes.
    Int { bits: u8, signed: bool, order: ByteOrder },
    /// Zigzag LEB128 varint.
    Varint { bits: u8 },
    /// Length-prefixed UTF-8; an all-ones prefix is null.
    String { prefix_bits: u8, order: ByteOrder },
    /// Exactly `length` bytes.
    FixedOctets { length: usize },
    /// Byte length taken from the member at index `size_field`.
    SizedOctets { size_field: usize },
    /// Self-describing octets with a length prefix.
    PrefixedOctets { prefix_bits: u8, order: ByteOrder },
    /// Exactly `length` items.
    FixedArray { length: usize, item: Box<Encoding> },
    /// Item count taken from the member at index `size_field`.
    SizedArray { size_field: usize, item: Box<Encoding> },
    /// Byte-length-prefixed run of items.
    Array { length_bits: u8, order: ByteOrder, item: Box<Encoding> },
    Struct { decl: String },
    List { decl: String },
    Union { decl: String },
    Variant { decl: String },
    Enum { decl: String },
    Map { decl: String },
}

impl Encoding {
    /// Byte width when it is known at compile time. Only fixed integers,
    /// fixed octets and fixed arrays of fixed integers qualify.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Encoding::Int { bits, .. } => Some(*bits as usize / 8),
            Encoding::FixedOctets { length } => Some(*length),
            Encoding::FixedArray { length, item } => match item.as_ref() {
                Encoding::Int { bits, .. } => Some(length * (*bits as usize / 8)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_width().is_some()
    }

    /// Index of the member this encoding takes its size from.
    pub fn size_field(&self) -> Option<usize> {
        match self {
            Encoding::SizedOctets { size_field } | Encoding::SizedArray { size_field, .. } => {
                Some(*size_field)
            }
            _ => None,
        }
    }

    /// Declaration referenced by this encoding, if any.
    pub fn decl(&self) -> Option<&str> {
        match self {
            Encoding::Struct { decl }
            | Encoding::List { decl }
            | Encoding::Union { decl }
            | Encoding::Variant { decl }
            | Encoding::Enum { decl }
            | Encoding::Map { decl } => Some(decl),
            _ => None,
        }
    }

    /// Integer encoding for framing prefixes and discriminators.
    pub fn integer(kind: TypeKind, order: ByteOrder) -> Option<Encoding> {
        if kind.is_varint() {
            return kind.bits().map(|bits| Encoding::Varint { bits });
        }
        kind.width().map(|width| Encoding::Int {
            bits: (width * 8) as u8,
            signed: !kind.is_unsigned(),
            order,
        })
    }
}

/// Encoding of a standalone value of type `ty`.
pub fn value_encoding(
    resolver: &Resolver,
    ty: &TypeRef,
    args: &[TypeRef],
    scope: &[String],
    decl: &str,
    order: ByteOrder,
) -> Result<Encoding, SchemaError> {
    let invalid = || SchemaError::declaration(decl, format!("{} has no standalone encoding", ty));
    match resolver.resolve(ty, scope, decl)? {
        Resolved::Primitive { kind, bits } => match kind {
            _ if kind.is_integer() => Encoding::integer(kind, order).ok_or_else(invalid),
            _ if kind.is_string() => Ok(Encoding::String {
                prefix_bits: kind.bits().unwrap_or(8),
                order,
            }),
            TypeKind::Octets => bits
                .map(|prefix_bits| Encoding::PrefixedOctets { prefix_bits, order })
                .ok_or_else(invalid),
            TypeKind::Array => {
                let (Some(length_bits), [item]) = (bits, args) else {
                    return Err(invalid());
                };
                Ok(Encoding::Array {
                    length_bits,
                    order,
                    item: Box::new(value_encoding(resolver, item, &[], scope, decl, order)?),
                })
            }
            _ => Err(invalid()),
        },
        Resolved::Named { entry, target } => {
            let decl = entry.path.clone();
            Ok(match target.decl {
                Declaration::Struct(_) => Encoding::Struct { decl },
                Declaration::List(_) => Encoding::List { decl },
                Declaration::Union(_) => Encoding::Union { decl },
                Declaration::Variant(_) => Encoding::Variant { decl },
                Declaration::Enum(_) => Encoding::Enum { decl },
                Declaration::Map(_) => Encoding::Map { decl },
                Declaration::Typedef(_) => return Err(invalid()),
            })
        }
    }
}

/// Encoding of member `member`, taking `T[N]` and `T[size]` into account.
/// `siblings` locates size fields by name.
pub fn member_encoding(
    resolver: &Resolver,
    scoped: &ScopedMember,
    siblings: &[&MemberDecl],
    decl: &str,
) -> Result<Encoding, SchemaError> {
    let member = scoped.member;
    let ty = member.declared_type();
    let bare_octets = ty.kind() == Some(TypeKind::Octets) && ty.framing_bits().is_none();
    let item = || {
        value_encoding(resolver, ty, &member.type_args, scoped.scope, decl, member.byte_order)
    };

    if let Some(length) = member.fixed_length {
        return Ok(if bare_octets {
            Encoding::FixedOctets { length }
        } else {
            Encoding::FixedArray {
                length,
                item: Box::new(item()?),
            }
        });
    }

    if let Some(size_name) = &member.size_name {
        let size_field = siblings
            .iter()
            .position(|m| &m.name == size_name)
            .ok_or_else(|| SchemaError::InvalidSizeField {
                decl:  decl.to_string(),
                field: member.name.clone(),
                msg:   format!("size field {} not found", size_name),
            })?;
        return Ok(if bare_octets {
            Encoding::SizedOctets { size_field }
        } else {
            Encoding::SizedArray {
                size_field,
                item: Box::new(item()?),
            }
        });
    }

    item()
}
