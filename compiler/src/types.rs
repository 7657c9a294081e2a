//! Type catalog: primitive and structural type tags, and references to
//! user types that are resolved later.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Int8,
    Int16,
    Int24,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint24,
    Uint32,
    Uint64,
    Varint32,
    Varint64,
    Octets,
    String8,
    String16,
    String32,
    Array,
    List,
    Map,
    Union,
    Variant,
    Enum,
}

lazy_static! {
    /// Schema keyword to type tag and optional framing width.
    pub static ref TYPE_KEYWORDS: HashMap<&'static str, (TypeKind, Option<u8>)> = {
        let mut map = HashMap::new();
        map.insert("int8", (TypeKind::Int8, None));
        map.insert("int16", (TypeKind::Int16, None));
        map.insert("int24", (TypeKind::Int24, None));
        map.insert("int32", (TypeKind::Int32, None));
        map.insert("int64", (TypeKind::Int64, None));
        map.insert("uint8", (TypeKind::Uint8, None));
        map.insert("uint16", (TypeKind::Uint16, None));
        map.insert("uint24", (TypeKind::Uint24, None));
        map.insert("uint32", (TypeKind::Uint32, None));
        map.insert("uint64", (TypeKind::Uint64, None));
        map.insert("varint32", (TypeKind::Varint32, None));
        map.insert("varint64", (TypeKind::Varint64, None));
        map.insert("octets", (TypeKind::Octets, None));
        map.insert("octets8", (TypeKind::Octets, Some(8)));
        map.insert("octets32", (TypeKind::Octets, Some(32)));
        map.insert("string8", (TypeKind::String8, None));
        map.insert("string16", (TypeKind::String16, None));
        map.insert("string32", (TypeKind::String32, None));
        map.insert("array8", (TypeKind::Array, Some(8)));
        map.insert("array16", (TypeKind::Array, Some(16)));
        map.insert("array32", (TypeKind::Array, Some(32)));
        map.insert("map8", (TypeKind::Map, Some(8)));
        map.insert("map32", (TypeKind::Map, Some(32)));
        map
    };

    /// Byte width of every fixed-width tag.
    pub static ref TYPE_WIDTHS: HashMap<TypeKind, usize> = {
        let mut map = HashMap::new();
        map.insert(TypeKind::Int8, 1);
        map.insert(TypeKind::Int16, 2);
        map.insert(TypeKind::Int24, 3);
        map.insert(TypeKind::Int32, 4);
        map.insert(TypeKind::Int64, 8);
        map.insert(TypeKind::Uint8, 1);
        map.insert(TypeKind::Uint16, 2);
        map.insert(TypeKind::Uint24, 3);
        map.insert(TypeKind::Uint32, 4);
        map.insert(TypeKind::Uint64, 8);
        map
    };

    /// Runtime accessor that reads a value of each tag.
    pub static ref ACCESSOR_NAMES: HashMap<TypeKind, &'static str> = {
        let mut map = HashMap::new();
        for kind in [
            TypeKind::Int8, TypeKind::Int16, TypeKind::Int24, TypeKind::Int32, TypeKind::Int64,
            TypeKind::Varint32, TypeKind::Varint64,
        ] {
            map.insert(kind, "get_int");
        }
        for kind in [
            TypeKind::Uint8, TypeKind::Uint16, TypeKind::Uint24, TypeKind::Uint32, TypeKind::Uint64,
        ] {
            map.insert(kind, "get_uint");
        }
        for kind in [TypeKind::String8, TypeKind::String16, TypeKind::String32] {
            map.insert(kind, "get_str");
        }
        map.insert(TypeKind::Octets, "get_bytes");
        for kind in [
            TypeKind::Array, TypeKind::List, TypeKind::Map,
            TypeKind::Union, TypeKind::Variant, TypeKind::Enum,
        ] {
            map.insert(kind, "get");
        }
        map
    };
}

impl TypeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Int8 => "int8",
            TypeKind::Int16 => "int16",
            TypeKind::Int24 => "int24",
            TypeKind::Int32 => "int32",
            TypeKind::Int64 => "int64",
            TypeKind::Uint8 => "uint8",
            TypeKind::Uint16 => "uint16",
            TypeKind::Uint24 => "uint24",
            TypeKind::Uint32 => "uint32",
            TypeKind::Uint64 => "uint64",
            TypeKind::Varint32 => "varint32",
            TypeKind::Varint64 => "varint64",
            TypeKind::Octets => "octets",
            TypeKind::String8 => "string8",
            TypeKind::String16 => "string16",
            TypeKind::String32 => "string32",
            TypeKind::Array => "array",
            TypeKind::List => "list",
            TypeKind::Map => "map",
            TypeKind::Union => "union",
            TypeKind::Variant => "variant",
            TypeKind::Enum => "enum",
        }
    }

    /// Byte width of fixed-width integer tags.
    pub fn width(self) -> Option<usize> {
        TYPE_WIDTHS.get(&self).copied()
    }

    /// Value width in bits for integers, length prefix width for strings.
    pub fn bits(self) -> Option<u8> {
        match self {
            TypeKind::Varint32 => Some(32),
            TypeKind::Varint64 => Some(64),
            TypeKind::String8 => Some(8),
            TypeKind::String16 => Some(16),
            TypeKind::String32 => Some(32),
            _ => self.width().map(|w| (w * 8) as u8),
        }
    }

    pub fn accessor(self) -> &'static str {
        ACCESSOR_NAMES.get(&self).copied().unwrap_or("get")
    }

    pub fn is_fixed_int(self) -> bool {
        self.width().is_some()
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint24
                | TypeKind::Uint32
                | TypeKind::Uint64
        )
    }

    pub fn is_varint(self) -> bool {
        matches!(self, TypeKind::Varint32 | TypeKind::Varint64)
    }

    pub fn is_integer(self) -> bool {
        self.is_fixed_int() || self.is_varint()
    }

    pub fn is_string(self) -> bool {
        matches!(self, TypeKind::String8 | TypeKind::String16 | TypeKind::String32)
    }

    /// Signed tag sharing storage with an unsigned one.
    pub fn signed_storage(self) -> TypeKind {
        match self {
            TypeKind::Uint8 => TypeKind::Int8,
            TypeKind::Uint16 => TypeKind::Int16,
            TypeKind::Uint24 => TypeKind::Int24,
            TypeKind::Uint32 => TypeKind::Int32,
            TypeKind::Uint64 => TypeKind::Int64,
            other => other,
        }
    }
}

/// A possibly scope-qualified name such as `Point`, `geo::Point` or
/// `::geo::Point`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeName {
    pub absolute: bool,
    pub segments: Vec<String>,
}

impl TypeName {
    pub fn parse(text: &str) -> TypeName {
        let absolute = text.starts_with("::");
        let segments = text
            .split("::")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        TypeName { absolute, segments }
    }

    /// Last path segment.
    pub fn simple(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.absolute {
            write!(f, "::")?;
        }
        write!(f, "{}", self.segments.join("::"))
    }
}

/// Either a catalog primitive (with an optional framing width, as in
/// `array32` or `octets8`) or a named user type awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeRef {
    Primitive { kind: TypeKind, bits: Option<u8> },
    Dynamic(TypeName),
}

macro_rules! primitive_consts {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(pub const $name: TypeRef = TypeRef::Primitive { kind: TypeKind::$kind, bits: None };)*
    };
}

impl TypeRef {
    primitive_consts! {
        INT8 => Int8, INT16 => Int16, INT24 => Int24, INT32 => Int32, INT64 => Int64,
        UINT8 => Uint8, UINT16 => Uint16, UINT24 => Uint24, UINT32 => Uint32, UINT64 => Uint64,
        VARINT32 => Varint32, VARINT64 => Varint64,
        OCTETS => Octets, STRING8 => String8, STRING16 => String16, STRING32 => String32,
    }

    pub fn primitive(kind: TypeKind) -> TypeRef {
        TypeRef::Primitive { kind, bits: None }
    }

    pub fn framed(kind: TypeKind, bits: u8) -> TypeRef {
        TypeRef::Primitive { kind, bits: Some(bits) }
    }

    pub fn dynamic(name: &str) -> TypeRef {
        TypeRef::Dynamic(TypeName::parse(name))
    }

    /// Keyword lookup, falling back to a dynamic reference.
    pub fn from_name(name: &str) -> TypeRef {
        match TYPE_KEYWORDS.get(name) {
            Some(&(kind, bits)) => TypeRef::Primitive { kind, bits },
            None => TypeRef::dynamic(name),
        }
    }

    pub fn kind(&self) -> Option<TypeKind> {
        match self {
            TypeRef::Primitive { kind, .. } => Some(*kind),
            TypeRef::Dynamic(_) => None,
        }
    }

    pub fn framing_bits(&self) -> Option<u8> {
        match self {
            TypeRef::Primitive { bits, .. } => *bits,
            TypeRef::Dynamic(_) => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive { .. })
    }

    pub fn is_fixed_int(&self) -> bool {
        self.kind().is_some_and(TypeKind::is_fixed_int)
    }

    pub fn is_integer(&self) -> bool {
        self.kind().is_some_and(TypeKind::is_integer)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeRef::Primitive { kind, bits: Some(bits) } => {
                write!(f, "{}{}", kind.keyword(), bits)
            }
            TypeRef::Primitive { kind, bits: None } => write!(f, "{}", kind.keyword()),
            TypeRef::Dynamic(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_resolve_to_primitives() {
        assert_eq!(TypeRef::from_name("uint16"), TypeRef::UINT16);
        assert_eq!(TypeRef::from_name("array32"), TypeRef::framed(TypeKind::Array, 32));
        assert_eq!(TypeRef::from_name("octets8"), TypeRef::framed(TypeKind::Octets, 8));
        assert_eq!(TypeRef::from_name("geo::Point"), TypeRef::dynamic("geo::Point"));
        assert_eq!(TypeRef::from_name("array32").to_string(), "array32");
    }

    #[test]
    fn widths_and_storage() {
        assert_eq!(TypeKind::Int24.width(), Some(3));
        assert_eq!(TypeKind::Uint64.bits(), Some(64));
        assert_eq!(TypeKind::Varint32.width(), None);
        assert_eq!(TypeKind::Uint24.signed_storage(), TypeKind::Int24);
        assert_eq!(TypeKind::String16.bits(), Some(16));
        assert_eq!(TypeKind::Uint8.accessor(), "get_uint");
        assert_eq!(TypeKind::Octets.accessor(), "get_bytes");
    }

    #[test]
    fn type_names() {
        let name = TypeName::parse("::geo::Point");
        assert!(name.absolute);
        assert_eq!(name.segments, vec!["geo", "Point"]);
        assert_eq!(name.simple(), "Point");
        assert_eq!(name.to_string(), "::geo::Point");
        assert!(!TypeName::parse("Point").absolute);
    }
}
