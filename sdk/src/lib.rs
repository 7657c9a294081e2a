//! brine-wire
//!
//! Runtime support for Brine Wire messages. Everything works off a compiled
//! [`Plan`] and caller-owned memory:
//!
//! - [`Flyweight`] reads a declaration in place, without copying,
//! - [`Builder`] writes one, enforcing declaration order, defaults, size
//!   fields and the region's max limit,
//! - [`encode`] and [`decode`] do the same in one call from and to dynamic
//!   [`Input`] / [`Value`] trees.
//!
//! ```
//! use brine_wire::{compile_schema, decode, encode, Input, Value};
//!
//! let schema = "struct Tick { varint32 delta; string8 venue = null; }";
//! let (_, plan) = compile_schema(schema).unwrap();
//! let mut bytes = [0u8; 8];
//! let input = Input::fields([("delta", Input::Int(-66))]);
//! let limit = encode(&plan, "Tick", &input, &mut bytes, 0, 8).unwrap();
//! assert_eq!(&bytes[..limit], &[0x83, 0x01, 0xff]);
//!
//! let tick = decode(&plan, "Tick", &bytes, 0, limit).unwrap();
//! assert_eq!(tick.get("delta"), Some(&Value::Int(-66)));
//! assert_eq!(tick.get("venue"), Some(&Value::Null));
//! ```

pub mod builder;
mod codec;
pub mod error;
pub mod flyweight;
pub mod value;

use std::path::Path;

pub use brine_wire_compiler::{
    compile_schema, compile_schema_with, CompilerOptions, DeclPlan, Plan, SchemaError,
};
pub use brine_wire_schema::{ByteBuffer, ByteBufferMut, ByteOrder, WireError};
pub use builder::Builder;
pub use error::{Error, FlyweightError};
pub use flyweight::Flyweight;
pub use value::{Input, Value};

use codec::{encode_decl, lookup, Sink};

/// Encodes `input` as declaration `name` at `offset`. Nothing is written
/// unless the whole value is valid and ends at or before `max_limit`.
/// Returns the limit just past the value.
pub fn encode(
    plan: &Plan,
    name: &str,
    input: &Input,
    buf: &mut [u8],
    offset: usize,
    max_limit: usize,
) -> Result<usize, FlyweightError> {
    let decl = lookup(plan, name)?;
    let mut out = ByteBufferMut::with_limit(buf, max_limit);
    out.check(offset, 0)?;
    let end = encode_decl(plan, decl, decl.name(), offset, input, &mut Sink::Measure)?;
    if end > out.max_limit() {
        return Err(FlyweightError::OutOfBounds {
            field:     decl.name().to_string(),
            limit:     end,
            max_limit: out.max_limit(),
        });
    }
    encode_decl(plan, decl, decl.name(), offset, input, &mut Sink::Write(&mut out))
}

/// Decodes declaration `name` at `offset`, reading nothing past `max_limit`.
pub fn decode<'a>(
    plan: &'a Plan,
    name: &str,
    buf: &'a [u8],
    offset: usize,
    max_limit: usize,
) -> Result<Value<'a>, FlyweightError> {
    let mut view = Flyweight::new(plan, name)?;
    view.wrap(buf, offset, max_limit)?;
    view.value()
}

/// Reads, validates and plans a schema file.
pub fn load_plan(path: impl AsRef<Path>, options: &CompilerOptions) -> Result<Plan, Error> {
    let (_, plan) = brine_wire_compiler::compile_schema_file(path, options)?;
    Ok(plan)
}

/// Converts a decoded value to JSON for tooling. Octets become arrays of
/// numbers, enums their symbol and union or variant cases an object with
/// `kind` and `value`.
pub fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::{json, Map, Value as Json};
    match value {
        Value::Null => Json::Null,
        Value::Int(v) => json!(v),
        Value::Uint(v) => json!(v),
        Value::String(v) => json!(v),
        Value::Octets(v) => json!(v),
        Value::Enum(_, symbol) => json!(symbol),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Object(_, fields) => {
            let object: Map<_, _> =
                fields.iter().map(|(k, v)| (k.to_string(), to_json(v))).collect();
            Json::Object(object)
        }
        Value::Case(_, kind, payload) => json!({ "kind": kind, "value": to_json(payload) }),
        Value::Unknown(_, kind) => json!({ "kind": kind, "value": "unknown" }),
        Value::Map(_, entries) => Json::Array(
            entries
                .iter()
                .map(|(k, v)| json!({ "key": to_json(k), "value": to_json(v) }))
                .collect(),
        ),
    }
}
