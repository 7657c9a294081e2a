use std::fmt;

use brine_wire_compiler::{DeclPlan, MemberPlan, Plan};
use brine_wire_schema::ByteBuffer;
use log::trace;

use crate::codec::{lookup, Reader, Result};
use crate::error::FlyweightError;
use crate::value::Value;

/// A read-only view of one declaration over caller-owned bytes.
///
/// Wrapping resolves the range of every member once; accessors then read
/// straight from the buffer. A flyweight can be re-wrapped any number of
/// times without allocating again.
///
/// ```
/// use brine_wire::{compile_schema, Flyweight};
///
/// let (_, plan) = compile_schema("struct Point { network int16 x; network int16 y; }").unwrap();
/// let bytes = [0x00, 0x01, 0xff, 0xff];
/// let mut point = Flyweight::new(&plan, "Point").unwrap();
/// assert_eq!(point.wrap(&bytes, 0, bytes.len()), Ok(4));
/// assert_eq!(point.get_int("x"), Ok(1));
/// assert_eq!(point.get_int("y"), Ok(-1));
/// ```
pub struct Flyweight<'a> {
    plan:    &'a Plan,
    decl:    &'a DeclPlan,
    bb:      Option<ByteBuffer<'a>>,
    offset:  usize,
    limit:   usize,
    present: usize,
    ranges:  Vec<(usize, usize)>,
    kind:    Option<i64>,
}

impl<'a> Flyweight<'a> {
    pub fn new(plan: &'a Plan, name: &str) -> Result<Flyweight<'a>> {
        Ok(Flyweight::for_decl(plan, lookup(plan, name)?))
    }

    pub(crate) fn for_decl(plan: &'a Plan, decl: &'a DeclPlan) -> Flyweight<'a> {
        Flyweight {
            plan,
            decl,
            bb: None,
            offset: 0,
            limit: 0,
            present: 0,
            ranges: Vec::with_capacity(decl.members().len()),
            kind: None,
        }
    }

    /// Wraps the message at `offset`; nothing past `max_limit` is read.
    /// Returns the limit just past the message.
    ///
    /// A top-level union or variant with an unrecognised discriminator still
    /// wraps; its payload is skipped and it renders as `unknown`.
    pub fn wrap(&mut self, buf: &'a [u8], offset: usize, max_limit: usize) -> Result<usize> {
        self.bb = None;
        self.kind = None;
        let reader = Reader::new(self.plan, ByteBuffer::with_limit(buf, max_limit));
        reader.bb.check(offset, 0)?;
        let limit = match self.decl {
            DeclPlan::Struct(_) | DeclPlan::List(_) => {
                let walk = reader.walk(self.decl, offset, &mut self.ranges)?;
                self.present = walk.present;
                walk.limit
            }
            DeclPlan::Union(plan) | DeclPlan::Variant(plan) => {
                let (tag, payload) = reader.integer(&plan.kind, offset)?;
                self.kind = Some(tag);
                match plan.case(tag).and_then(|case| case.encoding.as_ref()) {
                    Some(enc) => reader.measure(enc, payload, None)?,
                    None => payload,
                }
            }
            DeclPlan::Enum(_) | DeclPlan::Map(_) => reader.measure_decl(self.decl, offset)?,
        };
        trace!("wrapped {} at {}..{}", self.decl.name(), offset, limit);
        self.bb = Some(reader.bb);
        self.offset = offset;
        self.limit = limit;
        Ok(limit)
    }

    pub fn name(&self) -> &'a str {
        self.decl.name()
    }

    pub fn decl(&self) -> &'a DeclPlan {
        self.decl
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn reader(&self) -> Result<Reader<'a>> {
        self.bb
            .map(|bb| Reader::new(self.plan, bb))
            .ok_or(FlyweightError::NotWrapped)
    }

    fn member(&self, name: &str) -> Result<(usize, &'a MemberPlan)> {
        self.decl
            .members()
            .iter()
            .enumerate()
            .find(|(_, member)| member.name == name)
            .ok_or_else(|| FlyweightError::UnknownField {
                decl:  self.decl.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Reads a member of a struct or list, or the payload of a union case
    /// (null unless that case is the one on the wire).
    pub fn get(&self, name: &str) -> Result<Value<'a>> {
        let reader = self.reader()?;
        if let DeclPlan::Union(plan) = self.decl {
            let case = plan.case_named(name).ok_or_else(|| FlyweightError::UnknownField {
                decl:  plan.name.clone(),
                field: name.to_string(),
            })?;
            if self.kind != Some(case.tag) {
                return Ok(Value::Null);
            }
            return match reader.read_decl(self.decl, self.offset)?.0 {
                Value::Case(_, _, payload) => Ok(*payload),
                _ => Ok(Value::Null),
            };
        }
        let (index, _) = self.member(name)?;
        reader.member(self.decl.members(), index, &self.ranges, self.present)
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        self.get(name)?
            .as_int()
            .ok_or_else(|| FlyweightError::mismatch(name, "an integer"))
    }

    pub fn get_uint(&self, name: &str) -> Result<u64> {
        self.get(name)?
            .as_uint()
            .ok_or_else(|| FlyweightError::mismatch(name, "an unsigned integer"))
    }

    /// `None` when the string is null.
    pub fn get_str(&self, name: &str) -> Result<Option<&'a str>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text)),
            _ => Err(FlyweightError::mismatch(name, "a string")),
        }
    }

    /// `None` when the octets are null.
    pub fn get_bytes(&self, name: &str) -> Result<Option<&'a [u8]>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Octets(bytes) => Ok(Some(bytes)),
            _ => Err(FlyweightError::mismatch(name, "octets")),
        }
    }

    /// False for list members past the field count, null values and the
    /// missing-field case of a variant.
    pub fn is_present(&self, name: &str) -> Result<bool> {
        let (index, _) = self.member(name)?;
        if index >= self.present {
            return Ok(false);
        }
        Ok(match self.get(name)? {
            Value::Null => false,
            Value::Case(_, _, payload) => !payload.is_null(),
            _ => true,
        })
    }

    /// Byte range of a member; empty for absent list members.
    pub fn member_range(&self, name: &str) -> Result<(usize, usize)> {
        self.reader()?;
        let (index, _) = self.member(name)?;
        Ok(self.ranges[index])
    }

    /// Hands every item of an array member to `visit` in order, without
    /// collecting them. Returns the number of items.
    pub fn for_each_item(
        &self,
        name: &str,
        mut visit: impl FnMut(Value<'a>) -> std::result::Result<(), FlyweightError>,
    ) -> Result<usize> {
        let reader = self.reader()?;
        let (index, member) = self.member(name)?;
        if index >= self.present {
            return Ok(0);
        }
        let members = self.decl.members();
        let size = reader.size_value(members, member, &self.ranges)?;
        let mut items = 0;
        reader.items(&member.encoding, self.ranges[index].0, size, |item, at| {
            let (value, end) = reader.read(item, at, None)?;
            visit(value)?;
            items += 1;
            Ok(end)
        })?;
        Ok(items)
    }

    /// Wraps `child` around a struct, list, union, variant, enum or map
    /// member. `child` must view the member's declaration.
    pub fn wrap_member(&self, name: &str, child: &mut Flyweight<'a>) -> Result<usize> {
        let bb = self.bb.ok_or(FlyweightError::NotWrapped)?;
        let (index, member) = self.member(name)?;
        let expected = member.encoding.decl().and_then(|decl| self.plan.find(decl));
        if expected.map(DeclPlan::name) != Some(child.name()) {
            return Err(FlyweightError::mismatch(name, "the declaration of the child view"));
        }
        if index >= self.present {
            return Err(FlyweightError::mismatch(name, "a member present on the wire"));
        }
        let (start, limit) = self.ranges[index];
        child.wrap(bb.data(), start, limit)
    }

    /// Discriminator of a union or variant.
    pub fn kind(&self) -> Result<i64> {
        self.reader()?;
        self.kind
            .ok_or_else(|| FlyweightError::mismatch(self.decl.name(), "a union or variant"))
    }

    /// Decodes the whole declaration.
    pub fn value(&self) -> Result<Value<'a>> {
        let reader = self.reader()?;
        match self.decl {
            DeclPlan::Struct(_) | DeclPlan::List(_) => {
                let members = self.decl.members();
                let mut fields = Vec::with_capacity(members.len());
                for (index, member) in members.iter().enumerate() {
                    fields.push((
                        member.name.as_str(),
                        reader.member(members, index, &self.ranges, self.present)?,
                    ));
                }
                Ok(Value::Object(self.decl.name(), fields))
            }
            DeclPlan::Union(plan) | DeclPlan::Variant(plan) => match self.kind {
                Some(tag) if plan.case(tag).is_none() => Ok(Value::Unknown(&plan.name, tag)),
                _ => Ok(reader.read_decl(self.decl, self.offset)?.0),
            },
            _ => Ok(reader.read_decl(self.decl, self.offset)?.0),
        }
    }

    /// The wrapped message's bytes.
    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        let bb = self.bb.ok_or(FlyweightError::NotWrapped)?;
        Ok(&bb.data()[self.offset..self.limit])
    }
}

impl fmt::Display for Flyweight<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value() {
            Ok(value) => write!(f, "{}", value),
            Err(err) => write!(f, "<{}: {}>", self.decl.name(), err),
        }
    }
}

impl fmt::Debug for Flyweight<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Flyweight")
            .field("decl", &self.decl.name())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("wrapped", &self.bb.is_some())
            .finish()
    }
}
