//! Write side of the runtime.
//!
//! A [`Builder`] writes one declaration into caller-owned memory. Members of
//! structs and lists are set in declaration order; members skipped on the way
//! take their default, and size fields are reserved and then filled in when
//! their dependent is written. Every write is sized and bounds checked before
//! any byte is touched, so a failed set leaves memory past the current limit
//! untouched.

use brine_wire_compiler::{DeclPlan, Encoding, MemberPlan, Plan, SwitchPlan};
use brine_wire_schema::{ByteBuffer, ByteBufferMut, WireError};
use log::{debug, trace};

use crate::codec::{
    encode, encode_case, encode_decl, fill_input, lookup, size_of_input, Reader, Result, Sink,
};
use crate::error::FlyweightError;
use crate::flyweight::Flyweight;
use crate::value::Input;

/// What goes into the member being set.
enum Payload<'p, 'v> {
    Input(&'p Input<'v>),
    /// Encoded bytes, with the size to record for sized members.
    Raw(&'p [u8], Option<i64>),
}

/// The members of the struct or list being written.
#[derive(Clone, Copy)]
struct Record<'p> {
    plan:    &'p Plan,
    members: &'p [MemberPlan],
    in_list: bool,
}

impl Record<'_> {
    /// Writes members `from..to` that were never set: size fields are
    /// reserved, everything else takes its fill value. `starts` receives
    /// the start of each member.
    fn skip(
        &self,
        from: usize,
        to: usize,
        mut at: usize,
        sink: &mut Sink<'_, '_>,
        starts: &mut Vec<usize>,
    ) -> Result<usize> {
        starts.truncate(from);
        for member in &self.members[from..to] {
            starts.push(at);
            let input = if member.used_as_size {
                Input::Int(0)
            } else {
                fill_input(self.plan, member, self.in_list)?
                    .ok_or_else(|| FlyweightError::RequiredFieldNotSet(member.name.clone()))?
            };
            at = encode(self.plan, &member.encoding, &member.name, at, &input, sink)?;
            if member.size_field.is_some() {
                self.patch(member, size_of_input(member, Some(&input))?, sink, starts)?;
            }
        }
        Ok(at)
    }

    /// Skips up to member `index` and writes `payload` into it.
    fn put(
        &self,
        from: usize,
        index: usize,
        at: usize,
        payload: &Payload,
        sink: &mut Sink<'_, '_>,
        starts: &mut Vec<usize>,
    ) -> Result<usize> {
        let at = self.skip(from, index, at, sink, starts)?;
        starts.push(at);
        let member = &self.members[index];
        let (end, size) = match *payload {
            Payload::Input(input) => {
                let end = encode(self.plan, &member.encoding, &member.name, at, input, sink)?;
                let size = match member.size_field {
                    Some(_) => Some(size_of_input(member, Some(input))?),
                    None => None,
                };
                (end, size)
            }
            Payload::Raw(bytes, size) => (sink.bytes(at, bytes)?, size),
        };
        if let Some(size) = size {
            self.patch(member, size, sink, starts)?;
        }
        Ok(end)
    }

    /// Writes `size` into the size field of `member`.
    fn patch(
        &self,
        member: &MemberPlan,
        size: i64,
        sink: &mut Sink<'_, '_>,
        starts: &[usize],
    ) -> Result<()> {
        if let Some(field) = member.size_field {
            let sizer = &self.members[field];
            sink.integer(&sizer.encoding, &sizer.name, starts[field], size as i128)?;
        }
        Ok(())
    }
}

/// Writes one declaration into caller-owned memory.
///
/// ```
/// use brine_wire::{compile_schema, Builder};
///
/// let (_, plan) = compile_schema("struct Greeting { uint8 id; string8 text; }").unwrap();
/// let mut bytes = [0u8; 16];
/// let mut builder = Builder::new(&plan, "Greeting").unwrap();
/// builder.wrap(&mut bytes, 0, 16).unwrap();
/// builder.set("id", 7u8).unwrap().set("text", "hi").unwrap();
/// let greeting = builder.build().unwrap();
/// assert_eq!(greeting.limit(), 4);
/// assert_eq!(greeting.get_str("text"), Ok(Some("hi")));
/// ```
pub struct Builder<'a> {
    plan:   &'a Plan,
    decl:   &'a DeclPlan,
    out:    Option<ByteBufferMut<'a>>,
    offset: usize,
    /// Where members start; past the header for lists.
    body:   usize,
    limit:  usize,
    /// Index of the next member that may be set.
    next:   usize,
    starts: Vec<usize>,
}

impl<'a> Builder<'a> {
    pub fn new(plan: &'a Plan, name: &str) -> Result<Builder<'a>> {
        Ok(Builder::for_decl(plan, lookup(plan, name)?))
    }

    fn for_decl(plan: &'a Plan, decl: &'a DeclPlan) -> Builder<'a> {
        Builder {
            plan,
            decl,
            out: None,
            offset: 0,
            body: 0,
            limit: 0,
            next: 0,
            starts: Vec::with_capacity(decl.members().len()),
        }
    }

    /// Wraps `buf` for writing at `offset`; nothing at or past `max_limit` is
    /// written. Clears every member set so far.
    pub fn wrap(
        &mut self,
        buf: &'a mut [u8],
        offset: usize,
        max_limit: usize,
    ) -> Result<&mut Self> {
        self.attach(ByteBufferMut::with_limit(buf, max_limit), offset)?;
        Ok(self)
    }

    fn attach(&mut self, out: ByteBufferMut<'a>, offset: usize) -> Result<()> {
        self.out = None;
        let header = match self.decl {
            DeclPlan::List(plan) => plan.header_size(),
            _ => 0,
        };
        let body = match offset.checked_add(header) {
            Some(body) if body <= out.max_limit() => body,
            _ => {
                return Err(FlyweightError::OutOfBounds {
                    field:     self.decl.name().to_string(),
                    limit:     offset.saturating_add(header),
                    max_limit: out.max_limit(),
                })
            }
        };
        self.out = Some(out);
        self.offset = offset;
        self.body = body;
        self.limit = body;
        self.next = 0;
        self.starts.clear();
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Limit just past everything written so far.
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn record(&self) -> Record<'a> {
        Record {
            plan:    self.plan,
            members: self.decl.members(),
            in_list: matches!(self.decl, DeclPlan::List(_)),
        }
    }

    fn member(&self, name: &str) -> Result<(usize, &'a MemberPlan)> {
        if self.out.is_none() {
            return Err(FlyweightError::NotWrapped);
        }
        let (index, member) = self
            .decl
            .members()
            .iter()
            .enumerate()
            .find(|(_, member)| member.name == name)
            .ok_or_else(|| FlyweightError::UnknownField {
                decl:  self.decl.name().to_string(),
                field: name.to_string(),
            })?;
        if member.used_as_size {
            return Err(FlyweightError::SizeField(name.to_string()));
        }
        if index < self.next {
            return Err(FlyweightError::AlreadySet(name.to_string()));
        }
        Ok((index, member))
    }

    /// Sizes a write with `write`, checks it against the max limit and only
    /// then performs it. Returns the new limit.
    fn commit(
        &mut self,
        field: &str,
        mut write: impl FnMut(&mut Sink<'_, '_>, &mut Vec<usize>) -> Result<usize>,
    ) -> Result<usize> {
        let end = write(&mut Sink::Measure, &mut self.starts)?;
        let out = self.out.as_mut().ok_or(FlyweightError::NotWrapped)?;
        if end > out.max_limit() {
            return Err(FlyweightError::OutOfBounds {
                field:     field.to_string(),
                limit:     end,
                max_limit: out.max_limit(),
            });
        }
        write(&mut Sink::Write(out), &mut self.starts)?;
        Ok(end)
    }

    fn set_member(&mut self, name: &str, index: usize, payload: Payload) -> Result<()> {
        let record = self.record();
        let (from, at) = (self.next, self.limit);
        let end = self.commit(name, |sink, starts| {
            record.put(from, index, at, &payload, sink, starts)
        })?;
        trace!("set {}.{} at {}..{}", self.decl.name(), name, at, end);
        self.limit = end;
        self.next = index + 1;
        Ok(())
    }

    /// Sets a struct or list member, or picks the case of a union by member
    /// name. Members must be set in declaration order.
    pub fn set<'v>(&mut self, name: &str, input: impl Into<Input<'v>>) -> Result<&mut Self> {
        let input = input.into();
        let decl = self.decl;
        match decl {
            DeclPlan::Union(switch) => self.set_case(switch, name, &input)?,
            DeclPlan::Struct(_) | DeclPlan::List(_) => {
                let (index, _) = self.member(name)?;
                self.set_member(name, index, Payload::Input(&input))?;
            }
            _ => return Err(FlyweightError::mismatch(name, "a struct, list or union member")),
        }
        Ok(self)
    }

    fn set_case(&mut self, switch: &'a SwitchPlan, name: &str, input: &Input) -> Result<()> {
        if self.out.is_none() {
            return Err(FlyweightError::NotWrapped);
        }
        let case = switch.case_named(name).ok_or_else(|| FlyweightError::UnknownField {
            decl:  switch.name.clone(),
            field: name.to_string(),
        })?;
        if self.next > 0 {
            return Err(FlyweightError::AlreadySet(name.to_string()));
        }
        let (plan, at) = (self.plan, self.offset);
        self.limit =
            self.commit(name, |sink, _| encode_case(plan, switch, case, name, at, input, sink))?;
        self.next = 1;
        Ok(())
    }

    pub fn set_null(&mut self, name: &str) -> Result<&mut Self> {
        self.set(name, Input::Null)
    }

    /// Writes already-encoded bytes into a member. The bytes must hold
    /// exactly one value of the member's encoding; a sized member records
    /// their byte length or item count in its size field.
    pub fn set_raw(&mut self, name: &str, bytes: &[u8]) -> Result<&mut Self> {
        let (index, member) = self.member(name)?;
        let reader = Reader::new(self.plan, ByteBuffer::new(bytes));
        let size = match &member.encoding {
            Encoding::SizedOctets { .. } => Some(bytes.len() as i64),
            Encoding::SizedArray { item, .. } => {
                Some(reader.count_items(item, bytes.len())? as i64)
            }
            enc => {
                let end = reader.measure(enc, 0, None)?;
                if end != bytes.len() {
                    return Err(WireError::LengthMismatch {
                        offset:   0,
                        expected: bytes.len(),
                        actual:   end,
                    }
                    .into());
                }
                None
            }
        };
        self.set_member(name, index, Payload::Raw(bytes, size))?;
        Ok(self)
    }

    /// Copies the message `view` is wrapped around into a member of the
    /// same declaration.
    pub fn set_from(&mut self, name: &str, view: &Flyweight) -> Result<&mut Self> {
        let (index, member) = self.member(name)?;
        let expected = member.encoding.decl().and_then(|decl| self.plan.find(decl));
        if expected.map(DeclPlan::name) != Some(view.name()) {
            return Err(FlyweightError::mismatch(name, "a view of the member's declaration"));
        }
        self.set_member(name, index, Payload::Raw(view.as_bytes()?, None))?;
        Ok(self)
    }

    /// Writes a struct, list, union, variant, enum or map member through a
    /// nested builder handed to `build`. If `build` fails, this builder's
    /// limit and progress stay as they were.
    pub fn set_with(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut Builder<'_>) -> Result<()>,
    ) -> Result<&mut Self> {
        let (index, member) = self.member(name)?;
        let nested = member
            .encoding
            .decl()
            .ok_or_else(|| FlyweightError::mismatch(name, "a declaration"))?;
        let nested = lookup(self.plan, nested)?;

        let record = self.record();
        let (from, at) = (self.next, self.limit);
        let start = self.commit(name, |sink, starts| {
            let start = record.skip(from, index, at, sink, starts)?;
            starts.push(start);
            Ok(start)
        })?;

        let out = self.out.as_mut().ok_or(FlyweightError::NotWrapped)?;
        let mut child = Builder::for_decl(self.plan, nested);
        child.attach(out.reborrow(), start)?;
        build(&mut child)?;
        let end = child.finish()?;

        trace!("set {}.{} at {}..{}", self.decl.name(), name, start, end);
        self.limit = end;
        self.next = index + 1;
        Ok(self)
    }

    /// Writes a whole union, variant, enum or map.
    pub fn set_value<'v>(&mut self, input: impl Into<Input<'v>>) -> Result<&mut Self> {
        let input = input.into();
        let name = self.decl.name();
        if matches!(self.decl, DeclPlan::Struct(_) | DeclPlan::List(_)) {
            return Err(FlyweightError::mismatch(name, "members set by name"));
        }
        if self.out.is_none() {
            return Err(FlyweightError::NotWrapped);
        }
        if self.next > 0 {
            return Err(FlyweightError::AlreadySet(name.to_string()));
        }
        let (plan, decl, at) = (self.plan, self.decl, self.offset);
        self.limit = self.commit(name, |sink, _| encode_decl(plan, decl, name, at, &input, sink))?;
        self.next = 1;
        Ok(self)
    }

    /// Completes the message and resets progress so the same region can be
    /// written again. Returns the message's limit.
    fn finish(&mut self) -> Result<usize> {
        if self.out.is_none() {
            return Err(FlyweightError::NotWrapped);
        }
        let decl = self.decl;
        let name = decl.name();
        let end = match decl {
            DeclPlan::Struct(plan) => {
                let record = self.record();
                let (from, at, to) = (self.next, self.limit, plan.members.len());
                self.commit(name, |sink, starts| record.skip(from, to, at, sink, starts))?
            }
            DeclPlan::List(plan) => {
                if let Some(member) = plan.members[self.next..].iter().find(|m| m.required) {
                    return Err(FlyweightError::RequiredFieldNotSet(member.name.clone()));
                }
                let (offset, limit, count) = (self.offset, self.limit, self.next);
                let width = plan.length.fixed_width().unwrap_or(0);
                self.commit(name, |sink, _| {
                    let len = (limit - offset - width) as i128;
                    let at = sink.integer(&plan.length, name, offset, len)?;
                    sink.integer(&plan.field_count, name, at, count as i128)?;
                    Ok(limit)
                })?
            }
            _ if self.next == 0 => {
                return Err(FlyweightError::RequiredFieldNotSet(name.to_string()))
            }
            _ => self.limit,
        };
        debug!("built {} at {}..{}", name, self.offset, end);
        self.next = 0;
        self.limit = self.body;
        self.starts.clear();
        Ok(end)
    }

    /// Writes trailing defaults, checks required members and returns a view
    /// of the finished message. The builder is left wrapped with nothing set.
    pub fn build(&mut self) -> Result<Flyweight<'_>> {
        let end = self.finish()?;
        let out = self.out.as_ref().ok_or(FlyweightError::NotWrapped)?;
        let mut view = Flyweight::for_decl(self.plan, self.decl);
        view.wrap(out.data(), self.offset, end)?;
        Ok(view)
    }
}
