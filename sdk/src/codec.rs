//! Interprets plan encodings against wire bytes. [`Reader`] measures and
//! decodes; [`encode`] sizes or writes a value through a [`Sink`].

use brine_wire_compiler::{
    ast::DefaultValue, CasePlan, DeclPlan, Encoding, EnumPlan, MapPlan, MemberPlan, Plan,
    SwitchPlan,
};
use brine_wire_schema::{
    fits_signed, fits_unsigned, max_length, var_int_len, ByteBuffer, ByteBufferMut, ByteOrder,
    WireError,
};

use crate::error::FlyweightError;
use crate::value::{Input, Value};

pub(crate) type Result<T> = std::result::Result<T, FlyweightError>;

const UNKNOWN: &str = "unknown";

pub(crate) fn lookup<'a>(plan: &'a Plan, name: &str) -> Result<&'a DeclPlan> {
    plan.find(name)
        .ok_or_else(|| FlyweightError::UnknownDeclaration(name.to_string()))
}

fn switch_plan(decl: &DeclPlan) -> Result<&SwitchPlan> {
    match decl {
        DeclPlan::Union(plan) | DeclPlan::Variant(plan) => Ok(plan),
        _ => Err(FlyweightError::mismatch(decl.name(), "a union or variant")),
    }
}

fn enum_plan(decl: &DeclPlan) -> Result<&EnumPlan> {
    match decl {
        DeclPlan::Enum(plan) => Ok(plan),
        _ => Err(FlyweightError::mismatch(decl.name(), "an enum")),
    }
}

/// Item or byte count carried by a size field; negative means null.
fn count(size: Option<i64>) -> Option<usize> {
    match size {
        Some(size) if size < 0 => None,
        Some(size) => Some(size as usize),
        None => Some(0),
    }
}

/// Result of walking the members of a struct or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Walk {
    /// Members actually on the wire; lists may carry fewer than declared.
    pub present: usize,
    pub limit:   usize,
}

#[derive(Clone, Copy)]
pub(crate) struct Reader<'a> {
    pub plan: &'a Plan,
    pub bb:   ByteBuffer<'a>,
}

impl<'a> Reader<'a> {
    pub fn new(plan: &'a Plan, bb: ByteBuffer<'a>) -> Reader<'a> {
        Reader { plan, bb }
    }

    /// Reads a framing prefix, discriminator or size field. Returns the
    /// value and the offset past it.
    pub fn integer(&self, enc: &Encoding, offset: usize) -> Result<(i64, usize)> {
        match *enc {
            Encoding::Int {
                bits,
                signed: true,
                order,
            } => Ok((self.bb.read_int(offset, bits, order)?, offset + bits as usize / 8)),
            Encoding::Int {
                bits,
                signed: false,
                order,
            } => Ok((self.bb.read_uint(offset, bits, order)? as i64, offset + bits as usize / 8)),
            Encoding::Varint { bits } => {
                let (value, len) = self.bb.read_var_int(offset, bits)?;
                Ok((value, offset + len))
            }
            _ => Err(FlyweightError::mismatch("framing", "an integer encoding")),
        }
    }

    fn length(&self, enc: &Encoding, offset: usize) -> Result<(usize, usize)> {
        let (value, next) = self.integer(enc, offset)?;
        let len = usize::try_from(value)
            .map_err(|_| WireError::NegativeLength { offset, length: value })?;
        Ok((len, next))
    }

    /// Reads a discriminator and finds its case. Unknown tags fail.
    pub fn case(&self, plan: &'a SwitchPlan, offset: usize) -> Result<(&'a CasePlan, usize)> {
        let (tag, payload) = self.integer(&plan.kind, offset)?;
        match plan.case(tag) {
            Some(case) => Ok((case, payload)),
            None => Err(WireError::UnknownKind { offset, kind: tag }.into()),
        }
    }

    /// Limit just past the value at `offset`. `size` is the value of the
    /// member's size field, if it has one.
    pub fn measure(&self, enc: &'a Encoding, offset: usize, size: Option<i64>) -> Result<usize> {
        Ok(match enc {
            Encoding::Int { bits, .. } => self.bb.check(offset, *bits as usize / 8)?,
            Encoding::Varint { bits } => offset + self.bb.read_var_uint(offset, *bits)?.1,
            Encoding::String { prefix_bits, order }
            | Encoding::PrefixedOctets { prefix_bits, order } => {
                self.bb.read_octets(offset, *prefix_bits, *order)?.1
            }
            Encoding::FixedOctets { length } => self.bb.check(offset, *length)?,
            Encoding::SizedOctets { .. } => match count(size) {
                None => offset,
                Some(len) => self.bb.check(offset, len)?,
            },
            Encoding::FixedArray { .. } | Encoding::SizedArray { .. } | Encoding::Array { .. } => {
                self.items(enc, offset, size, |item, at| self.measure(item, at, None))?.1
            }
            Encoding::Struct { decl }
            | Encoding::List { decl }
            | Encoding::Union { decl }
            | Encoding::Variant { decl }
            | Encoding::Enum { decl }
            | Encoding::Map { decl } => self.measure_decl(lookup(self.plan, decl)?, offset)?,
        })
    }

    pub fn measure_decl(&self, decl: &'a DeclPlan, offset: usize) -> Result<usize> {
        match decl {
            DeclPlan::Struct(_) | DeclPlan::List(_) => {
                Ok(self.walk(decl, offset, &mut Vec::new())?.limit)
            }
            DeclPlan::Union(plan) | DeclPlan::Variant(plan) => {
                let (case, payload) = self.case(plan, offset)?;
                match &case.encoding {
                    None => Ok(payload),
                    Some(enc) => self.measure(enc, payload, None),
                }
            }
            DeclPlan::Enum(plan) => self.measure(&plan.backing, offset, None),
            DeclPlan::Map(plan) => {
                self.entries(plan, offset, |enc, at| self.measure(enc, at, None))
            }
        }
    }

    /// Visits the items of an array encoding in order. `visit` returns the
    /// limit of the item it was handed. Returns whether the array is present
    /// and its limit.
    pub fn items(
        &self,
        enc: &'a Encoding,
        offset: usize,
        size: Option<i64>,
        mut visit: impl FnMut(&'a Encoding, usize) -> Result<usize>,
    ) -> Result<(bool, usize)> {
        match enc {
            Encoding::FixedArray { length, item } => {
                let mut at = offset;
                for _ in 0..*length {
                    at = visit(&**item, at)?;
                }
                Ok((true, at))
            }
            Encoding::SizedArray { item, .. } => match count(size) {
                None => Ok((false, offset)),
                Some(items) => {
                    let mut at = offset;
                    for _ in 0..items {
                        at = visit(&**item, at)?;
                    }
                    Ok((true, at))
                }
            },
            Encoding::Array {
                length_bits,
                order,
                item,
            } => {
                let len = self.bb.read_length(offset, *length_bits, *order)?;
                let start = offset + *length_bits as usize / 8;
                let Some(len) = len else {
                    return Ok((false, start));
                };
                let end = self.bb.check(start, len)?;
                let mut at = start;
                while at < end {
                    let next = visit(&**item, at)?;
                    if next == at {
                        break;
                    }
                    at = next;
                }
                if at != end {
                    return Err(WireError::LengthMismatch {
                        offset,
                        expected: len,
                        actual: at - start,
                    }
                    .into());
                }
                Ok((true, end))
            }
            _ => Err(FlyweightError::mismatch("items", "an array encoding")),
        }
    }

    /// Number of `item`s packed into exactly `len` bytes from offset 0.
    pub fn count_items(&self, item: &'a Encoding, len: usize) -> Result<usize> {
        let mut at = 0;
        let mut items = 0;
        while at < len {
            let next = self.measure(item, at, None)?;
            if next == at {
                break;
            }
            at = next;
            items += 1;
        }
        if at != len {
            return Err(WireError::LengthMismatch {
                offset:   0,
                expected: len,
                actual:   at,
            }
            .into());
        }
        Ok(items)
    }

    /// Visits keys and values of a map alternately. Returns the map's limit.
    fn entries(
        &self,
        plan: &'a MapPlan,
        offset: usize,
        mut visit: impl FnMut(&'a Encoding, usize) -> Result<usize>,
    ) -> Result<usize> {
        let (len, after_len) = self.length(&plan.length, offset)?;
        let (fields, mut at) = self.length(&plan.length, after_len)?;
        let end = self.bb.check(after_len, len)?;
        if fields % 2 != 0 {
            return Err(WireError::LengthMismatch {
                offset:   after_len,
                expected: fields + 1,
                actual:   fields,
            }
            .into());
        }
        for index in 0..fields {
            let enc = if index % 2 == 0 { &plan.key } else { &plan.value };
            at = visit(enc, at)?;
        }
        if at != end {
            return Err(WireError::LengthMismatch {
                offset,
                expected: len,
                actual: at - after_len,
            }
            .into());
        }
        Ok(end)
    }

    /// Resolves the range of every member of a struct or list at `base`
    /// into `ranges`. Absent list members get an empty range.
    pub fn walk(
        &self,
        decl: &'a DeclPlan,
        base: usize,
        ranges: &mut Vec<(usize, usize)>,
    ) -> Result<Walk> {
        ranges.clear();
        let (members, body, frame) = match decl {
            DeclPlan::Struct(plan) => (&plan.members[..], base, None),
            DeclPlan::List(plan) => {
                let (len, after_len) = self.length(&plan.length, base)?;
                let (fields, body) = self.length(&plan.field_count, after_len)?;
                let end = self.bb.check(after_len, len)?;
                (&plan.members[..], body, Some((fields, after_len, len, end)))
            }
            _ => return Err(FlyweightError::mismatch(decl.name(), "a struct or list")),
        };

        let present = frame.map_or(members.len(), |(fields, ..)| fields.min(members.len()));
        let mut cursor = body;
        for (index, member) in members.iter().enumerate() {
            if index >= present {
                ranges.push((cursor, cursor));
                continue;
            }
            let start = member
                .placement
                .offset(body, |anchor| Ok::<_, FlyweightError>(ranges[anchor].1))?;
            let size = self.size_value(members, member, ranges)?;
            let limit = self.measure(&member.encoding, start, size)?;
            ranges.push((start, limit));
            cursor = limit;
        }

        let limit = match (decl, frame) {
            (DeclPlan::Struct(plan), _) => {
                plan.end.offset(body, |anchor| Ok::<_, FlyweightError>(ranges[anchor].1))?
            }
            (_, Some((_, after_len, len, end))) => {
                if cursor > end {
                    return Err(WireError::LengthMismatch {
                        offset:   base,
                        expected: len,
                        actual:   cursor - after_len,
                    }
                    .into());
                }
                end
            }
            _ => cursor,
        };
        Ok(Walk { present, limit })
    }

    /// Value of the size field that sizes `member`, read from its range.
    pub fn size_value(
        &self,
        members: &[MemberPlan],
        member: &MemberPlan,
        ranges: &[(usize, usize)],
    ) -> Result<Option<i64>> {
        match member.size_field {
            None => Ok(None),
            Some(field) => Ok(Some(self.integer(&members[field].encoding, ranges[field].0)?.0)),
        }
    }

    /// Decoded value of member `index` after a walk. Absent list members
    /// read as their default.
    pub fn member(
        &self,
        members: &'a [MemberPlan],
        index: usize,
        ranges: &[(usize, usize)],
        present: usize,
    ) -> Result<Value<'a>> {
        let member = &members[index];
        if index >= present {
            return self.literal(&member.encoding, &member.default);
        }
        let size = self.size_value(members, member, ranges)?;
        Ok(self.read(&member.encoding, ranges[index].0, size)?.0)
    }

    /// A declared default as it would read back from the wire.
    pub fn literal(&self, enc: &'a Encoding, default: &'a DefaultValue) -> Result<Value<'a>> {
        Ok(match (default, enc) {
            (DefaultValue::Int(_) | DefaultValue::Text(_), Encoding::Variant { decl }) => {
                let plan = switch_plan(lookup(self.plan, decl)?)?;
                let input = match default {
                    DefaultValue::Int(value) => Input::Int(*value),
                    DefaultValue::Text(text) => Input::Str(text),
                    _ => Input::Null,
                };
                let (case, _) = select_case(self.plan, plan, decl, &input)?;
                let payload = match &case.encoding {
                    Some(enc) => self.literal(enc, default)?,
                    None => Value::Null,
                };
                Value::Case(&plan.name, case.tag, Box::new(payload))
            }
            (DefaultValue::Int(value), Encoding::Enum { decl }) => {
                let plan = enum_plan(lookup(self.plan, decl)?)?;
                Value::Enum(&plan.name, plan.symbol(*value).unwrap_or(UNKNOWN))
            }
            (DefaultValue::Int(value), Encoding::Int { signed: false, .. }) => {
                Value::Uint(*value as u64)
            }
            (DefaultValue::Int(value), _) => Value::Int(*value),
            (DefaultValue::Text(text), _) => Value::String(text),
            _ => Value::Null,
        })
    }

    fn symbol(&self, plan: &'a EnumPlan, backing: &Value<'a>) -> Value<'a> {
        let symbol = backing.as_int().and_then(|ordinal| plan.symbol(ordinal));
        Value::Enum(&plan.name, symbol.unwrap_or(UNKNOWN))
    }

    /// Decodes the value at `offset`. Returns it with its limit.
    pub fn read(
        &self,
        enc: &'a Encoding,
        offset: usize,
        size: Option<i64>,
    ) -> Result<(Value<'a>, usize)> {
        let width = |bits: u8| offset + bits as usize / 8;
        Ok(match enc {
            Encoding::Int {
                bits,
                signed: true,
                order,
            } => (Value::Int(self.bb.read_int(offset, *bits, *order)?), width(*bits)),
            Encoding::Int {
                bits,
                signed: false,
                order,
            } => (Value::Uint(self.bb.read_uint(offset, *bits, *order)?), width(*bits)),
            Encoding::Varint { bits } => {
                let (value, len) = self.bb.read_var_int(offset, *bits)?;
                (Value::Int(value), offset + len)
            }
            Encoding::String { prefix_bits, order } => {
                let (text, limit) = self.bb.read_string(offset, *prefix_bits, *order)?;
                (text.map_or(Value::Null, Value::String), limit)
            }
            Encoding::PrefixedOctets { prefix_bits, order } => {
                let (bytes, limit) = self.bb.read_octets(offset, *prefix_bits, *order)?;
                (bytes.map_or(Value::Null, Value::Octets), limit)
            }
            Encoding::FixedOctets { length } => {
                (Value::Octets(self.bb.read_bytes(offset, *length)?), offset + length)
            }
            Encoding::SizedOctets { .. } => match count(size) {
                None => (Value::Null, offset),
                Some(len) => (Value::Octets(self.bb.read_bytes(offset, len)?), offset + len),
            },
            Encoding::FixedArray { .. } | Encoding::SizedArray { .. } | Encoding::Array { .. } => {
                let mut values = Vec::new();
                let (present, limit) = self.items(enc, offset, size, |item, at| {
                    let (value, end) = self.read(item, at, None)?;
                    values.push(value);
                    Ok(end)
                })?;
                (if present { Value::Array(values) } else { Value::Null }, limit)
            }
            Encoding::Struct { decl }
            | Encoding::List { decl }
            | Encoding::Union { decl }
            | Encoding::Variant { decl }
            | Encoding::Enum { decl }
            | Encoding::Map { decl } => self.read_decl(lookup(self.plan, decl)?, offset)?,
        })
    }

    pub fn read_decl(&self, decl: &'a DeclPlan, offset: usize) -> Result<(Value<'a>, usize)> {
        match decl {
            DeclPlan::Struct(_) | DeclPlan::List(_) => {
                let mut ranges = Vec::new();
                let walk = self.walk(decl, offset, &mut ranges)?;
                let members = decl.members();
                let mut fields = Vec::with_capacity(members.len());
                for (index, member) in members.iter().enumerate() {
                    let value = self.member(members, index, &ranges, walk.present)?;
                    fields.push((member.name.as_str(), value));
                }
                Ok((Value::Object(decl.name(), fields), walk.limit))
            }
            DeclPlan::Union(plan) | DeclPlan::Variant(plan) => {
                let (case, payload) = self.case(plan, offset)?;
                let (value, limit) = match &case.encoding {
                    None => (Value::Null, payload),
                    Some(enc) => self.read(enc, payload, None)?,
                };
                Ok((Value::Case(&plan.name, case.tag, Box::new(value)), limit))
            }
            DeclPlan::Enum(plan) => {
                let (backing, limit) = self.read(&plan.backing, offset, None)?;
                Ok((self.symbol(plan, &backing), limit))
            }
            DeclPlan::Map(plan) => {
                let mut entries = Vec::new();
                let mut key = None;
                let limit = self.entries(plan, offset, |enc, at| {
                    let (value, end) = self.read(enc, at, None)?;
                    match key.take() {
                        None => key = Some(value),
                        Some(k) => entries.push((k, value)),
                    }
                    Ok(end)
                })?;
                Ok((Value::Map(&plan.name, entries), limit))
            }
        }
    }
}

/// Where [`encode`] puts bytes. `Measure` validates and sizes a value
/// without touching memory.
pub(crate) enum Sink<'s, 'b> {
    Measure,
    Write(&'s mut ByteBufferMut<'b>),
}

/// `offset + need`, failing instead of wrapping around the address space.
pub(crate) fn advance(offset: usize, need: usize) -> Result<usize> {
    offset.checked_add(need).ok_or_else(|| {
        WireError::OutOfBounds {
            offset,
            need,
            max_limit: usize::MAX,
        }
        .into()
    })
}

impl Sink<'_, '_> {
    pub fn integer(
        &mut self,
        enc: &Encoding,
        field: &str,
        offset: usize,
        value: i128,
    ) -> Result<usize> {
        match *enc {
            Encoding::Int { bits, signed, order } => {
                let fits = if signed {
                    fits_signed(value, bits)
                } else {
                    fits_unsigned(value, bits)
                };
                if !fits {
                    return Err(WireError::ExceedsBits { offset, bits, value }.into());
                }
                match self {
                    Sink::Measure => advance(offset, bits as usize / 8),
                    Sink::Write(out) if signed => {
                        Ok(out.write_int(offset, bits, order, value as i64)?)
                    }
                    Sink::Write(out) => Ok(out.write_uint(offset, bits, order, value as u64)?),
                }
            }
            Encoding::Varint { bits } => {
                if !fits_signed(value, bits) {
                    return Err(WireError::ExceedsBits { offset, bits, value }.into());
                }
                match self {
                    Sink::Measure => advance(offset, var_int_len(value as i64)),
                    Sink::Write(out) => Ok(out.write_var_int(offset, bits, value as i64)?),
                }
            }
            _ => Err(FlyweightError::mismatch(field, "an integer encoding")),
        }
    }

    fn prefix(
        &mut self,
        bits: u8,
        order: ByteOrder,
        offset: usize,
        len: Option<usize>,
    ) -> Result<usize> {
        if let Some(len) = len {
            if len > max_length(bits) {
                return Err(WireError::ExceedsBits {
                    offset,
                    bits,
                    value: len as i128,
                }
                .into());
            }
        }
        match self {
            Sink::Measure => advance(offset, bits as usize / 8),
            Sink::Write(out) => Ok(out.write_length(offset, bits, order, len)?),
        }
    }

    /// A length prefix followed by the payload; `None` is null.
    fn octets(
        &mut self,
        bits: u8,
        order: ByteOrder,
        offset: usize,
        bytes: Option<&[u8]>,
    ) -> Result<usize> {
        match self {
            Sink::Measure => {
                let start = self.prefix(bits, order, offset, bytes.map(<[u8]>::len))?;
                advance(start, bytes.map_or(0, <[u8]>::len))
            }
            Sink::Write(out) => Ok(out.write_octets(offset, bits, order, bytes)?),
        }
    }

    fn string(
        &mut self,
        bits: u8,
        order: ByteOrder,
        offset: usize,
        text: Option<&str>,
    ) -> Result<usize> {
        match self {
            Sink::Measure => self.octets(bits, order, offset, text.map(str::as_bytes)),
            Sink::Write(out) => Ok(out.write_string(offset, bits, order, text)?),
        }
    }

    pub fn bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<usize> {
        match self {
            Sink::Measure => advance(offset, bytes.len()),
            Sink::Write(out) => Ok(out.write_bytes(offset, bytes)?),
        }
    }

    fn zeros(&mut self, offset: usize, len: usize) -> Result<usize> {
        match self {
            Sink::Measure => advance(offset, len),
            Sink::Write(out) => Ok(out.fill(offset, len, 0)?),
        }
    }
}

fn int_input(field: &str, input: &Input) -> Result<i128> {
    match *input {
        Input::Int(value) => Ok(value as i128),
        Input::Uint(value) => Ok(value as i128),
        _ => Err(FlyweightError::mismatch(field, "an integer")),
    }
}

fn octets_input<'i>(field: &str, input: &'i Input) -> Result<Option<&'i [u8]>> {
    match *input {
        Input::Null => Ok(None),
        Input::Bytes(bytes) => Ok(Some(bytes)),
        Input::Str(text) => Ok(Some(text.as_bytes())),
        _ => Err(FlyweightError::mismatch(field, "octets")),
    }
}

fn items_input<'i, 'v>(field: &str, input: &'i Input<'v>) -> Result<Option<&'i [Input<'v>]>> {
    match input {
        Input::Null => Ok(None),
        Input::Items(items) => Ok(Some(items)),
        _ => Err(FlyweightError::mismatch(field, "array items")),
    }
}

/// Value written to the size field of `dependent`: the byte or item count,
/// or -1 for null.
pub(crate) fn size_of_input(dependent: &MemberPlan, input: Option<&Input>) -> Result<i64> {
    match input {
        Some(Input::Items(items)) => Ok(items.len() as i64),
        Some(Input::Bytes(bytes)) => Ok(bytes.len() as i64),
        Some(Input::Str(text)) => Ok(text.len() as i64),
        Some(Input::Null) => Ok(-1),
        Some(_) => Err(FlyweightError::mismatch(&dependent.name, "octets or array items")),
        None => match dependent.default {
            DefaultValue::Null => Ok(-1),
            _ => Err(FlyweightError::RequiredFieldNotSet(dependent.name.clone())),
        },
    }
}

/// What a member that was never set is written as: its default, zeros for
/// fixed octets, or the missing-field case of a variant inside a list.
pub(crate) fn fill_input<'p>(
    plan: &'p Plan,
    member: &'p MemberPlan,
    in_list: bool,
) -> Result<Option<Input<'p>>> {
    Ok(match &member.default {
        DefaultValue::Int(value) => Some(Input::Int(*value)),
        DefaultValue::Text(text) => Some(Input::Str(text)),
        DefaultValue::Null => Some(Input::Null),
        _ if matches!(member.encoding, Encoding::FixedOctets { .. }) => Some(Input::Null),
        _ if in_list => match &member.encoding {
            Encoding::Variant { decl } => {
                let missing = switch_plan(lookup(plan, decl)?)?.missing;
                missing.map(|_| Input::Null)
            }
            _ => None,
        },
        _ => None,
    })
}

/// Encodes `input` as `enc` at `offset` and returns the limit past it.
/// `field` names the member in errors.
pub(crate) fn encode(
    plan: &Plan,
    enc: &Encoding,
    field: &str,
    offset: usize,
    input: &Input,
    sink: &mut Sink<'_, '_>,
) -> Result<usize> {
    match enc {
        Encoding::Int { .. } | Encoding::Varint { .. } => {
            sink.integer(enc, field, offset, int_input(field, input)?)
        }
        Encoding::String { prefix_bits, order } => {
            let text = match *input {
                Input::Null => None,
                Input::Str(text) => Some(text),
                _ => return Err(FlyweightError::mismatch(field, "a string")),
            };
            sink.string(*prefix_bits, *order, offset, text)
        }
        Encoding::PrefixedOctets { prefix_bits, order } => {
            sink.octets(*prefix_bits, *order, offset, octets_input(field, input)?)
        }
        Encoding::FixedOctets { length } => match octets_input(field, input)? {
            Some(bytes) if bytes.len() == *length => sink.bytes(offset, bytes),
            Some(bytes) => Err(WireError::LengthMismatch {
                offset,
                expected: *length,
                actual: bytes.len(),
            }
            .into()),
            // Fixed octets are never null; null writes them as zeros.
            None => sink.zeros(offset, *length),
        },
        Encoding::SizedOctets { .. } => match octets_input(field, input)? {
            None => Ok(offset),
            Some(bytes) => sink.bytes(offset, bytes),
        },
        Encoding::FixedArray { length, item } => {
            let items = items_input(field, input)?
                .ok_or_else(|| FlyweightError::mismatch(field, "array items"))?;
            if items.len() != *length {
                return Err(WireError::LengthMismatch {
                    offset,
                    expected: *length,
                    actual: items.len(),
                }
                .into());
            }
            encode_items(plan, item, field, offset, items, sink)
        }
        Encoding::SizedArray { item, .. } => match items_input(field, input)? {
            None => Ok(offset),
            Some(items) => encode_items(plan, item, field, offset, items, sink),
        },
        Encoding::Array {
            length_bits,
            order,
            item,
        } => {
            let items = items_input(field, input)?;
            let start = advance(offset, *length_bits as usize / 8)?;
            let len = match items {
                None => None,
                Some(items) => {
                    let end = encode_items(plan, item, field, start, items, &mut Sink::Measure)?;
                    Some(end - start)
                }
            };
            let start = sink.prefix(*length_bits, *order, offset, len)?;
            match items {
                None => Ok(start),
                Some(items) => encode_items(plan, item, field, start, items, sink),
            }
        }
        Encoding::Struct { decl }
        | Encoding::List { decl }
        | Encoding::Union { decl }
        | Encoding::Variant { decl }
        | Encoding::Enum { decl }
        | Encoding::Map { decl } => {
            encode_decl(plan, lookup(plan, decl)?, field, offset, input, sink)
        }
    }
}

fn encode_items(
    plan: &Plan,
    item: &Encoding,
    field: &str,
    offset: usize,
    items: &[Input],
    sink: &mut Sink<'_, '_>,
) -> Result<usize> {
    items
        .iter()
        .try_fold(offset, |at, input| encode(plan, item, field, at, input, sink))
}

/// Encodes a whole declaration.
pub(crate) fn encode_decl(
    plan: &Plan,
    decl: &DeclPlan,
    field: &str,
    offset: usize,
    input: &Input,
    sink: &mut Sink<'_, '_>,
) -> Result<usize> {
    match decl {
        DeclPlan::Struct(_) | DeclPlan::List(_) => match input {
            Input::Fields(fields) => encode_record(plan, decl, offset, fields, sink),
            _ => Err(FlyweightError::mismatch(field, "fields")),
        },
        DeclPlan::Union(switch) | DeclPlan::Variant(switch) => {
            let (case, payload) = select_case(plan, switch, field, input)?;
            encode_case(plan, switch, case, field, offset, payload, sink)
        }
        DeclPlan::Enum(enum_plan) => {
            let ordinal = match *input {
                Input::Symbol(symbol) | Input::Str(symbol) => enum_plan
                    .ordinal(symbol)
                    .ok_or_else(|| FlyweightError::unknown_case(&enum_plan.name, field))?,
                ref other => i64::try_from(int_input(field, other)?)
                    .map_err(|_| FlyweightError::mismatch(field, "an enum ordinal"))?,
            };
            encode(plan, &enum_plan.backing, field, offset, &Input::Int(ordinal), sink)
        }
        DeclPlan::Map(map) => {
            let Input::Entries(entries) = input else {
                return Err(FlyweightError::mismatch(field, "map entries"));
            };
            let width = map.length.fixed_width().unwrap_or(0);
            let body = advance(offset, 2 * width)?;
            let end = encode_entries(plan, map, field, body, entries, &mut Sink::Measure)?;
            let at = sink.integer(&map.length, field, offset, (end - offset - width) as i128)?;
            let at = sink.integer(&map.length, field, at, 2 * entries.len() as i128)?;
            encode_entries(plan, map, field, at, entries, sink)
        }
    }
}

fn encode_entries(
    plan: &Plan,
    map: &MapPlan,
    field: &str,
    offset: usize,
    entries: &[(Input, Input)],
    sink: &mut Sink<'_, '_>,
) -> Result<usize> {
    let mut at = offset;
    for (key, value) in entries {
        at = encode(plan, &map.key, field, at, key, sink)?;
        at = encode(plan, &map.value, field, at, value, sink)?;
    }
    Ok(at)
}

/// Picks the case `input` is written as: an explicit tag, a union member
/// name, null for the missing-field case, or else the first case in
/// declaration order that accepts the value.
pub(crate) fn select_case<'p, 'i, 'v>(
    plan: &Plan,
    switch: &'p SwitchPlan,
    field: &str,
    input: &'i Input<'v>,
) -> Result<(&'p CasePlan, &'i Input<'v>)> {
    let unknown = || FlyweightError::unknown_case(&switch.name, field);
    match input {
        Input::Case(tag, payload) => {
            let case = switch.case(*tag).ok_or_else(unknown)?;
            if case.encoding.is_none() && !payload.is_null() {
                return Err(FlyweightError::mismatch(
                    field,
                    "no payload for the missing-field case",
                ));
            }
            Ok((case, &**payload))
        }
        Input::Fields(fields) if switch.cases.iter().any(|c| c.name.is_some()) => {
            match fields.as_slice() {
                [(name, payload)] => Ok((switch.case_named(name).ok_or_else(unknown)?, payload)),
                _ => Err(FlyweightError::mismatch(field, "exactly one union member")),
            }
        }
        Input::Null => {
            let case = switch.missing.and_then(|tag| switch.case(tag)).ok_or_else(unknown)?;
            Ok((case, input))
        }
        _ => switch
            .cases
            .iter()
            .find(|case| match &case.encoding {
                Some(enc) => encode(plan, enc, field, 0, input, &mut Sink::Measure).is_ok(),
                None => false,
            })
            .map(|case| (case, input))
            .ok_or_else(unknown),
    }
}

pub(crate) fn encode_case(
    plan: &Plan,
    switch: &SwitchPlan,
    case: &CasePlan,
    field: &str,
    offset: usize,
    payload: &Input,
    sink: &mut Sink<'_, '_>,
) -> Result<usize> {
    let at = sink.integer(&switch.kind, field, offset, case.tag as i128)?;
    match &case.encoding {
        None => Ok(at),
        Some(enc) => encode(plan, enc, field, at, payload, sink),
    }
}

/// Encodes a struct or list from named fields in one pass. Size fields are
/// derived from their dependents and skipped members take their default.
/// A list carries every member up to the last one given.
pub(crate) fn encode_record(
    plan: &Plan,
    decl: &DeclPlan,
    offset: usize,
    fields: &[(&str, Input)],
    sink: &mut Sink<'_, '_>,
) -> Result<usize> {
    let members = decl.members();
    for (field, _) in fields {
        match members.iter().find(|m| m.name == *field) {
            None => {
                return Err(FlyweightError::UnknownField {
                    decl:  decl.name().to_string(),
                    field: field.to_string(),
                })
            }
            Some(member) if member.used_as_size => {
                return Err(FlyweightError::SizeField(field.to_string()))
            }
            _ => {}
        }
    }
    let provided = |member: &MemberPlan| {
        fields.iter().find(|(f, _)| *f == member.name).map(|(_, v)| v)
    };

    let (body, count) = match decl {
        DeclPlan::List(list) => {
            let count = members
                .iter()
                .rposition(|m| provided(m).is_some())
                .map_or(0, |index| index + 1);
            if let Some(member) = members[count..].iter().find(|m| m.required) {
                return Err(FlyweightError::RequiredFieldNotSet(member.name.clone()));
            }
            (advance(offset, list.header_size())?, count)
        }
        _ => (offset, members.len()),
    };
    let in_list = matches!(decl, DeclPlan::List(_));

    let mut at = body;
    for member in &members[..count] {
        let owned;
        let input = if let Some(dependent) = member.size_of {
            let dependent_member = &members[dependent];
            owned = Input::Int(if dependent < count {
                size_of_input(dependent_member, provided(dependent_member))?
            } else {
                0
            });
            &owned
        } else if let Some(value) = provided(member) {
            value
        } else {
            owned = fill_input(plan, member, in_list)?
                .ok_or_else(|| FlyweightError::RequiredFieldNotSet(member.name.clone()))?;
            &owned
        };
        at = encode(plan, &member.encoding, &member.name, at, input, sink)?;
    }

    if let DeclPlan::List(list) = decl {
        let width = list.length.fixed_width().unwrap_or(0);
        let len = (at - offset - width) as i128;
        let after_len = sink.integer(&list.length, decl.name(), offset, len)?;
        sink.integer(&list.field_count, decl.name(), after_len, count as i128)?;
    }
    Ok(at)
}
