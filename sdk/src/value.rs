use std::fmt;
use std::ops::Index;

/// This type holds decoded wire data.
///
/// Declaration, field and enum names borrow from the [`Plan`] and strings and
/// octets borrow from the wrapped buffer, so a Value never copies payload
/// bytes but can't outlive either of them.
///
/// [`Plan`]: brine_wire_compiler::Plan
#[derive(Clone, PartialEq)]
pub enum Value<'a> {
    /// An absent value: null strings and octets, the missing-field case of
    /// a variant, or a list member past the field count.
    Null,
    Int(i64),
    Uint(u64),
    String(&'a str),
    Octets(&'a [u8]),
    /// Declaration name and symbol; `"unknown"` for unrecognised ordinals.
    Enum(&'a str, &'a str),
    Array(Vec<Value<'a>>),
    /// Struct or list: declaration name and members in declaration order.
    Object(&'a str, Vec<(&'a str, Value<'a>)>),
    /// Union or variant: declaration name, discriminator and payload.
    Case(&'a str, i64, Box<Value<'a>>),
    /// A top-level union or variant whose discriminator is not recognised.
    Unknown(&'a str, i64),
    Map(&'a str, Vec<(Value<'a>, Value<'a>)>),
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A convenience method to extract an integer. Case payloads are looked
    /// through. Returns `None` for other value kinds or unsigned values that
    /// do not fit.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(value) => Some(value),
            Value::Uint(value) => i64::try_from(value).ok(),
            Value::Case(_, _, ref value) => value.as_int(),
            _ => None,
        }
    }

    /// Like [as_int](#method.as_int) for unsigned values.
    pub fn as_uint(&self) -> Option<u64> {
        match *self {
            Value::Uint(value) => Some(value),
            Value::Int(value) => u64::try_from(value).ok(),
            Value::Case(_, _, ref value) => value.as_uint(),
            _ => None,
        }
    }

    /// A convenience method to extract the text of a [String](#variant.String)
    /// or the symbol of an [Enum](#variant.Enum).
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Value::String(value) => Some(value),
            Value::Enum(_, symbol) => Some(symbol),
            Value::Case(_, _, ref value) => value.as_str(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Value::Octets(value) => Some(value),
            Value::String(value) => Some(value.as_bytes()),
            _ => None,
        }
    }

    /// Returns an empty slice for other value kinds.
    pub fn as_array(&self) -> &[Value<'a>] {
        match *self {
            Value::Array(ref values) => values.as_slice(),
            _ => &[],
        }
    }

    /// Returns `("", "")` for other value kinds.
    pub fn as_enum(&self) -> (&'a str, &'a str) {
        match *self {
            Value::Enum(name, symbol) => (name, symbol),
            _ => ("", ""),
        }
    }

    /// Number of array items, object members or map entries.
    pub fn len(&self) -> usize {
        match *self {
            Value::Array(ref values) => values.len(),
            Value::Object(_, ref fields) => fields.len(),
            Value::Map(_, ref entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A convenience method to extract a member out of an [Object](#variant.Object).
    /// Returns `None` for other value kinds or if the member doesn't exist.
    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        match *self {
            Value::Object(_, ref fields) => fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl<'a> Index<usize> for Value<'a> {
    type Output = Value<'a>;

    /// A convenience method that adds support for `self[index]` expressions.
    /// It will panic if this value isn't an [Array](#variant.Array) or if the
    /// provided index is out of bounds.
    fn index(&self, index: usize) -> &Value<'a> {
        match *self {
            Value::Array(ref values) => &values[index],
            _ => panic!("value is not an array"),
        }
    }
}

impl<'a> fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Value::Null => write!(f, "null"),
            Value::Int(value) => value.fmt(f),
            Value::Uint(value) => value.fmt(f),
            Value::String(value) => value.fmt(f),
            Value::Octets(value) => {
                write!(f, "0x")?;
                for byte in value {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Enum(name, symbol) => write!(f, "{}::{}", name, symbol),
            Value::Array(ref values) => values.fmt(f),
            Value::Object(name, ref fields) => {
                write!(f, "{} {{", name)?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {:?}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Case(name, tag, ref value) => write!(f, "{}({}: {:?})", name, tag, value),
            Value::Unknown(..) => write!(f, "unknown"),
            Value::Map(name, ref entries) => {
                write!(f, "{} {{", name)?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?} => {:?}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A value to be written by a [`Builder`](crate::Builder) or [`encode`](crate::encode).
#[derive(Debug, Clone, PartialEq)]
pub enum Input<'v> {
    Null,
    Int(i64),
    Uint(u64),
    Str(&'v str),
    Bytes(&'v [u8]),
    /// An enum value by name.
    Symbol(&'v str),
    /// Array items.
    Items(Vec<Input<'v>>),
    /// An explicit union or variant case.
    Case(i64, Box<Input<'v>>),
    /// Struct or list members by name; a union takes one entry naming its case.
    Fields(Vec<(&'v str, Input<'v>)>),
    /// Map entries.
    Entries(Vec<(Input<'v>, Input<'v>)>),
}

impl<'v> Input<'v> {
    pub fn fields(fields: impl IntoIterator<Item = (&'v str, Input<'v>)>) -> Input<'v> {
        Input::Fields(fields.into_iter().collect())
    }

    pub fn items<T: Into<Input<'v>>>(items: impl IntoIterator<Item = T>) -> Input<'v> {
        Input::Items(items.into_iter().map(Into::into).collect())
    }

    pub fn case(tag: i64, payload: impl Into<Input<'v>>) -> Input<'v> {
        Input::Case(tag, Box::new(payload.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Input::Null)
    }
}

macro_rules! input_from_int {
    ($variant:ident as $wide:ty: $($ty:ty),*) => {
        $(impl<'v> From<$ty> for Input<'v> {
            fn from(value: $ty) -> Input<'v> {
                Input::$variant(value as $wide)
            }
        })*
    };
}

input_from_int!(Int as i64: i8, i16, i32, i64);
input_from_int!(Uint as u64: u8, u16, u32, u64);

impl<'v> From<&'v str> for Input<'v> {
    fn from(value: &'v str) -> Input<'v> {
        Input::Str(value)
    }
}

impl<'v> From<&'v String> for Input<'v> {
    fn from(value: &'v String) -> Input<'v> {
        Input::Str(value)
    }
}

impl<'v> From<&'v [u8]> for Input<'v> {
    fn from(value: &'v [u8]) -> Input<'v> {
        Input::Bytes(value)
    }
}

impl<'v, const N: usize> From<&'v [u8; N]> for Input<'v> {
    fn from(value: &'v [u8; N]) -> Input<'v> {
        Input::Bytes(value)
    }
}

impl<'v, T: Into<Input<'v>>> From<Vec<T>> for Input<'v> {
    fn from(items: Vec<T>) -> Input<'v> {
        Input::items(items)
    }
}

impl<'v, T: Into<Input<'v>>> From<Option<T>> for Input<'v> {
    fn from(value: Option<T>) -> Input<'v> {
        value.map_or(Input::Null, Into::into)
    }
}

/// Turns a decoded value back into something writable, e.g. to copy a
/// message through a builder.
impl<'v, 'a: 'v> From<&'v Value<'a>> for Input<'v> {
    fn from(value: &'v Value<'a>) -> Input<'v> {
        match value {
            Value::Null | Value::Unknown(..) => Input::Null,
            Value::Int(v) => Input::Int(*v),
            Value::Uint(v) => Input::Uint(*v),
            Value::String(v) => Input::Str(v),
            Value::Octets(v) => Input::Bytes(v),
            Value::Enum(_, symbol) => Input::Symbol(symbol),
            Value::Array(items) => Input::Items(items.iter().map(Input::from).collect()),
            Value::Object(_, fields) => Input::Fields(
                fields
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (*k, Input::from(v)))
                    .collect(),
            ),
            Value::Case(_, tag, payload) => {
                Input::Case(*tag, Box::new(Input::from(payload.as_ref())))
            }
            Value::Map(_, entries) => Input::Entries(
                entries
                    .iter()
                    .map(|(k, v)| (Input::from(k), Input::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_basic() {
        let value = Value::Array(vec![
            Value::Null,
            Value::Int(-1),
            Value::Uint(1),
            Value::String("abc"),
            Value::Octets(&[0x0a, 0xff]),
            Value::Enum("Side", "BUY"),
            Value::Object("Point", vec![("x", Value::Int(1)), ("y", Value::Int(2))]),
            Value::Case("Price", 0x41, Box::new(Value::Int(12))),
            Value::Unknown("Price", 0x7f),
        ]);

        assert_eq!(value.len(), 9);
        assert!(value[0].is_null());
        assert_eq!(value[1].as_int(), Some(-1));
        assert_eq!(value[2].as_uint(), Some(1));
        assert_eq!(value[1].as_uint(), None);
        assert_eq!(value[3].as_str(), Some("abc"));
        assert_eq!(value[4].as_bytes(), Some(&[0x0a, 0xff][..]));
        assert_eq!(value[5].as_enum(), ("Side", "BUY"));
        assert_eq!(value[6].get("y"), Some(&Value::Int(2)));
        assert_eq!(value[6].get("z"), None);
        assert_eq!(value[7].as_int(), Some(12));

        assert_eq!(
            format!("{:?}", value),
            "[null, -1, 1, \"abc\", 0x0aff, Side::BUY, Point {x: 1, y: 2}, Price(65: 12), unknown]"
        );
    }

    #[test]
    fn input_conversions() {
        assert_eq!(Input::from(-3i8), Input::Int(-3));
        assert_eq!(Input::from(3u16), Input::Uint(3));
        assert_eq!(Input::from("hi"), Input::Str("hi"));
        assert_eq!(Input::from(None::<i32>), Input::Null);
        assert_eq!(Input::from(vec![1i32, -1]), Input::Items(vec![Input::Int(1), Input::Int(-1)]));
        assert_eq!(Input::from(&[1u8, 2][..]), Input::Bytes(&[1, 2]));
    }

    #[test]
    fn value_to_input() {
        let value = Value::Object(
            "Trade",
            vec![
                ("side", Value::Enum("Side", "SELL")),
                ("note", Value::Null),
                ("price", Value::Case("Price", 0x41, Box::new(Value::Int(5)))),
            ],
        );
        assert_eq!(
            Input::from(&value),
            Input::Fields(vec![
                ("side", Input::Symbol("SELL")),
                ("price", Input::Case(0x41, Box::new(Input::Int(5)))),
            ])
        );
    }
}
