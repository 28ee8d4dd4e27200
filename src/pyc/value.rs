//! Values of the serialized object tree.
//!
//! [`Value`] is the in-memory form of every object the marshal format can express. Containers,
//! strings and byte strings are held behind [`Arc`], so the value a back-reference resolves to
//! is the same allocation as its first occurrence and cloning a value is cheap.
//!
//! The [`fmt::Display`] implementation renders a value the way the interpreter's `repr()` does,
//! which is what the instruction listing shows for constant operands.

use std::{fmt, sync::Arc};

use crate::pyc::CodeUnit;

/// Arbitrary precision integer as stored by the marshal format.
///
/// The magnitude is kept in base 2^15, least significant digit first, exactly as serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyLong {
    /// Sign of the value
    pub negative: bool,
    /// 15-bit digits, least significant first
    pub digits: Vec<u16>,
}

impl PyLong {
    /// The value as `i64`, if it fits
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        let mut magnitude: i128 = 0;
        for digit in self.digits.iter().rev() {
            magnitude = magnitude.checked_mul(1 << 15)? + i128::from(*digit);
            if magnitude > i128::from(u64::MAX) {
                return None;
            }
        }

        let value = if self.negative { -magnitude } else { magnitude };
        i64::try_from(value).ok()
    }

    /// Decimal representation of the value
    #[must_use]
    pub fn to_decimal(&self) -> String {
        const CHUNK: u64 = 1_000_000_000;

        // base 10^9 limbs, least significant first
        let mut limbs: Vec<u64> = vec![0];
        for digit in self.digits.iter().rev() {
            let mut carry = u64::from(*digit);
            for limb in &mut limbs {
                let value = *limb * (1 << 15) + carry;
                *limb = value % CHUNK;
                carry = value / CHUNK;
            }
            while carry > 0 {
                limbs.push(carry % CHUNK);
                carry /= CHUNK;
            }
        }

        let mut out = String::new();
        let is_zero = limbs.iter().all(|limb| *limb == 0);
        if self.negative && !is_zero {
            out.push('-');
        }

        let mut iter = limbs.iter().rev();
        if let Some(first) = iter.next() {
            out.push_str(&first.to_string());
        }
        for limb in iter {
            out.push_str(&format!("{limb:09}"));
        }
        out
    }
}

/// A decoded object
#[derive(Debug, Clone)]
pub enum Value {
    /// The NULL marker, only meaningful as dictionary terminator
    Null,
    /// `None`
    None,
    /// `False`
    False,
    /// `True`
    True,
    /// The `StopIteration` singleton
    StopIteration,
    /// `...`
    Ellipsis,
    /// An integer that fits 64 bits (`i` and `I` tags)
    Int(i64),
    /// An arbitrary precision integer (`l` tag)
    Long(PyLong),
    /// A float (`f` and `g` tags)
    Float(f64),
    /// A complex number as real and imaginary part (`x` and `y` tags)
    Complex(f64, f64),
    /// A byte string
    Bytes(Arc<[u8]>),
    /// A text string, whatever encoding tag it was stored with
    Str(Arc<str>),
    /// A tuple
    Tuple(Arc<[Value]>),
    /// A list
    List(Arc<[Value]>),
    /// A dictionary, in serialization order
    Dict(Arc<[(Value, Value)]>),
    /// A set
    Set(Arc<[Value]>),
    /// A frozenset
    FrozenSet(Arc<[Value]>),
    /// A code object
    Code(Arc<CodeUnit>),
}

impl Value {
    /// Name of the interpreter type this value represents
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::None => "NoneType",
            Value::False | Value::True => "bool",
            Value::StopIteration => "StopIteration",
            Value::Ellipsis => "ellipsis",
            Value::Int(_) | Value::Long(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(..) => "complex",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Code(_) => "code",
        }
    }

    /// The string content, for [`Value::Str`]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The code unit, for [`Value::Code`]
    #[must_use]
    pub fn as_code(&self) -> Option<&Arc<CodeUnit>> {
        match self {
            Value::Code(code) => Some(code),
            _ => None,
        }
    }

    /// The interpreter's `repr()` of this value
    #[must_use]
    pub fn repr(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null)
            | (Value::None, Value::None)
            | (Value::False, Value::False)
            | (Value::True, Value::True)
            | (Value::StopIteration, Value::StopIteration)
            | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Complex(ar, ai), Value::Complex(br, bi)) => {
                ar.to_bits() == br.to_bits() && ai.to_bits() == bi.to_bits()
            }
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b))
            | (Value::List(a), Value::List(b))
            | (Value::Set(a), Value::Set(b))
            | (Value::FrozenSet(a), Value::FrozenSet(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Code(a), Value::Code(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// `repr()` of a float
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Debug switches to scientific notation at the same thresholds, but spells the exponent
    // without sign and padding
    let debug = format!("{value:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => debug,
    }
}

/// A float component of a complex `repr()`, which drops a trailing `.0`
fn complex_part(value: f64) -> String {
    let repr = float_repr(value);
    match repr.strip_suffix(".0") {
        Some(stripped) => stripped.to_string(),
        None => repr,
    }
}

/// Containers nested deeper than this are rendered as `...`
const REPR_MAX_DEPTH: usize = 64;

/// Code points outside the control and whitespace classes that `str.isprintable()` rejects:
/// format characters, private use areas and a few unassigned blocks
const NON_PRINTABLE: &[(u32, u32)] = &[
    (0x00AD, 0x00AD),
    (0x0600, 0x0605),
    (0x061C, 0x061C),
    (0x06DD, 0x06DD),
    (0x070F, 0x070F),
    (0x08E2, 0x08E2),
    (0x180E, 0x180E),
    (0x200B, 0x200F),
    (0x202A, 0x202E),
    (0x2060, 0x2064),
    (0x2065, 0x206F),
    (0xD800, 0xF8FF),
    (0xFDD0, 0xFDEF),
    (0xFEFF, 0xFEFF),
    (0xFFF0, 0xFFFB),
    (0x110BD, 0x110BD),
    (0x110CD, 0x110CD),
    (0x13430, 0x1343F),
    (0x1BCA0, 0x1BCA3),
    (0x1D173, 0x1D17A),
    (0xE0000, 0xE00FF),
    (0xE01F0, 0xEFFFF),
    (0xF0000, 0x10FFFF),
];

/// Whether `str.isprintable()` accepts `c`
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }

    let code = c as u32;
    // the last two code points of every plane are noncharacters
    if code & 0xFFFE == 0xFFFE {
        return false;
    }

    !NON_PRINTABLE
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
}

fn write_quoted(
    f: &mut fmt::Formatter<'_>,
    chars: impl Iterator<Item = char> + Clone,
) -> fmt::Result {
    let has_single = chars.clone().any(|c| c == '\'');
    let has_double = chars.clone().any(|c| c == '"');
    let quote = if has_single && !has_double { '"' } else { '\'' };

    write!(f, "{quote}")?;
    for c in chars {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\t' => write!(f, "\\t")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if !is_printable(c) => match c as u32 {
                code @ 0..=0xFF => write!(f, "\\x{code:02x}")?,
                code @ 0x100..=0xFFFF => write!(f, "\\u{code:04x}")?,
                code => write!(f, "\\U{code:08x}")?,
            },
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "{quote}")
}

fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    let has_single = bytes.contains(&b'\'');
    let has_double = bytes.contains(&b'"');
    let quote = if has_single && !has_double { b'"' } else { b'\'' };

    write!(f, "b{}", quote as char)?;
    for &byte in bytes {
        match byte {
            b'\\' => write!(f, "\\\\")?,
            b'\t' => write!(f, "\\t")?,
            b'\n' => write!(f, "\\n")?,
            b'\r' => write!(f, "\\r")?,
            b if b == quote => write!(f, "\\{}", b as char)?,
            0x20..=0x7E => write!(f, "{}", byte as char)?,
            _ => write!(f, "\\x{byte:02x}")?,
        }
    }
    write!(f, "{}", quote as char)
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value], depth: usize) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write_value(f, item, depth + 1)?;
    }
    Ok(())
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Tuple(_)
        | Value::List(_)
        | Value::Dict(_)
        | Value::Set(_)
        | Value::FrozenSet(_)
            if depth >= REPR_MAX_DEPTH =>
        {
            write!(f, "...")
        }
        Value::Null => write!(f, "<NULL>"),
        Value::None => write!(f, "None"),
        Value::False => write!(f, "False"),
        Value::True => write!(f, "True"),
        Value::StopIteration => write!(f, "StopIteration"),
        Value::Ellipsis => write!(f, "Ellipsis"),
        Value::Int(value) => write!(f, "{value}"),
        Value::Long(value) => write!(f, "{}", value.to_decimal()),
        Value::Float(value) => write!(f, "{}", float_repr(*value)),
        Value::Complex(real, imag) => {
            let sign = if imag.is_sign_negative() && !imag.is_nan() {
                '-'
            } else {
                '+'
            };
            if *real == 0.0 && real.is_sign_positive() {
                write!(f, "{}j", complex_part(*imag))
            } else {
                write!(
                    f,
                    "({}{sign}{}j)",
                    complex_part(*real),
                    complex_part(imag.abs())
                )
            }
        }
        Value::Bytes(bytes) => write_bytes(f, bytes),
        Value::Str(s) => write_quoted(f, s.chars()),
        Value::Tuple(items) => {
            write!(f, "(")?;
            write_items(f, items, depth)?;
            if items.len() == 1 {
                write!(f, ",")?;
            }
            write!(f, ")")
        }
        Value::List(items) => {
            write!(f, "[")?;
            write_items(f, items, depth)?;
            write!(f, "]")
        }
        Value::Dict(pairs) => {
            write!(f, "{{")?;
            for (index, (key, value)) in pairs.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, key, depth + 1)?;
                write!(f, ": ")?;
                write_value(f, value, depth + 1)?;
            }
            write!(f, "}}")
        }
        Value::Set(items) => {
            if items.is_empty() {
                return write!(f, "set()");
            }
            write!(f, "{{")?;
            write_items(f, items, depth)?;
            write!(f, "}}")
        }
        Value::FrozenSet(items) => {
            if items.is_empty() {
                return write!(f, "frozenset()");
            }
            write!(f, "frozenset({{")?;
            write_items(f, items, depth)?;
            write!(f, "}})")
        }
        Value::Code(code) => write!(
            f,
            "<code object {}, file \"{}\", line {}>",
            code.name, code.filename, code.firstlineno
        ),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(Arc::from(text))
    }

    #[test]
    fn scalars() {
        assert_eq!(Value::None.repr(), "None");
        assert_eq!(Value::True.repr(), "True");
        assert_eq!(Value::Ellipsis.repr(), "Ellipsis");
        assert_eq!(Value::Int(-42).repr(), "-42");
        assert_eq!(Value::Null.type_name(), "NULL");
        assert_eq!(Value::Int(1).type_name(), "int");
    }

    #[test]
    fn floats() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e300), "1.5e+300");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(float_repr(f64::NAN), "nan");
    }

    #[test]
    fn complex() {
        assert_eq!(Value::Complex(0.0, 2.0).repr(), "2j");
        assert_eq!(Value::Complex(1.0, 2.0).repr(), "(1+2j)");
        assert_eq!(Value::Complex(1.5, -2.5).repr(), "(1.5-2.5j)");
        assert_eq!(Value::Complex(-0.0, 1.0).repr(), "(-0+1j)");
    }

    #[test]
    fn strings() {
        assert_eq!(s("hello").repr(), "'hello'");
        assert_eq!(s("it's").repr(), "\"it's\"");
        assert_eq!(s("both ' and \"").repr(), "'both \\' and \"'");
        assert_eq!(s("tab\there\n").repr(), "'tab\\there\\n'");
        assert_eq!(s("\u{1}").repr(), "'\\x01'");
        assert_eq!(s("caf\u{e9}").repr(), "'caf\u{e9}'");
        assert_eq!(s("back\\slash").repr(), "'back\\\\slash'");
    }

    #[test]
    fn non_printable_escapes() {
        assert_eq!(s("soft\u{ad}hyphen").repr(), "'soft\\xadhyphen'");
        assert_eq!(s("\u{a0}").repr(), "'\\xa0'");
        assert_eq!(s("line\u{2028}sep").repr(), "'line\\u2028sep'");
        assert_eq!(s("\u{200b}").repr(), "'\\u200b'");
        assert_eq!(s("\u{feff}").repr(), "'\\ufeff'");
        assert_eq!(s("\u{e000}").repr(), "'\\ue000'");
        assert_eq!(s("\u{e0001}").repr(), "'\\U000e0001'");
        assert_eq!(s("a b\u{3b1}").repr(), "'a b\u{3b1}'");
        assert_eq!(s("\u{1f600}").repr(), "'\u{1f600}'");
    }

    #[test]
    fn deep_nesting_elided() {
        let mut value = Value::None;
        for _ in 0..REPR_MAX_DEPTH + 10 {
            value = Value::Tuple(Arc::from(vec![value]));
        }

        let repr = value.repr();
        assert!(repr.starts_with(&"(".repeat(REPR_MAX_DEPTH)));
        assert!(repr.contains("(...,)"));
        assert!(!repr.contains("None"));
    }

    #[test]
    fn bytes() {
        let bytes = Value::Bytes(Arc::from(&b"a'\x00\xff"[..]));
        assert_eq!(bytes.repr(), "b\"a'\\x00\\xff\"");
        assert_eq!(Value::Bytes(Arc::from(&b""[..])).repr(), "b''");
    }

    #[test]
    fn containers() {
        let one = Value::Tuple(Arc::from(vec![Value::Int(1)]));
        assert_eq!(one.repr(), "(1,)");

        let empty = Value::Tuple(Arc::from(Vec::new()));
        assert_eq!(empty.repr(), "()");

        let pair = Value::Tuple(Arc::from(vec![s("a"), Value::None]));
        assert_eq!(pair.repr(), "('a', None)");

        let list = Value::List(Arc::from(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(list.repr(), "[1, 2]");

        let dict = Value::Dict(Arc::from(vec![(s("k"), Value::Int(1))]));
        assert_eq!(dict.repr(), "{'k': 1}");

        assert_eq!(Value::Set(Arc::from(Vec::new())).repr(), "set()");
        assert_eq!(Value::Set(Arc::from(vec![Value::Int(3)])).repr(), "{3}");
        assert_eq!(
            Value::FrozenSet(Arc::from(vec![s("x"), s("y")])).repr(),
            "frozenset({'x', 'y'})"
        );
        assert_eq!(Value::FrozenSet(Arc::from(Vec::new())).repr(), "frozenset()");
    }

    #[test]
    fn longs() {
        let zero = PyLong {
            negative: false,
            digits: vec![],
        };
        assert_eq!(zero.to_decimal(), "0");
        assert_eq!(zero.to_i64(), Some(0));

        // 2**15 + 1
        let small = PyLong {
            negative: true,
            digits: vec![1, 1],
        };
        assert_eq!(small.to_decimal(), "-32769");
        assert_eq!(small.to_i64(), Some(-32769));

        // 2**75
        let big = PyLong {
            negative: false,
            digits: vec![0, 0, 0, 0, 0, 1],
        };
        assert_eq!(big.to_decimal(), "37778931862957161709568");
        assert_eq!(big.to_i64(), None);
        assert_eq!(Value::Long(big).repr(), "37778931862957161709568");
    }
}
