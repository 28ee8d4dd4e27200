//! Decoder for the marshal object format (version 4).
//!
//! The payload of a compiled module is one serialized object, usually a code object, whose
//! constant pool recursively holds everything else. Each object starts with a one byte tag.
//! Bit 7 of the tag (`FLAG_REF`) marks an object that later back-references (`r`) may point
//! at; the reader reserves its slot in the reference table when the object *starts* and fills
//! it once the object is complete, so slots are numbered in first-occurrence order.
//!
//! # Key Components
//!
//! - [`ObjectReader`] - Stateful reader over the payload
//! - [`ObjectReader::read_object`] - Decode the next object
//! - [`ObjectReader::read_root`] - Decode the root object and require it to be a code unit
//!
//! # Error Handling
//!
//! The reader runs strictly left to right and never re-reads. Every structural fault is
//! reported as [`crate::Error::MalformedObject`] carrying the absolute file offset of the
//! fault: the tag byte for unknown tags, the read position for truncated payloads and bad
//! lengths. Nesting deeper than the configured limit is [`crate::Error::RecursionLimit`].
//!
//! # Examples
//!
//! ```rust
//! use pycscope::pyc::{ObjectReader, Value};
//!
//! // a tuple of the int 1 and None
//! let payload = [b')', 2, b'i', 1, 0, 0, 0, b'N'];
//! let mut reader = ObjectReader::new(&payload, 16);
//!
//! let value = reader.read_object()?;
//! assert_eq!(value.repr(), "(1, None)");
//! # Ok::<(), pycscope::Error>(())
//! ```

use std::sync::Arc;

use crate::{
    file::{io::PycIO, parser::Parser},
    pyc::{CodeFlags, CodeUnit, PyLong, Value},
    Error::{RecursionLimit, UnexpectedRootType},
    Result,
};

/// Marks an object that may be the target of a back-reference
pub const FLAG_REF: u8 = 0x80;

/// Default nesting limit, matching the interpreter's own `MAX_MARSHAL_STACK_DEPTH`
pub const DEFAULT_MAX_DEPTH: usize = 2000;

const TYPE_NULL: u8 = b'0';
const TYPE_NONE: u8 = b'N';
const TYPE_FALSE: u8 = b'F';
const TYPE_TRUE: u8 = b'T';
const TYPE_STOPITER: u8 = b'S';
const TYPE_ELLIPSIS: u8 = b'.';
const TYPE_INT: u8 = b'i';
const TYPE_INT64: u8 = b'I';
const TYPE_FLOAT: u8 = b'f';
const TYPE_BINARY_FLOAT: u8 = b'g';
const TYPE_COMPLEX: u8 = b'x';
const TYPE_BINARY_COMPLEX: u8 = b'y';
const TYPE_LONG: u8 = b'l';
const TYPE_STRING: u8 = b's';
const TYPE_INTERNED: u8 = b't';
const TYPE_REF: u8 = b'r';
const TYPE_TUPLE: u8 = b'(';
const TYPE_LIST: u8 = b'[';
const TYPE_DICT: u8 = b'{';
const TYPE_CODE: u8 = b'c';
const TYPE_UNICODE: u8 = b'u';
const TYPE_SET: u8 = b'<';
const TYPE_FROZENSET: u8 = b'>';
const TYPE_ASCII: u8 = b'a';
const TYPE_ASCII_INTERNED: u8 = b'A';
const TYPE_SMALL_TUPLE: u8 = b')';
const TYPE_SHORT_ASCII: u8 = b'z';
const TYPE_SHORT_ASCII_INTERNED: u8 = b'Z';

/// Largest value a single long digit may hold
const LONG_DIGIT_MAX: u16 = (1 << 15) - 1;

/// Stateful reader that turns a marshal payload into [`Value`]s
pub struct ObjectReader<'a> {
    parser: Parser<'a>,
    /// Absolute file offset of the first payload byte
    base_offset: usize,
    /// Back-reference table; `None` marks a slot whose object is still being decoded
    refs: Vec<Option<Value>>,
    max_depth: usize,
}

impl<'a> ObjectReader<'a> {
    /// Create a new reader
    ///
    /// ## Arguments
    /// * 'data'        - The payload, starting with the root object's tag
    /// * 'base_offset' - Absolute file offset of `data[0]`, used for error reporting
    #[must_use]
    pub fn new(data: &'a [u8], base_offset: usize) -> Self {
        ObjectReader {
            parser: Parser::new(data),
            base_offset,
            refs: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Replace the nesting limit
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Absolute file offset of the next byte to be read
    #[must_use]
    pub fn position(&self) -> usize {
        self.base_offset + self.parser.pos()
    }

    /// Number of payload bytes not consumed yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.parser.remaining()
    }

    /// Number of reference slots allocated so far
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Decode the root object, which must be a code unit
    ///
    /// # Errors
    /// Returns [`crate::Error::UnexpectedRootType`] if the root decodes to anything but a code
    /// unit, or any error of [`ObjectReader::read_object`].
    pub fn read_root(&mut self) -> Result<Arc<CodeUnit>> {
        match self.read_object()? {
            Value::Code(code) => Ok(code),
            other => Err(UnexpectedRootType(other.type_name())),
        }
    }

    /// Decode the next object
    ///
    /// Containers are decoded with an explicit stack of open frames, so the nesting limit
    /// bounds heap usage only and deep input never exhausts the thread's stack.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedObject`] on unknown tags, truncated data, negative
    /// lengths, invalid text or bad back-references, and [`crate::Error::RecursionLimit`] if
    /// containers nest deeper than the configured limit.
    pub fn read_object(&mut self) -> Result<Value> {
        let mut open: Vec<Frame> = Vec::new();

        loop {
            if open.len() >= self.max_depth {
                return Err(RecursionLimit(self.max_depth));
            }

            let mut node = self.read_start()?;

            // hand the finished object to its container, closing every container it completes
            loop {
                let (value, offset) = match node {
                    Node::Open(frame) if !frame.is_complete() => {
                        open.push(frame);
                        break;
                    }
                    Node::Open(frame) => {
                        let offset = frame.offset;
                        (self.close(frame), offset)
                    }
                    Node::Done(value, offset) => (value, offset),
                };

                let Some(parent) = open.last_mut() else {
                    return Ok(value);
                };
                self.accept(parent, value, offset)?;
                if !parent.is_complete() {
                    break;
                }

                let Some(frame) = open.pop() else {
                    break;
                };
                node = Node::Open(frame);
            }
        }
    }

    /// Read a tag and either finish a scalar or open a container
    fn read_start(&mut self) -> Result<Node> {
        let tag_offset = self.position();
        let byte = self.read::<u8>()?;
        let tag = byte & !FLAG_REF;

        if tag == TYPE_REF {
            return Ok(Node::Done(self.read_backref()?, tag_offset));
        }

        let slot = if byte & FLAG_REF != 0 {
            self.refs.push(None);
            Some(self.refs.len() - 1)
        } else {
            None
        };

        let body = match tag {
            TYPE_TUPLE => {
                let len = self.read_length()?;
                self.sequence(Sequence::Tuple, len)
            }
            TYPE_SMALL_TUPLE => {
                let len = self.read::<u8>()? as usize;
                self.sequence(Sequence::Tuple, len)
            }
            TYPE_LIST => {
                let len = self.read_length()?;
                self.sequence(Sequence::List, len)
            }
            TYPE_SET => {
                let len = self.read_length()?;
                self.sequence(Sequence::Set, len)
            }
            TYPE_FROZENSET => {
                let len = self.read_length()?;
                self.sequence(Sequence::FrozenSet, len)
            }
            TYPE_DICT => Body::Dict {
                pairs: Vec::new(),
                key: None,
                done: false,
            },
            TYPE_CODE => Body::Code(Box::new(self.read_code_header()?)),
            _ => {
                let value = self.read_scalar(tag, tag_offset)?;
                self.fill_slot(slot, &value);
                return Ok(Node::Done(value, tag_offset));
            }
        };

        Ok(Node::Open(Frame {
            offset: tag_offset,
            slot,
            body,
        }))
    }

    fn sequence(&self, kind: Sequence, len: usize) -> Body {
        Body::Sequence {
            kind,
            len,
            // each item takes at least one byte
            items: Vec::with_capacity(len.min(self.parser.remaining())),
        }
    }

    /// Add a finished child to the innermost open container
    fn accept(&mut self, frame: &mut Frame, value: Value, offset: usize) -> Result<()> {
        match &mut frame.body {
            Body::Sequence { kind, items, .. } => {
                if matches!(value, Value::Null) {
                    return Err(malformed_object!(offset, "NULL object in {}", kind.name()));
                }
                items.push(value);
            }
            Body::Dict { pairs, key, done } => match key.take() {
                None if matches!(value, Value::Null) => *done = true,
                None => *key = Some(value),
                Some(_) if matches!(value, Value::Null) => {
                    return Err(malformed_object!(offset, "NULL object as dict value"));
                }
                Some(k) => pairs.push((k, value)),
            },
            Body::Code(record) => {
                record.accept(value, offset)?;
                if record.next == CodeRecord::LNOTAB {
                    record.firstlineno = self.read_count("firstlineno")?;
                }
            }
        }
        Ok(())
    }

    /// Turn a complete container into its value and fill its reference slot
    fn close(&mut self, frame: Frame) -> Value {
        let value = match frame.body {
            Body::Sequence { kind, items, .. } => kind.build(items),
            Body::Dict { pairs, .. } => Value::Dict(Arc::from(pairs)),
            Body::Code(record) => Value::Code(Arc::new(record.into_unit())),
        };

        self.fill_slot(frame.slot, &value);
        value
    }

    fn fill_slot(&mut self, slot: Option<usize>, value: &Value) {
        if let Some(entry) = slot.and_then(|slot| self.refs.get_mut(slot)) {
            *entry = Some(value.clone());
        }
    }

    fn read_backref(&mut self) -> Result<Value> {
        let offset = self.position();
        let index = self.read::<u32>()? as usize;

        match self.refs.get(index) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(malformed_object!(
                offset,
                "back-reference {} points at an object under construction",
                index
            )),
            None => Err(malformed_object!(
                offset,
                "back-reference {} beyond table of {} entries",
                index,
                self.refs.len()
            )),
        }
    }

    fn read_scalar(&mut self, tag: u8, tag_offset: usize) -> Result<Value> {
        let value = match tag {
            TYPE_NULL => Value::Null,
            TYPE_NONE => Value::None,
            TYPE_FALSE => Value::False,
            TYPE_TRUE => Value::True,
            TYPE_STOPITER => Value::StopIteration,
            TYPE_ELLIPSIS => Value::Ellipsis,
            TYPE_INT => Value::Int(i64::from(self.read::<i32>()?)),
            TYPE_INT64 => Value::Int(self.read::<i64>()?),
            TYPE_LONG => self.read_long()?,
            TYPE_FLOAT => Value::Float(self.read_text_float()?),
            TYPE_BINARY_FLOAT => Value::Float(self.read::<f64>()?),
            TYPE_COMPLEX => {
                let real = self.read_text_float()?;
                let imag = self.read_text_float()?;
                Value::Complex(real, imag)
            }
            TYPE_BINARY_COMPLEX => {
                let real = self.read::<f64>()?;
                let imag = self.read::<f64>()?;
                Value::Complex(real, imag)
            }
            TYPE_STRING => {
                let len = self.read_length()?;
                Value::Bytes(Arc::from(self.read_raw(len)?))
            }
            TYPE_INTERNED | TYPE_UNICODE => {
                let len = self.read_length()?;
                Value::Str(Arc::from(self.read_utf8(len)?))
            }
            TYPE_ASCII | TYPE_ASCII_INTERNED => {
                let len = self.read_length()?;
                Value::Str(Arc::from(self.read_latin1(len)?))
            }
            TYPE_SHORT_ASCII | TYPE_SHORT_ASCII_INTERNED => {
                let len = self.read::<u8>()? as usize;
                Value::Str(Arc::from(self.read_latin1(len)?))
            }
            _ => {
                return Err(malformed_object!(
                    tag_offset,
                    "unknown type tag 0x{:02X}",
                    tag
                ))
            }
        };

        Ok(value)
    }

    /// Read a fixed-width value, reporting a short payload as malformed
    fn read<T: PycIO>(&mut self) -> Result<T> {
        let offset = self.position();
        self.parser
            .read_le::<T>()
            .map_err(|_| malformed_object!(offset, "truncated payload"))
    }

    fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        let offset = self.position();
        self.parser.read_bytes(len).map_err(|_| {
            malformed_object!(
                offset,
                "truncated payload - {} bytes requested, {} available",
                len,
                self.parser.remaining()
            )
        })
    }

    /// Read an i32 length prefix, rejecting negative values
    fn read_length(&mut self) -> Result<usize> {
        let offset = self.position();
        let len = self.read::<i32>()?;

        usize::try_from(len).map_err(|_| malformed_object!(offset, "negative length {}", len))
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let offset = self.position();
        let bytes = self.read_raw(len)?;

        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(error) => Err(malformed_object!(
                offset + error.valid_up_to(),
                "invalid UTF-8 in string"
            )),
        }
    }

    fn read_latin1(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_raw(len)?;
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    }

    fn read_text_float(&mut self) -> Result<f64> {
        let len = self.read::<u8>()? as usize;
        let offset = self.position();
        let bytes = self.read_raw(len)?;

        std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse::<f64>().ok())
            .ok_or_else(|| malformed_object!(offset, "invalid float literal"))
    }

    fn read_long(&mut self) -> Result<Value> {
        let n = self.read::<i32>()?;
        let count = n.unsigned_abs() as usize;
        if count > self.parser.remaining() / 2 {
            return Err(malformed_object!(
                self.position(),
                "truncated payload - long with {} digits",
                count
            ));
        }

        let mut digits = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = self.position();
            let digit = self.read::<u16>()?;
            if digit > LONG_DIGIT_MAX {
                return Err(malformed_object!(offset, "digit out of range in long"));
            }
            digits.push(digit);
        }

        if digits.last() == Some(&0) {
            return Err(malformed_object!(
                self.position() - 2,
                "unnormalized long (leading zero digit)"
            ));
        }

        let long = PyLong {
            negative: n < 0,
            digits,
        };
        Ok(match long.to_i64() {
            Some(value) => Value::Int(value),
            None => Value::Long(long),
        })
    }

    /// Read one of the raw i32 count fields of a code record
    fn read_count(&mut self, field: &str) -> Result<u32> {
        let offset = self.position();
        let value = self.read::<i32>()?;

        u32::try_from(value).map_err(|_| malformed_object!(offset, "negative {} {}", field, value))
    }

    /// Read the raw fields that precede the nested values of a code record
    fn read_code_header(&mut self) -> Result<CodeRecord> {
        let argcount = self.read_count("argcount")?;
        let kwonlyargcount = self.read_count("kwonlyargcount")?;
        let nlocals = self.read_count("nlocals")?;
        let stacksize = self.read_count("stacksize")?;
        let flags = CodeFlags::from_bits_retain(self.read::<i32>()? as u32);

        Ok(CodeRecord {
            argcount,
            kwonlyargcount,
            nlocals,
            stacksize,
            flags,
            code: Arc::from(Vec::new()),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            freevars: Vec::new(),
            cellvars: Vec::new(),
            filename: String::new(),
            name: String::new(),
            firstlineno: 0,
            lnotab: Arc::from(Vec::new()),
            next: 0,
        })
    }
}

/// Outcome of reading one tag
enum Node {
    Open(Frame),
    Done(Value, usize),
}

/// A container whose children are still being read
struct Frame {
    /// Absolute offset of the container's tag
    offset: usize,
    slot: Option<usize>,
    body: Body,
}

impl Frame {
    fn is_complete(&self) -> bool {
        match &self.body {
            Body::Sequence { len, items, .. } => items.len() == *len,
            Body::Dict { done, .. } => *done,
            Body::Code(record) => record.next > CodeRecord::LNOTAB,
        }
    }
}

enum Body {
    Sequence {
        kind: Sequence,
        len: usize,
        items: Vec<Value>,
    },
    Dict {
        pairs: Vec<(Value, Value)>,
        key: Option<Value>,
        done: bool,
    },
    Code(Box<CodeRecord>),
}

#[derive(Clone, Copy)]
enum Sequence {
    Tuple,
    List,
    Set,
    FrozenSet,
}

impl Sequence {
    fn name(self) -> &'static str {
        match self {
            Sequence::Tuple => "tuple",
            Sequence::List => "list",
            Sequence::Set => "set",
            Sequence::FrozenSet => "frozenset",
        }
    }

    fn build(self, items: Vec<Value>) -> Value {
        let items = Arc::from(items);
        match self {
            Sequence::Tuple => Value::Tuple(items),
            Sequence::List => Value::List(items),
            Sequence::Set => Value::Set(items),
            Sequence::FrozenSet => Value::FrozenSet(items),
        }
    }
}

/// A code record being assembled, field by field
struct CodeRecord {
    argcount: u32,
    kwonlyargcount: u32,
    nlocals: u32,
    stacksize: u32,
    flags: CodeFlags,
    code: Arc<[u8]>,
    consts: Vec<Value>,
    names: Vec<String>,
    varnames: Vec<String>,
    freevars: Vec<String>,
    cellvars: Vec<String>,
    filename: String,
    name: String,
    firstlineno: u32,
    lnotab: Arc<[u8]>,
    /// Index of the next nested field
    next: usize,
}

impl CodeRecord {
    /// Index of the line table, the only nested field after the raw `firstlineno`
    const LNOTAB: usize = 8;

    fn accept(&mut self, value: Value, offset: usize) -> Result<()> {
        match self.next {
            0 => self.code = bytes_field("code", value, offset)?,
            1 => self.consts = tuple_field("consts", value, offset)?,
            2 => self.names = names_field("names", value, offset)?,
            3 => self.varnames = names_field("varnames", value, offset)?,
            4 => self.freevars = names_field("freevars", value, offset)?,
            5 => self.cellvars = names_field("cellvars", value, offset)?,
            6 => self.filename = str_field("filename", value, offset)?,
            7 => self.name = str_field("name", value, offset)?,
            _ => self.lnotab = bytes_field("lnotab", value, offset)?,
        }
        self.next += 1;
        Ok(())
    }

    fn into_unit(self) -> CodeUnit {
        CodeUnit {
            argcount: self.argcount,
            kwonlyargcount: self.kwonlyargcount,
            nlocals: self.nlocals,
            stacksize: self.stacksize,
            flags: self.flags,
            code: self.code,
            consts: self.consts,
            names: self.names,
            varnames: self.varnames,
            freevars: self.freevars,
            cellvars: self.cellvars,
            filename: self.filename,
            name: self.name,
            firstlineno: self.firstlineno,
            lnotab: self.lnotab,
        }
    }
}

fn bytes_field(field: &str, value: Value, offset: usize) -> Result<Arc<[u8]>> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        other => Err(malformed_object!(
            offset,
            "code {} must be bytes, found {}",
            field,
            other.type_name()
        )),
    }
}

fn tuple_field(field: &str, value: Value, offset: usize) -> Result<Vec<Value>> {
    match value {
        Value::Tuple(items) => Ok(items.to_vec()),
        other => Err(malformed_object!(
            offset,
            "code {} must be a tuple, found {}",
            field,
            other.type_name()
        )),
    }
}

fn names_field(field: &str, value: Value, offset: usize) -> Result<Vec<String>> {
    tuple_field(field, value, offset)?
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                malformed_object!(
                    offset,
                    "code {} must hold strings, found {}",
                    field,
                    item.type_name()
                )
            })
        })
        .collect()
}

fn str_field(field: &str, value: Value, offset: usize) -> Result<String> {
    match value {
        Value::Str(text) => Ok(text.to_string()),
        other => Err(malformed_object!(
            offset,
            "code {} must be a string, found {}",
            field,
            other.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::builder::CodeBuilder, Error};

    fn read(payload: &[u8]) -> Result<Value> {
        ObjectReader::new(payload, 16).read_object()
    }

    fn malformed_offset(result: Result<Value>) -> usize {
        match result {
            Err(Error::MalformedObject { offset, .. }) => offset,
            other => panic!("Expected MalformedObject, got {other:?}"),
        }
    }

    #[test]
    fn singletons() {
        assert_eq!(read(b"N").unwrap(), Value::None);
        assert_eq!(read(b"T").unwrap(), Value::True);
        assert_eq!(read(b"F").unwrap(), Value::False);
        assert_eq!(read(b"S").unwrap(), Value::StopIteration);
        assert_eq!(read(b".").unwrap(), Value::Ellipsis);
        assert_eq!(read(b"0").unwrap(), Value::Null);
    }

    #[test]
    fn numbers() {
        assert_eq!(read(&[b'i', 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), Value::Int(-1));

        let mut int64 = vec![b'I'];
        int64.extend_from_slice(&(1_i64 << 40).to_le_bytes());
        assert_eq!(read(&int64).unwrap(), Value::Int(1 << 40));

        let mut float = vec![b'g'];
        float.extend_from_slice(&2.5_f64.to_le_bytes());
        assert_eq!(read(&float).unwrap(), Value::Float(2.5));

        assert_eq!(read(b"f\x031.5").unwrap(), Value::Float(1.5));
        assert_eq!(read(b"x\x011\x03-2.").unwrap(), Value::Complex(1.0, -2.0));

        let mut complex = vec![b'y'];
        complex.extend_from_slice(&0.0_f64.to_le_bytes());
        complex.extend_from_slice(&3.0_f64.to_le_bytes());
        assert_eq!(read(&complex).unwrap().repr(), "3j");
    }

    #[test]
    fn longs() {
        // -(1 + 2 * 2**15)
        let small = [b'l', 0xFE, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x02, 0x00];
        assert_eq!(read(&small).unwrap(), Value::Int(-65537));

        // 2**75 needs six digits
        let mut big = vec![b'l', 6, 0, 0, 0];
        for digit in [0_u16, 0, 0, 0, 0, 1] {
            big.extend_from_slice(&digit.to_le_bytes());
        }
        assert_eq!(read(&big).unwrap().repr(), "37778931862957161709568");

        let bad_digit = [b'l', 1, 0, 0, 0, 0x00, 0x80];
        assert_eq!(malformed_offset(read(&bad_digit)), 16 + 5);
    }

    #[test]
    fn strings() {
        assert_eq!(read(b"z\x05hello").unwrap().repr(), "'hello'");
        assert_eq!(read(b"a\x02\x00\x00\x00hi").unwrap().repr(), "'hi'");
        assert_eq!(
            read(b"u\x03\x00\x00\x00\xC3\xA9!").unwrap(),
            Value::Str(Arc::from("\u{e9}!"))
        );
        assert_eq!(read(b"s\x02\x00\x00\x00\x00\x01").unwrap().repr(), "b'\\x00\\x01'");
    }

    #[test]
    fn containers() {
        assert_eq!(read(b")\x00").unwrap().repr(), "()");
        assert_eq!(
            read(b"[\x02\x00\x00\x00TF").unwrap().repr(),
            "[True, False]"
        );
        assert_eq!(
            read(b"{z\x01kN0").unwrap().repr(),
            "{'k': None}"
        );
        assert_eq!(read(b"<\x00\x00\x00\x00").unwrap().repr(), "set()");
        assert_eq!(read(b">\x01\x00\x00\x00N").unwrap().repr(), "frozenset({None})");
    }

    #[test]
    fn back_references() {
        // (flagged 'abc', ref 0)
        let payload = b")\x02\xDA\x03abcr\x00\x00\x00\x00";
        let mut reader = ObjectReader::new(payload, 16);
        let value = reader.read_object().unwrap();

        assert_eq!(value.repr(), "('abc', 'abc')");
        assert_eq!(reader.ref_count(), 1);
        match value {
            Value::Tuple(items) => match (&items[0], &items[1]) {
                (Value::Str(a), Value::Str(b)) => assert!(Arc::ptr_eq(a, b)),
                _ => panic!("Expected two strings"),
            },
            _ => panic!("Expected tuple"),
        }
    }

    #[test]
    fn back_reference_out_of_range() {
        let payload = b"r\x00\x00\x00\x00";
        assert_eq!(malformed_offset(read(payload)), 17);
    }

    #[test]
    fn back_reference_under_construction() {
        // flagged tuple that refers to itself
        let payload = b"\xA9\x01r\x00\x00\x00\x00";
        assert_eq!(malformed_offset(read(payload)), 19);
    }

    #[test]
    fn reserved_slots_follow_first_occurrence() {
        // flagged tuple (slot 0) holding a flagged string (slot 1), then a ref to slot 1
        let payload = b")\x02\xA9\x01\xDA\x01xr\x01\x00\x00\x00";
        let mut reader = ObjectReader::new(payload, 16);
        let value = reader.read_object().unwrap();

        assert_eq!(value.repr(), "(('x',), 'x')");
        assert_eq!(reader.ref_count(), 2);
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(malformed_offset(read(b"?")), 16);
        assert_eq!(malformed_offset(read(b")\x02N?")), 19);
    }

    #[test]
    fn truncated() {
        assert_eq!(malformed_offset(read(b"")), 16);
        assert_eq!(malformed_offset(read(b"i\x01\x00")), 17);
        assert_eq!(malformed_offset(read(b"s\x05\x00\x00\x00ab")), 21);
        assert_eq!(malformed_offset(read(b")\x03NN")), 20);
    }

    #[test]
    fn negative_length() {
        assert_eq!(malformed_offset(read(b"s\xFF\xFF\xFF\xFF")), 17);
    }

    #[test]
    fn invalid_utf8() {
        assert_eq!(malformed_offset(read(b"u\x02\x00\x00\x00a\xFF")), 22);
    }

    #[test]
    fn recursion_limit() {
        let mut payload = vec![b')', 1].repeat(10);
        payload.push(b'N');

        let mut reader = ObjectReader::new(&payload, 16).with_max_depth(5);
        assert!(matches!(reader.read_object(), Err(Error::RecursionLimit(5))));

        let mut reader = ObjectReader::new(&payload, 16).with_max_depth(11);
        assert!(reader.read_object().is_ok());
    }

    fn nested_tuples(count: usize) -> Vec<u8> {
        let mut payload = vec![b')', 1].repeat(count);
        payload.push(b'N');
        payload
    }

    #[test]
    fn default_limit_on_small_stack() {
        let result = std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(|| {
                // None sits at nesting level DEFAULT_MAX_DEPTH - 1, the deepest one allowed
                let deepest = nested_tuples(DEFAULT_MAX_DEPTH - 1);
                let value = ObjectReader::new(&deepest, 16).read_object().unwrap();
                let repr = value.repr();
                assert!(repr.starts_with("(((("));
                assert!(repr.contains("..."));
                drop(value);

                let too_deep = nested_tuples(DEFAULT_MAX_DEPTH);
                assert!(matches!(
                    ObjectReader::new(&too_deep, 16).read_object(),
                    Err(Error::RecursionLimit(DEFAULT_MAX_DEPTH))
                ));
            })
            .unwrap()
            .join();

        assert!(result.is_ok());
    }

    #[test]
    fn nested_containers_close_in_order() {
        // [(1, {'k': (None,)}), 2]
        let payload = b"[\x02\x00\x00\x00)\x02i\x01\x00\x00\x00{z\x01k)\x01N0i\x02\x00\x00\x00";
        assert_eq!(read(payload).unwrap().repr(), "[(1, {'k': (None,)}), 2]");
    }

    #[test]
    fn null_inside_containers() {
        assert_eq!(malformed_offset(read(b")\x02N0")), 19);
        assert_eq!(malformed_offset(read(b"{N0")), 18);
    }

    #[test]
    fn code_object() {
        let payload = CodeBuilder::new("f")
            .code(&[100, 0, 83, 0])
            .consts(vec![crate::test::builder::Obj::Int(7)])
            .varnames(&["x"])
            .argcount(1)
            .firstlineno(3)
            .serialize();

        let mut reader = ObjectReader::new(&payload, 16);
        let code = reader.read_root().unwrap();

        assert_eq!(code.name, "f");
        assert_eq!(code.argcount, 1);
        assert_eq!(code.firstlineno, 3);
        assert_eq!(&code.code[..], &[100, 0, 83, 0]);
        assert_eq!(code.consts, vec![Value::Int(7)]);
        assert_eq!(code.varnames, vec!["x".to_string()]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn non_code_root() {
        let mut reader = ObjectReader::new(b"N", 16);
        assert!(matches!(
            reader.read_root(),
            Err(Error::UnexpectedRootType("NoneType"))
        ));
    }

    #[test]
    fn code_field_type_checked() {
        // code record whose instruction field is None
        let mut payload = vec![b'c'];
        for _ in 0..5 {
            payload.extend_from_slice(&0_i32.to_le_bytes());
        }
        payload.push(b'N');

        assert_eq!(malformed_offset(read(&payload)), 16 + 21);
    }
}
