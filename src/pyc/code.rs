//! The code unit record.
//!
//! A [`CodeUnit`] is one compiled function, class body, comprehension or module body. Its
//! constant pool may hold further code units, which is how nesting is expressed.

use std::sync::Arc;

use bitflags::bitflags;

use crate::pyc::Value;

bitflags! {
    /// The `co_flags` word of a code unit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CodeFlags: u32 {
        /// Locals are stored in fast slots
        const OPTIMIZED = 0x0001;
        /// A new locals dictionary is created per call
        const NEWLOCALS = 0x0002;
        /// Accepts `*args`
        const VARARGS = 0x0004;
        /// Accepts `**kwargs`
        const VARKEYWORDS = 0x0008;
        /// Defined inside another function
        const NESTED = 0x0010;
        /// A generator function
        const GENERATOR = 0x0020;
        /// Has neither free nor cell variables
        const NOFREE = 0x0040;
        /// An `async def` function
        const COROUTINE = 0x0080;
        /// A generator decorated to be awaitable
        const ITERABLE_COROUTINE = 0x0100;
        /// An async generator
        const ASYNC_GENERATOR = 0x0200;
    }
}

impl CodeFlags {
    /// Names of the known flags that are set, in the style of `dis.pretty_flags`
    ///
    /// Bits without a known name are rendered as hex.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .iter_names()
            .map(|(name, _)| name.to_string())
            .collect();

        let unknown = self.bits() & !CodeFlags::all().bits();
        if unknown != 0 {
            names.push(format!("0x{unknown:x}"));
        }
        names
    }
}

/// One decoded code object
#[derive(Debug, Clone, PartialEq)]
pub struct CodeUnit {
    /// Number of positional parameters
    pub argcount: u32,
    /// Number of keyword-only parameters
    pub kwonlyargcount: u32,
    /// Number of local variables
    pub nlocals: u32,
    /// Maximum depth of the evaluation stack
    pub stacksize: u32,
    /// Code flags, unknown bits retained
    pub flags: CodeFlags,
    /// Raw instruction bytes
    pub code: Arc<[u8]>,
    /// The constant pool
    pub consts: Vec<Value>,
    /// Names used by attribute and global access
    pub names: Vec<String>,
    /// Local variable names, parameters first
    pub varnames: Vec<String>,
    /// Variables captured from enclosing scopes
    pub freevars: Vec<String>,
    /// Local variables captured by nested scopes
    pub cellvars: Vec<String>,
    /// Source file the unit was compiled from
    pub filename: String,
    /// Name of the function, class or module
    pub name: String,
    /// First source line of the unit
    pub firstlineno: u32,
    /// Raw line number table (`co_lnotab`)
    pub lnotab: Arc<[u8]>,
}

impl CodeUnit {
    /// Iterates over the constant pool entries that are code units themselves, in pool order
    pub fn nested_units(&self) -> impl Iterator<Item = &Arc<CodeUnit>> {
        self.consts.iter().filter_map(Value::as_code)
    }

    /// Number of entries addressable by free-variable opcodes (cell variables, then free ones)
    #[must_use]
    pub fn cell_and_free_len(&self) -> usize {
        self.cellvars.len() + self.freevars.len()
    }

    /// Resolves a free-variable operand, which indexes cell variables first and free ones after
    #[must_use]
    pub fn cell_or_free(&self, index: usize) -> Option<&str> {
        if index < self.cellvars.len() {
            return Some(&self.cellvars[index]);
        }

        self.freevars
            .get(index - self.cellvars.len())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(cellvars: &[&str], freevars: &[&str]) -> CodeUnit {
        CodeUnit {
            argcount: 0,
            kwonlyargcount: 0,
            nlocals: 0,
            stacksize: 1,
            flags: CodeFlags::NOFREE,
            code: Arc::from(&[100, 0, 83, 0][..]),
            consts: vec![Value::None],
            names: Vec::new(),
            varnames: Vec::new(),
            freevars: freevars.iter().map(ToString::to_string).collect(),
            cellvars: cellvars.iter().map(ToString::to_string).collect(),
            filename: "test.py".to_string(),
            name: "<module>".to_string(),
            firstlineno: 1,
            lnotab: Arc::from(&[][..]),
        }
    }

    #[test]
    fn cell_then_free() {
        let unit = unit(&["a", "b"], &["c"]);

        assert_eq!(unit.cell_and_free_len(), 3);
        assert_eq!(unit.cell_or_free(0), Some("a"));
        assert_eq!(unit.cell_or_free(1), Some("b"));
        assert_eq!(unit.cell_or_free(2), Some("c"));
        assert_eq!(unit.cell_or_free(3), None);
    }

    #[test]
    fn nested_units_in_pool_order() {
        let first = Arc::new(unit(&[], &[]));
        let second = Arc::new(unit(&[], &[]));

        let mut outer = unit(&[], &[]);
        outer.consts = vec![
            Value::Code(first.clone()),
            Value::None,
            Value::Code(second.clone()),
        ];

        let nested: Vec<_> = outer.nested_units().collect();
        assert_eq!(nested.len(), 2);
        assert!(Arc::ptr_eq(nested[0], &first));
        assert!(Arc::ptr_eq(nested[1], &second));
    }

    #[test]
    fn flag_names() {
        let flags = CodeFlags::OPTIMIZED | CodeFlags::NEWLOCALS | CodeFlags::from_bits_retain(0x4000);
        assert_eq!(flags.names(), vec!["OPTIMIZED", "NEWLOCALS", "0x4000"]);
    }
}
