//! Line number attribution from the `co_lnotab` table.
//!
//! The table is a sequence of `(byte increment, line increment)` pairs; the byte increment is
//! unsigned, the line increment a signed byte. [`LineStarts::parse`] walks it the same way
//! `dis.findlinestarts` does and records each offset at which a new source line begins.

use std::{collections::BTreeMap, ops::Range};

use crate::Result;

/// Offsets at which a new source line starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineStarts {
    starts: BTreeMap<usize, u32>,
}

impl LineStarts {
    /// Decode a line number table
    ///
    /// An empty table attributes offset 0 to `firstlineno`. A trailing odd byte is ignored.
    ///
    /// # Arguments
    /// * `lnotab`      - The raw table
    /// * `firstlineno` - The first line of the code unit
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the line number drops below zero.
    pub fn parse(lnotab: &[u8], firstlineno: u32) -> Result<LineStarts> {
        let mut starts = BTreeMap::new();
        let mut last_line: Option<i64> = None;
        let mut line = i64::from(firstlineno);
        let mut addr = 0_usize;

        for pair in lnotab.chunks_exact(2) {
            let byte_incr = usize::from(pair[0]);
            let line_incr = i64::from(pair[1] as i8);

            if byte_incr != 0 {
                if last_line != Some(line) {
                    starts.insert(addr, Self::checked_line(line, addr)?);
                    last_line = Some(line);
                }
                addr += byte_incr;
            }
            line += line_incr;
        }

        if last_line != Some(line) {
            starts.insert(addr, Self::checked_line(line, addr)?);
        }

        Ok(LineStarts { starts })
    }

    fn checked_line(line: i64, addr: usize) -> Result<u32> {
        u32::try_from(line).map_err(|_| {
            malformed_error!("Line number {} at offset {} is out of range", line, addr)
        })
    }

    /// The line starting exactly at `offset`
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<u32> {
        self.starts.get(&offset).copied()
    }

    /// The first line starting within `range`
    #[must_use]
    pub fn first_in(&self, range: Range<usize>) -> Option<u32> {
        self.starts.range(range).next().map(|(_, line)| *line)
    }

    /// Iterates over `(offset, line)` pairs in offset order
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.starts.iter().map(|(offset, line)| (*offset, *line))
    }

    /// Number of line starts
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Returns true if no line starts are recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn empty_table() {
        let starts = LineStarts::parse(&[], 7).unwrap();
        assert_eq!(starts.iter().collect::<Vec<_>>(), vec![(0, 7)]);
    }

    #[test]
    fn sequential_lines() {
        // line 1 at 0, line 2 at 4, line 4 at 10
        let starts = LineStarts::parse(&[4, 1, 6, 2], 1).unwrap();
        assert_eq!(
            starts.iter().collect::<Vec<_>>(),
            vec![(0, 1), (4, 2), (10, 4)]
        );
        assert_eq!(starts.get(4), Some(2));
        assert_eq!(starts.get(6), None);
        assert_eq!(starts.first_in(2..6), Some(2));
        assert_eq!(starts.first_in(6..10), None);
    }

    #[test]
    fn negative_increment() {
        // line 5 at 0, back to line 3 at 8
        let starts = LineStarts::parse(&[8, 0xFE], 5).unwrap();
        assert_eq!(starts.iter().collect::<Vec<_>>(), vec![(0, 5), (8, 3)]);
    }

    #[test]
    fn split_increments() {
        // a line jump of 300 is encoded as several pairs with a zero byte increment
        let starts = LineStarts::parse(&[0, 127, 0, 127, 2, 46, 2, 1], 1).unwrap();
        assert_eq!(
            starts.iter().collect::<Vec<_>>(),
            vec![(0, 255), (2, 301), (4, 302)]
        );
    }

    #[test]
    fn large_byte_increment() {
        // 300 bytes of one line are encoded as (255, 0), (45, 1)
        let starts = LineStarts::parse(&[255, 0, 45, 1], 1).unwrap();
        assert_eq!(starts.iter().collect::<Vec<_>>(), vec![(0, 1), (300, 2)]);
    }

    #[test]
    fn odd_length_ignores_tail() {
        let starts = LineStarts::parse(&[2, 1, 9], 1).unwrap();
        assert_eq!(starts.len(), 2);
    }

    #[test]
    fn negative_line_rejected() {
        let result = LineStarts::parse(&[2, 0xF0], 1);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
