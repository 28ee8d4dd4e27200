//! Bitfield map of jump targets within one code unit.
//!
//! The [`JumpTargetMap`] struct records which byte offsets of a unit are the destination of a
//! jump. It is filled from the decoded instructions and then consulted to set
//! [`crate::disassembler::Instruction::is_jump_target`].

use crate::disassembler::Instruction;

/// This structure tracks the byte offsets of a code unit that some jump lands on
pub struct JumpTargetMap {
    data: Vec<usize>,
    elements: usize,
    bitfield_size: usize,
}

impl JumpTargetMap {
    /// Create a new, empty instance of the `JumpTargetMap`
    ///
    /// ## Arguments
    /// * 'elements' - The amount of bytes to track, i.e. the length of the instruction stream
    pub fn new(elements: usize) -> JumpTargetMap {
        let bitfield_size = usize::BITS as usize;

        JumpTargetMap {
            data: vec![0_usize; elements.div_ceil(bitfield_size)],
            elements,
            bitfield_size,
        }
    }

    /// Collect the targets of all jumps in `instructions`
    ///
    /// Targets at or beyond `elements` are not recorded.
    ///
    /// ## Arguments
    /// * 'instructions' - The decoded instructions of one unit
    /// * 'elements'     - The length of the unit's instruction stream
    pub fn from_instructions(instructions: &[Instruction], elements: usize) -> JumpTargetMap {
        let mut map = JumpTargetMap::new(elements);
        for target in instructions
            .iter()
            .filter_map(|instruction| instruction.argval.as_ref()?.jump_target())
        {
            map.mark(target);
        }
        map
    }

    /// Returns the max amount of elements this instance can track
    pub fn len(&self) -> usize {
        self.elements
    }

    /// Check if the map is empty (has no trackable elements)
    pub fn is_empty(&self) -> bool {
        self.elements == 0
    }

    /// Record `element` as a jump target, returns false if it is out of range
    ///
    /// # Arguments
    /// * 'element' - The byte offset to mark
    pub fn mark(&mut self, element: usize) -> bool {
        if element >= self.elements {
            return false;
        }

        let shift_amount = u32::try_from(element % self.bitfield_size).unwrap_or(0);
        match self.data.get_mut(element / self.bitfield_size) {
            Some(bitfield) => {
                *bitfield |= 1_usize.wrapping_shl(shift_amount);
                true
            }
            None => false,
        }
    }

    /// Check if a certain byte offset is a jump target
    ///
    /// # Arguments
    /// * 'element' - The byte offset that should be looked up
    pub fn contains(&self, element: usize) -> bool {
        if element >= self.elements {
            return false;
        }

        if let Some(bitfield) = self.data.get(element / self.bitfield_size) {
            let shift_amount = u32::try_from(element % self.bitfield_size).unwrap_or(0);
            return (bitfield.wrapping_shr(shift_amount) & 1_usize) != 0;
        }

        false
    }

    /// Number of distinct marked offsets
    pub fn count(&self) -> usize {
        self.data
            .iter()
            .map(|bitfield| bitfield.count_ones() as usize)
            .sum()
    }

    /// Set `is_jump_target` on every instruction according to this map
    ///
    /// An instruction is marked exactly when a jump resolves to its offset; a jump into the
    /// middle of an instruction marks nothing. Flags are overwritten, not accumulated, so
    /// applying the same map again yields the same result. Returns the number of instructions
    /// marked.
    pub fn apply(&self, instructions: &mut [Instruction]) -> usize {
        let mut marked = 0;
        for instruction in instructions {
            instruction.is_jump_target = self.contains(instruction.offset);
            if instruction.is_jump_target {
                marked += 1;
            }
        }
        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create() {
        let map = JumpTargetMap::new(4096);
        assert_eq!(map.len(), 4096);
        assert!(!map.is_empty());
        assert_eq!(map.count(), 0);

        assert!(JumpTargetMap::new(0).is_empty());
    }

    #[test]
    fn mark_and_lookup() {
        let mut map = JumpTargetMap::new(200);

        assert!(map.mark(0));
        assert!(map.mark(64));
        assert!(map.mark(130));
        assert!(map.mark(130));

        assert!(map.contains(0));
        assert!(map.contains(64));
        assert!(map.contains(130));
        assert!(!map.contains(2));
        assert_eq!(map.count(), 3);
    }

    #[test]
    fn out_of_range() {
        let mut map = JumpTargetMap::new(10);

        assert!(!map.mark(10));
        assert!(!map.mark(usize::MAX));
        assert!(!map.contains(10));
        assert_eq!(map.count(), 0);
    }

    #[test]
    fn bitfield_boundaries() {
        let bits = usize::BITS as usize;
        let mut map = JumpTargetMap::new(bits * 2 + 1);

        assert!(map.mark(bits - 1));
        assert!(map.mark(bits));
        assert!(map.mark(bits * 2));

        assert!(map.contains(bits - 1));
        assert!(map.contains(bits));
        assert!(map.contains(bits * 2));
        assert!(!map.contains(bits + 1));
        assert_eq!(map.count(), 3);
    }
}
