//! # Decode tables
//!
//! Both instruction sets are classified with an ordered list of
//! `(mask, pattern, family)` entries: the first entry for which
//! `opcode & mask == pattern` wins. Several families overlap (BX looks like
//! a data processing instruction, SWP looks like a halfword transfer) so
//! the order of each table is part of its meaning.

use crate::error::CpuErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeEntry<W, F> {
    pub mask: W,
    pub pattern: W,
    pub family: F,
}

impl<W, F> DecodeEntry<W, F>
where
    W: Copy + PartialEq + std::ops::BitAnd<Output = W>,
{
    pub const fn new(mask: W, pattern: W, family: F) -> Self {
        Self {
            mask,
            pattern,
            family,
        }
    }

    pub fn matches(&self, op_code: W) -> bool {
        op_code & self.mask == self.pattern
    }
}

/// First family in `table` matching `op_code`.
pub fn classify<W, F>(table: &[DecodeEntry<W, F>], op_code: W) -> Option<F>
where
    W: Copy + PartialEq + std::ops::BitAnd<Output = W>,
    F: Copy,
{
    table
        .iter()
        .find(|entry| entry.matches(op_code))
        .map(|entry| entry.family)
}

/// Why an opcode could not be turned into an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFault {
    NoMatch,
    Malformed(&'static str),
}

impl From<DecodeFault> for CpuErrorKind {
    fn from(fault: DecodeFault) -> Self {
        match fault {
            DecodeFault::NoMatch => Self::DecodeError,
            DecodeFault::Malformed(reason) => Self::MalformedEncoding(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_first_match_wins() {
        let table = [
            DecodeEntry::new(0xFF_u16, 0x12, 'a'),
            DecodeEntry::new(0xF0_u16, 0x10, 'b'),
        ];
        assert_eq!(classify(&table, 0x12), Some('a'));
        assert_eq!(classify(&table, 0x13), Some('b'));
        assert_eq!(classify(&table, 0x20), None);
    }
}
