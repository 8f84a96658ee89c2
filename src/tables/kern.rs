//! `kern` table parsing and writing.
//!
//! Only format 0 sub-tables (sorted pair lists) are retained; other formats are
//! skipped on read.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/kern>

use std::convert::TryFrom;

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, U16Be, U32Be, U8};
use crate::error::{ParseError, WriteError};

/// `kern` Kerning Table.
#[derive(Debug, Clone, PartialEq)]
pub struct KernTable {
    pub subtables: Vec<KernSubtable>,
}

/// A format 0 sub-table within the `kern` table.
#[derive(Debug, Clone, PartialEq)]
pub struct KernSubtable {
    /// Coverage flags (low byte of the coverage field).
    pub coverage: u8,
    /// Pairs sorted by key.
    pub pairs: Vec<KernPair>,
}

/// Kerning value for a glyph pair.
///
/// The key packs the left glyph id in the high 16 bits and the right glyph id in
/// the low 16 bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernPair {
    pub key: u32,
    pub value: i16,
}

impl KernSubtable {
    /// Bit 1 of coverage: the values are minimums rather than kerning adjustments.
    pub fn is_minimum(&self) -> bool {
        self.coverage & 0b10 != 0
    }

    /// Look up the adjustment for the pair `(left, right)`, 0 when absent.
    pub fn get(&self, left: u16, right: u16) -> i16 {
        let key = KernPair::key(left, right);
        match self.pairs.binary_search_by_key(&key, |pair| pair.key) {
            Ok(index) => self.pairs[index].value,
            Err(_) => 0,
        }
    }
}

impl KernPair {
    pub fn key(left: u16, right: u16) -> u32 {
        (u32::from(left) << 16) | u32::from(right)
    }

    pub fn left(&self) -> u16 {
        (self.key >> 16) as u16
    }

    pub fn right(&self) -> u16 {
        (self.key & 0xFFFF) as u16
    }
}

impl KernTable {
    /// Total kerning for the pair `(left, right)`.
    ///
    /// Kerning sub-tables accumulate; a minimum sub-table clamps the accumulated value
    /// from below.
    pub fn kerning(&self, left: u16, right: u16) -> i16 {
        let mut kerning = 0;
        for subtable in &self.subtables {
            if !subtable.is_minimum() {
                kerning += subtable.get(left, right);
            } else {
                let min = subtable.get(left, right);
                if kerning < min {
                    kerning = min;
                }
            }
        }
        kerning
    }

    pub fn is_empty(&self) -> bool {
        self.subtables.is_empty()
    }
}

impl<'b> ReadBinary<'b> for KernTable {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'b>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        let n_tables = match major_version {
            0 => u32::from(ctxt.read_u16be()?),
            1 => {
                let minor_version = ctxt.read_u16be()?;
                ctxt.check_version(minor_version == 0)?;
                ctxt.read_u32be()?
            }
            _ => return Err(ParseError::BadVersion),
        };

        let mut subtables = Vec::new();
        for i in 0..n_tables {
            let subtable_version = ctxt.read_u16be()?;
            let length = ctxt.read_u16be()?;
            let format = ctxt.read_u8()?;
            let coverage = ctxt.read_u8()?;
            if subtable_version != 0 || format != 0 {
                // Skip unsupported sub-table versions/formats
                let body = usize::from(length).saturating_sub(6);
                let _skipped = ctxt.read_slice(body)?;
                continue;
            }

            let n_pairs = ctxt.read_u16be()?;
            let _search_range = ctxt.read_u16be()?;
            let _entry_selector = ctxt.read_u16be()?;
            let _range_shift = ctxt.read_u16be()?;

            // Some fonts have sub-tables whose pair data exceeds what fits in the 16-bit
            // length field. Only the last sub-table may exceed, as long as the pairs fit
            // within the table itself.
            let pairs_length = 6 * usize::from(n_pairs);
            if usize::from(length) < 14 + pairs_length && i + 1 != n_tables {
                return Err(ParseError::BadValue);
            }

            let mut sorted = true;
            let mut pairs = Vec::with_capacity(usize::from(n_pairs));
            for _ in 0..n_pairs {
                let key = ctxt.read_u32be()?;
                let value = ctxt.read_i16be()?;
                if let Some(last) = pairs.last() {
                    let last: &KernPair = last;
                    if key <= last.key {
                        sorted = false;
                    }
                }
                pairs.push(KernPair { key, value });
            }
            if !sorted {
                // Some fonts fail to sort the pairs; sort them here so lookup can bisect
                warn!("kern pairs out of order, sorting");
                pairs.sort_by_key(|pair| pair.key);
            }

            // Consume trailing bytes when the declared length is larger
            let consumed = 14 + pairs_length;
            if usize::from(length) > consumed {
                let _skipped = ctxt.read_slice(usize::from(length) - consumed)?;
            }

            subtables.push(KernSubtable { coverage, pairs });
        }

        Ok(KernTable { subtables })
    }
}

impl WriteBinary<&Self> for KernTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, kern: &KernTable) -> Result<(), WriteError> {
        U16Be::write(ctxt, 0u16)?; // version
        U16Be::write(ctxt, u16::try_from(kern.subtables.len())?)?; // nTables
        for subtable in &kern.subtables {
            let n_pairs = u16::try_from(subtable.pairs.len())?;
            let length = 6u16
                .checked_add(8)
                .and_then(|header| header.checked_add(n_pairs.checked_mul(6)?))
                .ok_or(WriteError::BadValue)?;

            U16Be::write(ctxt, 0u16)?; // version
            U16Be::write(ctxt, length)?;
            U8::write(ctxt, 0u8)?; // format
            U8::write(ctxt, subtable.coverage)?;

            let entry_selector = 15u16.saturating_sub(n_pairs.leading_zeros() as u16);
            let search_range = (1 << entry_selector) * 6;
            U16Be::write(ctxt, n_pairs)?;
            U16Be::write(ctxt, search_range)?;
            U16Be::write(ctxt, entry_selector)?;
            U16Be::write(ctxt, (n_pairs * 6).saturating_sub(search_range))?;
            for pair in &subtable.pairs {
                U32Be::write(ctxt, pair.key)?;
                I16Be::write(ctxt, pair.value)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::WriteBuffer;

    pub(crate) fn kern_fixture() -> KernTable {
        KernTable {
            subtables: vec![KernSubtable {
                coverage: 0b1, // horizontal kerning values
                pairs: vec![
                    KernPair {
                        key: KernPair::key(1, 2),
                        value: -30,
                    },
                    KernPair {
                        key: KernPair::key(1, 3),
                        value: 15,
                    },
                    KernPair {
                        key: KernPair::key(4, 2),
                        value: -10,
                    },
                ],
            }],
        }
    }

    #[test]
    fn round_trip() {
        let kern = kern_fixture();

        let mut ctxt = WriteBuffer::new();
        KernTable::write(&mut ctxt, &kern).unwrap();

        let read_back = ReadScope::new(ctxt.bytes()).read::<KernTable>().unwrap();
        assert_eq!(read_back, kern);
    }

    #[test]
    fn pair_lookup() {
        let kern = kern_fixture();
        assert_eq!(kern.kerning(1, 2), -30);
        assert_eq!(kern.kerning(1, 3), 15);
        assert_eq!(kern.kerning(2, 1), 0);
    }

    #[test]
    fn minimum_subtable_clamps() {
        let mut kern = kern_fixture();
        kern.subtables.push(KernSubtable {
            coverage: 0b11, // minimum values
            pairs: vec![KernPair {
                key: KernPair::key(1, 2),
                value: -20,
            }],
        });
        // -30 from the kerning subtable is clamped up to the -20 minimum
        assert_eq!(kern.kerning(1, 2), -20);
    }

    #[test]
    fn unsorted_pairs_are_sorted_on_read() {
        let kern = KernTable {
            subtables: vec![KernSubtable {
                coverage: 1,
                pairs: vec![
                    KernPair {
                        key: KernPair::key(9, 9),
                        value: 1,
                    },
                    KernPair {
                        key: KernPair::key(1, 1),
                        value: 2,
                    },
                ],
            }],
        };

        let mut ctxt = WriteBuffer::new();
        KernTable::write(&mut ctxt, &kern).unwrap();

        let read_back = ReadScope::new(ctxt.bytes()).read::<KernTable>().unwrap();
        assert_eq!(read_back.kerning(1, 1), 2);
        assert_eq!(read_back.kerning(9, 9), 1);
    }
}
