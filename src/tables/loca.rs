//! Parsing and writing of the `loca` table.
//!
//! > The indexToLoc table stores the offsets to the locations of the glyphs in the font, relative
//! > to the beginning of the glyphData table.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{U16Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::tables::IndexToLocFormat;

/// `loca` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>
#[derive(Clone, Debug)]
pub struct LocaTable<'a> {
    pub offsets: LocaOffsets<'a>,
}

#[derive(Clone, Debug)]
pub enum LocaOffsets<'a> {
    Short(ReadArray<'a, U16Be>),
    Long(ReadArray<'a, U32Be>),
}

impl<'a> ReadBinaryDep<'a> for LocaTable<'a> {
    type Args = (usize, IndexToLocFormat);
    type HostType = Self;

    /// Read a `loca` table from `ctxt`
    ///
    /// * `num_glyphs` is the number of glyphs in the font, from the `maxp` table.
    /// * `index_to_loc_format` specifies whether the offsets in the `loca` table are short or
    ///   long, from the `head` table.
    fn read_dep(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, index_to_loc_format): (usize, IndexToLocFormat),
    ) -> Result<Self, ParseError> {
        let offsets = match index_to_loc_format {
            IndexToLocFormat::Short => {
                // The actual local offset divided by 2 is stored. The value of n is numGlyphs + 1.
                LocaOffsets::Short(ctxt.read_array::<U16Be>(num_glyphs + 1)?)
            }
            IndexToLocFormat::Long => {
                // The actual local offset is stored. The value of n is numGlyphs + 1.
                LocaOffsets::Long(ctxt.read_array::<U32Be>(num_glyphs + 1)?)
            }
        };

        Ok(LocaTable { offsets })
    }
}

impl<'a> WriteBinary<&Self> for LocaTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, loca: &LocaTable<'a>) -> Result<(), WriteError> {
        match &loca.offsets {
            LocaOffsets::Long(array) => ctxt.write_array(array),
            LocaOffsets::Short(array) => ctxt.write_array(array),
        }?;

        Ok(())
    }
}

impl<'a> LocaTable<'a> {
    pub fn empty() -> Self {
        LocaTable {
            offsets: LocaOffsets::Long(ReadArray::empty()),
        }
    }
}

impl<'a> LocaOffsets<'a> {
    /// Iterate the offsets in this table.
    pub fn iter(&self) -> impl Iterator<Item = u32> + use<'_, 'a> {
        // NOTE(unwrap): Safe as iteration is bounded by len
        (0..self.len()).map(move |index| self.get(index).unwrap())
    }

    /// Returns the number of offsets in the table.
    pub fn len(&self) -> usize {
        match self {
            LocaOffsets::Short(array) => array.len(),
            LocaOffsets::Long(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a specified offset from the table at `index`.
    pub fn get(&self, index: usize) -> Option<u32> {
        if index >= self.len() {
            return None;
        }
        match self {
            LocaOffsets::Short(array) => Some(u32::from(array.get_item(index)) * 2),
            LocaOffsets::Long(array) => Some(array.get_item(index)),
        }
    }

    /// Get the last offset in the table.
    ///
    /// Returns `None` if the table is empty.
    pub fn last(&self) -> Option<u32> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }
}

pub mod owned {
    use std::convert::TryFrom;

    use super::{IndexToLocFormat, U16Be, U32Be, WriteContext, WriteError};
    use crate::binary::write::{WriteBinary, WriteBinaryDep};

    pub struct LocaTable {
        pub offsets: Vec<u32>,
    }

    impl LocaTable {
        pub fn new() -> Self {
            LocaTable {
                offsets: Vec::new(),
            }
        }

        /// Pick the smallest `loca` format that can represent these offsets.
        pub fn index_to_loc_format(&self) -> IndexToLocFormat {
            match self.offsets.last() {
                Some(&last) if last <= 2 * u32::from(u16::MAX) => IndexToLocFormat::Short,
                _ => IndexToLocFormat::Long,
            }
        }
    }

    impl Default for LocaTable {
        fn default() -> Self {
            LocaTable::new()
        }
    }

    impl WriteBinaryDep<Self> for LocaTable {
        type Output = ();
        type Args = IndexToLocFormat;

        fn write_dep<C: WriteContext>(
            ctxt: &mut C,
            loca: LocaTable,
            index_to_loc_format: Self::Args,
        ) -> Result<(), WriteError> {
            // 0 for short offsets (Offset16), 1 for long (Offset32).
            match index_to_loc_format {
                IndexToLocFormat::Short => {
                    match loca.offsets.last() {
                        Some(&last) if (last / 2) > u32::from(std::u16::MAX) => {
                            return Err(WriteError::BadValue)
                        }
                        _ => {}
                    }

                    // The actual loca offset divided by 2 is stored.
                    // https://docs.microsoft.com/en-us/typography/opentype/spec/loca#short-version
                    for offset in loca.offsets {
                        if offset & 1 == 1 {
                            // odd offsets can't use this format
                            return Err(WriteError::BadValue);
                        }
                        let short_offset = u16::try_from(offset / 2)?;
                        U16Be::write(ctxt, short_offset)?;
                    }

                    Ok(())
                }
                IndexToLocFormat::Long => ctxt.write_vec::<U32Be, _>(loca.offsets),
            }
        }
    }

    impl<'a, 'b: 'a> From<&'b super::LocaTable<'a>> for LocaTable {
        fn from(loca: &'b super::LocaTable<'a>) -> Self {
            Self {
                offsets: loca.offsets.iter().collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::{buffer, WriteBinaryDep};

    #[test]
    fn short_offsets_are_doubled() {
        let loca = owned::LocaTable {
            offsets: vec![0, 12, 12, 64],
        };
        let ((), data) =
            buffer::<_, owned::LocaTable>(loca, IndexToLocFormat::Short).unwrap();

        let read_back = ReadScope::new(data.bytes())
            .read_dep::<LocaTable<'_>>((3, IndexToLocFormat::Short))
            .unwrap();
        assert_eq!(
            read_back.offsets.iter().collect::<Vec<_>>(),
            vec![0, 12, 12, 64]
        );
    }

    #[test]
    fn odd_offset_rejected_in_short_format() {
        let loca = owned::LocaTable {
            offsets: vec![0, 13],
        };
        assert!(buffer::<_, owned::LocaTable>(loca, IndexToLocFormat::Short).is_err());
    }

    #[test]
    fn format_choice_by_size() {
        let small = owned::LocaTable {
            offsets: vec![0, 2 * u32::from(u16::MAX)],
        };
        assert_eq!(small.index_to_loc_format(), IndexToLocFormat::Short);

        let large = owned::LocaTable {
            offsets: vec![0, 2 * u32::from(u16::MAX) + 2],
        };
        assert_eq!(large.index_to_loc_format(), IndexToLocFormat::Long);
    }
}
