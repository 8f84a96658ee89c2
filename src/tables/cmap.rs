//! Parsing and writing of the `cmap` table.
//!
//! > This table defines the mapping of character codes to the glyph index values used in the font.
//! > It may contain more than one subtable, in order to support more than one character encoding
//! > scheme.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::OnceLock;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, U16Be, U32Be, U8};
use crate::error::{ParseError, WriteError};
use crate::size;
use crate::MAX_CMAP_SEGMENTS;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
    pub const CUSTOM: PlatformId = PlatformId(4);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const WINDOWS_SYMBOL: EncodingId = EncodingId(0);
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
    pub const WINDOWS_UNICODE_UCS4: EncodingId = EncodingId(10);

    pub const MACINTOSH_APPLE_ROMAN: EncodingId = EncodingId(0);

    pub const UNICODE_BMP: EncodingId = EncodingId(3);
    pub const UNICODE_FULL: EncodingId = EncodingId(4);
}

pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Copy, Clone)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

pub enum CmapSubtable<'a> {
    Format0 {
        language: u16,
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format4 {
        language: u16,
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format6 {
        language: u16,
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        language: u32,
        groups: ReadArray<'a, SequentialMapGroup>,
    },
}

/// A parsed cmap subtable together with a lazily built glyph → character reverse map.
///
/// The reverse map keeps the first character found for each glyph and is built at most
/// once, even when shared between threads.
pub struct CmapMappings<'a> {
    pub subtable: CmapSubtable<'a>,
    reverse: OnceLock<HashMap<u16, u32>>,
}

#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
struct Format4Calculator {
    seg_count: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
pub struct SequentialMapGroup {
    pub start_char_code: u32,
    pub end_char_code: u32,
    pub start_glyph_id: u32,
}

impl<'a> ReadBinary<'a> for Cmap<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl<'a> ReadFrom<'a> for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);
    fn from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl<'a> ReadBinary<'a> for CmapSubtable<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                ctxt.check(length >= 3 * size::U16 + 256)?;
                let language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_array::<U8>(256)?;
                Ok(CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                })
            }
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                ctxt.check_limit(seg_count <= MAX_CMAP_SEGMENTS)?;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                ctxt.check(length >= (8 + (4 * seg_count)) * size::U16)?;
                let remaining = length - ((8 + (4 * seg_count)) * size::U16);
                ctxt.check((remaining & 1) == 0)?;
                let num_indices = remaining >> 1;
                let glyph_id_array = ctxt.read_array_upto::<U16Be>(num_indices)?;

                // Segments must be sorted in order of increasing end code and the final
                // segment must map 0xFFFF
                ctxt.check(end_codes.last() == Some(0xFFFF))?;
                let mut prev_end = None;
                for (start, end) in start_codes.iter().zip(end_codes.iter()) {
                    ctxt.check(start <= end)?;
                    if let Some(prev_end) = prev_end {
                        ctxt.check(prev_end < start)?;
                    }
                    prev_end = Some(end);
                }

                Ok(CmapSubtable::Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_id_array,
                })
            }
            12 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                ctxt.check_limit(num_groups <= MAX_CMAP_SEGMENTS)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;

                // Groups must be strictly increasing by start code
                let mut prev_end = None;
                for group in groups.iter() {
                    ctxt.check(group.start_char_code <= group.end_char_code)?;
                    if let Some(prev_end) = prev_end {
                        ctxt.check(prev_end < group.start_char_code)?;
                    }
                    prev_end = Some(group.end_char_code);
                }

                Ok(CmapSubtable::Format12 { language, groups })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> ReadFrom<'a> for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);
    fn from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

impl WriteBinary for SequentialMapGroup {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, group: SequentialMapGroup) -> Result<(), WriteError> {
        U32Be::write(ctxt, group.start_char_code)?;
        U32Be::write(ctxt, group.end_char_code)?;
        U32Be::write(ctxt, group.start_glyph_id)?;

        Ok(())
    }
}

impl<'a> Cmap<'a> {
    pub fn encoding_records(&self) -> impl Iterator<Item = EncodingRecord> + 'a {
        self.encoding_records.iter()
    }

    /// Find the first encoding record for the given platform
    pub fn find_subtable_for_platform(&self, platform: PlatformId) -> Option<EncodingRecord> {
        self.encoding_records
            .iter()
            .find(|record| record.platform_id == platform.0)
    }

    /// Find the best Unicode subtable, preferring a full-repertoire encoding.
    pub fn find_subtable(&self) -> Option<EncodingRecord> {
        const PREFERENCE: &[(u16, u16)] = &[
            (3, 10), // Windows, Unicode full
            (0, 6),  // Unicode, full
            (0, 4),  // Unicode, full (2.0)
            (3, 1),  // Windows, Unicode BMP
            (0, 3),  // Unicode, BMP
            (0, 2),
            (0, 1),
            (0, 0),
        ];
        for &(platform_id, encoding_id) in PREFERENCE {
            if let Some(record) = self.encoding_records.iter().find(|record| {
                record.platform_id == platform_id && record.encoding_id == encoding_id
            }) {
                return Some(record);
            }
        }
        self.encoding_records.iter().next()
    }

    /// Read the subtable of `record`.
    pub fn read_subtable(&self, record: &EncodingRecord) -> Result<CmapSubtable<'a>, ParseError> {
        self.scope
            .offset(usize::try_from(record.offset)?)
            .read::<CmapSubtable<'_>>()
    }
}

impl<'a> CmapSubtable<'a> {
    /// Look up the glyph index for the supplied character.
    pub fn glyph_index(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match self {
            CmapSubtable::Format0 { glyph_id_array, .. } => {
                if ch < 256 {
                    let glyph_id = u16::from(glyph_id_array.get_item(usize::try_from(ch)?));
                    Ok((glyph_id != 0).then(|| glyph_id))
                } else {
                    Ok(None)
                }
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                glyph_id_array,
                ..
            } => {
                let ch = match u16::try_from(ch) {
                    Ok(ch) => ch,
                    Err(_) => return Ok(None),
                };

                // Binary search for the first segment whose end code is >= ch
                let seg_count = end_codes.len();
                let (mut lo, mut hi) = (0usize, seg_count);
                while lo < hi {
                    let mid = (lo + hi) / 2;
                    if end_codes.get_item(mid) < ch {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                if lo == seg_count {
                    return Ok(None);
                }
                let start = start_codes.get_item(lo);
                if ch < start {
                    return Ok(None);
                }

                let id_range_offset = id_range_offsets.get_item(lo);
                let id_delta = id_deltas.get_item(lo);
                if id_range_offset == 0 {
                    let glyph_id = (i32::from(ch) + i32::from(id_delta)) as u16;
                    Ok((glyph_id != 0).then(|| glyph_id))
                } else {
                    // The id range offset is relative to its own position within the
                    // idRangeOffset array
                    let index = usize::from(id_range_offset / 2) + usize::from(ch - start);
                    let index = index
                        .checked_sub(seg_count - lo)
                        .ok_or(ParseError::BadOffset)?;
                    if index >= glyph_id_array.len() {
                        return Err(ParseError::BadOffset);
                    }
                    let glyph_id = glyph_id_array.get_item(index);
                    if glyph_id == 0 {
                        Ok(None)
                    } else {
                        let glyph_id = (i32::from(glyph_id) + i32::from(id_delta)) as u16;
                        Ok((glyph_id != 0).then(|| glyph_id))
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
                ..
            } => {
                let ch = match u16::try_from(ch) {
                    Ok(ch) => ch,
                    Err(_) => return Ok(None),
                };
                match ch.checked_sub(*first_code) {
                    Some(index) if usize::from(index) < glyph_id_array.len() => {
                        let glyph_id = glyph_id_array.get_item(usize::from(index));
                        Ok((glyph_id != 0).then(|| glyph_id))
                    }
                    _ => Ok(None),
                }
            }
            CmapSubtable::Format12 { groups, .. } => {
                // Binary search the sequential map groups
                let (mut lo, mut hi) = (0usize, groups.len());
                while lo < hi {
                    let mid = (lo + hi) / 2;
                    if groups.get_item(mid).end_char_code < ch {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                if lo == groups.len() {
                    return Ok(None);
                }
                let group = groups.get_item(lo);
                if ch < group.start_char_code {
                    return Ok(None);
                }
                let glyph_id = group
                    .start_glyph_id
                    .checked_add(ch - group.start_char_code)
                    .and_then(|glyph_id| u16::try_from(glyph_id).ok())
                    .ok_or(ParseError::BadValue)?;
                Ok((glyph_id != 0).then(|| glyph_id))
            }
        }
    }

    /// Call `callback` for each (character, glyph id) pair in the subtable.
    pub fn mappings_fn(&self, mut callback: impl FnMut(u32, u16)) -> Result<(), ParseError> {
        match self {
            CmapSubtable::Format0 { glyph_id_array, .. } => {
                for (ch, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        callback(ch as u32, u16::from(glyph_id));
                    }
                }
            }
            CmapSubtable::Format4 {
                start_codes,
                end_codes,
                ..
            } => {
                for (start, end) in start_codes.iter().zip(end_codes.iter()) {
                    for ch in start..=end {
                        if let Some(glyph_id) = self.glyph_index(u32::from(ch))? {
                            callback(u32::from(ch), glyph_id);
                        }
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
                ..
            } => {
                for (index, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        callback(u32::from(*first_code) + index as u32, glyph_id);
                    }
                }
            }
            CmapSubtable::Format12 { groups, .. } => {
                for group in groups.iter() {
                    for (index, ch) in (group.start_char_code..=group.end_char_code).enumerate() {
                        let glyph_id = group.start_glyph_id + index as u32;
                        match u16::try_from(glyph_id) {
                            Ok(glyph_id) if glyph_id != 0 => callback(ch, glyph_id),
                            _ => return Err(ParseError::BadValue),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Check that no mapping references a glyph id at or beyond `num_glyphs`.
    pub fn check_glyph_ids(&self, num_glyphs: u16) -> Result<(), ParseError> {
        let mut bad = false;
        self.mappings_fn(|_ch, glyph_id| bad |= glyph_id >= num_glyphs)?;
        if bad {
            Err(ParseError::BadIndex)
        } else {
            Ok(())
        }
    }
}

impl<'a> CmapMappings<'a> {
    pub fn new(subtable: CmapSubtable<'a>) -> CmapMappings<'a> {
        CmapMappings {
            subtable,
            reverse: OnceLock::new(),
        }
    }

    /// Look up the glyph index for the supplied character, 0 (`.notdef`) when unmapped.
    pub fn glyph_index(&self, ch: u32) -> u16 {
        self.subtable.glyph_index(ch).ok().flatten().unwrap_or(0)
    }

    /// Return the character mapped to `glyph_id`, on the first matching mapping.
    ///
    /// The inverse map is built on first use.
    pub fn to_unicode(&self, glyph_id: u16) -> Option<u32> {
        let reverse = self.reverse.get_or_init(|| {
            let mut reverse = HashMap::new();
            // Keep the first (lowest) character mapped to each glyph
            let _ = self.subtable.mappings_fn(|ch, glyph_id| {
                reverse.entry(glyph_id).or_insert(ch);
            });
            reverse
        });
        reverse.get(&glyph_id).copied()
    }
}

impl Format4Calculator {
    fn seg_count_x2(self) -> u16 {
        self.seg_count * 2
    }

    fn search_range(self) -> u16 {
        2 * 2u16.pow(f64::from(self.seg_count).log2().floor() as u32)
    }

    fn entry_selector(self) -> u16 {
        f64::from(self.search_range() / 2).log2().floor() as u16
    }

    fn range_shift(self) -> u16 {
        2 * self.seg_count - self.search_range()
    }
}

pub mod owned {
    use std::collections::BTreeMap;
    use std::convert::TryFrom;
    use std::iter;

    use super::{
        EncodingId, Format4Calculator, ParseError, PlatformId, SequentialMapGroup, WriteBinary,
        WriteContext, WriteError, U16Be, U32Be,
    };
    use crate::MAX_CMAP_SEGMENTS;

    pub struct Cmap {
        pub encoding_records: Vec<EncodingRecord>,
    }

    pub struct EncodingRecord {
        pub platform_id: PlatformId,
        pub encoding_id: EncodingId,
        pub sub_table: CmapSubtable,
    }

    pub enum CmapSubtable {
        Format4(CmapSubtableFormat4),
        Format12(CmapSubtableFormat12),
    }

    #[derive(Debug, PartialEq)]
    pub struct CmapSubtableFormat4 {
        pub language: u16,
        pub end_codes: Vec<u16>,
        pub start_codes: Vec<u16>,
        pub id_deltas: Vec<i16>,
        pub id_range_offsets: Vec<u16>,
        pub glyph_id_array: Vec<u16>,
    }

    #[derive(Debug, PartialEq)]
    pub struct CmapSubtableFormat12 {
        pub language: u32,
        pub groups: Vec<SequentialMapGroup>,
    }

    impl Cmap {
        /// Build a `cmap` table for the supplied character → glyph id mappings.
        ///
        /// Format 4 is chosen when every character fits the basic multilingual plane,
        /// format 12 otherwise.
        pub fn from_mappings(mappings: &BTreeMap<u32, u16>) -> Result<Cmap, ParseError> {
            if mappings.is_empty() {
                return Err(ParseError::MissingValue);
            }
            // NOTE(unwrap): safe as mappings is non-empty
            let max_char = *mappings.keys().next_back().unwrap();

            let record = if max_char <= 0xFFFF {
                EncodingRecord {
                    platform_id: PlatformId::UNICODE,
                    encoding_id: EncodingId::UNICODE_BMP,
                    sub_table: CmapSubtable::Format4(CmapSubtableFormat4::from_mappings(
                        mappings,
                    )?),
                }
            } else {
                EncodingRecord {
                    platform_id: PlatformId::UNICODE,
                    encoding_id: EncodingId::UNICODE_FULL,
                    sub_table: CmapSubtable::Format12(CmapSubtableFormat12::from_mappings(
                        mappings,
                    )),
                }
            };

            Ok(Cmap {
                encoding_records: vec![record],
            })
        }
    }

    impl WriteBinary<Self> for Cmap {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, cmap: Cmap) -> Result<(), WriteError> {
            let start = ctxt.bytes_written();
            U16Be::write(ctxt, 0u16)?; // version
            U16Be::write(ctxt, u16::try_from(cmap.encoding_records.len())?)?;

            let mut offset_placeholders = Vec::with_capacity(cmap.encoding_records.len());
            for record in &cmap.encoding_records {
                U16Be::write(ctxt, record.platform_id.0)?;
                U16Be::write(ctxt, record.encoding_id.0)?;
                offset_placeholders.push(ctxt.placeholder::<U32Be, u32>()?);
            }

            for (record, placeholder) in cmap
                .encoding_records
                .into_iter()
                .zip(offset_placeholders.into_iter())
            {
                ctxt.write_placeholder(
                    placeholder,
                    u32::try_from(ctxt.bytes_written() - start)?,
                )?;
                CmapSubtable::write(ctxt, record.sub_table)?;
            }

            Ok(())
        }
    }

    impl WriteBinary<Self> for CmapSubtable {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, subtable: CmapSubtable) -> Result<(), WriteError> {
            match subtable {
                CmapSubtable::Format4(format4) => CmapSubtableFormat4::write(ctxt, format4),
                CmapSubtable::Format12(format12) => CmapSubtableFormat12::write(ctxt, format12),
            }
        }
    }

    struct Format4Segment<'a> {
        start: u32,
        end: u32,
        glyph_ids: &'a mut Vec<u16>,
        consecutive_glyph_ids: bool,
    }

    impl<'a> Format4Segment<'a> {
        fn new(start: u32, glyph_id: u16, glyph_ids: &'a mut Vec<u16>) -> Self {
            glyph_ids.clear();
            glyph_ids.push(glyph_id);
            Format4Segment {
                start,
                end: start,
                glyph_ids,
                consecutive_glyph_ids: true,
            }
        }

        fn add(&mut self, ch: u32, glyph_id: u16) -> bool {
            // -1 because the next consecutive character introduces no gap
            let gap = ch - self.end - 1;
            // A contiguous run of 8 or more glyph ids is worth its own idDelta segment
            let should_remain_compact =
                self.consecutive_glyph_ids && self.glyph_ids.len() >= 8;

            if gap > 0 && should_remain_compact {
                false
            } else if gap < 4 {
                // Each gap entry is two bytes in the glyph id array; if the gap is less
                // than the cost of a new segment (8 bytes) it's worth absorbing.
                if gap == 0 {
                    // NOTE(unwrap): glyph_ids is never empty
                    let prev = self.glyph_ids.last().copied().unwrap();
                    self.consecutive_glyph_ids &= prev.checked_add(1) == Some(glyph_id);
                } else {
                    // Gaps map to .notdef (glyph id 0)
                    self.glyph_ids.extend(iter::repeat(0).take(gap as usize));
                    self.consecutive_glyph_ids = false;
                }
                self.glyph_ids.push(glyph_id);
                self.end = ch;
                true
            } else {
                false
            }
        }
    }

    impl CmapSubtableFormat4 {
        /// Build a format 4 subtable with a greedy segmenter.
        ///
        /// Contiguous character/glyph runs become idDelta segments; everything else
        /// lands in the glyph id array via idRangeOffset.
        pub fn from_mappings(
            mappings: &BTreeMap<u32, u16>,
        ) -> Result<CmapSubtableFormat4, ParseError> {
            let mut table = CmapSubtableFormat4 {
                language: 0,
                end_codes: Vec::new(),
                start_codes: Vec::new(),
                id_deltas: Vec::new(),
                id_range_offsets: Vec::new(),
                glyph_id_array: Vec::new(),
            };

            let mut glyph_ids = Vec::new();
            let mut id_range_offset_fixups = Vec::new();
            // NOTE(unwrap): safe as mappings is non-empty
            let (&start, &glyph_id) = mappings.iter().next().unwrap();
            let mut segment = Format4Segment::new(start, glyph_id, &mut glyph_ids);
            let mut last_char = start;
            for (&ch, &glyph_id) in mappings.iter().skip(1) {
                if !segment.add(ch, glyph_id) {
                    table.add_segment(segment, &mut id_range_offset_fixups)?;
                    segment = Format4Segment::new(ch, glyph_id, &mut glyph_ids);
                }
                last_char = ch;
            }
            table.add_segment(segment, &mut id_range_offset_fixups)?;

            // The final segment must map 0xFFFF; it maps to .notdef unless the font
            // supplied a mapping for it.
            if last_char != 0xFFFF {
                segment = Format4Segment::new(0xFFFF, 0, &mut glyph_ids);
                table.add_segment(segment, &mut id_range_offset_fixups)?;
            }

            // Fix up the id range offsets now that all segments have been added
            for index in id_range_offset_fixups {
                let id_range_offset = &mut table.id_range_offsets[index];
                *id_range_offset =
                    (2 * (table.end_codes.len() + usize::from(*id_range_offset) - index)) as u16;
            }

            Ok(table)
        }

        fn add_segment(
            &mut self,
            segment: Format4Segment<'_>,
            id_range_offset_fixups: &mut Vec<usize>,
        ) -> Result<(), ParseError> {
            if self.start_codes.len() >= MAX_CMAP_SEGMENTS {
                return Err(ParseError::LimitExceeded);
            }
            self.start_codes.push(segment.start as u16);
            self.end_codes.push(segment.end as u16);

            if segment.consecutive_glyph_ids {
                // The entire range can be stored as a delta from the start code
                // NOTE(unwrap): safe as segments always contain at least one mapping
                let first_glyph_id = *segment.glyph_ids.first().unwrap();
                self.id_deltas
                    .push((i32::from(first_glyph_id) - segment.start as i32 % 0x10000) as i16);
                self.id_range_offsets.push(0);
            } else {
                self.id_deltas.push(0);
                // The stored value is an index into glyph_id_array for now; fixed up to
                // a byte offset once the segment count is known.
                id_range_offset_fixups.push(self.id_range_offsets.len());
                self.id_range_offsets.push(self.glyph_id_array.len() as u16);
                self.glyph_id_array.extend_from_slice(segment.glyph_ids);
            }
            Ok(())
        }
    }

    impl WriteBinary<Self> for CmapSubtableFormat4 {
        type Output = ();

        fn write<C: WriteContext>(
            ctxt: &mut C,
            table: CmapSubtableFormat4,
        ) -> Result<(), WriteError> {
            let start = ctxt.bytes_written();
            let calc = Format4Calculator {
                seg_count: u16::try_from(table.start_codes.len())?,
            };

            U16Be::write(ctxt, 4u16)?; // format
            let length = ctxt.placeholder::<U16Be, _>()?;
            U16Be::write(ctxt, table.language)?;
            U16Be::write(ctxt, calc.seg_count_x2())?;
            U16Be::write(ctxt, calc.search_range())?;
            U16Be::write(ctxt, calc.entry_selector())?;
            U16Be::write(ctxt, calc.range_shift())?;
            ctxt.write_vec::<U16Be, _>(table.end_codes)?;
            U16Be::write(ctxt, 0u16)?; // reservedPad
            ctxt.write_vec::<U16Be, _>(table.start_codes)?;
            ctxt.write_iter::<U16Be, _>(table.id_deltas.into_iter().map(|delta| delta as u16))?;
            ctxt.write_vec::<U16Be, _>(table.id_range_offsets)?;
            ctxt.write_vec::<U16Be, _>(table.glyph_id_array)?;
            ctxt.write_placeholder(length, u16::try_from(ctxt.bytes_written() - start)?)?;

            Ok(())
        }
    }

    impl CmapSubtableFormat12 {
        /// Build a format 12 subtable, coalescing ranges while both the character and
        /// glyph sequences advance together.
        pub fn from_mappings(mappings: &BTreeMap<u32, u16>) -> CmapSubtableFormat12 {
            // NOTE(unwrap): safe as mappings is non-empty
            let (&start, &glyph_id) = mappings.iter().next().unwrap();
            let mut group = SequentialMapGroup {
                start_char_code: start,
                end_char_code: start,
                start_glyph_id: u32::from(glyph_id),
            };
            let mut groups = Vec::new();
            let mut prev_glyph_id = glyph_id;
            for (&ch, &glyph_id) in mappings.iter().skip(1) {
                if ch == group.end_char_code + 1 && glyph_id == prev_glyph_id.wrapping_add(1) {
                    group.end_char_code += 1;
                } else {
                    groups.push(group);
                    group = SequentialMapGroup {
                        start_char_code: ch,
                        end_char_code: ch,
                        start_glyph_id: u32::from(glyph_id),
                    };
                }
                prev_glyph_id = glyph_id;
            }
            groups.push(group);

            CmapSubtableFormat12 { language: 0, groups }
        }
    }

    impl WriteBinary<Self> for CmapSubtableFormat12 {
        type Output = ();

        fn write<C: WriteContext>(
            ctxt: &mut C,
            table: CmapSubtableFormat12,
        ) -> Result<(), WriteError> {
            let start = ctxt.bytes_written();

            U16Be::write(ctxt, 12u16)?; // format
            U16Be::write(ctxt, 0u16)?; // reserved
            let length = ctxt.placeholder::<U32Be, _>()?;
            U32Be::write(ctxt, table.language)?;
            U32Be::write(ctxt, u32::try_from(table.groups.len())?)?;
            ctxt.write_vec::<SequentialMapGroup, _>(table.groups)?;
            ctxt.write_placeholder(length, u32::try_from(ctxt.bytes_written() - start)?)?;

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{buffer, WriteBuffer};
    use std::collections::BTreeMap;

    fn mappings(pairs: &[(u32, u16)]) -> BTreeMap<u32, u16> {
        pairs.iter().copied().collect()
    }

    fn build_and_parse(mappings: &BTreeMap<u32, u16>) -> Vec<u8> {
        let cmap = owned::Cmap::from_mappings(mappings).unwrap();
        let mut ctxt = WriteBuffer::new();
        owned::Cmap::write(&mut ctxt, cmap).unwrap();
        ctxt.into_inner()
    }

    #[test]
    fn format4_round_trip() {
        let mappings = mappings(&[('a' as u32, 1), ('b' as u32, 2), ('z' as u32, 3)]);
        let data = build_and_parse(&mappings);

        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let record = cmap.find_subtable().unwrap();
        let subtable = cmap.read_subtable(&record).unwrap();
        assert!(matches!(subtable, CmapSubtable::Format4 { .. }));

        for (&ch, &glyph_id) in mappings.iter() {
            assert_eq!(subtable.glyph_index(ch).unwrap(), Some(glyph_id));
        }
        assert_eq!(subtable.glyph_index('c' as u32).unwrap(), None);
    }

    #[test]
    fn format12_chosen_for_astral_chars() {
        let mappings = mappings(&[('a' as u32, 1), (0x1F980, 2)]);
        let data = build_and_parse(&mappings);

        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let record = cmap.find_subtable().unwrap();
        let subtable = cmap.read_subtable(&record).unwrap();
        assert!(matches!(subtable, CmapSubtable::Format12 { .. }));

        assert_eq!(subtable.glyph_index('a' as u32).unwrap(), Some(1));
        assert_eq!(subtable.glyph_index(0x1F980).unwrap(), Some(2));
        assert_eq!(subtable.glyph_index('b' as u32).unwrap(), None);
    }

    #[test]
    fn format12_groups_coalesce() {
        // Both character and glyph sequences advance together so a single group results
        let mappings = mappings(&[(0x20000, 5), (0x20001, 6), (0x20002, 7)]);
        let table = owned::CmapSubtableFormat12::from_mappings(&mappings);
        assert_eq!(
            table.groups,
            vec![SequentialMapGroup {
                start_char_code: 0x20000,
                end_char_code: 0x20002,
                start_glyph_id: 5,
            }]
        );
    }

    #[test]
    fn reverse_map_returns_first_match() {
        let mappings = mappings(&[('a' as u32, 7), ('b' as u32, 7), ('c' as u32, 8)]);
        let data = build_and_parse(&mappings);

        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let record = cmap.find_subtable().unwrap();
        let subtable = cmap.read_subtable(&record).unwrap();
        let mappings = CmapMappings::new(subtable);

        assert_eq!(mappings.to_unicode(7), Some('a' as u32));
        assert_eq!(mappings.to_unicode(8), Some('c' as u32));
        assert_eq!(mappings.to_unicode(9), None);
    }

    #[test]
    fn bijection_over_built_subtable() {
        let pairs = mappings(&[
            ('0' as u32, 17),
            ('1' as u32, 18),
            ('A' as u32, 3),
            ('b' as u32, 40),
            (0xFF10, 60),
        ]);
        let data = build_and_parse(&pairs);

        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let record = cmap.find_subtable().unwrap();
        let subtable = cmap.read_subtable(&record).unwrap();
        let cache = CmapMappings::new(subtable);

        for (&ch, &glyph_id) in pairs.iter() {
            assert_eq!(cache.glyph_index(ch), glyph_id);
            assert_eq!(cache.to_unicode(glyph_id), Some(ch));
        }
    }

    #[test]
    fn format4_rejects_missing_sentinel() {
        let mut ctxt = WriteBuffer::new();
        let table = owned::CmapSubtableFormat4 {
            language: 0,
            end_codes: vec![98],
            start_codes: vec![97],
            id_deltas: vec![-96],
            id_range_offsets: vec![0],
            glyph_id_array: vec![],
        };
        owned::CmapSubtableFormat4::write(&mut ctxt, table).unwrap();

        assert_eq!(
            ReadScope::new(ctxt.bytes())
                .read::<CmapSubtable<'_>>()
                .err(),
            Some(ParseError::BadValue)
        );
    }

    #[test]
    fn format4_consecutive_run_gets_own_segment() {
        // 9 contiguous mappings followed by a gap with a non-contiguous glyph
        let mut pairs = BTreeMap::new();
        for i in 0..9u32 {
            pairs.insert('a' as u32 + i, 10 + i as u16);
        }
        pairs.insert('z' as u32, 500);

        let (table, _) = (
            owned::CmapSubtableFormat4::from_mappings(&pairs).unwrap(),
            (),
        );
        // run of 9 + z + sentinel
        assert_eq!(table.start_codes.len(), 3);
        assert_eq!(table.id_range_offsets[0], 0);
    }
}
