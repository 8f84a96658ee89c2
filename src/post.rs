//! `post` table parsing and writing.

use std::str;
use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, I32Be, U16Be, U32Be, U8};
use crate::error::{ParseError, WriteError};

/// The longest name that may be stored in the version 2 string pool.
pub const MAX_NAME_LENGTH: usize = 63;

pub struct PostTable<'a> {
    pub header: Header,
    pub opt_sub_table: Option<SubTable<'a>>,
    name_map: OnceLock<FxHashMap<String, u16>>,
}

#[derive(Clone)]
pub struct Header {
    pub version: i32,
    pub italic_angle: i32,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: u32,
    pub min_mem_type_42: u32,
    pub max_mem_type_42: u32,
    pub min_mem_type_1: u32,
    pub max_mem_type_1: u32,
}

pub struct SubTable<'a> {
    pub num_glyphs: u16,
    pub glyph_name_index: ReadArray<'a, U16Be>,
    pub names: Vec<PascalString<'a>>,
}

#[derive(Clone)]
pub struct PascalString<'a> {
    pub bytes: &'a [u8],
}

impl<'a> ReadBinary<'a> for Header {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_i32be()?;
        let italic_angle = ctxt.read_i32be()?;
        let underline_position = ctxt.read_i16be()?;
        let underline_thickness = ctxt.read_i16be()?;
        let is_fixed_pitch = ctxt.read_u32be()?;
        let min_mem_type_42 = ctxt.read_u32be()?;
        let max_mem_type_42 = ctxt.read_u32be()?;
        let min_mem_type_1 = ctxt.read_u32be()?;
        let max_mem_type_1 = ctxt.read_u32be()?;

        Ok(Header {
            version,
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
            min_mem_type_42,
            max_mem_type_42,
            min_mem_type_1,
            max_mem_type_1,
        })
    }
}

impl WriteBinary<&Self> for Header {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &Header) -> Result<(), WriteError> {
        I32Be::write(ctxt, table.version)?;
        I32Be::write(ctxt, table.italic_angle)?;
        I16Be::write(ctxt, table.underline_position)?;
        I16Be::write(ctxt, table.underline_thickness)?;
        U32Be::write(ctxt, table.is_fixed_pitch)?;
        U32Be::write(ctxt, table.min_mem_type_42)?;
        U32Be::write(ctxt, table.max_mem_type_42)?;
        U32Be::write(ctxt, table.min_mem_type_1)?;
        U32Be::write(ctxt, table.max_mem_type_1)?;

        Ok(())
    }
}

impl<'a> ReadBinary<'a> for PostTable<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let header = ctxt.read::<Header>()?;
        let opt_sub_table = match header.version {
            0x00020000 => {
                // May include some Format 1 glyphs
                let num_glyphs = ctxt.read_u16be()?;
                let num_glyphs_usize = usize::from(num_glyphs);
                let glyph_name_index = ctxt.read_array(num_glyphs_usize)?;

                let mut names = Vec::with_capacity(num_glyphs_usize);
                let mut seen =
                    FxHashSet::with_capacity_and_hasher(num_glyphs_usize, Default::default());
                for index in glyph_name_index.iter() {
                    // Skip standard names and indexes that we've already seen
                    if usize::from(index) < FORMAT_1_NAMES.len() || seen.contains(&index) {
                        continue;
                    }

                    let length = ctxt.read_u8()?;
                    let bytes = ctxt.read_slice(usize::from(length))?;
                    names.push(PascalString { bytes });
                    seen.insert(index);
                }

                // names was over provisioned so try to discard unused capacity
                names.shrink_to_fit();

                Some(SubTable {
                    num_glyphs,
                    glyph_name_index,
                    names,
                })
            }
            0x00010000 | 0x00025000 | 0x00030000 => None,
            _ => return Err(ParseError::BadVersion),
        };

        Ok(PostTable {
            header,
            opt_sub_table,
            name_map: OnceLock::new(),
        })
    }
}

impl<'a> WriteBinary<&Self> for PostTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &PostTable<'a>) -> Result<(), WriteError> {
        Header::write(ctxt, &table.header)?;
        if let Some(sub_table) = &table.opt_sub_table {
            SubTable::write(ctxt, sub_table)?;
        }

        Ok(())
    }
}

impl<'a> WriteBinary<&Self> for SubTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &SubTable<'a>) -> Result<(), WriteError> {
        U16Be::write(ctxt, table.num_glyphs)?;
        <&ReadArray<'_, _>>::write(ctxt, &table.glyph_name_index)?;
        for name in &table.names {
            PascalString::write(ctxt, name)?;
        }

        Ok(())
    }
}

impl<'a> WriteBinary<&Self> for PascalString<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, string: &PascalString<'a>) -> Result<(), WriteError> {
        if string.bytes.len() <= MAX_NAME_LENGTH {
            // cast is safe due to check above
            U8::write(ctxt, string.bytes.len() as u8)?;
            ctxt.write_bytes(string.bytes)?;
            Ok(())
        } else {
            Err(WriteError::BadValue)
        }
    }
}

impl<'a> PostTable<'a> {
    /// Construct a version 3 `post` table (no glyph names) carrying over the metrics of
    /// `header`.
    pub fn version_3(header: &Header) -> PostTable<'static> {
        let mut header = header.clone();
        header.version = 0x00030000;
        PostTable {
            header,
            opt_sub_table: None,
            name_map: OnceLock::new(),
        }
    }

    /// The number of glyphs named by this table, 0 when it carries no names.
    pub fn num_glyphs(&self) -> u16 {
        self.opt_sub_table
            .as_ref()
            .map_or(0, |sub_table| sub_table.num_glyphs)
    }

    /// Retrieve the glyph name for the supplied `glyph_index`.
    ///
    /// **Note:** Some fonts map more than one glyph to the same name so don't assume names are
    /// unique.
    pub fn glyph_name(&self, glyph_index: u16) -> Result<Option<&'a str>, ParseError> {
        if let Some(sub_table) = &self.opt_sub_table {
            if glyph_index >= sub_table.num_glyphs {
                return Ok(None);
            }
        }

        match &self.header.version {
            0x00010000 if usize::from(glyph_index) < FORMAT_1_NAMES.len() => {
                let name = FORMAT_1_NAMES[usize::from(glyph_index)];
                Ok(Some(name))
            }
            0x00020000 => match &self.opt_sub_table {
                Some(sub_table) => {
                    let name_index = sub_table
                        .glyph_name_index
                        .get_item(usize::from(glyph_index));

                    if usize::from(name_index) < FORMAT_1_NAMES.len() {
                        Ok(Some(FORMAT_1_NAMES[usize::from(name_index)]))
                    } else {
                        let index = usize::from(name_index) - FORMAT_1_NAMES.len();
                        let pascal_string =
                            sub_table.names.get(index).ok_or(ParseError::BadIndex)?;

                        match str::from_utf8(pascal_string.bytes) {
                            Ok(name) => Ok(Some(name)),
                            Err(_) => Err(ParseError::BadValue),
                        }
                    }
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Find the glyph with the supplied `name`.
    ///
    /// The name → glyph map is built on first use.
    pub fn find_glyph(&self, name: &str) -> Option<u16> {
        let map = self.name_map.get_or_init(|| {
            let mut map = FxHashMap::default();
            let limit = match &self.opt_sub_table {
                Some(sub_table) => sub_table.num_glyphs,
                None if self.header.version == 0x00010000 => FORMAT_1_NAMES.len() as u16,
                None => 0,
            };
            for glyph_index in 0..limit {
                if let Ok(Some(name)) = self.glyph_name(glyph_index) {
                    map.entry(name.to_string()).or_insert(glyph_index);
                }
            }
            map
        });
        map.get(name).copied()
    }
}

/// Builder for a version 2 `post` table with an explicit set of glyph names.
pub mod owned {
    use super::{FxHashMap, Header, WriteBinary, WriteContext, WriteError, FORMAT_1_NAMES,
        MAX_NAME_LENGTH, U16Be, U8};

    pub struct PostTable {
        pub header: Header,
        pub glyph_name_index: Vec<u16>,
        pub names: Vec<Vec<u8>>,
    }

    impl PostTable {
        /// Build a version 2 table assigning `names` to glyphs in order.
        ///
        /// Names found in the standard Macintosh set use their built-in index; the rest
        /// are pooled and de-duplicated.
        pub fn new(header: &Header, names: impl Iterator<Item = String>) -> PostTable {
            let mut header = header.clone();
            header.version = 0x00020000;

            let mut table = PostTable {
                header,
                glyph_name_index: Vec::new(),
                names: Vec::new(),
            };
            let mut pool: FxHashMap<String, u16> = FxHashMap::default();
            for name in names {
                let index = table.intern(&name, &mut pool);
                table.glyph_name_index.push(index);
            }
            table
        }

        fn intern(&mut self, name: &str, pool: &mut FxHashMap<String, u16>) -> u16 {
            if let Some(index) = FORMAT_1_NAMES.iter().position(|&standard| standard == name)
            {
                return index as u16;
            }
            if let Some(&index) = pool.get(name) {
                return index;
            }
            let index = (FORMAT_1_NAMES.len() + self.names.len()) as u16;
            pool.insert(name.to_string(), index);
            self.names.push(name.as_bytes().to_vec());
            index
        }
    }

    impl WriteBinary<&Self> for PostTable {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, table: &PostTable) -> Result<(), WriteError> {
            Header::write(ctxt, &table.header)?;
            U16Be::write(ctxt, u16::try_from(table.glyph_name_index.len())?)?;
            for &index in &table.glyph_name_index {
                U16Be::write(ctxt, index)?;
            }
            for name in &table.names {
                if name.len() > MAX_NAME_LENGTH {
                    return Err(WriteError::BadValue);
                }
                U8::write(ctxt, name.len() as u8)?;
                ctxt.write_bytes(name)?;
            }
            Ok(())
        }
    }
}

/// The 258 standard Macintosh glyph names used in `post` format 1 and 2 tables.
#[rustfmt::skip]
pub static FORMAT_1_NAMES: &[&str; 258] = &[
    ".notdef", ".null", "nonmarkingreturn", "space", "exclam", "quotedbl", "numbersign",
    "dollar", "percent", "ampersand", "quotesingle", "parenleft", "parenright", "asterisk",
    "plus", "comma", "hyphen", "period", "slash", "zero", "one", "two", "three", "four",
    "five", "six", "seven", "eight", "nine", "colon", "semicolon", "less", "equal",
    "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K",
    "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    "bracketleft", "backslash", "bracketright", "asciicircum", "underscore", "grave", "a",
    "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright",
    "asciitilde", "Adieresis", "Aring", "Ccedilla", "Eacute", "Ntilde", "Odieresis",
    "Udieresis", "aacute", "agrave", "acircumflex", "adieresis", "atilde", "aring",
    "ccedilla", "eacute", "egrave", "ecircumflex", "edieresis", "iacute", "igrave",
    "icircumflex", "idieresis", "ntilde", "oacute", "ograve", "ocircumflex", "odieresis",
    "otilde", "uacute", "ugrave", "ucircumflex", "udieresis", "dagger", "degree", "cent",
    "sterling", "section", "bullet", "paragraph", "germandbls", "registered",
    "copyright", "trademark", "acute", "dieresis", "notequal", "AE", "Oslash",
    "infinity", "plusminus", "lessequal", "greaterequal", "yen", "mu", "partialdiff",
    "summation", "product", "pi", "integral", "ordfeminine", "ordmasculine", "Omega",
    "ae", "oslash", "questiondown", "exclamdown", "logicalnot", "radical", "florin",
    "approxequal", "Delta", "guillemotleft", "guillemotright", "ellipsis", "nonbreakingspace",
    "Agrave", "Atilde", "Otilde", "OE", "oe", "endash", "emdash", "quotedblleft",
    "quotedblright", "quoteleft", "quoteright", "divide", "lozenge", "ydieresis",
    "Ydieresis", "fraction", "currency", "guilsinglleft", "guilsinglright", "fi", "fl",
    "daggerdbl", "periodcentered", "quotesinglbase", "quotedblbase", "perthousand",
    "Acircumflex", "Ecircumflex", "Aacute", "Edieresis", "Egrave", "Iacute",
    "Icircumflex", "Idieresis", "Igrave", "Oacute", "Ocircumflex", "apple", "Ograve",
    "Uacute", "Ucircumflex", "Ugrave", "dotlessi", "circumflex", "tilde", "macron",
    "breve", "dotaccent", "ring", "cedilla", "hungarumlaut", "ogonek", "caron",
    "Lslash", "lslash", "Scaron", "scaron", "Zcaron", "zcaron", "brokenbar", "Eth",
    "eth", "Yacute", "yacute", "Thorn", "thorn", "minus", "multiply", "onesuperior",
    "twosuperior", "threesuperior", "onehalf", "onequarter", "threequarters", "franc",
    "Gbreve", "gbreve", "Idotaccent", "Scedilla", "scedilla", "Cacute", "cacute",
    "Ccaron", "ccaron", "dcroat",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::WriteBuffer;

    fn header() -> Header {
        Header {
            version: 0x00020000,
            italic_angle: 0,
            underline_position: -100,
            underline_thickness: 50,
            is_fixed_pitch: 0,
            min_mem_type_42: 0,
            max_mem_type_42: 0,
            min_mem_type_1: 0,
            max_mem_type_1: 0,
        }
    }

    #[test]
    fn version2_names_round_trip() {
        let names = [".notdef", "A", "uni1234", "B"]
            .iter()
            .map(|name| name.to_string());
        let table = owned::PostTable::new(&header(), names);

        let mut ctxt = WriteBuffer::new();
        owned::PostTable::write(&mut ctxt, &table).unwrap();

        let read_back = ReadScope::new(ctxt.bytes()).read::<PostTable<'_>>().unwrap();
        assert_eq!(read_back.glyph_name(0).unwrap(), Some(".notdef"));
        assert_eq!(read_back.glyph_name(1).unwrap(), Some("A"));
        assert_eq!(read_back.glyph_name(2).unwrap(), Some("uni1234"));
        assert_eq!(read_back.glyph_name(3).unwrap(), Some("B"));
        assert_eq!(read_back.glyph_name(4).unwrap(), None);
    }

    #[test]
    fn duplicate_names_share_pool_entries() {
        let names = ["uniAAAA", "uniAAAA", "uniBBBB"]
            .iter()
            .map(|name| name.to_string());
        let table = owned::PostTable::new(&header(), names);
        assert_eq!(table.names.len(), 2);
        assert_eq!(table.glyph_name_index[0], table.glyph_name_index[1]);
    }

    #[test]
    fn find_glyph_uses_first_match() {
        let names = [".notdef", "A", "A"].iter().map(|name| name.to_string());
        let table = owned::PostTable::new(&header(), names);

        let mut ctxt = WriteBuffer::new();
        owned::PostTable::write(&mut ctxt, &table).unwrap();

        let read_back = ReadScope::new(ctxt.bytes()).read::<PostTable<'_>>().unwrap();
        assert_eq!(read_back.find_glyph("A"), Some(1));
        assert_eq!(read_back.find_glyph("missing"), None);
    }

    #[test]
    fn overlong_pool_name_rejected() {
        let long = "a".repeat(MAX_NAME_LENGTH + 1);
        let names = [long].into_iter();
        let table = owned::PostTable::new(&header(), names);

        let mut ctxt = WriteBuffer::new();
        assert_eq!(
            owned::PostTable::write(&mut ctxt, &table),
            Err(WriteError::BadValue)
        );
    }

    #[test]
    fn version3_has_no_names() {
        let post = PostTable::version_3(&header());
        let mut ctxt = WriteBuffer::new();
        PostTable::write(&mut ctxt, &post).unwrap();
        assert_eq!(ctxt.len(), 32);

        let read_back = ReadScope::new(ctxt.bytes()).read::<PostTable<'_>>().unwrap();
        assert_eq!(read_back.glyph_name(0).unwrap(), None);
    }
}
