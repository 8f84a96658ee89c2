//! Parsing and writing of the `glyf` table.
//!
//! > This table contains information that describes the glyphs in the font in the TrueType outline
//! > format.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>

mod outline;
mod subset;

use std::convert::TryFrom;
use std::iter;

use bitflags::bitflags;
use itertools::Itertools;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteContext};
use crate::binary::{word_align, I16Be, U16Be, I8, U8};
use crate::error::{ParseError, WriteError};
use crate::tables::loca::{owned, LocaTable};
use crate::tables::F2Dot14;

pub use subset::SubsetGlyph;

/// Recursion limit for nested composite glyphs.
pub const COMPOSITE_GLYPH_RECURSION_LIMIT: u8 = 8;

bitflags! {
    #[rustfmt::skip]
    pub struct SimpleGlyphFlag: u8 {
        const ON_CURVE_POINT                       = 0b0000_0001;
        const X_SHORT_VECTOR                       = 0b0000_0010;
        const Y_SHORT_VECTOR                       = 0b0000_0100;
        const REPEAT_FLAG                          = 0b0000_1000;
        const X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR = 0b0001_0000;
        const Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR = 0b0010_0000;
        const OVERLAP_SIMPLE                       = 0b0100_0000;
    }
}

bitflags! {
    pub struct CompositeGlyphFlag: u16 {
        /// Bit 0: If this is set, the arguments are 16-bit (uint16 or int16); otherwise, they are
        /// bytes (uint8 or int8).
        const ARG_1_AND_2_ARE_WORDS = 0x0001;
        /// Bit 1: If this is set, the arguments are signed xy values; otherwise, they are unsigned
        /// point numbers.
        const ARGS_ARE_XY_VALUES = 0x0002;
        /// Bit 2: For the xy values if the preceding is true.
        const ROUND_XY_TO_GRID = 0x0004;
        /// Bit 3: This indicates that there is a simple scale for the component. Otherwise, scale = 1.0.
        const WE_HAVE_A_SCALE = 0x0008;
        /// Bit 5: Indicates at least one more glyph after this one.
        const MORE_COMPONENTS = 0x0020;
        /// Bit 6: The x direction will use a different scale from the y direction.
        const WE_HAVE_AN_X_AND_Y_SCALE = 0x0040;
        /// Bit 7: There is a 2 by 2 transformation that will be used to scale the component.
        const WE_HAVE_A_TWO_BY_TWO = 0x0080;
        /// Bit 8: Following the last component are instructions for the composite character.
        const WE_HAVE_INSTRUCTIONS = 0x0100;
        /// Bit 9: If set, this forces the aw and lsb (and rsb) for the composite to be equal to
        /// those from this original glyph.
        const USE_MY_METRICS = 0x0200;
        /// Bit 10: If set, the components of the compound glyph overlap.
        const OVERLAP_COMPOUND = 0x0400;
        /// Bit 11: The composite is designed to have the component offset scaled.
        const SCALED_COMPONENT_OFFSET = 0x0800;
        /// Bit 12: The composite is designed not to have the component offset scaled.
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
        // Bits 4, 13, 14 and 15 are reserved: set to 0.
    }
}

/// `glyf` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>
#[derive(Debug, PartialEq)]
pub struct GlyfTable<'a> {
    pub records: Vec<GlyfRecord<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum GlyfRecord<'a> {
    Empty,
    Present {
        number_of_contours: i16,
        scope: ReadScope<'a>,
    },
    Parsed(Glyph<'a>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Glyph<'a> {
    pub number_of_contours: i16,
    pub bounding_box: BoundingBox,
    pub data: GlyphData<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum GlyphData<'a> {
    Simple(SimpleGlyph<'a>),
    Composite {
        glyphs: Vec<CompositeGlyph>,
        instructions: &'a [u8],
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct SimpleGlyph<'a> {
    pub end_pts_of_contours: Vec<u16>,
    pub instructions: &'a [u8],
    pub flags: Vec<SimpleGlyphFlag>,
    pub coordinates: Vec<Point>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyph {
    pub flags: CompositeGlyphFlag,
    pub glyph_index: u16,
    pub argument1: CompositeGlyphArgument,
    pub argument2: CompositeGlyphArgument,
    pub scale: Option<CompositeGlyphScale>,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphArgument {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphScale {
    Scale(F2Dot14),
    XY { x_scale: F2Dot14, y_scale: F2Dot14 },
    Matrix([[F2Dot14; 2]; 2]),
}

pub struct CompositeGlyphs {
    pub glyphs: Vec<CompositeGlyph>,
    pub have_instructions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point(pub i16, pub i16);

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct BoundingBox {
    pub x_min: i16,
    pub x_max: i16,
    pub y_min: i16,
    pub y_max: i16,
}

impl<'a> ReadBinaryDep<'a> for GlyfTable<'a> {
    type Args = &'a LocaTable<'a>;
    type HostType = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'a>, loca: Self::Args) -> Result<Self, ParseError> {
        if loca.offsets.len() < 2 {
            return Err(ParseError::BadIndex);
        }

        let glyph_records = loca
            .offsets
            .iter()
            .tuple_windows()
            .map(|(start, end)| match end.checked_sub(start) {
                Some(0) => Ok(GlyfRecord::Empty),
                Some(length) => {
                    let offset = usize::try_from(start)?;
                    let length = usize::try_from(length)?;
                    let scope = ctxt.scope().offset_length(offset, length)?;
                    let number_of_contours = scope.read::<I16Be>()?;
                    Ok(GlyfRecord::Present {
                        number_of_contours,
                        scope,
                    })
                }
                None => Err(ParseError::BadOffset),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GlyfTable {
            records: glyph_records,
        })
    }
}

impl<'a> WriteBinaryDep<Self> for GlyfTable<'a> {
    type Output = owned::LocaTable;
    type Args = ();

    /// Write this glyf table into `ctxt`, returning the offsets for the `loca` table.
    ///
    /// Each glyph is padded to an even length so that the short `loca` format remains
    /// viable for the output.
    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        table: GlyfTable<'a>,
        (): (),
    ) -> Result<Self::Output, WriteError> {
        let mut offsets: Vec<u32> = Vec::with_capacity(table.records.len() + 1);

        let start = ctxt.bytes_written();
        offsets.push(0);
        for record in table.records {
            match record {
                GlyfRecord::Empty => {}
                GlyfRecord::Present { scope, .. } => ReadScope::write(ctxt, scope)?,
                GlyfRecord::Parsed(glyph) => Glyph::write(ctxt, glyph)?,
            }

            let length = ctxt.bytes_written() - start;
            let padded_length = word_align(length);
            ctxt.write_zeros(padded_length - length)?;

            offsets.push(u32::try_from(ctxt.bytes_written() - start)?);
        }

        Ok(owned::LocaTable { offsets })
    }
}

impl<'a> ReadBinary<'a> for Glyph<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let number_of_contours = ctxt.read_i16be()?;
        let bounding_box = ctxt.read::<BoundingBox>()?;

        if number_of_contours >= 0 {
            // Simple glyph
            // Cast is safe as we've checked value is positive above
            let glyph = ctxt.read_dep::<SimpleGlyph<'_>>(number_of_contours as u16)?;
            Ok(Glyph {
                number_of_contours,
                bounding_box,
                data: GlyphData::Simple(glyph),
            })
        } else {
            // Composite glyph
            let glyphs = ctxt.read::<CompositeGlyphs>()?;
            let instruction_length = if glyphs.have_instructions {
                usize::from(ctxt.read::<U16Be>()?)
            } else {
                0
            };
            let instructions = ctxt.read_slice(instruction_length)?;

            Ok(Glyph {
                number_of_contours,
                bounding_box,
                data: GlyphData::Composite {
                    glyphs: glyphs.glyphs,
                    instructions,
                },
            })
        }
    }
}

impl<'a> WriteBinary for Glyph<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, glyph: Glyph<'a>) -> Result<(), WriteError> {
        I16Be::write(ctxt, glyph.number_of_contours)?;
        BoundingBox::write(ctxt, glyph.bounding_box)?;

        match glyph.data {
            GlyphData::Simple(simple_glyph) => SimpleGlyph::write(ctxt, simple_glyph),
            GlyphData::Composite {
                glyphs,
                instructions,
            } => {
                let mut have_instructions = false;
                for composite_glyph in glyphs {
                    have_instructions |= composite_glyph.flags.we_have_instructions();
                    CompositeGlyph::write(ctxt, composite_glyph)?;
                }
                if have_instructions {
                    U16Be::write(ctxt, u16::try_from(instructions.len())?)?;
                    ctxt.write_bytes(instructions)?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> SimpleGlyph<'a> {
    pub fn number_of_coordinates(&self) -> usize {
        self.coordinates.len()
    }

    /// Calculate the bounding box from the glyph's points.
    ///
    /// Returns an empty box for a glyph with no points.
    pub fn bounding_box(&self) -> BoundingBox {
        if self.coordinates.is_empty() {
            BoundingBox::empty()
        } else {
            BoundingBox::from_points(self.coordinates.iter().copied())
        }
    }
}

impl<'a> ReadBinaryDep<'a> for SimpleGlyph<'a> {
    type Args = u16;
    type HostType = Self;

    fn read_dep(
        ctxt: &mut ReadCtxt<'a>,
        number_of_contours: Self::Args,
    ) -> Result<Self, ParseError> {
        let number_of_contours = usize::from(number_of_contours);
        let end_pts_of_contours = ctxt.read_array::<U16Be>(number_of_contours)?.to_vec();
        let instruction_length = ctxt.read::<U16Be>()?;
        let instructions = ctxt.read_slice(usize::from(instruction_length))?;
        // end_pts_of_contours stores the index of the end points.
        // Therefore the number of coordinates is the last index + 1
        let number_of_coordinates = end_pts_of_contours
            .last()
            .map_or(0, |&last| usize::from(last) + 1);

        // Read all the flags. Repeated flags share the same on-curve and overlap bits.
        let mut flags = Vec::with_capacity(number_of_coordinates);
        while flags.len() < number_of_coordinates {
            let flag = ctxt.read::<SimpleGlyphFlag>()?;
            if flag.is_repeated() {
                let count = usize::from(ctxt.read::<U8>()?) + 1; // + 1 to include the current entry
                flags.extend(iter::repeat(flag).take(count));
            } else {
                flags.push(flag);
            }
        }
        if flags.len() > number_of_coordinates {
            return Err(ParseError::BadValue);
        }

        // Read the delta encoded x coordinates
        let mut coordinates = vec![Point::zero(); number_of_coordinates];
        let mut prev_x = 0i16;
        for (flag, point) in flags.iter().zip(coordinates.iter_mut()) {
            let dx = if flag.x_is_short() {
                ctxt.read::<U8>()
                    .map(|val| i16::from(val) * flag.x_short_sign())?
            } else if flag.x_is_same_or_positive() {
                // x is same as previous
                0
            } else {
                ctxt.read::<I16Be>()?
            };
            prev_x = prev_x.wrapping_add(dx);
            point.0 = prev_x;
        }

        // Read the delta encoded y coordinates
        let mut prev_y = 0i16;
        for (flag, point) in flags.iter().zip(coordinates.iter_mut()) {
            let dy = if flag.y_is_short() {
                ctxt.read::<U8>()
                    .map(|val| i16::from(val) * flag.y_short_sign())?
            } else if flag.y_is_same_or_positive() {
                0
            } else {
                ctxt.read::<I16Be>()?
            };
            prev_y = prev_y.wrapping_add(dy);
            point.1 = prev_y;
        }

        Ok(SimpleGlyph {
            end_pts_of_contours,
            instructions,
            flags,
            coordinates,
        })
    }
}

impl<'a> WriteBinary for SimpleGlyph<'a> {
    type Output = ();

    /// Write the glyph description with compact flag and coordinate encoding.
    ///
    /// Deltas that fit a byte use the short vector representation, zero deltas reuse
    /// the previous coordinate, and runs of equal flag bytes collapse to REPEAT runs.
    fn write<C: WriteContext>(ctxt: &mut C, glyph: SimpleGlyph<'_>) -> Result<(), WriteError> {
        ctxt.write_vec::<U16Be, _>(glyph.end_pts_of_contours)?;
        U16Be::write(ctxt, u16::try_from(glyph.instructions.len())?)?;
        ctxt.write_bytes(glyph.instructions)?;

        let mut flag_bytes = Vec::with_capacity(glyph.coordinates.len());
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut prev = Point::zero();
        for (flag, point) in glyph.flags.iter().zip(glyph.coordinates.iter()) {
            let dx = point.0.wrapping_sub(prev.0);
            let dy = point.1.wrapping_sub(prev.1);
            prev = *point;

            let mut out = *flag
                & (SimpleGlyphFlag::ON_CURVE_POINT | SimpleGlyphFlag::OVERLAP_SIMPLE);

            if dx == 0 {
                out |= SimpleGlyphFlag::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR;
            } else if (-255..=255).contains(&dx) {
                out |= SimpleGlyphFlag::X_SHORT_VECTOR;
                if dx > 0 {
                    out |= SimpleGlyphFlag::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR;
                }
                xs.push(dx.unsigned_abs() as u8);
            } else {
                xs.extend_from_slice(&dx.to_be_bytes());
            }

            if dy == 0 {
                out |= SimpleGlyphFlag::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR;
            } else if (-255..=255).contains(&dy) {
                out |= SimpleGlyphFlag::Y_SHORT_VECTOR;
                if dy > 0 {
                    out |= SimpleGlyphFlag::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR;
                }
                ys.push(dy.unsigned_abs() as u8);
            } else {
                ys.extend_from_slice(&dy.to_be_bytes());
            }

            flag_bytes.push(out.bits());
        }

        // Collapse runs of equal flags into REPEAT runs
        let mut i = 0;
        while i < flag_bytes.len() {
            let flag = flag_bytes[i];
            let mut run = 1;
            while i + run < flag_bytes.len() && flag_bytes[i + run] == flag && run < 256 {
                run += 1;
            }
            if run > 2 {
                U8::write(ctxt, flag | SimpleGlyphFlag::REPEAT_FLAG.bits())?;
                U8::write(ctxt, (run - 1) as u8)?;
            } else {
                for _ in 0..run {
                    U8::write(ctxt, flag)?;
                }
            }
            i += run;
        }

        ctxt.write_bytes(&xs)?;
        ctxt.write_bytes(&ys)?;

        Ok(())
    }
}

impl<'a> ReadFrom<'a> for SimpleGlyphFlag {
    type ReadType = U8;

    fn from(flag: u8) -> Self {
        SimpleGlyphFlag::from_bits_truncate(flag)
    }
}

impl<'a> ReadBinary<'a> for CompositeGlyphs {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let mut have_instructions = false;
        let mut glyphs = Vec::new();
        loop {
            let flags = ctxt.read::<CompositeGlyphFlag>()?;
            let data = ctxt.read_dep::<CompositeGlyph>(flags)?;

            if flags.we_have_instructions() {
                have_instructions = true;
            }

            glyphs.push(data);

            if !flags.more_components() {
                break;
            }
        }

        Ok(CompositeGlyphs {
            glyphs,
            have_instructions,
        })
    }
}

impl<'a> ReadFrom<'a> for CompositeGlyphFlag {
    type ReadType = U16Be;

    fn from(flag: u16) -> Self {
        CompositeGlyphFlag::from_bits_truncate(flag)
    }
}

impl<'a> ReadBinaryDep<'a> for CompositeGlyphArgument {
    type Args = CompositeGlyphFlag;
    type HostType = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'a>, flags: Self::Args) -> Result<Self, ParseError> {
        let arg = match (flags.arg_1_and_2_are_words(), flags.args_are_xy_values()) {
            (true, true) => CompositeGlyphArgument::I16(ctxt.read_i16be()?),
            (true, false) => CompositeGlyphArgument::U16(ctxt.read_u16be()?),
            (false, true) => CompositeGlyphArgument::I8(ctxt.read_i8()?),
            (false, false) => CompositeGlyphArgument::U8(ctxt.read_u8()?),
        };

        Ok(arg)
    }
}

impl WriteBinary for CompositeGlyphArgument {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, arg: CompositeGlyphArgument) -> Result<(), WriteError> {
        match arg {
            CompositeGlyphArgument::U8(val) => U8::write(ctxt, val),
            CompositeGlyphArgument::I8(val) => I8::write(ctxt, val),
            CompositeGlyphArgument::U16(val) => U16Be::write(ctxt, val),
            CompositeGlyphArgument::I16(val) => I16Be::write(ctxt, val),
        }
    }
}

impl<'a> ReadBinaryDep<'a> for CompositeGlyph {
    type Args = CompositeGlyphFlag;
    type HostType = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'a>, flags: Self::Args) -> Result<Self, ParseError> {
        let glyph_index = ctxt.read_u16be()?;
        let argument1 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;
        let argument2 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;

        let scale = if flags.we_have_a_scale() {
            Some(CompositeGlyphScale::Scale(ctxt.read::<F2Dot14>()?))
        } else if flags.we_have_an_x_and_y_scale() {
            Some(CompositeGlyphScale::XY {
                x_scale: ctxt.read::<F2Dot14>()?,
                y_scale: ctxt.read::<F2Dot14>()?,
            })
        } else if flags.we_have_a_two_by_two() {
            Some(CompositeGlyphScale::Matrix([
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
            ]))
        } else {
            None
        };

        Ok(CompositeGlyph {
            flags,
            glyph_index,
            argument1,
            argument2,
            scale,
        })
    }
}

impl WriteBinary for CompositeGlyph {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, glyph: CompositeGlyph) -> Result<(), WriteError> {
        U16Be::write(ctxt, glyph.flags.bits())?;
        U16Be::write(ctxt, glyph.glyph_index)?;
        CompositeGlyphArgument::write(ctxt, glyph.argument1)?;
        CompositeGlyphArgument::write(ctxt, glyph.argument2)?;
        if let Some(scale) = glyph.scale {
            CompositeGlyphScale::write(ctxt, scale)?;
        }
        Ok(())
    }
}

impl WriteBinary for CompositeGlyphScale {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, scale: CompositeGlyphScale) -> Result<(), WriteError> {
        match scale {
            CompositeGlyphScale::Scale(scale) => F2Dot14::write(ctxt, scale)?,
            CompositeGlyphScale::XY { x_scale, y_scale } => {
                F2Dot14::write(ctxt, x_scale)?;
                F2Dot14::write(ctxt, y_scale)?;
            }
            CompositeGlyphScale::Matrix(matrix) => {
                F2Dot14::write(ctxt, matrix[0][0])?;
                F2Dot14::write(ctxt, matrix[0][1])?;
                F2Dot14::write(ctxt, matrix[1][0])?;
                F2Dot14::write(ctxt, matrix[1][1])?;
            }
        }

        Ok(())
    }
}

impl<'a> ReadFrom<'a> for BoundingBox {
    type ReadType = ((I16Be, I16Be), (I16Be, I16Be));

    fn from(((x_min, y_min), (x_max, y_max)): ((i16, i16), (i16, i16))) -> Self {
        BoundingBox {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

impl WriteBinary for BoundingBox {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, bbox: BoundingBox) -> Result<(), WriteError> {
        I16Be::write(ctxt, bbox.x_min)?;
        I16Be::write(ctxt, bbox.y_min)?;
        I16Be::write(ctxt, bbox.x_max)?;
        I16Be::write(ctxt, bbox.y_max)?;
        Ok(())
    }
}

impl<'a> GlyfTable<'a> {
    pub fn new(records: Vec<GlyfRecord<'a>>) -> Result<Self, ParseError> {
        if records.len() > usize::from(u16::MAX) {
            return Err(ParseError::LimitExceeded);
        }
        Ok(GlyfTable { records })
    }

    /// Returns the number of glyphs in this `glyf` table.
    pub fn num_glyphs(&self) -> u16 {
        // NOTE(cast): Safe as we check records length in `new` and `push`
        self.records.len() as u16
    }

    pub fn push(&mut self, record: GlyfRecord<'a>) -> Result<(), ParseError> {
        if self.num_glyphs() < u16::MAX {
            self.records.push(record);
            Ok(())
        } else {
            Err(ParseError::LimitExceeded)
        }
    }

    pub fn get(&self, glyph_index: u16) -> Result<&GlyfRecord<'a>, ParseError> {
        self.records
            .get(usize::from(glyph_index))
            .ok_or(ParseError::BadIndex)
    }

    /// Returns a parsed glyph for `glyph_index`, `None` if the glyph is empty.
    pub fn parse_glyph(&self, glyph_index: u16) -> Result<Option<Glyph<'a>>, ParseError> {
        match self.get(glyph_index)? {
            GlyfRecord::Empty => Ok(None),
            GlyfRecord::Present { scope, .. } => scope.read::<Glyph<'_>>().map(Some),
            GlyfRecord::Parsed(glyph) => Ok(Some(glyph.clone())),
        }
    }

    /// Returns the glyph ids that `glyph_index` depends on, including itself first.
    ///
    /// For a composite glyph the components are resolved transitively. Fails with
    /// `ParseError::LimitExceeded` when components nest deeper than
    /// [COMPOSITE_GLYPH_RECURSION_LIMIT].
    pub fn dependencies(&self, glyph_index: u16) -> Result<Vec<u16>, ParseError> {
        let mut deps = vec![glyph_index];
        self.dependencies_impl(glyph_index, 0, &mut deps)?;
        Ok(deps)
    }

    fn dependencies_impl(
        &self,
        glyph_index: u16,
        depth: u8,
        deps: &mut Vec<u16>,
    ) -> Result<(), ParseError> {
        if depth > COMPOSITE_GLYPH_RECURSION_LIMIT {
            return Err(ParseError::LimitExceeded);
        }

        if !self.get(glyph_index)?.is_composite() {
            return Ok(());
        }
        // NOTE(unwrap): Safe as a composite record is never Empty
        let glyph = self.parse_glyph(glyph_index)?.unwrap();
        if let GlyphData::Composite { glyphs, .. } = &glyph.data {
            for component in glyphs {
                if !deps.contains(&component.glyph_index) {
                    deps.push(component.glyph_index);
                }
                self.dependencies_impl(component.glyph_index, depth + 1, deps)?;
            }
        }
        Ok(())
    }
}

impl<'a> GlyfRecord<'a> {
    pub fn number_of_contours(&self) -> i16 {
        match self {
            GlyfRecord::Empty => 0,
            GlyfRecord::Present {
                number_of_contours, ..
            } => *number_of_contours,
            GlyfRecord::Parsed(glyph) => glyph.number_of_contours,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.number_of_contours() < 0
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, GlyfRecord::Empty)
    }

    /// Turn self from GlyfRecord::Present into GlyfRecord::Parsed
    pub fn parse(&mut self) -> Result<(), ParseError> {
        if let GlyfRecord::Present { scope, .. } = self {
            *self = scope.read::<Glyph<'_>>().map(GlyfRecord::Parsed)?;
        }
        Ok(())
    }

    /// The x_min of the glyph's bounding box; 0 for an empty glyph.
    pub fn x_min(&self) -> Result<i16, ParseError> {
        match self {
            GlyfRecord::Empty => Ok(0),
            // x_min follows number_of_contours in the header
            GlyfRecord::Present { scope, .. } => {
                let mut ctxt = scope.ctxt();
                let _number_of_contours = ctxt.read_i16be()?;
                Ok(ctxt.read_i16be()?)
            }
            GlyfRecord::Parsed(glyph) => Ok(glyph.bounding_box.x_min),
        }
    }
}

impl CompositeGlyphFlag {
    pub fn arg_1_and_2_are_words(self) -> bool {
        self & Self::ARG_1_AND_2_ARE_WORDS == Self::ARG_1_AND_2_ARE_WORDS
    }

    pub fn args_are_xy_values(self) -> bool {
        self & Self::ARGS_ARE_XY_VALUES == Self::ARGS_ARE_XY_VALUES
    }

    pub fn we_have_a_scale(self) -> bool {
        self & Self::WE_HAVE_A_SCALE == Self::WE_HAVE_A_SCALE
    }

    pub fn we_have_an_x_and_y_scale(self) -> bool {
        self & Self::WE_HAVE_AN_X_AND_Y_SCALE == Self::WE_HAVE_AN_X_AND_Y_SCALE
    }

    pub fn we_have_a_two_by_two(self) -> bool {
        self & Self::WE_HAVE_A_TWO_BY_TWO == Self::WE_HAVE_A_TWO_BY_TWO
    }

    pub fn more_components(self) -> bool {
        self & Self::MORE_COMPONENTS == Self::MORE_COMPONENTS
    }

    pub fn we_have_instructions(self) -> bool {
        self & Self::WE_HAVE_INSTRUCTIONS == Self::WE_HAVE_INSTRUCTIONS
    }
}

impl CompositeGlyph {
    /// The offset of the component as (dx, dy), if its arguments are xy values.
    pub fn offset(&self) -> Option<(i16, i16)> {
        if self.flags.args_are_xy_values() {
            let dx = i16::try_from(i32::from(self.argument1)).ok()?;
            let dy = i16::try_from(i32::from(self.argument2)).ok()?;
            Some((dx, dy))
        } else {
            None
        }
    }
}

impl SimpleGlyphFlag {
    pub fn is_on_curve(self) -> bool {
        self & Self::ON_CURVE_POINT == Self::ON_CURVE_POINT
    }

    pub fn is_overlap_simple(self) -> bool {
        self & Self::OVERLAP_SIMPLE == Self::OVERLAP_SIMPLE
    }

    pub fn x_is_short(self) -> bool {
        self & Self::X_SHORT_VECTOR == Self::X_SHORT_VECTOR
    }

    pub fn y_is_short(self) -> bool {
        self & Self::Y_SHORT_VECTOR == Self::Y_SHORT_VECTOR
    }

    pub fn is_repeated(self) -> bool {
        self & Self::REPEAT_FLAG == Self::REPEAT_FLAG
    }

    pub fn x_short_sign(self) -> i16 {
        if self.x_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn y_short_sign(self) -> i16 {
        if self.y_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn x_is_same_or_positive(self) -> bool {
        self & Self::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR
            == Self::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR
    }

    pub fn y_is_same_or_positive(self) -> bool {
        self & Self::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR
            == Self::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR
    }
}

impl Point {
    pub fn zero() -> Self {
        Point(0, 0)
    }
}

impl BoundingBox {
    pub fn empty() -> Self {
        BoundingBox {
            x_min: 0,
            x_max: 0,
            y_min: 0,
            y_max: 0,
        }
    }

    /// Calculate xMin, xMax and yMin, yMax from a collection of `Points`
    ///
    /// Panics if `points` is empty.
    pub fn from_points(points: impl ExactSizeIterator<Item = Point>) -> Self {
        assert!(points.len() > 0);
        let mut points = points.peekable();

        // NOTE(unwrap): Safe as length is at least 1
        let &Point(initial_x, initial_y) = points.peek().unwrap();
        let initial = BoundingBox {
            x_min: initial_x,
            x_max: initial_x,
            y_min: initial_y,
            y_max: initial_y,
        };

        points.fold(initial, |mut bounding_box, Point(x, y)| {
            bounding_box.x_min = i16::min(x, bounding_box.x_min);
            bounding_box.x_max = i16::max(x, bounding_box.x_max);
            bounding_box.y_min = i16::min(y, bounding_box.y_min);
            bounding_box.y_max = i16::max(y, bounding_box.y_max);
            bounding_box
        })
    }
}

impl From<CompositeGlyphArgument> for i32 {
    fn from(arg: CompositeGlyphArgument) -> Self {
        match arg {
            CompositeGlyphArgument::U8(value) => i32::from(value),
            CompositeGlyphArgument::I8(value) => i32::from(value),
            CompositeGlyphArgument::U16(value) => i32::from(value),
            CompositeGlyphArgument::I16(value) => i32::from(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{buffer, WriteBuffer};

    pub(crate) fn simple_glyph_fixture() -> Glyph<'static> {
        let coordinates = vec![
            Point(0, 0),
            Point(120, 700),
            Point(520, 700),
            Point(640, 0),
        ];
        Glyph {
            number_of_contours: 1,
            bounding_box: BoundingBox {
                x_min: 0,
                x_max: 640,
                y_min: 0,
                y_max: 700,
            },
            data: GlyphData::Simple(SimpleGlyph {
                end_pts_of_contours: vec![3],
                instructions: &[],
                flags: vec![SimpleGlyphFlag::ON_CURVE_POINT; 4],
                coordinates,
            }),
        }
    }

    pub(crate) fn composite_glyph_fixture(instructions: &'static [u8]) -> Glyph<'static> {
        let mut flags = CompositeGlyphFlag::ARG_1_AND_2_ARE_WORDS
            | CompositeGlyphFlag::ARGS_ARE_XY_VALUES
            | CompositeGlyphFlag::ROUND_XY_TO_GRID;
        if !instructions.is_empty() {
            flags |= CompositeGlyphFlag::WE_HAVE_INSTRUCTIONS;
        }
        Glyph {
            number_of_contours: -1,
            bounding_box: BoundingBox {
                x_min: 0,
                x_max: 1290,
                y_min: 0,
                y_max: 700,
            },
            data: GlyphData::Composite {
                glyphs: vec![
                    CompositeGlyph {
                        flags: flags | CompositeGlyphFlag::MORE_COMPONENTS,
                        glyph_index: 1,
                        argument1: CompositeGlyphArgument::I16(0),
                        argument2: CompositeGlyphArgument::I16(0),
                        scale: None,
                    },
                    CompositeGlyph {
                        flags,
                        glyph_index: 1,
                        argument1: CompositeGlyphArgument::I16(650),
                        argument2: CompositeGlyphArgument::I16(0),
                        scale: None,
                    },
                ],
                instructions,
            },
        }
    }

    #[test]
    fn simple_glyph_round_trip() {
        let glyph = simple_glyph_fixture();

        let mut ctxt = WriteBuffer::new();
        Glyph::write(&mut ctxt, glyph.clone()).unwrap();

        let read_back = ReadScope::new(ctxt.bytes()).read::<Glyph<'_>>().unwrap();
        assert_eq!(read_back, glyph);
    }

    #[test]
    fn composite_glyph_round_trip() {
        let glyph = composite_glyph_fixture(&[1, 2, 3, 4]);

        let mut ctxt = WriteBuffer::new();
        Glyph::write(&mut ctxt, glyph.clone()).unwrap();

        match ReadScope::new(ctxt.bytes()).read::<Glyph<'_>>() {
            Ok(Glyph {
                data: GlyphData::Composite { instructions, .. },
                ..
            }) => assert_eq!(instructions, &[1, 2, 3, 4]),
            _ => panic!("did not read back expected instructions"),
        }
    }

    // A composite glyph read with has_instructions = yes but instruction length 0 must
    // still be written with an instruction length field.
    #[test]
    fn write_composite_glyph_with_empty_instructions() {
        let glyph = composite_glyph_fixture(&[]);

        let mut ctxt = WriteBuffer::new();
        Glyph::write(&mut ctxt, glyph).unwrap();

        match ReadScope::new(ctxt.bytes()).read::<Glyph<'_>>() {
            Ok(Glyph {
                data: GlyphData::Composite { instructions, .. },
                ..
            }) => assert_eq!(instructions, &[]),
            _ => panic!("unable to read back glyph"),
        }
    }

    #[test]
    fn simple_glyph_with_zero_contours() {
        let glyph_data = &[
            0, 0, // number of contours
            0, 0, 0, 0, 0, 0, 0, 0, // bounding box
            0, 0, // instruction length
        ];
        let glyph = ReadScope::new(glyph_data).read::<Glyph<'_>>().unwrap();
        match glyph.data {
            GlyphData::Simple(simple) => {
                assert!(simple.coordinates.is_empty());
                assert!(simple.end_pts_of_contours.is_empty());
            }
            GlyphData::Composite { .. } => panic!("expected simple glyph"),
        }
    }

    #[test]
    fn repeat_flag_shares_on_curve_bit() {
        // Four identical flags should collapse to a single REPEAT run on write and
        // come back with the same on-curve bits.
        let glyph = simple_glyph_fixture();

        let mut ctxt = WriteBuffer::new();
        Glyph::write(&mut ctxt, glyph.clone()).unwrap();

        let read_back = ReadScope::new(ctxt.bytes()).read::<Glyph<'_>>().unwrap();
        match (read_back.data, glyph.data) {
            (GlyphData::Simple(new), GlyphData::Simple(old)) => {
                assert!(new
                    .flags
                    .iter()
                    .zip(old.flags.iter())
                    .all(|(a, b)| a.is_on_curve() == b.is_on_curve()));
                assert_eq!(new.coordinates, old.coordinates);
            }
            _ => panic!("expected simple glyphs"),
        }
    }

    #[test]
    fn glyf_write_pads_to_even_length() {
        let glyf = GlyfTable {
            records: vec![GlyfRecord::Empty, GlyfRecord::Parsed(simple_glyph_fixture())],
        };
        let (loca, _data) = buffer::<_, GlyfTable<'_>>(glyf, ()).unwrap();
        assert!(loca.offsets.iter().all(|offset| offset % 2 == 0));
    }

    #[test]
    fn dependencies_transitive() {
        // glyph 2 is a composite referencing glyph 1 (twice)
        let glyf = GlyfTable {
            records: vec![
                GlyfRecord::Empty,
                GlyfRecord::Parsed(simple_glyph_fixture()),
                GlyfRecord::Parsed(composite_glyph_fixture(&[])),
            ],
        };
        assert_eq!(glyf.dependencies(2).unwrap(), vec![2, 1]);
        assert_eq!(glyf.dependencies(1).unwrap(), vec![1]);
    }
}
