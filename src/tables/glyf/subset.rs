//! Subsetting of the `glyf` table.

use rustc_hash::FxHashMap;

use super::{GlyfRecord, GlyfTable, GlyphData};
use crate::error::ParseError;

/// The result of subsetting a `glyf` table.
///
/// Holds the retained glyph records (components patched to their new ids) and the
/// old ↔ new glyph id mappings.
pub struct SubsetGlyph<'a> {
    records: Vec<GlyfRecord<'a>>,
    new_to_old_id: Vec<u16>,
    old_to_new_id: FxHashMap<u16, u16>,
}

impl<'a> GlyfTable<'a> {
    /// Returns a copy of this table that only contains the glyphs specified by `glyph_ids`.
    ///
    /// The glyphs appear in the supplied order; dependencies of composite glyphs are
    /// appended after them. `glyph_ids` is expected to begin with glyph 0 (`.notdef`).
    pub fn subset(&self, glyph_ids: &[u16]) -> Result<SubsetGlyph<'a>, ParseError> {
        let mut glyph_ids = glyph_ids.to_vec();

        // Add the dependencies of composite glyphs to the end
        let mut old_to_new_id = FxHashMap::with_capacity_and_hasher(
            glyph_ids.len(),
            Default::default(),
        );
        for (new_id, &old_id) in glyph_ids.iter().enumerate() {
            old_to_new_id.insert(old_id, new_id as u16);
        }
        let mut i = 0;
        while i < glyph_ids.len() {
            let glyph_id = glyph_ids[i];
            i += 1;
            if glyph_id == 0 || !self.get(glyph_id)?.is_composite() {
                continue;
            }
            for dep in self.dependencies(glyph_id)?.into_iter().skip(1) {
                if !old_to_new_id.contains_key(&dep) {
                    if glyph_ids.len() > usize::from(u16::MAX) {
                        return Err(ParseError::LimitExceeded);
                    }
                    old_to_new_id.insert(dep, glyph_ids.len() as u16);
                    glyph_ids.push(dep);
                }
            }
        }

        // Collect the records, rewriting component glyph ids as we go
        let mut records = Vec::with_capacity(glyph_ids.len());
        let mut new_to_old_id = Vec::with_capacity(glyph_ids.len());
        for &glyph_id in &glyph_ids {
            let record = if glyph_id == 0 {
                // `.notdef` stays empty when the source glyph is absent
                match self.get(0)? {
                    GlyfRecord::Empty => GlyfRecord::Empty,
                    record => record.clone(),
                }
            } else if self.get(glyph_id)?.is_composite() {
                // NOTE(unwrap): Safe as a composite record is never Empty
                let mut glyph = self.parse_glyph(glyph_id)?.unwrap();
                if let GlyphData::Composite { glyphs, .. } = &mut glyph.data {
                    for component in glyphs {
                        component.glyph_index = *old_to_new_id
                            .get(&component.glyph_index)
                            .ok_or(ParseError::BadIndex)?;
                    }
                }
                GlyfRecord::Parsed(glyph)
            } else {
                self.get(glyph_id)?.clone()
            };
            records.push(record);
            new_to_old_id.push(glyph_id);
        }

        Ok(SubsetGlyph {
            records,
            new_to_old_id,
            old_to_new_id,
        })
    }
}

impl<'a> SubsetGlyph<'a> {
    /// The number of glyphs retained, dependencies included.
    pub fn len(&self) -> usize {
        self.new_to_old_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_to_old_id.is_empty()
    }

    /// Return the old glyph id for the supplied new glyph id.
    pub fn old_id(&self, new_id: u16) -> u16 {
        self.new_to_old_id[usize::from(new_id)]
    }

    /// Return the new glyph id for the supplied old glyph id, 0 if it was not retained.
    pub fn new_id(&self, old_id: u16) -> u16 {
        self.old_to_new_id.get(&old_id).copied().unwrap_or(0)
    }

    /// The retained glyph ids in output order.
    pub fn old_ids(&self) -> &[u16] {
        &self.new_to_old_id
    }
}

impl<'a> From<SubsetGlyph<'a>> for GlyfTable<'a> {
    fn from(subset: SubsetGlyph<'a>) -> GlyfTable<'a> {
        GlyfTable {
            records: subset.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{composite_glyph_fixture, simple_glyph_fixture};
    use super::*;

    #[test]
    fn subset_pulls_in_composite_components() {
        let glyf = GlyfTable {
            records: vec![
                GlyfRecord::Empty,
                GlyfRecord::Parsed(simple_glyph_fixture()),
                GlyfRecord::Parsed(composite_glyph_fixture(&[])),
            ],
        };

        // Request only .notdef and the composite; the simple glyph must be appended
        let subset = glyf.subset(&[0, 2]).unwrap();
        assert_eq!(subset.old_ids(), &[0, 2, 1]);
        assert_eq!(subset.new_id(1), 2);
        assert_eq!(subset.old_id(1), 2);

        // The composite's component must point at the new id of glyph 1
        let glyf = GlyfTable::from(subset);
        match &glyf.records[1] {
            GlyfRecord::Parsed(glyph) => match &glyph.data {
                GlyphData::Composite { glyphs, .. } => {
                    assert!(glyphs.iter().all(|component| component.glyph_index == 2));
                }
                GlyphData::Simple(_) => panic!("expected composite glyph"),
            },
            _ => panic!("expected parsed glyph"),
        }
    }
}
