//! Outline emission for `glyf` glyphs.

use crate::error::ParseError;
use crate::outline::{Matrix, OutlineBuilder, OutlineSink, Point};

use super::{
    CompositeGlyphScale, GlyfTable, Glyph, GlyphData, SimpleGlyph,
    COMPOSITE_GLYPH_RECURSION_LIMIT,
};

#[derive(Copy, Clone)]
struct VisitorState {
    offset: Point,
    scale: Option<CompositeGlyphScale>,
    depth: u8,
}

impl VisitorState {
    fn new() -> Self {
        VisitorState {
            offset: Point(0., 0.),
            scale: None,
            depth: 0,
        }
    }

    fn transform(&self, point: Point) -> Point {
        let scale = self
            .scale
            .map_or_else(Matrix::identity, Matrix::from);
        point.scale(scale).offset(self.offset)
    }
}

impl<'a> GlyfTable<'a> {
    /// Visit the outline of the glyph at `glyph_index`, delivering path segments to `sink`.
    ///
    /// Contours follow the TrueType implied on-curve midpoint rule: two consecutive
    /// off-curve points imply an on-curve point at their midpoint, and a contour that
    /// starts off-curve is closed back through its synthetic start.
    pub fn visit_outline<S: OutlineSink>(
        &self,
        glyph_index: u16,
        sink: &mut S,
    ) -> Result<(), ParseError> {
        self.visit_impl(glyph_index, VisitorState::new(), sink)
    }

    fn visit_impl<S: OutlineSink>(
        &self,
        glyph_index: u16,
        state: VisitorState,
        sink: &mut S,
    ) -> Result<(), ParseError> {
        if state.depth > COMPOSITE_GLYPH_RECURSION_LIMIT {
            return Err(ParseError::LimitExceeded);
        }

        let glyph = match self.parse_glyph(glyph_index)? {
            Some(glyph) => glyph,
            None => return Ok(()),
        };

        match glyph {
            Glyph {
                data: GlyphData::Simple(simple),
                ..
            } => visit_simple_glyph(&simple, state, sink),
            Glyph {
                data: GlyphData::Composite { glyphs, .. },
                ..
            } => {
                for composite in glyphs {
                    let (dx, dy) = composite.offset().ok_or(ParseError::BadValue)?;
                    let offset = state
                        .transform(Point(f32::from(dx), f32::from(dy)));
                    let child = VisitorState {
                        offset,
                        scale: composite.scale.or(state.scale),
                        depth: state.depth + 1,
                    };
                    self.visit_impl(composite.glyph_index, child, sink)?;
                }
                Ok(())
            }
        }
    }
}

fn visit_simple_glyph<S: OutlineSink>(
    glyph: &SimpleGlyph<'_>,
    state: VisitorState,
    sink: &mut S,
) -> Result<(), ParseError> {
    let mut begin = 0usize;
    for &end in &glyph.end_pts_of_contours {
        let end = usize::from(end);
        let contour_flags = glyph
            .flags
            .get(begin..=end)
            .ok_or(ParseError::BadIndex)?;
        let contour_points = glyph
            .coordinates
            .get(begin..=end)
            .ok_or(ParseError::BadIndex)?;

        visit_contour(contour_flags, contour_points, state, sink);
        begin = end + 1;
    }
    Ok(())
}

fn visit_contour<S: OutlineSink>(
    flags: &[super::SimpleGlyphFlag],
    points: &[super::Point],
    state: VisitorState,
    sink: &mut S,
) {
    let n = points.len();
    if n == 0 {
        return;
    }

    let on_curve = |index: usize| flags[index % n].is_on_curve();
    let point = |index: usize| state.transform(Point::from(points[index % n]));

    // Find the contour start: the first point if on-curve, the last point if that is
    // on-curve, otherwise the midpoint of the two (both off-curve).
    let (start, first_index, count) = if on_curve(0) {
        (point(0), 1, n - 1)
    } else if on_curve(n - 1) {
        (point(n - 1), 0, n - 1)
    } else {
        (point(0).mid(point(n - 1)), 0, n)
    };

    sink.move_to(start);

    let mut pending_control: Option<Point> = None;
    for k in 0..count {
        let index = first_index + k;
        let p = point(index);
        match (on_curve(index), pending_control) {
            (true, None) => sink.line_to(p),
            (true, Some(control)) => {
                sink.quad_to(control, p);
                pending_control = None;
            }
            (false, None) => pending_control = Some(p),
            (false, Some(control)) => {
                // Two consecutive off-curve points imply an on-curve midpoint
                sink.quad_to(control, control.mid(p));
                pending_control = Some(p);
            }
        }
    }

    // Connect back to the start, through any trailing control point
    match pending_control {
        Some(control) => sink.quad_to(control, start),
        None => {}
    }
    sink.close();
}

impl<'a> OutlineBuilder for GlyfTable<'a> {
    type Error = ParseError;

    fn visit<S: OutlineSink>(&mut self, glyph_index: u16, sink: &mut S) -> Result<(), ParseError> {
        self.visit_outline(glyph_index, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{composite_glyph_fixture, simple_glyph_fixture};
    use super::super::{GlyfRecord, GlyfTable};
    use crate::outline::tests::RecordingSink;

    #[test]
    fn simple_glyph_outline() {
        let glyf = GlyfTable {
            records: vec![GlyfRecord::Empty, GlyfRecord::Parsed(simple_glyph_fixture())],
        };
        let mut sink = RecordingSink::new();
        glyf.visit_outline(1, &mut sink).unwrap();
        let expected = "move_to(0, 0)\n\
                        line_to(120, 700)\n\
                        line_to(520, 700)\n\
                        line_to(640, 0)\n\
                        close()\n";
        assert_eq!(sink.path, expected);
    }

    #[test]
    fn empty_glyph_outline() {
        let glyf = GlyfTable {
            records: vec![GlyfRecord::Empty],
        };
        let mut sink = RecordingSink::new();
        glyf.visit_outline(0, &mut sink).unwrap();
        assert!(sink.path.is_empty());
    }

    #[test]
    fn composite_glyph_outline_offsets_children() {
        let glyf = GlyfTable {
            records: vec![
                GlyfRecord::Empty,
                GlyfRecord::Parsed(simple_glyph_fixture()),
                GlyfRecord::Parsed(composite_glyph_fixture(&[])),
            ],
        };
        let mut sink = RecordingSink::new();
        glyf.visit_outline(2, &mut sink).unwrap();
        // The second component is offset by (650, 0)
        assert!(sink.path.contains("move_to(0, 0)"));
        assert!(sink.path.contains("move_to(650, 0)"));
        assert!(sink.path.contains("line_to(770, 700)"));
    }
}
