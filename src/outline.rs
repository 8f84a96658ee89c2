//! Glyph outline traversal.

use crate::error::ParseError;
use crate::tables::glyf::{CompositeGlyphScale, Point as GlyfPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point(pub f32, pub f32);

/// A 2×2 transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

/// Trait for types that can supply glyph outlines.
pub trait OutlineBuilder {
    type Error: From<ParseError>;

    fn visit<S: OutlineSink>(
        &mut self,
        glyph_index: u16,
        sink: &mut S,
    ) -> Result<(), Self::Error>;
}

/// A sink for glyph outline path segments.
pub trait OutlineSink {
    fn move_to(&mut self, point: Point);

    fn line_to(&mut self, point: Point);

    fn quad_to(&mut self, control: Point, point: Point);

    fn curve_to(&mut self, control1: Point, control2: Point, point: Point);

    fn close(&mut self);
}

impl Point {
    pub fn mid(self, other: Point) -> Point {
        let x = (self.0 + other.0) / 2.;
        let y = (self.1 + other.1) / 2.;
        Point(x, y)
    }

    pub fn offset(self, offset: Point) -> Point {
        Point(self.0 + offset.0, self.1 + offset.1)
    }

    pub fn scale(self, scale: Matrix) -> Point {
        Point(
            (self.0 * scale.x1) + (self.1 * scale.y1),
            (self.0 * scale.x2) + (self.1 * scale.y2),
        )
    }
}

impl Matrix {
    pub fn identity() -> Matrix {
        Matrix {
            x1: 1.,
            y1: 0.,
            x2: 0.,
            y2: 1.,
        }
    }
}

impl From<GlyfPoint> for Point {
    fn from(point: GlyfPoint) -> Self {
        Point(point.0 as f32, point.1 as f32)
    }
}

impl From<CompositeGlyphScale> for Matrix {
    fn from(scale: CompositeGlyphScale) -> Self {
        match scale {
            CompositeGlyphScale::Scale(scale) => {
                let scale = f32::from(scale);
                Matrix {
                    x1: scale,
                    y1: 0.,
                    x2: 0.,
                    y2: scale,
                }
            }
            CompositeGlyphScale::XY { x_scale, y_scale } => Matrix {
                x1: f32::from(x_scale),
                y1: 0.,
                x2: 0.,
                y2: f32::from(y_scale),
            },
            CompositeGlyphScale::Matrix(matrix) => Matrix {
                x1: f32::from(matrix[0][0]),
                y1: f32::from(matrix[0][1]),
                x2: f32::from(matrix[1][0]),
                y2: f32::from(matrix[1][1]),
            },
        }
    }
}

/// An `OutlineSink` that records the bounding box of the segments it receives.
pub struct BboxSink {
    started: bool,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BboxSink {
    pub fn new() -> Self {
        BboxSink {
            started: false,
            x_min: 0.,
            y_min: 0.,
            x_max: 0.,
            y_max: 0.,
        }
    }

    fn extend(&mut self, point: Point) {
        if self.started {
            self.x_min = self.x_min.min(point.0);
            self.y_min = self.y_min.min(point.1);
            self.x_max = self.x_max.max(point.0);
            self.y_max = self.y_max.max(point.1);
        } else {
            self.started = true;
            self.x_min = point.0;
            self.y_min = point.1;
            self.x_max = point.0;
            self.y_max = point.1;
        }
    }
}

impl Default for BboxSink {
    fn default() -> Self {
        BboxSink::new()
    }
}

impl OutlineSink for BboxSink {
    fn move_to(&mut self, point: Point) {
        self.extend(point);
    }

    fn line_to(&mut self, point: Point) {
        self.extend(point);
    }

    fn quad_to(&mut self, control: Point, point: Point) {
        self.extend(control);
        self.extend(point);
    }

    fn curve_to(&mut self, control1: Point, control2: Point, point: Point) {
        self.extend(control1);
        self.extend(control2);
        self.extend(point);
    }

    fn close(&mut self) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fmt::Write;

    /// Records the path calls it receives as text, for comparing outlines.
    pub(crate) struct RecordingSink {
        pub path: String,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            RecordingSink {
                path: String::new(),
            }
        }
    }

    impl OutlineSink for RecordingSink {
        fn move_to(&mut self, point: Point) {
            writeln!(self.path, "move_to({}, {})", point.0, point.1).unwrap();
        }

        fn line_to(&mut self, point: Point) {
            writeln!(self.path, "line_to({}, {})", point.0, point.1).unwrap();
        }

        fn quad_to(&mut self, control: Point, point: Point) {
            writeln!(
                self.path,
                "quad_to({}, {}, {}, {})",
                control.0, control.1, point.0, point.1
            )
            .unwrap();
        }

        fn curve_to(&mut self, control1: Point, control2: Point, point: Point) {
            writeln!(
                self.path,
                "curve_to({}, {}, {}, {}, {}, {})",
                control1.0, control1.1, control2.0, control2.1, point.0, point.1
            )
            .unwrap();
        }

        fn close(&mut self) {
            writeln!(self.path, "close()").unwrap();
        }
    }
}
