use kurbo::{Affine, BezPath, Point};
use skrifa::outline::OutlinePen;

/// Collects glyph outlines into a path, mapping font coordinates (y up)
/// through `transform` as they arrive.
pub struct PathPen {
    pub path: BezPath,
    transform: Affine,
}

impl PathPen {
    pub fn new(transform: Affine) -> Self {
        Self {
            path: BezPath::new(),
            transform,
        }
    }

    /// A pen placing the glyph origin at `origin` on a y-down surface, with
    /// an optional horizontal slant for synthesized italics.
    pub fn at(origin: Point, slant: f64) -> Self {
        Self::new(
            Affine::translate(origin.to_vec2())
                * Affine::scale_non_uniform(1.0, -1.0)
                * Affine::skew(slant, 0.0),
        )
    }

    fn map(&self, x: f32, y: f32) -> Point {
        self.transform * Point::new(x as f64, y as f64)
    }
}

impl OutlinePen for PathPen {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.path.move_to(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.path.line_to(p);
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        let (c0, p) = (self.map(cx0, cy0), self.map(x, y));
        self.path.quad_to(c0, p);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        let (c0, c1, p) = (self.map(cx0, cy0), self.map(cx1, cy1), self.map(x, y));
        self.path.curve_to(c0, c1, p);
    }

    fn close(&mut self) {
        self.path.close_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_and_translates() {
        let mut pen = PathPen::at(Point::new(10.0, 100.0), 0.0);
        pen.move_to(0.0, 0.0);
        pen.line_to(5.0, 20.0);
        pen.close();

        let points: Vec<_> = pen.path.elements().iter().filter_map(|el| el.end_point()).collect();
        assert_eq!(points, [Point::new(10.0, 100.0), Point::new(15.0, 80.0)]);
    }

    #[test]
    fn slant_leans_right() {
        let mut pen = PathPen::at(Point::ZERO, 0.25);
        pen.move_to(0.0, 8.0);

        let start = pen.path.elements()[0].end_point();
        assert_eq!(start, Some(Point::new(2.0, -8.0)));
    }
}
