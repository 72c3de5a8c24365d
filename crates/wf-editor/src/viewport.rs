//! Pan/zoom transform between screen pixels and canvas units.
//!
//! `screen = canvas * zoom + pan`.

use kurbo::{Point, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.25, 2.0)
    }
}

impl Viewport {
    pub fn new(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            min_zoom,
            max_zoom,
        }
    }

    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        ((screen.to_vec2() - self.pan) / self.zoom).to_point()
    }

    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        (canvas.to_vec2() * self.zoom + self.pan).to_point()
    }

    /// Convert a screen-pixel distance to canvas units.
    pub fn to_canvas_len(&self, px: f64) -> f64 {
        px / self.zoom
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Set the zoom (clamped), keeping the canvas point under `screen`
    /// fixed.
    pub fn zoom_at(&mut self, screen: Point, zoom: f64) {
        let anchor = self.screen_to_canvas(screen);
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.pan = screen.to_vec2() - anchor.to_vec2() * self.zoom;
    }

    pub fn zoom_by(&mut self, screen: Point, factor: f64) {
        self.zoom_at(screen, self.zoom * factor);
    }

    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_keeps_point_under_pointer() {
        let mut vp = Viewport::default();
        vp.pan = Vec2::new(-37.5, 12.25);
        vp.zoom = 0.8;
        let pointers = [Point::new(0.0, 0.0), Point::new(412.0, 97.0), Point::new(-30.0, 800.0)];
        let zooms = [0.25, 0.5, 1.0, 1.37, 2.0];
        for &p in &pointers {
            for &z in &zooms {
                let before = vp.screen_to_canvas(p);
                vp.zoom_at(p, z);
                let after = vp.screen_to_canvas(p);
                assert!(before.distance(after) < 1e-6, "{p:?} at {z}: {before:?} → {after:?}");
            }
        }
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::default();
        vp.zoom_at(Point::new(100.0, 100.0), 10.0);
        assert_eq!(vp.zoom, 2.0);
        vp.zoom_by(Point::new(100.0, 100.0), 0.001);
        assert_eq!(vp.zoom, 0.25);
    }

    #[test]
    fn screen_canvas_roundtrip() {
        let mut vp = Viewport::default();
        vp.pan_by(Vec2::new(50.0, -20.0));
        vp.zoom_at(Point::new(10.0, 10.0), 1.5);
        let c = Point::new(123.0, 456.0);
        assert!(vp.screen_to_canvas(vp.canvas_to_screen(c)).distance(c) < 1e-9);
    }
}
