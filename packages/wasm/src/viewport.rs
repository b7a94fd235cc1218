//! ViewportController - pan and zoom over the laid-out world.
//!
//! `x`/`y` are the world coordinates of the screen's top-left corner,
//! `width`/`height` are the screen size in pixels and `scale` is pixels per
//! world unit. Every operation emits one `ViewportState` when it actually
//! changed something and nothing otherwise.

use serde::Serialize;
use tracing::trace;

use crate::config::ViewportConfig;
use crate::events::{SubscriptionId, Subscribers};
use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ViewportState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl ViewportState {
    /// Visible region in world coordinates.
    pub fn world_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width / self.scale, self.height / self.scale)
    }
}

pub struct ViewportController {
    config: ViewportConfig,
    state: ViewportState,
    subscribers: Subscribers<ViewportState>,
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Self {
        let scale = config.initial_scale.clamp(config.min_scale, config.max_scale);
        Self {
            config,
            state: ViewportState {
                scale,
                ..ViewportState::default()
            },
            subscribers: Subscribers::new(),
        }
    }

    pub fn on_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ViewportState) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    /// Visible world region grown by `padding` screen pixels on each side.
    pub fn world_viewport(&self, padding: f32) -> Rect {
        self.state.world_rect().inflate(padding / self.state.scale)
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        Point::new(self.state.x + p.x / self.state.scale, self.state.y + p.y / self.state.scale)
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        Point::new((p.x - self.state.x) * self.state.scale, (p.y - self.state.y) * self.state.scale)
    }

    /// Container size changed.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return false;
        }
        let next = ViewportState {
            width,
            height,
            ..self.state
        };
        self.commit(next)
    }

    /// Pan by a screen-space drag delta.
    pub fn pan_by(&mut self, dx: f32, dy: f32) -> bool {
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        let next = ViewportState {
            x: self.state.x - dx / self.state.scale,
            y: self.state.y - dy / self.state.scale,
            ..self.state
        };
        self.commit(next)
    }

    /// Multiply the scale by `factor`, keeping the world point under the
    /// screen point `anchor` fixed.
    pub fn zoom_at(&mut self, factor: f32, anchor: Point) -> bool {
        if !factor.is_finite() || factor <= 0.0 || !anchor.is_finite() {
            return false;
        }
        let scale = self.clamp_scale(self.state.scale * factor);
        self.rescale(scale, anchor)
    }

    /// Set the scale, anchored at the screen center.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        if !scale.is_finite() || scale <= 0.0 {
            return false;
        }
        let anchor = Point::new(self.state.width * 0.5, self.state.height * 0.5);
        let scale = self.clamp_scale(scale);
        self.rescale(scale, anchor)
    }

    /// Center `point` (world) on screen without changing scale.
    pub fn center_on(&mut self, point: Point) -> bool {
        if !point.is_finite() {
            return false;
        }
        let next = ViewportState {
            x: point.x - self.state.width * 0.5 / self.state.scale,
            y: point.y - self.state.height * 0.5 / self.state.scale,
            ..self.state
        };
        self.commit(next)
    }

    /// Scale and center so `bounds` fits with the configured margin.
    pub fn fit_to(&mut self, bounds: Rect) -> bool {
        if !bounds.is_finite() || self.state.width <= 0.0 || self.state.height <= 0.0 {
            return false;
        }
        let margin = self.config.fit_margin;
        let available_w = (self.state.width - margin * 2.0).max(1.0);
        let available_h = (self.state.height - margin * 2.0).max(1.0);
        let scale = if bounds.width <= 0.0 || bounds.height <= 0.0 {
            self.state.scale
        } else {
            self.clamp_scale((available_w / bounds.width).min(available_h / bounds.height))
        };
        let center = bounds.center();
        let next = ViewportState {
            x: center.x - self.state.width * 0.5 / scale,
            y: center.y - self.state.height * 0.5 / scale,
            scale,
            ..self.state
        };
        self.commit(next)
    }

    fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.config.min_scale, self.config.max_scale)
    }

    fn rescale(&mut self, scale: f32, anchor: Point) -> bool {
        let world = self.screen_to_world(anchor);
        let next = ViewportState {
            x: world.x - anchor.x / scale,
            y: world.y - anchor.y / scale,
            scale,
            ..self.state
        };
        self.commit(next)
    }

    fn commit(&mut self, next: ViewportState) -> bool {
        if next == self.state {
            return false;
        }
        self.state = next;
        trace!(x = next.x, y = next.y, scale = next.scale, "viewport changed");
        self.subscribers.emit(&next);
        true
    }
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn controller() -> ViewportController {
        let mut vp = ViewportController::default();
        vp.resize(600.0, 400.0);
        vp
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_world_viewport() {
        let mut vp = controller();
        assert_eq!(vp.world_viewport(0.0), Rect::new(0.0, 0.0, 600.0, 400.0));
        vp.set_scale(2.0);
        let rect = vp.world_viewport(0.0);
        assert!(close(rect.width, 300.0));
        assert!(close(rect.height, 200.0));
        // Padding is in screen pixels.
        assert!(close(vp.world_viewport(20.0).width, 320.0));
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut vp = controller();
        vp.pan_by(-37.0, 12.0);
        let anchor = Point::new(150.0, 90.0);
        let before = vp.screen_to_world(anchor);
        assert!(vp.zoom_at(1.7, anchor));
        let after = vp.screen_to_world(anchor);
        assert!(close(before.x, after.x) && close(before.y, after.y));
    }

    #[test]
    fn test_scale_clamped() {
        let mut vp = controller();
        vp.zoom_at(1000.0, Point::new(0.0, 0.0));
        assert_eq!(vp.scale(), 4.0);
        vp.set_scale(0.0001);
        assert_eq!(vp.scale(), 0.05);
        assert!(!vp.zoom_at(-1.0, Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_round_trip_conversion() {
        let mut vp = controller();
        vp.set_scale(0.5);
        vp.pan_by(40.0, -20.0);
        let world = Point::new(123.0, -45.0);
        let back = vp.screen_to_world(vp.world_to_screen(world));
        assert!(close(world.x, back.x) && close(world.y, back.y));
    }

    #[test]
    fn test_fit_and_center() {
        let mut vp = controller();
        assert!(vp.fit_to(Rect::new(0.0, 0.0, 1040.0, 640.0)));
        // (600 - 80) / 1040 = 0.5, (400 - 80) / 640 = 0.5
        assert!(close(vp.scale(), 0.5));
        let center = vp.screen_to_world(Point::new(300.0, 200.0));
        assert!(close(center.x, 520.0) && close(center.y, 320.0));

        vp.center_on(Point::new(0.0, 0.0));
        let center = vp.screen_to_world(Point::new(300.0, 200.0));
        assert!(close(center.x, 0.0) && close(center.y, 0.0));
    }

    #[test]
    fn test_emits_only_on_change() {
        let mut vp = controller();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        vp.on_change(move |s| sink.borrow_mut().push(*s));

        assert!(!vp.pan_by(0.0, 0.0));
        assert!(!vp.resize(600.0, 400.0));
        assert!(vp.pan_by(10.0, 0.0));
        assert!(!vp.pan_by(f32::NAN, 0.0));

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].x, -10.0);
        assert_eq!(events[0].width, 600.0);
    }
}
