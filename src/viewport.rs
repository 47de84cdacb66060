//! Camera: the visible world rectangle, centered on the local player.

use crate::world::Vec2;

/// Top-left world coordinate plus screen size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub origin: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            origin: Vec2::ZERO,
            width,
            height,
        }
    }

    /// Update the screen size. Callers recenter afterwards.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    /// Center on `focus`, then clamp each axis to `[0, world_size - dim]`.
    ///
    /// When the world is smaller than the screen on an axis the origin
    /// collapses to 0 on that axis.
    pub fn recenter_on(&mut self, focus: Vec2, world_size: f32) {
        self.origin = Vec2::new(
            clamp_axis(focus.x - self.width / 2.0, world_size, self.width),
            clamp_axis(focus.y - self.height / 2.0, world_size, self.height),
        );
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world - self.origin
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen + self.origin
    }

    /// Inclusive test against the viewport grown by `margin` on every side.
    pub fn is_visible(&self, world: Vec2, margin: f32) -> bool {
        world.x >= self.origin.x - margin
            && world.x <= self.origin.x + self.width + margin
            && world.y >= self.origin.y - margin
            && world.y <= self.origin.y + self.height + margin
    }
}

fn clamp_axis(value: f32, world_size: f32, dimension: f32) -> f32 {
    let max = (world_size - dimension).max(0.0);
    value.clamp(0.0, max)
}
