//! Sprite resolution: which image (if any) to draw for an entity.
//!
//! Resolution only reads the avatar table and the image cache, so it can be
//! called freely from the render pass. A frame that is still decoding simply
//! resolves to a placeholder.

use crate::images::{ImageCache, ImageKey};
use crate::world::{AvatarMap, Facing, frame_index};

use egui::{Color32, Pos2, Rect, Vec2, pos2};

/// Logical on-screen size of the longer side of a sprite.
pub const SPRITE_SIZE: f32 = 48.0;

/// Radius of the circle drawn when no image is available.
pub const PLACEHOLDER_RADIUS: f32 = 14.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The avatar record itself is unknown.
    MissingAvatar,
    /// The avatar is known but this frame is absent, pending or failed.
    MissingFrame,
}

impl Placeholder {
    pub const fn color(self) -> Color32 {
        match self {
            Self::MissingAvatar => Color32::from_rgb(200, 70, 70),
            Self::MissingFrame => Color32::from_rgb(90, 130, 210),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sprite<I> {
    Image { image: I, flip: bool },
    Placeholder(Placeholder),
}

/// Pick the image for `avatar` facing `facing` at animation `phase`.
pub fn resolve<I: Clone>(
    avatars: &AvatarMap,
    cache: &ImageCache<I>,
    avatar: &str,
    facing: Facing,
    phase: f32,
) -> Sprite<I> {
    if !avatars.contains_key(avatar) {
        return Sprite::Placeholder(Placeholder::MissingAvatar);
    }
    let (canonical, flip) = facing.canonical();
    let key = ImageKey::frame(avatar, canonical, frame_index(phase));
    match cache.ready(&key) {
        Some(image) => Sprite::Image { image, flip },
        None => Sprite::Placeholder(Placeholder::MissingFrame),
    }
}

/// Destination rectangle for an image of `image_size` anchored at `anchor`.
///
/// The image is scaled so its longer side is [`SPRITE_SIZE`], centered
/// horizontally on the anchor and standing on it.
pub fn sprite_rect(anchor: Pos2, image_size: Vec2) -> Rect {
    let longest = image_size.x.max(image_size.y);
    let scale = if longest > 0.0 { SPRITE_SIZE / longest } else { 0.0 };
    let size = image_size * scale;
    Rect::from_min_size(pos2(anchor.x - size.x / 2.0, anchor.y - size.y), size)
}

/// Texture coordinates, mirrored horizontally when `flip` is set.
pub fn uv_rect(flip: bool) -> Rect {
    if flip {
        Rect::from_min_max(pos2(1.0, 0.0), pos2(0.0, 1.0))
    } else {
        Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0))
    }
}

/// Where the name label sits for a sprite (or placeholder) at `anchor`.
pub fn label_anchor(anchor: Pos2, sprite: Option<Rect>) -> Pos2 {
    match sprite {
        Some(rect) => pos2(anchor.x, rect.top() - 4.0),
        None => pos2(anchor.x, anchor.y - PLACEHOLDER_RADIUS - 4.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Avatar;

    type Size = [u32; 2];

    fn knight_tables() -> (AvatarMap, ImageCache<Size>) {
        let mut avatars = AvatarMap::default();
        avatars.insert(
            "knight".into(),
            Avatar {
                name: "knight".into(),
                ..Avatar::default()
            },
        );
        let cache = ImageCache::default();
        cache.finish(ImageKey::frame("knight", Facing::East, 0), Some([32, 32]));
        cache.finish(ImageKey::frame("knight", Facing::East, 1), Some([32, 48]));
        cache.finish(ImageKey::frame("knight", Facing::South, 0), Some([16, 16]));
        cache.begin(ImageKey::frame("knight", Facing::South, 1));
        (avatars, cache)
    }

    #[test]
    fn unknown_avatar_is_placeholder() {
        let (avatars, cache) = knight_tables();
        assert_eq!(
            resolve(&avatars, &cache, "mage", Facing::South, 0.0),
            Sprite::Placeholder(Placeholder::MissingAvatar)
        );
    }

    #[test]
    fn pending_or_absent_frame_is_placeholder() {
        let (avatars, cache) = knight_tables();
        // pending
        assert_eq!(
            resolve(&avatars, &cache, "knight", Facing::South, 1.2),
            Sprite::Placeholder(Placeholder::MissingFrame)
        );
        // never requested
        assert_eq!(
            resolve(&avatars, &cache, "knight", Facing::North, 0.0),
            Sprite::Placeholder(Placeholder::MissingFrame)
        );
    }

    #[test]
    fn phase_truncates_to_frame() {
        let (avatars, cache) = knight_tables();
        assert_eq!(
            resolve(&avatars, &cache, "knight", Facing::East, 1.99),
            Sprite::Image {
                image: [32, 48],
                flip: false
            }
        );
    }

    #[test]
    fn west_uses_flipped_east_frames() {
        let (avatars, cache) = knight_tables();
        assert_eq!(
            resolve(&avatars, &cache, "knight", Facing::West, 0.4),
            Sprite::Image {
                image: [32, 32],
                flip: true
            }
        );
    }

    #[test]
    fn placeholder_colors_differ() {
        assert_ne!(
            Placeholder::MissingAvatar.color(),
            Placeholder::MissingFrame.color()
        );
    }

    #[test]
    fn sprite_stands_on_anchor() {
        let rect = sprite_rect(pos2(100.0, 200.0), Vec2::new(32.0, 64.0));
        assert_eq!(rect.size(), Vec2::new(24.0, 48.0));
        assert_eq!(rect.center().x, 100.0);
        assert_eq!(rect.bottom(), 200.0);
    }

    #[test]
    fn wide_sprite_keeps_aspect() {
        let rect = sprite_rect(pos2(0.0, 0.0), Vec2::new(96.0, 48.0));
        assert_eq!(rect.size(), Vec2::new(48.0, 24.0));
    }

    #[test]
    fn flipped_uv_mirrors_x_only() {
        let uv = uv_rect(true);
        assert_eq!(uv.min, pos2(1.0, 0.0));
        assert_eq!(uv.max, pos2(0.0, 1.0));
    }
}
