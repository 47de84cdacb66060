//! Render pipeline.
//!
//! This module owns everything that depends on `egui` for presentation.
//! It reads the session and produces one frame; nothing here mutates state.

use crate::images::{ImageCache, ImageKey};
use crate::net::ConnectionState;
use crate::npc::Npc;
use crate::reconcile::WorldState;
use crate::sprites::{self, PLACEHOLDER_RADIUS, SPRITE_SIZE, Sprite};
use crate::viewport::Viewport;
use crate::world::{Entity, Vec2};

use egui::{
    Align2, Color32, FontId, Painter, Pos2, Rect, Stroke, StrokeKind, TextureHandle, pos2, vec2,
};

const GROUND: Color32 = Color32::from_rgb(58, 92, 52);
const PANEL: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 160);
const LABEL_FONT: f32 = 12.0;
const OVERLAY_FONT: f32 = 14.0;
const PADDING: f32 = 8.0;

pub const INVENTORY_SLOTS: usize = 8;
const SLOT_SIZE: f32 = 36.0;
const SLOT_GAP: f32 = 4.0;

/// Everything one frame needs, borrowed from the session.
pub struct Scene<'a> {
    pub world: &'a WorldState,
    pub npcs: &'a [Npc],
    pub images: &'a ImageCache<TextureHandle>,
    pub connection: &'a ConnectionState,
    pub nearby: Option<&'a Npc>,
    pub trade_text: Option<&'a str>,
}

/// Paint the whole frame into `rect`.
pub fn paint(painter: &Painter, rect: Rect, scene: &Scene<'_>) {
    paint_background(painter, rect, scene);

    let viewport = &scene.world.viewport;
    let local = scene.world.local_id.as_ref();
    for player in scene.world.players.sorted() {
        if viewport.is_visible(player.position, SPRITE_SIZE) {
            let color = if local == Some(&player.id) {
                Color32::YELLOW
            } else {
                Color32::WHITE
            };
            paint_entity(painter, rect, scene, player, color);
        }
    }
    for npc in scene.npcs {
        if viewport.is_visible(npc.position(), SPRITE_SIZE) {
            paint_entity(painter, rect, scene, &npc.entity, Color32::LIGHT_GREEN);
        }
    }

    paint_overlays(painter, rect, scene);
}

// ---------------------------------------------------------------------------
// World layer
// ---------------------------------------------------------------------------

/// The part of the world the viewport shows, and the matching texture
/// coordinates. `None` when nothing of the world is on screen.
pub fn background_section(viewport: &Viewport, world_size: f32) -> Option<(Rect, Rect)> {
    if world_size <= 0.0 {
        return None;
    }
    let world = Rect::from_min_size(Pos2::ZERO, vec2(world_size, world_size));
    let visible = Rect::from_min_size(
        pos2(viewport.origin.x, viewport.origin.y),
        vec2(viewport.width, viewport.height),
    )
    .intersect(world);
    if !visible.is_positive() {
        return None;
    }
    let uv = Rect::from_min_max(
        (visible.min.to_vec2() / world_size).to_pos2(),
        (visible.max.to_vec2() / world_size).to_pos2(),
    );
    Some((visible, uv))
}

fn paint_background(painter: &Painter, rect: Rect, scene: &Scene<'_>) {
    painter.rect_filled(rect, 0.0, GROUND);

    let Some(texture) = scene.images.ready(&ImageKey::Background) else {
        return;
    };
    let viewport = &scene.world.viewport;
    let Some((visible, uv)) = background_section(viewport, scene.world.world_size) else {
        return;
    };
    let dest = visible.translate(rect.min.to_vec2() - vec2(viewport.origin.x, viewport.origin.y));
    painter.image(texture.id(), dest, uv, Color32::WHITE);
}

fn to_screen(rect: Rect, viewport: &Viewport, world: Vec2) -> Pos2 {
    let screen = viewport.world_to_screen(world);
    rect.min + vec2(screen.x, screen.y)
}

fn paint_entity(
    painter: &Painter,
    rect: Rect,
    scene: &Scene<'_>,
    entity: &Entity,
    name_color: Color32,
) {
    let anchor = to_screen(rect, &scene.world.viewport, entity.position);
    let sprite = sprites::resolve(
        &scene.world.avatars,
        scene.images,
        &entity.avatar,
        entity.facing,
        entity.anim_phase,
    );

    let drawn = match sprite {
        Sprite::Image { image, flip } => {
            let dest = sprites::sprite_rect(anchor, image.size_vec2());
            painter.image(image.id(), dest, sprites::uv_rect(flip), Color32::WHITE);
            Some(dest)
        }
        Sprite::Placeholder(placeholder) => {
            painter.circle_filled(anchor, PLACEHOLDER_RADIUS, placeholder.color());
            painter.circle_stroke(anchor, PLACEHOLDER_RADIUS, Stroke::new(1.0, Color32::BLACK));
            None
        }
    };

    outlined_text(
        painter,
        sprites::label_anchor(anchor, drawn),
        Align2::CENTER_BOTTOM,
        &entity.name,
        name_color,
    );
}

fn outlined_text(painter: &Painter, pos: Pos2, align: Align2, text: &str, color: Color32) {
    let font = FontId::proportional(LABEL_FONT);
    for offset in [vec2(-1.0, 0.0), vec2(1.0, 0.0), vec2(0.0, -1.0), vec2(0.0, 1.0)] {
        painter.text(pos + offset, align, text, font.clone(), Color32::BLACK);
    }
    painter.text(pos, align, text, font, color);
}

// ---------------------------------------------------------------------------
// Overlays
// ---------------------------------------------------------------------------

pub fn status_line(connection: &ConnectionState) -> String {
    match connection {
        ConnectionState::Connecting => "Connecting…".to_owned(),
        ConnectionState::Open => "Connected".to_owned(),
        ConnectionState::Closed { reason } => format!("Disconnected: {reason}"),
    }
}

/// Text of the info panel in the top-left corner.
pub fn info_lines(scene: &Scene<'_>) -> Vec<String> {
    let world = scene.world;
    let position = world.local_player().map_or_else(
        || "Position: -".to_owned(),
        |p| format!("Position: ({:.0}, {:.0})", p.position.x, p.position.y),
    );
    vec![
        format!(
            "Players: {}  Villagers: {}",
            world.players.len(),
            scene.npcs.len()
        ),
        position,
        format!(
            "Viewport: ({:.0}, {:.0})",
            world.viewport.origin.x, world.viewport.origin.y
        ),
        status_line(scene.connection),
    ]
}

/// Inventory slots, centered along the bottom edge of `rect`.
pub fn inventory_slots(rect: Rect) -> Vec<Rect> {
    let count = INVENTORY_SLOTS as f32;
    let width = count * SLOT_SIZE + (count - 1.0) * SLOT_GAP;
    let left = rect.center().x - width / 2.0;
    let top = rect.bottom() - PADDING - SLOT_SIZE;
    (0..INVENTORY_SLOTS)
        .map(|i| {
            let x = left + i as f32 * (SLOT_SIZE + SLOT_GAP);
            Rect::from_min_size(pos2(x, top), vec2(SLOT_SIZE, SLOT_SIZE))
        })
        .collect()
}

fn panel_text(painter: &Painter, pos: Pos2, align: Align2, text: String) {
    let galley = painter.layout_no_wrap(text, FontId::proportional(OVERLAY_FONT), Color32::WHITE);
    let rect = align.anchor_size(pos, galley.size());
    painter.rect_filled(rect.expand(4.0), 4.0, PANEL);
    painter.galley(rect.min, galley, Color32::WHITE);
}

fn paint_overlays(painter: &Painter, rect: Rect, scene: &Scene<'_>) {
    panel_text(
        painter,
        rect.left_top() + vec2(PADDING, PADDING),
        Align2::LEFT_TOP,
        info_lines(scene).join("\n"),
    );

    panel_text(
        painter,
        rect.right_top() + vec2(-PADDING, PADDING),
        Align2::RIGHT_TOP,
        "WASD / arrows: move\nE: trade with a villager".to_owned(),
    );

    let slots = inventory_slots(rect);
    for slot in &slots {
        painter.rect_filled(*slot, 3.0, PANEL);
        painter.rect_stroke(*slot, 3.0, Stroke::new(1.0, Color32::GRAY), StrokeKind::Inside);
    }
    let above_slots = slots
        .first()
        .map_or(rect.bottom(), |slot| slot.top())
        - PADDING * 2.0;

    if let Some(npc) = scene.nearby {
        panel_text(
            painter,
            pos2(rect.center().x, above_slots),
            Align2::CENTER_BOTTOM,
            format!("Press E to trade with {}", npc.entity.name),
        );
    }

    if let Some(text) = scene.trade_text {
        panel_text(
            painter,
            pos2(rect.center().x, rect.top() + PADDING * 6.0),
            Align2::CENTER_TOP,
            text.to_owned(),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
