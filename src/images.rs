//! Asynchronous image cache and loaders.
//!
//! Frames and the world background are decoded off the UI thread and land in
//! a shared [`ImageCache`]. Readers treat a pending slot as perfectly normal:
//! they draw a placeholder and try again next frame.

use crate::error::{ClientError, Result};
use crate::world::{Avatar, Facing};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use egui::mutex::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageKey {
    Background,
    Frame {
        avatar: String,
        facing: Facing,
        index: usize,
    },
}

impl ImageKey {
    pub fn frame(avatar: &str, facing: Facing, index: usize) -> Self {
        Self::Frame {
            avatar: avatar.to_owned(),
            facing,
            index,
        }
    }

    /// Texture name handed to egui.
    pub fn label(&self) -> String {
        match self {
            Self::Background => "world-background".to_owned(),
            Self::Frame {
                avatar,
                facing,
                index,
            } => format!("{avatar}/{facing:?}/{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSlot<I> {
    Pending,
    Ready(I),
    Failed,
}

/// Shared `key -> {pending, ready, failed}` table.
///
/// Cloning shares the table. `I` is the drawable image type: egui texture
/// handles in the app, plain sizes in tests.
pub struct ImageCache<I> {
    slots: Arc<Mutex<FxHashMap<ImageKey, ImageSlot<I>>>>,
}

impl<I> std::fmt::Debug for ImageCache<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}

impl<I> Clone for ImageCache<I> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<I> Default for ImageCache<I> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }
}

impl<I: Clone> ImageCache<I> {
    pub fn slot(&self, key: &ImageKey) -> Option<ImageSlot<I>> {
        self.slots.lock().get(key).cloned()
    }

    /// The image behind `key` if it finished decoding.
    pub fn ready(&self, key: &ImageKey) -> Option<I> {
        match self.slots.lock().get(key) {
            Some(ImageSlot::Ready(image)) => Some(image.clone()),
            _ => None,
        }
    }

    /// Claim `key` for loading. Returns `false` if someone already did.
    pub fn begin(&self, key: ImageKey) -> bool {
        let mut slots = self.slots.lock();
        if slots.contains_key(&key) {
            return false;
        }
        slots.insert(key, ImageSlot::Pending);
        true
    }

    pub fn finish(&self, key: ImageKey, image: Option<I>) {
        let slot = image.map_or(ImageSlot::Failed, ImageSlot::Ready);
        self.slots.lock().insert(key, slot);
    }

    /// Whether any frame of `avatar` is ready to draw.
    pub fn has_ready_frame(&self, avatar: &str) -> bool {
        self.slots.lock().iter().any(|(key, slot)| {
            matches!(slot, ImageSlot::Ready(_))
                && matches!(key, ImageKey::Frame { avatar: a, .. } if a == avatar)
        })
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Raw image bytes from a `data:` URL or a bare base64 string.
///
/// # Errors
///
/// Returns [`ClientError::Payload`] when the base64 body is invalid.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let body = match payload.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => payload,
    };
    Ok(BASE64.decode(body.trim())?)
}

/// Decode PNG/JPEG bytes into an egui image.
///
/// # Errors
///
/// Returns [`ClientError::Image`] for unsupported or corrupt data.
pub fn decode_image(bytes: &[u8]) -> Result<egui::ColorImage> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        [w as usize, h as usize],
        rgba.as_raw(),
    ))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Decodes images on tokio's blocking pool and uploads them as textures.
#[derive(Clone)]
pub struct ImageLoader {
    ctx: egui::Context,
    cache: ImageCache<egui::TextureHandle>,
    runtime: tokio::runtime::Handle,
}

impl ImageLoader {
    pub fn new(
        ctx: egui::Context,
        cache: ImageCache<egui::TextureHandle>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            ctx,
            cache,
            runtime,
        }
    }

    pub fn cache(&self) -> &ImageCache<egui::TextureHandle> {
        &self.cache
    }

    /// Start decoding every frame of `avatar` that is not already cached.
    pub fn load_avatar(&self, avatar: &Avatar) {
        let mut queued = 0_usize;
        for (facing, index, payload) in avatar.encoded_frames() {
            let key = ImageKey::frame(&avatar.name, facing, index);
            if !self.cache.begin(key.clone()) {
                continue;
            }
            let payload = payload.to_owned();
            self.spawn_decode(key, move || decode_image(&decode_payload(&payload)?));
            queued += 1;
        }
        log::debug!("queued {queued} frames for avatar {:?}", avatar.name);
    }

    /// Start decoding the world background from disk.
    pub fn load_background(&self, path: PathBuf) {
        if !self.cache.begin(ImageKey::Background) {
            return;
        }
        log::info!("loading world background from {}", path.display());
        self.spawn_decode(ImageKey::Background, move || decode_image(&read_file(&path)?));
    }

    fn spawn_decode<F>(&self, key: ImageKey, decode: F)
    where
        F: FnOnce() -> Result<egui::ColorImage> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let cache = self.cache.clone();
        self.runtime.spawn_blocking(move || {
            let texture = match decode() {
                Ok(image) => Some(ctx.load_texture(
                    key.label(),
                    image,
                    egui::TextureOptions::NEAREST,
                )),
                Err(e) => {
                    log::warn!("failed to load image {}: {e}", key.label());
                    None
                }
            };
            cache.finish(key, texture);
            ctx.request_repaint();
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
