//! Application shell: wires the session, image loading and rendering together.

use crate::config::ClientConfig;
use crate::images::{ImageCache, ImageLoader};
use crate::net::{Wake, WsTransport};
use crate::npc::NpcSimulator;
use crate::render::{self, Scene};
use crate::session::Session;

use std::sync::Arc;
use std::time::Instant;

pub struct WorldviewApp {
    session: Session,
    loader: ImageLoader,
}

impl WorldviewApp {
    /// Called once before the first frame. Starts connecting right away.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: &ClientConfig,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let wake: Wake = Arc::new(move || ctx.request_repaint());
        log::info!("connecting to {}", config.server_url);
        let transport = WsTransport::connect(config.server_url.clone(), &runtime, wake);

        let loader = ImageLoader::new(cc.egui_ctx.clone(), ImageCache::default(), runtime);
        if let Some(path) = &config.background {
            loader.load_background(path.clone());
        }

        Self {
            session: Session::new(
                config,
                Box::new(transport),
                NpcSimulator::new(config.world_size),
            ),
            loader,
        }
    }

    /// Forward this frame's keyboard and focus events to the session.
    fn input(&mut self, ctx: &egui::Context, now: Instant) {
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    ..
                } => self.session.key_down(key, now),
                egui::Event::Key {
                    key,
                    pressed: false,
                    ..
                } => self.session.key_up(key),
                egui::Event::WindowFocused(false) => self.session.focus_lost(),
                _ => {}
            }
        }
    }
}

impl eframe::App for WorldviewApp {
    /// Called each time the UI needs repainting. Repaints are requested by
    /// the socket task, the image loader and the timers below.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // Poll network → reconcile, then queue any new avatars for decoding
        for avatar in self.session.poll_network() {
            self.loader.load_avatar(&avatar);
        }

        self.input(ctx, now);
        self.session.fire_timers(now);

        let images = self.loader.cache();
        self.session
            .spawn_npcs_when_ready(|avatar| images.has_ready_frame(avatar), now);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                self.session.resize(rect.width(), rect.height());

                let scene = Scene {
                    world: self.session.world(),
                    npcs: self.session.npcs(),
                    images,
                    connection: self.session.connection(),
                    nearby: self.session.nearby_npc(),
                    trade_text: self.session.trade_text(now),
                };
                render::paint(&ui.painter_at(rect), rect, &scene);
            });

        if let Some(due) = self.session.next_due() {
            ctx.request_repaint_after(due.saturating_duration_since(Instant::now()));
        }
    }
}
