use worldview::{ClientConfig, WorldviewApp};

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ClientConfig::from_env().map_err(|e| {
        log::error!("{e}");
        eframe::Error::AppCreation(Box::new(e))
    })?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        log::error!("failed to start the async runtime: {e}");
        eframe::Error::AppCreation(Box::new(e))
    })?;
    let _guard = runtime.enter();
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Worldview")
            .with_inner_size([1024.0, 768.0]),
        ..Default::default()
    };
    eframe::run_native(
        "worldview",
        options,
        Box::new(move |cc| Ok(Box::new(WorldviewApp::new(cc, &config, handle)))),
    )
}
