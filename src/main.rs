mod app;
mod bridge;
mod config;
mod event;
mod ollama;
mod session;
mod theme;

use app::SpotterApp;
use bridge::StreamingBridge;
use eframe::egui;
use ollama::OllamaClient;
use std::sync::mpsc;
use theme::Theme;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (config, config_path) = config::load_config(None)?;
    log::debug!("using config at {}", config_path.display());
    let model = config::resolve_model(&config);

    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("spotter-runtime")
        .build()?;

    let client = OllamaClient::new(config.ollama.base_url.clone());
    let bridge =
        runtime.block_on(async { StreamingBridge::new(client, model.clone(), tx.clone()) })?;
    bridge.start();

    let app = SpotterApp::new(rx, bridge, model);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Spotter",
        native_options,
        Box::new(move |creation_context| {
            Theme::default().apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
