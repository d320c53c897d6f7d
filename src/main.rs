use std::sync::Arc;

use graph_playground::backend::http::HttpBackend;
use graph_playground::gui::frontend::PlaygroundApp;
use graph_playground::persistence::settings::AppSettings;

use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = AppSettings::current();
    let backend = match HttpBackend::from_settings(&settings) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Graph-Playground: {:#}", e);
            std::process::exit(1);
        }
    };
    log::info!("using backend at {}", backend.base_url());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 710.0])
            // Provide sensible bounds so the UI stays usable on small screens
            .with_min_inner_size([700.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Graph-Playground",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(PlaygroundApp::new(Arc::new(backend), settings)) as Box<dyn eframe::App>)
        }),
    )
}
