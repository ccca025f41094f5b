use anyhow::anyhow;
use eframe::egui::ViewportBuilder;

use edge_panel::{app::PanelApp, config::Config, logging};

fn main() -> anyhow::Result<()> {
    logging::init();

    let (config, config_path) = match Config::load() {
        Ok(loaded) => loaded,
        Err(err) => {
            tracing::warn!(error = ?err, "Falling back to default config");
            (Config::default(), None)
        }
    };
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "Loaded config");
    }

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("Edge Panel")
            .with_decorations(false)
            .with_transparent(true)
            .with_always_on_top()
            .with_taskbar(false)
            .with_resizable(false)
            .with_inner_size([
                config.panel.expanded_width(),
                config.panel.expanded_height(),
            ])
            .with_position([0.0, 0.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Edge Panel",
        native_options,
        Box::new(move |cc| Ok(Box::new(PanelApp::new(cc, config, config_path)))),
    )
    .map_err(|e| anyhow!("eframe exited with error: {e}"))
}
