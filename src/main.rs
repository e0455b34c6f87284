#[cfg(not(target_os = "android"))]
use scope_glow_rs::{app::ScopeApp, config::ScopeConfig};

#[cfg(target_os = "android")]
fn main() {}

#[cfg(not(target_os = "android"))]
fn main() -> eframe::Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let config = ScopeConfig::from_env();
    log::debug!("{config:?}");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Oscilloscope")
            .with_inner_size([640.0, 400.0])
            .with_min_inner_size([500.0, 300.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Oscilloscope",
        native_options,
        Box::new(move |cc| match ScopeApp::new(cc, config) {
            Ok(app) => Ok(Box::new(app)),
            Err(err) => {
                log::error!("{err:#}");
                Err(err.into())
            }
        }),
    )
}
