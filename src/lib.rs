#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: winit::platform::android::activity::AndroidApp) {
    use winit::platform::android::activity::WindowManagerFlags;
    use winit::platform::android::EventLoopBuilderExtAndroid;

    // Disable LAYOUT_IN_SCREEN to keep app from drawing under the status bar
    app.set_window_flags(
        WindowManagerFlags::empty(),
        WindowManagerFlags::LAYOUT_IN_SCREEN,
    );

    android_logger::init_once(
        android_logger::Config::default().with_max_level(log::LevelFilter::Debug),
    );
    let mut options = eframe::NativeOptions::default();
    options.event_loop_builder = Some(Box::new(move |builder| {
        builder.with_android_app(app);
    }));

    let config = config::ScopeConfig::from_env();
    let res = eframe::run_native(
        "Oscilloscope",
        options,
        Box::new(move |cc| match app::ScopeApp::new(cc, config) {
            Ok(scope) => Ok(Box::new(scope)),
            Err(err) => Err(err.into()),
        }),
    );
    if let Err(e) = res {
        log::error!("{e:?}");
    }
}
