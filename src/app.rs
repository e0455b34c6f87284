use eframe::glow;
use egui::Ui;
use std::{rc::Rc, sync::Arc};

use crate::backend::{self, AudioBackend};
use crate::catalog::DeviceCatalog;
use crate::config::ScopeConfig;

pub mod capture;
use capture::{CaptureController, Selection};
pub mod list_model;
use list_model::{DeviceListModel, HostApiListModel, ListModel};
pub mod waveform;
use waveform::Waveform;

pub struct ScopeApp {
    catalog: Rc<DeviceCatalog>,
    host_apis: HostApiListModel,
    devices: DeviceListModel,
    capture: CaptureController,
    /// Shared with the audio callback, which draws into it.
    waveform: Arc<Waveform>,
    last_error: Option<String>,
}

impl ScopeApp {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>, config: ScopeConfig) -> anyhow::Result<Self> {
        Self::with_backend(
            backend::from_config(config.backend),
            &config,
            Some(cc.egui_ctx.clone()),
        )
    }

    /// Enumerates devices and opens the default input. Enumeration failures are fatal.
    pub fn with_backend(
        backend: Box<dyn AudioBackend>,
        config: &ScopeConfig,
        repaint: Option<egui::Context>,
    ) -> anyhow::Result<Self> {
        let catalog = Rc::new(DeviceCatalog::new(backend));
        let host_apis = HostApiListModel::new(&catalog)?;
        let (host_api, device) = catalog.default_input_device()?;

        let mut devices = DeviceListModel::new(Rc::clone(&catalog));
        devices.set_host_api(host_api)?;

        let mut waveform = Waveform::new(config.trace_len);
        if let Some(ctx) = repaint {
            waveform = waveform.with_repaint(ctx);
        }
        let waveform = Arc::new(waveform);

        let mut capture = CaptureController::new(
            Rc::clone(&catalog),
            Arc::clone(&waveform),
            Selection { host_api, device },
            config.shutdown_grace,
        );
        let last_error = capture.restart().err().map(|err| {
            log::error!("{err}");
            err.to_string()
        });

        Ok(Self {
            catalog,
            host_apis,
            devices,
            capture,
            waveform,
            last_error,
        })
    }

    pub fn selection(&self) -> Selection {
        self.capture.selection()
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn on_host_api_changed(&mut self, host_api: usize) {
        if let Err(err) = self.devices.set_host_api(host_api) {
            self.report(err);
            return;
        }
        let result = self.capture.select_host_api(host_api);
        self.settle(result);
    }

    pub fn on_device_changed(&mut self, device: usize) {
        let result = self.capture.select_device(device);
        self.settle(result);
    }

    /// Re-reads host APIs and devices; topology changes are not tracked otherwise.
    pub fn refresh(&mut self) {
        let host_api = self
            .devices
            .host_api()
            .unwrap_or(self.selection().host_api);
        let rebuilt = HostApiListModel::new(&self.catalog).and_then(|host_apis| {
            self.devices.set_host_api(host_api)?;
            Ok(host_apis)
        });
        match rebuilt {
            Ok(host_apis) => self.host_apis = host_apis,
            Err(err) => self.report(err),
        }
    }

    fn settle(&mut self, result: crate::error::Result<()>) {
        match result {
            Ok(()) => self.last_error = None,
            Err(err) => self.report(err),
        }
    }

    fn report(&mut self, err: crate::error::ScopeError) {
        log::error!("{err}");
        self.last_error = Some(err.to_string());
    }

    fn status_line(&self, ui: &mut Ui) {
        if let Some(err) = &self.last_error {
            let color = ui.visuals().error_fg_color;
            ui.colored_label(color, err);
        } else if let Some(session) = self.capture.session() {
            ui.label(format!(
                "{}: {} ch @ {} Hz",
                session.device().name,
                session.channels(),
                session.sample_rate()
            ));
        } else {
            ui.label("Idle");
        }
    }
}

/// Combo box over a [`ListModel`]; returns the newly chosen row, if any.
fn list_combo(ui: &mut Ui, label: &str, model: &dyn ListModel, current: usize) -> Option<usize> {
    let mut chosen = None;
    // A reset changes the id, dropping popup state that refers to old rows.
    egui::ComboBox::new((label, model.revision()), label)
        .selected_text(model.display_name(current).unwrap_or("-"))
        .width(220.0)
        .show_ui(ui, |ui| {
            for row in 0..model.count() {
                let name = model.display_name(row).unwrap_or_default();
                let response = ui.add_enabled(
                    model.is_selectable(row),
                    egui::SelectableLabel::new(row == current, name),
                );
                if response.clicked() && row != current {
                    chosen = Some(row);
                }
            }
        });
    chosen
}

impl eframe::App for ScopeApp {
    /// Called once on shutdown. Closes the stream before the audio backend goes away.
    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        self.capture.shutdown();
    }

    /// Called each time the UI needs repainting, which is whenever a block arrives.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("device_panel").show(ctx, |ui| {
            let selection = self.selection();
            ui.horizontal(|ui| {
                if let Some(row) = list_combo(ui, "Host API", &self.host_apis, selection.host_api) {
                    self.on_host_api_changed(row);
                }
                if let Some(row) = list_combo(ui, "Device", &self.devices, selection.device) {
                    self.on_device_changed(row);
                }
                if ui.button("Refresh").clicked() {
                    self.refresh();
                }
            });
            self.status_line(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.waveform.show(ui);
        });
    }
}
