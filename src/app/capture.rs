use std::{mem, rc::Rc, sync::Arc, time::Duration};

use super::waveform::Waveform;
use crate::backend::{
    BlockCallback, CallbackFlow, DeviceInfo, InputStream, SampleBlock, StatusCallback,
    StreamStatus,
};
use crate::catalog::DeviceCatalog;
use crate::error::{Result, ScopeError};

/// Host API and the device's index within that host API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub host_api: usize,
    pub device: usize,
}

/// An open stream bound to one device for its whole lifetime.
pub struct CaptureSession {
    device: DeviceInfo,
    stream: Box<dyn InputStream>,
}

impl CaptureSession {
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }
    pub fn channels(&self) -> u16 {
        self.device.max_input_channels
    }
    pub fn sample_rate(&self) -> u32 {
        self.device.default_sample_rate
    }
}

enum State {
    Idle,
    Capturing(CaptureSession),
    ShutDown,
}

/// Owns the single live input stream and restarts it on every selection change.
pub struct CaptureController {
    catalog: Rc<DeviceCatalog>,
    waveform: Arc<Waveform>,
    selection: Selection,
    state: State,
    shutdown_grace: Duration,
}

impl CaptureController {
    /// Starts idle; call [`Self::restart`] to open the initial selection.
    pub fn new(
        catalog: Rc<DeviceCatalog>,
        waveform: Arc<Waveform>,
        selection: Selection,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            catalog,
            waveform,
            selection,
            state: State::Idle,
            shutdown_grace,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        match &self.state {
            State::Capturing(session) => Some(session),
            State::Idle | State::ShutDown => None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.session().is_some()
    }

    /// Switches host API and preselects its preferred input device.
    pub fn select_host_api(&mut self, host_api: usize) -> Result<()> {
        self.ensure_running()?;
        let device = self.catalog.preferred_device(host_api)?.unwrap_or(0);
        log::info!("Selected host API {host_api}, device {device}");
        self.selection = Selection { host_api, device };
        self.restart()
    }

    pub fn select_device(&mut self, device: usize) -> Result<()> {
        self.ensure_running()?;
        log::info!("Selected device {device}");
        self.selection.device = device;
        self.restart()
    }

    /// Closes any open stream, then opens one for the current selection.
    ///
    /// On failure the controller is left idle; the previous device is not reopened.
    pub fn restart(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.stop();

        let device = self
            .catalog
            .device_by_host_api_index(self.selection.host_api, self.selection.device)?;
        if !device.is_input() {
            return Err(ScopeError::NotInputCapable(device.name));
        }

        // Plots must match the new shape before its first block arrives.
        self.waveform
            .configure_plots(usize::from(device.max_input_channels));

        let waveform = Arc::clone(&self.waveform);
        let on_block: BlockCallback = Box::new(move |block: SampleBlock<'_>| {
            waveform.draw(&block);
            CallbackFlow::Continue
        });
        let name = device.name.clone();
        let on_status: StatusCallback = Box::new(move |status| match status {
            StreamStatus::InputOverflow => log::warn!("Input overflow on '{name}'"),
            StreamStatus::Error(err) => log::warn!("Stream error on '{name}': {err}"),
        });

        let stream = self
            .catalog
            .backend()
            .open_input(&device, self.waveform.trace_len(), on_block, on_status)?;
        log::info!(
            "Capturing '{}': {} channels at {} Hz",
            device.name,
            device.max_input_channels,
            device.default_sample_rate
        );
        self.state = State::Capturing(CaptureSession { device, stream });
        Ok(())
    }

    /// Closes the stream, waits for in-flight callbacks to drain and refuses further work.
    pub fn shutdown(&mut self) {
        if matches!(self.state, State::ShutDown) {
            return;
        }
        if self.stop() {
            std::thread::sleep(self.shutdown_grace);
        }
        self.state = State::ShutDown;
        log::info!("Capture shut down");
    }

    /// Returns whether a stream was closed.
    fn stop(&mut self) -> bool {
        match mem::replace(&mut self.state, State::Idle) {
            State::Capturing(session) => {
                log::info!("Closing stream on '{}'", session.device.name);
                session.stream.close();
                true
            }
            State::Idle => false,
            State::ShutDown => {
                self.state = State::ShutDown;
                false
            }
        }
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state {
            State::ShutDown => Err(ScopeError::ShutDown),
            State::Idle | State::Capturing(_) => Ok(()),
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
