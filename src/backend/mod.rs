use crate::config::BackendKind;
use crate::error::Result;

mod audio;
mod dummy;
pub use audio::CpalBackend;
pub use dummy::{DummyBackend, DummyDevice, DummyObserver, OpenedStream};

/// One audio subsystem (ALSA, WASAPI, Core Audio, ...) as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostApiInfo {
    pub index: usize,
    pub name: String,
    pub device_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the backend's global device list, across all host APIs.
    pub index: usize,
    pub name: String,
    pub host_api: usize,
    pub max_input_channels: u16,
    pub default_sample_rate: u32,
}

impl DeviceInfo {
    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }
}

/// Interleaved `f32` samples, `frames x channels`.
#[derive(Debug, Clone, Copy)]
pub struct SampleBlock<'a> {
    data: &'a [f32],
    channels: usize,
}

impl<'a> SampleBlock<'a> {
    pub fn new(data: &'a [f32], channels: usize) -> Self {
        Self { data, channels }
    }
    pub fn channels(&self) -> usize {
        self.channels
    }
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            c => self.data.len() / c,
        }
    }
    /// Samples of a single channel; empty when `channel` is out of range.
    pub fn column(&self, channel: usize) -> impl Iterator<Item = f32> + 'a {
        let frames = if channel < self.channels { self.frames() } else { 0 };
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channels.max(1))
            .take(frames)
            .copied()
    }
}

/// Returned by a block callback to keep or stop delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// Samples were dropped because a block was not consumed in time.
    InputOverflow,
    Error(String),
}

pub type BlockCallback = Box<dyn FnMut(SampleBlock<'_>) -> CallbackFlow + Send + 'static>;
pub type StatusCallback = Box<dyn FnMut(StreamStatus) + Send + 'static>;

pub trait InputStream {
    /// Stops the stream. No callback runs once this returns.
    fn close(self: Box<Self>);
}

pub trait AudioBackend {
    fn display_text(&self) -> &'static str;
    fn host_apis(&self) -> Result<Vec<HostApiInfo>>;
    /// Every device of every host API, ordered by global index.
    fn devices(&self) -> Result<Vec<DeviceInfo>>;
    /// Global index of the backend's default input device.
    fn default_input_device(&self) -> Result<Option<usize>>;
    /// Opens `device` for capture, asking for blocks of `block_frames` frames.
    /// Backends that cannot honour the size deliver their own block length.
    fn open_input(
        &self,
        device: &DeviceInfo,
        block_frames: usize,
        on_block: BlockCallback,
        on_status: StatusCallback,
    ) -> Result<Box<dyn InputStream>>;
}

pub fn from_config(kind: BackendKind) -> Box<dyn AudioBackend> {
    match kind {
        BackendKind::Cpal => Box::new(CpalBackend::new()),
        BackendKind::Dummy => Box::new(DummyBackend::demo()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_deinterleaves() {
        let data = [0.0, 10.0, 1.0, 11.0, 2.0, 12.0];
        let block = SampleBlock::new(&data, 2);
        assert_eq!(block.frames(), 3);
        assert_eq!(block.column(0).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        assert_eq!(block.column(1).collect::<Vec<_>>(), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn column_out_of_range_is_empty() {
        let data = [0.5; 4];
        let block = SampleBlock::new(&data, 2);
        assert_eq!(block.column(2).count(), 0);
        assert_eq!(SampleBlock::new(&data, 0).column(0).count(), 0);
    }

    #[test]
    fn partial_trailing_frame_is_ignored() {
        let data = [1.0, 2.0, 3.0];
        let block = SampleBlock::new(&data, 2);
        assert_eq!(block.frames(), 1);
        assert_eq!(block.column(0).collect::<Vec<_>>(), vec![1.0]);
        assert_eq!(block.column(1).collect::<Vec<_>>(), vec![2.0]);
    }
}
