use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, RecvTimeoutError, SyncSender},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use super::{
    AudioBackend, BlockCallback, CallbackFlow, DeviceInfo, HostApiInfo, InputStream, SampleBlock,
    StatusCallback, StreamStatus,
};
use crate::error::{Result, ScopeError};

const LUT_LEN: usize = 4096;
const BASE_FREQ: f32 = 220.0;
const AMPLITUDE: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyDevice {
    pub name: String,
    pub max_input_channels: u16,
    pub sample_rate: u32,
}

impl DummyDevice {
    pub fn input(name: &str, channels: u16, sample_rate: u32) -> Self {
        Self {
            name: name.to_owned(),
            max_input_channels: channels,
            sample_rate,
        }
    }
    pub fn output(name: &str, sample_rate: u32) -> Self {
        Self::input(name, 0, sample_rate)
    }
}

/// Record of one successful `open_input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedStream {
    pub device: usize,
    pub channels: u16,
    pub sample_rate: u32,
    pub block_frames: usize,
}

#[derive(Default)]
struct StreamCounters {
    open: AtomicUsize,
    peak: AtomicUsize,
    history: Mutex<Vec<OpenedStream>>,
}

/// Synthetic backend: each open stream is a thread generating one sine per channel.
pub struct DummyBackend {
    hosts: Vec<(String, Vec<DummyDevice>)>,
    default_input: Option<usize>,
    busy: Vec<String>,
    counters: Arc<StreamCounters>,
}

pub struct DummyStream {
    close: SyncSender<()>,
    thread: Option<JoinHandle<()>>,
    counters: Arc<StreamCounters>,
}

impl InputStream for DummyStream {
    fn close(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for DummyStream {
    fn drop(&mut self) {
        // Rendezvous channel: returns once the generator has seen the request.
        let _ = self.close.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Dummy generator thread panicked");
            }
        }
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DummyBackend {
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            default_input: None,
            busy: Vec::new(),
            counters: Arc::default(),
        }
    }

    /// One host with a stereo and a mono sine source plus an output-only device.
    pub fn demo() -> Self {
        Self::new()
            .with_host(
                "Dummy",
                vec![
                    DummyDevice::input("Sine (stereo)", 2, 48_000),
                    DummyDevice::input("Sine (mono)", 1, 44_100),
                    DummyDevice::output("Null output", 48_000),
                ],
            )
            .with_default_input(0)
    }

    pub fn with_host(mut self, name: &str, devices: Vec<DummyDevice>) -> Self {
        self.hosts.push((name.to_owned(), devices));
        self
    }

    pub fn with_default_input(mut self, global_index: usize) -> Self {
        self.default_input = Some(global_index);
        self
    }

    /// Opening a device with this name fails as if another process held it.
    pub fn with_busy(mut self, name: &str) -> Self {
        self.busy.push(name.to_owned());
        self
    }

    /// Handle to the stream counters that outlives moving the backend into a catalog.
    pub fn observer(&self) -> DummyObserver {
        DummyObserver {
            counters: Arc::clone(&self.counters),
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`DummyBackend`]'s stream counters.
#[derive(Clone)]
pub struct DummyObserver {
    counters: Arc<StreamCounters>,
}

impl DummyObserver {
    pub fn open_streams(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }
    pub fn peak_open_streams(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
    pub fn opened(&self) -> Vec<OpenedStream> {
        self.counters.history.lock().clone()
    }
}

impl AudioBackend for DummyBackend {
    fn display_text(&self) -> &'static str {
        "Dummy"
    }

    fn host_apis(&self) -> Result<Vec<HostApiInfo>> {
        Ok(self
            .hosts
            .iter()
            .enumerate()
            .map(|(index, (name, devices))| HostApiInfo {
                index,
                name: name.clone(),
                device_count: devices.len(),
            })
            .collect())
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut out = Vec::new();
        for (host_api, (_, devices)) in self.hosts.iter().enumerate() {
            for device in devices {
                out.push(DeviceInfo {
                    index: out.len(),
                    name: device.name.clone(),
                    host_api,
                    max_input_channels: device.max_input_channels,
                    default_sample_rate: device.sample_rate,
                });
            }
        }
        Ok(out)
    }

    fn default_input_device(&self) -> Result<Option<usize>> {
        Ok(self.default_input)
    }

    fn open_input(
        &self,
        device: &DeviceInfo,
        block_frames: usize,
        mut on_block: BlockCallback,
        mut on_status: StatusCallback,
    ) -> Result<Box<dyn InputStream>> {
        let open_failed = |reason: &str| ScopeError::StreamOpen {
            device: device.name.clone(),
            reason: reason.to_owned(),
        };
        if self.busy.contains(&device.name) {
            return Err(open_failed("device busy"));
        }
        if device.max_input_channels == 0 || device.default_sample_rate == 0 || block_frames == 0 {
            return Err(open_failed("invalid stream parameters"));
        }

        let channels = usize::from(device.max_input_channels);
        let sample_rate = device.default_sample_rate as f32;
        let sin_lut: Vec<f32> = (0..LUT_LEN)
            .map(|i| ((i as f32 / LUT_LEN as f32) * std::f32::consts::TAU).sin())
            .collect();
        let phase_deltas: Vec<f32> = (0..channels)
            .map(|ch| LUT_LEN as f32 * (BASE_FREQ * (ch + 1) as f32 / sample_rate))
            .collect();
        let loop_interval = Duration::from_secs_f32(block_frames as f32 / sample_rate);
        let (close, close_rx) = mpsc::sync_channel(0);

        let thread = std::thread::spawn(move || {
            let mut phases = vec![0_f32; channels];
            let mut block = vec![0_f32; block_frames * channels];
            let mut stopped = false;
            loop {
                let start = Instant::now();
                if !stopped {
                    for frame in block.chunks_exact_mut(channels) {
                        for (ch, sample) in frame.iter_mut().enumerate() {
                            phases[ch] = (phases[ch] + phase_deltas[ch]) % LUT_LEN as f32;
                            *sample = sin_lut[phases[ch] as usize] * AMPLITUDE;
                        }
                    }
                    stopped = on_block(SampleBlock::new(&block, channels)) == CallbackFlow::Stop;
                    if start.elapsed() > loop_interval {
                        on_status(StreamStatus::InputOverflow);
                    }
                }
                match close_rx.recv_timeout(loop_interval.saturating_sub(start.elapsed())) {
                    Ok(_) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
        });

        let now_open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now_open, Ordering::SeqCst);
        self.counters.history.lock().push(OpenedStream {
            device: device.index,
            channels: device.max_input_channels,
            sample_rate: device.default_sample_rate,
            block_frames,
        });

        Ok(Box::new(DummyStream {
            close,
            thread: Some(thread),
            counters: Arc::clone(&self.counters),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BLOCK_FRAMES: usize = 512;

    fn mic() -> DeviceInfo {
        DeviceInfo {
            index: 0,
            name: "Mic".into(),
            host_api: 0,
            max_input_channels: 2,
            default_sample_rate: 44_100,
        }
    }

    #[test]
    fn delivers_interleaved_blocks_until_closed() {
        let backend = DummyBackend::new()
            .with_host("Core Audio", vec![DummyDevice::input("Mic", 2, 44_100)]);
        let (tx, rx) = mpsc::channel();
        let stream = backend
            .open_input(
                &mic(),
                TEST_BLOCK_FRAMES,
                Box::new(move |block: SampleBlock<'_>| {
                    let _ = tx.send((block.channels(), block.frames()));
                    CallbackFlow::Continue
                }),
                Box::new(|_: StreamStatus| {}),
            )
            .unwrap();
        assert_eq!(backend.observer().open_streams(), 1);

        let (channels, frames) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(channels, 2);
        assert_eq!(frames, TEST_BLOCK_FRAMES);

        stream.close();
        assert_eq!(backend.observer().open_streams(), 0);
        // Drain whatever was delivered before close; nothing may follow.
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(60));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_ends_delivery() {
        let backend = DummyBackend::new()
            .with_host("Core Audio", vec![DummyDevice::input("Mic", 2, 44_100)]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let stream = backend
            .open_input(
                &mic(),
                TEST_BLOCK_FRAMES,
                Box::new(move |_: SampleBlock<'_>| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    CallbackFlow::Stop
                }),
                Box::new(|_: StreamStatus| {}),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(120));
        stream.close();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn busy_device_fails_to_open() {
        let backend = DummyBackend::new()
            .with_host("Core Audio", vec![DummyDevice::input("Mic", 2, 44_100)])
            .with_busy("Mic");
        let err = backend
            .open_input(
                &mic(),
                TEST_BLOCK_FRAMES,
                Box::new(|_: SampleBlock<'_>| CallbackFlow::Continue),
                Box::new(|_: StreamStatus| {}),
            )
            .err()
            .unwrap();
        assert!(matches!(err, ScopeError::StreamOpen { .. }));
        assert_eq!(backend.observer().open_streams(), 0);
        assert!(backend.observer().opened().is_empty());
    }

    #[test]
    fn slow_consumer_reports_overflow() {
        let backend = DummyBackend::new()
            .with_host("Core Audio", vec![DummyDevice::input("Mic", 2, 44_100)]);
        let (tx, rx) = mpsc::channel();
        let stream = backend
            .open_input(
                &mic(),
                TEST_BLOCK_FRAMES,
                Box::new(|_: SampleBlock<'_>| {
                    std::thread::sleep(Duration::from_millis(40));
                    CallbackFlow::Continue
                }),
                Box::new(move |status: StreamStatus| {
                    let _ = tx.send(status);
                }),
            )
            .unwrap();
        let status = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        stream.close();
        assert_eq!(status, StreamStatus::InputOverflow);
    }
}
