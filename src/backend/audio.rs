use cpal::{
    self,
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, SampleFormat, StreamConfig, SupportedBufferSize,
};
use parking_lot::Mutex;
use std::sync::Arc;

use super::{
    AudioBackend, BlockCallback, CallbackFlow, DeviceInfo, HostApiInfo, InputStream, SampleBlock,
    StatusCallback, StreamStatus,
};
use crate::catalog::host_api_device_index;
use crate::error::{Result, ScopeError};

pub struct CpalStream {
    stream: cpal::Stream,
    live: Arc<Mutex<Option<DeviceInfo>>>,
}

impl InputStream for CpalStream {
    fn close(self: Box<Self>) {
        let CpalStream { stream, live } = *self;
        // Dropping the stream joins cpal's audio thread on every host.
        drop(stream);
        live.lock().take();
    }
}

pub struct CpalBackend {
    hosts: Vec<cpal::HostId>,
    /// Device of the open stream, if any. Some hosts refuse to probe a device while it is open.
    live: Arc<Mutex<Option<DeviceInfo>>>,
}

impl CpalBackend {
    pub fn new() -> Self {
        let hosts = cpal::available_hosts();
        log::debug!("cpal hosts: {hosts:?}");
        Self {
            hosts,
            live: Arc::default(),
        }
    }

    fn host_devices(&self, host_api: usize) -> Result<Vec<cpal::Device>> {
        let id = *self
            .hosts
            .get(host_api)
            .ok_or(ScopeError::UnknownHostApi(host_api))?;
        let host =
            cpal::host_from_id(id).map_err(|e| ScopeError::DeviceEnumeration(e.to_string()))?;
        let devices = host
            .devices()
            .map_err(|e| ScopeError::DeviceEnumeration(e.to_string()))?;
        Ok(devices.collect())
    }

    /// Devices of a host that can be opened; an unusable host counts as empty.
    fn usable_devices(&self, host_api: usize) -> Vec<cpal::Device> {
        self.host_devices(host_api).unwrap_or_else(|err| {
            log::warn!("Skipping host {:?}: {err}", self.hosts[host_api]);
            Vec::new()
        })
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// `(max input channels, default sample rate)`. A device without a default
/// input config is reported as output-only.
fn probe(device: &cpal::Device) -> (u16, u32) {
    match device.default_input_config() {
        Ok(config) => {
            let max = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            (max.max(config.channels()), config.sample_rate().0)
        }
        Err(_) => {
            let rate = device
                .default_output_config()
                .map(|c| c.sample_rate().0)
                .unwrap_or(0);
            (0, rate)
        }
    }
}

/// Reuses the open stream's info for its own device instead of probing it.
fn describe(
    index: usize,
    host_api: usize,
    name: String,
    live: Option<&DeviceInfo>,
    probe: impl FnOnce() -> (u16, u32),
) -> DeviceInfo {
    if let Some(live) = live.filter(|l| l.host_api == host_api && l.name == name) {
        return DeviceInfo {
            index,
            ..live.clone()
        };
    }
    let (max_input_channels, default_sample_rate) = probe();
    DeviceInfo {
        index,
        name,
        host_api,
        max_input_channels,
        default_sample_rate,
    }
}

/// Asks for `frames` per callback, clamped to what the device advertises.
fn buffer_size_for(frames: usize, supported: &SupportedBufferSize) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max } if min <= max => {
            let frames = u32::try_from(frames).unwrap_or(u32::MAX);
            BufferSize::Fixed(frames.clamp(*min, *max))
        }
        _ => BufferSize::Default,
    }
}

/// Converts `input` into `out`, reusing its allocation.
fn convert_to_f32<T>(input: &[T], out: &mut Vec<f32>)
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    out.clear();
    out.extend(input.iter().map(|s| -> f32 { cpal::Sample::from_sample(*s) }));
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut on_block: BlockCallback,
    mut on_status: StatusCallback,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = usize::from(config.channels);
    let mut converted: Vec<f32> = Vec::new();
    let mut stopped = false;
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if stopped {
                return;
            }
            convert_to_f32(data, &mut converted);
            if on_block(SampleBlock::new(&converted, channels)) == CallbackFlow::Stop {
                stopped = true;
            }
        },
        move |err| on_status(StreamStatus::Error(err.to_string())),
        None,
    )
}

impl AudioBackend for CpalBackend {
    fn display_text(&self) -> &'static str {
        "Audio"
    }

    fn host_apis(&self) -> Result<Vec<HostApiInfo>> {
        Ok(self
            .hosts
            .iter()
            .enumerate()
            .map(|(index, id)| HostApiInfo {
                index,
                name: id.name().to_owned(),
                device_count: self.usable_devices(index).len(),
            })
            .collect())
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let live = self.live.lock().clone();
        let mut out = Vec::new();
        for host_api in 0..self.hosts.len() {
            for device in self.usable_devices(host_api) {
                let name = device.name().unwrap_or("UNKNOWN DEVICE".into());
                out.push(describe(out.len(), host_api, name, live.as_ref(), || {
                    probe(&device)
                }));
            }
        }
        Ok(out)
    }

    fn default_input_device(&self) -> Result<Option<usize>> {
        let host = cpal::default_host();
        let Some(host_api) = self.hosts.iter().position(|id| *id == host.id()) else {
            return Ok(None);
        };
        let Some(name) = host.default_input_device().and_then(|d| d.name().ok()) else {
            return Ok(None);
        };
        Ok(self
            .devices()?
            .into_iter()
            .find(|d| d.host_api == host_api && d.name == name)
            .map(|d| d.index))
    }

    fn open_input(
        &self,
        device: &DeviceInfo,
        block_frames: usize,
        on_block: BlockCallback,
        on_status: StatusCallback,
    ) -> Result<Box<dyn InputStream>> {
        let relative = host_api_device_index(&self.devices()?, device.index, device.host_api);
        let cpal_device = self
            .host_devices(device.host_api)?
            .into_iter()
            .nth(relative)
            .filter(|d| d.name().map(|n| n == device.name).unwrap_or(false))
            .ok_or(ScopeError::UnknownDevice {
                host_api: device.host_api,
                index: relative,
            })?;
        let open_failed = |reason: String| ScopeError::StreamOpen {
            device: device.name.clone(),
            reason,
        };

        let supported = cpal_device
            .default_input_config()
            .map_err(|e| open_failed(e.to_string()))?;
        let config = StreamConfig {
            channels: device.max_input_channels,
            sample_rate: cpal::SampleRate(device.default_sample_rate),
            buffer_size: buffer_size_for(block_frames, supported.buffer_size()),
        };
        log::debug!(
            "Opening '{}' as {:?}, {:?}",
            device.name,
            supported.sample_format(),
            config.buffer_size
        );

        // Build stream based on sample format
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&cpal_device, &config, on_block, on_status),
            SampleFormat::I16 => build_stream::<i16>(&cpal_device, &config, on_block, on_status),
            SampleFormat::I32 => build_stream::<i32>(&cpal_device, &config, on_block, on_status),
            SampleFormat::U16 => build_stream::<u16>(&cpal_device, &config, on_block, on_status),
            other => return Err(open_failed(format!("unsupported sample format {other:?}"))),
        }
        .map_err(|e| open_failed(e.to_string()))?;
        stream.play().map_err(|e| open_failed(e.to_string()))?;

        *self.live.lock() = Some(device.clone());
        Ok(Box::new(CpalStream {
            stream,
            live: Arc::clone(&self.live),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_integer_formats_to_unit_range() {
        let mut out = vec![9.0; 16];
        convert_to_f32(&[i16::MIN, 0, 16_384], &mut out);
        assert_eq!(out, vec![-1.0, 0.0, 0.5]);

        convert_to_f32(&[0_u16, 32_768], &mut out);
        assert_eq!(out, vec![-1.0, 0.0]);

        convert_to_f32(&[i32::MIN, 0], &mut out);
        assert_eq!(out, vec![-1.0, 0.0]);

        convert_to_f32(&[0.25_f32, -0.75], &mut out);
        assert_eq!(out, vec![0.25, -0.75]);
    }

    #[test]
    fn buffer_size_is_clamped_to_supported_range() {
        let range = SupportedBufferSize::Range { min: 64, max: 4096 };
        assert_eq!(buffer_size_for(1024, &range), BufferSize::Fixed(1024));
        assert_eq!(buffer_size_for(16, &range), BufferSize::Fixed(64));
        assert_eq!(buffer_size_for(8192, &range), BufferSize::Fixed(4096));
        assert_eq!(
            buffer_size_for(1024, &SupportedBufferSize::Unknown),
            BufferSize::Default
        );
    }

    #[test]
    fn open_device_keeps_its_last_known_info() {
        let live = DeviceInfo {
            index: 4,
            name: "hw:CARD=USB,DEV=0".into(),
            host_api: 0,
            max_input_channels: 2,
            default_sample_rate: 48_000,
        };
        let info = describe(6, 0, live.name.clone(), Some(&live), || {
            panic!("open device must not be probed")
        });
        assert_eq!(info, DeviceInfo { index: 6, ..live.clone() });

        let other = describe(7, 0, "default".into(), Some(&live), || (1, 44_100));
        assert_eq!(other.max_input_channels, 1);
        assert_eq!(other.default_sample_rate, 44_100);
        assert_eq!(other.index, 7);
    }
}
