use egui::Ui;
use egui_plot::{Line, Plot, PlotBounds, PlotPoints};
use parking_lot::Mutex;

use crate::backend::SampleBlock;

/// Result of handing one block to [`Waveform::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    /// The layout was being rebuilt or read by the UI; the block is dropped.
    Busy,
    ShapeMismatch { expected: usize, got: usize },
}

struct PlotLayout {
    traces: Vec<Vec<f32>>,
    generation: u64,
}

/// One line plot per channel, y fixed to [-1, 1].
///
/// Both the rebuild and the draw path go through the same lock. Drawing only
/// ever `try_lock`s, so an audio callback never waits on the UI thread and
/// never sees a half-built layout.
pub struct Waveform {
    layout: Mutex<PlotLayout>,
    trace_len: usize,
    repaint: Option<egui::Context>,
}

impl Waveform {
    pub fn new(trace_len: usize) -> Self {
        let waveform = Self {
            layout: Mutex::new(PlotLayout {
                traces: Vec::new(),
                generation: 0,
            }),
            trace_len,
            repaint: None,
        };
        waveform.configure_plots(1);
        waveform
    }

    /// Request a repaint of `ctx` whenever a block lands.
    pub fn with_repaint(mut self, ctx: egui::Context) -> Self {
        self.repaint = Some(ctx);
        self
    }

    /// Rebuilds the layout with `channels` zeroed traces.
    pub fn configure_plots(&self, channels: usize) {
        let mut layout = self.layout.lock();
        layout.traces = vec![vec![0.0; self.trace_len]; channels];
        layout.generation += 1;
        log::debug!("Plot layout {}: {channels} channels", layout.generation);
    }

    pub fn channel_count(&self) -> usize {
        self.layout.lock().traces.len()
    }

    pub fn trace_len(&self) -> usize {
        self.trace_len
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.layout.lock().generation
    }

    #[cfg(test)]
    pub(crate) fn trace(&self, channel: usize) -> Option<Vec<f32>> {
        self.layout.lock().traces.get(channel).cloned()
    }

    /// Replaces each channel's line data with the matching column of `block`.
    ///
    /// Traces always hold `trace_len` samples: longer blocks keep their last
    /// `trace_len` frames, shorter ones are padded with zeros.
    pub fn draw(&self, block: &SampleBlock<'_>) -> DrawOutcome {
        let Some(mut layout) = self.layout.try_lock() else {
            log::trace!("Plot busy, skipping block");
            return DrawOutcome::Busy;
        };
        if block.channels() != layout.traces.len() {
            return DrawOutcome::ShapeMismatch {
                expected: layout.traces.len(),
                got: block.channels(),
            };
        }
        for (channel, trace) in layout.traces.iter_mut().enumerate() {
            fill_trace(trace, block.column(channel), self.trace_len);
        }
        drop(layout);

        if let Some(ctx) = &self.repaint {
            ctx.request_repaint();
        }
        DrawOutcome::Drawn
    }

    /// Lays the sub-plots out side by side, filling the available space.
    pub fn show(&self, ui: &mut Ui) {
        let lines: Vec<Vec<[f64; 2]>> = {
            let layout = self.layout.lock();
            layout
                .traces
                .iter()
                .map(|t| {
                    t.iter()
                        .enumerate()
                        .map(|(i, y)| [i as f64, *y as f64])
                        .collect()
                })
                .collect()
        };
        if lines.is_empty() {
            return;
        }

        let height = ui.available_height();
        let x_max = self.trace_len as f64;
        ui.columns(lines.len(), |columns| {
            for (channel, (ui, points)) in columns.iter_mut().zip(lines).enumerate() {
                Plot::new(("channel", channel))
                    .height(height)
                    .show_background(false)
                    .allow_drag(false)
                    .allow_zoom(false)
                    .allow_scroll(false)
                    .allow_boxed_zoom(false)
                    .show(ui, |plot_ui| {
                        plot_ui.set_plot_bounds(PlotBounds::from_min_max([0.0, -1.0], [x_max, 1.0]));
                        plot_ui.line(
                            Line::new(PlotPoints::new(points)).name(format!("ch {}", channel + 1)),
                        );
                    });
            }
        });
    }
}

fn fill_trace(trace: &mut Vec<f32>, samples: impl Iterator<Item = f32>, len: usize) {
    trace.clear();
    trace.extend(samples);
    if trace.len() > len {
        trace.drain(..trace.len() - len);
    }
    trace.resize(len, 0.0);
}
