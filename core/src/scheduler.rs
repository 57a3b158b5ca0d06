use std::collections::VecDeque;

use crate::grid::{GridConfig, Offset};

pub const TARGET_FPS: f64 = 55.0;
pub const FPS_THRESHOLD: f64 = 5.0;
pub const FPS_WINDOW: usize = 30;

pub const MARGIN_MIN: u32 = 1;
pub const MARGIN_MAX: u32 = 8;
pub const MARGIN_DEFAULT: u32 = 2;

/// Clipped, margin-expanded window of grid indices intersecting the
/// viewport. Bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderWindow {
    pub ix_min: u32,
    pub iy_min: u32,
    pub ix_max: u32,
    pub iy_max: u32,
}

impl RenderWindow {
    /// Derives the window from the current view. Returns `None` when the
    /// viewport does not intersect the grid at all.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        config: &GridConfig,
        offset: Offset,
        pan_x: f64,
        pan_y: f64,
        scale: f64,
        canvas_width: f64,
        canvas_height: f64,
        dpr: f64,
        margin: u32,
    ) -> Option<Self> {
        if scale <= 0.0 || dpr <= 0.0 || canvas_width <= 0.0 || canvas_height <= 0.0 {
            return None;
        }
        let tile = config.tile_size as f64;
        let view_w = canvas_width / dpr / scale;
        let view_h = canvas_height / dpr / scale;
        let margin = margin as i64;
        let ix_min = ((pan_x - offset.x) / tile).floor() as i64 - margin;
        let iy_min = ((pan_y - offset.y) / tile).floor() as i64 - margin;
        let ix_max = ((pan_x + view_w - offset.x) / tile).floor() as i64 + margin;
        let iy_max = ((pan_y + view_h - offset.y) / tile).floor() as i64 + margin;
        let cols = config.cols as i64;
        let rows = config.rows as i64;
        if ix_max < 0 || iy_max < 0 || ix_min >= cols || iy_min >= rows {
            return None;
        }
        Some(Self {
            ix_min: ix_min.max(0) as u32,
            iy_min: iy_min.max(0) as u32,
            ix_max: ix_max.min(cols - 1) as u32,
            iy_max: iy_max.min(rows - 1) as u32,
        })
    }

    pub fn contains_index(&self, ix: u32, iy: u32) -> bool {
        ix >= self.ix_min && ix <= self.ix_max && iy >= self.iy_min && iy <= self.iy_max
    }
}

/// Trailing-window frame-rate tracker fed by animation-frame timestamps.
#[derive(Debug)]
pub struct FrameRate {
    last_ms: Option<f64>,
    samples: VecDeque<f64>,
}

impl Default for FrameRate {
    fn default() -> Self {
        Self {
            last_ms: None,
            samples: VecDeque::with_capacity(FPS_WINDOW),
        }
    }
}

impl FrameRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame timestamp and returns the window-average FPS once at
    /// least one full interval has been observed.
    pub fn record(&mut self, now_ms: f64) -> Option<f64> {
        let average = match self.last_ms {
            Some(prev) if now_ms > prev => {
                let fps = 1000.0 / (now_ms - prev);
                if self.samples.len() == FPS_WINDOW {
                    self.samples.pop_front();
                }
                self.samples.push_back(fps);
                let sum: f64 = self.samples.iter().sum();
                Some(sum / self.samples.len() as f64)
            }
            _ => None,
        };
        self.last_ms = Some(now_ms);
        average
    }
}

/// Tiles of slack drawn beyond the visible viewport. Widens while frames are
/// cheap, narrows when the average frame rate sags.
#[derive(Debug)]
pub struct AdaptiveMargin {
    margin: u32,
}

impl AdaptiveMargin {
    pub fn new() -> Self {
        Self {
            margin: MARGIN_DEFAULT,
        }
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    pub fn adjust(&mut self, average_fps: f64) -> u32 {
        if average_fps > TARGET_FPS + FPS_THRESHOLD {
            self.margin = (self.margin + 1).min(MARGIN_MAX);
        } else if average_fps < TARGET_FPS - FPS_THRESHOLD {
            self.margin = self.margin.saturating_sub(1).max(MARGIN_MIN);
        }
        self.margin
    }
}

impl Default for AdaptiveMargin {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-frame pacing state: one of these per canvas. The host coalesces
/// redraw requests to one animation frame; this tracks the measured rate and
/// hands back the margin to render with.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    frame_rate: FrameRate,
    margin: AdaptiveMargin,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn margin(&self) -> u32 {
        self.margin.margin()
    }

    /// Called once per drawn frame with the animation-frame timestamp;
    /// returns the render margin for this frame.
    pub fn begin_frame(&mut self, now_ms: f64) -> u32 {
        match self.frame_rate.record(now_ms) {
            Some(average) => self.margin.adjust(average),
            None => self.margin.margin(),
        }
    }
}
