use serde::{Deserialize, Serialize};

/// Viewport applied to a tab through device metrics emulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Viewport width in CSS pixels.
    pub width: u32,
    /// Viewport height in CSS pixels.
    pub height: u32,
    /// Device scale factor (DPR). Default is 1.0.
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            device_scale_factor: 1.0,
        }
    }
}

impl Viewport {
    /// Creates a new viewport with specified dimensions and a scale factor of 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }
}

/// Dimensions a page reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDimensions {
    /// `document.documentElement.clientWidth`
    pub width: u32,
    /// `document.documentElement.clientHeight`
    pub height: u32,
    /// `window.devicePixelRatio`
    pub device_scale_factor: f64,
}

/// Screenshot options. Output is always PNG.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    pub(crate) full_page: bool,
}

impl ScreenshotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the whole scrollable page instead of the viewport only.
    pub fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    pub fn full_page() -> Self {
        Self::new().with_full_page(true)
    }
}
