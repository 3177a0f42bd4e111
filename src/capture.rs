//! The capture run: launch, open a tab, navigate, measure, resize, screenshot, close.

use anyhow::{Context, Result};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::browser::Browser;
use crate::image_info::{ImageSize, png_size};
use crate::tab::Tab;
use crate::types::{PageDimensions, ScreenshotOptions, Viewport};

/// Where the screenshot lands unless the request says otherwise.
pub const DEFAULT_OUTPUT: &str = "screenshot.png";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("{name} is not a number: {value:?}")]
    NotANumber { name: &'static str, value: String },
    #[error("{name} is out of range: {value:?}")]
    OutOfRange { name: &'static str, value: String },
}

/// Parses a base-10 integer the lenient way: leading whitespace is skipped, a
/// sign is allowed and parsing stops at the first non-digit (`"800px"` is 800).
pub fn parse_dimension(name: &'static str, value: &str) -> Result<u32, ArgsError> {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];

    if digits.is_empty() {
        return Err(ArgsError::NotANumber {
            name,
            value: value.to_string(),
        });
    }
    let out_of_range = || ArgsError::OutOfRange {
        name,
        value: value.to_string(),
    };
    let parsed: u32 = digits.parse().map_err(|_| out_of_range())?;
    if negative && parsed != 0 {
        return Err(out_of_range());
    }
    Ok(parsed)
}

/// One screenshot to take.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub url: String,
    /// Applied viewport width.
    pub width: u32,
    /// Accepted for the command line contract but never applied: the viewport
    /// height always comes from the page itself.
    pub height: Option<u32>,
    pub output: PathBuf,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>, width: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }

    /// Builds a request from the raw `<url> <width> <height>` arguments.
    ///
    /// An unparsable width is an error. An unparsable height is not, since it
    /// is never used.
    pub fn from_args(url: &str, width: &str, height: &str) -> Result<Self, ArgsError> {
        let width = parse_dimension("width", width)?;
        let height = match parse_dimension("height", height) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("{e}; the height argument is not applied anyway");
                None
            }
        };
        Ok(Self::new(url, width).with_height(height))
    }

    pub fn with_height(mut self, height: Option<u32>) -> Self {
        self.height = height;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub output: PathBuf,
    /// What the page reported about itself after navigation.
    pub dimensions: PageDimensions,
    /// The viewport actually applied before capturing.
    pub viewport: Viewport,
    /// The height argument that was passed in and ignored.
    pub ignored_height: Option<u32>,
    /// Pixel size of the decoded PNG.
    pub image: ImageSize,
    pub bytes: usize,
}

/// Runs one capture end to end.
///
/// The browser is closed on every path; on failure nothing is written to
/// `request.output`.
pub async fn run(request: &CaptureRequest) -> Result<CaptureReport> {
    let browser = Browser::new().await.context("Failed to launch browser")?;
    let result = capture(&browser, request).await;
    if let Err(e) = browser.close_async().await {
        warn!("Failed to close browser: {e:?}");
    }
    result
}

async fn capture(browser: &Browser, request: &CaptureRequest) -> Result<CaptureReport> {
    let tab = browser.new_tab().await.context("Failed to open a tab")?;
    capture_with_tab(&tab, request).await
}

/// Everything after the tab is open: navigate, measure, resize, screenshot, write.
pub(crate) async fn capture_with_tab(tab: &Tab, request: &CaptureRequest) -> Result<CaptureReport> {
    info!("Navigating to {}", request.url);
    tab.goto(&request.url).await?;

    let dimensions = tab.measure().await.context("Failed to measure the page")?;
    debug!("Page reports {dimensions:?}");

    if let Some(height) = request.height
        && height != dimensions.height
    {
        info!(
            "Ignoring height argument {height}, using the page height {}",
            dimensions.height
        );
    }
    let viewport = Viewport::new(request.width, dimensions.height);
    tab.set_viewport(&viewport)
        .await
        .context("Failed to resize the viewport")?;

    let data = tab
        .screenshot(ScreenshotOptions::full_page())
        .await
        .context("Failed to capture screenshot")?;
    let bytes = BASE64_STANDARD
        .decode(data)
        .context("Screenshot data is not valid base64")?;
    let image = png_size(&bytes)?;

    write_atomically(&request.output, &bytes)
        .with_context(|| format!("Failed to write {}", request.output.display()))?;

    Ok(CaptureReport {
        output: request.output.clone(),
        dimensions,
        viewport,
        ignored_height: request.height,
        image,
        bytes: bytes.len(),
    })
}

/// Writes `bytes` next to `path` and renames over it, so readers never see a
/// partial file.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}
