/*!
Capture a full-page PNG screenshot of a URL with a headless Chromium-family
browser, driven over the Chrome DevTools Protocol (CDP).

```no_run
use page_shot::capture::{self, CaptureRequest};

# async fn demo() -> anyhow::Result<()> {
let report = capture::run(&CaptureRequest::new("https://example.com", 800)).await?;
println!("wrote {} ({} bytes)", report.output.display(), report.bytes);
# Ok(())
# }
```
*/

mod browser;
pub mod capture;
mod general_utils;
pub mod image_info;
mod tab;
#[cfg(test)]
mod test_support;
mod transport;
mod transport_actor;
mod types;

pub use browser::Browser;
pub use capture::{ArgsError, CaptureReport, CaptureRequest};
pub use image_info::{ImageSize, png_size};
pub use tab::Tab;
pub use types::{PageDimensions, ScreenshotOptions, Viewport};
