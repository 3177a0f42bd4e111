mod browser_config;
mod browser_utils;
mod temp_dir;

use anyhow::{Context, Result, anyhow};
use browser_config::BrowserConfig;
use log::{debug, warn};
use std::path::PathBuf;
use std::process::Child;
use std::sync::{Arc, Mutex};
use temp_dir::CustomTempDir;

use crate::tab::Tab;
use crate::transport::Transport;

#[derive(Debug)]
struct Process {
    child: Child,
    _temp_dir: CustomTempDir,
}

impl Drop for Process {
    fn drop(&mut self) {
        // The process may already have exited after `Browser.close`.
        let _ = self.child.kill();
        let _ = self.child.wait();
        // `_temp_dir` is dropped afterwards, removing the profile.
    }
}

/// A browser process and the DevTools connection driving it.
///
/// The process is killed when the `Browser` is dropped, so every exit path of
/// the owner releases it, including early returns on error.
#[derive(Debug)]
pub struct Browser {
    transport: Arc<Transport>,
    process: Mutex<Option<Process>>,
}

impl Browser {
    /// Launches a new headless browser with the default flags.
    pub async fn new() -> Result<Self> {
        let config = BrowserConfig::new()?;
        Self::create_browser(config).await
    }

    /// Path of the executable [`Browser::new`] would launch.
    pub fn detect_executable() -> Result<PathBuf> {
        browser_config::default_executable()
    }

    async fn create_browser(config: BrowserConfig) -> Result<Self> {
        let mut child = browser_utils::spawn_chrome_process(&config)?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to get stderr from browser process")?;

        // Dropping `process` on any error below kills the browser.
        let process = Process {
            child,
            _temp_dir: config.temp_dir,
        };

        let ws_url = browser_utils::get_websocket_url(stderr)
            .await
            .context("Failed to connect to the browser")?;
        let transport = Transport::new(&ws_url)
            .await
            .context("Failed to connect to the browser")?;
        debug!("Browser ready");

        Ok(Self {
            transport: Arc::new(transport),
            process: Mutex::new(Some(process)),
        })
    }

    /// Opens a new blank tab.
    pub async fn new_tab(&self) -> Result<Tab> {
        Tab::new(self.transport.clone()).await
    }

    /// Asks the browser to close, then makes sure the process is gone.
    pub async fn close_async(&self) -> Result<()> {
        self.transport.shutdown().await;
        self.kill()
    }

    fn kill(&self) -> Result<()> {
        let mut process_guard = self
            .process
            .lock()
            .map_err(|_| anyhow!("Failed to lock browser process"))?;

        if let Some(process) = process_guard.take() {
            drop(process);
            debug!("Browser process exited");
        }
        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        self.transport.shutdown_nowait();
        if let Err(e) = self.kill() {
            warn!("Error closing browser in Drop: {:?}", e);
        }
    }
}
