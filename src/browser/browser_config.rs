use anyhow::{Context, Result, anyhow};
use rand::prelude::SliceRandom;
use std::net;
use std::path::{Path, PathBuf};
use which::which;

#[cfg(windows)]
use winreg::{RegKey, enums::HKEY_LOCAL_MACHINE};

use crate::browser::temp_dir::CustomTempDir;

static DEFAULT_ARGS: [&str; 17] = [
    "--headless",
    "--no-sandbox",
    "--no-zygote",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-background-networking",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-sync",
    "--disable-breakpad",
    "--force-color-profile=srgb",
    "--hide-scrollbars",
    "--mute-audio",
    "--no-first-run",
    "--no-default-browser-check",
    "--window-size=800,600",
];

/// Launch configuration for a browser process.
pub(crate) struct BrowserConfig {
    debug_port: u16,
    pub(crate) temp_dir: CustomTempDir,
    pub(crate) executable_path: PathBuf,
}

impl BrowserConfig {
    pub(crate) fn new() -> Result<Self> {
        let temp_dir = std::env::temp_dir().join("page-shot");

        Ok(Self {
            executable_path: default_executable()?,
            debug_port: get_available_port().context("Failed to get available port")?,
            temp_dir: CustomTempDir::new(temp_dir, "page-shot")
                .context("Failed to create browser profile directory")?,
        })
    }

    pub(crate) fn get_browser_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debug_port),
            format!("--user-data-dir={}", self.temp_dir.path().display()),
        ];
        args.extend(DEFAULT_ARGS.iter().map(|s| s.to_string()));
        // Keep the initial tab on a blank page.
        args.push("about:blank".to_string());
        args
    }
}

/// Environment variable naming the browser executable to launch.
const BROWSER_ENV: &str = "CHROME";

/// Executable names searched for on `PATH`, most specific first.
const PATH_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge-stable",
    "microsoft-edge",
    "msedge",
    "chrome",
];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/usr/bin/chromium",
    "/snap/bin/chromium",
    "/opt/microsoft/msedge/msedge",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(windows)]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const INSTALL_PATHS: &[&str] = &[];

/// Picks the browser to launch: `$CHROME`, then `PATH`, then the registry on
/// Windows, then the usual install locations.
pub(crate) fn default_executable() -> Result<PathBuf> {
    browser_from_env()
        .or_else(|| PATH_NAMES.iter().find_map(|name| which(name).ok()))
        .or_else(registry_chrome)
        .or_else(|| first_file(INSTALL_PATHS))
        .ok_or_else(|| {
            anyhow!(
                "No Chrome, Chromium or Edge executable found on PATH or in the usual \
                 install locations; set {BROWSER_ENV} to the browser binary"
            )
        })
}

fn browser_from_env() -> Option<PathBuf> {
    std::env::var_os(BROWSER_ENV)
        .map(PathBuf::from)
        .filter(|path| path.is_file())
}

fn first_file(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.is_file())
        .map(Path::to_path_buf)
}

#[cfg(windows)]
fn registry_chrome() -> Option<PathBuf> {
    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey(r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\chrome.exe")
        .and_then(|key| key.get_value::<String, _>(""))
        .ok()
        .map(PathBuf::from)
        .filter(|path| path.is_file())
}

#[cfg(not(windows))]
fn registry_chrome() -> Option<PathBuf> {
    None
}

fn get_available_port() -> Option<u16> {
    let mut ports: Vec<u16> = (8000..9000).collect();
    ports.shuffle(&mut rand::thread_rng());
    ports.iter().find(|port| port_is_available(**port)).copied()
}

fn port_is_available(port: u16) -> bool {
    net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}
