use anyhow::{Context, Result, anyhow};
use log::debug;
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::time::Duration;
use tokio::time;

use crate::browser::browser_config::BrowserConfig;

const WS_URL_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn spawn_chrome_process(config: &BrowserConfig) -> Result<Child> {
    let args = config.get_browser_args();
    debug!(
        "Launching {} {}",
        config.executable_path.display(),
        args.join(" ")
    );

    #[cfg(windows)]
    let mut cmd = {
        use std::os::windows::process::CommandExt;
        let mut c = Command::new(&config.executable_path);
        c.creation_flags(0x08000000); // CREATE_NO_WINDOW
        c
    };
    #[cfg(not(windows))]
    let mut cmd = Command::new(&config.executable_path);

    cmd.args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "Failed to launch browser at {}",
                config.executable_path.display()
            )
        })
}

/// Reads browser stderr until the DevTools WebSocket URL shows up.
pub(crate) async fn get_websocket_url(stderr: ChildStderr) -> Result<String> {
    let reader = BufReader::new(stderr);
    let task = tokio::task::spawn_blocking(move || {
        let mut lines = reader.lines();
        let ws_url = find_ws_url(&mut lines)?;
        // Keep draining so the browser never blocks on a full stderr pipe.
        std::thread::spawn(move || for _ in lines {});
        Ok(ws_url)
    });

    time::timeout(WS_URL_TIMEOUT, task)
        .await
        .map_err(|_| anyhow!("Timeout waiting for the browser DevTools endpoint"))??
}

fn find_ws_url<I>(lines: &mut I) -> Result<String>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let re = Regex::new(r"listening on (ws://.*/devtools/browser/\S+)")?;
    for line in lines {
        let line = line?;
        if let Some(cap) = re.captures(&line) {
            return Ok(cap[1].to_string());
        }
    }
    Err(anyhow!("Browser exited before printing its DevTools endpoint"))
}
