//! Locating and launching the Chromium instance for browser-rendered
//! fetches.
//!
//! One browser serves a whole crawl; pages are created per fetch. Each
//! launch gets its own user-data directory so concurrent crawls never
//! contend on a profile lock. The directory is removed by the scheduler
//! during cleanup.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use futures::StreamExt;
use log::{debug, error, info, trace, warn};
use tokio::task::{self, JoinHandle};

/// Find a Chrome/Chromium executable.
///
/// `CHROMIUM_PATH` overrides everything; then the usual platform install
/// locations; then `which` on Unix.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(
                target: "docmirror::browser",
                "using browser from CHROMIUM_PATH: {}",
                path.display()
            );
            return Ok(path);
        }
        warn!(
            target: "docmirror::browser",
            "CHROMIUM_PATH points to a non-existent file: {}",
            path.display()
        );
    }

    let paths = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
            r"C:\Program Files (x86)\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = if let Some(rest) = path_str.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            debug!(
                target: "docmirror::browser",
                "found browser at {}",
                path.display()
            );
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    debug!(
                        target: "docmirror::browser",
                        "found browser via 'which': {}",
                        path.display()
                    );
                    return Ok(path);
                }
            }
        }
    }

    Err(anyhow!(
        "no Chrome/Chromium executable found; set CHROMIUM_PATH or install a browser"
    ))
}

/// Launch a headless (or headed, in debug builds) browser with an
/// isolated profile directory.
///
/// Returns the browser, the CDP handler task, and the profile directory
/// the caller must remove after closing the browser.
pub async fn launch_browser(
    headless: bool,
    user_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let chrome_path = find_browser_executable()?;

    let user_data_dir = user_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("docmirror_chrome_{}", std::process::id()))
    });
    std::fs::create_dir_all(&user_data_dir).context("failed to create user data directory")?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path);

    config_builder = if headless {
        config_builder.headless_mode(HeadlessMode::default())
    } else {
        config_builder.with_head()
    };

    config_builder = config_builder
        .arg("--disable-notifications")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-breakpad")
        .arg("--disable-extensions")
        .arg("--disable-hang-monitor")
        .arg("--disable-prompt-on-repost")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--metrics-recording-only")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

    info!(target: "docmirror::browser", "launching browser");
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                // Chrome emits CDP events chromiumoxide cannot deserialize;
                // those are harmless (chromiumoxide#167, #229).
                let benign = message
                    .contains("data did not match any variant of untagged enum Message")
                    || message.contains("Failed to deserialize WS response");
                if benign {
                    trace!(
                        target: "docmirror::browser",
                        "suppressed benign CDP serialization error: {message}"
                    );
                } else {
                    error!(target: "docmirror::browser", "browser handler error: {e:?}");
                }
            }
        }
        debug!(target: "docmirror::browser", "browser handler task completed");
    });

    Ok((browser, handler_task, user_data_dir))
}
