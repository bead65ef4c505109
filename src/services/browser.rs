//! Browser session abstraction and the Chrome-backed implementation.

use std::ffi::OsStr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Why a navigation did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    Timeout(String),
    Transport(String),
}

impl NavigationError {
    /// Classify a driver error message.
    pub fn from_driver(err: impl fmt::Display) -> Self {
        let message = err.to_string();
        if message.to_lowercase().contains("timeout") || message.to_lowercase().contains("timed out")
        {
            NavigationError::Timeout(message)
        } else {
            NavigationError::Transport(message)
        }
    }
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::Timeout(msg) => write!(f, "navigation timeout: {msg}"),
            NavigationError::Transport(msg) => write!(f, "navigation failed: {msg}"),
        }
    }
}

/// A controllable browser able to render a URL.
pub trait BrowserSession {
    /// Navigate to `url` presenting `user_agent`, wait for rendering (and
    /// for `ready` when given) and return the document HTML.
    fn load(
        &mut self,
        url: &str,
        user_agent: &str,
        ready: Option<&str>,
    ) -> std::result::Result<String, NavigationError>;
}

/// Headless Chrome session. Dropping it closes the tab and the browser.
pub struct ChromeSession {
    // Held so the browser process lives as long as the tab.
    _browser: Browser,
    tab: Arc<Tab>,
    render_timeout: Duration,
}

impl ChromeSession {
    /// Launch a browser configured for scraping.
    pub fn launch(config: &FetchConfig) -> Result<Self> {
        let args: Vec<&OsStr> = [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-blink-features=AutomationControlled",
            "--disable-infobars",
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();

        let options = LaunchOptions {
            headless: config.headless,
            sandbox: false,
            window_size: Some(config.window_size),
            path: config.chrome_path.clone(),
            args,
            idle_browser_timeout: Duration::from_secs(config.render_timeout_secs.max(1) * 30),
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(AppError::browser)?;
        let tab = browser.new_tab().map_err(AppError::browser)?;
        tab.set_default_timeout(config.render_timeout());

        log::info!(
            "Browser launched (headless: {}, timeout: {}s)",
            config.headless,
            config.render_timeout_secs
        );

        Ok(Self {
            _browser: browser,
            tab,
            render_timeout: config.render_timeout(),
        })
    }
}

impl BrowserSession for ChromeSession {
    fn load(
        &mut self,
        url: &str,
        user_agent: &str,
        ready: Option<&str>,
    ) -> std::result::Result<String, NavigationError> {
        self.tab
            .set_user_agent(user_agent, Some("en-US,en;q=0.9"), None)
            .map_err(NavigationError::from_driver)?;
        self.tab
            .navigate_to(url)
            .map_err(NavigationError::from_driver)?
            .wait_until_navigated()
            .map_err(NavigationError::from_driver)?;

        if let Some(selector) = ready {
            // Absence is judged by the fetcher on the returned document.
            if let Err(e) = self
                .tab
                .wait_for_element_with_custom_timeout(selector, self.render_timeout)
            {
                log::debug!("Ready selector '{}' not found on {}: {}", selector, url, e);
            }
        }

        self.tab.get_content().map_err(NavigationError::from_driver)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            log::debug!("Closing browser tab failed: {}", e);
        }
        log::info!("Browser closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_driver_errors() {
        assert!(matches!(
            NavigationError::from_driver("Timeout while waiting for event"),
            NavigationError::Timeout(_)
        ));
        assert!(matches!(
            NavigationError::from_driver("net::ERR_CONNECTION_RESET"),
            NavigationError::Transport(_)
        ));
    }
}
