use std::path::Path;

use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::errors::CaptureError;
use crate::types::ViewportSize;
use crate::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;

/// Browser session driven over WebDriver
pub struct Browser {
    client: Client,
    browser_type: BrowserType,
    // Chrome user-data-dir, removed when the session is dropped
    _profile_dir: Option<TempDir>,
}

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum BrowserType {
    /// Google Chrome/Chromium
    #[default]
    Chrome,
    /// Mozilla Firefox
    Firefox,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            "firefox" => Ok(BrowserType::Firefox),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// WebDriver server executable for this browser
    pub fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Chrome => "chromedriver",
            BrowserType::Firefox => "geckodriver",
        }
    }

    /// Port the driver listens on when started with defaults
    pub fn default_port(&self) -> u16 {
        match self {
            BrowserType::Chrome => 9515,
            BrowserType::Firefox => 4444,
        }
    }
}

/// Build the session capabilities for a browser.
///
/// Headless sessions also disable the GPU and the sandbox so they run inside
/// containers.
pub fn capabilities(
    browser_type: BrowserType,
    headless: bool,
    window: ViewportSize,
    profile_dir: Option<&Path>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut caps = serde_json::Map::new();

    match browser_type {
        BrowserType::Chrome => {
            let mut args = Vec::new();
            if headless {
                args.push("--headless=new".to_string());
                args.push("--disable-gpu".to_string());
                args.push("--no-sandbox".to_string());
                // Small /dev/shm in containers
                args.push("--disable-dev-shm-usage".to_string());
            }
            args.push(format!("--window-size={},{}", window.width, window.height));
            if let Some(dir) = profile_dir {
                args.push(format!("--user-data-dir={}", dir.display()));
            }
            caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
        BrowserType::Firefox => {
            let mut args = Vec::new();
            if headless {
                args.push("--headless".to_string());
            }
            args.push(format!("--width={}", window.width));
            args.push(format!("--height={}", window.height));
            caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
        }
    }

    caps
}

impl Browser {
    /// Create a new browser session
    ///
    /// # Arguments
    /// * `browser_type` - Chrome or Firefox
    /// * `headless` - Whether to run without a visible window
    /// * `webdriver_url` - Running WebDriver server to use; when `None` one is
    ///   found on the default port or started
    pub async fn new(
        browser_type: BrowserType,
        headless: bool,
        webdriver_url: Option<&str>,
    ) -> Result<Self, CaptureError> {
        info!("Connecting to {:?} WebDriver", browser_type);

        let webdriver_url = match webdriver_url {
            Some(url) => url.to_string(),
            None => GLOBAL_WEBDRIVER_MANAGER
                .ensure_driver(browser_type)
                .await
                .map_err(|e| CaptureError::SessionCreation(format!("{e:#}")))?,
        };

        // Unique profile per run so concurrent Chrome instances don't fight over it
        let profile_dir = match browser_type {
            BrowserType::Chrome => Some(
                tempfile::Builder::new()
                    .prefix("pageshot-chrome-")
                    .tempdir()
                    .map_err(|e| {
                        CaptureError::SessionCreation(format!(
                            "could not create browser profile directory: {e}"
                        ))
                    })?,
            ),
            BrowserType::Firefox => None,
        };

        let window = ViewportSize::DEFAULT;
        let caps = capabilities(
            browser_type,
            headless,
            window,
            profile_dir.as_ref().map(TempDir::path),
        );

        debug!("Connecting to WebDriver at {}", webdriver_url);
        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&webdriver_url)
            .await
            .map_err(|e| {
                CaptureError::SessionCreation(format!(
                    "could not start a session at {}: {}",
                    webdriver_url, e
                ))
            })?;

        // Launch flags size the window already; this covers drivers that ignore them
        if let Err(e) = client.set_window_size(window.width, window.height).await {
            debug!("Note: Could not set window size: {}", e);
        }

        Ok(Browser {
            client,
            browser_type,
            _profile_dir: profile_dir,
        })
    }

    pub async fn goto(&self, url: &str) -> Result<(), CaptureError> {
        info!("Navigating {:?} to {}", self.browser_type, url);
        self.client.goto(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String, CaptureError> {
        Ok(self.client.current_url().await?.to_string())
    }

    /// Find the first element for a locator, `None` when nothing matches
    pub async fn try_find(&self, locator: Locator<'_>) -> Result<Option<Element>, CaptureError> {
        match self.client.find(locator).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_miss() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find the first element matching a CSS selector
    pub async fn find_css(&self, selector: &str) -> Result<Element, CaptureError> {
        self.try_find(Locator::Css(selector))
            .await?
            .ok_or_else(|| CaptureError::ElementNotFound(selector.to_string()))
    }

    /// Whether the element for a locator exists and is displayed
    pub async fn is_visible(&self, locator: Locator<'_>) -> Result<bool, CaptureError> {
        match self.try_find(locator).await? {
            Some(element) => Ok(element.is_displayed().await?),
            None => Ok(false),
        }
    }

    /// Clear the input with the given id and type `text` into it
    pub async fn fill_by_id(&self, id: &str, text: &str) -> Result<(), CaptureError> {
        debug!("Filling #{}", id);
        let element = self
            .try_find(Locator::Id(id))
            .await?
            .ok_or_else(|| CaptureError::ElementNotFound(format!("#{id}")))?;
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    pub async fn click_by_id(&self, id: &str) -> Result<(), CaptureError> {
        debug!("Clicking #{}", id);
        let element = self
            .try_find(Locator::Id(id))
            .await?
            .ok_or_else(|| CaptureError::ElementNotFound(format!("#{id}")))?;
        element.click().await?;
        Ok(())
    }

    /// Run a script in the page and return its result
    pub async fn execute(&self, script: &str) -> Result<serde_json::Value, CaptureError> {
        Ok(self.client.execute(script, vec![]).await?)
    }

    pub async fn window_size(&self) -> Result<ViewportSize, CaptureError> {
        let (width, height) = self.client.get_window_size().await?;
        Ok(ViewportSize {
            width: u32::try_from(width).unwrap_or(u32::MAX),
            height: u32::try_from(height).unwrap_or(u32::MAX),
        })
    }

    pub async fn set_window_size(&self, size: ViewportSize) -> Result<(), CaptureError> {
        debug!("Resizing window to {}", size);
        self.client.set_window_size(size.width, size.height).await?;
        Ok(())
    }

    /// PNG of the visible viewport
    pub async fn screenshot(&self) -> Result<Vec<u8>, CaptureError> {
        Ok(self.client.screenshot().await?)
    }

    /// PNG of the bounding region of the first element matching `selector`
    pub async fn element_screenshot(&self, selector: &str) -> Result<Vec<u8>, CaptureError> {
        let element = self.find_css(selector).await?;
        Ok(element.screenshot().await?)
    }

    /// End the WebDriver session
    pub async fn close(self) -> Result<(), CaptureError> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
