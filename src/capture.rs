//! Screenshot capture: viewport, full page and individual elements

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::CaptureError;
use crate::login::{self, LoginConfig, build_login_url, normalize_base_url};
use crate::types::{Artifact, ArtifactKind, CaptureReport, ViewportSize};
use crate::webdriver::{Browser, BrowserType};

const CONTENT_WIDTH_SCRIPT: &str = "return Math.max(document.documentElement.clientWidth, document.body.scrollWidth, document.documentElement.scrollWidth);";
const CONTENT_HEIGHT_SCRIPT: &str = "return Math.max(document.documentElement.scrollHeight, document.body.scrollHeight, document.documentElement.scrollHeight);";

pub const MIN_FULL_WIDTH: i64 = 1200;
pub const MAX_FULL_WIDTH: i64 = 3000;
pub const MIN_FULL_HEIGHT: i64 = 800;
pub const MAX_FULL_HEIGHT: i64 = 12000;

/// Reflow time after resizing for the full-page shot
const RESIZE_SETTLE: Duration = Duration::from_millis(400);
/// Render time after the readiness selector appears
const PAGE_SETTLE: Duration = Duration::from_millis(600);

pub const VIEWPORT_FILE: &str = "viewport.png";
pub const FULL_PAGE_FILE: &str = "full.png";

/// Output directory name format, one directory per second
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One capture run, resolved from the command line and environment
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub base_url: String,
    pub page_path: String,
    pub login_url: Option<String>,
    pub email: String,
    pub password: String,
    /// Selector awaited before any screenshot
    pub wait_selector: String,
    /// Elements captured individually, in order
    pub selectors: Vec<String>,
    pub out_root: PathBuf,
    /// Seconds for each bounded wait
    pub timeout: u64,
    /// Seconds to keep the session open after capturing
    pub pause: u64,
    pub browser: BrowserType,
    pub headless: bool,
    pub webdriver_url: Option<String>,
}

/// `max(min, min(value, max))`; returns `min` when the bounds are inverted
pub fn clamp(value: i64, min: i64, max: i64) -> i64 {
    value.min(max).max(min)
}

/// Window size for the full-page shot from the measured content extent.
///
/// Missing or zero measurements fall back to 1600x900 before clamping.
pub fn full_page_size(width: Option<i64>, height: Option<i64>) -> ViewportSize {
    let width = width.filter(|w| *w != 0).unwrap_or(ViewportSize::DEFAULT.width as i64);
    let height = height.filter(|h| *h != 0).unwrap_or(ViewportSize::DEFAULT.height as i64);
    ViewportSize {
        width: clamp(width, MIN_FULL_WIDTH, MAX_FULL_WIDTH) as u32,
        height: clamp(height, MIN_FULL_HEIGHT, MAX_FULL_HEIGHT) as u32,
    }
}

/// Integer pixel count from a script result, truncating fractions
fn as_pixels(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Filesystem-safe name for an element selector.
///
/// The trimmed selector is split on spaces and `/`, `#` and `.` are stripped
/// from both ends of every part, and the parts are joined with `_`. Runs of
/// separators keep one `_` each.
pub fn sanitize_selector(selector: &str) -> String {
    let name = selector
        .trim()
        .split([' ', '/'])
        .map(|part| part.trim_matches(|c| c == '#' || c == '.'))
        .collect::<Vec<_>>()
        .join("_");
    if name.is_empty() {
        "element".to_string()
    } else {
        name
    }
}

pub fn element_file_name(selector: &str) -> String {
    format!("element_{}.png", sanitize_selector(selector))
}

/// Absolute page URL; a missing leading `/` on the path is added
pub fn build_page_url(base_url: &str, page_path: &str) -> String {
    let base_url = normalize_base_url(base_url);
    if page_path.starts_with('/') {
        format!("{}{}", base_url, page_path)
    } else {
        format!("{}/{}", base_url, page_path)
    }
}

pub fn timestamped_dir(out_root: &Path, now: DateTime<Local>) -> PathBuf {
    out_root.join(now.format(TIMESTAMP_FORMAT).to_string())
}

/// Create `{out_root}/{YYYYMMDD_HHMMSS}` including missing parents
pub fn create_output_dir(out_root: &Path, now: DateTime<Local>) -> Result<PathBuf, CaptureError> {
    let dir = timestamped_dir(out_root, now);
    std::fs::create_dir_all(&dir).map_err(|e| CaptureError::io(&dir, e))?;
    debug!("Created output directory {}", dir.display());
    Ok(dir)
}

async fn write_png(path: &Path, png: &[u8]) -> Result<usize, CaptureError> {
    tokio::fs::write(path, png)
        .await
        .map_err(|e| CaptureError::io(path, e))?;
    info!("Saved {} ({} bytes)", path.display(), png.len());
    Ok(png.len())
}

/// Write the visible viewport to `path`
pub async fn save_viewport_screenshot(browser: &Browser, path: &Path) -> Result<usize, CaptureError> {
    let png = browser.screenshot().await?;
    write_png(path, &png).await
}

/// Resize the window to the page content, capture it to `path`, then put the
/// window back.
///
/// The original size is restored only after a successful capture; a failing
/// scroll or screenshot leaves the window at the content size.
pub async fn save_full_page_screenshot(browser: &Browser, path: &Path) -> Result<usize, CaptureError> {
    let width = browser.execute(CONTENT_WIDTH_SCRIPT).await?;
    let height = browser.execute(CONTENT_HEIGHT_SCRIPT).await?;
    let size = full_page_size(as_pixels(&width), as_pixels(&height));
    debug!("Content measured {} x {}, capturing at {}", width, height, size);

    let original = browser.window_size().await?;
    browser.set_window_size(size).await?;
    sleep(RESIZE_SETTLE).await;
    browser.execute("window.scrollTo(0, 0);").await?;
    let png = browser.screenshot().await?;
    let bytes = write_png(path, &png).await?;
    browser.set_window_size(original).await?;
    Ok(bytes)
}

/// Write the bounding region of the first element matching `selector`
pub async fn save_element_screenshot(
    browser: &Browser,
    selector: &str,
    path: &Path,
) -> Result<usize, CaptureError> {
    let png = browser.element_screenshot(selector).await?;
    write_png(path, &png).await
}

/// Log in, open the page and write every screenshot into a fresh
/// timestamped directory.
///
/// The browser session is closed on every path once it was created.
pub async fn run(request: &CaptureRequest) -> Result<CaptureReport, CaptureError> {
    let base_url = normalize_base_url(&request.base_url);
    let page_url = build_page_url(&base_url, &request.page_path);
    let login_url = request
        .login_url
        .clone()
        .unwrap_or_else(|| build_login_url(&base_url));

    let out_dir = create_output_dir(&request.out_root, Local::now())?;

    let browser = Browser::new(
        request.browser,
        request.headless,
        request.webdriver_url.as_deref(),
    )
    .await?;

    let login_config = LoginConfig::new(&base_url, &request.email, &request.password)
        .with_login_url(login_url)
        .with_timeout(request.timeout);

    let result = capture(&browser, request, &login_config, &page_url, &out_dir).await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser session: {}", e);
    }

    let artifacts = result?;
    Ok(CaptureReport { out_dir, artifacts })
}

async fn capture(
    browser: &Browser,
    request: &CaptureRequest,
    login_config: &LoginConfig,
    page_url: &str,
    out_dir: &Path,
) -> Result<Vec<Artifact>, CaptureError> {
    login::login(browser, login_config).await?;

    browser.goto(page_url).await?;
    login::wait_for_selector(
        browser,
        &request.wait_selector,
        Duration::from_secs(request.timeout),
    )
    .await?;
    sleep(PAGE_SETTLE).await;

    let mut artifacts = Vec::with_capacity(2 + request.selectors.len());

    let path = out_dir.join(VIEWPORT_FILE);
    let bytes = save_viewport_screenshot(browser, &path).await?;
    artifacts.push(Artifact {
        kind: ArtifactKind::Viewport,
        path,
        bytes,
    });

    let path = out_dir.join(FULL_PAGE_FILE);
    let bytes = save_full_page_screenshot(browser, &path).await?;
    artifacts.push(Artifact {
        kind: ArtifactKind::Full,
        path,
        bytes,
    });

    for selector in &request.selectors {
        let path = out_dir.join(element_file_name(selector));
        let bytes = save_element_screenshot(browser, selector, &path).await?;
        artifacts.push(Artifact {
            kind: ArtifactKind::Element {
                selector: selector.clone(),
            },
            path,
            bytes,
        });
    }

    if request.pause > 0 {
        info!("Keeping the browser open for {}s", request.pause);
        sleep(Duration::from_secs(request.pause)).await;
    }

    Ok(artifacts)
}

#[cfg(test)]
#[path = "capture_test.rs"]
mod capture_test;
