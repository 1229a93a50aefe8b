use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::webdriver::BrowserType;

/// Starts and tracks WebDriver server processes (chromedriver, geckodriver)
pub struct WebDriverManager {
    processes: Arc<Mutex<Vec<WebDriverProcess>>>,
}

struct WebDriverProcess {
    browser_type: BrowserType,
    child: Child,
    port: u16,
    url: String,
    #[cfg(unix)]
    process_group_id: Option<i32>,
}

impl Default for WebDriverManager {
    fn default() -> Self {
        Self {
            processes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl WebDriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the URL of a ready WebDriver server for the browser type,
    /// starting one if none answers on the standard port
    pub async fn ensure_driver(&self, browser_type: BrowserType) -> Result<String> {
        let managed_urls: Vec<String> = self
            .lock_processes()
            .iter()
            .filter(|p| p.browser_type == browser_type)
            .map(|p| p.url.clone())
            .collect();

        for url in managed_urls {
            if Self::verify_driver_working(&url).await {
                debug!("Using managed WebDriver at {}", url);
                return Ok(url);
            }
        }

        let standard_url = format!("http://localhost:{}", browser_type.default_port());
        if Self::verify_driver_working(&standard_url).await {
            debug!("Found external WebDriver at {}", standard_url);
            return Ok(standard_url);
        }

        info!("WebDriver not detected, starting {}", browser_type.driver_name());
        self.start_driver(browser_type).await
    }

    async fn start_driver(&self, browser_type: BrowserType) -> Result<String> {
        let command = browser_type.driver_name();
        let port = Self::find_free_port(browser_type)?;
        let args = match browser_type {
            BrowserType::Firefox => vec!["--port".to_string(), port.to_string()],
            BrowserType::Chrome => vec![format!("--port={}", port)],
        };

        if !Self::command_exists(command) {
            anyhow::bail!(
                "{} not found in PATH. Install it or pass --webdriver-url to use a running server",
                command
            );
        }

        let mut cmd = Command::new(command);
        cmd.args(&args).stdout(Stdio::null()).stderr(Stdio::null());

        // Own process group so the browser children die with the driver
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", command))?;

        #[cfg(unix)]
        let process_group_id = Some(child.id() as i32);

        let url = format!("http://localhost:{}", port);
        self.lock_processes().push(WebDriverProcess {
            browser_type,
            child,
            port,
            url: url.clone(),
            #[cfg(unix)]
            process_group_id,
        });

        // 3 seconds total
        let max_attempts = 30;
        for attempt in 1..=max_attempts {
            if Self::is_driver_running(&url).await {
                info!("{} started on port {}", command, port);
                return Ok(url);
            }
            if attempt < max_attempts {
                sleep(Duration::from_millis(100)).await;
            }
        }

        self.cleanup_failed_process(port);
        anyhow::bail!("{} failed to start within timeout", command)
    }

    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        #[cfg(unix)]
        let locator = "which";
        #[cfg(windows)]
        let locator = "where";

        Command::new(locator)
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Pick a port for a new driver, preferring the browser's usual range
    pub fn find_free_port(browser_type: BrowserType) -> Result<u16> {
        let first = browser_type.default_port();
        for port in first..first + 3 {
            if !Self::is_port_in_use(port) {
                debug!("Found free port {} for {:?}", port, browser_type);
                return Ok(port);
            }
            debug!("Port {} is in use for {:?}", port, browser_type);
        }

        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    /// Check if a port is in use
    pub fn is_port_in_use(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// Check if a WebDriver server answers its status endpoint
    pub async fn is_driver_running(url: &str) -> bool {
        match Self::status(url).await {
            Some(response) => response.status().is_success(),
            None => false,
        }
    }

    /// Check that the server reports `ready: true`
    async fn verify_driver_working(url: &str) -> bool {
        let Some(response) = Self::status(url).await else {
            return false;
        };
        match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("value")
                .and_then(|v| v.get("ready"))
                .and_then(|r| r.as_bool())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn status(url: &str) -> Option<reqwest::Response> {
        reqwest::Client::new()
            .get(format!("{}/status", url.trim_end_matches('/')))
            .timeout(Duration::from_secs(1))
            .send()
            .await
            .ok()
    }

    fn lock_processes(&self) -> std::sync::MutexGuard<'_, Vec<WebDriverProcess>> {
        // A poisoned list is still a valid list of children to kill
        self.processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Kill a process group on Unix systems
    #[cfg(unix)]
    fn kill_process_group(pgid: i32) {
        if let Err(e) = Command::new("kill")
            .args(["-TERM", &format!("-{}", pgid)])
            .output()
        {
            debug!("Failed to send SIGTERM to process group {}: {}", pgid, e);
        }

        std::thread::sleep(Duration::from_millis(100));

        if let Err(e) = Command::new("kill")
            .args(["-KILL", &format!("-{}", pgid)])
            .output()
        {
            debug!("Failed to send SIGKILL to process group {}: {}", pgid, e);
        }
    }

    fn stop_process(mut process: WebDriverProcess) {
        #[cfg(unix)]
        if let Some(pgid) = process.process_group_id {
            debug!(
                "Killing process group {} for WebDriver on port {}",
                pgid, process.port
            );
            Self::kill_process_group(pgid);
        }

        let _ = process.child.kill();
        let _ = process.child.wait();
    }

    fn cleanup_failed_process(&self, port: u16) {
        let failed = {
            let mut processes = self.lock_processes();
            processes
                .iter()
                .position(|p| p.port == port)
                .map(|index| processes.remove(index))
        };
        if let Some(process) = failed {
            Self::stop_process(process);
        }
    }

    /// Number of driver processes started by this manager that are still tracked
    pub fn managed_count(&self) -> usize {
        self.lock_processes().len()
    }

    /// Stop all managed WebDriver processes
    pub fn stop_all(&self) {
        let processes: Vec<WebDriverProcess> = self.lock_processes().drain(..).collect();
        for process in processes {
            info!("Stopping {} on port {}", process.browser_type.driver_name(), process.port);
            Self::stop_process(process);
        }
    }
}

impl Drop for WebDriverManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

// Global WebDriver manager instance
lazy_static::lazy_static! {
    pub static ref GLOBAL_WEBDRIVER_MANAGER: WebDriverManager = WebDriverManager::new();
}

#[cfg(test)]
#[path = "webdriver_manager_test.rs"]
mod webdriver_manager_test;
