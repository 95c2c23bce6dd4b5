//! Run the browser scenarios with debugging output:
//!
//! ```shell
//! TARGET_URL=https://sales.example.com RUST_LOG=main=debug \
//!     cargo test -- --ignored --nocapture
//! ```

use anyhow::{Context, Result};
use fantoccini::cookies::Cookie;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::helpers::artifact_name;

pub struct TestEnvironment {
    pub browser: Client,
    pub config: Config,
    pub geckodriver: Option<Geckodriver>,
}

/// A geckodriver started for one environment. Dropping it stops the
/// process, so an early return during setup cannot leave it running.
pub struct Geckodriver {
    process: Child,
    pub port: u16,
}

impl Geckodriver {
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Drop for Geckodriver {
    fn drop(&mut self) {
        info!("🧹 Stopping geckodriver");
        if let Err(e) = self.process.kill() {
            warn!("Failed to kill geckodriver process: {}", e);
        }
        let _ = self.process.wait();
    }
}

impl TestEnvironment {
    #[cfg(test)]
    pub async fn setup() -> Result<Self> {
        crate::telemetry::init_test_tracing();
        Self::setup_with_options(false).await
    }

    pub async fn setup_headed() -> Result<Self> {
        Self::setup_with_options(true).await
    }

    async fn setup_with_options(headed: bool) -> Result<Self> {
        info!("🔧 Setting up test environment");

        let config = Config::from_env()
            .context("Failed to load configuration")?
            .with_headed(headed);

        // Step 1: Make sure the deployment answers at all
        info!("🌍 Checking target {}", config.base_url());
        wait_for_target(config.base_url()).await?;
        info!("✅ Target reachable");

        // Step 2: Use the configured WebDriver or start geckodriver
        let (geckodriver, webdriver_url) = match &config.webdriver_url {
            Some(url) => {
                info!("🔌 Using WebDriver at {}", url);
                (None, url.clone())
            }
            None => {
                info!("🦎 Starting geckodriver");
                let geckodriver = start_geckodriver_with_retry(4444).await?;
                info!("✅ Geckodriver running on port {}", geckodriver.port);
                let url = geckodriver.url();
                (Some(geckodriver), url)
            }
        };

        // Step 3: Connect to browser
        info!("🌐 Connecting to browser");
        let browser = connect_to_browser(&webdriver_url, config.headed).await?;
        info!("✅ Browser connected");

        let env = TestEnvironment {
            browser,
            config,
            geckodriver,
        };

        // Step 4: Reuse an authenticated session when one is configured
        if let Err(e) = env.inject_session_cookie().await {
            if let Err(close_err) = env.browser.clone().close().await {
                debug!("Failed to close browser session: {}", close_err);
            }
            return Err(e);
        }

        Ok(env)
    }

    /// Cookies can only be set for the current origin, so the base url is
    /// loaded first.
    async fn inject_session_cookie(&self) -> Result<()> {
        let Some((name, value)) = self.config.session_cookie() else {
            debug!("No session cookie configured");
            return Ok(());
        };
        info!("🍪 Injecting session cookie {}", name);
        self.browser.goto(self.config.base_url()).await?;

        let mut cookie = Cookie::new(name, value);
        cookie.set_path("/");
        self.browser
            .add_cookie(cookie)
            .await
            .context("Failed to set session cookie")?;
        Ok(())
    }

    /// Navigate to a site path and give the page a moment to settle.
    pub async fn goto(&self, path: &str) -> Result<()> {
        let url = self.config.url(path);
        debug!("Navigating to {}", url);
        self.browser
            .goto(&url)
            .await
            .with_context(|| format!("Failed to load {}", url))?;
        self.pause().await;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        Ok(self.browser.current_url().await?.to_string())
    }

    pub async fn pause(&self) {
        sleep(self.config.action_delay).await;
    }

    pub async fn wait_for(&self, locator: Locator<'_>) -> Result<Element> {
        let what = format!("{:?}", locator);
        let element = self
            .browser
            .wait()
            .at_most(self.config.wait_timeout)
            .for_element(locator)
            .await
            .with_context(|| format!("Timed out waiting for {}", what))?;
        Ok(element)
    }

    /// Poll `check` until it reports true or the wait timeout runs out.
    pub async fn poll_until<F, Fut>(
        &self,
        what: &str,
        timeout: Duration,
        mut check: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if check().await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "Timed out after {:?} waiting for {}",
                    timeout,
                    what
                ));
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// Outline an element so someone watching a headed run can follow along.
    pub async fn highlight(&self, element: &Element) -> Result<()> {
        if !self.config.headed {
            return Ok(());
        }
        let script = r#"
            const el = arguments[0];
            el.scrollIntoView({block: 'center'});
            el.style.outline = '3px solid #ff3b30';
            el.style.outlineOffset = '3px';
        "#;
        self.browser
            .execute(script, vec![serde_json::to_value(element)?])
            .await?;
        sleep(Duration::from_millis(400)).await;
        Ok(())
    }

    /// End a scenario. Failures leave a screenshot, the page source and a
    /// JSON report in the artifacts directory before the error is returned.
    pub async fn finish(self, test_name: &str, outcome: Result<()>) -> Result<()> {
        if let Err(e) = &outcome {
            warn!("❌ {} failed: {:#}", test_name, e);
            if let Err(write_err) = self.save_failure_artifacts(test_name, e).await {
                warn!("Failed to save artifacts for {}: {:#}", test_name, write_err);
            }
        } else {
            info!("✅ {} passed", test_name);
        }

        if let Err(e) = self.browser.clone().close().await {
            debug!("Failed to close browser session: {}", e);
        }
        outcome
    }

    async fn save_failure_artifacts(
        &self,
        test_name: &str,
        error: &anyhow::Error,
    ) -> Result<()> {
        let dir = &self.config.artifacts_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let stem = artifact_name(test_name);

        let report = FailureReport {
            test: test_name,
            url: self.current_url().await.ok(),
            error: format!("{:#}", error),
            captured_at: jiff::Timestamp::now(),
        };
        tokio::fs::write(
            dir.join(format!("{stem}.json")),
            serde_json::to_vec_pretty(&report)?,
        )
        .await?;

        let screenshot = self.browser.screenshot().await?;
        tokio::fs::write(dir.join(format!("{stem}.png")), screenshot).await?;

        let source = self.browser.source().await?;
        tokio::fs::write(dir.join(format!("{stem}.html")), source).await?;

        info!("🗂️ Saved failure artifacts to {}/{}.*", dir.display(), stem);
        Ok(())
    }
}

#[derive(Serialize)]
struct FailureReport<'a> {
    test: &'a str,
    url: Option<String>,
    error: String,
    captured_at: jiff::Timestamp,
}

/// Any HTTP answer counts, the login redirect included.
async fn wait_for_target(url: &str) -> Result<()> {
    let mut last_error = None;
    for i in 1..=30 {
        match reqwest::get(url).await {
            Ok(response) => {
                debug!(
                    "Target answered {} after {} attempts",
                    response.status(),
                    i
                );
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
    Err(anyhow::anyhow!(
        "Target {} did not answer after 30 attempts: {:?}",
        url,
        last_error
    ))
}

async fn start_geckodriver_with_retry(base_port: u16) -> Result<Geckodriver> {
    for attempt in 1..=5 {
        let port = base_port + rand::thread_rng().gen_range(0..=100);
        debug!(
            "Attempting to start geckodriver on port {} (attempt {})",
            port, attempt
        );

        match Command::new("geckodriver")
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(mut child) => {
                sleep(Duration::from_millis(500)).await;

                // An early exit almost always means the port was taken
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!(
                            "Geckodriver exited with status {}, trying different port",
                            status
                        );
                    }
                    Ok(None) => {
                        return Ok(Geckodriver {
                            process: child,
                            port,
                        });
                    }
                    Err(e) => {
                        debug!("Error checking geckodriver status: {}", e);
                        let _ = child.kill();
                    }
                }
            }
            Err(e) => {
                debug!("Failed to start geckodriver: {}", e);
            }
        }

        if attempt < 5 {
            sleep(Duration::from_millis(100)).await;
        }
    }

    Err(anyhow::anyhow!(
        "Failed to start geckodriver after 5 attempts"
    ))
}

async fn connect_to_browser(webdriver_url: &str, headed: bool) -> Result<Client> {
    let mut caps = serde_json::Map::new();
    let firefox_opts = if headed {
        info!("🖥️ Starting browser in headed mode");
        serde_json::json!({
            "log": {"level": "error"}
        })
    } else {
        info!("👻 Starting browser in headless mode");
        serde_json::json!({
            "args": ["--headless"],
            "log": {"level": "error"}
        })
    };
    caps.insert("moz:firefoxOptions".to_string(), firefox_opts);

    let client = ClientBuilder::native()
        .capabilities(caps)
        .connect(webdriver_url)
        .await
        .context("Failed to connect to WebDriver")?;

    Ok(client)
}
