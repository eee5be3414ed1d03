//! Headless browser fetcher
//!
//! One Chromium process per crawl, one page per task. Pages are closed after
//! every fetch, successful or not.

use super::http::{pick_user_agent, user_agent_pool};
use super::{FetchError, FetchedPage, PageFetcher};
use crate::config::{FetchConfig, RenderConfig};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Installed before any page script runs when stealth is enabled
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
  window.navigator.permissions.query = (parameters) =>
    parameters.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(parameters);
}
"#;

/// Image sources and PDF links as the DOM resolved them
const RESOURCE_SCRIPT: &str = r#"(() => {
  const out = [];
  document.querySelectorAll('img[src]').forEach((img) => out.push(img.src));
  document.querySelectorAll('a[href]').forEach((a) => {
    if (a.href.toLowerCase().split('?')[0].endsWith('.pdf')) out.push(a.href);
  });
  return out.filter((u) => u.startsWith('http'));
})()"#;

/// Status of the main document response, 0 when the browser does not expose it
const STATUS_SCRIPT: &str =
    "(() => { const nav = performance.getEntriesByType('navigation')[0]; return (nav && nav.responseStatus) || 0; })()";

/// Upper bound on the network idle wait after `load`
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Page lifecycle event fired once no requests have been in flight for 500 ms
const NETWORK_IDLE: &str = "networkIdle";

/// Chromium flags for one crawl's browser
fn launch_args(fetch: &FetchConfig, user_agent: &str) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
    ];
    if let Some(proxy) = &fetch.proxy {
        args.push(format!("--proxy-server={}", proxy));
    }
    if !user_agent.is_empty() {
        args.push(format!("--user-agent={}", user_agent));
    }
    args
}

/// Maps the main document status onto the same failures the HTTP fetcher reports
///
/// A status of 0 means the browser did not report one (cached or non-HTTP
/// navigations) and is treated as success.
fn check_status(final_url: &str, status: u16) -> Result<(), FetchError> {
    if status == 0 || (200..300).contains(&status) {
        Ok(())
    } else {
        Err(FetchError::Status {
            url: final_url.to_string(),
            status,
        })
    }
}

/// Idle wait that leaves part of the navigation timeout for content reads
fn settle_timeout(navigation: Duration) -> Duration {
    SETTLE_TIMEOUT.min(navigation / 2)
}

pub struct RenderFetcher {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    user_agents: Vec<String>,
    timeout: Duration,
    stealth: bool,
    screenshot: bool,
}

impl RenderFetcher {
    /// Launches Chromium and starts its event handler
    pub async fn launch(fetch: &FetchConfig, render: &RenderConfig) -> Result<Self, FetchError> {
        let user_agents = user_agent_pool(fetch);

        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        for arg in launch_args(fetch, &pick_user_agent(&user_agents)) {
            builder = builder.arg(arg);
        }
        if !render.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("Browser config error: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Browser(format!("Browser launch failed: {}", e)))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        info!(
            "Launched browser (headless: {}, stealth: {}, screenshots: {})",
            render.headless, render.stealth, render.screenshot
        );

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            user_agents,
            timeout: Duration::from_secs(fetch.render_timeout_secs),
            stealth: render.stealth,
            screenshot: render.screenshot,
        })
    }

    async fn render(&self, page: &Page, url: &Url) -> Result<FetchedPage, FetchError> {
        if self.stealth {
            page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                STEALTH_SCRIPT,
            ))
            .await
            .map_err(browser_error)?;
        }

        page.execute(SetUserAgentOverrideParams::new(pick_user_agent(
            &self.user_agents,
        )))
        .await
        .map_err(browser_error)?;

        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(browser_error)?;
        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(browser_error)?;

        page.goto(url.as_str()).await.map_err(browser_error)?;

        let settle = settle_timeout(self.timeout);
        let idle = async {
            while let Some(event) = lifecycle.next().await {
                if event.name == NETWORK_IDLE {
                    break;
                }
            }
        };
        if tokio::time::timeout(settle, idle).await.is_err() {
            debug!("Network not idle after {:?} for {}, reading page as is", settle, url);
        }

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        let status = match page.evaluate(STATUS_SCRIPT).await {
            Ok(result) => result.into_value::<u16>().unwrap_or(0),
            Err(e) => {
                debug!("Status lookup failed for {}: {}", url, e);
                0
            }
        };
        check_status(&final_url, status)?;

        let raw_content = page.content().await.map_err(browser_error)?;

        let screenshot = if self.screenshot {
            match page
                .screenshot(ScreenshotParams::builder().full_page(true).build())
                .await
            {
                Ok(png) => Some(png),
                Err(e) => {
                    warn!("Screenshot failed for {}: {}", url, e);
                    None
                }
            }
        } else {
            None
        };

        let resource_urls = match page.evaluate(RESOURCE_SCRIPT).await {
            Ok(result) => result.into_value::<Vec<String>>().unwrap_or_default(),
            Err(e) => {
                debug!("Resource enumeration failed for {}: {}", url, e);
                Vec::new()
            }
        };

        Ok(FetchedPage {
            final_url,
            raw_content,
            content_type: Some("text/html".to_string()),
            screenshot,
            resource_urls,
        })
    }
}

fn browser_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

#[async_trait]
impl PageFetcher for RenderFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let guard = self.browser.read().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser already shut down".to_string()))?;

        let page = browser.new_page("about:blank").await.map_err(browser_error)?;

        let result = match tokio::time::timeout(self.timeout, self.render(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        if let Err(e) = page.close().await {
            debug!("Page close failed for {}: {}", url, e);
        }

        result
    }

    async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.write().await.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Browser process wait failed: {}", e);
            }
        }

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
    }
}
