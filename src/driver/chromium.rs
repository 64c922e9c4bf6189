//! Chrome DevTools implementation of [`UiDriver`]
//!
//! One browser process with a single tab. The CDP handler runs on its own
//! task; when its event stream ends the connection is gone and every later
//! command reports [`DriverError::SessionLost`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Handler, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{Control, DriverResult, Key, Locator, Selectors, UiDriver};
use crate::config::BrowserSettings;
use crate::utils::error::DriverError;
use crate::utils::retry::{with_retry, RetryConfig};

const IS_DISPLAYED_JS: &str = "function() { \
    const style = window.getComputedStyle(this); \
    if (style.display === 'none' || style.visibility === 'hidden') { return false; } \
    return !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length); \
}";

const CLEAR_VALUE_JS: &str = "function() { \
    this.value = ''; \
    this.dispatchEvent(new Event('input', { bubbles: true })); \
    this.dispatchEvent(new Event('change', { bubbles: true })); \
}";

/// Live browser process plus the tab the form is driven in
struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl Session {
    async fn start(settings: &BrowserSettings) -> DriverResult<Self> {
        let config = browser_config(settings)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler_task = spawn_handler_task(handler, Arc::clone(&closed));

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(format!("Failed to open tab: {e}")));
            }
        };

        tracing::info!(headless = settings.headless, "Browser session started");

        Ok(Self {
            browser,
            page,
            handler_task,
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Best-effort shutdown; errors are logged, not returned
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "Browser close command failed");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "Waiting for browser exit failed");
        }
        self.handler_task.abort();
    }
}

fn browser_config(settings: &BrowserSettings) -> DriverResult<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .window_size(settings.window_width, settings.window_height)
        .request_timeout(Duration::from_secs(settings.request_timeout_secs))
        .no_sandbox()
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    if !settings.headless {
        builder = builder.with_head();
    }

    if let Some(executable) = &settings.executable {
        builder = builder.chrome_executable(executable);
    }

    builder.build().map_err(DriverError::Launch)
}

fn spawn_handler_task(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!(error = %e, "CDP handler event error");
            }
        }
        closed.store(true, Ordering::SeqCst);
        tracing::debug!("CDP handler stream ended");
    })
}

/// Map a CDP failure onto the driver taxonomy
fn classify(err: CdpError) -> DriverError {
    match err {
        CdpError::Ws(_) | CdpError::NoResponse | CdpError::ChannelSendError(_) => {
            DriverError::SessionLost(err.to_string())
        }
        other => DriverError::from_message(other.to_string()),
    }
}

/// Lookups that find nothing are reported as errors by some CDP calls
fn is_not_found(err: &CdpError) -> bool {
    if matches!(err, CdpError::NotFound) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("could not find node") || message.contains("no node")
}

/// [`UiDriver`] backed by a locally launched Chrome/Chromium
pub struct ChromiumDriver {
    settings: BrowserSettings,
    selectors: Selectors,
    session: Option<Session>,
}

impl ChromiumDriver {
    /// Launch the browser, retrying up to `launch_retries` extra times
    pub async fn launch(settings: BrowserSettings, selectors: Selectors) -> DriverResult<Self> {
        let session = Self::start_session(&settings).await?;
        Ok(Self {
            settings,
            selectors,
            session: Some(session),
        })
    }

    async fn start_session(settings: &BrowserSettings) -> DriverResult<Session> {
        let retry = RetryConfig::with_delays(settings.launch_retries, 1000, 5000);
        with_retry(
            &retry,
            || Session::start(settings),
            |e| matches!(e, DriverError::Launch(_)),
        )
        .await
    }

    fn session(&self) -> DriverResult<&Session> {
        match &self.session {
            Some(session) if session.is_closed() => Err(DriverError::SessionLost(
                "browser connection closed".to_string(),
            )),
            Some(session) => Ok(session),
            None => Err(DriverError::SessionLost(
                "no active browser session".to_string(),
            )),
        }
    }

    fn page(&self) -> DriverResult<&Page> {
        Ok(&self.session()?.page)
    }

    /// Fail fast on a dead session before touching an element handle
    fn ensure_alive(&self) -> DriverResult<()> {
        self.session().map(|_| ())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.handler_task.abort();
        }
    }
}

#[async_trait]
impl UiDriver for ChromiumDriver {
    type Element = Arc<Element>;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.page()?.goto(url).await.map_err(classify)?;
        tracing::debug!(url = %url, "Navigated");
        Ok(())
    }

    async fn find_all(&self, control: Control) -> DriverResult<Vec<Self::Element>> {
        let page = self.page()?;

        let found = match self.selectors.locator(control) {
            Locator::Css(selector) => page.find_elements(selector.as_str()).await,
            Locator::Xpath(expression) => page.find_xpaths(expression.as_str()).await,
        };

        match found {
            Ok(elements) => Ok(elements.into_iter().map(Arc::new).collect()),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(classify(e)),
        }
    }

    async fn find_within(
        &self,
        parent: &Self::Element,
        control: Control,
    ) -> DriverResult<Vec<Self::Element>> {
        self.ensure_alive()?;

        let selector = match self.selectors.locator(control) {
            Locator::Css(selector) => selector,
            Locator::Xpath(_) => {
                return Err(DriverError::UnsupportedLocator {
                    control,
                    reason: "element-relative lookups require a CSS selector".to_string(),
                })
            }
        };

        match parent.find_elements(selector.as_str()).await {
            Ok(elements) => Ok(elements.into_iter().map(Arc::new).collect()),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(classify(e)),
        }
    }

    async fn click(&self, element: &Self::Element) -> DriverResult<()> {
        self.ensure_alive()?;
        element.click().await.map_err(classify)?;
        Ok(())
    }

    async fn clear(&self, element: &Self::Element) -> DriverResult<()> {
        self.ensure_alive()?;
        element
            .call_js_fn(CLEAR_VALUE_JS, false)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn type_text(&self, element: &Self::Element, text: &str) -> DriverResult<()> {
        self.ensure_alive()?;
        element.focus().await.map_err(classify)?;
        element.type_str(text).await.map_err(classify)?;
        Ok(())
    }

    async fn press_key(&self, element: &Self::Element, key: Key) -> DriverResult<()> {
        self.ensure_alive()?;
        element.focus().await.map_err(classify)?;
        element.press_key(key.as_str()).await.map_err(classify)?;
        Ok(())
    }

    async fn read_text(&self, element: &Self::Element) -> DriverResult<String> {
        self.ensure_alive()?;
        let text = element.inner_text().await.map_err(classify)?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> DriverResult<Option<String>> {
        self.ensure_alive()?;
        element.attribute(name).await.map_err(classify)
    }

    async fn is_displayed(&self, element: &Self::Element) -> DriverResult<bool> {
        self.ensure_alive()?;
        let returns = element
            .call_js_fn(IS_DISPLAYED_JS, false)
            .await
            .map_err(classify)?;
        Ok(returns
            .result
            .value
            .and_then(|value| value.as_bool())
            .unwrap_or(false))
    }

    async fn restart(&mut self) -> DriverResult<()> {
        tracing::info!("Restarting browser session");
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.session = Some(Self::start_session(&self.settings).await?);
        Ok(())
    }

    async fn quit(&mut self) -> DriverResult<()> {
        if let Some(session) = self.session.take() {
            session.close().await;
            tracing::info!("Browser session closed");
        }
        Ok(())
    }
}
