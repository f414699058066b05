//! W3C WebDriver client over HTTP.
//!
//! Talks to any WebDriver endpoint (chromedriver, geckodriver, a Selenium
//! grid, a hosted browser pool). One WebDriver session is one browser
//! process with one page.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{BrowserError, BrowserResult};
use crate::traits::browser::{BrowserLauncher, Key, PageClient};

/// Key WebDriver uses for element references in JSON.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Interval between element / ready-state polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Deserialize)]
struct ErrorValue {
    error: String,
    #[serde(default)]
    message: String,
}

/// Send a WebDriver command and unwrap the `value` envelope.
async fn command(
    client: &Client,
    method: reqwest::Method,
    url: &str,
    body: Option<Value>,
) -> BrowserResult<Value> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await?;
    let status = resp.status();
    let envelope: Envelope = resp
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("bad response from {}: {}", url, e)))?;

    if status.is_success() {
        return Ok(envelope.value);
    }

    match serde_json::from_value::<ErrorValue>(envelope.value) {
        Ok(err) => Err(BrowserError::WebDriver {
            status: status.as_u16(),
            error: err.error,
            message: err.message,
        }),
        Err(_) => Err(BrowserError::Protocol(format!(
            "HTTP {} without error payload from {}",
            status, url
        ))),
    }
}

fn is_no_such_element(err: &BrowserError) -> bool {
    matches!(err, BrowserError::WebDriver { error, .. } if error == "no such element")
}

/// Launches browsers through a WebDriver endpoint.
#[derive(Clone)]
pub struct WebDriverLauncher {
    client: Client,
    endpoint: String,
    capabilities: Value,
}

impl WebDriverLauncher {
    /// Launcher for a headless Chrome behind `endpoint` (e.g. `http://localhost:9515`).
    pub fn new(endpoint: &str) -> BrowserResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            capabilities: json!({
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": ["--headless=new", "--disable-gpu", "--no-sandbox"]
                }
            }),
        })
    }

    /// Replace the `alwaysMatch` capabilities sent on launch.
    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    type Page = WebDriverPage;

    async fn launch(&self) -> BrowserResult<WebDriverPage> {
        let value = command(
            &self.client,
            reqwest::Method::POST,
            &format!("{}/session", self.endpoint),
            Some(json!({ "capabilities": { "alwaysMatch": self.capabilities } })),
        )
        .await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("new session without sessionId".to_string()))?;

        info!(session_id = %session_id, "Launched browser");

        Ok(WebDriverPage {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            closed: AtomicBool::new(false),
        })
    }
}

/// The single page of one WebDriver session.
pub struct WebDriverPage {
    client: Client,
    base: String,
    closed: AtomicBool,
}

impl WebDriverPage {
    async fn call(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> BrowserResult<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        command(&self.client, method, &format!("{}{}", self.base, path), body).await
    }

    async fn find_element(&self, selector: &str) -> BrowserResult<String> {
        let value = self
            .call(
                reqwest::Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;

        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| BrowserError::Protocol(format!("no element reference for {}", selector)))
    }

    async fn ready_state(&self) -> BrowserResult<String> {
        let value = self
            .call(
                reqwest::Method::POST,
                "/execute/sync",
                Some(json!({ "script": "return document.readyState", "args": [] })),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl PageClient for WebDriverPage {
    async fn set_viewport(&self, width: u32, height: u32) -> BrowserResult<()> {
        self.call(
            reqwest::Method::POST,
            "/window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        debug!(url = %url, "Navigating");
        self.call(reqwest::Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find_element(selector).await {
                Ok(_) => return Ok(true),
                Err(e) if is_no_such_element(&e) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_until_stable(&self, max_wait: Duration) -> BrowserResult<()> {
        let deadline = Instant::now() + max_wait;
        while Instant::now() < deadline {
            if self.ready_state().await? == "complete" {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        // Client-side rendering keeps going after the load event.
        tokio::time::sleep_until(deadline).await;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> BrowserResult<()> {
        let element = self.find_element(selector).await?;
        self.call(
            reqwest::Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> BrowserResult<()> {
        let code = key.code_point();
        self.call(
            reqwest::Method::POST,
            "/actions",
            Some(json!({
                "actions": [{
                    "type": "key",
                    "id": "keyboard",
                    "actions": [
                        { "type": "keyDown", "value": code },
                        { "type": "keyUp", "value": code }
                    ]
                }]
            })),
        )
        .await?;
        Ok(())
    }

    async fn content(&self) -> BrowserResult<String> {
        let value = self.call(reqwest::Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| BrowserError::Protocol("page source is not a string".to_string()))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let value = self.call(reqwest::Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| BrowserError::Protocol("current URL is not a string".to_string()))
    }

    async fn close(&self) -> BrowserResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = command(&self.client, reqwest::Method::DELETE, &self.base, None).await {
            warn!(error = %e, "Failed to close browser session");
            return Err(e);
        }
        Ok(())
    }
}
