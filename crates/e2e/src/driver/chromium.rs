//! Headless Chrome driver over the DevTools protocol
//!
//! Every session launches its own browser with a throwaway profile directory,
//! so cookies, storage and cache never leak between scenarios. DOM probes are
//! small scripts evaluated in the page; they always return a value (never
//! `null`) so results deserialize cleanly.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use loancheck_common::HarnessConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, ElementState, PageDriver};
use crate::error::{E2eError, E2eResult};

/// Launches one headless Chrome per session
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, config: &HarnessConfig) -> E2eResult<Box<dyn PageDriver>> {
        let page = ChromiumPage::launch(config).await?;
        Ok(Box::new(page))
    }
}

/// A single page in a dedicated Chrome process
pub struct ChromiumPage {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

#[derive(Debug, Deserialize)]
struct ProbedElement {
    found: bool,
    visible: bool,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ProbedValue {
    found: bool,
    value: String,
}

impl ChromiumPage {
    /// Launch Chrome with an isolated profile and open a blank page
    pub async fn launch(config: &HarnessConfig) -> E2eResult<Self> {
        let profile = tempfile::Builder::new()
            .prefix("loancheck-profile-")
            .tempdir()?;

        let browser_config = &config.browser;
        let mut builder = CdpConfig::builder()
            .user_data_dir(profile.path())
            .window_size(browser_config.viewport_width, browser_config.viewport_height)
            .viewport(Viewport {
                width: browser_config.viewport_width,
                height: browser_config.viewport_height,
                ..Default::default()
            })
            .launch_timeout(Duration::from_millis(browser_config.launch_timeout_ms))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if !browser_config.headless {
            builder = builder.with_head();
        }

        if !browser_config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = browser_config.executable {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(E2eError::BrowserLaunch)?;

        let (mut browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        // CDP messages are only processed while this task polls the handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler event loop ended");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("Error closing browser after failed page open: {}", close_err);
                }
                if let Err(wait_err) = browser.wait().await {
                    warn!("Error waiting for browser exit: {}", wait_err);
                }
                handler.abort();
                return Err(E2eError::BrowserLaunch(e.to_string()));
            }
        };

        info!(
            "Launched Chrome (headless: {}, profile: {})",
            browser_config.headless,
            profile.path().display()
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
            _profile: profile,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> E2eResult<T> {
        let result = self.page.evaluate(script).await?;
        Ok(result.into_value::<T>()?)
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: &str) -> E2eResult<()> {
        let mut params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key)
            .code(key);
        if let Some(code) = virtual_key_code(key) {
            params = params.windows_virtual_key_code(code);
        }
        let params = params.build().map_err(E2eError::Browser)?;
        self.page.execute(params).await?;
        Ok(())
    }
}

/// Windows virtual key codes Chrome needs for non-character keys
fn virtual_key_code(key: &str) -> Option<i64> {
    match key {
        "Tab" => Some(9),
        "Enter" => Some(13),
        "Escape" => Some(27),
        "Backspace" => Some(8),
        _ => None,
    }
}

/// JSON-encode a Rust string as a JS string literal
fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn fill_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el || !('value' in el)) return false;
  el.focus();
  const proto = el instanceof HTMLTextAreaElement
    ? HTMLTextAreaElement.prototype
    : HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
  setter.call(el, '');
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  setter.call(el, {value});
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
        selector = js_str(selector),
        value = js_str(value),
    )
}

fn click_by_text_script(label: &str) -> String {
    format!(
        r#"(() => {{
  const wanted = {label};
  const candidates = document.querySelectorAll(
    'button, a, [role=button], input[type=button], input[type=submit], input[type=reset]'
  );
  for (const el of candidates) {{
    const text = (el.innerText || el.value || '').trim();
    const box = el.getBoundingClientRect();
    if (text === wanted && box.width > 0 && box.height > 0) {{
      el.scrollIntoView({{ block: 'center' }});
      el.click();
      return true;
    }}
  }}
  return false;
}})()"#,
        label = js_str(label),
    )
}

fn input_value_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el) return {{ found: false, value: '' }};
  return {{ found: true, value: String(el.value ?? '') }};
}})()"#,
        selector = js_str(selector),
    )
}

fn element_state_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el) return {{ found: false, visible: false, text: '' }};
  const style = window.getComputedStyle(el);
  const box = el.getBoundingClientRect();
  const visible = style.visibility !== 'hidden' && style.display !== 'none'
    && box.width > 0 && box.height > 0;
  return {{ found: true, visible, text: el.textContent || '' }};
}})()"#,
        selector = js_str(selector),
    )
}

const VISIBLE_TEXTS_SCRIPT: &str = r#"(() => {
  const out = [];
  for (const el of document.body ? document.body.querySelectorAll('*') : []) {
    let own = '';
    for (const node of el.childNodes) {
      if (node.nodeType === Node.TEXT_NODE) own += node.textContent;
    }
    own = own.trim();
    if (!own) continue;
    const style = window.getComputedStyle(el);
    const box = el.getBoundingClientRect();
    if (style.visibility === 'hidden' || style.display === 'none') continue;
    if (box.width === 0 || box.height === 0) continue;
    out.push((el.innerText || own).trim());
  }
  return out;
})()"#;

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("Navigating to {}", url);
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<bool> {
        self.eval(fill_script(selector, value)).await
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn click_by_text(&self, label: &str) -> E2eResult<bool> {
        self.eval(click_by_text_script(label)).await
    }

    async fn input_value(&self, selector: &str) -> E2eResult<Option<String>> {
        let probed: ProbedValue = self.eval(input_value_script(selector)).await?;
        Ok(probed.found.then_some(probed.value))
    }

    async fn element_state(&self, selector: &str) -> E2eResult<ElementState> {
        let probed: ProbedElement = self.eval(element_state_script(selector)).await?;
        Ok(match (probed.found, probed.visible) {
            (false, _) => ElementState::Missing,
            (true, false) => ElementState::Hidden(probed.text),
            (true, true) => ElementState::Visible(probed.text),
        })
    }

    async fn visible_texts(&self) -> E2eResult<Vec<String>> {
        self.eval(VISIBLE_TEXTS_SCRIPT.to_string()).await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| E2eError::ScreenshotFailure(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            debug!("Shutting down browser");
            if let Err(e) = browser.close().await {
                warn!("Error closing browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Error waiting for browser exit: {}", e);
            }
        }
        self.handler.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(js_str(r#"button:has-text("Go")"#), r#""button:has-text(\"Go\")""#);
        assert_eq!(js_str("it's"), r#""it's""#);
    }

    #[test]
    fn test_fill_script_embeds_literals() {
        let script = fill_script("#loanAmount", "10000");
        assert!(script.contains(r##"document.querySelector("#loanAmount")"##));
        assert!(script.contains(r#"setter.call(el, "10000")"#));
    }

    #[test]
    fn test_click_script_uses_exact_label() {
        let script = click_by_text_script("Calculate");
        assert!(script.contains(r#"const wanted = "Calculate";"#));
        assert!(script.contains("text === wanted"));
    }

    #[test]
    fn test_virtual_key_codes() {
        assert_eq!(virtual_key_code("Tab"), Some(9));
        assert_eq!(virtual_key_code("a"), None);
    }
}
