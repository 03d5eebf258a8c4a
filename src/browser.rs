use std::time::{Duration, Instant};

use anyhow::{Context as _, anyhow};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport;
use futures_lite::StreamExt as _;
use tokio::task::JoinHandle;

use crate::config::{Credentials, Pacing, jitter};
use crate::cookies::{Cookie, CookieJar};
use crate::profile::FeedPage;

const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--disable-popup-blocking",
    "--window-size=1920,1080",
];

const STEALTH_JS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    window.chrome = { runtime: {} };
"#;

/// A Chromium instance with a single tab, driven over CDP.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    pacing: Pacing,
}

impl ChromeSession {
    pub async fn launch(headless: bool, pacing: Pacing) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder()
            .viewport(Some(Viewport {
                width: 1920,
                height: 1080,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .args(LAUNCH_ARGS.iter().copied());
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("browser config error: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("failed to launch browser: {e}"))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(anyhow!("failed to create page: {e}"));
            }
        };
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await
            .map_err(|e| anyhow!("failed to install stealth script: {e}"))?;

        tracing::info!(headless, "browser launched");
        Ok(Self {
            browser,
            page,
            handler,
            pacing,
        })
    }

    pub async fn login(&self, login_url: &str, credentials: &Credentials) -> anyhow::Result<()> {
        tracing::info!(login_url, email = %credentials.email, "logging in");
        self.goto(login_url).await?;

        let email = self.wait_for(r#"input[name="email"]"#).await?;
        self.type_like_human(&email, &credentials.email).await?;

        let password = self.wait_for(r#"input[name="pass"]"#).await?;
        self.type_like_human(&password, &credentials.password).await?;

        let submit = self
            .page
            .find_element(r#"button[type="submit"]"#)
            .await
            .map_err(|e| anyhow!("login button not found: {e}"))?;
        submit
            .hover()
            .await
            .map_err(|e| anyhow!("hover login button: {e}"))?;
        tokio::time::sleep(jitter(self.pacing.click_pause)).await;
        submit
            .click()
            .await
            .map_err(|e| anyhow!("click login button: {e}"))?;

        tokio::time::sleep(self.pacing.login_wait).await;
        let landed = self.page.url().await.ok().flatten().unwrap_or_default();
        tracing::info!(url = %landed, "login submitted");
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        tracing::info!(url, "opening profile");
        self.goto(url).await?;
        tokio::time::sleep(self.pacing.navigate_wait).await;
        Ok(())
    }

    pub async fn load_cookies(&self, jar: &CookieJar) -> anyhow::Result<()> {
        let mut params = Vec::with_capacity(jar.len());
        for cookie in jar.cookies() {
            params.push(cookie_param(cookie)?);
        }
        if params.is_empty() {
            return Ok(());
        }
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| anyhow!("set browser cookies: {e}"))?;
        tracing::info!(count = jar.len(), "session cookies loaded");
        Ok(())
    }

    pub async fn cookies(&self) -> anyhow::Result<CookieJar> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| anyhow!("read browser cookies: {e}"))?;
        Ok(CookieJar::new(
            cookies
                .into_iter()
                .map(|c| Cookie {
                    name: c.name,
                    value: c.value,
                    domain: c.domain,
                    path: c.path,
                    expires: c.expires as i64,
                    http_only: c.http_only,
                    secure: c.secure,
                })
                .collect(),
        ))
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        let res = self.browser.close().await;
        self.handler.abort();
        res.map_err(|e| anyhow!("close browser: {e}"))?;
        tracing::debug!("browser closed");
        Ok(())
    }

    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| anyhow!("navigate to {url}: {e}"))?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str) -> anyhow::Result<Element> {
        let deadline = Instant::now() + ELEMENT_TIMEOUT;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if Instant::now() >= deadline => {
                    return Err(anyhow!("timed out waiting for {selector}: {e}"));
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(250)).await,
            }
        }
    }

    async fn type_like_human(&self, element: &Element, text: &str) -> anyhow::Result<()> {
        use rand::Rng as _;

        element
            .click()
            .await
            .map_err(|e| anyhow!("focus input: {e}"))?;
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(|e| anyhow!("type into input: {e}"))?;
            tokio::time::sleep(jitter(self.pacing.typing_delay)).await;
            let hesitate = rand::thread_rng().gen_bool(self.pacing.hesitation_chance.clamp(0.0, 1.0));
            if hesitate {
                tokio::time::sleep(jitter(self.pacing.hesitation)).await;
            }
        }
        Ok(())
    }
}

impl FeedPage for ChromeSession {
    async fn html(&self) -> anyhow::Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| anyhow!("read page source: {e}"))
    }

    async fn scroll_by(&self, pixels: u32) -> anyhow::Result<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {pixels});"))
            .await
            .map_err(|e| anyhow!("scroll: {e}"))?;
        Ok(())
    }
}

fn cookie_param(cookie: &Cookie) -> anyhow::Result<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if !cookie.domain.is_empty() {
        builder = builder.domain(cookie.domain.clone());
    } else {
        builder = builder.url("https://www.facebook.com/");
    }
    if cookie.expires > 0 {
        builder = builder.expires(TimeSinceEpoch::new(cookie.expires as f64));
    }
    builder
        .build()
        .map_err(|e| anyhow!("cookie {}: {e}", cookie.name))
        .context("build browser cookie")
}
