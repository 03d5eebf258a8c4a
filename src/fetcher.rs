use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use bytes::Bytes;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, RETRY_AFTER};
use url::Url;

use crate::cookies::CookieJar;
use crate::progress::{DownloadKind, Progress};

pub struct FetcherOptions<'a> {
    pub user_agent: &'a str,
    /// Facebook locale such as `en_US`.
    pub language: &'a str,
    pub timeout: Duration,
    /// Extra attempts after a 429/503 response.
    pub retries: usize,
    pub cookies: Option<&'a CookieJar>,
    /// Host the cookies are scoped to.
    pub cookie_host: &'a str,
}

pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: usize,
    progress: Option<Arc<Progress>>,
}

impl Fetcher {
    pub fn new(options: FetcherOptions<'_>, progress: Option<Arc<Progress>>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let accept_language = accept_language(options.language);
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&accept_language)
                .with_context(|| format!("invalid language {}", options.language))?,
        );
        if let Some(cookie) = options
            .cookies
            .and_then(|jar| jar.header_for(options.cookie_host))
        {
            let mut value = HeaderValue::from_str(&cookie).context("cookie header")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .default_headers(headers)
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            max_attempts: options.retries + 1,
            progress,
        })
    }

    pub async fn get_bytes(&self, url: Url, kind: DownloadKind) -> anyhow::Result<Bytes> {
        if let Some(p) = &self.progress {
            p.http_start(kind, &url);
        }
        let res = self.get_bytes_inner(&url, kind).await;
        if let Some(p) = &self.progress {
            match &res {
                Ok(bytes) => p.http_ok(kind, &url, bytes.len()),
                Err(_) => p.http_err(kind, &url),
            }
        }
        res
    }

    /// Body as text. Invalid UTF-8 sequences are replaced rather than failing the page.
    pub async fn get_text(&self, url: Url, kind: DownloadKind) -> anyhow::Result<String> {
        let bytes = self.get_bytes(url, kind).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_bytes_inner(&self, url: &Url, kind: DownloadKind) -> anyhow::Result<Bytes> {
        let mut backoff = Duration::from_millis(250);

        for attempt in 1..=self.max_attempts {
            tracing::debug!(%url, attempt, "GET");
            let resp = self
                .client
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("GET {}", url))?;

            let status = resp.status();

            if status.is_success() {
                return resp.bytes().await.context("read response body");
            }

            let throttled = status.as_u16() == 429 || status.as_u16() == 503;
            if throttled && attempt < self.max_attempts {
                let wait = retry_after_duration(resp.headers()).unwrap_or(backoff);
                tracing::warn!(
                    %status,
                    attempt,
                    wait_ms = wait.as_millis(),
                    "throttled; backing off"
                );
                if let Some(p) = &self.progress {
                    p.http_throttled(kind, url, status.as_u16(), wait);
                }
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(Duration::from_secs(10));
                continue;
            }

            return Err(anyhow!("GET {} failed with status {}", url, status));
        }

        Err(anyhow!("GET {} failed after retries", url))
    }
}

/// `en_US` -> `en-US,en;q=0.9`.
fn accept_language(locale: &str) -> String {
    let tag = locale.replace('_', "-");
    match tag.split_once('-') {
        Some((primary, _)) => format!("{tag},{primary};q=0.9"),
        None => tag,
    }
}

fn retry_after_duration(headers: &HeaderMap) -> Option<Duration> {
    let v = headers.get(RETRY_AFTER)?;
    let s = v.to_str().ok()?.trim();
    let seconds: u64 = s.parse().ok()?;
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use httpmock::Method::GET;
    use httpmock::MockServer;

    use super::*;

    fn fetcher(retries: usize) -> Fetcher {
        Fetcher::new(
            FetcherOptions {
                user_agent: "test-agent",
                language: "en_US",
                timeout: Duration::from_secs(5),
                retries,
                cookies: None,
                cookie_host: "",
            },
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn invalid_utf8_body_is_still_text() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/latin1");
            then.status(200)
                .header("Content-Type", "text/html; charset=iso-8859-1")
                .body(b"<p>Caf\xe9 5 Comments</p>".to_vec());
        });

        let url = Url::parse(&server.url("/latin1")).unwrap();
        let text = fetcher(0).get_text(url, DownloadKind::Post).await.unwrap();
        assert_eq!(text, "<p>Caf\u{FFFD} 5 Comments</p>");
    }

    #[tokio::test]
    async fn throttled_request_is_retried() {
        let server = MockServer::start();
        let throttled = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(429).header("Retry-After", "0");
        });

        let url = Url::parse(&server.url("/busy")).unwrap();
        let err = fetcher(1).get_bytes(url, DownloadKind::Post).await.unwrap_err();
        assert!(err.to_string().contains("429"));
        throttled.assert_hits(2);
    }

    #[test]
    fn locale_to_accept_language() {
        assert_eq!(accept_language("en_US"), "en-US,en;q=0.9");
        assert_eq!(accept_language("th_TH"), "th-TH,th;q=0.9");
        assert_eq!(accept_language("en"), "en");
    }

    #[test]
    fn retry_after_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_duration(&headers), Some(Duration::from_secs(3)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_duration(&headers), None);
    }
}
