use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Default cookie file picked up by `fetch` when `--cookies` is not given.
pub const DEFAULT_COOKIES_PATH: &str = "facebook/facebook_cookies.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    /// Unix seconds; 0 or negative means a session cookie.
    #[serde(default)]
    pub expires: i64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn root_path() -> String {
    "/".to_string()
}

impl Cookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires > 0 && self.expires < now
    }

    fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            cookies: cookies.into_iter().filter(|c| !c.is_expired(now)).collect(),
        }
    }

    /// Reads a Netscape `cookies.txt` or a JSON array of cookies, sniffed from the content.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read cookies {}", path.display()))?;
        let cookies = if text.trim_start().starts_with('[') {
            serde_json::from_str(&text)
                .with_context(|| format!("parse json cookies {}", path.display()))?
        } else {
            parse_netscape(&text).with_context(|| format!("parse cookies {}", path.display()))?
        };
        let jar = Self::new(cookies);
        tracing::debug!(path = %path.display(), count = jar.len(), "loaded cookies");
        Ok(jar)
    }

    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.cookies).context("serialize cookies")?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Cookie` header value for requests to `host`, or `None` when nothing applies.
    pub fn header_for(&self, host: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches_host(host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

fn parse_netscape(text: &str) -> anyhow::Result<Vec<Cookie>> {
    let mut cookies = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let mut line = raw.trim_end_matches(['\r', '\n']);
        let mut http_only = false;
        if let Some(rest) = line.strip_prefix("#HttpOnly_") {
            line = rest;
            http_only = true;
        } else if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            anyhow::bail!("line {}: expected 7 tab-separated fields", idx + 1);
        }
        let expires = fields[4]
            .trim()
            .parse::<i64>()
            .with_context(|| format!("line {}: bad expiry {:?}", idx + 1, fields[4]))?;
        cookies.push(Cookie {
            domain: fields[0].to_string(),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            expires,
            name: fields[5].to_string(),
            value: fields[6..].join("\t"),
            http_only,
        });
    }
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETSCAPE: &str = "# Netscape HTTP Cookie File\n\
        \n\
        .facebook.com\tTRUE\t/\tTRUE\t0\tc_user\t1000123\n\
        #HttpOnly_.facebook.com\tTRUE\t/\tTRUE\t4102444800\txs\tabc%3Adef\n\
        .facebook.com\tTRUE\t/\tFALSE\t946684800\told\tgone\n\
        .example.org\tTRUE\t/\tFALSE\t0\tother\t1\n";

    #[test]
    fn parses_netscape_and_drops_expired() {
        let jar = CookieJar::new(parse_netscape(NETSCAPE).unwrap());
        let names: Vec<_> = jar.cookies().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["c_user", "xs", "other"]);
        assert!(jar.cookies()[1].http_only);
        assert!(jar.cookies()[1].secure);
    }

    #[test]
    fn header_matches_parent_domains_only() {
        let jar = CookieJar::new(parse_netscape(NETSCAPE).unwrap());
        assert_eq!(
            jar.header_for("mbasic.facebook.com").as_deref(),
            Some("c_user=1000123; xs=abc%3Adef")
        );
        assert_eq!(jar.header_for("notfacebook.com"), None);
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_netscape(".facebook.com\tTRUE\t/\n").is_err());
    }

    #[test]
    fn json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session/cookies.json");
        let jar = CookieJar::new(vec![Cookie {
            name: "c_user".into(),
            value: "42".into(),
            domain: ".facebook.com".into(),
            path: "/".into(),
            expires: 0,
            http_only: false,
            secure: true,
        }]);
        jar.save_json(&path).unwrap();
        assert_eq!(CookieJar::load(&path).unwrap(), jar);
    }

    #[test]
    fn json_cookie_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, r#"[{"name":"datr","value":"x"}]"#).unwrap();
        let jar = CookieJar::load(&path).unwrap();
        assert_eq!(jar.cookies()[0].path, "/");
        assert_eq!(jar.header_for("anything.test").as_deref(), Some("datr=x"));
    }
}
