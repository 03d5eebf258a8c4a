use std::sync::LazyLock;

use kuchiki::NodeRef;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom;

/// One feed post as scraped from the rendered page. Values are kept as shown on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrapedPost {
    pub post_text: String,
    pub likes: Option<String>,
    pub comments: Option<String>,
    pub shares: Option<String>,
    pub post_time: Option<String>,
}

pub const LIKE_KEYWORDS: &[&str] = &["like", "ถูกใจ", "reaction"];
pub const COMMENT_KEYWORDS: &[&str] = &["comment", "ความเห็น"];
pub const SHARE_KEYWORDS: &[&str] = &["share", "แชร์"];

const ARTICLE_SELECTOR: &str = r#"div[role="article"]"#;
const MESSAGE_SELECTOR: &str = r#"[data-ad-preview="message"] span"#;
const FALLBACK_TEXT_SELECTOR: &str = r#"span[dir="auto"]"#;
const TIME_SELECTOR: &str =
    r#"a[href*="posts"] abbr, a[href*="permalink"] abbr, abbr[data-utime]"#;
const FALLBACK_TIME_SELECTOR: &str = "span > a > span";

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d,.]*\d[\d,.]*").expect("number regex"));

/// Extracts every article-like element of a rendered page. Posts without any field are skipped,
/// and a post that fails to extract is logged and skipped without affecting the others.
pub fn extract_posts(html: &str) -> Vec<ScrapedPost> {
    let document = dom::parse(html);
    let articles = match dom::select_all(&document, ARTICLE_SELECTOR) {
        Ok(nodes) => nodes,
        Err(err) => {
            tracing::error!(error = %err, "select articles");
            return Vec::new();
        }
    };

    let mut posts = Vec::with_capacity(articles.len());
    for (index, article) in articles.iter().enumerate() {
        match extract_post(article) {
            Ok(Some(post)) => posts.push(post),
            Ok(None) => {}
            Err(err) => tracing::warn!(index, error = %format!("{err:#}"), "error extracting post data"),
        }
    }
    posts
}

pub fn extract_post(article: &NodeRef) -> anyhow::Result<Option<ScrapedPost>> {
    let post_text = extract_post_text(article)?;
    let likes = extract_metric(article, LIKE_KEYWORDS)?;
    let comments = extract_metric(article, COMMENT_KEYWORDS)?;
    let shares = extract_metric(article, SHARE_KEYWORDS)?;
    let post_time = extract_timestamp(article)?;

    if post_text.is_empty()
        && likes.is_none()
        && comments.is_none()
        && shares.is_none()
        && post_time.is_none()
    {
        return Ok(None);
    }

    Ok(Some(ScrapedPost {
        post_text,
        likes,
        comments,
        shares,
        post_time,
    }))
}

fn extract_post_text(article: &NodeRef) -> anyhow::Result<String> {
    let mut parts: Vec<String> = dom::select_all(article, MESSAGE_SELECTOR)?
        .iter()
        .map(dom::stripped_text)
        .filter(|v| !v.is_empty())
        .collect();

    if parts.is_empty() {
        parts = dom::select_all(article, FALLBACK_TEXT_SELECTOR)?
            .iter()
            .map(dom::stripped_text)
            .filter(|v| v.chars().count() > 1)
            .collect();
    }

    let mut unique: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if !unique.contains(&part) {
            unique.push(part);
        }
    }
    Ok(unique.join(" ").trim().to_string())
}

/// First number found next to one of `keywords`, looking at `aria-label`s before visible text.
pub fn extract_metric(article: &NodeRef, keywords: &[&str]) -> anyhow::Result<Option<String>> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mentions = |value: &str| keywords.iter().any(|k| value.contains(k.as_str()));

    for node in dom::select_all(article, "[aria-label]")? {
        let label = dom::attr(&node, "aria-label").unwrap_or_default().to_lowercase();
        if mentions(&label) {
            if let Some(m) = NUMBER_RE.find(&label) {
                return Ok(Some(m.as_str().to_string()));
            }
        }
    }

    for text in dom::text_nodes(article) {
        let value = text.trim();
        if value.is_empty() {
            continue;
        }
        let lowered = value.to_lowercase();
        if mentions(&lowered) {
            if let Some(m) = NUMBER_RE.find(&lowered) {
                return Ok(Some(m.as_str().to_string()));
            }
        }
    }
    Ok(None)
}

fn extract_timestamp(article: &NodeRef) -> anyhow::Result<Option<String>> {
    if let Some(node) = dom::select_first(article, TIME_SELECTOR)? {
        let value = if dom::has_attr(&node, "aria-label") {
            dom::attr(&node, "aria-label").unwrap_or_default()
        } else if dom::has_attr(&node, "data-utime") {
            dom::attr(&node, "data-utime").unwrap_or_default()
        } else {
            dom::stripped_text(&node)
        };
        return Ok(non_empty(value));
    }

    Ok(dom::select_first(article, FALLBACK_TIME_SELECTOR)?
        .map(|node| dom::stripped_text(&node))
        .and_then(non_empty))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"
<html><body>
<div role="feed">
  <div role="article">
    <div data-ad-preview="message">
      <span>Matchday tomorrow</span>
      <span>Matchday tomorrow</span>
      <span>See you there</span>
    </div>
    <a href="/cristiano/posts/1"><abbr aria-label="March 3 at 10:00 AM">3h</abbr></a>
    <div aria-label="Like: 12,345 people"></div>
    <span>1.2K comments</span>
    <span>Share</span>
    <span>345 shares</span>
  </div>
  <div role="article">
    <span dir="auto">x</span>
    <span dir="auto">ความสุข</span>
    <div aria-label="ถูกใจ 42 คน"></div>
    <span>7 ความเห็น</span>
    <span>แชร์ 3 ครั้ง</span>
    <abbr data-utime="1700000000">Yesterday</abbr>
  </div>
  <div role="article"><div>   </div></div>
</div>
</body></html>
"#;

    #[test]
    fn extracts_text_metrics_and_time() {
        let posts = extract_posts(FEED);
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.post_text, "Matchday tomorrow See you there");
        assert_eq!(first.likes.as_deref(), Some("12,345"));
        assert_eq!(first.comments.as_deref(), Some("1.2"));
        assert_eq!(first.shares.as_deref(), Some("345"));
        assert_eq!(first.post_time.as_deref(), Some("March 3 at 10:00 AM"));
    }

    #[test]
    fn thai_keywords_and_fallback_text() {
        let posts = extract_posts(FEED);
        let second = &posts[1];
        assert_eq!(second.post_text, "ความสุข");
        assert_eq!(second.likes.as_deref(), Some("42"));
        assert_eq!(second.comments.as_deref(), Some("7"));
        assert_eq!(second.shares.as_deref(), Some("3"));
        assert_eq!(second.post_time.as_deref(), Some("1700000000"));
    }

    #[test]
    fn timestamp_falls_back_to_nested_span() {
        let html = r#"<div role="article"><span><a href="/x"><span> 5 min </span></a></span></div>"#;
        let posts = extract_posts(html);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_time.as_deref(), Some("5 min"));
        assert_eq!(posts[0].post_text, "");
    }

    #[test]
    fn keyword_without_number_is_skipped() {
        let html = r#"<div role="article">
            <div aria-label="Like"></div>
            <div aria-label="Like."></div>
            <span>Like</span>
            <span>98 likes</span>
        </div>"#;
        let document = dom::parse(html);
        let article = dom::select_first(&document, ARTICLE_SELECTOR)
            .unwrap()
            .unwrap();
        assert_eq!(
            extract_metric(&article, LIKE_KEYWORDS).unwrap().as_deref(),
            Some("98")
        );
    }

    #[test]
    fn page_without_articles_yields_nothing() {
        assert!(extract_posts("<html><body><p>Log in</p></body></html>").is_empty());
    }
}
