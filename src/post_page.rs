//! Parsing of the lightweight ("mbasic") rendering of a single Facebook post.
//!
//! That frontend serves plain server-rendered HTML: the story element carries a `data-ft`
//! JSON attribute with ids and the publish time, and engagement is spelled out in the footer
//! ("1.2K", "34 Comments", "5 Shares").

use std::collections::BTreeMap;
use std::sync::LazyLock;

use kuchiki::NodeRef;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::dom;
use crate::record::{Comment, PostRecord};

// A K/M suffix only counts as a whole word, so "5 more" stays 5.
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)(?:\s*([KkMm])\b)?").expect("count regex")
});
static COMMENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?(?:\s*[km]\b)?)\s+comments?\b").expect("comments regex")
});
static SHARES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?(?:\s*[km]\b)?)\s+shares?\b").expect("shares regex")
});

const ROOT_SELECTORS: &[&str] = &["#m_story_permalink_view", "[data-ft]", "article", "body"];
const USERNAME_SELECTORS: &[&str] = &["h3 strong a", "h3 a", "header strong", "strong a"];

/// Parses a post page. `Ok(None)` means the page holds no post (login wall, removed post,
/// private content).
pub fn parse_post_page(
    html: &str,
    page_url: &Url,
    want_comments: bool,
) -> anyhow::Result<Option<PostRecord>> {
    let document = dom::parse(html);

    let mut root = None;
    for selector in ROOT_SELECTORS {
        if let Some(node) = dom::select_first(&document, selector)? {
            root = Some((node, *selector == "body"));
            break;
        }
    }
    let Some((root, whole_body)) = root else {
        return Ok(None);
    };

    let story = if dom::has_attr(&root, "data-ft") {
        root.clone()
    } else {
        dom::select_first(&root, "[data-ft]")?.unwrap_or_else(|| root.clone())
    };
    let ft = dom::attr(&story, "data-ft").and_then(|raw| serde_json::from_str::<Value>(&raw).ok());

    let text = post_text(&story)?;
    let username = first_text(&root, USERNAME_SELECTORS)?;
    let likes = likes(&root)?;
    let flat = dom::text_nodes(&root).join(" ");
    let comments = COMMENTS_RE
        .captures(&flat)
        .and_then(|c| parse_count(&c[1]));
    let shares = SHARES_RE.captures(&flat).and_then(|c| parse_count(&c[1]));

    // Without any story markup, bare paragraphs are usually an error or login notice.
    let found = ft.is_some()
        || likes.is_some()
        || comments.is_some()
        || shares.is_some()
        || (!whole_body && (text.is_some() || username.is_some()));
    if !found {
        return Ok(None);
    }

    let ft = ft.unwrap_or(Value::Null);
    let post_id = ft_string(&ft, &["top_level_post_id", "mf_story_key", "tl_objid"])
        .or_else(|| post_id_from_url(page_url));
    let user_id = ft_string(&ft, &["content_owner_id_new", "page_id", "actor_id"]);
    let time = publish_time(&ft).and_then(rfc3339_from_unix);

    let images = images(&story)?;
    let comments_full = if want_comments {
        Some(comments_full(&root, &story)?)
    } else {
        None
    };

    Ok(Some(PostRecord {
        post_id,
        text,
        time,
        likes,
        comments,
        shares,
        images: Some(images),
        user_id,
        username,
        comments_full,
        ..Default::default()
    }))
}

/// Per-type counts from the reactions browser page.
pub fn parse_reactions(html: &str) -> anyhow::Result<BTreeMap<String, u64>> {
    let document = dom::parse(html);
    let base = Url::parse("https://mbasic.facebook.com/")?;
    let mut out = BTreeMap::new();

    for anchor in dom::select_all(&document, r#"a[href*="reaction_type="]"#)? {
        let Some(href) = dom::attr(&anchor, "href") else {
            continue;
        };
        let Ok(link) = base.join(&href) else {
            continue;
        };

        let mut reaction_type = None;
        let mut total_count = None;
        for (k, v) in link.query_pairs() {
            match k.as_ref() {
                "reaction_type" => reaction_type = v.parse::<u32>().ok(),
                "total_count" => total_count = v.parse::<u64>().ok(),
                _ => {}
            }
        }
        if reaction_type == Some(0) {
            continue;
        }

        let label = reaction_type
            .and_then(reaction_label)
            .map(str::to_string)
            .or_else(|| {
                dom::select_first(&anchor, "img[alt]")
                    .ok()
                    .flatten()
                    .and_then(|img| dom::attr(&img, "alt"))
                    .map(|alt| alt.trim().to_lowercase())
                    .filter(|alt| !alt.is_empty())
            });
        let Some(label) = label else {
            continue;
        };

        let count = total_count.or_else(|| parse_count(&dom::normalized_text(&anchor)));
        if let Some(count) = count {
            out.entry(label).or_insert(count);
        }
    }
    Ok(out)
}

fn reaction_label(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "like",
        2 => "love",
        3 => "wow",
        4 => "haha",
        7 => "sad",
        8 => "angry",
        16 => "care",
        _ => return None,
    })
}

/// `1,234` -> 1234, `1.2K` -> 1200, `3M` -> 3000000. The first number in `text` wins.
pub fn parse_count(text: &str) -> Option<u64> {
    let caps = COUNT_RE.captures(text)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("K" | "k") => 1_000.0,
        Some("M" | "m") => 1_000_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as u64)
}

/// Numeric id from `story_fbid`/`fbid` or from `/posts/<id>`-style paths.
pub fn post_id_from_url(url: &Url) -> Option<String> {
    for (k, v) in url.query_pairs() {
        if (k == "story_fbid" || k == "fbid") && !v.is_empty() {
            return Some(v.into_owned());
        }
    }
    let segs: Vec<&str> = url.path_segments()?.collect();
    segs.windows(2)
        .find(|w| matches!(w[0], "posts" | "videos" | "permalink") && !w[1].is_empty())
        .map(|w| w[1].to_string())
}

fn post_text(story: &NodeRef) -> anyhow::Result<Option<String>> {
    let paragraphs: Vec<String> = dom::select_all(story, "p")?
        .iter()
        .map(dom::normalized_text)
        .filter(|t| !t.is_empty())
        .collect();
    if paragraphs.is_empty() {
        Ok(None)
    } else {
        Ok(Some(paragraphs.join("\n")))
    }
}

fn first_text(root: &NodeRef, selectors: &[&str]) -> anyhow::Result<Option<String>> {
    for selector in selectors {
        for node in dom::select_all(root, selector)? {
            let text = dom::normalized_text(&node);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

fn likes(root: &NodeRef) -> anyhow::Result<Option<u64>> {
    for node in dom::select_all(root, r#"a[href*="reaction/profile"]"#)? {
        if let Some(n) = parse_count(&dom::normalized_text(&node)) {
            return Ok(Some(n));
        }
    }
    for node in dom::select_all(root, "[aria-label]")? {
        let label = dom::attr(&node, "aria-label").unwrap_or_default().to_lowercase();
        if label.contains("reaction") || label.contains("like") {
            if let Some(n) = parse_count(&label) {
                return Ok(Some(n));
            }
        }
    }
    Ok(None)
}

fn images(story: &NodeRef) -> anyhow::Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for img in dom::select_all(story, r#"a[href*="photo"] img[src]"#)? {
        let Some(src) = dom::attr(&img, "src") else {
            continue;
        };
        let src = src.trim().to_string();
        if src.is_empty() || src.starts_with("data:") || out.contains(&src) {
            continue;
        }
        out.push(src);
    }
    Ok(out)
}

/// Comment blocks are an `h3` with the commenter's name followed by the comment body.
fn comments_full(root: &NodeRef, story: &NodeRef) -> anyhow::Result<Vec<Comment>> {
    let distinct_story = story != root;
    let mut out = Vec::new();
    for h3 in dom::select_all(root, "h3")? {
        if distinct_story && dom::is_inside(&h3, story) {
            continue;
        }
        if h3
            .ancestors()
            .any(|a| a.as_element().is_some_and(|e| &*e.name.local == "header"))
        {
            continue;
        }
        let Some(body) = dom::next_element_sibling(&h3) else {
            continue;
        };
        let comment_text = dom::normalized_text(&body);
        if comment_text.is_empty() {
            continue;
        }
        let name = dom::normalized_text(&h3);
        out.push(Comment {
            commenter_name: if name.is_empty() { None } else { Some(name) },
            comment_text,
        });
    }
    Ok(out)
}

fn ft_string(ft: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match ft.get(k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn publish_time(ft: &Value) -> Option<i64> {
    ft.get("page_insights")?
        .as_object()?
        .values()
        .find_map(|insight| insight.get("post_context")?.get("publish_time")?.as_i64())
}

pub fn rfc3339_from_unix(secs: i64) -> Option<String> {
    let dt = chrono::DateTime::from_timestamp(secs, 0)?;
    Some(dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}
