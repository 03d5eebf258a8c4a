use anyhow::Context as _;
use url::Url;

use crate::fetcher::Fetcher;
use crate::post_page;
use crate::progress::DownloadKind;
use crate::record::{FetchOutcome, NOT_FOUND_MESSAGE, PostRecord};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Origin every post URL is rewritten to.
    pub base_url: Url,
    pub want_comments: bool,
    pub want_reactions: bool,
}

/// Fetches one post. Never fails: every error becomes a failure record for `url`.
pub async fn scrape_one(fetcher: &Fetcher, url: &str, options: &FetchOptions) -> FetchOutcome {
    match try_scrape_one(fetcher, url, options).await {
        Ok(Some(post)) => {
            tracing::info!(
                url,
                post_id = post.post_id.as_deref().unwrap_or(""),
                likes = post.likes,
                comments = post.comments,
                shares = post.shares,
                "post fetched"
            );
            FetchOutcome::success(url, post)
        }
        Ok(None) => {
            tracing::warn!(url, "no post found");
            FetchOutcome::failure(url, NOT_FOUND_MESSAGE)
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::warn!(url, error = %message, "fetch failed");
            FetchOutcome::failure(url, message)
        }
    }
}

async fn try_scrape_one(
    fetcher: &Fetcher,
    url: &str,
    options: &FetchOptions,
) -> anyhow::Result<Option<PostRecord>> {
    let input = parse_post_url(url)?;
    let page_url = rebase_url(&input, &options.base_url);

    let html = fetcher
        .get_text(page_url.clone(), DownloadKind::Post)
        .await?;
    let Some(mut post) = post_page::parse_post_page(&html, &page_url, options.want_comments)
        .with_context(|| format!("parse post page {}", page_url))?
    else {
        return Ok(None);
    };

    if options.want_reactions {
        match &post.post_id {
            Some(post_id) => match fetch_reactions(fetcher, &options.base_url, post_id).await {
                Ok(reactions) => post.reactions_by_type = Some(reactions),
                Err(err) => {
                    tracing::warn!(url, error = %format!("{err:#}"), "reactions unavailable");
                }
            },
            None => tracing::warn!(url, "no post id; skipping reactions"),
        }
    }

    post.post_url = Some(canonical_url(&input).to_string());
    post.fetched_time = Some(now_rfc3339());
    Ok(Some(post))
}

async fn fetch_reactions(
    fetcher: &Fetcher,
    base_url: &Url,
    post_id: &str,
) -> anyhow::Result<std::collections::BTreeMap<String, u64>> {
    let mut url = base_url
        .join("/ufi/reaction/profile/browser/")
        .context("build reactions url")?;
    url.query_pairs_mut()
        .append_pair("ft_ent_identifier", post_id);
    let html = fetcher.get_text(url, DownloadKind::Reactions).await?;
    post_page::parse_reactions(&html)
}

/// Accepts `https://...` as well as scheme-less `facebook.com/...` input.
pub fn parse_post_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("https://{raw}"))
    }
    .with_context(|| format!("invalid url {raw:?}"))?;

    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    let is_facebook = ["facebook.com", "fb.com"]
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")));
    if !is_facebook {
        anyhow::bail!("not a Facebook url: {raw}");
    }
    Ok(url)
}

/// Same path and query on another origin; the fragment is dropped.
pub fn rebase_url(input: &Url, base: &Url) -> Url {
    let mut out = base.clone();
    out.set_path(input.path());
    out.set_query(input.query());
    out.set_fragment(None);
    out
}

fn canonical_url(input: &Url) -> Url {
    let mut out = input.clone();
    if out.set_host(Some("www.facebook.com")).is_ok() {
        let _ = out.set_scheme("https");
    }
    out.set_fragment(None);
    out
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebases_onto_mbasic_origin() {
        let input =
            parse_post_url("https://www.facebook.com/ophtus/posts/pfbid02Yc?rdid=HS#frag").unwrap();
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            rebase_url(&input, &base).as_str(),
            "http://127.0.0.1:8080/ophtus/posts/pfbid02Yc?rdid=HS"
        );
    }

    #[test]
    fn canonical_url_uses_www_host() {
        let input = parse_post_url("m.facebook.com/story.php?story_fbid=1&id=2#x").unwrap();
        assert_eq!(
            canonical_url(&input).as_str(),
            "https://www.facebook.com/story.php?story_fbid=1&id=2"
        );
    }

    #[test]
    fn rejects_foreign_and_broken_urls() {
        assert!(parse_post_url("https://example.com/posts/1").is_err());
        assert!(parse_post_url("https://notfacebook.com/posts/1").is_err());
        assert!(parse_post_url("http://[::1").is_err());
        assert!(parse_post_url("https://fb.com/x").is_ok());
    }
}
