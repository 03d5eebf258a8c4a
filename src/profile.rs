use std::io::Write;

use crate::config::Pacing;
use crate::dedup::remove_duplicates;
use crate::extract::{ScrapedPost, extract_posts};
use crate::progress::Progress;

/// A rendered feed that can be read and scrolled.
#[allow(async_fn_in_trait)]
pub trait FeedPage {
    async fn html(&self) -> anyhow::Result<String>;
    async fn scroll_by(&self, pixels: u32) -> anyhow::Result<()>;
}

/// Reads, extracts and scrolls until `max_posts` unique posts are collected, or until
/// `pacing.max_idle_scrolls` scrolls in a row turn up nothing new.
pub async fn scrape_posts<P: FeedPage>(
    page: &P,
    max_posts: usize,
    pacing: &Pacing,
    progress: Option<&Progress>,
) -> anyhow::Result<Vec<ScrapedPost>> {
    let mut all_posts: Vec<ScrapedPost> = Vec::new();
    let mut idle_rounds = 0usize;

    while all_posts.len() < max_posts {
        let html = page.html().await?;
        let before = all_posts.len();
        all_posts.extend(extract_posts(&html));
        all_posts = remove_duplicates(all_posts);
        tracing::info!(unique = all_posts.len(), target = max_posts, "extracted posts");
        if let Some(p) = progress {
            p.set_position(all_posts.len().min(max_posts));
        }

        if all_posts.len() >= max_posts {
            break;
        }

        if all_posts.len() == before {
            idle_rounds += 1;
            if pacing.max_idle_scrolls > 0 && idle_rounds >= pacing.max_idle_scrolls {
                tracing::warn!(
                    unique = all_posts.len(),
                    target = max_posts,
                    idle_rounds,
                    "page stopped yielding new posts"
                );
                break;
            }
        } else {
            idle_rounds = 0;
        }

        page.scroll_by(pacing.scroll_step).await?;
        tokio::time::sleep(pacing.scroll_pause).await;
    }

    all_posts.truncate(max_posts);
    Ok(all_posts)
}

pub fn print_posts(out: &mut impl Write, posts: &[ScrapedPost]) -> std::io::Result<()> {
    for (idx, post) in posts.iter().enumerate() {
        writeln!(out, "Post {}:", idx + 1)?;
        writeln!(out, "Text: {}", post.post_text)?;
        writeln!(out, "Likes: {}", display(&post.likes))?;
        writeln!(out, "Comments: {}", display(&post.comments))?;
        writeln!(out, "Shares: {}", display(&post.shares))?;
        writeln!(out, "Time Posted: {}", display(&post.post_time))?;
        writeln!(out, "{}", "-".repeat(50))?;
    }
    Ok(())
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}
