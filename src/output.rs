use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::record::FetchOutcome;

pub const CSV_FIELDS: [&str; 12] = [
    "url",
    "post_url",
    "post_id",
    "time",
    "likes",
    "comments",
    "shares",
    "username",
    "user_id",
    "text",
    "images",
    "reactions_by_type",
];

pub fn jsonl_line(outcome: &FetchOutcome) -> anyhow::Result<String> {
    serde_json::to_string(outcome).context("serialize result")
}

/// Exactly one result prints as an object, anything else as an array.
pub fn stdout_json(outcomes: &[FetchOutcome]) -> anyhow::Result<String> {
    match outcomes {
        [single] => serde_json::to_string(single),
        many => serde_json::to_string(many),
    }
    .context("serialize results")
}

pub fn write_json(path: &Path, outcomes: &[FetchOutcome]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(outcomes).context("serialize results")?;
    write_file(path, json.as_bytes())
}

pub fn write_jsonl(path: &Path, outcomes: &[FetchOutcome]) -> anyhow::Result<()> {
    let mut out = String::new();
    for outcome in outcomes {
        out.push_str(&jsonl_line(outcome)?);
        out.push('\n');
    }
    write_file(path, out.as_bytes())
}

/// Successful records only. List and map fields become embedded JSON text.
pub fn write_csv(path: &Path, outcomes: &[FetchOutcome]) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(CSV_FIELDS).context("write csv header")?;

    for outcome in outcomes.iter().filter(|o| o.ok) {
        let Some(post) = &outcome.post else { continue };
        let images = post
            .images
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("serialize images")?;
        let reactions = post
            .reactions_by_type
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("serialize reactions")?;

        let row: [Option<String>; 12] = [
            Some(outcome.url.clone()),
            post.post_url.clone(),
            post.post_id.clone(),
            post.time.clone(),
            post.likes.map(|n| n.to_string()),
            post.comments.map(|n| n.to_string()),
            post.shares.map(|n| n.to_string()),
            post.username.clone(),
            post.user_id.clone(),
            post.text.clone(),
            images,
            reactions,
        ];
        writer
            .write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))
            .with_context(|| format!("write csv row for {}", outcome.url))?;
    }

    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

pub fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let mut file =
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    Ok(())
}
