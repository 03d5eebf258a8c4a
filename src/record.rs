use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostRecord {
    pub post_url: Option<String>,
    pub post_id: Option<String>,
    pub text: Option<String>,
    pub time: Option<String>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    pub shares: Option<u64>,
    /// Reaction label (`like`, `love`, `haha`, ...) to count.
    pub reactions_by_type: Option<BTreeMap<String, u64>>,
    pub images: Option<Vec<String>>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub fetched_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments_full: Option<Vec<Comment>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub commenter_name: Option<String>,
    pub comment_text: String,
}

/// Result for one input URL, serialized as `{"ok": true, "url": ..., <record>}` or
/// `{"ok": false, "url": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub ok: bool,
    pub url: String,
    #[serde(flatten)]
    pub post: Option<PostRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub const NOT_FOUND_MESSAGE: &str = "No post found or not public.";

impl FetchOutcome {
    pub fn success(url: impl Into<String>, post: PostRecord) -> Self {
        Self {
            ok: true,
            url: url.into(),
            post: Some(post),
            error: None,
        }
    }

    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            url: url.into(),
            post: None,
            error: Some(error.into()),
        }
    }
}

/// 2 when any URL failed, 0 otherwise.
pub fn exit_code(outcomes: &[FetchOutcome]) -> u8 {
    if outcomes.iter().any(|o| !o.ok) { 2 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_flat_with_ok_flag() {
        let outcome = FetchOutcome::success(
            "https://www.facebook.com/p/posts/1",
            PostRecord {
                post_id: Some("1".into()),
                likes: Some(10),
                ..Default::default()
            },
        );
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["url"], "https://www.facebook.com/p/posts/1");
        assert_eq!(v["post_id"], "1");
        assert_eq!(v["likes"], 10);
        assert!(v["shares"].is_null());
        assert!(v.get("error").is_none());
        assert!(v.get("comments_full").is_none());
    }

    #[test]
    fn failure_has_only_error() {
        let v = serde_json::to_value(FetchOutcome::failure("u", NOT_FOUND_MESSAGE)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"ok": false, "url": "u", "error": "No post found or not public."})
        );
    }

    #[test]
    fn exit_code_reflects_failures() {
        let ok = FetchOutcome::success("a", PostRecord::default());
        let bad = FetchOutcome::failure("b", "boom");
        assert_eq!(exit_code(&[ok.clone()]), 0);
        assert_eq!(exit_code(&[ok, bad]), 2);
        assert_eq!(exit_code(&[]), 0);
    }
}
