use tempfile::tempdir;

const FEED: &str = include_str!("fixtures/profile_feed.html");

#[test]
fn extracts_feed_posts_and_dedups_across_snapshots() {
    let tmp = tempdir().unwrap();
    let first = tmp.path().join("scroll-1.html");
    let second = tmp.path().join("scroll-2.html");
    std::fs::write(&first, FEED).unwrap();
    std::fs::write(&second, FEED).unwrap();
    let json = tmp.path().join("posts/out.json");

    let posts = fbgrab::run_extract(fbgrab::ExtractArgs {
        files: vec![first, second],
        max_posts: None,
        json: Some(json.clone()),
    })
    .unwrap();

    assert_eq!(posts.len(), 2);

    let top = &posts[0];
    assert_eq!(top.post_text, "Great win tonight! Thanks to all the fans 🙏");
    assert_eq!(top.likes.as_deref(), Some("1.4"));
    assert_eq!(top.comments.as_deref(), Some("12"));
    assert_eq!(top.shares.as_deref(), Some("3.1"));
    assert_eq!(top.post_time.as_deref(), Some("2h"));

    let second = &posts[1];
    assert_eq!(second.post_text, "Training day");
    assert_eq!(second.likes.as_deref(), Some("980"));
    assert_eq!(second.comments.as_deref(), Some("45"));
    assert_eq!(second.shares, None);
    assert_eq!(
        second.post_time.as_deref(),
        Some("Tuesday, November 14, 2023 at 10:13 PM")
    );

    let written: Vec<fbgrab::ScrapedPost> =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(written, posts);
}

#[test]
fn max_posts_truncates_in_first_seen_order() {
    let tmp = tempdir().unwrap();
    let page = tmp.path().join("page.html");
    std::fs::write(&page, FEED).unwrap();

    let posts = fbgrab::run_extract(fbgrab::ExtractArgs {
        files: vec![page],
        max_posts: Some(1),
        json: None,
    })
    .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post_text, "Great win tonight! Thanks to all the fans 🙏");
}

#[test]
fn missing_snapshot_is_an_error() {
    let tmp = tempdir().unwrap();
    let err = fbgrab::run_extract(fbgrab::ExtractArgs {
        files: vec![tmp.path().join("nope.html")],
        max_posts: None,
        json: None,
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("nope.html"));
}
