mod browser;
mod cli;
mod config;
mod cookies;
mod dedup;
mod dom;
mod extract;
mod fetch;
mod fetcher;
mod output;
mod post_page;
mod profile;
mod progress;
mod record;

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use browser::ChromeSession;
use config::{Pacing, ProfileConfig};
use cookies::CookieJar;
use fetch::FetchOptions;
use fetcher::{Fetcher, FetcherOptions};
use progress::Progress;

pub use cli::{Cli, Command, ExtractArgs, FetchArgs, ProfileArgs, ProgressMode, StdoutMode};
pub use extract::ScrapedPost;
pub use record::{Comment, FetchOutcome, PostRecord, exit_code};

/// Runs one subcommand and returns the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Command::Fetch(args) => {
            let outcomes = run_fetch(args).await?;
            Ok(exit_code(&outcomes))
        }
        Command::Profile(args) => {
            run_profile(args).await?;
            Ok(0)
        }
        Command::Extract(args) => {
            run_extract(args)?;
            Ok(0)
        }
    }
}

pub async fn run_fetch(args: FetchArgs) -> anyhow::Result<Vec<FetchOutcome>> {
    let urls = read_urls(&args)?;
    let delay = config::secs(args.delay, "--delay")?;

    let cookies_path = args.cookies.clone().or_else(|| {
        let default = PathBuf::from(cookies::DEFAULT_COOKIES_PATH);
        default.exists().then_some(default)
    });
    let jar = match &cookies_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using cookies");
            Some(CookieJar::load(path)?)
        }
        None => None,
    };

    let progress = Progress::new(progress_enabled(args.progress), "urls");
    progress.set_total(urls.len());

    let cookie_host = args.base_url.host_str().unwrap_or_default().to_string();
    let fetcher = Fetcher::new(
        FetcherOptions {
            user_agent: &args.user_agent,
            language: &args.language,
            timeout: Duration::from_secs(args.timeout),
            retries: args.retries,
            cookies: jar.as_ref(),
            cookie_host: &cookie_host,
        },
        Some(progress.clone()),
    )?;
    let options = FetchOptions {
        base_url: args.base_url.clone(),
        want_comments: args.comments,
        want_reactions: args.reactions,
    };

    let mut outcomes = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        progress.set_stage(format!("fetching {url}"));
        let outcome = fetch::scrape_one(&fetcher, url, &options).await;
        progress.item_done(outcome.ok);

        if args.stdout == StdoutMode::Jsonl {
            let line = output::jsonl_line(&outcome)?;
            print_stdout(&line)?;
        }
        outcomes.push(outcome);

        if i + 1 < urls.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    progress.finish();

    if let Some(path) = &args.json {
        output::write_json(path, &outcomes)?;
    }
    if let Some(path) = &args.jsonl {
        output::write_jsonl(path, &outcomes)?;
    }
    if args.stdout == StdoutMode::Json {
        print_stdout(&output::stdout_json(&outcomes)?)?;
    }
    if let Some(path) = &args.csv {
        output::write_csv(path, &outcomes)?;
    }

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    tracing::info!(total = outcomes.len(), failed, "fetch finished");
    Ok(outcomes)
}

pub async fn run_profile(args: ProfileArgs) -> anyhow::Result<Vec<ScrapedPost>> {
    let config = ProfileConfig::resolve(&args)?;
    let pacing = Pacing::from_args(&args)?;
    let progress = Progress::new(progress_enabled(args.progress), "posts");
    progress.set_total(args.max_posts);

    progress.set_stage("launching browser");
    let session = ChromeSession::launch(args.headless, pacing.clone()).await?;
    let res = scrape_profile(&session, &config, &pacing, &args, &progress).await;
    progress.set_stage("closing browser");
    if let Err(err) = session.close().await {
        tracing::warn!(error = %format!("{err:#}"), "browser did not close cleanly");
    }
    progress.finish();
    let posts = res?;

    let mut stdout = std::io::stdout().lock();
    profile::print_posts(&mut stdout, &posts).context("write posts to stdout")?;
    if let Some(path) = &args.json {
        write_posts_json(path, &posts)?;
    }
    Ok(posts)
}

async fn scrape_profile(
    session: &ChromeSession,
    config: &ProfileConfig,
    pacing: &Pacing,
    args: &ProfileArgs,
    progress: &Progress,
) -> anyhow::Result<Vec<ScrapedPost>> {
    let mut have_session = false;
    if let Some(path) = &args.session {
        if path.exists() && !args.force_login {
            let jar = CookieJar::load(path)?;
            session.load_cookies(&jar).await?;
            have_session = !jar.is_empty();
        }
    }

    if !have_session {
        let credentials = config.credentials.as_ref().context(
            "no usable session; pass --email/--password or set FB_EMAIL and FB_PASSWORD",
        )?;
        progress.set_stage("logging in");
        session.login(&args.login_url, credentials).await?;
        if let Some(path) = &args.session {
            let jar = session.cookies().await?;
            jar.save_json(path)?;
            tracing::info!(path = %path.display(), count = jar.len(), "session saved");
        }
    }

    progress.set_stage("opening profile");
    session.navigate(&config.profile_url).await?;

    progress.set_stage("scrolling");
    profile::scrape_posts(session, args.max_posts, pacing, Some(progress)).await
}

/// Runs the feed extractor over saved pages, deduplicating across all of them.
pub fn run_extract(args: ExtractArgs) -> anyhow::Result<Vec<ScrapedPost>> {
    let mut posts = Vec::new();
    for path in &args.files {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let found = extract::extract_posts(&html);
        tracing::info!(path = %path.display(), found = found.len(), "extracted");
        posts.extend(found);
    }
    let mut posts = dedup::remove_duplicates(posts);
    if let Some(max) = args.max_posts {
        posts.truncate(max);
    }

    let mut stdout = std::io::stdout().lock();
    profile::print_posts(&mut stdout, &posts).context("write posts to stdout")?;
    if let Some(path) = &args.json {
        write_posts_json(path, &posts)?;
    }
    Ok(posts)
}

fn read_urls(args: &FetchArgs) -> anyhow::Result<Vec<String>> {
    if let Some(url) = &args.url {
        return Ok(vec![url.trim().to_string()]);
    }
    let Some(infile) = &args.infile else {
        anyhow::bail!("one of --url or --infile is required");
    };
    let text = std::fs::read_to_string(infile)
        .with_context(|| format!("read {}", infile.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_posts_json(path: &std::path::Path, posts: &[ScrapedPost]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(posts).context("serialize posts")?;
    output::write_file(path, json.as_bytes())
}

fn print_stdout(line: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("write stdout")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

fn progress_enabled(mode: ProgressMode) -> bool {
    use std::io::IsTerminal as _;

    match mode {
        ProgressMode::Always => true,
        ProgressMode::Never => false,
        ProgressMode::Auto => std::io::stderr().is_terminal(),
    }
}
