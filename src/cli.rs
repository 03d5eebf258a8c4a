use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StdoutMode {
    /// One JSON object (or array, for several URLs) after all URLs are done.
    Json,
    /// One JSON line per URL, streamed as each URL completes.
    Jsonl,
    /// Print nothing to stdout.
    Off,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressMode {
    /// Enable progress UI when stderr is a TTY.
    Auto,
    /// Always enable progress UI (even when piped).
    Always,
    /// Never show progress UI.
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "fbgrab",
    author,
    version,
    about = "Grab Facebook post metrics (likes/comments/shares) and scrape profile feeds."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch metrics for one post URL or a file of URLs and emit JSON/JSONL/CSV.
    Fetch(FetchArgs),
    /// Log in with a browser, scroll a profile and extract its posts.
    Profile(ProfileArgs),
    /// Run the feed post extractor over saved HTML snapshots.
    Extract(ExtractArgs),
}

#[derive(Debug, Clone, Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["url", "infile"])))]
pub struct FetchArgs {
    /// Single post URL.
    #[arg(long)]
    pub url: Option<String>,

    /// Text file with one post URL per line.
    #[arg(long)]
    pub infile: Option<PathBuf>,

    /// Path to cookies.txt (Netscape format) or a JSON session file.
    ///
    /// Defaults to `facebook/facebook_cookies.txt` when that file exists.
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Collect the comments rendered with the post (slower).
    #[arg(long)]
    pub comments: bool,

    /// Fetch reaction counts by type (one extra request per post).
    #[arg(long)]
    pub reactions: bool,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Delay in seconds between URLs when using `--infile`.
    #[arg(long, default_value_t = 1.0)]
    pub delay: f64,

    /// Write all results as a single JSON array to this file.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write JSON Lines to this file (one line per URL).
    #[arg(long)]
    pub jsonl: Option<PathBuf>,

    /// Write successful records as CSV to this file.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// What to print to stdout.
    #[arg(long, value_enum, default_value = "jsonl")]
    pub stdout: StdoutMode,

    /// Origin of the lightweight Facebook frontend that post URLs are rewritten to.
    #[arg(long, default_value = "https://mbasic.facebook.com")]
    pub base_url: Url,

    /// Interface language requested from Facebook.
    #[arg(long, default_value = "en_US")]
    pub language: String,

    /// HTTP User-Agent.
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Extra attempts for throttled (429/503) responses.
    #[arg(long, default_value_t = 0)]
    pub retries: usize,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, value_enum, default_value = "auto")]
    pub progress: ProgressMode,
}

#[derive(Debug, Clone, Args)]
pub struct ProfileArgs {
    /// Profile or page URL to scrape. Falls back to `FB_PROFILE_URL`.
    #[arg(long)]
    pub profile_url: Option<String>,

    /// Login email. Falls back to `FB_EMAIL`.
    #[arg(long)]
    pub email: Option<String>,

    /// Login password. Falls back to `FB_PASSWORD`.
    #[arg(long)]
    pub password: Option<String>,

    /// Number of unique posts to collect.
    #[arg(long, default_value_t = 10)]
    pub max_posts: usize,

    /// Login page.
    #[arg(long, default_value = "https://www.facebook.com/login")]
    pub login_url: String,

    /// JSON cookie file. Loaded before navigation, rewritten after a login.
    #[arg(long)]
    pub session: Option<PathBuf>,

    /// Log in even when the session file already has cookies.
    #[arg(long)]
    pub force_login: bool,

    /// Run the browser without a window.
    #[arg(long)]
    pub headless: bool,

    /// Write the scraped posts as a JSON array to this file.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Pixels scrolled per round.
    #[arg(long, default_value_t = 500)]
    pub scroll_step: u32,

    /// Seconds to wait after each scroll.
    #[arg(long, default_value_t = 2.0)]
    pub scroll_pause: f64,

    /// Seconds to wait after submitting the login form.
    #[arg(long, default_value_t = 15.0)]
    pub login_wait: f64,

    /// Seconds to wait after opening the profile.
    #[arg(long, default_value_t = 4.0)]
    pub navigate_wait: f64,

    /// Minimum per-keystroke delay in seconds.
    #[arg(long, default_value_t = 0.1)]
    pub typing_delay_min: f64,

    /// Maximum per-keystroke delay in seconds.
    #[arg(long, default_value_t = 0.3)]
    pub typing_delay_max: f64,

    /// Stop after this many scrolls in a row that find no new post (0 = never).
    #[arg(long, default_value_t = 5)]
    pub max_idle_scrolls: usize,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, value_enum, default_value = "auto")]
    pub progress: ProgressMode,
}

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Saved HTML pages, processed in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Keep at most this many unique posts.
    #[arg(long)]
    pub max_posts: Option<usize>,

    /// Write the posts as a JSON array to this file.
    #[arg(long)]
    pub json: Option<PathBuf>,
}
