use std::env;
use std::time::Duration;

use anyhow::{Context as _, Result};

use crate::cli::ProfileArgs;

/// Login credentials and target for the browser path.
#[derive(Clone, Debug)]
pub struct ProfileConfig {
    pub profile_url: String,
    pub credentials: Option<Credentials>,
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl ProfileConfig {
    /// Flags win over `FB_PROFILE_URL`, `FB_EMAIL` and `FB_PASSWORD` (which may come from `.env`).
    pub fn resolve(args: &ProfileArgs) -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::resolve_with(args, |key| env::var(key).ok())
    }

    fn resolve_with(args: &ProfileArgs, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let profile_url = match &args.profile_url {
            Some(url) => url.clone(),
            None => var("FB_PROFILE_URL").context("--profile-url or FB_PROFILE_URL must be set")?,
        };

        let email = args.email.clone().or_else(|| var("FB_EMAIL"));
        let password = args.password.clone().or_else(|| var("FB_PASSWORD"));
        let credentials = match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() => Some(Credentials {
                email,
                password,
            }),
            (Some(_), None) => anyhow::bail!("FB_EMAIL is set but FB_PASSWORD is missing"),
            _ => None,
        };

        Ok(Self {
            profile_url,
            credentials,
        })
    }
}

/// Delays used by the browser path to look like a person at the keyboard.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub typing_delay: (Duration, Duration),
    /// Chance per keystroke of an extra hesitation.
    pub hesitation_chance: f64,
    pub hesitation: (Duration, Duration),
    pub click_pause: (Duration, Duration),
    pub login_wait: Duration,
    pub navigate_wait: Duration,
    pub scroll_step: u32,
    pub scroll_pause: Duration,
    /// 0 disables the idle cut-off.
    pub max_idle_scrolls: usize,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            typing_delay: (Duration::from_millis(100), Duration::from_millis(300)),
            hesitation_chance: 0.1,
            hesitation: (Duration::from_millis(300), Duration::from_millis(700)),
            click_pause: (Duration::from_millis(200), Duration::from_millis(400)),
            login_wait: Duration::from_secs(15),
            navigate_wait: Duration::from_secs(4),
            scroll_step: 500,
            scroll_pause: Duration::from_secs(2),
            max_idle_scrolls: 5,
        }
    }
}

impl Pacing {
    pub fn from_args(args: &ProfileArgs) -> Result<Self> {
        let min = secs(args.typing_delay_min, "--typing-delay-min")?;
        let max = secs(args.typing_delay_max, "--typing-delay-max")?;
        if min > max {
            anyhow::bail!("--typing-delay-min must not exceed --typing-delay-max");
        }
        Ok(Self {
            typing_delay: (min, max),
            login_wait: secs(args.login_wait, "--login-wait")?,
            navigate_wait: secs(args.navigate_wait, "--navigate-wait")?,
            scroll_step: args.scroll_step,
            scroll_pause: secs(args.scroll_pause, "--scroll-pause")?,
            max_idle_scrolls: args.max_idle_scrolls,
            ..Self::default()
        })
    }

    /// No waiting at all; used for offline extraction and tests.
    pub fn immediate() -> Self {
        Self {
            typing_delay: (Duration::ZERO, Duration::ZERO),
            hesitation_chance: 0.0,
            hesitation: (Duration::ZERO, Duration::ZERO),
            click_pause: (Duration::ZERO, Duration::ZERO),
            login_wait: Duration::ZERO,
            navigate_wait: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub fn secs(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("{flag} must be a non-negative number"))
}

/// Uniform pick in `[lo, hi]`.
pub fn jitter((lo, hi): (Duration, Duration)) -> Duration {
    use rand::Rng as _;

    if hi <= lo {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::Parser as _;

    use super::*;
    use crate::cli::{Cli, Command};

    fn profile_args(flags: &[&str]) -> ProfileArgs {
        let argv = ["fbgrab", "profile"].iter().chain(flags);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Profile(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn env_of<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn flags_override_environment() {
        let args = profile_args(&[
            "--profile-url",
            "https://www.facebook.com/flag",
            "--email",
            "flag@example.com",
            "--password",
            "flag-pass",
        ]);
        let env = env_of(&[
            ("FB_PROFILE_URL", "https://www.facebook.com/env"),
            ("FB_EMAIL", "env@example.com"),
            ("FB_PASSWORD", "env-pass"),
        ]);
        let config = ProfileConfig::resolve_with(&args, env).unwrap();
        assert_eq!(config.profile_url, "https://www.facebook.com/flag");
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.email, "flag@example.com");
        assert_eq!(credentials.password, "flag-pass");
    }

    #[test]
    fn environment_fills_missing_flags() {
        let args = profile_args(&["--email", "flag@example.com"]);
        let env = env_of(&[
            ("FB_PROFILE_URL", "https://www.facebook.com/env"),
            ("FB_PASSWORD", "env-pass"),
        ]);
        let config = ProfileConfig::resolve_with(&args, env).unwrap();
        assert_eq!(config.profile_url, "https://www.facebook.com/env");
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.email, "flag@example.com");
        assert_eq!(credentials.password, "env-pass");
    }

    #[test]
    fn missing_profile_url_is_an_error() {
        let err = ProfileConfig::resolve_with(&profile_args(&[]), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("FB_PROFILE_URL"));
    }

    #[test]
    fn email_without_password_is_an_error() {
        let env = env_of(&[
            ("FB_PROFILE_URL", "https://www.facebook.com/env"),
            ("FB_EMAIL", "env@example.com"),
        ]);
        let err = ProfileConfig::resolve_with(&profile_args(&[]), env).unwrap_err();
        assert!(err.to_string().contains("FB_PASSWORD"));
    }

    #[test]
    fn empty_email_or_none_gives_no_credentials() {
        let env = env_of(&[
            ("FB_PROFILE_URL", "https://www.facebook.com/env"),
            ("FB_EMAIL", ""),
            ("FB_PASSWORD", "env-pass"),
        ]);
        let config = ProfileConfig::resolve_with(&profile_args(&[]), env).unwrap();
        assert!(config.credentials.is_none());

        let env = env_of(&[("FB_PROFILE_URL", "https://www.facebook.com/env")]);
        let config = ProfileConfig::resolve_with(&profile_args(&[]), env).unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn jitter_stays_in_range() {
        let range = (Duration::from_millis(100), Duration::from_millis(300));
        for _ in 0..100 {
            let d = jitter(range);
            assert!(d >= range.0 && d <= range.1);
        }
        assert_eq!(jitter((Duration::ZERO, Duration::ZERO)), Duration::ZERO);
    }

    #[test]
    fn negative_seconds_rejected() {
        assert!(secs(-1.0, "--delay").is_err());
        assert_eq!(secs(1.5, "--delay").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let c = Credentials {
            email: "a@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{c:?}").contains("hunter2"));
    }
}
