use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use url::Url;

#[derive(Debug, Clone, Copy)]
pub enum DownloadKind {
    Post,
    Reactions,
}

impl DownloadKind {
    fn label(self) -> &'static str {
        match self {
            DownloadKind::Post => "post",
            DownloadKind::Reactions => "reactions",
        }
    }
}

pub struct Progress {
    enabled: bool,
    start: Instant,

    // UI
    mp: Option<MultiProgress>,
    stage: ProgressBar,
    items: ProgressBar,
    stats: ProgressBar,

    // Counters
    items_ok: AtomicU64,
    items_failed: AtomicU64,

    http_in_flight: AtomicU64,
    http_done: AtomicU64,
    http_bytes: AtomicU64,

    last_http_label: Mutex<String>,
}

impl Progress {
    /// `items_label` names what the main bar counts (`urls`, `posts`).
    pub fn new(enabled: bool, items_label: &'static str) -> Arc<Self> {
        let start = Instant::now();

        if !enabled {
            return Arc::new(Self {
                enabled: false,
                start,
                mp: None,
                stage: ProgressBar::hidden(),
                items: ProgressBar::hidden(),
                stats: ProgressBar::hidden(),
                items_ok: AtomicU64::new(0),
                items_failed: AtomicU64::new(0),
                http_in_flight: AtomicU64::new(0),
                http_done: AtomicU64::new(0),
                http_bytes: AtomicU64::new(0),
                last_http_label: Mutex::new(String::new()),
            });
        }

        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let stage = mp.add(ProgressBar::new_spinner());
        stage.set_style(spinner_style());
        stage.enable_steady_tick(Duration::from_millis(80));
        stage.set_message("starting");

        let items = mp.add(ProgressBar::new(0));
        items.set_style(bar_style());
        items.set_message(items_label);

        let stats = mp.add(ProgressBar::new_spinner());
        stats.set_style(spinner_style());
        stats.enable_steady_tick(Duration::from_millis(120));

        Arc::new(Self {
            enabled: true,
            start,
            mp: Some(mp),
            stage,
            items,
            stats,
            items_ok: AtomicU64::new(0),
            items_failed: AtomicU64::new(0),
            http_in_flight: AtomicU64::new(0),
            http_done: AtomicU64::new(0),
            http_bytes: AtomicU64::new(0),
            last_http_label: Mutex::new(String::new()),
        })
    }

    pub fn set_stage(&self, msg: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.stage.set_message(msg.into());
    }

    pub fn set_total(&self, total: usize) {
        if self.enabled {
            self.items.set_length(total as u64);
        }
    }

    pub fn item_done(&self, ok: bool) {
        if ok {
            self.items_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.items_failed.fetch_add(1, Ordering::Relaxed);
        }
        if self.enabled {
            self.items.inc(1);
            self.refresh_stats();
        }
    }

    /// Absolute position, for loops that count unique results rather than steps.
    pub fn set_position(&self, pos: usize) {
        if self.enabled {
            self.items.set_position(pos as u64);
        }
    }

    pub fn http_start(&self, kind: DownloadKind, url: &Url) {
        self.http_in_flight.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            if let Ok(mut last) = self.last_http_label.lock() {
                *last = format!("GET {} ({})", url, kind.label());
            }
            self.refresh_stats();
        }
    }

    pub fn http_throttled(&self, kind: DownloadKind, url: &Url, status: u16, wait: Duration) {
        if !self.enabled {
            return;
        }
        if let Ok(mut last) = self.last_http_label.lock() {
            *last = format!(
                "GET {} ({}) throttled {} wait {}ms",
                url,
                kind.label(),
                status,
                wait.as_millis()
            );
        }
        self.refresh_stats();
    }

    pub fn http_ok(&self, kind: DownloadKind, url: &Url, bytes: usize) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        self.http_done.fetch_add(1, Ordering::Relaxed);
        self.http_bytes.fetch_add(bytes as u64, Ordering::Relaxed);

        if self.enabled {
            if let Ok(mut last) = self.last_http_label.lock() {
                *last = format!("GET {} ({}) ok {}B", url, kind.label(), bytes);
            }
            self.refresh_stats();
        }
    }

    pub fn http_err(&self, kind: DownloadKind, url: &Url) {
        self.http_in_flight.fetch_sub(1, Ordering::Relaxed);
        if self.enabled {
            if let Ok(mut last) = self.last_http_label.lock() {
                *last = format!("GET {} ({}) failed", url, kind.label());
            }
            self.refresh_stats();
        }
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.refresh_stats();
        self.stage.finish_with_message("done");
        self.items.finish_and_clear();
        self.stats.finish_and_clear();
        if let Some(mp) = &self.mp {
            let _ = mp.println(format!("Done in {}", HumanDuration(self.start.elapsed())));
        }
    }

    fn refresh_stats(&self) {
        if !self.enabled {
            return;
        }

        let ok = self.items_ok.load(Ordering::Relaxed);
        let failed = self.items_failed.load(Ordering::Relaxed);
        let in_flight = self.http_in_flight.load(Ordering::Relaxed);
        let done = self.http_done.load(Ordering::Relaxed);
        let bytes = self.http_bytes.load(Ordering::Relaxed);

        let last = self
            .last_http_label
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        self.stats.set_message(format!(
            "ok {ok} | failed {failed} | HTTP done {done} in-flight {in_flight} | {bytes} | {last}",
            bytes = HumanBytes(bytes),
        ));
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}  [{elapsed_precise}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
        .map(|s| s.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_progress_still_counts() {
        let p = Progress::new(false, "urls");
        let url = Url::parse("https://mbasic.facebook.com/x").unwrap();
        p.http_start(DownloadKind::Post, &url);
        p.http_ok(DownloadKind::Post, &url, 10);
        p.item_done(true);
        p.item_done(false);
        p.finish();
        assert_eq!(p.http_done.load(Ordering::Relaxed), 1);
        assert_eq!(p.http_bytes.load(Ordering::Relaxed), 10);
        assert_eq!(p.items_failed.load(Ordering::Relaxed), 1);
    }
}
