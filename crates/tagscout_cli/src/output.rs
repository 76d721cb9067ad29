use std::io::{self, Write};
use std::sync::Mutex;

use tagscout_core::DiscoveryItem;
use tagscout_engine::{CrawlEvent, CrawlSink};

/// Streams crawl events to the terminal: progress on stderr, finds on stdout.
pub struct TerminalSink {
    quiet: bool,
    stdout: Mutex<io::Stdout>,
}

impl TerminalSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            stdout: Mutex::new(io::stdout()),
        }
    }
}

impl CrawlSink for TerminalSink {
    fn emit(&self, event: CrawlEvent) {
        match event {
            CrawlEvent::Progress { completed, total } => {
                if !self.quiet {
                    eprintln!("[{completed}/{total}] servers done");
                }
            }
            CrawlEvent::Discovered { item, replaced } => {
                if self.quiet {
                    return;
                }
                let marker = if replaced { "~" } else { "+" };
                if let Ok(mut out) = self.stdout.lock() {
                    let _ = writeln!(out, "{marker} {}", describe(&item));
                }
            }
            CrawlEvent::ServerFailed { server, error } => {
                eprintln!("! {server}: {error}");
            }
        }
    }
}

/// One line per item: identity, post time and link when there is one.
pub fn describe(item: &DiscoveryItem) -> String {
    let when = item.post.created_at.format("%Y-%m-%d %H:%M");
    match &item.post.url {
        Some(url) => format!("{} {} {}", item.account.identity, when, url),
        None => format!("{} {}", item.account.identity, when),
    }
}

pub fn print_results(items: &[DiscoveryItem]) {
    println!("{} accounts found", items.len());
    for (rank, item) in items.iter().enumerate() {
        println!("{:>4}. {}", rank + 1, describe(item));
    }
}
