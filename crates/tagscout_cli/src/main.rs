//! `tagscout`: find people posting under hashtags across many servers.
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use scout_logging::{scout_error, scout_info, LogDestination};
use tagscout_core::{FollowSet, HomeSession, SearchOptions, MAX_PER_SERVER_LIMIT};
use tagscout_engine::{
    current_identity, ClientSettings, CrawlOutcome, Discovery, KnownEntityCache, ReqwestMastodon,
};
use tokio_util::sync::CancellationToken;

mod output;
mod persistence;

use output::{print_results, TerminalSink};
use persistence::StateStore;

#[derive(Parser, Debug)]
#[command(name = "tagscout", version)]
#[command(about = "Discover accounts posting under hashtags across the fediverse")]
struct Cli {
    /// Home instance, as a domain or base URL
    #[arg(long, env = "TAGSCOUT_INSTANCE")]
    instance: String,

    /// Bearer token for the home instance
    #[arg(long, env = "TAGSCOUT_TOKEN", hide_env_values = true)]
    token: String,

    /// Directory holding the saved crawl and cached identity
    #[arg(long, env = "TAGSCOUT_STATE_DIR", default_value = ".tagscout")]
    state_dir: PathBuf,

    /// Where log output goes
    #[arg(long, env = "TAGSCOUT_LOG", value_enum, default_value_t = LogTarget::File)]
    log: LogTarget,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print the final list
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new crawl over the most populated servers
    Search {
        /// Hashtags to search, with or without the leading `#`
        #[arg(required = true)]
        hashtags: Vec<String>,

        /// How many servers from the directory to visit
        #[arg(long, env = "TAGSCOUT_MAX_SERVERS", default_value_t = 20)]
        max_servers: usize,

        #[command(flatten)]
        pass: PassArgs,

        /// Posts requested per server and hashtag
        #[arg(long, env = "TAGSCOUT_LIMIT", default_value_t = MAX_PER_SERVER_LIMIT)]
        limit: u32,

        /// Resolve every account at home instead of checking known entities
        #[arg(long)]
        legacy: bool,

        /// Also drop posts the home instance already knows
        #[arg(long)]
        filter_statuses: bool,

        /// Visit servers in a shuffled order
        #[arg(long)]
        randomize: bool,

        /// Seed for --randomize; wall-clock time when absent
        #[arg(long, requires = "randomize")]
        seed: Option<u64>,

        /// Server directory endpoint
        #[arg(long, env = "TAGSCOUT_DIRECTORY_URL")]
        directory_url: Option<String>,
    },
    /// Fetch the next page of the saved crawl
    Next {
        #[command(flatten)]
        pass: PassArgs,
    },
    /// Follow an account by its canonical handle
    Follow {
        /// Handle such as `bob@example.social`
        identity: String,
    },
    /// Count the accounts already followed
    Following,
    /// Show the relationship to each handle
    Relationships {
        #[arg(required = true)]
        identities: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct PassArgs {
    /// Servers searched at the same time
    #[arg(long, env = "TAGSCOUT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    scout_logging::initialize(cli.log.into(), level);

    if let Err(err) = run(cli).await {
        scout_error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    let store = StateStore::new(&cli.state_dir);
    let mut settings = ClientSettings::default();
    if let Command::Search {
        directory_url: Some(url),
        ..
    } = &cli.command
    {
        settings.directory_url = url.clone();
    }

    let session = signed_in_session(&cli, &store, &settings).await?;
    let api = ReqwestMastodon::new(settings, session.clone()).context("building http client")?;
    let discovery = Discovery::new(
        Arc::new(api),
        session,
        Arc::new(KnownEntityCache::default()),
    );

    match cli.command {
        Command::Search {
            hashtags,
            max_servers,
            pass,
            limit,
            legacy,
            filter_statuses,
            randomize,
            seed,
            ..
        } => {
            let options = SearchOptions {
                max_servers,
                concurrency: pass.concurrency,
                per_server_limit: limit,
                deep_mode: !legacy,
                filter_statuses,
                randomize,
                seed,
            };
            let follows = load_follows(&discovery).await?;
            let cancel = cancel_on_ctrl_c();
            let sink = TerminalSink::new(cli.quiet);
            let outcome = discovery
                .search(hashtags.as_slice(), &options, &follows, &sink, &cancel)
                .await
                .context("search failed")?;
            finish(&store, outcome)
        }
        Command::Next { pass } => {
            let Some(state) = store.load_crawl() else {
                bail!(
                    "no saved crawl in {}; run `tagscout search` first",
                    store.dir().display()
                );
            };
            if state.is_exhausted() {
                println!("Every server is exhausted; start a new search.");
                return Ok(());
            }
            let follows = load_follows(&discovery).await?;
            let cancel = cancel_on_ctrl_c();
            let sink = TerminalSink::new(cli.quiet);
            let outcome = discovery
                .next_page(&state, pass.concurrency, &follows, &sink, &cancel)
                .await
                .context("next page failed")?;
            finish(&store, outcome)
        }
        Command::Follow { identity } => {
            let relationship = discovery
                .follow(&identity)
                .await
                .with_context(|| format!("following {identity}"))?;
            if relationship.requested {
                println!("Follow request sent to {identity}");
            } else {
                println!("Now following {identity}");
            }
            Ok(())
        }
        Command::Following => {
            let follows = load_follows(&discovery).await?;
            println!("{} follow keys (handles and ids)", follows.len());
            Ok(())
        }
        Command::Relationships { identities } => {
            let relationships = discovery
                .relationships(&identities)
                .await
                .context("fetching relationships")?;
            for identity in &identities {
                match relationships.get(identity).and_then(Option::as_ref) {
                    Some(rel) => println!(
                        "{identity}: following={} requested={} followed_by={}",
                        rel.following, rel.requested, rel.followed_by
                    ),
                    None => println!("{identity}: unresolved"),
                }
            }
            Ok(())
        }
    }
}

/// Home session with the caller's own identity, read from the store or
/// fetched once and cached.
async fn signed_in_session(
    cli: &Cli,
    store: &StateStore,
    settings: &ClientSettings,
) -> Result<HomeSession> {
    let session = HomeSession::new(&cli.instance, cli.token.clone());
    if let Some(me) = store.load_identity(&cli.instance) {
        return Ok(session.with_identity(me));
    }

    let api = ReqwestMastodon::new(settings.clone(), session.clone())
        .context("building http client")?;
    let me = current_identity(&api, &session.host())
        .await
        .context("reading own account")?;
    scout_info!("caching identity {}", me.identity);
    if let Err(err) = store.save_identity(&cli.instance, &me) {
        scout_error!("could not cache identity: {}", err);
    }
    Ok(session.with_identity(me))
}

async fn load_follows(discovery: &Discovery) -> Result<FollowSet> {
    discovery
        .load_follows()
        .await
        .context("enumerating followed accounts")
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after the servers in flight...");
            token.cancel();
        }
    });
    cancel
}

fn finish(store: &StateStore, outcome: CrawlOutcome) -> Result<()> {
    print_results(&outcome.items);
    if !outcome.failed.is_empty() {
        eprintln!("{} servers failed: {}", outcome.failed.len(), outcome.failed.join(", "));
    }
    if outcome.is_exhausted() {
        println!("No further pages on any server.");
    }
    let path = store
        .save_crawl(&outcome.state)
        .context("saving crawl state")?;
    scout_info!("crawl state saved to {:?}", path);
    Ok(())
}
