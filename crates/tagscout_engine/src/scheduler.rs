use std::sync::{Mutex, PoisonError};

use futures_util::future::join_all;
use scout_logging::{scout_debug, scout_info, scout_warn};
use tagscout_core::{plan_pass, CrawlState, DedupAggregator, Insertion, ServerStep};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::worker::{search_server, SearchContext, ServerPage};
use crate::{CrawlEvent, CrawlSink, DiscoveryError};

/// What one pass produced, before sorting.
#[derive(Debug)]
pub struct PassReport {
    pub aggregator: DedupAggregator,
    pub state: CrawlState,
    pub failed: Vec<String>,
}

struct Job {
    server: String,
    cursor: Option<String>,
}

/// Pass-wide bookkeeping. Only touched between awaits, never across one.
struct Tally {
    aggregator: DedupAggregator,
    state: CrawlState,
    failed: Vec<String>,
    completed: usize,
    total: usize,
}

impl Tally {
    fn complete(&mut self, sink: &dyn CrawlSink) {
        self.completed += 1;
        sink.emit(CrawlEvent::Progress {
            completed: self.completed,
            total: self.total,
        });
    }

    fn record(
        &mut self,
        server: &str,
        outcome: Result<ServerPage, DiscoveryError>,
        sink: &dyn CrawlSink,
    ) {
        match outcome {
            Ok(page) => {
                scout_info!(
                    "{}: {} items, cursor {:?}",
                    server,
                    page.items.len(),
                    page.cursor
                );
                self.state.record(server, page.cursor);
                for item in page.items {
                    let insertion = self.aggregator.insert(item.clone());
                    if insertion.is_stored() {
                        sink.emit(CrawlEvent::Discovered {
                            item,
                            replaced: insertion == Insertion::Replaced,
                        });
                    }
                }
            }
            Err(error) => {
                scout_warn!("{} failed: {}", server, error);
                self.state.record(server, None);
                self.failed.push(server.to_string());
                sink.emit(CrawlEvent::ServerFailed {
                    server: server.to_string(),
                    error,
                });
            }
        }
        self.complete(sink);
    }
}

/// Runs one pass over `state` with at most `concurrency` servers in flight.
///
/// The returned state is a copy of `state` with every visited server's
/// cursor updated; servers left unvisited by cancellation keep theirs.
pub async fn run_pass(
    ctx: &SearchContext<'_>,
    state: &CrawlState,
    concurrency: usize,
    sink: &dyn CrawlSink,
    cancel: &CancellationToken,
) -> PassReport {
    let steps = plan_pass(state);
    let tally = Mutex::new(Tally {
        aggregator: DedupAggregator::new(),
        state: state.clone(),
        failed: Vec::new(),
        completed: 0,
        total: steps.len(),
    });

    let searches = steps
        .iter()
        .filter(|step| matches!(step, ServerStep::Search { .. }))
        .count();
    let (tx, rx) = mpsc::channel(searches.max(1));
    for step in steps {
        match step {
            ServerStep::Skip { server } => {
                scout_debug!("{} is exhausted, skipping", server);
                lock(&tally).complete(sink);
            }
            ServerStep::Search { server, cursor } => {
                // Capacity covers every search, so this never fails.
                let _ = tx.try_send(Job { server, cursor });
            }
        }
    }
    drop(tx);

    let queue = tokio::sync::Mutex::new(rx);
    let workers = (0..concurrency.max(1))
        .map(|worker| worker_loop(worker, ctx, &queue, &tally, sink, cancel));
    join_all(workers).await;

    let tally = tally.into_inner().unwrap_or_else(PoisonError::into_inner);
    PassReport {
        aggregator: tally.aggregator,
        state: tally.state,
        failed: tally.failed,
    }
}

async fn worker_loop(
    worker: usize,
    ctx: &SearchContext<'_>,
    queue: &tokio::sync::Mutex<mpsc::Receiver<Job>>,
    tally: &Mutex<Tally>,
    sink: &dyn CrawlSink,
    cancel: &CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            scout_debug!("worker {} stopping: crawl cancelled", worker);
            queue.lock().await.close();
            return;
        }

        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            return;
        };

        scout_debug!("worker {} searching {}", worker, job.server);
        let outcome = search_server(ctx, &job.server, job.cursor.as_deref()).await;
        lock(tally).record(&job.server, outcome, sink);
    }
}

fn lock(tally: &Mutex<Tally>) -> std::sync::MutexGuard<'_, Tally> {
    tally.lock().unwrap_or_else(PoisonError::into_inner)
}
