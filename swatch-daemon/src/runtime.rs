use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use swatch_core::{Locations, OsName, DATA_FILE_NAME};
use swatch_sync::{CancelToken, CycleOptions, CycleReport, DispatchOutcome, SyncCycle, WriteResult};

use crate::error::{io_err, DaemonError};

/// Set to `json` for one JSON object per log line.
pub const ENV_LOG_FORMAT: &str = "SWATCH_LOG_FORMAT";

/// Quiet period after the last relevant event before a cycle runs.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// What changed on disk. A source change needs the cycle rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Data,
    Source,
}

impl Change {
    fn merge(self, other: Change) -> Change {
        if self == Change::Source || other == Change::Source {
            Change::Source
        } else {
            Change::Data
        }
    }
}

struct SyncJob {
    change: Change,
    source: &'static str,
    respond_to: Option<oneshot::Sender<Result<CycleSummary, String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub source: String,
    pub rebuilt: bool,
    pub written: usize,
    pub unchanged: usize,
    pub render_failures: usize,
    pub dispatch: String,
    pub duration_ms: u128,
}

/// Trailing-edge debounce: a burst of events yields one change, released
/// once `window` has passed without another event.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    pending: Option<(Change, Instant)>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self { window, pending: None }
    }

    fn note(&mut self, change: Change, now: Instant) {
        let merged = match self.pending {
            Some((pending, _)) => pending.merge(change),
            None => change,
        };
        self.pending = Some((merged, now + self.window));
    }

    fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, deadline)| deadline)
    }

    fn take_due(&mut self, now: Instant) -> Option<Change> {
        match self.pending {
            Some((change, deadline)) if deadline <= now => {
                self.pending = None;
                Some(change)
            }
            _ => None,
        }
    }
}

/// Start watch mode and block the current thread until it exits.
pub fn start_blocking(locations: Locations, os: OsName) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(locations, os))
}

/// Run watch mode: one cycle at startup, then one per debounced change.
pub async fn run(locations: Locations, os: OsName) -> Result<(), DaemonError> {
    ensure_watch_dirs(&locations)?;

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let locations = locations.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = sync_processor_task(locations, os, sync_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    sync_tx
        .send(SyncJob { change: Change::Source, source: "startup", respond_to: None })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = watcher_task(locations, sync_tx, DEBOUNCE_WINDOW, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, stopping watch mode");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (watcher_result, processor_result, signal_result) =
        tokio::join!(watcher_handle, processor_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn watcher_task(
    locations: Locations,
    sync_tx: mpsc::Sender<SyncJob>,
    window: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    // Canonicalize so that FSEvents paths (which arrive as real paths, e.g.
    // /private/var/... on macOS) match the `starts_with` checks below.
    let config_dir = fs::canonicalize(&locations.config_dir).unwrap_or(locations.config_dir);
    let source_dir = fs::canonicalize(&locations.source_dir).unwrap_or(locations.source_dir);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    // The data file is replaced by rename, so watch its directory.
    watcher.watch(&config_dir, RecursiveMode::NonRecursive)?;
    watcher.watch(&source_dir, RecursiveMode::Recursive)?;
    tracing::info!(
        config_dir = %config_dir.display(),
        source_dir = %source_dir.display(),
        "watching for changes"
    );

    let mut debounce = Debouncer::new(window);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                for path in &event.paths {
                    if let Some(change) = classify_path(path, &config_dir, &source_dir) {
                        tracing::debug!(path = %path.display(), ?change, "change noted");
                        debounce.note(change, Instant::now());
                    }
                }
            }
            _ = wait_until(debounce.deadline()) => {
                let Some(change) = debounce.take_due(Instant::now()) else { continue };
                match enqueue_cycle(&sync_tx, change, "watcher").await {
                    Ok(summary) => log_summary(&summary),
                    Err(err) => tracing::error!(error = %err, "watcher-triggered cycle failed"),
                }
            }
        }
    }

    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn sync_processor_task(
    locations: Locations,
    os: OsName,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut cycle: Option<Arc<SyncCycle>> = None;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let rebuilt = job.change == Change::Source || cycle.is_none();
                if rebuilt {
                    match build_cycle(locations.clone(), os.clone()).await {
                        Ok(fresh) => cycle = Some(fresh),
                        Err(err) => {
                            // Keep serving the last good source tree.
                            tracing::error!(error = %err, "failed to load source tree");
                            if cycle.is_none() {
                                respond(job.respond_to, Err(err.to_string()));
                                continue;
                            }
                        }
                    }
                }
                let Some(current) = cycle.clone() else { continue };

                let cancel = CancelToken::new();
                let options = CycleOptions { cancel: cancel.clone(), ..CycleOptions::default() };
                let mut handle = tokio::task::spawn_blocking(move || current.run(&options));
                let (joined, stopping) = tokio::select! {
                    joined = &mut handle => (joined, false),
                    _ = shutdown_rx.recv() => {
                        cancel.cancel();
                        (handle.await, true)
                    }
                };
                let result = joined
                    .map_err(|err| DaemonError::Runtime(format!("sync task join error: {err}")))?;

                let outcome = match result {
                    Ok(report) => Ok(summarize(&report, job.source, rebuilt, started.elapsed())),
                    Err(err) => Err(err.to_string()),
                };
                if job.respond_to.is_none() {
                    match &outcome {
                        Ok(summary) => log_summary(summary),
                        Err(err) => tracing::error!(error = %err, source = job.source, "cycle failed"),
                    }
                }
                respond(job.respond_to, outcome);
                if stopping {
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn build_cycle(locations: Locations, os: OsName) -> Result<Arc<SyncCycle>, DaemonError> {
    let cycle = tokio::task::spawn_blocking(move || SyncCycle::new(locations, os))
        .await
        .map_err(|err| DaemonError::Runtime(format!("cycle load join error: {err}")))??;
    Ok(Arc::new(cycle))
}

fn respond(
    respond_to: Option<oneshot::Sender<Result<CycleSummary, String>>>,
    outcome: Result<CycleSummary, String>,
) {
    if let Some(tx) = respond_to {
        let _ = tx.send(outcome);
    }
}

async fn enqueue_cycle(
    sync_tx: &mpsc::Sender<SyncJob>,
    change: Change,
    source: &'static str,
) -> Result<CycleSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob { change, source, respond_to: Some(tx) })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Runtime)
}

fn summarize(report: &CycleReport, source: &str, rebuilt: bool, elapsed: Duration) -> CycleSummary {
    let written = report
        .writes
        .iter()
        .filter(|w| matches!(w, WriteResult::Written { .. }))
        .count();
    CycleSummary {
        source: source.to_owned(),
        rebuilt,
        written,
        unchanged: report.writes.len() - written,
        render_failures: report.render_failures.len(),
        dispatch: outcome_label(&report.dispatch),
        duration_ms: elapsed.as_millis(),
    }
}

fn outcome_label(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Skipped { reason } => format!("skipped ({reason:?})"),
        DispatchOutcome::Invoked { variant } => format!("invoked {}", variant.file_name),
        DispatchOutcome::Failed { reason, .. } => format!("failed: {reason}"),
    }
}

fn log_summary(summary: &CycleSummary) {
    tracing::info!(
        source = %summary.source,
        rebuilt = summary.rebuilt,
        written = summary.written,
        unchanged = summary.unchanged,
        render_failures = summary.render_failures,
        dispatch = %summary.dispatch,
        duration_ms = summary.duration_ms,
        "cycle completed",
    );
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
}

fn classify_path(path: &Path, config_dir: &Path, source_dir: &Path) -> Option<Change> {
    if path.starts_with(source_dir) {
        return Some(Change::Source);
    }
    let is_data_file = path.parent() == Some(config_dir)
        && path.file_name().and_then(|n| n.to_str()) == Some(DATA_FILE_NAME);
    is_data_file.then_some(Change::Data)
}

fn ensure_watch_dirs(locations: &Locations) -> Result<(), DaemonError> {
    for dir in [&locations.config_dir, &locations.source_dir, &locations.state_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!("{task} task join failure: {err}"))),
    }
}

/// Install the `tracing` subscriber on stderr (`RUST_LOG` overrides the
/// `info` default, `SWATCH_LOG_FORMAT=json` switches to JSON lines). Safe to
/// call more than once.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// [`init_tracing`] with a caller-chosen default filter.
pub fn init_tracing_with_default(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);
    let _ = if std::env::var_os(ENV_LOG_FORMAT).is_some_and(|v| v == "json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::time::advance;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_events() {
        let window = Duration::from_millis(100);
        let mut debounce = Debouncer::new(window);
        let mut released = Vec::new();

        for _ in 0..5 {
            debounce.note(Change::Data, Instant::now());
            advance(Duration::from_millis(10)).await;
            released.extend(debounce.take_due(Instant::now()));
        }
        assert!(released.is_empty(), "no cycle while events keep arriving");

        advance(Duration::from_millis(150)).await;
        released.extend(debounce.take_due(Instant::now()));
        assert_eq!(released, vec![Change::Data], "a burst collapses to one cycle");
        assert_eq!(debounce.deadline(), None);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn source_change_wins_when_merged() {
        let mut debounce = Debouncer::new(Duration::from_millis(50));
        debounce.note(Change::Data, Instant::now());
        debounce.note(Change::Source, Instant::now());
        debounce.note(Change::Data, Instant::now());
        advance(Duration::from_millis(60)).await;
        assert_eq!(debounce.take_due(Instant::now()), Some(Change::Source));
    }

    #[test]
    fn classify_paths() {
        let config = Path::new("/home/u/.config/swatch");
        let source = Path::new("/home/u/.local/share/swatch/source");
        assert_eq!(
            classify_path(&config.join(DATA_FILE_NAME), config, source),
            Some(Change::Data)
        );
        assert_eq!(classify_path(&config.join("other.yaml"), config, source), None);
        assert_eq!(
            classify_path(&source.join("dot_config/starship.toml.tmpl"), config, source),
            Some(Change::Source)
        );
        assert_eq!(classify_path(Path::new("/home/u/.config/starship.toml"), config, source), None);
    }

    fn fixture() -> (TempDir, Locations) {
        let home = TempDir::new().expect("home");
        let locations = Locations::at(home.path());
        fs::create_dir_all(locations.source_dir.join("dot_config")).expect("source dir");
        fs::write(
            locations.source_dir.join("dot_config/theme.conf.tmpl"),
            "theme = {{ .current_theme }}\n",
        )
        .expect("template");
        fs::create_dir_all(&locations.config_dir).expect("config dir");
        fs::write(locations.config_dir.join(DATA_FILE_NAME), "current_theme: gruvbox\n").expect("data");
        (home, locations)
    }

    #[tokio::test]
    async fn processor_builds_and_runs_cycles_on_request() {
        let (_home, locations) = fixture();
        let (sync_tx, sync_rx) = mpsc::channel(4);
        let (shutdown_tx, _) = broadcast::channel(1);
        let processor = tokio::spawn(sync_processor_task(
            locations.clone(),
            OsName::current(),
            sync_rx,
            shutdown_tx.subscribe(),
        ));

        let first = enqueue_cycle(&sync_tx, Change::Data, "test").await.expect("first cycle");
        assert!(first.rebuilt, "first job always loads the source tree");
        assert_eq!(first.written, 1);
        let target = locations.dest_dir.join(".config/theme.conf");
        assert_eq!(fs::read_to_string(&target).expect("rendered"), "theme = gruvbox\n");

        fs::write(locations.config_dir.join(DATA_FILE_NAME), "current_theme: nord\n").expect("data");
        let second = enqueue_cycle(&sync_tx, Change::Data, "test").await.expect("second cycle");
        assert!(!second.rebuilt);
        assert_eq!(fs::read_to_string(&target).expect("rendered"), "theme = nord\n");

        fs::write(locations.source_dir.join("dot_config/theme.conf.tmpl"), "t={{ .current_theme }}\n")
            .expect("template");
        let third = enqueue_cycle(&sync_tx, Change::Source, "test").await.expect("third cycle");
        assert!(third.rebuilt);
        assert_eq!(fs::read_to_string(&target).expect("rendered"), "t=nord\n");

        let _ = shutdown_tx.send(());
        processor.await.expect("join").expect("processor");
    }

    #[tokio::test]
    async fn processor_reports_fatal_cycle_errors() {
        let (_home, locations) = fixture();
        fs::remove_file(locations.config_dir.join(DATA_FILE_NAME)).expect("remove data");
        let (sync_tx, sync_rx) = mpsc::channel(4);
        let (shutdown_tx, _) = broadcast::channel(1);
        let processor = tokio::spawn(sync_processor_task(
            locations,
            OsName::current(),
            sync_rx,
            shutdown_tx.subscribe(),
        ));

        let err = enqueue_cycle(&sync_tx, Change::Data, "test").await.unwrap_err();
        assert!(err.to_string().contains("data file not found"));

        let _ = shutdown_tx.send(());
        processor.await.expect("join").expect("processor");
    }
}
