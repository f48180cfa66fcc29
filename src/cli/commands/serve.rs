use super::Context;
use crate::cli::output::Output;
use crate::engine::{BuildEvent, RepoCacheLoader, StatusSynchronizer};
use crate::errors::Result;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run the loader and the synchronizer until Ctrl-C
pub async fn run(config: Option<PathBuf>) -> Result<()> {
    let ctx = Context::load(config)?;
    let cancel = CancellationToken::new();

    let loader = RepoCacheLoader::new(
        ctx.store.clone(),
        ctx.catalog.clone(),
        ctx.resolver.clone(),
        &ctx.settings.loader,
    );
    let synchronizer = StatusSynchronizer::new(ctx.resolver.clone(), ctx.settings.status.clone());
    let (tx, rx) = mpsc::channel(64);

    Output::success(format!(
        "Serving {} link(s), reading build events from stdin",
        ctx.settings.links.len()
    ));

    let loader_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { loader.run(cancel).await }
    });
    let sync_task = tokio::spawn(async move { synchronizer.run(rx).await });
    let reader_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { forward_events(stdin_lines(), tx, cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    Output::info("Shutting down");
    cancel.cancel();

    // The reader drops the sender on cancel, which lets the synchronizer drain and stop
    for task in [loader_task, reader_task, sync_task] {
        if let Err(e) = task.await {
            warn!("Background task failed: {}", e);
        }
    }
    Ok(())
}

/// Lines of stdin, read on a plain thread so a pending read never holds up shutdown
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Forward one JSON build event per line until the input ends or cancellation
pub(crate) async fn forward_events(
    mut lines: mpsc::UnboundedReceiver<String>,
    tx: mpsc::Sender<BuildEvent>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<BuildEvent>(&line) {
            Ok(event) => {
                debug!("Build event for {} ({})", event.hash, event.status);
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed build event: {}", e),
        }
    }
}
