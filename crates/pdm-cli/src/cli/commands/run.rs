//! `pdm run` – drive downloads in the foreground with a progress display.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use pdm_core::store::DownloadId;
use pdm_core::{Engine, EngineError, StatusCode};
use tokio::task::JoinSet;

use super::human_bytes;

const PRINT_INTERVAL: Duration = Duration::from_millis(500);

/// Statuses that keep the foreground loop alive.
fn busy(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::Pending | StatusCode::Running | StatusCode::WaitingToRetry
    )
}

pub async fn run_downloads(engine: &Engine, ids: Vec<DownloadId>) -> Result<()> {
    if !ids.is_empty() {
        return drive(engine, ids, |e, id| async move { e.resume_download(id).await }).await;
    }
    let pending: Vec<DownloadId> = engine
        .store()
        .get_all_info()
        .await?
        .into_iter()
        .filter(|i| busy(i.status_code) || i.status_code == StatusCode::WaitingForNetwork)
        .map(|i| i.id)
        .collect();
    if pending.is_empty() {
        println!("No downloads to run.");
        return Ok(());
    }
    drive(engine, pending, |e, id| async move { e.run_download(id).await }).await
}

/// Start every id with `start`, print progress until none is busy, and
/// pause everything on Ctrl-C.
pub(crate) async fn drive<F, Fut>(engine: &Engine, ids: Vec<DownloadId>, start: F) -> Result<()>
where
    F: Fn(Engine, DownloadId) -> Fut,
    Fut: Future<Output = Result<StatusCode, EngineError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for id in &ids {
        tasks.spawn(start(engine.clone(), *id));
    }
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(PRINT_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("Interrupted, pausing downloads...");
                engine.shutdown().await;
                break;
            }
            Some(joined) = tasks.join_next() => match joined {
                Ok(Ok(status)) => tracing::debug!(%status, "run finished"),
                Ok(Err(e)) => eprintln!("pdm: {}", e),
                Err(e) => tracing::error!("download task failed: {}", e),
            },
            _ = ticker.tick() => {
                let busy_now = print_progress(engine, &ids).await?;
                if tasks.is_empty() && !busy_now {
                    break;
                }
            }
        }
    }
    print_progress(engine, &ids).await?;
    Ok(())
}

/// One line per download. Returns whether any is still busy.
async fn print_progress(engine: &Engine, ids: &[DownloadId]) -> Result<bool> {
    let mut any_busy = false;
    for id in ids {
        let Some(p) = engine.progress(*id).await? else {
            continue;
        };
        any_busy |= busy(p.status);
        let pct = p
            .percent()
            .map(|v| format!("{:>3}%", v))
            .unwrap_or_else(|| "   ?".into());
        println!(
            "  {}  {:<18} {}  {} / {}  {}/s",
            &id.to_string()[..8],
            p.status.label(),
            pct,
            human_bytes(p.downloaded_bytes),
            human_bytes(p.total_bytes),
            human_bytes(p.speed as i64)
        );
    }
    Ok(any_busy)
}
