// mongodumptool/src/backup/logic.rs
use std::future::Future;
use std::time::Instant;
use tracing::{debug, error, info};

use super::db_dump::MongoDump;
use super::report::{DumpStage, RunReport, StageTrail};
use crate::storage::{FolderReplication, ProviderSet, Replicator};
use crate::utils::size::format_elapsed;

/// Dump, finalize, replicate, clean up.
///
/// Provider handles are only built once a finalized artifact exists, so a
/// failed dump never touches the network. Cleanup runs on every path.
pub async fn perform_backup_orchestration<F, Fut>(dump: &MongoDump, providers: F) -> RunReport
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ProviderSet>,
{
    let started = Instant::now();
    let mut trail = StageTrail::new();
    let mut report = RunReport {
        dump_succeeded: false,
        size: None,
        path: None,
        replicated: false,
        elapsed: Default::default(),
        replication: FolderReplication::default(),
        cleaned: false,
        trail: StageTrail::new(),
    };

    info!("🚀 Starting MongoDB dump");
    let dumped = match dump.check_connectivity().await {
        Ok(()) => {
            trail.advance(DumpStage::ConnectivityChecked);
            trail.advance(DumpStage::DumpRunning);
            dump.dump().await
        }
        Err(e) => Err(e),
    };

    match dumped {
        Ok(()) => {
            trail.advance(DumpStage::DumpSucceeded);
            report.dump_succeeded = true;
        }
        Err(e) => {
            error!("Dump failed: {}", e);
            trail.advance(DumpStage::DumpFailed);
        }
    }

    if report.dump_succeeded {
        match dump.finalize() {
            Ok(artifact) => {
                trail.advance(DumpStage::Finalized);
                debug!("Dump of {} ready at {}", artifact.created, artifact.path.display());
                report.size = artifact.size.clone();

                let replicator = Replicator::new(providers().await);
                let strip_prefix = artifact.path.parent().map(|p| p.to_path_buf());
                match replicator
                    .upload_folder(&artifact.path, strip_prefix.as_deref())
                    .await
                {
                    Ok(summary) => {
                        report.replicated = true;
                        report.replication = summary;
                    }
                    Err(e) => error!("Replication failed: {}", e),
                }
                report.path = Some(artifact.path);
            }
            Err(e) => {
                error!("Dump could not be finalized: {}", e);
                trail.advance(DumpStage::FinalizeFailed);
                report.dump_succeeded = false;
            }
        }
    }

    report.cleaned = dump.cleanup();
    trail.advance(DumpStage::Cleaned);

    report.elapsed = started.elapsed();
    debug!("Stages: {}", trail);
    report.trail = trail;
    info!(
        "Run finished in {} (dump: {}, size: {}, replicated: {})",
        format_elapsed(report.elapsed),
        report.dump_succeeded,
        report.size.as_deref().unwrap_or("unknown"),
        report.replicated
    );
    report
}
