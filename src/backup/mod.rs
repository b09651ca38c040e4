pub(crate) mod artifact;
pub(crate) mod connectivity;
pub(crate) mod db_dump;
mod logic;
pub(crate) mod report;

use crate::config::AppConfig;
use crate::storage::create_provider_handles;

pub use db_dump::MongoDump;
pub use report::RunReport;

/// Public entry point for one dump-and-replicate run.
pub async fn run_backup_flow(app_config: &AppConfig) -> RunReport {
    let dump = MongoDump::new(app_config);
    logic::perform_backup_orchestration(&dump, || create_provider_handles(app_config)).await
}
