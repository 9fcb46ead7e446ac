//! Run the realty medallion pipeline once and print the run report.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use realty_indexer::{init_tracing, Dependencies, IndexingError, Settings};

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    init_tracing(settings.json_logs);
    info!("Starting realty indexer");

    let deps = Dependencies::new(&settings).await?;

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next checkpoint");
            signal.cancel();
        }
    });

    let report = match deps.pipeline.run(&cancel).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Pipeline run failed");
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_success() {
        warn!(
            status = ?report.status,
            failed_writes = report.failed_writes(),
            "Run finished with failures"
        );
    }
    Ok(())
}
