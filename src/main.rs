use chrono::Utc;
use dotenv::dotenv;
use tracing::{error, info};

use pseudonym_lib::config::Config;
use pseudonym_lib::es_client::EsClient;
use pseudonym_lib::pipeline::PipelineService;
use pseudonym_lib::window::RunWindow;
use pseudonym_lib::{cli, logging};

#[tokio::main]
async fn main() {
    dotenv().ok();
    logging::init_logging("pseudonym-identities", "info");
    let args = cli::parse_args();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "config incorrectly specified");
            std::process::exit(1);
        }
    };

    let days_to_count = args.days_to_count.unwrap_or(config.days_to_count);
    let kill_days = args.kill_days.unwrap_or(config.kill_days);
    let window = RunWindow::from_now(Utc::now(), days_to_count, kill_days);
    info!(
        window_start = %window.start_rfc3339(),
        window_end = %window.end_rfc3339(),
        purge_cutoff = %window.purge_cutoff_rfc3339(),
        "starting pseudonym identity run"
    );

    let es = match EsClient::new(&config.es_url, &config.es_username, &config.es_password) {
        Ok(es) => es,
        Err(err) => {
            error!(error = %err, "could not build document store client");
            std::process::exit(1);
        }
    };

    let pipeline = PipelineService::new(es, config.index_datastream, config.index_identities);
    match pipeline.run(&window, args.no_purge, args.dry_run).await {
        Ok(report) => {
            info!(
                deleted = report.deleted,
                cardinality = report.estimated_cardinality,
                partitions = report.partitions,
                records = report.records_aggregated,
                batches_sent = report.batches_sent,
                batches_failed = report.batches_failed,
                "run finished"
            );
        }
        Err(err) => {
            error!("{}", logging::format_error_report(&err));
            std::process::exit(1);
        }
    }
}
