#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use mass_dispatch::adapters::gateway::{CloudApiGateway, MessageGateway};
use mass_dispatch::config::{Command, Config};
use mass_dispatch::domain::payload::PayloadKind;
use mass_dispatch::services::dispatch_service::Dispatcher;
use mass_dispatch::services::ingest_service::RecipientReader;
use mass_dispatch::services::progress::{ChannelSink, ProgressSink, TracingSink};
use mass_dispatch::services::session::Session;
use mass_dispatch::telemetry;
use std::sync::Arc;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let result = run(&config).instrument(tracing::info_span!("mass_dispatch")).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Run failed");
    }

    telemetry_guard.shutdown();
    result
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut session = Session::new(RecipientReader::new(config.dispatch.default_region));

    // Phase 1: Load recipients and resolve the payload inputs
    let (source, kind, content, image, output) = match &config.command {
        Command::Load(source) => {
            let outcome = session.load_recipients(Some(&source.file), &source.delimiter)?;
            tracing::info!("{}", outcome.status_line());
            return Ok(());
        }
        Command::Text { source, message, output } => (source, PayloadKind::Text, message.clone(), None, output),
        Command::Image { source, image, caption, output } => {
            (source, PayloadKind::Image, caption.clone(), Some(image.clone()), output)
        }
    };

    let outcome = session.load_recipients(Some(&source.file), &source.delimiter)?;
    tracing::info!("{}", outcome.status_line());
    if image.is_some() {
        session.select_image(image);
    }

    // Phase 2: Wire the gateway; missing credentials are reported by preflight
    let gateway: Option<Arc<dyn MessageGateway>> = match config.gateway.credentials() {
        Some(credentials) => Some(Arc::new(CloudApiGateway::new(&config.gateway, credentials)?)),
        None => None,
    };
    let dispatcher = Dispatcher::new(gateway, &config.dispatch);

    // Phase 3: Render progress on this task while the job sends in the background
    let (sink, mut events) = ChannelSink::channel();
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            TracingSink.emit(event);
        }
    });

    let report = match dispatcher.start(session.job_request(kind, content), Arc::new(sink)) {
        Ok(handle) => handle.wait().await,
        Err(e) => Err(e),
    };
    if let Err(e) = renderer.await {
        tracing::warn!(error = %e, "Progress renderer failed");
    }
    let report = report?;

    // Phase 4: Persist the per-recipient report
    if let Some(path) = &output.report {
        tokio::fs::write(path, serde_json::to_vec_pretty(&report)?).await?;
        tracing::info!(path = %path.display(), "Dispatch report written");
    }

    if report.summary.failed > 0 {
        tracing::warn!(failed = report.summary.failed, "Some recipients could not be reached; see the log for details");
    }

    Ok(())
}
