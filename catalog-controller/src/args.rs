use crate::{
    index::{metrics, DependencyIndex, IndexMetrics, WorkloadNodeMapper},
    Controller, Event,
};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use futures::{future, prelude::*, stream::BoxStream};
use prometheus_client::registry::Registry;
use std::{io, path::PathBuf};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tokio_stream::wrappers::LinesStream;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(
    name = "catalog-controller",
    about = "Maps catalog node changes to workload reconciliations"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "catalog=info,warn",
        env = "CATALOG_CONTROLLER_LOG"
    )]
    log_level: String,

    #[clap(long, default_value = "plain", env = "CATALOG_CONTROLLER_LOG_FORMAT")]
    log_format: LogFormat,

    /// A file of newline-delimited JSON watch events.
    ///
    /// Events are read from stdin when unset.
    #[clap(long)]
    events: Option<PathBuf>,

    /// Writes the metrics registry to stderr on exit.
    #[clap(long)]
    print_metrics: bool,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            events,
            print_metrics,
        } = self;

        init_log(&log_level, log_format)?;

        let mut prom = Registry::default();
        let index = {
            let prom = prom.sub_registry_with_prefix("catalog");
            let index = DependencyIndex::shared(IndexMetrics::register(prom));
            metrics::register_size(prom, index.clone());
            index
        };

        // Reconcile requests are written to stdout as they are produced.
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_requests(queue_rx));

        let events = read_events(events).await?;
        let (drain_tx, drain_rx) = drain::channel();
        let mut controller = tokio::spawn(
            Controller::new(WorkloadNodeMapper::new(index), queue_tx)
                .run(events, drain_rx)
                .instrument(info_span!("workloadhealth")),
        );

        tokio::select! {
            res = &mut controller => res??,

            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Received shutdown signal");
                drain_tx.drain().await;
                controller.await??;
            }
        }

        // The controller owned the queue's sender, so the writer finishes once it has flushed
        // everything that was enqueued.
        writer.await??;

        if print_metrics {
            let mut buf = String::new();
            prometheus_client::encoding::text::encode(&mut buf, &prom)?;
            eprint!("{buf}");
        }

        Ok(())
    }
}

fn init_log(level: &str, format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

async fn read_events(path: Option<PathBuf>) -> Result<BoxStream<'static, Event>> {
    let lines = match path {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            LinesStream::new(BufReader::new(file).lines()).boxed()
        }
        None => LinesStream::new(BufReader::new(tokio::io::stdin()).lines()).boxed(),
    };

    Ok(lines
        .take_while(|line| {
            if let Err(error) = line {
                warn!(%error, "Failed to read events");
            }
            future::ready(line.is_ok())
        })
        .filter_map(|line| future::ready(line.ok().as_deref().and_then(parse_event)))
        .boxed())
}

fn parse_event(line: &str) -> Option<Event> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(error) => {
            warn!(%error, "Skipping malformed event");
            None
        }
    }
}

async fn write_requests(mut reqs: mpsc::UnboundedReceiver<crate::core::Request>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(req) = reqs.recv().await {
        let mut line = serde_json::to_vec(&req)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await?;
    Ok(())
}
