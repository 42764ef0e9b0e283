//! Command drivers.

// Local crates
use crate::{
    backend::{client::LogStorageClient, cloudwatch::CloudWatchLogsClient},
    helpers::{load_config::Config, shutdown::Shutdown},
    retriever::{
        engine::LogRetriever,
        events::{GroupListingEvent, RetrievalEvent},
        options::{GroupListingOptions, RetrievalOptions},
    },
    runtime::output::{RecordFormat, write_group},
};

// External crates
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::instrument;

/// Connect the CloudWatch Logs backend described by `cfg`.
pub async fn connect_backend(cfg: &Config) -> Arc<dyn LogStorageClient> {
    Arc::new(CloudWatchLogsClient::connect(cfg.aws.profile.clone(), cfg.aws.region.clone()).await)
}

/// `cwtail tail`: print records of `log_group` to stdout until the retrieval
/// ends, fails, or Ctrl+C is pressed.
pub async fn run_tail(
    cfg: &Config,
    log_group: &str,
    options: RetrievalOptions,
    format: RecordFormat,
) -> Result<()> {
    let shutdown = Shutdown::new();
    let listener = shutdown.listen_for_ctrl_c();

    let retriever = LogRetriever::new(connect_backend(cfg).await);
    let result = tail_log_group(&retriever, log_group, options, format, &shutdown, &mut io::stdout()).await;

    shutdown.trigger();
    let _ = listener.await;
    result
}

/// `cwtail list`: print every log group name (or JSON description) to stdout.
pub async fn run_list(cfg: &Config, options: GroupListingOptions, long: bool) -> Result<()> {
    let shutdown = Shutdown::new();
    let listener = shutdown.listen_for_ctrl_c();

    let retriever = LogRetriever::new(connect_backend(cfg).await);
    let result = list_log_groups(&retriever, options, long, &shutdown, &mut io::stdout()).await;

    shutdown.trigger();
    let _ = listener.await;
    result
}

/// Drive one retrieval operation, writing its notifications to `out`.
#[instrument(
    name = "cwtail_runtime::tail",
    target = "runtime::runtime",
    skip(retriever, options, format, shutdown, out),
    level = "debug"
)]
pub async fn tail_log_group<W: Write>(
    retriever: &LogRetriever,
    log_group: &str,
    options: RetrievalOptions,
    format: RecordFormat,
    shutdown: &Shutdown,
    out: &mut W,
) -> Result<()> {
    let mut handle = retriever.start_retrieval_with_cancel(log_group, options, shutdown.token())?;
    let mut failure = None;

    let written = async {
        while let Some(event) = handle.next_event().await {
            match event {
                RetrievalEvent::StreamBoundary(log_stream) => {
                    format.write_stream_boundary(out, &log_stream)?;
                }
                RetrievalEvent::Record(record) => {
                    format.write_record(out, &record)?;
                    out.flush()?;
                }
                RetrievalEvent::Error(e) => failure = Some(e),
                RetrievalEvent::Done => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if written.is_err() {
        handle.cancel();
    }
    written.context("Failed to write log records")?;

    match failure {
        Some(e) => Err(anyhow::Error::new(e))
            .with_context(|| format!("Failed to retrieve records from log group {log_group}")),
        None => Ok(()),
    }
}

/// Drive one group listing, writing each group to `out` as its page arrives.
pub async fn list_log_groups<W: Write>(
    retriever: &LogRetriever,
    options: GroupListingOptions,
    long: bool,
    shutdown: &Shutdown,
    out: &mut W,
) -> Result<()> {
    let mut handle = retriever.list_log_groups_with_cancel(options, shutdown.token())?;
    let mut failure = None;

    let written = async {
        while let Some(event) = handle.next_event().await {
            match event {
                GroupListingEvent::Page(page) => {
                    for group in &page.log_groups {
                        write_group(out, group, long)?;
                    }
                    out.flush()?;
                }
                GroupListingEvent::Error(e) => failure = Some(e),
                GroupListingEvent::Done => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if written.is_err() {
        handle.cancel();
    }
    written.context("Failed to write log groups")?;

    match failure {
        Some(e) => Err(anyhow::Error::new(e)).context("Failed to list log groups"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        memory::{FailurePoint, InMemoryLogStore},
        models::LogGroup,
    };

    fn retriever(store: &Arc<InMemoryLogStore>) -> LogRetriever {
        LogRetriever::new(store.clone())
    }

    #[tokio::test]
    async fn tail_writes_records_with_stream_banners() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "b", [(5, "five\n")]);
        store.append_events("svc", "a", [(1, "one\n"), (2, "two\n")]);

        let format = RecordFormat {
            show_streams: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        tail_log_group(
            &retriever(&store),
            "svc",
            RetrievalOptions::default(),
            format,
            &Shutdown::new(),
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().filter(|l| !l.starts_with('-')).collect();
        assert_eq!(lines, vec!["a", "one", "two", "b", "five"]);
    }

    #[tokio::test]
    async fn tail_surfaces_backend_errors() {
        let store = Arc::new(InMemoryLogStore::new());
        store.append_events("svc", "a", [(1, "one\n")]);
        store.fail_next(
            FailurePoint::ListStreams {
                log_group: "svc".into(),
            },
            "expired token",
        );

        let err = tail_log_group(
            &retriever(&store),
            "svc",
            RetrievalOptions::default(),
            RecordFormat::default(),
            &Shutdown::new(),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();

        let rendered = format!("{err:#}");
        assert!(rendered.contains("log group svc"));
        assert!(rendered.contains("expired token"));
    }

    #[tokio::test]
    async fn tail_rejects_bad_options_before_reading() {
        let store = Arc::new(InMemoryLogStore::new());

        let err = tail_log_group(
            &retriever(&store),
            "",
            RetrievalOptions::default(),
            RecordFormat::default(),
            &Shutdown::new(),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "log group name required");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn list_writes_every_page() {
        let store = Arc::new(InMemoryLogStore::new().with_group_page_size(1));
        store.add_group(LogGroup::named("alpha"));
        store.add_group(LogGroup::named("beta"));

        let mut out = Vec::new();
        list_log_groups(
            &retriever(&store),
            GroupListingOptions::default(),
            false,
            &Shutdown::new(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "alpha\nbeta\n");
    }
}
