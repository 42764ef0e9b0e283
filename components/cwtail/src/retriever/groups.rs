//! Paginated log group listing.

// Local crates
use crate::backend::client::{BackendError, BackendOperation, LogStorageClient};
use crate::metrics::metrics::GROUP_PAGES_TOTAL;
use crate::retriever::engine::LogRetriever;
use crate::retriever::events::{Emitter, GroupListingEvent, GroupListingHandle, OperationHandle};
use crate::retriever::metered;
use crate::retriever::options::{ConfigurationError, GroupListingOptions};

// External crates
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

impl LogRetriever {
    /// Enumerate every log group, one `Page` notification per backend page.
    pub fn list_log_groups(
        &self,
        options: GroupListingOptions,
    ) -> Result<GroupListingHandle, ConfigurationError> {
        self.list_log_groups_with_cancel(options, &CancellationToken::new())
    }

    /// Like [`list_log_groups`](Self::list_log_groups), but cancelled along
    /// with `parent`.
    pub fn list_log_groups_with_cancel(
        &self,
        options: GroupListingOptions,
        parent: &CancellationToken,
    ) -> Result<GroupListingHandle, ConfigurationError> {
        options.validate()?;

        let client = Arc::clone(&self.client);
        let span = tracing::info_span!(
            target: "retriever::groups",
            "cwtail_retriever::list_log_groups",
            max_pages = ?options.max_pages,
        );

        Ok(OperationHandle::spawn(
            parent.child_token(),
            move |emitter, cancel| {
                async move {
                    if let Err(e) = list_pages(client.as_ref(), options, &emitter, &cancel).await {
                        tracing::error!(error = %e, "Log group listing aborted");
                        emitter.emit(GroupListingEvent::Error(e));
                    }
                    emitter.emit(GroupListingEvent::Done);
                }
                .instrument(span)
            },
        ))
    }
}

/// Follow continuation tokens until the last page, the page bound, or
/// cancellation. Pages are emitted as they arrive.
async fn list_pages(
    client: &dyn LogStorageClient,
    options: GroupListingOptions,
    emitter: &Emitter<GroupListingEvent>,
    cancel: &CancellationToken,
) -> Result<(), BackendError> {
    let mut next_token: Option<String> = None;
    let mut pages = 0usize;

    while options.max_pages.is_none_or(|max| pages < max) {
        let Some(page) = cancel
            .run_until_cancelled(metered(
                BackendOperation::ListLogGroups,
                client.list_log_groups(next_token.take()),
            ))
            .await
        else {
            tracing::debug!(pages, "Log group listing cancelled");
            return Ok(());
        };
        let page = page?;
        pages += 1;

        next_token = page.next_token.clone();
        tracing::debug!(
            page = pages,
            groups = page.log_groups.len(),
            more = next_token.is_some(),
            "Received log group page"
        );

        GROUP_PAGES_TOTAL.inc();
        if !emitter.emit(GroupListingEvent::Page(page)) || next_token.is_none() {
            break;
        }
    }

    Ok(())
}
