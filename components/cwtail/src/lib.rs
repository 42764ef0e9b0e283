//! `cwtail` reads the most recent records of a log group across all of its
//! streams and can keep following it, emitting every record exactly once per
//! session.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cwtail::backend::cloudwatch::CloudWatchLogsClient;
//! use cwtail::retriever::{engine::LogRetriever, events::RetrievalEvent, options::RetrievalOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = CloudWatchLogsClient::connect(None, None).await;
//! let retriever = LogRetriever::new(Arc::new(client));
//!
//! let mut handle = retriever.start_retrieval("/aws/lambda/my-function", RetrievalOptions::default())?;
//! while let Some(event) = handle.next_event().await {
//!     if let RetrievalEvent::Record(record) = event {
//!         print!("{}", record.message);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod helpers;
pub mod instrumentation;
pub mod metrics;
pub mod retriever;
pub mod runtime;
