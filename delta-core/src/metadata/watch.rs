use futures::stream::Stream;
use futures::StreamExt;
use std::task::{Context, Poll};
use std::{fmt, pin::Pin};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::errors::{MetadataError, Result};

/// A change observed under a watched prefix. `version` is the store
/// revision at which the change was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Put {
        key: String,
        value: Vec<u8>,
        version: i64,
    },
    Delete {
        key: String,
        version: i64,
    },
}

impl WatchEvent {
    pub fn key(&self) -> &str {
        match self {
            WatchEvent::Put { key, .. } | WatchEvent::Delete { key, .. } => key,
        }
    }
}

pub struct WatchStream {
    inner: Pin<Box<dyn Stream<Item = Result<WatchEvent>> + Send>>,
}

impl Stream for WatchStream {
    type Item = Result<WatchEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl WatchStream {
    pub fn new(stream: impl Stream<Item = Result<WatchEvent>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Only events whose key starts with `prefix` are yielded.
    /// A lagging receiver surfaces `MetadataError::WatchError`; the consumer
    /// is expected to resync from a full read.
    pub fn from_broadcast(rx: broadcast::Receiver<WatchEvent>, prefix: &str) -> Self {
        let prefix = prefix.to_owned();
        let stream = BroadcastStream::new(rx).filter_map(move |result| {
            futures::future::ready(match result {
                Ok(event) if event.key().starts_with(&prefix) => Some(Ok(event)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(n)) => Some(Err(MetadataError::WatchError(
                    format!("watch lagged by {} events", n),
                ))),
            })
        });
        Self::new(stream)
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEvent::Put { key, version, .. } => {
                write!(f, "Put(key: {}, version: {})", key, version)
            }
            WatchEvent::Delete { key, version } => {
                write!(f, "Delete(key: {}, version: {})", key, version)
            }
        }
    }
}
