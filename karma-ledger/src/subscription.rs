//! Domain event subscription.
//!
//! Committed events are fanned out over a broadcast channel. A subscriber
//! that falls behind by more than the channel capacity skips the missed
//! events and keeps receiving; the number skipped is kept on the stream.

use futures::Stream;
use karma_core::{DomainEvent, Timestamp};
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// A domain event together with the commit that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedEvent {
    /// Commit sequence of the write that emitted the event
    pub sequence: u64,
    /// Envelope timestamp of that write
    pub timestamp: Timestamp,
    pub event: DomainEvent,
}

pin_project! {
    /// Stream of committed events for one subscriber.
    pub struct EventStream {
        #[pin]
        inner: BroadcastStream<CommittedEvent>,
        // Events dropped because this subscriber lagged
        lagged: u64,
    }
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<CommittedEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            lagged: 0,
        }
    }

    /// Total events skipped so far.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}

impl Stream for EventStream {
    type Item = CommittedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    *this.lagged += skipped;
                    warn!(skipped, "Event subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
