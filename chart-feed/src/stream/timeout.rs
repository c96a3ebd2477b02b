//! Idle cutoff for frame streams.
//!
//! A dead peer does not always send a close frame. [`TimeoutStream`] ends the
//! frame stream once it has been silent for the configured period, and stays
//! ended, so the connector treats silence like any other drop.

use futures::{ready, Stream, StreamExt};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    idle_limit: Duration,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, idle_limit: Duration) -> Self {
        Self {
            inner,
            idle_limit,
            deadline: Box::pin(tokio::time::sleep(idle_limit)),
            expired: false,
        }
    }

    /// True once the stream ended because of silence
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.expired {
            return Poll::Ready(None);
        }

        if let Poll::Ready(next) = self.inner.poll_next_unpin(cx) {
            if next.is_some() {
                let next_deadline = Instant::now() + self.idle_limit;
                self.deadline.as_mut().reset(next_deadline);
            }
            return Poll::Ready(next);
        }

        ready!(self.deadline.as_mut().poll(cx));
        self.expired = true;
        tracing::warn!(
            idle_secs = self.idle_limit.as_secs(),
            "No frames within the idle limit, ending stream"
        );
        Poll::Ready(None)
    }
}
