//! # Async bridge.
//!
//! [`FlowStream`] adapts a flow to [`futures::Stream`] so a chain can be
//! consumed with `while let Some(item) = stream.next().await` inside a
//! tokio task instead of through callbacks.
//!
//! ## Rules
//! - Values surface as `Ok`, a failure as one final `Err`.
//! - A finish ends the stream with `None`; nothing follows a terminal.
//! - Dropping the stream cancels the underlying subscription.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::core::{Completion, Flow, Subscription};
use crate::ops::Signal;

/// A subscribed flow viewed as an async stream of `Result<T, E>`.
pub struct FlowStream<T, E> {
    rx: mpsc::UnboundedReceiver<Signal<T, E>>,
    subscription: Subscription,
    done: bool,
}

impl<T, E> Stream for FlowStream<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Signal::Value(v))) => Poll::Ready(Some(Ok(v))),
            Poll::Ready(Some(Signal::Terminal(Completion::Failed(e)))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Some(Signal::Terminal(Completion::Finished))) | Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
        }
    }
}

impl<T, E> Drop for FlowStream<T, E> {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Subscribes and exposes the signals as a [`futures::Stream`].
    pub fn into_stream(&self) -> FlowStream<T, E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let value_tx = tx.clone();
        let subscription = self.subscribe(
            move |v| {
                let _ = value_tx.send(Signal::Value(v));
            },
            move |c| {
                let _ = tx.send(Signal::Terminal(c));
            },
        );
        FlowStream {
            rx,
            subscription,
            done: false,
        }
    }
}
