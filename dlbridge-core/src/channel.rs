//! Named channel: answers calls addressed to it, off the caller's task.
//!
//! Engine calls block, so each one runs on tokio's blocking pool. The background
//! queue answers calls independently; a slow call never holds up the ones behind it.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::operation::ErrorCode;
use crate::protocol::{MethodCall, Reply, Response};
use crate::wire::{self, FrameError};

/// Default depth of the background queue and limit on calls running at once.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub struct Channel<E> {
    name: String,
    dispatcher: Arc<Dispatcher<E>>,
}

impl<E: Engine> Channel<E> {
    pub fn new(name: impl Into<String>, engine: E) -> Self {
        Self {
            name: name.into(),
            dispatcher: Arc::new(Dispatcher::new(engine)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dispatcher(&self) -> &Dispatcher<E> {
        &self.dispatcher
    }

    /// Answer one call. Calls for another channel are not implemented here.
    /// Must run inside a tokio runtime.
    pub async fn handle(&self, call: MethodCall) -> Response {
        let id = call.id;
        if call.channel != self.name {
            tracing::debug!(channel = %call.channel, expected = %self.name, "call for unknown channel");
            return Response {
                id,
                reply: Reply::NotImplemented,
            };
        }
        tracing::debug!(id, method = %call.method, "call received");
        let dispatcher = Arc::clone(&self.dispatcher);
        let joined =
            tokio::task::spawn_blocking(move || dispatcher.handle(&call.method, &call.args)).await;
        let reply = joined.unwrap_or_else(|err| {
            tracing::error!(id, error = %err, "dispatch task did not complete");
            Reply::Error {
                code: ErrorCode::Error.as_str().to_string(),
                message: String::from("dispatch task did not complete"),
                details: Some(err.to_string()),
            }
        });
        Response { id, reply }
    }

    /// Decode one request frame, answer it, and encode the response frame.
    pub async fn handle_frame(&self, frame: &[u8]) -> Result<Vec<u8>, FrameError> {
        let (call, _) = wire::decode_call(frame)?;
        let response = self.handle(call).await;
        Ok(wire::encode_response(&response)?)
    }

    /// Start the background queue on the current runtime. At most `capacity` calls run
    /// at once and at most `capacity` more wait in the queue; further submissions wait for
    /// room. The queue runs until every handle is dropped or the runtime shuts down.
    pub fn spawn(self, capacity: usize) -> ChannelHandle {
        let capacity = capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<Job>(capacity);
        let running = Arc::new(Semaphore::new(capacity));
        let channel = Arc::new(self);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = Arc::clone(&running).acquire_owned().await else {
                    break;
                };
                let channel = Arc::clone(&channel);
                tokio::spawn(async move {
                    let response = channel.handle(job.call).await;
                    drop(permit);
                    // Caller may have given up waiting.
                    let _ = job.reply_tx.send(response);
                });
            }
            tracing::debug!(channel = %channel.name, "channel queue closed");
        });
        ChannelHandle { tx }
    }
}

struct Job {
    call: MethodCall,
    reply_tx: oneshot::Sender<Response>,
}

/// Sender side of a running channel queue.
#[derive(Clone)]
pub struct ChannelHandle {
    tx: mpsc::Sender<Job>,
}

/// The channel queue is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("channel queue closed")]
pub struct ChannelClosed;

/// A queued call's response, once it is ready.
pub struct PendingResponse {
    rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    pub async fn wait(self) -> Result<Response, ChannelClosed> {
        self.rx.await.map_err(|_| ChannelClosed)
    }
}

impl ChannelHandle {
    /// Queue a call, waiting while the queue is full. Resolves once the call is queued.
    pub async fn submit(&self, call: MethodCall) -> Result<PendingResponse, ChannelClosed> {
        let (reply_tx, rx) = oneshot::channel();
        self.tx
            .send(Job { call, reply_tx })
            .await
            .map_err(|_| ChannelClosed)?;
        Ok(PendingResponse { rx })
    }

    /// Queue a call and wait for its response.
    pub async fn invoke(&self, call: MethodCall) -> Result<Response, ChannelClosed> {
        self.submit(call).await?.wait().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
