//! Single-node execution: panic isolation, retry, timeout, notifications.
//!
//! The step loop spawns one task per frontier node; each task runs this
//! executor. Node bodies are user-written, so every attempt is fenced with
//! `catch_unwind`: a panic becomes an error naming the node and never
//! unwinds the host. Retry sleeps honor cancellation; interrupts and
//! cancellations are never retried.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use crate::event_bus::Event;
use crate::node::{Node, NodeContext, NodeError, NodeOutput};
use crate::runtime::RetryPolicy;

pub(crate) async fn run_node<S>(
    node: Arc<dyn Node<S>>,
    state: S,
    ctx: NodeContext<S>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
) -> Result<NodeOutput<S>, NodeError>
where
    S: Clone + Send + Sync + 'static,
{
    let name = ctx.node().to_string();
    let step = ctx.step();

    ctx.listeners.notify_node_start(&name, step).await;
    let _ = ctx.emitter.emit(Event::NodeStart {
        node: name.clone(),
        step,
    });

    let mut attempt: u32 = 0;
    let result = loop {
        match run_attempt(&node, state.clone(), ctx.clone(), timeout, &name).await {
            Ok(output) => break Ok(output),
            Err(err) if err.is_interrupt() || err.is_cancellation() => break Err(err),
            Err(err) => {
                let retry_after = retry.as_ref().and_then(|policy| {
                    (attempt < policy.max_retries && policy.is_retryable(&err))
                        .then(|| policy.delay(attempt))
                });
                let Some(delay) = retry_after else {
                    break Err(err);
                };
                tracing::debug!(
                    node = %name,
                    step,
                    attempt,
                    ?delay,
                    error = %err,
                    "retrying node after backoff"
                );
                attempt += 1;
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = ctx.cancelled() => break Err(NodeError::Cancelled),
                }
            }
        }
    };

    match &result {
        Ok(_) => {
            ctx.listeners.notify_node_complete(&name, step).await;
            let _ = ctx.emitter.emit(Event::NodeComplete {
                node: name.clone(),
                step,
            });
        }
        // An interrupt pauses the run; it is not a node failure.
        Err(err) if err.is_interrupt() => {}
        Err(err) => {
            let rendered = err.to_string();
            ctx.listeners.notify_node_error(&name, step, &rendered).await;
            let _ = ctx.emitter.emit(Event::NodeError {
                node: name.clone(),
                step,
                error: rendered,
            });
        }
    }

    result
}

async fn run_attempt<S>(
    node: &Arc<dyn Node<S>>,
    state: S,
    ctx: NodeContext<S>,
    timeout: Option<Duration>,
    name: &str,
) -> Result<NodeOutput<S>, NodeError>
where
    S: Clone + Send + Sync + 'static,
{
    let fenced = AssertUnwindSafe(node.run(state, ctx)).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fenced).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(NodeError::Timeout {
                    node: name.to_string(),
                    after: limit,
                });
            }
        },
        None => fenced.await,
    };
    match outcome {
        Ok(result) => result,
        Err(payload) => Err(NodeError::Panicked {
            node: name.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
