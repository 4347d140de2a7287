//! The step loop: frontier advancement, parallel fan-out, merge, routing.
//!
//! One iteration is a *step*: drop `END` from the frontier, check static
//! interrupts, run every frontier node in parallel, triage failures, fold
//! the produced deltas into the state in submission order, route to the
//! next frontier, notify step listeners, check post-step interrupts.
//!
//! Frontier enumeration is insertion-ordered and deduplicated, so merge
//! order is deterministic given deterministic routing. Workflows that need a
//! specific merge order under fan-out should express it through the schema
//! rather than rely on node ordering.

use std::sync::Arc;

use tracing::instrument;

use crate::control::collect_goto_targets;
use crate::event_bus::{Event, EventEmitter};
use crate::graph::Runnable;
use crate::node::{NodeContext, NodeError, NodeOutput};
use crate::runtime::executor::run_node;
use crate::runtime::{CancelToken, GraphInterrupt, RunConfig, RunError};
use crate::types::{is_end, step_label};

#[instrument(skip_all, fields(entry = %runnable.entry_point()))]
pub(crate) async fn run_loop<S>(
    runnable: &Runnable<S>,
    initial: S,
    config: &RunConfig,
    emitter: Arc<dyn EventEmitter<S>>,
) -> Result<S, RunError<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let listeners = runnable.listeners();
    let cancel = config.cancel.clone().unwrap_or_else(CancelToken::new);
    let configurable = Arc::new(config.configurable.clone());

    let mut frontier: Vec<String> = if config.resume_from.is_empty() {
        vec![runnable.entry_point().to_string()]
    } else {
        let mut resumed = Vec::new();
        for name in &config.resume_from {
            if !resumed.contains(name) {
                resumed.push(name.clone());
            }
        }
        resumed
    };
    // A resume value is observable only by the step that re-executes the
    // interrupted node; it is consumed on the first fan-out.
    let mut resume_value = config.resume_value.clone();

    let mut state = initial;
    let mut step: u64 = 0;

    listeners.notify_chain_start(&state).await;
    let _ = emitter.emit(Event::ChainStart {
        entry: frontier.clone(),
    });

    loop {
        frontier.retain(|name| !is_end(name));
        if frontier.is_empty() {
            break;
        }

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        if let Some(node) = frontier
            .iter()
            .find(|name| config.interrupt_before.contains(*name))
        {
            return Err(RunError::Interrupted(GraphInterrupt {
                node: node.clone(),
                state,
                next_nodes: frontier.clone(),
                value: None,
            }));
        }

        step += 1;
        let ran = frontier.clone();
        tracing::debug!(step, frontier = ?ran, "starting step");

        // One task per frontier node; slots collected in submission order.
        let injected = resume_value.take();
        let mut handles = Vec::with_capacity(ran.len());
        for name in &ran {
            let node = runnable
                .node(name)
                .ok_or_else(|| RunError::UnknownNode { name: name.clone() })?;
            let ctx = NodeContext {
                node: name.clone(),
                step,
                emitter: Arc::clone(&emitter),
                listeners: Arc::clone(&listeners),
                configurable: Arc::clone(&configurable),
                resume: injected.clone(),
                cancel: cancel.clone(),
            };
            let task_state = state.clone();
            let retry = runnable.retry_policy().cloned();
            let timeout = config.node_timeout;
            handles.push((
                name.clone(),
                tokio::spawn(run_node(node, task_state, ctx, retry, timeout)),
            ));
        }

        let mut slots: Vec<(String, Result<NodeOutput<S>, NodeError>)> =
            Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                // The executor fences panics per attempt; a panicked join
                // here means the fence itself blew up.
                Err(join) if join.is_panic() => Err(NodeError::Panicked {
                    node: name.clone(),
                    message: "node task aborted".to_string(),
                }),
                Err(join) => return Err(RunError::Join(join)),
            };
            slots.push((name, result));
        }

        // A dynamic interrupt beats a plain error; among several, the first
        // in submission order wins.
        if let Some((name, value)) = slots.iter().find_map(|(name, result)| match result {
            Err(NodeError::Interrupted { value }) => Some((name.clone(), value.clone())),
            _ => None,
        }) {
            return Err(RunError::Interrupted(GraphInterrupt {
                node: name.clone(),
                state,
                next_nodes: vec![name],
                value: Some(value),
            }));
        }

        if let Some(position) = slots.iter().position(|(_, result)| result.is_err()) {
            let (name, result) = slots.swap_remove(position);
            let err = match result {
                Err(err) => err,
                Ok(_) => unreachable!("position found an error slot"),
            };
            if err.is_cancellation() {
                return Err(RunError::Cancelled);
            }
            listeners.notify_chain_error(&err.to_string()).await;
            let _ = emitter.emit(Event::ChainError {
                error: err.to_string(),
            });
            return Err(RunError::Node {
                node: name,
                source: err,
            });
        }

        // Command extraction: updates in submission order, goto targets
        // deduplicated with END filtered out.
        let mut updates: Vec<S> = Vec::with_capacity(slots.len());
        let mut goto_targets: Vec<String> = Vec::new();
        let mut routed_by_command = false;
        for (_, result) in slots {
            match result.expect("error slots already triaged") {
                NodeOutput::Update(delta) => updates.push(delta),
                NodeOutput::Command(command) => {
                    if let Some(delta) = command.update {
                        updates.push(delta);
                    }
                    if !command.goto.is_empty() {
                        routed_by_command = true;
                        collect_goto_targets(&mut goto_targets, &command.goto);
                    }
                }
            }
        }

        for delta in updates {
            state = runnable.reduce(state, delta)?;
        }

        // Routing: a command goto replaces the whole step's routing,
        // including the edges of nodes that returned plain updates.
        let next = if routed_by_command {
            goto_targets
        } else {
            let mut next: Vec<String> = Vec::new();
            for name in &ran {
                if let Some(predicate) = runnable.conditional_edge(name) {
                    let target = predicate(&state);
                    if target.is_empty() {
                        return Err(RunError::EmptyRoute { node: name.clone() });
                    }
                    if !is_end(&target) && !runnable.has_node(&target) {
                        return Err(RunError::UnknownRouteTarget {
                            node: name.clone(),
                            target,
                        });
                    }
                    if !next.contains(&target) {
                        next.push(target);
                    }
                } else {
                    let destinations = runnable.static_edges(name);
                    if destinations.is_empty() {
                        return Err(RunError::MissingRoute { node: name.clone() });
                    }
                    for destination in destinations {
                        if !next.contains(destination) {
                            next.push(destination.clone());
                        }
                    }
                }
            }
            next
        };

        let label = step_label(&ran);
        listeners.notify_step(&label, &state, step, &next).await;
        let _ = emitter.emit(Event::Step {
            label,
            step,
            state: state.clone(),
            next: next.clone(),
        });

        if let Some(node) = ran.iter().find(|name| config.interrupt_after.contains(*name)) {
            return Err(RunError::Interrupted(GraphInterrupt {
                node: node.clone(),
                state,
                next_nodes: next,
                value: None,
            }));
        }

        frontier = next;
    }

    listeners.notify_chain_end(&state).await;
    let _ = emitter.emit(Event::ChainEnd {
        state: state.clone(),
    });
    Ok(state)
}
