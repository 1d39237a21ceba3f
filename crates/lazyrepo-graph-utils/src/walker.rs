use std::{collections::HashMap, hash::Hash};

use futures::{future::join_all, stream::FuturesUnordered, StreamExt};
use petgraph::{
    visit::{IntoNeighborsDirected, IntoNodeIdentifiers},
    Direction,
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::log::trace;

/// Message emitted for each walked node: the node id plus a callback the
/// receiver must fire once it has finished processing the node.
pub type WalkMessage<N> = (N, oneshot::Sender<()>);

pub struct Start;
pub struct Walking;

/// Emits the nodes of a DAG in dependency order: a node is sent only after
/// every node it has an outgoing edge to has been marked done by the caller.
/// The graph must not be mutated once a walker has been constructed.
pub struct Walker<N, S> {
    marker: std::marker::PhantomData<S>,
    cancel: watch::Sender<bool>,
    node_events: Option<mpsc::Receiver<WalkMessage<N>>>,
    join_handles: FuturesUnordered<JoinHandle<()>>,
}

// Petgraph node ids are small copyable integers, so the Copy + Send bounds
// cost nothing in practice.
impl<N: Eq + Hash + Copy + Send + 'static> Walker<N, Start> {
    pub fn new<G: IntoNodeIdentifiers<NodeId = N> + IntoNeighborsDirected>(graph: G) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);

        // Every node gets a single-shot broadcast channel that it fires once
        // it completes; dependents hold resubscribed receivers.
        let mut finished_txs = HashMap::new();
        let mut finished_rxs = HashMap::new();
        for node in graph.node_identifiers() {
            let (tx, rx) = broadcast::channel::<()>(1);
            finished_txs.insert(node, tx);
            finished_rxs.insert(node, rx);
        }

        // At most one message per node is ever emitted, so a buffer the size
        // of the node count means sends never block. Capacity must be >= 1.
        let (node_tx, node_rx) = mpsc::channel(std::cmp::max(finished_txs.len(), 1));
        let join_handles = FuturesUnordered::new();

        for node in graph.node_identifiers() {
            let finished_tx = finished_txs
                .remove(&node)
                .expect("should have sender for all nodes");
            let mut cancel_rx = cancel_rx.clone();
            let node_tx = node_tx.clone();
            let mut dep_rxs = graph
                .neighbors_directed(node, Direction::Outgoing)
                .map(|dep| {
                    finished_rxs
                        .get(&dep)
                        .expect("graph should have all nodes")
                        .resubscribe()
                })
                .collect::<Vec<_>>();

            join_handles.push(tokio::spawn(async move {
                let deps_finished = join_all(dep_rxs.iter_mut().map(|rx| rx.recv()));

                tokio::select! {
                    // When a cancel races dependency completion, take the
                    // cancel rather than emitting one more node.
                    biased;
                    _ = cancel_rx.changed() => {
                        // Either cancel() was called or the walker was
                        // dropped; both mean this node should not run.
                    }
                    results = deps_finished => {
                        for result in results {
                            if let Err(broadcast::error::RecvError::Closed) = result {
                                // A dependency task exited without reporting
                                // completion; treat it as a cancel.
                                return;
                            }
                        }

                        let (done_tx, done_rx) = oneshot::channel::<()>();
                        if node_tx.send((node, done_tx)).await.is_err() {
                            trace!("receiver dropped before the walk finished, treating as cancel");
                            return;
                        }
                        if done_rx.await.is_err() {
                            trace!("done callback dropped without a signal, assuming node finished");
                        }
                        // Failure to send just means this node has no dependents.
                        finished_tx.send(()).ok();
                    }
                }
            }));
        }

        debug_assert!(finished_txs.is_empty(), "every sender belongs to a node task");

        Self {
            marker: std::marker::PhantomData,
            cancel,
            node_events: Some(node_rx),
            join_handles,
        }
    }

    /// Starts the walk, returning the receiving end of the node stream.
    /// The caller must fire each node's callback to unblock its dependents.
    pub fn walk(self) -> (Walker<N, Walking>, mpsc::Receiver<WalkMessage<N>>) {
        let Self {
            cancel,
            mut node_events,
            join_handles,
            ..
        } = self;
        let node_events = node_events
            .take()
            .expect("walking graph with walker that has already been used");

        (
            Walker {
                marker: std::marker::PhantomData,
                cancel,
                node_events: None,
                join_handles,
            },
            node_events,
        )
    }
}

impl<N> Walker<N, Walking> {
    /// Stops emitting new nodes. Nodes already queued may still be received.
    pub fn cancel(&mut self) -> Result<(), watch::error::SendError<bool>> {
        self.cancel.send(true)
    }

    /// Waits for every node task to wind down, typically after a cancel.
    pub async fn wait(self) -> Result<(), tokio::task::JoinError> {
        let Self {
            mut join_handles, ..
        } = self;
        while let Some(result) = join_handles.next().await {
            result?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use petgraph::Graph;

    use super::*;

    #[tokio::test]
    async fn test_emits_dependencies_first() {
        // a -> b -> c
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.add_edge(a, b, ());
        g.add_edge(b, c, ());

        let (walker, mut node_emitter) = Walker::new(&g).walk();
        let mut visited = Vec::new();
        while let Some((index, done)) = node_emitter.recv().await {
            visited.push(index);
            done.send(()).unwrap();
        }
        walker.wait().await.unwrap();
        assert_eq!(visited, vec![c, b, a]);
    }

    #[tokio::test]
    async fn test_cancel_stops_emission() {
        // a -> b -> c
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.add_edge(a, b, ());
        g.add_edge(b, c, ());

        let (mut walker, mut node_emitter) = Walker::new(&g).walk();
        let mut visited = Vec::new();
        while let Some((index, done)) = node_emitter.recv().await {
            walker.cancel().unwrap();
            visited.push(index);
            done.send(()).unwrap();
        }
        assert_eq!(visited, vec![c]);

        // Give the node tasks a chance to observe the cancel.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let Walker { join_handles, .. } = walker;
        for join_handle in join_handles {
            assert!(join_handle.is_finished());
        }
    }

    #[tokio::test]
    async fn test_siblings_do_not_block_each_other() {
        // a depends on b and d; b on c, d on e
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        let d = g.add_node("d");
        let e = g.add_node("e");
        g.add_edge(a, b, ());
        g.add_edge(a, d, ());
        g.add_edge(b, c, ());
        g.add_edge(d, e, ());

        let (walker, mut node_emitter) = Walker::new(&g).walk();
        let mut pending = Vec::new();
        let mut visited = Vec::new();
        // Hold every callback until the stream ends; a can never be emitted
        // because its dependencies are never marked done.
        let mut received_both_leaves = false;
        while let Some((index, done)) = node_emitter.recv().await {
            visited.push(index);
            pending.push(done);
            if visited.len() == 2 {
                received_both_leaves = true;
                break;
            }
        }
        assert!(received_both_leaves);
        assert!(visited.contains(&c));
        assert!(visited.contains(&e));

        // Release everything so the walk can finish.
        for done in pending.drain(..) {
            done.send(()).unwrap();
        }
        while let Some((index, done)) = node_emitter.recv().await {
            visited.push(index);
            done.send(()).unwrap();
        }
        walker.wait().await.unwrap();
        assert_eq!(visited.last(), Some(&a));
    }
}
