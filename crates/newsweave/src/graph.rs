//! Stateful graph execution with conditional routing.
//!
//! A [`StateGraph`] is a set of named async nodes plus edges. Each node
//! receives the current state and returns the updated state; edges are
//! either direct or conditional (a router function over the state picks the
//! next node). [`StateGraph::compile`] validates the wiring and returns a
//! [`CompiledGraph`] whose [`invoke`](CompiledGraph::invoke) runs nodes in
//! topological order until [`END`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Terminal pseudo-node name.
pub const END: &str = "__end__";

/// Safety valve against routing cycles.
const MAX_ITERATIONS: usize = 100;

/// State types that can be combined. Sequential execution replaces the
/// state with each node's output; `merge` defines how a partial update
/// folds into an existing state (append-only lists append, counters add,
/// scalars take the newer value).
pub trait MergeableState: Clone + Send + Sync + 'static {
    fn merge(&mut self, other: &Self);
}

/// The boxed future every node returns.
pub type NodeFuture<S> = Pin<Box<dyn Future<Output = Result<S>> + Send>>;

type NodeFn<S> = Arc<dyn Fn(S) -> NodeFuture<S> + Send + Sync>;
type RouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

enum Edge<S> {
    Direct(String),
    Conditional {
        router: RouterFn<S>,
        routes: HashMap<String, String>,
    },
}

/// A graph under construction.
pub struct StateGraph<S> {
    nodes: HashMap<String, NodeFn<S>>,
    edges: HashMap<String, Edge<S>>,
    entry_point: Option<String>,
}

impl<S: MergeableState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MergeableState> StateGraph<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry_point: None,
        }
    }

    /// Register a node from an async closure.
    pub fn add_node_from_fn(
        &mut self,
        name: &str,
        node: impl Fn(S) -> NodeFuture<S> + Send + Sync + 'static,
    ) -> &mut Self {
        self.nodes.insert(name.to_string(), Arc::new(node));
        self
    }

    /// Add an unconditional edge. `to` may be [`END`].
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges
            .insert(from.to_string(), Edge::Direct(to.to_string()));
        self
    }

    /// Add a conditional edge: after `from` runs, `router` maps the state
    /// to a key, and `routes` maps that key to the next node.
    pub fn add_conditional_edges(
        &mut self,
        from: &str,
        router: impl Fn(&S) -> String + Send + Sync + 'static,
        routes: HashMap<String, String>,
    ) -> &mut Self {
        self.edges.insert(
            from.to_string(),
            Edge::Conditional {
                router: Arc::new(router),
                routes,
            },
        );
        self
    }

    pub fn set_entry_point(&mut self, name: &str) -> &mut Self {
        self.entry_point = Some(name.to_string());
        self
    }

    fn validate_target(&self, from: &str, target: &str) -> Result<()> {
        if target != END && !self.nodes.contains_key(target) {
            return Err(Error::graph(format!(
                "edge from '{from}' targets unknown node '{target}'"
            )));
        }
        Ok(())
    }

    /// Validate the wiring and produce an executable graph.
    pub fn compile(self) -> Result<CompiledGraph<S>> {
        let entry_point = self
            .entry_point
            .clone()
            .ok_or_else(|| Error::graph("no entry point set"))?;
        if !self.nodes.contains_key(&entry_point) {
            return Err(Error::graph(format!(
                "entry point '{entry_point}' is not a registered node"
            )));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(Error::graph(format!(
                    "edge starts at unknown node '{from}'"
                )));
            }
            match edge {
                Edge::Direct(to) => self.validate_target(from, to)?,
                Edge::Conditional { routes, .. } => {
                    for target in routes.values() {
                        self.validate_target(from, target)?;
                    }
                }
            }
        }

        for name in self.nodes.keys() {
            if !self.edges.contains_key(name) {
                return Err(Error::graph(format!(
                    "node '{name}' has no outgoing edge (add an edge to END to terminate)"
                )));
            }
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry_point,
        })
    }
}

/// Outcome of a graph run.
#[derive(Debug)]
pub struct ExecutionResult<S> {
    pub final_state: S,
    /// Node names in execution order.
    pub nodes_executed: Vec<String>,
}

/// A validated, executable graph.
pub struct CompiledGraph<S> {
    nodes: HashMap<String, NodeFn<S>>,
    edges: HashMap<String, Edge<S>>,
    entry_point: String,
}

impl<S> std::fmt::Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

impl<S: MergeableState> CompiledGraph<S> {
    /// Run the graph from the entry point until [`END`].
    pub async fn invoke(&self, state: S) -> Result<ExecutionResult<S>> {
        let mut current = self.entry_point.clone();
        let mut state = state;
        let mut nodes_executed = Vec::new();

        while current != END {
            if nodes_executed.len() >= MAX_ITERATIONS {
                return Err(Error::graph(format!(
                    "iteration limit ({MAX_ITERATIONS}) exceeded at node '{current}'"
                )));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| Error::graph(format!("node '{current}' disappeared")))?;
            state = (node.as_ref())(state).await?;
            nodes_executed.push(current.clone());

            current = match self.edges.get(&current) {
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional { router, routes }) => {
                    let key = (router.as_ref())(&state);
                    routes.get(&key).cloned().ok_or_else(|| {
                        Error::graph(format!(
                            "router at '{current}' returned unmapped key '{key}'"
                        ))
                    })?
                }
                None => {
                    return Err(Error::graph(format!("node '{current}' has no edge")));
                }
            };
        }

        Ok(ExecutionResult {
            final_state: state,
            nodes_executed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct TestState {
        visited: Vec<String>,
        value: i32,
    }

    impl MergeableState for TestState {
        fn merge(&mut self, other: &Self) {
            self.visited.extend(other.visited.clone());
            self.value += other.value;
        }
    }

    fn visit(name: &'static str) -> impl Fn(TestState) -> NodeFuture<TestState> {
        move |mut state: TestState| {
            Box::pin(async move {
                state.visited.push(name.to_string());
                Ok(state)
            })
        }
    }

    #[tokio::test]
    async fn test_linear_graph_runs_in_order() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph
            .add_node_from_fn("a", visit("a"))
            .add_node_from_fn("b", visit("b"))
            .add_node_from_fn("c", visit("c"))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .add_edge("c", END)
            .set_entry_point("a");

        let result = graph.compile().unwrap().invoke(TestState::default()).await.unwrap();
        assert_eq!(result.final_state.visited, vec!["a", "b", "c"]);
        assert_eq!(result.nodes_executed, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_conditional_routing_picks_branch() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        let routes: HashMap<String, String> = [
            ("low".to_string(), "low_node".to_string()),
            ("high".to_string(), "high_node".to_string()),
        ]
        .into_iter()
        .collect();

        graph
            .add_node_from_fn("start", visit("start"))
            .add_node_from_fn("low_node", visit("low"))
            .add_node_from_fn("high_node", visit("high"))
            .add_conditional_edges(
                "start",
                |state: &TestState| {
                    if state.value < 10 {
                        "low".to_string()
                    } else {
                        "high".to_string()
                    }
                },
                routes,
            )
            .add_edge("low_node", END)
            .add_edge("high_node", END)
            .set_entry_point("start");

        let app = graph.compile().unwrap();

        let low = app
            .invoke(TestState {
                value: 3,
                ..TestState::default()
            })
            .await
            .unwrap();
        assert_eq!(low.final_state.visited, vec!["start", "low"]);

        let high = app
            .invoke(TestState {
                value: 42,
                ..TestState::default()
            })
            .await
            .unwrap();
        assert_eq!(high.final_state.visited, vec!["start", "high"]);
    }

    #[tokio::test]
    async fn test_node_error_propagates() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph
            .add_node_from_fn("boom", |_state: TestState| {
                Box::pin(async { Err(Error::graph("node failed")) })
            })
            .add_edge("boom", END)
            .set_entry_point("boom");

        let err = graph
            .compile()
            .unwrap()
            .invoke(TestState::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("node failed"));
    }

    #[test]
    fn test_compile_requires_entry_point() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph.add_node_from_fn("a", visit("a")).add_edge("a", END);
        let err = graph.compile().unwrap_err();
        assert!(err.to_string().contains("entry point"));
    }

    #[test]
    fn test_compile_rejects_unknown_edge_target() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph
            .add_node_from_fn("a", visit("a"))
            .add_edge("a", "missing")
            .set_entry_point("a");
        let err = graph.compile().unwrap_err();
        assert!(err.to_string().contains("unknown node 'missing'"));
    }

    #[test]
    fn test_compile_rejects_dangling_node() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph
            .add_node_from_fn("a", visit("a"))
            .set_entry_point("a");
        let err = graph.compile().unwrap_err();
        assert!(err.to_string().contains("no outgoing edge"));
    }

    #[tokio::test]
    async fn test_unmapped_router_key_is_an_error() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph
            .add_node_from_fn("a", visit("a"))
            .add_conditional_edges(
                "a",
                |_: &TestState| "nowhere".to_string(),
                HashMap::from([("somewhere".to_string(), END.to_string())]),
            )
            .set_entry_point("a");

        let err = graph
            .compile()
            .unwrap()
            .invoke(TestState::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unmapped key"));
    }

    #[tokio::test]
    async fn test_cycle_hits_iteration_limit() {
        let mut graph: StateGraph<TestState> = StateGraph::new();
        graph
            .add_node_from_fn("a", visit("a"))
            .add_node_from_fn("b", visit("b"))
            .add_edge("a", "b")
            .add_edge("b", "a")
            .set_entry_point("a");

        let err = graph
            .compile()
            .unwrap()
            .invoke(TestState::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("iteration limit"));
    }

    #[test]
    fn test_merge_appends_and_sums() {
        let mut left = TestState {
            visited: vec!["a".to_string()],
            value: 1,
        };
        let right = TestState {
            visited: vec!["b".to_string()],
            value: 2,
        };
        left.merge(&right);
        assert_eq!(left.visited, vec!["a", "b"]);
        assert_eq!(left.value, 3);
    }
}
