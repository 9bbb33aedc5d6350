//! Minimal directed graph used to order dependent work.
//!
//! Vertices get dense ids in insertion order and are never renumbered, even
//! after [`DirectedGraph::remove_vertex`]. Adjacency is kept in ordered maps,
//! so every traversal visits neighbours in ascending id order and is
//! deterministic. The payload `P` is carried along and never inspected.
//!
//! Cycle handling (approximate minimum feedback arc set and iterative
//! cyclic-dependency removal) lives in [`crate::algs::feedback_arc_set`].

use itertools::Itertools;
use std::collections::BTreeMap;

/// Weight given to edges added with [`DirectedGraph::add_edge`].
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;

const UNVISITED: usize = usize::MAX;

#[derive(Clone, Debug, PartialEq)]
pub struct GraphVertex<P> {
    id: usize,
    pub payload: P,
    downstream: BTreeMap<usize, f64>,
    upstream: BTreeMap<usize, f64>,
    valid: bool,
}

impl<P> GraphVertex<P> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Targets of outgoing edges, ascending.
    pub fn downstream(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.downstream.keys().copied()
    }

    /// Sources of incoming edges, ascending.
    pub fn upstream(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.upstream.keys().copied()
    }

    pub fn downstream_weight(&self, to: usize) -> Option<f64> {
        self.downstream.get(&to).copied()
    }

    pub fn out_degree(&self) -> usize {
        self.downstream.len()
    }

    pub fn in_degree(&self) -> usize {
        self.upstream.len()
    }

    /// Σ outgoing weights − Σ incoming weights.
    pub(crate) fn weight_delta(&self) -> f64 {
        self.downstream.values().sum::<f64>() - self.upstream.values().sum::<f64>()
    }
}

#[derive(Clone, Debug)]
pub struct DirectedGraph<P = ()> {
    pub(crate) vertices: Vec<GraphVertex<P>>,
    num_valid: usize,
}

impl<P> Default for DirectedGraph<P> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            num_valid: 0,
        }
    }
}

impl<P> DirectedGraph<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its id (0, 1, 2, ... in insertion order).
    pub fn add_vertex(&mut self, payload: P) -> usize {
        let id = self.vertices.len();
        self.vertices.push(GraphVertex {
            id,
            payload,
            downstream: BTreeMap::new(),
            upstream: BTreeMap::new(),
            valid: true,
        });
        self.num_valid += 1;
        id
    }

    /// Number of ids ever handed out, removed vertices included.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Number of vertices that have not been removed.
    pub fn num_valid(&self) -> usize {
        self.num_valid
    }

    pub fn is_empty(&self) -> bool {
        self.num_valid == 0
    }

    /// The vertex with this id, unless it is out of range or removed.
    pub fn vertex(&self, id: usize) -> Option<&GraphVertex<P>> {
        self.vertices.get(id).filter(|v| v.valid)
    }

    pub fn vertex_mut(&mut self, id: usize) -> Option<&mut GraphVertex<P>> {
        self.vertices.get_mut(id).filter(|v| v.valid)
    }

    /// Valid vertices in id order.
    pub fn vertices(&self) -> impl Iterator<Item = &GraphVertex<P>> + '_ {
        self.vertices.iter().filter(|v| v.valid)
    }

    fn assert_valid(&self, id: usize, op: &str) {
        assert!(
            self.vertices.get(id).is_some_and(|v| v.valid),
            "{op}: vertex {id} does not exist (graph has {} ids)",
            self.vertices.len()
        );
    }

    /// Add the edge `from → to` with the default weight.
    ///
    /// # Panics
    /// If either endpoint is out of range or removed.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.add_weighted_edge(from, to, DEFAULT_EDGE_WEIGHT);
    }

    /// Add (or re-weight) the edge `from → to`.
    ///
    /// # Panics
    /// If either endpoint is out of range or removed.
    pub fn add_weighted_edge(&mut self, from: usize, to: usize, weight: f64) {
        self.assert_valid(from, "add_edge");
        self.assert_valid(to, "add_edge");
        self.vertices[from].downstream.insert(to, weight);
        self.vertices[to].upstream.insert(from, weight);
    }

    /// Remove the edge `from → to`. Returns false if there was no such edge.
    pub fn remove_edge(&mut self, from: usize, to: usize) -> bool {
        let had = self
            .vertices
            .get_mut(from)
            .is_some_and(|v| v.downstream.remove(&to).is_some());
        if had {
            self.vertices[to].upstream.remove(&from);
        }
        had
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.vertices
            .get(from)
            .is_some_and(|v| v.downstream.contains_key(&to))
    }

    /// Detach every edge of `id` and mark it removed. The id is not reused.
    ///
    /// # Panics
    /// If `id` is out of range.
    pub fn remove_vertex(&mut self, id: usize) {
        assert!(
            id < self.vertices.len(),
            "remove_vertex: vertex {id} does not exist"
        );
        if !self.vertices[id].valid {
            return;
        }
        let ds = std::mem::take(&mut self.vertices[id].downstream);
        let us = std::mem::take(&mut self.vertices[id].upstream);
        for &v in ds.keys() {
            self.vertices[v].upstream.remove(&id);
        }
        for &u in us.keys() {
            self.vertices[u].downstream.remove(&id);
        }
        self.vertices[id].valid = false;
        self.num_valid -= 1;
    }

    /// Valid vertices without incoming edges.
    pub fn num_sources(&self) -> usize {
        self.vertices().filter(|v| v.upstream.is_empty()).count()
    }

    /// Valid vertices without outgoing edges.
    pub fn num_sinks(&self) -> usize {
        self.vertices().filter(|v| v.downstream.is_empty()).count()
    }

    /// Pre-order depth-first traversal from `start` along outgoing edges.
    ///
    /// Each reachable vertex appears once; neighbours are taken in ascending
    /// id order. The graph is not modified, so repeated calls agree.
    ///
    /// # Panics
    /// If `start` is out of range or removed.
    pub fn depth_first_search(&self, start: usize) -> Vec<usize> {
        self.assert_valid(start, "depth_first_search");
        let mut visited = vec![false; self.vertices.len()];
        let mut traversal = Vec::new();
        let mut stack = vec![start];
        while let Some(u) = stack.pop() {
            if std::mem::replace(&mut visited[u], true) {
                continue;
            }
            traversal.push(u);
            // reversed so the smallest neighbour is popped first
            stack.extend(self.vertices[u].downstream().rev().filter(|&v| !visited[v]));
        }
        traversal
    }

    /// Tarjan's algorithm. Components with a single vertex are not reported;
    /// vertices inside a component are listed in stack-pop order.
    pub fn find_strongly_connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.vertices.len();
        let mut disc = vec![UNVISITED; n];
        let mut low = vec![UNVISITED; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut sccs = Vec::new();
        let mut time = 0usize;

        for root in 0..n {
            if disc[root] != UNVISITED || !self.vertices[root].valid {
                continue;
            }
            let mut call = Vec::new();
            disc[root] = time;
            low[root] = time;
            time += 1;
            stack.push(root);
            on_stack[root] = true;
            call.push((root, self.vertices[root].downstream.keys()));

            while let Some((u, children)) = call.last_mut() {
                let u = *u;
                match children.next().copied() {
                    Some(v) if disc[v] == UNVISITED => {
                        disc[v] = time;
                        low[v] = time;
                        time += 1;
                        stack.push(v);
                        on_stack[v] = true;
                        call.push((v, self.vertices[v].downstream.keys()));
                    }
                    Some(v) => {
                        if on_stack[v] {
                            low[u] = low[u].min(disc[v]);
                        }
                    }
                    None => {
                        call.pop();
                        if let Some(&(parent, _)) = call.last() {
                            low[parent] = low[parent].min(low[u]);
                        }
                        if low[u] == disc[u] {
                            let mut component = Vec::new();
                            while let Some(w) = stack.pop() {
                                on_stack[w] = false;
                                component.push(w);
                                if w == u {
                                    break;
                                }
                            }
                            if component.len() > 1 {
                                sccs.push(component);
                            }
                        }
                    }
                }
            }
        }
        sccs
    }

    /// Kahn's algorithm. The ready set is a stack: the most recently freed
    /// vertex is emitted next. Returns an empty vector if the graph has a
    /// cycle.
    pub fn generate_topological_sort(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.vertices.iter().map(|v| v.upstream.len()).collect();
        let mut ready: Vec<usize> = self
            .vertices()
            .filter(|v| v.upstream.is_empty())
            .map(|v| v.id)
            .collect();
        let mut order = Vec::with_capacity(self.num_valid);
        while let Some(n) = ready.pop() {
            order.push(n);
            for m in self.vertices[n].downstream() {
                in_degree[m] -= 1;
                if in_degree[m] == 0 {
                    ready.push(m);
                }
            }
        }
        if order.len() != self.num_valid {
            log::debug!(
                "topological sort stopped after {} of {} vertices: graph has a cycle",
                order.len(),
                self.num_valid
            );
            return Vec::new();
        }
        order
    }

    /// The whole graph in Graphviz DOT format.
    pub fn to_graphviz(&self) -> String {
        let ids: Vec<usize> = self.vertices().map(|v| v.id).collect();
        self.render_graphviz(&ids)
    }

    /// The subgraph induced by `ids` in Graphviz DOT format. Unknown or
    /// removed ids are skipped.
    pub fn subgraph_to_graphviz(&self, ids: &[usize]) -> String {
        let ids: Vec<usize> = ids
            .iter()
            .copied()
            .filter(|&v| self.vertex(v).is_some())
            .collect();
        self.render_graphviz(&ids)
    }

    fn render_graphviz(&self, ids: &[usize]) -> String {
        const INDENT: &str = "    ";
        let vertices = ids
            .iter()
            .map(|v| format!("{INDENT}{v} [shape=\"circle\"]\n"))
            .join("");
        let edges = ids
            .iter()
            .flat_map(|&v| {
                self.vertices[v]
                    .downstream()
                    .filter(move |w| ids.contains(w))
                    .map(move |w| format!("{INDENT}{v} -> {w}\n"))
            })
            .join("");
        format!(
            "digraph DG {{\n{INDENT}splines=\"FALSE\";\n{INDENT}rankdir=\"LR\";\n\n\
             {INDENT}/* Vertices */\n{vertices}\n{INDENT}/* Edges */\n{edges}}}\n"
        )
    }
}
