//! Breaking cycles in a [`DirectedGraph`].
//!
//! [`DirectedGraph::find_approx_minimum_fas`] is the GR heuristic of Eades,
//! Lin and Smyth ("A fast and effective heuristic for the feedback arc set
//! problem", IPL 47, 1993). It orders the vertices so that few edges point
//! backwards; those edges form an approximate minimum feedback arc set.
//!
//! [`DirectedGraph::remove_cyclic_dependencies`] uses it to make a graph
//! acyclic while removing as few edges as it cheaply can.

use std::collections::VecDeque;

use crate::algs::directed_graph::{DirectedGraph, GraphVertex};

fn first_where(g: &DirectedGraph<()>, pred: impl Fn(&GraphVertex<()>) -> bool) -> Option<usize> {
    g.vertices().find(|v| pred(v)).map(|v| v.id())
}

impl<P> DirectedGraph<P> {
    /// Vertex sequence of the GR heuristic over the valid vertices.
    ///
    /// Works on a copy of the adjacency; `self` is untouched.
    pub fn find_approx_minimum_fas(&self) -> Vec<usize> {
        let mut work: DirectedGraph<()> = DirectedGraph::new();
        for _ in 0..self.len() {
            work.add_vertex(());
        }
        for v in self.vertices() {
            for w in v.downstream() {
                let weight = v.downstream_weight(w).unwrap_or_default();
                work.add_weighted_edge(v.id(), w, weight);
            }
        }
        for id in 0..self.len() {
            if self.vertex(id).is_none() {
                work.remove_vertex(id);
            }
        }

        let mut s1 = Vec::with_capacity(work.num_valid());
        let mut s2 = VecDeque::new();
        while !work.is_empty() {
            while let Some(u) = first_where(&work, |v| v.out_degree() == 0) {
                work.remove_vertex(u);
                s2.push_front(u);
            }
            while let Some(u) = first_where(&work, |v| v.in_degree() == 0) {
                work.remove_vertex(u);
                s1.push(u);
            }
            let mut best: Option<(usize, f64)> = None;
            for v in work.vertices() {
                let delta = v.weight_delta();
                if best.is_none_or(|(_, d)| delta > d) {
                    best = Some((v.id(), delta));
                }
            }
            if let Some((u, _)) = best {
                work.remove_vertex(u);
                s1.push(u);
            }
        }
        s1.extend(s2);
        s1
    }

    /// Remove edges until the graph is acyclic.
    ///
    /// Self-loops go first, since Tarjan does not report them. Two-vertex
    /// components lose the edge from their first to their last listed
    /// vertex, three-vertex components their first internal edge.
    /// Larger components are ordered with [`Self::find_approx_minimum_fas`]
    /// and lose every edge pointing backwards in that order. Returns the
    /// removed edges in removal order.
    pub fn remove_cyclic_dependencies(&mut self) -> Vec<(usize, usize)> {
        let mut removed: Vec<(usize, usize)> = self
            .vertices()
            .filter(|v| v.downstream_weight(v.id()).is_some())
            .map(|v| (v.id(), v.id()))
            .collect();
        for &(u, v) in &removed {
            self.remove_edge(u, v);
        }
        if !removed.is_empty() {
            log::debug!("removed {} self-loops", removed.len());
        }

        let mut sccs = self.find_strongly_connected_components();
        let mut pass = 0usize;
        while !sccs.is_empty() {
            pass += 1;
            log::debug!(
                "cyclic dependency removal pass {pass}: {} components",
                sccs.len()
            );
            for component in &sccs {
                match component.len() {
                    2 => {
                        let (u, v) = (component[0], component[1]);
                        if self.remove_edge(u, v) {
                            removed.push((u, v));
                        }
                    }
                    3 => {
                        let edge = component.iter().find_map(|&u| {
                            self.vertices[u]
                                .downstream()
                                .find(|v| component.contains(v))
                                .map(|v| (u, v))
                        });
                        if let Some((u, v)) = edge {
                            self.remove_edge(u, v);
                            removed.push((u, v));
                        }
                    }
                    _ => {
                        for (u, v) in self.backward_edges(component) {
                            self.remove_edge(u, v);
                            removed.push((u, v));
                        }
                    }
                }
            }
            sccs = self.find_strongly_connected_components();
        }
        removed
    }

    /// Edges of the subgraph induced by `component` that point backwards in
    /// its approximate minimum FAS order, in original ids.
    fn backward_edges(&self, component: &[usize]) -> Vec<(usize, usize)> {
        let mut sub: DirectedGraph<usize> = DirectedGraph::new();
        for &u in component {
            sub.add_vertex(u);
        }
        for (su, &u) in component.iter().enumerate() {
            for v in self.vertices[u].downstream() {
                if let Some(sv) = component.iter().position(|&c| c == v) {
                    let weight = self.vertices[u].downstream_weight(v).unwrap_or_default();
                    sub.add_weighted_edge(su, sv, weight);
                }
            }
        }

        let sequence = sub.find_approx_minimum_fas();
        let mut position = vec![0usize; sequence.len()];
        for (k, &u) in sequence.iter().enumerate() {
            position[u] = k;
        }

        let mut edges = Vec::new();
        for su in sub.vertices() {
            for sv in su.downstream() {
                if position[sv] < position[su.id()] {
                    edges.push((su.payload, sub.vertices[sv].payload));
                }
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize, edges: &[(usize, usize)]) -> DirectedGraph {
        let mut g = DirectedGraph::new();
        for _ in 0..n {
            g.add_vertex(());
        }
        for &(a, b) in edges {
            g.add_edge(a, b);
        }
        g
    }

    fn backward(g: &DirectedGraph, seq: &[usize]) -> usize {
        let mut pos = vec![0; g.len()];
        for (k, &u) in seq.iter().enumerate() {
            pos[u] = k;
        }
        g.vertices()
            .flat_map(|v| v.downstream().map(move |w| (v.id(), w)))
            .filter(|&(u, w)| pos[w] < pos[u])
            .count()
    }

    #[test]
    fn fas_sequence_of_a_dag_has_no_backward_edge() {
        let g = graph(4, &[(0, 1), (1, 2), (0, 3), (3, 2)]);
        let seq = g.find_approx_minimum_fas();
        assert_eq!(seq.len(), 4);
        assert_eq!(backward(&g, &seq), 0);
    }

    #[test]
    fn fas_of_a_simple_cycle_is_one_edge() {
        let g = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let seq = g.find_approx_minimum_fas();
        let mut sorted = seq.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        assert_eq!(backward(&g, &seq), 1);
    }

    #[test]
    fn fas_skips_removed_vertices() {
        let mut g = graph(3, &[(0, 1), (1, 2)]);
        g.remove_vertex(1);
        let seq = g.find_approx_minimum_fas();
        assert!(!seq.contains(&1));
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn two_cycle_loses_one_edge() {
        let mut g = graph(2, &[(0, 1), (1, 0)]);
        let removed = g.remove_cyclic_dependencies();
        assert_eq!(removed.len(), 1);
        assert_eq!(g.generate_topological_sort().len(), 2);
    }

    #[test]
    fn triangle_loses_one_edge() {
        let mut g = graph(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let removed = g.remove_cyclic_dependencies();
        assert_eq!(removed.len(), 1);
        assert!(g.find_strongly_connected_components().is_empty());
        assert!(g.has_edge(2, 3));
    }

    #[test]
    fn self_loops_are_removed() {
        let mut g = graph(3, &[(0, 1), (1, 1), (1, 2), (2, 2)]);
        let removed = g.remove_cyclic_dependencies();
        assert_eq!(removed, vec![(1, 1), (2, 2)]);
        assert_eq!(g.generate_topological_sort(), vec![0, 1, 2]);
        assert!(g.has_edge(0, 1) && g.has_edge(1, 2));
    }

    #[test]
    fn large_component_becomes_acyclic() {
        let mut g = graph(
            6,
            &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (2, 0), (4, 1)],
        );
        let removed = g.remove_cyclic_dependencies();
        assert!(!removed.is_empty());
        assert!(g.find_strongly_connected_components().is_empty());
        assert_eq!(g.generate_topological_sort().len(), 6);
        for (u, v) in removed {
            assert!(!g.has_edge(u, v));
        }
    }
}
