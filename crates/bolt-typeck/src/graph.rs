//! The reference graph and its strongly connected components.
//!
//! Vertices are `let` declarations; an edge from A to B records that B
//! uses A (so mutually recursive declarations share a component). The
//! components drive generalization ordering: every declaration of a
//! component is forward-declared before any of their bodies is inferred.

use rustc_hash::FxHashMap;

use bolt_parser::cst::NodeId;

/// A directed graph over CST nodes with deterministic iteration order.
#[derive(Default)]
pub struct Graph {
    vertices: Vec<NodeId>,
    vertex_set: FxHashMap<NodeId, usize>,
    edges: FxHashMap<NodeId, Vec<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, v: NodeId) {
        if !self.vertex_set.contains_key(&v) {
            self.vertex_set.insert(v, self.vertices.len());
            self.vertices.push(v);
        }
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.add_vertex(from);
        self.add_vertex(to);
        self.edges.entry(from).or_default().push(to);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn targets(&self, from: NodeId) -> &[NodeId] {
        self.edges.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tarjan's algorithm. Components come out with every component after
    /// all components it has edges into, and the walk order is the vertex
    /// insertion order, so the result is deterministic for a fixed input.
    pub fn strong_connect(&self) -> Vec<Vec<NodeId>> {
        struct State<'g> {
            graph: &'g Graph,
            index: usize,
            indices: FxHashMap<NodeId, usize>,
            low_links: FxHashMap<NodeId, usize>,
            on_stack: FxHashMap<NodeId, bool>,
            stack: Vec<NodeId>,
            sccs: Vec<Vec<NodeId>>,
        }

        impl State<'_> {
            fn visit(&mut self, v: NodeId) {
                self.indices.insert(v, self.index);
                self.low_links.insert(v, self.index);
                self.index += 1;
                self.stack.push(v);
                self.on_stack.insert(v, true);

                let targets: Vec<NodeId> = self.graph.targets(v).to_vec();
                for w in targets {
                    if !self.indices.contains_key(&w) {
                        self.visit(w);
                        let low = self.low_links[&v].min(self.low_links[&w]);
                        self.low_links.insert(v, low);
                    } else if self.on_stack.get(&w).copied().unwrap_or(false) {
                        let low = self.low_links[&v].min(self.indices[&w]);
                        self.low_links.insert(v, low);
                    }
                }

                if self.low_links[&v] == self.indices[&v] {
                    let mut scc = Vec::new();
                    loop {
                        let w = self.stack.pop().expect("stack holds the component");
                        self.on_stack.insert(w, false);
                        scc.push(w);
                        if w == v {
                            break;
                        }
                    }
                    self.sccs.push(scc);
                }
            }
        }

        let mut state = State {
            graph: self,
            index: 0,
            indices: FxHashMap::default(),
            low_links: FxHashMap::default(),
            on_stack: FxHashMap::default(),
            stack: Vec::new(),
            sccs: Vec::new(),
        };
        for &v in &self.vertices {
            if !state.indices.contains_key(&v) {
                state.visit(v);
            }
        }
        state.sccs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    #[test]
    fn isolated_vertices_are_singleton_components() {
        let mut graph = Graph::new();
        graph.add_vertex(n(1));
        graph.add_vertex(n(2));
        let sccs = graph.strong_connect();
        assert_eq!(sccs.len(), 2);
        assert!(sccs.iter().all(|scc| scc.len() == 1));
    }

    #[test]
    fn mutual_recursion_forms_one_component() {
        let mut graph = Graph::new();
        graph.add_edge(n(1), n(2));
        graph.add_edge(n(2), n(1));
        let sccs = graph.strong_connect();
        assert_eq!(sccs.len(), 1);
        let mut scc = sccs[0].clone();
        scc.sort();
        assert_eq!(scc, vec![n(1), n(2)]);
    }

    #[test]
    fn chain_produces_components_in_dependency_order() {
        // 1 -> 2 -> 3: the component of 3 closes first.
        let mut graph = Graph::new();
        graph.add_edge(n(1), n(2));
        graph.add_edge(n(2), n(3));
        let sccs = graph.strong_connect();
        assert_eq!(sccs, vec![vec![n(3)], vec![n(2)], vec![n(1)]]);
    }

    #[test]
    fn self_loop_is_a_component() {
        let mut graph = Graph::new();
        graph.add_edge(n(7), n(7));
        let sccs = graph.strong_connect();
        assert_eq!(sccs, vec![vec![n(7)]]);
    }
}
