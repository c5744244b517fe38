// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph functions for walking permission layers.
//!
//! All walks keep a visited set (through petgraph's `Dfs`) and therefore terminate on cyclic
//! graphs, including self-loops.
use std::collections::HashSet;

use petgraph::graphmap::{DiGraphMap, NodeTrait};
use petgraph::visit::{Dfs, Reversed};

/// Return every node reachable from `from`, including `from` itself.
pub fn reachable<N>(graph: &DiGraphMap<N, ()>, from: N) -> HashSet<N>
where
    N: NodeTrait,
{
    let mut nodes = HashSet::new();
    if !graph.contains_node(from) {
        return nodes;
    }

    let mut dfs = Dfs::new(graph, from);
    while let Some(node) = dfs.next(graph) {
        nodes.insert(node);
    }
    nodes
}

/// Return every node from which `to` can be reached, including `to` itself.
pub fn ancestors<N>(graph: &DiGraphMap<N, ()>, to: N) -> HashSet<N>
where
    N: NodeTrait,
{
    let mut nodes = HashSet::new();
    if !graph.contains_node(to) {
        return nodes;
    }

    let reversed = Reversed(graph);
    let mut dfs = Dfs::new(&reversed, to);
    while let Some(node) = dfs.next(&reversed) {
        nodes.insert(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use petgraph::prelude::DiGraphMap;

    use super::{ancestors, reachable};

    #[test]
    fn linear_chain() {
        let mut graph = DiGraphMap::new();
        graph.add_edge(1, 2, ());
        graph.add_edge(2, 3, ());
        graph.add_edge(3, 4, ());

        let expected: HashSet<_> = [2, 3, 4].into_iter().collect();
        assert_eq!(reachable(&graph, 2), expected);

        let expected: HashSet<_> = [1, 2, 3].into_iter().collect();
        assert_eq!(ancestors(&graph, 3), expected);
        assert!(!reachable(&graph, 4).contains(&1));
    }

    #[test]
    fn cycles_terminate() {
        //  1 -> 2 -> 3
        //       ^    |
        //       +----+   and a self-loop on 4 reached from 3
        let mut graph = DiGraphMap::new();
        graph.add_edge(1, 2, ());
        graph.add_edge(2, 3, ());
        graph.add_edge(3, 2, ());
        graph.add_edge(3, 4, ());
        graph.add_edge(4, 4, ());

        let expected: HashSet<_> = [2, 3, 4].into_iter().collect();
        assert_eq!(reachable(&graph, 3), expected);

        let expected: HashSet<_> = [1, 2, 3].into_iter().collect();
        assert_eq!(ancestors(&graph, 2), expected);

        let expected: HashSet<_> = [1, 2, 3, 4].into_iter().collect();
        assert_eq!(ancestors(&graph, 4), expected);
    }

    #[test]
    fn unknown_nodes() {
        let mut graph = DiGraphMap::<u32, ()>::new();
        graph.add_edge(1, 2, ());

        assert!(reachable(&graph, 7).is_empty());
        assert!(ancestors(&graph, 7).is_empty());
    }
}
