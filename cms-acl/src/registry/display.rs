// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;

use crate::access::AclPermission;
use crate::document::DocType;
use crate::registry::PermissionRegistry;

impl PermissionRegistry {
    /// Render the active ACL edges of one (document type, permission) layer as graphviz dot.
    ///
    /// Every existing group is a node labelled with its id and the number of groups it reaches
    /// through the layer.
    pub fn display(&self, doc_type: DocType, permission: AclPermission) -> String {
        let layer = self.layers.get(&(doc_type, permission));

        let mut graph = DiGraph::<(String, usize), ()>::new();
        let mut nodes = HashMap::new();

        let mut groups: Vec<_> = self.groups.keys().copied().collect();
        groups.sort_by(|a, b| self.id(*a).cmp(self.id(*b)));
        for idx in groups {
            let reached = layer.map_or(0, |layer| layer.closure(idx).count());
            let node = graph.add_node((self.id(idx).to_string(), reached));
            nodes.insert(idx, node);
        }

        if let Some(layer) = layer {
            let mut edges: Vec<_> = layer.graph().all_edges().collect();
            edges.sort_by(|(a, b, _), (c, d, _)| {
                (self.id(*a), self.id(*b)).cmp(&(self.id(*c), self.id(*d)))
            });
            for (source, target, _) in edges {
                if let (Some(source), Some(target)) = (nodes.get(&source), nodes.get(&target)) {
                    graph.add_edge(*source, *target, ());
                }
            }
        }

        let dot = Dot::with_attr_getters(
            &graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, _| String::new(),
            &|_, (_, (id, reached))| format!("label = \"{} ({})\"", id, reached),
        );

        format!("{:?}", dot)
    }
}

#[cfg(test)]
mod tests {
    use crate::access::AclPermission;
    use crate::document::{DocType, GroupDocument};
    use crate::registry::PermissionRegistry;

    #[test]
    fn render_layer() {
        let registry = PermissionRegistry::from_groups([
            GroupDocument::new("a").grant(DocType::Post, "b", [AclPermission::Edit]),
            GroupDocument::new("b").grant(DocType::Post, "c", [AclPermission::Edit]),
            GroupDocument::new("c"),
        ]);

        let dot = registry.display(DocType::Post, AclPermission::Edit);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("label = \"a (2)\""));
        assert!(dot.contains("label = \"b (1)\""));
        assert!(dot.contains("label = \"c (0)\""));
        assert!(dot.contains("0 -> 1"));
        assert!(dot.contains("1 -> 2"));

        // Layers without any edge still list all groups.
        let dot = registry.display(DocType::Tag, AclPermission::View);
        assert!(dot.contains("label = \"a (0)\""));
        assert!(!dot.contains("->"));
    }
}
