//! Graphviz rendering of the projected graph, coloured by community

use crate::community::Partition;
use crate::projection::EntityGraph;
use std::fmt::Write;

const PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Render `graph` as an undirected DOT document. Vertices take the fill
/// colour of their community; edges are labelled with their relationship type.
pub fn render_dot(graph: &EntityGraph, partition: &Partition) -> String {
    let assignment = partition.assignment();
    let mut out = String::from("graph communities {\n  node [style=filled];\n");

    for id in graph.ids() {
        let color = assignment
            .get(id)
            .map_or("#ffffff", |c| PALETTE[c % PALETTE.len()]);
        let _ = writeln!(out, "  \"{}\" [fillcolor=\"{}\"];", escape(id), color);
    }

    for (a, b, label) in graph.edges() {
        let _ = writeln!(
            out,
            "  \"{}\" -- \"{}\" [label=\"{}\"];",
            escape(graph.id(a)),
            escape(graph.id(b)),
            escape(&label.rel_type)
        );
    }

    out.push_str("}\n");
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::CommunityDetector;
    use crate::graph::GraphDocument;
    use crate::node::{Node, Relationship};

    #[test]
    fn test_render_dot() {
        let doc = GraphDocument {
            nodes: vec![],
            relationships: vec![Relationship::new(
                Node::new("The \"Firm\"", "Organization"),
                Node::new("John", "Person"),
                "Employs",
            )],
        };
        let graph = EntityGraph::from_document(&doc);
        let partition = CommunityDetector::new().detect(&graph);

        let dot = render_dot(&graph, &partition);
        assert!(dot.starts_with("graph communities {"));
        assert!(dot.contains(r#""The \"Firm\"" -- "John" [label="Employs"];"#));
        assert!(dot.contains(r##""John" [fillcolor="#1f77b4"];"##));
    }
}
