//! Graphviz DOT rendering of an assembled graph.

use std::fmt::Write as _;
use std::io;

use crate::graph::{EdgeKind, GraphSession};
use crate::hierarchy::ChainForest;

const FONT: &str = "Helvetica,Arial,sans-serif";

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders one cluster per included chain, the uncle cluster, then every edge
/// in the order it was added.
pub fn render(forest: &ChainForest, session: &GraphSession) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_graph(&mut out, forest, session);
    out
}

fn write_graph(
    out: &mut String,
    forest: &ChainForest,
    session: &GraphSession,
) -> std::fmt::Result {
    writeln!(out, "digraph G {{")?;
    writeln!(out, "fontname=\"{FONT}\"")?;
    writeln!(
        out,
        "node [fontname=\"{FONT}\", shape = rectangle, style = filled]"
    )?;
    writeln!(out, "edge [fontname=\"{FONT}\"]")?;

    for &id in forest.walk_order() {
        let chain = forest.chain(id);
        writeln!(
            out,
            "subgraph cluster_{} {{ label = \"{}\" node [color = \"{}\"]",
            chain.name.replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
            escape(&chain.name),
            escape(&chain.color),
        )?;
        for block in chain.blocks.iter() {
            writeln!(
                out,
                "\"{}\" [label = \"{}\\n{}\"]",
                block.key(chain.level),
                block.hash.short(),
                block.number
            )?;
        }
        writeln!(out, "}}")?;
    }

    writeln!(out, "subgraph cluster_Uncles {{ label = \"Uncles\"")?;
    writeln!(out, "}}")?;

    for edge in session.edges() {
        let attrs = match edge.kind {
            EdgeKind::Next => "",
            EdgeKind::Coincident => " [dir = none]",
            EdgeKind::Timeline => " [color = blue]",
        };
        writeln!(out, "\"{}\" -> \"{}\"{}", edge.from, edge.to, attrs)?;
    }

    writeln!(out, "}}")
}

/// Writes the rendered graph to `writer`.
pub fn write<W: io::Write>(
    writer: &mut W,
    forest: &ChainForest,
    session: &GraphSession,
) -> io::Result<()> {
    writer.write_all(render(forest, session).as_bytes())?;
    writer.flush()
}
