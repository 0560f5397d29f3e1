//! Command line flags and the run configuration derived from them.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::error::Result;
use crate::hierarchy::Topology;
use crate::types::BlockNumber;

pub const DEFAULT_SAVE_FILE: &str = "TestGraph.dot";

/// Generates DOT graphs of a hierarchical Prime/Region/Zone network.
#[derive(Parser, Debug, Clone)]
#[command(name = "network_visualizer", version)]
pub struct Args {
    /// First block of the graph; 0 starts `range` blocks below each chain's head
    #[arg(long, default_value_t = 0)]
    pub start: BlockNumber,

    /// How many blocks to include per chain
    #[arg(long, default_value_t = 100)]
    pub range: u64,

    /// Hide blocks between coincident blocks outside the requested range
    #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
    pub compressed: bool,

    /// Update the graph in real time (not implemented yet)
    #[arg(long)]
    pub live: bool,

    /// Include uncle blocks in the live graph (not implemented yet)
    #[arg(long)]
    pub uncles: bool,

    /// Output file for the graph
    #[arg(long, default_value = DEFAULT_SAVE_FILE)]
    pub savefile: PathBuf,

    /// Chains to include, by code: prime,c,p,h,c1,c2,c3,p1,p2,p3,h1,h2,h3
    #[arg(short, long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// TOML file describing the chain topology and node endpoints
    #[arg(long, env = "NETWORK_VISUALIZER_TOPOLOGY")]
    pub topology: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub start: BlockNumber,
    pub range: u64,
    pub compressed: bool,
    pub live: bool,
    pub uncles: bool,
    pub save_file: PathBuf,
    pub include: Vec<String>,
    pub topology: Topology,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let topology = match &args.topology {
            Some(path) => Topology::load(path)?,
            None => Topology::default(),
        };

        Ok(Self {
            start: args.start,
            range: args.range,
            compressed: args.compressed,
            live: args.live,
            uncles: args.uncles,
            save_file: args.savefile,
            include: args.include,
            topology,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_flags() {
        let args = Args::try_parse_from(["network_visualizer"]).unwrap();
        assert_eq!(args.start, 0);
        assert_eq!(args.range, 100);
        assert!(args.compressed);
        assert!(!args.live);
        assert!(!args.uncles);
        assert_eq!(args.savefile, PathBuf::from(DEFAULT_SAVE_FILE));
        assert!(args.include.is_empty());
    }

    #[test]
    fn flags_are_parsed() {
        let args = Args::try_parse_from([
            "network_visualizer",
            "--start",
            "40",
            "--range",
            "10",
            "-c",
            "false",
            "-i",
            "prime,c,c1",
            "--savefile",
            "out.dot",
        ])
        .unwrap();
        assert_eq!(args.start, 40);
        assert_eq!(args.range, 10);
        assert!(!args.compressed);
        assert_eq!(args.include, vec!["prime", "c", "c1"]);
        assert_eq!(args.savefile, PathBuf::from("out.dot"));
    }

    #[test]
    fn topology_file_overrides_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[root]\nname = \"Prime\"\ncode = \"prime\"\nendpoint = \"http://node:8546\"\n"
        )
        .unwrap();

        let args = Args::try_parse_from([
            "network_visualizer",
            "--topology",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.topology.root.endpoint, "http://node:8546");
        assert!(config.topology.root.children.is_empty());
    }
}
