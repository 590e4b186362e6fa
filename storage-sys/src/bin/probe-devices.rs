// SPDX-License-Identifier: GPL-3.0-only

//! Print the probed device graph as JSON

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use storage_contracts::LvmReport;
use storage_sys::linux::{self, LvmTools};
use storage_sys::{EngineConfig, StorageEngine, candidates_from_graph};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "probe-devices", about = "Probe block devices and print their layout")]
struct Args {
    /// Only probe this device
    #[arg(short, long)]
    device: Option<String>,

    /// Leave loop devices out
    #[arg(long)]
    no_loop: bool,

    /// Also print physical volume candidates
    #[arg(long)]
    candidates: bool,

    /// Pretty-print the output
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storage_sys=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = EngineConfig {
        include_loop_devices: !args.no_loop,
        ..EngineConfig::default()
    };
    let engine = StorageEngine::new(
        linux::system_collaborators(&config),
        Arc::new(linux::system_capabilities()),
        config,
    );

    let value = match &args.device {
        Some(path) => serde_json::to_value(engine.probe_device(path)?)?,
        None => {
            let graph = engine.probe()?;
            if args.candidates {
                let pvs = LvmTools.physical_volumes()?;
                serde_json::json!({
                    "graph": graph,
                    "candidates": candidates_from_graph(&graph, &pvs),
                })
            } else {
                serde_json::to_value(graph)?
            }
        }
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{output}");
    Ok(())
}
