//! ModelGate - Main Entry Point

use clap::Parser;
use modelgate::cli::{run, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run(args).await
}
