//! apidiagram CLI: batch OpenAPI → Mermaid → SVG conversion.
//!
//! Mirrors a tree of YAML/JSON API descriptions into a tree of `.mmd`
//! diagram descriptions and a tree of rendered `.svg` images.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
