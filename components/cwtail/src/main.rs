use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Everything, including logging setup, happens behind the CLI layer.
    cwtail::cli::cli::run().await
}
