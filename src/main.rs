use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    souldesk_cli::cli::app::run().await
}
