use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    navigator_cli::main_entry().await
}
