#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizbank::run_sync_agent().await {
        eprintln!("quizbank-sync fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
