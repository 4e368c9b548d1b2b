use anyhow::Result;
use devicelock::{config::Config, fingerprint::provider_from_config};

/// Print the fingerprint the service would see on this host.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let provider = provider_from_config(&config);
    let fingerprint = provider.current_fingerprint().await?;

    println!("{fingerprint}");
    Ok(())
}
