//! CLI Status Command
//!
//! Reports health and the current session of a running `kaitai serve`.

use anyhow::Result;
use serde_json::Value;

use kaitai_config::KaitaiConfig;

pub async fn run(config: &KaitaiConfig) -> Result<()> {
    let base = format!("http://{}:{}", config.bind_address, config.port);
    let client = reqwest::Client::new();

    let health = match client.get(format!("{base}/api/health")).send().await {
        Ok(resp) => resp.json::<Value>().await?,
        Err(_) => {
            println!("Kaitai is not running on {base}");
            return Ok(());
        }
    };
    println!("{}", serde_json::to_string_pretty(&health)?);

    let session: Value = client
        .get(format!("{base}/api/session"))
        .send()
        .await?
        .json()
        .await?;
    let images = session["images"].as_array().map_or(0, Vec::len);
    println!("\nSession: phase={} images={images}", session["phase"].as_str().unwrap_or("unknown"));

    Ok(())
}
