use {anyhow::Result, rhea_gateway::InterClient};

/// Print the shards currently registered with a running gateway.
pub async fn list_shards(uri: &str, json: bool) -> Result<()> {
    let mut client = InterClient::connect(uri).await?;
    let shards = client.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&shards)?);
        return Ok(());
    }
    if shards.is_empty() {
        println!("no shards registered");
        return Ok(());
    }
    let width = shards.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for shard in &shards {
        println!("{:<width$}  {}:{}", shard.name, shard.address, shard.port);
    }
    Ok(())
}
