use memvault_http::{MemVaultClient, NewMemory, SearchQuery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads MEMVAULT_API_URL and MEMVAULT_WALLET_KEY.
    let client = MemVaultClient::from_env()?;
    println!("wallet: {}", client.wallet_address());

    let memory = client
        .store_memory(
            NewMemory::new("Retries use exponential backoff with jitter").tag("notes"),
        )
        .await?;
    println!("stored {}", memory.id);

    let hits = client
        .search_memories(&SearchQuery::new("backoff").limit(5))
        .await?;
    for hit in hits {
        println!("{:.2} {}", hit.score.unwrap_or_default(), hit.memory.content);
    }

    Ok(())
}
