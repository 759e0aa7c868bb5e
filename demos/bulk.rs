use std::time::Duration;

use memvault_http::{CallOutcome, CancellationToken, MemVaultClient, NewMemory, RequestSpec};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = MemVaultClient::from_env()?;

    let notes = (1..=10).map(|i| NewMemory::new(format!("imported note {i}")).tag("import"));
    for (i, result) in client.store_memories(notes).await.into_iter().enumerate() {
        let outcome = CallOutcome::from(result);
        println!("{i}: {}", outcome.to_json());
    }

    // Give up on a slow listing after two seconds.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });
    let listing = client
        .send_with_cancel(RequestSpec::get("/memories?limit=50"), &cancel)
        .await;
    println!("{}", CallOutcome::from(listing).to_json());

    Ok(())
}
