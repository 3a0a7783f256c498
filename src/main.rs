use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use rsa_engine::api::{ApiContext, ApiResponse, Router};
use rsa_engine::ServiceConfig;

// One JSON request per stdin line, one JSON response per stdout line.
// Requests run concurrently; responses carry the request id back.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log::info!(
        "RSA engine {} starting: primes {}-{} bits, {}-{} Miller-Rabin rounds, timeout {:?}",
        config.version,
        config.min_prime_bit_length,
        config.max_prime_bit_length,
        config.min_miller_rabin_rounds,
        config.max_miller_rabin_rounds,
        config.prime_generation_timeout
    );

    let router = Router::new(ApiContext::new(config));
    let (tx, mut rx) = mpsc::unbounded_channel::<ApiResponse>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(e) => {
                    log::error!("Failed to serialize response: {}", e);
                    continue;
                }
            };
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let router = router.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = router.handle_line(&line).await;
            if tx.send(response).is_err() {
                log::warn!("Response dropped: writer has shut down");
            }
        });
    }

    log::info!("stdin closed, waiting for in-flight requests");
    drop(tx);
    writer.await.context("writer task panicked")??;
    Ok(())
}
