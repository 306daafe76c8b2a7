use std::sync::Arc;

use anyhow::Context;
use evlog::{meta, LogEventConsolePrinter, Logger};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use pollvault::config::{Config, StoreKind};
use pollvault::db::dbclient::DBClient;
use pollvault::db::memory::MemoryStore;
use pollvault::db::store::PollStore;
use pollvault::handler::PollHandler;
use pollvault::polls::PollService;
use pollvault::runtime::{get_logger, set_logger};

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PollStore>> {
    Ok(match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Postgres => {
            let db_url = config.database_url.as_deref().context("expected POLLVAULT_DATABASE_URL")?;
            let db_client = DBClient::new(db_url, config.max_connections).await
                .context("failed to connect to database")?;
            Arc::new(db_client)
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let mut logger = Logger::default();
    logger.register(LogEventConsolePrinter::default());
    set_logger(logger);

    let config = Config::load()?;
    let store = open_store(&config).await?;
    let handler = PollHandler::new(Arc::new(PollService::new(store)));

    get_logger().info("Ready for requests.", meta! {
        "Store" => config.store,
    });

    // Requests are handled concurrently; responses are written as they complete.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let handler = handler.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let envelope = handler.handle_line(&line).await;
            match serde_json::to_string(&envelope) {
                Ok(out) => {
                    let _ = tx.send(out);
                }
                Err(e) => {
                    get_logger().error("Failed to encode response.", meta! {
                        "Error" => e,
                    });
                }
            }
        });
    }

    drop(tx);
    writer.await??;

    Ok(())
}
