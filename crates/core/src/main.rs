//! Interactive banking assistant REPL.

use anyhow::Result;
use fortuna::config::FortunaCfg;
use fortuna::handler::ChatHandler;
use fortuna::repo::sqlite::SqliteRepo;
use fortuna::tool::banking_registry;
use llm::provider::LlmProvider;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &[&str] = &[
    "bakiyem ne kadar",
    "hesap 1 son 30 gün işlemleri",
    "EFT ücreti ne kadar",
    "dolar kuru",
    "İstanbul Kadıköy ATM",
    "100.000 TL kredi 24 ay taksit %48 faizle",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = FortunaCfg::from_env();

    let repo = match std::env::var("BANK_DB_PATH").ok().map(PathBuf::from) {
        Some(path) => {
            info!(path = %path.display(), "opening bank database");
            let repo = SqliteRepo::connect(&path).await?;
            repo.seed_demo().await?;
            repo
        }
        None => {
            info!("BANK_DB_PATH not set, using seeded in-memory database");
            let repo = SqliteRepo::connect_memory().await?;
            repo.seed_demo().await?;
            repo
        }
    };

    let registry = Arc::new(banking_registry(Arc::new(repo), &cfg));
    let provider: Option<Arc<dyn LlmProvider>> = match llm::http::from_env() {
        Some(p) => {
            info!(provider = p.name(), "model fallback enabled");
            Some(Arc::new(p))
        }
        None => {
            info!("FORTUNA_LLM_MODEL not set, running planned flows only");
            None
        }
    };

    let handler = ChatHandler::new(registry, provider, cfg);

    let customer_id: i64 = std::env::var("FORTUNA_CUSTOMER_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let session_id = uuid::Uuid::new_v4().to_string();

    println!("Fortuna bankacılık asistanı. Çıkmak için /q yazın.");
    println!("Örnekler:");
    for e in EXAMPLES {
        println!("  - {e}");
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("siz> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/q" || line == "/quit" {
                    break;
                }
                rl.add_history_entry(line)?;
                let reply = handler.handle(line, customer_id, &session_id).await;
                println!("{}", reply.text);
                if let Some(ui) = &reply.structured_ui {
                    if std::env::var("FORTUNA_SHOW_UI").is_ok() {
                        println!("[ui] {}", serde_json::to_string_pretty(ui)?);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Görüşmek üzere.");
    Ok(())
}
