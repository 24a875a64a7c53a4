use book_catalog::infra::config::CatalogConfig;
use book_catalog::storage::books::{BookStore, PostgresBookStore};
use tracing_subscriber::EnvFilter;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--ensure-schema]\n\
         \n\
         Reads the same env vars as api_server:\n\
           BIND_ADDR, DATABASE_URL, DATABASE_MAX_CONNECTIONS, COVER_DIR, CATALOG_API_KEYS\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let ensure_schema = args.iter().any(|a| a == "--ensure-schema");

    // Parsing fails loudly on malformed values.
    let config = CatalogConfig::from_env()?;

    println!("> Preflight:");
    println!("  BIND_ADDR={}", config.bind_addr);
    println!("  API keys configured: {:?}", config.api_keys);

    match config.cover_dir.as_ref() {
        Some(dir) => match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => println!("  COVER_DIR={} (exists)", dir.display()),
            Ok(_) => anyhow::bail!("COVER_DIR {} is not a directory", dir.display()),
            Err(_) => println!("  COVER_DIR={} (will be created on startup)", dir.display()),
        },
        None => println!("  COVER_DIR unset: covers are kept in memory"),
    }

    let Some(url) = config.database_url.as_deref() else {
        println!("  DATABASE_URL unset: the catalog is kept in memory");
        println!("> Preflight OK.");
        return Ok(());
    };

    let store = PostgresBookStore::connect(url, config.database_max_connections).await?;
    store.ping().await?;
    println!("  Database reachable (pool size {})", config.database_max_connections);

    if ensure_schema {
        store.ensure_schema().await?;
        println!("  Schema ensured (authors, books, book_authors).");
    }

    match (store.all().await, store.authors().await) {
        (Ok(books), Ok(authors)) => {
            println!("  Catalog holds {} book(s) and {} author(s).", books.len(), authors.len())
        }
        (Err(e), _) | (_, Err(e)) => {
            anyhow::bail!("catalog tables are missing or unreadable ({:#}); rerun with --ensure-schema", e)
        }
    }

    println!("> Preflight OK.");
    Ok(())
}
