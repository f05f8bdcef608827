use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hookgate::config::{self, Config, LogFormat, StoreBackend};
use hookgate::middleware::authz::redact_token;
use hookgate::models::UserRecord;
use hookgate::proxy::{upstream, ForwardingTable};
use hookgate::store::{FirestoreStore, MemoryStore, UserStore};
use hookgate::{api, token, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let cfg = config::load()?;
    init_tracing(cfg.log_format);

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::User { command }) => handle_user_command(command, &cfg).await,
        Some(cli::Commands::Routes) => print_routes(&cfg),
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "hookgate=info,tower_http=info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn UserStore>> {
    Ok(match cfg.store {
        StoreBackend::Firestore => {
            tracing::info!(
                base_url = %cfg.firestore.base_url,
                collection = %cfg.firestore.collection,
                emulator = cfg.firestore.emulator,
                "Using firestore registry"
            );
            Arc::new(FirestoreStore::new(&cfg.firestore, cfg.store_timeout).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory registry, users are lost on restart");
            Arc::new(MemoryStore::new())
        }
    })
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;

    if let Some(name) = cfg.bootstrap_admin.as_deref() {
        if cfg.store == StoreBackend::Memory {
            let record = UserRecord::admin(token::generate_token(cfg.token_bytes)?, name);
            store.create_or_replace(&record).await?;
            tracing::warn!(name, token = %redact_token(&record.token), "Seeded bootstrap admin");
            // stdout only, the full token never goes through the log pipeline
            println!("Bootstrap admin token for '{}': {}", name, record.token);
        } else {
            tracing::warn!(
                "HOOKGATE_BOOTSTRAP_ADMIN is ignored for persistent registries, \
                 use `hookgate user issue --admin`"
            );
        }
    }

    let state = Arc::new(AppState::new(cfg, store)?);
    tracing::info!(routes = state.routes.len(), "Forwarding table ready");
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("hookgate listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn handle_user_command(cmd: cli::UserCommands, cfg: &Config) -> anyhow::Result<()> {
    if cfg.store == StoreBackend::Memory {
        anyhow::bail!("user commands need a persistent registry, HOOKGATE_STORE is 'memory'");
    }
    let store = open_store(cfg).await?;

    match cmd {
        cli::UserCommands::Issue { name, admin } => {
            let issued = token::generate_token(cfg.token_bytes)?;
            let record = UserRecord {
                is_admin: admin,
                ..UserRecord::new(issued, name)
            };
            store.create_or_replace(&record).await?;
            println!(
                "User created:\n  Name:  {}\n  Admin: {}\n  Token: {}",
                record.name, record.is_admin, record.token
            );
        }
        cli::UserCommands::Show { token } => match store.get_by_token(&token).await? {
            Some(record) => println!(
                "{:<24} {:<8} {}",
                record.name,
                record.is_admin,
                redact_token(&record.token)
            ),
            None => println!("Token not found."),
        },
        cli::UserCommands::Promote { name } => {
            let promoted = store.promote_by_name(&name).await?;
            println!("Promoted {} user(s) named '{}'.", promoted, name);
        }
        cli::UserCommands::Delete { name } => {
            let deleted = store.delete_by_name(&name).await?;
            println!("Deleted {} user(s) named '{}'.", deleted, name);
        }
    }
    Ok(())
}

fn print_routes(cfg: &Config) -> anyhow::Result<()> {
    let client = upstream::build_client(cfg.upstream_timeout)?;
    let table = ForwardingTable::from_routes(&cfg.webhooks, client, cfg.forward_query)?;
    println!("{:<24} TARGET HOST", "ROUTE");
    for (name, forwarder) in table.iter() {
        println!(
            "{:<24} {}",
            format!("/{}", name),
            forwarder.target().host_str().unwrap_or("-")
        );
    }
    Ok(())
}
