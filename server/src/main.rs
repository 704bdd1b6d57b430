//! whispr-server – entry point
//!
//! `whispr-server run` (the default with no arguments) starts the full
//! server. `whispr-server add-user <username> <password> [--admin]` opens
//! the configured database directly, without starting any listener, and
//! inserts a new user.

use anyhow::{Context, Result};
use whispr_auth::password;
use whispr_db::repository::DatabaseConfig;
use whispr_db::{SqliteDb, UserRepository};
use whispr_db::models::NewUser;
use whispr_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("WHISPR_CONFIG").unwrap_or_else(|_| "config.json".into());
    let config = ServerConfig::load(&config_path)?;

    whispr_observability::init_logging(&whispr_observability::log_level_from_env(), &whispr_observability::log_format_from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("run") => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %config_path, "whispr server initializing");
            Server::new(config).run().await
        }
        Some("add-user") => add_user(&config, &args[1..]).await,
        Some(other) => {
            eprintln!("unknown command '{other}'. usage: whispr-server [run | add-user <username> <password> [--admin]]");
            std::process::exit(2);
        }
    }
}

async fn add_user(config: &ServerConfig, args: &[String]) -> Result<()> {
    let username = args.first().context("usage: whispr-server add-user <username> <password> [--admin]")?;
    let password_plain = args.get(1).context("usage: whispr-server add-user <username> <password> [--admin]")?;
    let is_admin = args.iter().any(|a| a == "--admin");

    let db_config = DatabaseConfig::from_path(&config.database_path);
    let db = SqliteDb::open(&db_config).await.context("opening database")?;

    let password_hash = password::hash_password(password_plain).context("hashing password")?;
    let user = UserRepository::create(&db, NewUser { username, password_hash: &password_hash, is_admin })
        .await
        .context("creating user")?;

    println!("created user '{}' (id {}, admin: {})", user.username, user.id, user.is_admin);
    Ok(())
}
