//! Administrative cutovers for the mess database.
//! Meant for cron, e.g. every 15 minutes: mess-admin close-expired
//!
//! Usage: mess-admin close-expired
//!        mess-admin lock-menu --menu UUID

use clap::{Parser, Subcommand};
use uuid::Uuid;

use hostel_mess_api::{
    clock::{Clock, SystemClock},
    config::Config,
    db::{self, PgStore},
    services::{menu::MenuService, selection::SelectionService},
};

#[derive(Parser)]
#[command(name = "mess-admin", about = "Administrative tasks for the hostel mess database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Close every active menu whose selection window has ended
    CloseExpired,
    /// Lock all selections of one menu
    LockMenu {
        #[arg(long)]
        menu: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, 5).await?;
    let store = PgStore::new(pool);

    match args.command {
        Command::CloseExpired => {
            let now = SystemClock.now();
            tracing::info!(%now, "Closing expired menus...");
            let closed = MenuService::close_expired(&store, now).await?;
            let locked: u64 = closed.iter().map(|c| c.locked_selections).sum();
            tracing::info!(menus = closed.len(), locked, "Completed");
        }
        Command::LockMenu { menu } => {
            let locked = SelectionService::lock_menu(&store, menu).await?;
            tracing::info!(%menu, locked, "Selections locked");
        }
    }

    Ok(())
}
