//! ptah - schema generation and migrations from annotated Rust sources.

use clap::Parser;

use ptah_cli::cli::{Cli, Command};
use ptah_cli::commands::{self, Context};
use ptah_cli::config::Config;
use ptah_cli::error::{CliError, CliResult};
use ptah_cli::logging;
use ptah_cli::output;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = tokio::select! {
        result = run(cli) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(CliError::Interrupted),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let ctx = Context::new(Config::discover(cli.config.as_deref())?);

    match cli.command {
        Command::Generate(args) => commands::generate::run(args).await,
        Command::WriteDb(args) => commands::db::write_db(&ctx, args).await,
        Command::ReadDb(args) => commands::db::read_db(&ctx, args).await,
        Command::Compare(args) => commands::db::compare(&ctx, args).await,
        Command::Migrate(args) => commands::migrate::migrate(&ctx, args).await,
        Command::DropSchema(args) => commands::db::drop_schema(&ctx, args).await,
        Command::DropAll(args) => commands::db::drop_all(&ctx, args).await,
        Command::Up(args) => commands::migrate::up(&ctx, args).await,
        Command::Down(args) => commands::migrate::down(&ctx, args).await,
        Command::Status(args) => commands::migrate::status(&ctx, args).await,
        Command::Bootstrap(args) => commands::bootstrap::run(&ctx, args).await,
    }
}
