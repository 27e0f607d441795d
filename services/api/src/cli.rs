use crate::demo::{run_age, run_demo, AgeArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use clubroll::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "clubroll",
    about = "Run the club membership service or try the unit allocation rule from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Seed a sample club and walk members through unit allocation
    Demo(DemoArgs),
    /// Print the allocation reference age for a birth date
    Age(AgeArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Age(args) => run_age(args),
    }
}
