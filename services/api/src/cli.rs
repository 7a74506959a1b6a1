use clap::{Args, Parser, Subcommand};

use crate::demo::{run_demo, run_evaluate, run_generate, DemoArgs, EvaluateArgs, GenerateArgs};
use crate::server;
use honors_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Honor Qualification Engine",
    about = "Run and demonstrate the school platform's honor qualification engine",
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
    /// Run honor roll calculations from the command line
    Honors {
        #[command(subcommand)]
        command: HonorsCommand,
    },
    /// Run an end-to-end demo: generation, approval, and override
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum HonorsCommand {
    /// Generate the honor roll for a level and school year
    Generate(GenerateArgs),
    /// Calculate the honor qualifications for a single student
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the in-memory collaborators with the demo roster and grades
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Honors {
            command: HonorsCommand::Generate(args),
        } => run_generate(args),
        Command::Honors {
            command: HonorsCommand::Evaluate(args),
        } => run_evaluate(args),
        Command::Demo(args) => run_demo(args),
    }
}
