use clap::{Parser, Subcommand};
use trigr::{
    commands::{
        build::{self, BuildCommand},
        check::{self, CheckCommand},
        keys::{self, KeysCommand},
    },
    init_tracing, logger, GlobalOpts,
};

#[derive(Parser)]
#[command(name = "trigr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Deployment manifest compiler for Python functions",
    long_about = "trigr scans Python function sources without running them and emits the deployment manifest describing every endpoint, parameter and required API."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the sources and write the manifest
    Build(BuildCommand),
    /// Compile the sources and print a summary without writing anything
    Check(CheckCommand),
    /// List endpoint keys with their source locations
    Keys(KeysCommand),
}

fn main() {
    let cli = Cli::parse();

    if cli.global.no_color {
        logger::set_color(false);
    }
    if let Err(e) = logger::init(cli.global.verbosity_level(), cli.global.quiet, None) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing(cli.global.no_color);

    let result = match cli.command {
        Commands::Build(cmd) => build::handle_build(cmd, &cli.global),
        Commands::Check(cmd) => check::handle_check(cmd, &cli.global),
        Commands::Keys(cmd) => keys::handle_keys(cmd, &cli.global),
    };

    if let Err(e) = result {
        logger::spinner_stop();
        logger::error(&format!("{:#}", e));
        logger::show_log_path();
        std::process::exit(1);
    }
}
