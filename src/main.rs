use clap::{Parser, Subcommand};
use gnopls::{env::Env, lsp, version};

#[derive(Debug, Parser)]
#[command(
    name = "gnopls",
    version,
    about = "Gno Please! is a Gno language server",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a server for Gno code using the Language Server Protocol
    Serve {
        /// Specify the GNOROOT, overriding the environment
        #[arg(long = "gnoroot", value_name = "PATH")]
        gnoroot: Option<String>,
    },
    /// Print the gnopls version information
    Version,
}

fn main() {
    // Stdout carries the LSP stream; logs must go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { gnoroot } => {
            tracing::info!("Initializing Server...");
            let env = Env::detect(gnoroot);
            if let Err(err) = lsp::serve_stdio(env) {
                eprintln!("server failed: {err}");
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("{}", version::long_version());
        }
    }
}
