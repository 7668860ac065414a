//! OAK Codebase Intelligence daemon CLI.
//!
//! Exit codes: 0 on clean shutdown, 1 on fatal error, 130 on Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "oak-ci", version, about = "Per-project Codebase Intelligence daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground.
    Serve {
        /// Project root to serve; defaults to the current directory.
        #[arg(long)]
        project_root: Option<PathBuf>,
    },
    /// Print the daemon version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("{}", oakci_domain::constants::VERSION);
            ExitCode::SUCCESS
        }
        Command::Serve { project_root } => run_serve(project_root),
    }
}

fn run_serve(project_root: Option<PathBuf>) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(serve(project_root)) {
        Ok(ServeOutcome::Shutdown) => ExitCode::SUCCESS,
        Ok(ServeOutcome::Interrupted) => ExitCode::from(130),
        Err(e) => {
            error!(error = %e, "daemon failed");
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

enum ServeOutcome {
    Shutdown,
    Interrupted,
}

async fn serve(project_root: Option<PathBuf>) -> anyhow::Result<ServeOutcome> {
    let project_root = match project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let project_root = project_root.canonicalize()?;
    let auth_token = std::env::var("OAK_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

    let paths = oakci_infrastructure::paths::CiPaths::new(&project_root);
    let _logging = oakci_infrastructure::logging::init_logging(Some(&paths.daemon_log()));
    info!(project_root = %project_root.display(), "starting oak-ci daemon");

    let state = oakci_infrastructure::lifecycle::build_state(&project_root, auth_token).await?;
    oakci_infrastructure::lifecycle::start_background(&state);

    let server_state = std::sync::Arc::clone(&state);
    let server = tokio::spawn(async move { oakci_server::serve(server_state).await });

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            true
        }
        () = state.shutdown.cancelled() => false,
    };

    oakci_infrastructure::lifecycle::shutdown(&state).await;
    let _ = server.await;

    if interrupted {
        Ok(ServeOutcome::Interrupted)
    } else {
        Ok(ServeOutcome::Shutdown)
    }
}
