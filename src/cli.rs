//! Command line surface

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use crate::commands::{
    add_connection, list_connections, remove_connection, report_failure, sync_changes,
    sync_selected, AddConnectionRequest, AuthRequest, ConsoleNotifier,
};
use crate::config::{ConfigStorage, Keychain, SyncSettings};
use crate::sftp::SftpConnector;
use crate::source::{GitChangeSource, PathSelection};
use crate::sync::{ConsoleOutput, OutputPane, RunControl, SyncError, SyncSession};

#[derive(Parser)]
#[command(name = "scpsync")]
#[command(about = "Copy locally changed or selected files to a remote host over SFTP")]
pub struct Cli {
    /// Connection profile file (default: ~/.scpsync/connections.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sync every changed file of a git working tree
    Changes {
        /// Directory inside the repository (default: current directory)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Sync the given files of a project
    Selected {
        #[arg(long)]
        project: PathBuf,
        /// Remote project name (default: project directory name)
        #[arg(long)]
        name: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Manage connection profiles
    Connection {
        #[command(subcommand)]
        cmd: ConnectionCmd,
    },
}

#[derive(Subcommand)]
pub enum ConnectionCmd {
    Add {
        #[arg(long)]
        host: String,
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 22)]
        port: u16,
        /// Private key file
        #[arg(long, conflicts_with = "password_env")]
        key: Option<String>,
        /// Environment variable holding the key passphrase
        #[arg(long, requires = "key")]
        passphrase_env: Option<String>,
        /// Environment variable holding the password
        #[arg(long)]
        password_env: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Make this the active profile
        #[arg(long)]
        active: bool,
    },
    List,
    Remove {
        id: String,
    },
}

pub async fn execute(cli: Cli) -> ExitCode {
    let storage = match cli.config {
        Some(path) => ConfigStorage::with_path(path),
        None => match ConfigStorage::new() {
            Ok(storage) => storage,
            Err(e) => {
                eprintln!("scpsync: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    match cli.cmd {
        Command::Changes { repo } => {
            let dir = repo.unwrap_or_else(current_dir);
            let source = GitChangeSource::new(absolute(&dir));
            with_session(storage, |session, pane, notifier, control| async move {
                sync_changes(&session, &source, pane, notifier, &control).await;
                session
            })
            .await
        }
        Command::Selected {
            project,
            name,
            files,
        } => {
            let files: Vec<PathBuf> = files.iter().map(|f| absolute(f)).collect();
            let selection = PathSelection::new(absolute(&project), name, &files);
            with_session(storage, |session, pane, notifier, control| async move {
                sync_selected(&session, &selection, pane, notifier, &control).await;
                session
            })
            .await
        }
        Command::Connection { cmd } => run_connection(&storage, cmd).await,
    }
}

/// Build the session, run one trigger, then close the session
async fn with_session<F, Fut>(storage: ConfigStorage, trigger: F) -> ExitCode
where
    F: FnOnce(SyncSession, Arc<dyn OutputPane>, &'static ConsoleNotifier, RunControl) -> Fut,
    Fut: std::future::Future<Output = SyncSession>,
{
    static NOTIFIER: ConsoleNotifier = ConsoleNotifier;

    debug!("Connection profiles: {}", storage.path().display());
    let settings = match storage.load().await {
        Ok(config) => one_shot(config.sync),
        Err(e) => {
            report_failure(&NOTIFIER, &SyncError::Config(e));
            return ExitCode::SUCCESS;
        }
    };

    let connector = Arc::new(SftpConnector::new(settings.clone(), Keychain::new()));
    let session = SyncSession::new(connector, Arc::new(storage), settings);

    let control = RunControl::new();
    tokio::spawn({
        let control = control.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupted, no further files will be started");
            control.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
        }
    });

    let pane: Arc<dyn OutputPane> = Arc::new(ConsoleOutput);
    let session = trigger(session, pane, &NOTIFIER, control).await;
    session.shutdown().await;
    ExitCode::SUCCESS
}

/// The process ends after one run, so a pre-warmed connection would never
/// serve anything
fn one_shot(settings: SyncSettings) -> SyncSettings {
    SyncSettings {
        prewarm_connection: false,
        ..settings
    }
}

async fn run_connection(storage: &ConfigStorage, cmd: ConnectionCmd) -> ExitCode {
    let keychain = Keychain::new();
    let result = match cmd {
        ConnectionCmd::Add {
            host,
            user,
            port,
            key,
            passphrase_env,
            password_env,
            name,
            active,
        } => {
            async {
                let auth = auth_request(key, passphrase_env.as_deref(), password_env.as_deref())?;
                let request = AddConnectionRequest {
                    name,
                    host,
                    port,
                    username: user,
                    auth,
                    make_active: active,
                };
                let c = add_connection(storage, &keychain, request).await?;
                let marker = if c.active { " [active]" } else { "" };
                println!("saved {} ({}){}", c.name, c.id, marker);
                Ok::<(), String>(())
            }
            .await
        }
        ConnectionCmd::List => list_connections(storage).await.map(|connections| {
            if connections.is_empty() {
                println!("no connections");
            }
            for c in connections {
                println!(
                    "{} {}  {}  {}@{}:{}  ({})",
                    if c.active { "*" } else { " " },
                    c.id,
                    c.name,
                    c.username,
                    c.host,
                    c.port,
                    c.auth_type
                );
            }
        }),
        ConnectionCmd::Remove { id } => remove_connection(storage, &keychain, &id)
            .await
            .map(|c| println!("removed {} ({})", c.name, c.id)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("scpsync: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn auth_request(
    key: Option<String>,
    passphrase_env: Option<&str>,
    password_env: Option<&str>,
) -> Result<AuthRequest, String> {
    match (key, password_env) {
        (Some(key_path), _) => Ok(AuthRequest::Key {
            key_path,
            passphrase: passphrase_env.map(read_secret_env).transpose()?,
        }),
        (None, Some(var)) => read_secret_env(var).map(AuthRequest::Password),
        (None, None) => Err("either --key or --password-env is required".to_string()),
    }
}

fn read_secret_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable {} is not set", var))
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        current_dir().join(path)
    }
}
