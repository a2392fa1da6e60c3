use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use futuremesh::prelude::*;
use futuremesh::{NotificationFeed, SessionEvent};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Types
// ============================================================================

/// FutureMesh - command-line client for the campus placement network
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// API base URL (overrides FUTUREMESH_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Session file (overrides FUTUREMESH_STORAGE)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "FUTUREMESH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account from a JSON profile file and log in
    Register {
        /// Path to the registration payload (email, password, role, ...)
        #[arg(long)]
        file: PathBuf,
    },

    /// End the stored session
    Logout,

    /// Show the stored user without contacting the server
    Whoami,

    /// Check the stored token with the server
    Verify,

    /// Print the navigation menu for the stored user's role
    Menu,

    /// List notifications
    Notifications {
        /// Show every notification instead of the newest few
        #[arg(long)]
        all: bool,
    },

    /// Change or reset the password
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },

    /// Stay signed in: revalidate the token and poll notifications until Ctrl-C
    Watch {
        /// Also open the real-time WebSocket at this URL
        #[arg(long)]
        realtime: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PasswordAction {
    /// Change the password of the signed-in user
    Change {
        #[arg(long)]
        current: String,

        #[arg(long)]
        new: String,
    },

    /// Ask for a password-reset email
    ResetRequest {
        #[arg(long)]
        email: String,
    },

    /// Set a new password with the token from a reset email
    Reset {
        #[arg(long)]
        token: String,

        #[arg(long)]
        new: String,
    },
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    if let Some(path) = &cli.storage {
        config.storage_path = path.clone();
    }
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli);

    let client = match FutureMesh::open(config) {
        Ok(client) => client,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run(client: &FutureMesh, command: Commands) -> Result<(), FutureMeshError> {
    let session = client.session();
    match command {
        Commands::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Logged in as {} ({})", user.display_name(), user.role);
        }
        Commands::Register { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let payload: serde_json::Value = serde_json::from_str(&raw)?;
            let user = session.register(&payload).await?;
            println!("Registered {} ({})", user.display_name(), user.role);
        }
        Commands::Logout => {
            session.logout();
            println!("Logged out");
        }
        Commands::Whoami => match session.current_user() {
            Some(user) => {
                println!("{} ({})", user.display_name(), user.role);
                println!("id: {}", user.id);
            }
            None => println!("Not logged in"),
        },
        Commands::Verify => {
            let user = session.restore().await?;
            println!("Session valid for {} ({})", user.display_name(), user.role);
        }
        Commands::Menu => {
            if session.current_user().is_none() {
                println!("Not logged in");
            }
            for item in session.menu() {
                println!("{:<16} {}", item.text, item.href);
            }
        }
        Commands::Notifications { all } => {
            let feed = client.notifications().fetch().await?;
            let max = if all { feed.len() } else { client.config().notify.max_visible };
            print_feed(&feed, max);
        }
        Commands::Password { action } => run_password(client, action).await?,
        Commands::Watch { realtime } => watch(client, realtime).await?,
    }
    Ok(())
}

async fn run_password(client: &FutureMesh, action: PasswordAction) -> Result<(), FutureMeshError> {
    let session = client.session();
    match action {
        PasswordAction::Change { current, new } => {
            let resp = session.change_password(&current, &new).await?;
            println!("{}", resp.message.as_deref().unwrap_or("Password changed"));
        }
        PasswordAction::ResetRequest { email } => {
            let body = session.request_password_reset(&email).await?;
            println!("{}", server_message(&body, "Reset email requested"));
        }
        PasswordAction::Reset { token, new } => {
            let body = session.reset_password(&token, &new).await?;
            println!("{}", server_message(&body, "Password reset"));
        }
    }
    Ok(())
}

async fn watch(client: &FutureMesh, realtime: Option<String>) -> Result<(), FutureMeshError> {
    let session = client.session();
    let user = session.restore().await?;
    println!("Watching session of {} ({}), Ctrl-C to stop", user.display_name(), user.role);

    let poller = client.start_background();
    let mut feeds = poller.subscribe();
    let mut events = session.subscribe();
    let mut pushes = match realtime {
        Some(url) => Some(client.connect_realtime(&url).await?),
        None => None,
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = feeds.changed() => {
                if changed.is_err() {
                    break;
                }
                let feed = feeds.borrow_and_update().clone();
                print_feed(&feed, client.config().notify.max_visible);
            }
            event = events.recv() => {
                if let Ok(SessionEvent::Invalidated { .. }) = event {
                    break;
                }
            }
            push = recv_push(&mut pushes) => match push {
                Some(text) => println!("[live] {text}"),
                None => pushes = None,
            },
        }
        if !session.is_authenticated() {
            println!("Session ended");
            break;
        }
    }
    Ok(())
}

async fn recv_push(
    pushes: &mut Option<tokio::sync::mpsc::UnboundedReceiver<String>>,
) -> Option<String> {
    match pushes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Output
// ============================================================================

fn server_message(body: &serde_json::Value, fallback: &str) -> String {
    body.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or(fallback)
        .to_string()
}

fn print_feed(feed: &NotificationFeed, max: usize) {
    println!("{} unread", feed.unread_count);
    if feed.is_empty() {
        println!("No notifications. You're all caught up!");
        return;
    }
    for n in feed.visible(max) {
        let marker = if n.is_read { ' ' } else { '*' };
        println!("{marker} {}: {}", n.title, n.message);
    }
}
