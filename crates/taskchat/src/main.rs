mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use taskchat::api::SortOrder;
use taskchat::config::DEFAULT_CONFIG_FILE;

// ============================================================================
// CLI Types
// ============================================================================

/// taskchat - chat with your assistant and manage the tasks it extracts
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "TASKCHAT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Start an interactive chat
    Chat {
        /// Continue an existing chat session
        #[arg(short, long)]
        session: Option<String>,

        /// Start a new session even when --session is given
        #[arg(long)]
        new: bool,
    },

    /// Print the messages of a chat session
    Messages {
        #[arg(value_name = "SESSION_ID")]
        session_id: String,
    },

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Manage chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand, Debug)]
enum TaskAction {
    /// List tasks
    List {
        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        sort_by: Option<String>,

        /// asc or desc
        #[arg(long)]
        sort_order: Option<SortOrder>,
    },

    /// Show a single task
    Show { id: String },

    /// Create a task
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        session: Option<String>,
    },

    /// Update fields of a task
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        decision: Option<String>,
    },

    /// Delete a task
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// List sessions
    List {
        /// List soft-deleted sessions instead
        #[arg(long)]
        deleted: bool,
    },

    /// Change a session's title
    Rename { id: String, title: String },

    /// Move a session to the trash
    Delete { id: String },

    /// Bring a deleted session back
    Restore { id: String },

    /// Permanently delete a session
    Purge {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete several sessions
    BulkDelete {
        #[arg(required = true, value_name = "SESSION_ID")]
        ids: Vec<String>,

        #[arg(short, long)]
        yes: bool,
    },

    /// Restore several sessions
    BulkRestore {
        #[arg(required = true, value_name = "SESSION_ID")]
        ids: Vec<String>,

        #[arg(short, long)]
        yes: bool,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_str();

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(config, &email, &password).await
        }
        Commands::Logout => commands::auth::logout(config).await,
        Commands::Whoami => commands::auth::whoami(config).await,
        Commands::Chat { session, new } => commands::chat::run(config, session, new).await,
        Commands::Messages { session_id } => commands::chat::messages(config, &session_id).await,
        Commands::Tasks { action } => match action {
            TaskAction::List {
                session,
                status,
                limit,
                offset,
                search,
                sort_by,
                sort_order,
            } => {
                let query = taskchat::api::TaskQuery {
                    session_id: session,
                    status,
                    limit,
                    offset,
                    search,
                    sort_by,
                    sort_order,
                };
                commands::tasks::list(config, &query).await
            }
            TaskAction::Show { id } => commands::tasks::show(config, &id).await,
            TaskAction::Create {
                title,
                description,
                session,
            } => commands::tasks::create(config, title, description, session).await,
            TaskAction::Update {
                id,
                title,
                description,
                status,
                decision,
            } => {
                let patch = taskchat::api::TaskPatch {
                    title,
                    description,
                    status,
                    decision,
                    ..Default::default()
                };
                commands::tasks::update(config, &id, &patch).await
            }
            TaskAction::Delete { id } => commands::tasks::delete(config, &id).await,
        },
        Commands::Sessions { action } => match action {
            SessionAction::List { deleted } => commands::sessions::list(config, deleted).await,
            SessionAction::Rename { id, title } => {
                commands::sessions::rename(config, &id, title).await
            }
            SessionAction::Delete { id } => commands::sessions::delete(config, &id).await,
            SessionAction::Restore { id } => commands::sessions::restore(config, &id).await,
            SessionAction::Purge { id, yes } => commands::sessions::purge(config, &id, yes).await,
            SessionAction::BulkDelete { ids, yes } => {
                commands::sessions::bulk_delete(config, &ids, yes).await
            }
            SessionAction::BulkRestore { ids, yes } => {
                commands::sessions::bulk_restore(config, &ids, yes).await
            }
        },
    }
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
