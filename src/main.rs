//! galera-router
//!
//! Keeps ProxySQL's writer and reader hostgroups in line with the health of a
//! Galera cluster. Meant to be run periodically by a scheduler.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐   wsrep status   ┌──────────────────────────────────┐
//!   │ Galera nodes │◀─────────────────│            reconcile             │
//!   └──────────────┘                  │  discovery → health → planner    │
//!                                     │            → diff → apply        │
//!   ┌──────────────┐   mysql_servers  │                                  │
//!   │ ProxySQL     │◀─────────────────│                                  │
//!   │ admin :6032  │   LOAD/SAVE      └──────────────────────────────────┘
//!   └──────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use galera_router::cluster::MySqlNodeAccessor;
use galera_router::config::{load_config, RouterConfig, DEFAULT_CONFIG_PATH};
use galera_router::net::NodeAddr;
use galera_router::observability::logging;
use galera_router::registry::user::{self, RouterUser, UserChanges};
use galera_router::registry::{BackendStatus, ProxySqlAdmin};
use galera_router::Reconciler;

#[derive(Parser)]
#[command(name = "galera-router")]
#[command(about = "Synchronise a Galera cluster into ProxySQL hostgroups", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the ProxySQL admin interface answers
    Ping,
    /// Galera cluster commands
    Galera {
        #[command(subcommand)]
        command: GaleraCommands,
    },
}

#[derive(Subcommand)]
enum GaleraCommands {
    /// Run one reconciliation pass
    Register,
    /// Inspect or change individual servers
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Manage ProxySQL users (mysql_users)
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Print both hostgroups as JSON
    Status,
    /// Set or clear the operator override of a server
    SetAdminStatus {
        /// host:port
        server: NodeAddr,
        /// ONLINE, OFFLINE_SOFT or OFFLINE_HARD; omit to clear
        #[arg(long)]
        status: Option<BackendStatus>,
    },
    /// Desynchronise a node (wsrep_desync = ON)
    SetDesync { server: NodeAddr },
    /// Resynchronise a node (wsrep_desync = OFF)
    SetSync { server: NodeAddr },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Print every user as JSON
    List,
    /// Add a user
    Create {
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        #[command(flatten)]
        options: UserOptions,
    },
    /// Change the password of an existing user
    SetPassword {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Change columns of an existing user
    Modify {
        username: String,
        #[command(flatten)]
        options: UserOptions,
    },
    /// Delete a user
    Delete { username: String },
}

/// `mysql_users` columns; unset options keep their current (or default) value.
#[derive(Args)]
struct UserOptions {
    #[arg(long, value_name = "BOOL")]
    active: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    use_ssl: Option<bool>,
    #[arg(long)]
    default_hostgroup: Option<u32>,
    #[arg(long)]
    default_schema: Option<String>,
    #[arg(long, value_name = "BOOL")]
    schema_locked: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    transaction_persistent: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    fast_forward: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    backend: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    frontend: Option<bool>,
    #[arg(long)]
    max_connections: Option<u32>,
}

impl From<UserOptions> for UserChanges {
    fn from(o: UserOptions) -> Self {
        UserChanges {
            active: o.active,
            use_ssl: o.use_ssl,
            default_hostgroup: o.default_hostgroup,
            default_schema: o.default_schema,
            schema_locked: o.schema_locked,
            transaction_persistent: o.transaction_persistent,
            fast_forward: o.fast_forward,
            backend: o.backend,
            frontend: o.frontend,
            max_connections: o.max_connections,
        }
    }
}

fn admin(config: &RouterConfig) -> ProxySqlAdmin {
    ProxySqlAdmin::new(
        config.proxysql.endpoint(),
        config.proxysql.admin_credentials(),
        config.timeouts.admin_connect(),
    )
}

fn reconciler(config: &RouterConfig, span: tracing::Span) -> Reconciler {
    let nodes = MySqlNodeAccessor::new(config.galera.credentials(), config.timeouts.node_connect());
    let reconciler = Reconciler::new(Arc::new(nodes), Arc::new(admin(config))).with_span(span);
    match config.proxysql.monitor_credentials() {
        Some(monitor) => reconciler.with_monitor_credentials(monitor),
        None => reconciler,
    }
}

async fn run(
    command: Commands,
    config: &RouterConfig,
    span: tracing::Span,
) -> Result<(), Box<dyn std::error::Error>> {
    let reconciler = reconciler(config, span);
    let hostgroups = [
        config.galera.writer_hostgroup_id,
        config.galera.reader_hostgroup_id,
    ];

    match command {
        Commands::Ping => {
            reconciler.ping().await?;
            tracing::info!("ProxySQL admin interface is reachable");
        }
        Commands::Galera { command } => match command {
            GaleraCommands::Register => {
                let report = reconciler.reconcile(&config.reconcile_request()).await?;
                for mutation in &report.mutations {
                    tracing::info!(mutation = %mutation, "Applied");
                }
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            GaleraCommands::Server { command } => match command {
                ServerCommands::Status => {
                    let writers = reconciler.status(hostgroups[0]).await?;
                    let readers = reconciler.status(hostgroups[1]).await?;
                    let status = serde_json::json!({
                        "writer_hostgroup": { "id": hostgroups[0], "backends": writers },
                        "reader_hostgroup": { "id": hostgroups[1], "backends": readers },
                    });
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                ServerCommands::SetAdminStatus { server, status } => {
                    reconciler
                        .set_admin_override(&hostgroups, &server, status)
                        .await?;
                }
                ServerCommands::SetDesync { server } => {
                    reconciler.set_desync(&server, true).await?;
                }
                ServerCommands::SetSync { server } => {
                    reconciler.set_desync(&server, false).await?;
                }
            },
            GaleraCommands::User { command } => run_user(command, &admin(config)).await?,
        },
    }
    Ok(())
}

async fn run_user(
    command: UserCommands,
    admin: &ProxySqlAdmin,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        UserCommands::List => {
            let users = user::list_users(admin).await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
        UserCommands::Create {
            username,
            password,
            options,
        } => {
            let mut new_user = RouterUser::new(username, password);
            UserChanges::from(options).apply(&mut new_user);
            user::create_user(admin, &new_user).await?;
        }
        UserCommands::SetPassword { username, password } => {
            user::set_password(admin, &username, &password).await?;
        }
        UserCommands::Modify { username, options } => {
            user::modify_user(admin, &username, &options.into()).await?;
        }
        UserCommands::Delete { username } => {
            user::delete_user(admin, &username).await?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&Default::default(), cli.debug);
            tracing::error!(path = %cli.config.display(), error = %e, "Cannot load configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.observability, cli.debug);

    let span = tracing::info_span!("galera_router", config = %cli.config.display());
    match run(cli.command, &config, span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
