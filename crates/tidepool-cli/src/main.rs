use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tidepool_core::{TidepoolConfig, Transport};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tidepool", version, about = "Tidepool: per-session MCP server for backend database tools")]
struct Cli {
    /// Configuration file. A missing file means built-in defaults.
    #[arg(long, short, global = true, default_value = "tidepool.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server.
    Serve {
        /// Transport to serve on (overrides mcp.transport).
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,

        /// Address to bind the HTTP transport to (overrides mcp.host).
        #[arg(long)]
        host: Option<String>,

        /// Port for the HTTP transport (overrides mcp.port).
        #[arg(long)]
        port: Option<u16>,

        /// Session id bound to the stdio transport (overrides mcp.session_id).
        #[arg(long)]
        session: Option<String>,

        /// SQLite file holding session state (overrides store.path).
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Manage Biscuit signing keys.
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Mint and verify session tokens.
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },

    /// Print the tool definitions every session exposes, as JSON.
    Tools,
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a new Ed25519 keypair.
    Generate {
        /// Directory to write private.key and public.key into.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Mint a session token.
    Mint {
        /// Private key: a file path or hex string.
        #[arg(long, env = "BISCUIT_PRIVATE_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Principal the token is issued to.
        #[arg(long)]
        user: String,

        /// Session id; a random one is assigned when omitted.
        #[arg(long)]
        session: Option<String>,

        /// Token lifetime, e.g. "24h", "7d", "30m" (defaults to biscuit.token_ttl).
        #[arg(long)]
        ttl: Option<String>,

        /// Write the token to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Verify a session token and print its claims.
    Verify {
        /// Public key: a file path or hex string.
        #[arg(long, env = "BISCUIT_PUBLIC_KEY", hide_env_values = true)]
        key: Option<String>,

        /// The token, or a file containing it.
        token: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TransportArg {
    Stdio,
    Http,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Transport::Stdio,
            TransportArg::Http => Transport::Http,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the stdio transport and command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve {
            transport,
            host,
            port,
            session,
            store,
        } => {
            let config = TidepoolConfig::load_or_default(&cli.config)?;
            let overrides = commands::serve::ServeOverrides {
                transport: transport.map(Transport::from),
                host,
                port,
                session,
                store,
            };
            commands::serve::run(config, overrides).await
        }
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { output } => commands::keys::generate(output),
        },
        Command::Token { cmd } => {
            let config = TidepoolConfig::load_or_default(&cli.config)?;
            match cmd {
                TokenCommand::Mint {
                    key,
                    user,
                    session,
                    ttl,
                    output,
                } => commands::token::mint(
                    &config.biscuit,
                    key,
                    &user,
                    session.as_deref(),
                    ttl,
                    output,
                ),
                TokenCommand::Verify { key, token } => {
                    commands::token::verify(&config.biscuit, key, token)
                }
            }
        }
        Command::Tools => commands::tools::list(),
    }
}
