use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oktaform")]
#[command(about = "Declarative provisioning for Okta orgs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Declarations file
    #[arg(short, long, global = true, default_value = "oktaform.json")]
    pub config: PathBuf,

    /// State file (defaults to `<config>.state.json` beside the declarations)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Concurrent resource operations during refresh and apply
    #[arg(long, global = true)]
    pub parallelism: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub env: EnvArgs,
}

/// Connection settings read from the environment. The `provider` section of
/// the declarations file takes precedence over every one of these.
#[derive(Args, Clone, Default)]
pub struct EnvArgs {
    #[arg(long, env = "OKTA_ORG_NAME")]
    pub org_name: Option<String>,

    #[arg(long, env = "OKTA_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "OKTA_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, env = "OKTA_API_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Comma-separated OAuth scopes for private-key auth
    #[arg(long, env = "OKTA_API_SCOPES", value_delimiter = ',')]
    pub scopes: Vec<String>,

    /// PEM-encoded private key, or a path to one
    #[arg(long, env = "OKTA_API_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long, env = "OKTA_API_PRIVATE_KEY_ID")]
    pub private_key_id: Option<String>,

    /// Process-wide cap on in-flight API requests
    #[arg(long, env = "OKTA_MAX_PARALLEL_REQUESTS")]
    pub max_parallel_requests: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh state and show what apply would change
    Plan(PlanArgs),
    /// Refresh state and reconcile the org with the declarations
    Apply(PlanArgs),
    /// Delete every tracked resource
    Destroy,
    /// Bring an existing object under management
    Import(ImportArgs),
    /// Print every resource schema as JSON
    Schema,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Skip the refresh and plan against recorded state
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Resource address, e.g. okta_auth_server_scope.read_users
    pub address: String,
    /// Remote ID; compound IDs are slash-separated, e.g. aus1/scp2
    pub id: String,
}
