use clap::Parser;

/// Command line interface for the application
#[derive(Parser, Debug)]
#[command(name = "taskweave", version, about = "Plan, approve and run multi-step LLM workflows")]
pub struct Cli {
    /// Path to the YAML or TOML configuration file
    #[arg(short, long, default_value_t = String::from("taskweave.yaml"))]
    pub config: String,

    /// Sets the logging verbosity level for the application
    /// Possible values: "error", "warn", "info", "debug", "trace"
    /// Default: "info"
    #[arg(long, default_value_t = String::from("info"))]
    pub logging_level: String,

    /// Also write logs to a daily rotating file under ./logs
    #[arg(long, default_value_t = false)]
    pub log_to_file: bool,

    /// Serve the HTTP API
    #[arg(long, default_value_t = false)]
    pub api_enabled: bool,

    /// Port of the HTTP API
    #[arg(long, default_value_t = 3000)]
    pub api_port: u16,

    /// Run one workflow for this request interactively
    #[arg(short, long)]
    pub request: Option<String>,

    /// Approve plans without asking
    #[arg(long, default_value_t = false)]
    pub auto_approve: bool,
}
