use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use iacscan_action::github::{GitHubClient, PullRequestRef};
use iacscan_action::pipeline::ScanPipeline;
use iacscan_action::scanner::ScanApiClient;
use iacscan_core::{IacScanConfig, IacScanError, OutputFormat, ScanConfig, Severity};

const CONFIG_FILE: &str = ".iacscan.toml";

#[derive(Parser)]
#[command(
    name = "iacscan",
    version,
    about = "Scan infrastructure-as-code changes in a pull request",
    long_about = "Uploads changed Terraform, CDK, JSON and YAML templates from a pull request\n\
                  to the template scanning service, waits for results and posts them back\n\
                  as pull request comments.\n\n\
                  Examples:\n  \
                    iacscan scan                                 Run with GitHub Actions env vars\n  \
                    iacscan scan --minimum-severity high         Fail on high or critical findings\n  \
                    iacscan init                                 Write a default .iacscan.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .iacscan.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for the run summary (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the pull request's changed templates and report findings
    #[command(long_about = "Scan the pull request's changed templates and report findings.\n\n\
        Every option can also be set through the environment variable shown in --help,\n\
        which is how the GitHub Action passes its inputs.\n\n\
        Examples:\n  iacscan scan --repository octo/infra --pr-number 12\n  iacscan scan --folder-path terraform/ --exclude-folder terraform/legacy")]
    Scan(ScanArgs),
    /// Create a default .iacscan.toml configuration file
    Init,
}

#[derive(Args)]
struct ScanArgs {
    /// Base URL of the scanning service
    #[arg(long, env = "URL")]
    api_url: Option<String>,

    /// Bearer token for the scanning service
    #[arg(long, env = "SIXPILLARS_API_TOKEN", hide_env_values = true)]
    api_token: String,

    /// GitHub token used to read files and post comments
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Repository in owner/repo form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Pull request number
    #[arg(long, env = "PULL_REQUEST_NUMBER")]
    pr_number: u64,

    /// GitHub API base URL (GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL")]
    github_api_url: Option<String>,

    /// Minimum severity that gets inline comments and fails the run
    #[arg(
        long,
        env = "MINIMUM_SEVERITY",
        long_help = "Minimum severity that gets inline comments and fails the run.\n\n\
                     One of critical, high, medium, low or none.\n\
                     Severity ranking: critical > high > medium > low."
    )]
    minimum_severity: Option<String>,

    /// Total polling budget in seconds
    #[arg(long, env = "TIMEOUT")]
    timeout: Option<String>,

    /// Seconds to wait between poll cycles
    #[arg(long, env = "POLL_INTERVAL")]
    poll_interval: Option<String>,

    /// Exact number of poll cycles, overriding the timeout
    #[arg(long)]
    poll_cycles: Option<u32>,

    /// Only scan paths containing this substring
    #[arg(long, env = "FOLDER_PATH")]
    folder_path: Option<String>,

    /// Skip paths containing this substring
    #[arg(long, env = "EXCLUDE_FOLDER")]
    exclude_folder: Option<String>,

    /// Do not post inline review comments
    #[arg(
        long,
        env = "SKIP_COMMENTS",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    skip_comments: bool,

    /// Accepted file suffix (repeatable, replaces the configured list)
    #[arg(long = "extension")]
    extensions: Vec<String>,
}

/// Everything a scan run needs once all configuration layers are applied.
#[derive(Debug)]
struct ScanSettings {
    api_url: String,
    report_url: String,
    pull_request: PullRequestRef,
    scan: ScanConfig,
}

const DEFAULT_CONFIG: &str = r#"# iacscan configuration
# Environment variables and command-line flags override these values.

[api]
# url = "https://api.example.com"
report_url = "https://app.6pillars.ai/template-scanner-results"

[scan]
extensions = [".tf", ".ts", ".json", ".yaml"]
folder_path = ""
exclude_folder = ""
# minimum_severity = "high"   # critical, high, medium, low or none
timeout_secs = 1200
poll_interval_secs = 300
skip_comments = false
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            eprintln!("Created {CONFIG_FILE}");
        }
        Command::Scan(ref args) => {
            let file_config = load_config(cli.config.as_deref())?;
            let settings = resolve_settings(file_config, args)?;
            tracing::debug!(?settings, "resolved settings");

            let github = GitHubClient::new(
                &args.github_token,
                args.github_api_url.as_deref(),
                settings.pull_request.clone(),
            )?;
            let scanner = ScanApiClient::new(&settings.api_url, &args.api_token)?;

            tracing::info!(pull_request = %github.pull_request(), "starting scan");
            let minimum = settings.scan.minimum_severity;
            let pipeline = ScanPipeline::new(&github, &scanner, settings.scan, settings.report_url);
            let outcome = pipeline.run().await?;

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&outcome).into_diagnostic()?
                    );
                }
                OutputFormat::Text => print!("{outcome}"),
            }

            if outcome.failed {
                let severity = minimum.map_or_else(|| "none".to_string(), |s| s.to_string());
                miette::bail!(miette::miette!(
                    help = "Fix the findings or raise MINIMUM_SEVERITY",
                    "Security scan found issues at or above '{severity}' severity"
                ));
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("IACSCAN_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<IacScanConfig, IacScanError> {
    match path {
        Some(path) => IacScanConfig::from_file(path),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                IacScanConfig::from_file(default_path)
            } else {
                Ok(IacScanConfig::default())
            }
        }
    }
}

/// Apply flag and environment overrides on top of the file configuration.
fn resolve_settings(config: IacScanConfig, args: &ScanArgs) -> Result<ScanSettings, IacScanError> {
    let mut scan = config.scan;

    if let Some(raw) = non_empty(&args.minimum_severity) {
        scan.minimum_severity = Severity::parse_threshold(raw).map_err(IacScanError::Config)?;
    }
    if let Some(secs) = parse_number("TIMEOUT", &args.timeout)? {
        scan.timeout_secs = secs;
    }
    if let Some(secs) = parse_number("POLL_INTERVAL", &args.poll_interval)? {
        scan.poll_interval_secs = secs;
    }
    if args.poll_cycles.is_some() {
        scan.poll_cycles = args.poll_cycles;
    }
    if let Some(folder) = &args.folder_path {
        scan.folder_path = folder.clone();
    }
    if let Some(folder) = &args.exclude_folder {
        scan.exclude_folder = folder.clone();
    }
    if !args.extensions.is_empty() {
        scan.extensions = args.extensions.clone();
    }
    scan.skip_comments |= args.skip_comments;
    scan.validate()?;

    let api_url = non_empty(&args.api_url)
        .or(config.api.url.as_deref().filter(|u| !u.trim().is_empty()))
        .ok_or_else(|| {
            IacScanError::Config("scanning service URL not set. Pass --api-url or set URL".into())
        })?
        .to_string();
    if args.api_token.trim().is_empty() {
        return Err(IacScanError::Config(
            "SIXPILLARS_API_TOKEN not set. Pass --api-token or set SIXPILLARS_API_TOKEN".into(),
        ));
    }

    Ok(ScanSettings {
        api_url,
        report_url: config.api.report_url,
        pull_request: PullRequestRef::parse(&args.repository, args.pr_number)?,
        scan,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(name: &str, value: &Option<String>) -> Result<Option<u64>, IacScanError> {
    non_empty(value)
        .map(|v| {
            v.parse()
                .map_err(|_| IacScanError::Config(format!("{name} must be a number of seconds, got '{v}'")))
        })
        .transpose()
}
