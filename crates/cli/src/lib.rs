use anyhow::{Context as AnyhowContext, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use command::domain::{
    ExplorePathPayload, FindFilesPayload, LimitOverrides, ReadFilePayload, SearchCodePayload,
    StructurePayload, TraceChainPayload, TraceMethodPayload,
};
use command::{CommandAction, CommandHandler, CommandRequest, CommandResponse, RequestOptions};
use navigator_protocol::serialize_json;
use navigator_resolver::CancelSignal;
use serde::Serialize;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

mod command;
mod http_api;
mod report;
mod server_security;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "repo-navigator")]
#[command(
    about = "Resolve paths and trace dependency chains in remote repositories",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,

    /// Repository source (overrides NAVIGATOR_SOURCE)
    #[arg(long, global = true, value_enum)]
    source: Option<SourceArg>,

    /// Fixture JSON used by the fixture source (overrides NAVIGATOR_FIXTURE)
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Resolver profile file, or `default` (overrides NAVIGATOR_PROFILE)
    #[arg(long, global = true)]
    profile: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Github,
    Fixture,
}

impl SourceArg {
    const fn as_str(self) -> &'static str {
        match self {
            SourceArg::Github => "github",
            SourceArg::Fixture => "fixture",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a path, falling back to the closest existing ancestor
    Explore(ExploreArgs),

    /// Follow a class definition upstream through its imports
    Trace(TraceArgs),

    /// Check whether a path exists (with suggestions when it does not)
    Exists(ExistsArgs),

    /// Print the text of one file
    Read(ReadArgs),

    /// Show a depth-bounded repository tree
    Structure(StructureArgs),

    /// Fuzzy-find files by path
    Find(FindArgs),

    /// Search file contents
    Search(SearchArgs),

    /// Locate usages of Class.method and its upstream implementation
    #[command(name = "trace-method")]
    TraceMethod(TraceMethodArgs),

    /// Map declared dependencies to upstream repositories
    #[command(name = "map-deps")]
    MapDeps(MapDepsArgs),

    /// Execute a JSON Command API request
    Command(CommandArgs),

    /// Serve Command API over HTTP (POST /command)
    ServeHttp(ServeArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Emit the full JSON response instead of a report
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExploreArgs {
    /// Repository as owner/name or a GitHub URL
    repo: String,

    /// Path inside the repository
    #[arg(default_value = "")]
    path: String,

    /// Branch, tag or commit
    #[arg(long)]
    branch: Option<String>,

    /// Maximum number of parent transitions
    #[arg(long)]
    max_fallback: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct TraceArgs {
    /// Repository as owner/name or a GitHub URL
    repo: String,

    /// Class, interface or enum name
    entity: String,

    /// Maximum number of chain nodes
    #[arg(long)]
    max_depth: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ExistsArgs {
    repo: String,

    path: String,

    #[arg(long)]
    branch: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ReadArgs {
    repo: String,

    /// File path inside the repository
    path: String,

    #[arg(long)]
    branch: Option<String>,

    /// Maximum number of characters returned
    #[arg(long)]
    max_chars: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct StructureArgs {
    repo: String,

    /// Directory to start from (default: repository root)
    #[arg(default_value = "")]
    path: String,

    #[arg(long)]
    branch: Option<String>,

    /// Depth below the start directory
    #[arg(long)]
    max_depth: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct FindArgs {
    repo: String,

    /// Fuzzy pattern matched against file paths
    pattern: String,

    #[arg(long)]
    branch: Option<String>,

    /// Only consider paths under these prefixes
    #[arg(long = "include")]
    include_paths: Vec<String>,

    /// Skip paths under these prefixes
    #[arg(long = "exclude")]
    exclude_paths: Vec<String>,

    /// Glob applied to file paths, e.g. "*.java"
    #[arg(long)]
    file_pattern: Option<String>,

    /// Maximum number of matches
    #[arg(long)]
    limit: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct SearchArgs {
    repo: String,

    /// Text to search for
    query: String,

    /// Only files with this extension, e.g. "java"
    #[arg(long)]
    extension: Option<String>,

    /// Only files at or below this directory
    #[arg(long = "path")]
    path_filter: Option<String>,

    /// Maximum number of hits
    #[arg(long)]
    limit: Option<usize>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct TraceMethodArgs {
    repo: String,

    /// Method as Class.method or package.Class.method
    method: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct MapDepsArgs {
    /// JSON file with {"dependencies": [...]} (default: stdin)
    #[arg(long)]
    file: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct CommandArgs {
    /// Inline JSON payload (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Path to file containing JSON payload
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:7800
    #[arg(long, default_value = "127.0.0.1:7800")]
    bind: String,

    /// Allow binding to non-loopback addresses (requires an auth token)
    #[arg(long)]
    public: bool,

    /// Require Authorization: Bearer <token> on all requests (env: NAVIGATOR_AUTH_TOKEN)
    #[arg(long)]
    auth_token: Option<String>,
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Explore(args) => args.output.json,
            Commands::Trace(args) => args.output.json,
            Commands::Exists(args) => args.output.json,
            Commands::Read(args) => args.output.json,
            Commands::Structure(args) => args.output.json,
            Commands::Find(args) => args.output.json,
            Commands::Search(args) => args.output.json,
            Commands::TraceMethod(args) => args.output.json,
            Commands::MapDeps(args) => args.output.json,
            Commands::Command(_) => true,
            Commands::ServeHttp(_) => false,
        }
    }
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    if let Some(source) = cli.source {
        env::set_var(command::SOURCE_ENV, source.as_str());
    }
    if let Some(fixture) = &cli.fixture {
        env::set_var(command::FIXTURE_ENV, fixture);
    }
    if let Some(profile) = &cli.profile {
        env::set_var(command::PROFILE_ENV, profile);
    }

    // JSON on stdout must stay parseable.
    if cli.command.wants_json() {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper are noisy at debug.
    if !cli.verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Explore(args) => {
            let options = limit_options(LimitOverrides {
                max_fallback: args.max_fallback,
                ..LimitOverrides::default()
            });
            let payload = ExplorePathPayload {
                repo: args.repo,
                path: args.path,
                branch: args.branch,
            };
            run_action(CommandAction::ExplorePath, payload, options, args.output.json).await?
        }
        Commands::Trace(args) => {
            let options = limit_options(LimitOverrides {
                max_depth: args.max_depth,
                ..LimitOverrides::default()
            });
            let payload = TraceChainPayload {
                repo: args.repo,
                entity: args.entity,
            };
            run_action(CommandAction::TraceChain, payload, options, args.output.json).await?
        }
        Commands::Exists(args) => {
            let payload = ExplorePathPayload {
                repo: args.repo,
                path: args.path,
                branch: args.branch,
            };
            run_action(CommandAction::CheckExists, payload, None, args.output.json).await?
        }
        Commands::Read(args) => {
            let options = limit_options(LimitOverrides {
                read_max_chars: args.max_chars,
                ..LimitOverrides::default()
            });
            let payload = ReadFilePayload {
                repo: args.repo,
                path: args.path,
                branch: args.branch,
            };
            run_action(CommandAction::ReadFile, payload, options, args.output.json).await?
        }
        Commands::Structure(args) => {
            let payload = StructurePayload {
                repo: args.repo,
                path: args.path,
                branch: args.branch,
                max_depth: args.max_depth,
            };
            run_action(CommandAction::Structure, payload, None, args.output.json).await?
        }
        Commands::Find(args) => {
            let options = RequestOptions {
                limits: LimitOverrides {
                    finder_limit: args.limit,
                    ..LimitOverrides::default()
                },
                include_paths: args.include_paths,
                exclude_paths: args.exclude_paths,
                file_pattern: args.file_pattern,
            };
            let payload = FindFilesPayload {
                repo: args.repo,
                pattern: args.pattern,
                branch: args.branch,
            };
            run_action(CommandAction::FindFiles, payload, Some(options), args.output.json).await?
        }
        Commands::Search(args) => {
            let payload = SearchCodePayload {
                repo: args.repo,
                query: args.query,
                file_extension: args.extension,
                path_filter: args.path_filter,
                limit: args.limit,
            };
            run_action(CommandAction::SearchCode, payload, None, args.output.json).await?
        }
        Commands::TraceMethod(args) => {
            let payload = TraceMethodPayload {
                repo: args.repo,
                method: args.method,
            };
            run_action(CommandAction::TraceMethod, payload, None, args.output.json).await?
        }
        Commands::MapDeps(args) => {
            let raw = read_input(None, args.file.as_ref())?;
            let payload: serde_json::Value =
                serde_json::from_str(&raw).context("Invalid dependency JSON")?;
            run_action(CommandAction::MapDependencies, payload, None, args.output.json).await?
        }
        Commands::Command(args) => run_command(args).await?,
        Commands::ServeHttp(args) => serve_http(args).await?,
    }

    Ok(())
}

fn limit_options(limits: LimitOverrides) -> Option<RequestOptions> {
    (!limits.is_empty()).then(|| RequestOptions {
        limits,
        ..RequestOptions::default()
    })
}

/// Runs a request while Ctrl-C cancels the in-flight remote call.
async fn execute_interruptible(request: CommandRequest) -> CommandResponse {
    let (handle, signal) = CancelSignal::pair();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            handle.cancel();
        }
    });
    let response = command::execute(request, &signal).await;
    watcher.abort();
    response
}

async fn run_action<P: Serialize>(
    action: CommandAction,
    payload: P,
    options: Option<RequestOptions>,
    json: bool,
) -> Result<()> {
    let request = CommandRequest {
        action,
        payload: serde_json::to_value(payload)?,
        options,
        config: None,
    };
    let response = execute_interruptible(request).await;

    if json {
        print_stdout(&serde_json::to_string_pretty(&response)?)?;
    } else if response.is_error() {
        eprintln!(
            "Error: {}",
            response.message.as_deref().unwrap_or("Unknown error")
        );
        for hint in &response.hints {
            eprintln!("Hint: {}", hint.text);
        }
    } else {
        print_stdout(&report::render(action, &response)?)?;
    }

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(args: CommandArgs) -> Result<()> {
    let raw = read_input(args.json.as_deref(), args.file.as_ref())?;
    let request: CommandRequest =
        serde_json::from_str(&raw).context("Invalid JSON passed to --json/--file")?;

    let response = execute_interruptible(request).await;

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serialize_json(&response)?
    };
    print_stdout(&output)?;

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_input(inline: Option<&str>, file: Option<&PathBuf>) -> Result<String> {
    if let Some(raw) = inline {
        return Ok(raw.to_string());
    }
    if let Some(path) = file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read JSON from stdin")?;

    if buffer.trim().is_empty() {
        anyhow::bail!("Input is empty. Provide --json, --file, or pipe JSON via stdin.");
    }

    Ok(buffer)
}

struct HttpState {
    handler: CommandHandler,
    auth_token: Option<server_security::AuthToken>,
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
}

async fn serve_http(args: ServeArgs) -> Result<()> {
    let addrs = server_security::guarded_bind_addrs(&args.bind, args.public).await?;
    let auth_token = server_security::AuthToken::from_flag_or_env(args.auth_token.as_deref())?;
    if args.public && auth_token.is_none() {
        anyhow::bail!(
            "--public requires an auth token: set --auth-token or export {}",
            server_security::AUTH_TOKEN_ENV
        );
    }

    let state = Arc::new(HttpState {
        handler: CommandHandler::remote(),
        auth_token,
    });
    let app = Router::new()
        .route("/command", post(http_command))
        .route("/health", get(http_health))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(addrs.as_slice()).await?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    print_stdout(&format!("Serving Command API: {base_url}/command"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    if state.auth_token.is_some() {
        print_stdout(&format!(
            "Auth enabled: add header 'Authorization: Bearer ${}'",
            server_security::AUTH_TOKEN_ENV
        ))?;
    }
    if args.public {
        let addrs = addrs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        print_stdout(&format!(
            "Public bind enabled (--public). Resolved addresses: {addrs}"
        ))?;
    }
    log::info!("Listening on {local_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

fn unauthorized(headers: &HeaderMap, state: &HttpState) -> Option<Result<Response, StatusCode>> {
    let token = state.auth_token.as_ref()?;
    if http_api::is_authorized(headers, token) {
        return None;
    }
    let response = http_api::rejection(
        "unauthorized",
        "Missing or invalid Authorization header".to_string(),
    );
    Some(http_api::json_response(StatusCode::UNAUTHORIZED, &response))
}

async fn http_command(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, StatusCode> {
    if let Some(rejected) = unauthorized(&headers, &state) {
        return rejected;
    }

    let request: CommandRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            let response =
                http_api::rejection("invalid_request", format!("Invalid JSON request: {err}"));
            return http_api::json_response(StatusCode::BAD_REQUEST, &response);
        }
    };
    // A dropped connection drops this future, which abandons the remote call.
    let response = state
        .handler
        .execute(request, &CancelSignal::never())
        .await;
    http_api::json_response(http_api::status_for(&response), &response)
}

async fn http_health(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    if let Some(rejected) = unauthorized(&headers, &state) {
        return rejected;
    }
    http_api::json_response(
        StatusCode::OK,
        &HealthReport {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
