//! Codedrop CLI
//!
//! Command-line entry point for retrieving and sharing snippets.

use std::io::Write;
use std::path::Path;
use std::process::{ExitCode, Stdio};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use codedrop_display::{
    copy_or_warn, format_timestamp, DisplayKind, DisplaySnippet, HtmlRenderer, TextRenderer,
};
use codedrop_retrieval::{
    AccessCode, CodedropError, Config, ContentKind, ContentOpener, DeepLink, DocumentViewer,
    ExpirationDays, FallbackAction, HttpDownloader, HttpFrame, HttpSnippetClient, NewSnippet,
    NoticeKind, Notifier, PageScroll, RetrievalEvent, RetrievalSession, RetrievalStatus,
    SnippetContentType, SnippetRecord, UrlDeepLink, ViewerLoadState,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

/// Codedrop - share and retrieve snippets with a 4-digit code.
#[derive(Parser, Debug)]
#[command(name = "codedrop")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (default: ./codedrop.json)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve a snippet by its access code
    Get(GetArgs),
    /// Share a file and print its access code
    Share(ShareArgs),
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    /// 4-digit access code (prompted for when neither this nor --link is given)
    code: Option<String>,

    /// Page URL carrying a `?code=` deep link
    #[arg(long, value_name = "URL", conflicts_with = "code")]
    link: Option<String>,

    /// Password for a protected snippet
    #[arg(long)]
    password: Option<String>,

    /// Show links without opening them
    #[arg(long)]
    no_auto_open: bool,

    /// Output format for the snippet
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Copy the snippet content to the clipboard
    #[arg(long)]
    copy: bool,
}

#[derive(clap::Args, Debug)]
struct ShareArgs {
    /// File to share ("-" reads stdin)
    file: String,

    /// How the content should be displayed
    #[arg(long = "type", value_enum, default_value_t = ShareType::Plain)]
    content_type: ShareType,

    /// Language hint for code snippets
    #[arg(long)]
    language: Option<String>,

    /// Days until the snippet expires (1, 3, 7 or 30)
    #[arg(long, default_value = "1", value_parser = parse_expiration)]
    expires: ExpirationDays,

    /// Protect the snippet with a password
    #[arg(long)]
    password: Option<String>,

    /// Copy the access code to the clipboard
    #[arg(long)]
    copy: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Html,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ShareType {
    Plain,
    Markdown,
    Code,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing subscriber with env filter
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    tracing::debug!(
        api = %config.api_base_url,
        app = %config.app_url,
        "Configuration loaded"
    );

    match args.command {
        Command::Get(get) => run_get(config, get).await,
        Command::Share(share) => run_share(&config, share).await.map(|()| ExitCode::SUCCESS),
    }
}

// ============================================================================
// get
// ============================================================================

async fn run_get(config: Config, args: GetArgs) -> anyhow::Result<ExitCode> {
    let client = HttpSnippetClient::new(&config.api_base_url, config.request_timeout())?;
    let page = args.link.as_deref().unwrap_or(&config.app_url);
    let deep_link = Arc::new(UrlDeepLink::parse(page)?);
    let (requests_tx, mut requests) = mpsc::unbounded_channel();

    let session = RetrievalSession::new(config.clone(), Arc::new(client))?
        .with_deep_link(deep_link.clone())
        .with_opener(Arc::new(ChannelOpener { requests: requests_tx }))
        .with_notifier(Arc::new(TerminalNotifier));
    let mut events = session.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let mut status = match (args.code.as_deref(), args.link.is_some()) {
        (Some(code), _) => {
            // Report malformed input once, through the exit path.
            AccessCode::parse(code)?;
            session.submit_code(code).await?
        }
        (None, true) => session.start_from_deep_link().await?.ok_or_else(|| {
            anyhow::anyhow!(
                "No valid access code in '{page}'\n\nSuggestion: The link must carry ?code= followed by 4 digits"
            )
        })?,
        (None, false) => read_code(&session, &mut input).await?,
    };

    let mut password = args.password;
    while status == RetrievalStatus::ProtectionPending {
        let attempt = match password.take() {
            Some(given) => Some(given),
            None => prompt(&mut input, "Password: ").await?,
        };
        let Some(attempt) = attempt.filter(|p| !p.is_empty()) else {
            session.cancel_password_prompt();
            anyhow::bail!("This snippet is password protected\n\nSuggestion: Pass --password or enter it when prompted");
        };
        status = session.submit_password(&attempt).await?;
        if let Some(message) = session.snapshot().password_error {
            eprintln!("{message}");
        }
    }

    let state = session.snapshot();
    let Some(record) = state.record.as_ref().filter(|_| status == RetrievalStatus::Displaying)
    else {
        // The notifier has already reported the failure.
        tracing::debug!(status = %status, "Retrieval did not display a snippet");
        return Ok(ExitCode::from(1));
    };

    print_snippet(record, args.format)?;
    tracing::debug!(url = %deep_link.current_url(), "Deep link updated");

    if args.copy && copy_or_warn(&record.content) {
        println!("Copied to clipboard!");
    }

    let Some(kind) = state.classification.filter(|kind| kind.is_openable()) else {
        return Ok(ExitCode::SUCCESS);
    };

    if args.no_auto_open {
        session.cancel_auto_open();
        println!("{} link: {}", capitalize(kind.label()), record.content.trim());
        return Ok(ExitCode::SUCCESS);
    }

    follow_content(&session, kind, &mut events, &mut requests, &config, &mut input).await?;
    Ok(ExitCode::SUCCESS)
}

/// Reads a code from stdin, feeding it through the code field sanitizer.
async fn read_code(session: &RetrievalSession, input: &mut Input) -> anyhow::Result<RetrievalStatus> {
    let line = prompt(input, "Access code: ").await?.unwrap_or_default();
    let (value, status) = session.enter_code_input(&line).await?;
    match status {
        Some(status) => Ok(status),
        None => Err(CodedropError::invalid_code(value).into()),
    }
}

/// Waits for the countdown to open the content, or for Ctrl+C to stop it.
async fn follow_content(
    session: &RetrievalSession,
    kind: ContentKind,
    events: &mut broadcast::Receiver<RetrievalEvent>,
    requests: &mut mpsc::UnboundedReceiver<OpenRequest>,
    config: &Config,
    input: &mut Input,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                println!();
                session.reset();
                println!("Auto-open cancelled");
                return Ok(());
            }
            Some(request) = requests.recv() => {
                println!();
                return match request {
                    OpenRequest::Website(url) => {
                        BrowserOpener.open_website(&url)?;
                        println!("Opened {url}");
                        Ok(())
                    }
                    OpenRequest::Document(url) => view_document(&url, config, input).await,
                };
            }
            event = events.recv() => match event {
                Ok(RetrievalEvent::CountdownTick(tick)) => print_countdown(kind, tick.remaining),
                Ok(RetrievalEvent::CountdownCancelled | RetrievalEvent::Reset) => return Ok(()),
                Ok(other) => tracing::trace!(?other, "Event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// Runs the document viewer for `url` until the user closes it.
async fn view_document(url: &str, config: &Config, input: &mut Input) -> anyhow::Result<()> {
    let frame = HttpFrame::new(config.request_timeout())?;
    let scroll = Arc::new(PageScroll::default());
    let mut viewer = DocumentViewer::open(url, frame, scroll, config.viewer.clone());
    let mut state = viewer.load().await;

    loop {
        let actions = match state {
            ViewerLoadState::Loaded => {
                println!("Document loaded: {url}");
                vec![FallbackAction::OpenExternally, FallbackAction::Download]
            }
            _ => {
                print_viewer_problem(state, viewer.last_error());
                viewer.fallback_actions()
            }
        };

        for (index, action) in actions.iter().enumerate() {
            println!("  [{}] {}", index + 1, action.label());
        }
        println!("  [Enter] Close");

        let choice = prompt(input, "> ").await?.unwrap_or_default();
        let Some(action) = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| actions.get(n).copied())
        else {
            break;
        };

        match action {
            FallbackAction::OpenExternally => {
                viewer.open_externally(&BrowserOpener)?;
                println!("Opened {url}");
                break;
            }
            FallbackAction::Download => {
                let downloader = HttpDownloader::new(&config.download_dir, config.request_timeout())?;
                let path = viewer.download(&downloader).await?;
                println!("Saved to {}", path.display());
                break;
            }
            FallbackAction::Retry => {
                println!("Retrying...");
                state = viewer.retry().await;
            }
        }
    }

    viewer.close();
    Ok(())
}

// ============================================================================
// share
// ============================================================================

async fn run_share(config: &Config, args: ShareArgs) -> anyhow::Result<()> {
    let content = if args.file == "-" {
        let mut buffer = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut buffer).await?;
        buffer
    } else {
        tokio::fs::read_to_string(&args.file).await.map_err(|e| {
            anyhow::anyhow!(
                "Cannot read '{}': {e}\n\nSuggestion: Check the path, or pass - to read from stdin",
                args.file
            )
        })?
    };

    let mut snippet = NewSnippet::new(content, convert_share_type(args.content_type))
        .with_expiration(args.expires);
    if let Some(language) = args.language {
        snippet = snippet.with_language(language);
    }
    if let Some(password) = args.password {
        snippet = snippet.with_password(password);
    }

    let client = HttpSnippetClient::new(&config.api_base_url, config.request_timeout())?;
    let created = client.create_snippet(&snippet).await?;

    let link = UrlDeepLink::parse(&config.app_url)?;
    link.set_code(&AccessCode::parse(&created.code)?);

    println!("Access code: {}", created.code);
    println!("Link: {}", link.current_url());
    println!(
        "Expires in {} ({})",
        args.expires.description(),
        format_timestamp(&created.expires_at.with_timezone(&chrono::Local))
    );
    if snippet.is_protected {
        println!("Password protected");
    }

    if args.copy && copy_or_warn(&created.code) {
        println!("Code copied to clipboard!");
    }
    Ok(())
}

fn parse_expiration(value: &str) -> Result<ExpirationDays, String> {
    let days: u8 = value
        .parse()
        .map_err(|_| format!("invalid expiration '{value}': expected one of 1, 3, 7, 30"))?;
    ExpirationDays::try_from(days)
}

// ============================================================================
// Collaborators
// ============================================================================

/// Content the session asked to open.
#[derive(Debug)]
enum OpenRequest {
    Website(String),
    Document(String),
}

/// Hands open requests to the terminal loop.
struct ChannelOpener {
    requests: mpsc::UnboundedSender<OpenRequest>,
}

impl ChannelOpener {
    fn send(&self, request: OpenRequest, url: &str) -> codedrop_retrieval::Result<()> {
        self.requests
            .send(request)
            .map_err(|_| CodedropError::open_failed(url, "terminal is no longer listening"))
    }
}

impl ContentOpener for ChannelOpener {
    fn open_website(&self, url: &str) -> codedrop_retrieval::Result<()> {
        self.send(OpenRequest::Website(url.to_string()), url)
    }

    fn open_document(&self, url: &str) -> codedrop_retrieval::Result<()> {
        self.send(OpenRequest::Document(url.to_string()), url)
    }
}

/// Opens URLs with the platform's default handler.
struct BrowserOpener;

impl ContentOpener for BrowserOpener {
    fn open_website(&self, url: &str) -> codedrop_retrieval::Result<()> {
        let mut command = browser_command(url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
            .spawn()
            .map(|_| ())
            .map_err(|e| CodedropError::open_failed(url, e.to_string()))
    }

    fn open_document(&self, url: &str) -> codedrop_retrieval::Result<()> {
        self.open_website(url)
    }
}

#[cfg(target_os = "macos")]
fn browser_command(url: &str) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn browser_command(url: &str) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn browser_command(url: &str) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("xdg-open");
    command.arg(url);
    command
}

/// Prints notices to stderr.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => eprintln!("Error: {message}"),
            NoticeKind::Success | NoticeKind::Info => eprintln!("{message}"),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            let mut config = Config::load_from_file(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => Ok(Config::load()?),
    }
}

/// Prints a line prompt and reads the answer. `None` means stdin closed.
async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// Prints the retrieved snippet.
fn print_snippet(record: &SnippetRecord, format: OutputFormat) -> anyhow::Result<()> {
    let snippet = convert_snippet(record);
    match format {
        OutputFormat::Text => println!("{}", TextRenderer::new(&snippet).render()),
        OutputFormat::Html => println!("{}", HtmlRenderer::new(&snippet).render()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
    }
    Ok(())
}

/// Prints the countdown on a single line.
fn print_countdown(kind: ContentKind, remaining: u32) {
    print!(
        "\rOpening {} in {remaining} second{}... (Ctrl+C to cancel) ",
        kind.label(),
        if remaining == 1 { "" } else { "s" }
    );
    let _ = std::io::stdout().flush();
}

/// Prints why the viewer could not show the document.
fn print_viewer_problem(state: ViewerLoadState, error: Option<&str>) {
    match (state, error) {
        (ViewerLoadState::Errored, Some(message)) => println!("{message}"),
        (ViewerLoadState::Errored, None) => println!("Failed to load PDF"),
        _ => println!("This PDF cannot be displayed inline."),
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

/// Converts a retrieved `SnippetRecord` to a `DisplaySnippet`.
fn convert_snippet(record: &SnippetRecord) -> DisplaySnippet {
    DisplaySnippet {
        content: record.content.clone(),
        kind: convert_content_type(record.content_type),
        language: record.language_hint().map(str::to_string),
        created_at: record.created_at,
        expires_at: record.expires_at,
        views: record.views,
    }
}

/// Converts `SnippetContentType` to `DisplayKind`.
const fn convert_content_type(content_type: SnippetContentType) -> DisplayKind {
    match content_type {
        SnippetContentType::Plain => DisplayKind::Plain,
        SnippetContentType::Markdown => DisplayKind::Markdown,
        SnippetContentType::Code => DisplayKind::Code,
    }
}

/// Converts `ShareType` to `SnippetContentType`.
const fn convert_share_type(share_type: ShareType) -> SnippetContentType {
    match share_type {
        ShareType::Plain => SnippetContentType::Plain,
        ShareType::Markdown => SnippetContentType::Markdown,
        ShareType::Code => SnippetContentType::Code,
    }
}
