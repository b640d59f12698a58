use appruns::app::{AppState, AuthorizeCard, AuthorizeDecision};
use appruns::cli::Cli;
use appruns::events::{AppEvent, EventHandler};
use appruns::fetch::FetchTasks;
use appruns::input::{self, Action, InputContext, OverlayMode};
use appruns::om::client::OmClient;
use appruns::report::ToastReporter;
use appruns::traits::ErrorReporter;
use appruns::tui;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing_subscriber::EnvFilter;

const TICK_RATE: Duration = Duration::from_millis(100);

fn setup_verbose_logging() -> Result<()> {
    let state_dir = state_dir();
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appruns=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .init();
    tracing::info!(
        "appruns v{} starting with verbose logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn state_dir() -> PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        PathBuf::from(state).join("appruns")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local").join("state").join("appruns")
    } else {
        PathBuf::from("/tmp/appruns")
    }
}

fn spawn_monitored(
    tx: UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                match join_err.into_panic().downcast::<String>() {
                    Ok(s) => *s,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(s) => s.to_string(),
                        Err(_) => "unknown panic".to_string(),
                    },
                }
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

/// Loads what the authorization card shows; both lookups run concurrently.
async fn load_authorize_card(client: &OmClient, app: &str) -> Result<AuthorizeCard> {
    let (user, marketplace) = tokio::try_join!(client.current_user(), client.marketplace_app(app))?;
    Ok(AuthorizeCard::new(&marketplace, &user))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    if args.verbose {
        setup_verbose_logging()?;
    }

    let client = match OmClient::new(&args.server, args.token.as_deref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut state = AppState::new(args.app_config(client.host()));

    if args.authorize {
        match load_authorize_card(&client, &args.app).await {
            Ok(card) => state.open_authorize_card(card),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, SetTitle("")) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        SetTitle(format!("appruns: {}", args.app))
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut events = EventHandler::new(TICK_RATE);
    let tx = events.sender();
    let reporter = ToastReporter::new(tx.clone(), !args.no_notify);
    let mut tasks = FetchTasks::new(client.clone(), tx.clone());

    tasks.dispatch(state.history.fetch_page(None));

    let result = run_app(
        &mut terminal,
        &mut state,
        &mut events,
        &mut tasks,
        &reporter,
        &client,
        &tx,
    )
    .await;

    state.history.teardown();
    tasks.abort_all();
    events.stop();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    events: &mut EventHandler,
    tasks: &mut FetchTasks,
    reporter: &dyn ErrorReporter,
    client: &Arc<OmClient>,
    tx: &UnboundedSender<AppEvent>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| tui::render::render(f, state))?;

        state.prune_notifications();
        state.prune_error();

        if let Some(event) = events.next().await {
            match event {
                AppEvent::Key(key) => {
                    let ctx = InputContext {
                        has_error: state.error.is_some(),
                        is_loading: state.is_loading(),
                        pagination: state.history.pagination_visible(),
                        overlay: if state.has_authorize_card() {
                            OverlayMode::Authorize
                        } else {
                            OverlayMode::None
                        },
                    };
                    match input::map_key(key, &ctx) {
                        Action::Quit => state.should_quit = true,
                        Action::DismissError => state.clear_error(),
                        Action::MoveUp => state.move_cursor_up(),
                        Action::MoveDown => state.move_cursor_down(),
                        Action::ToggleLogs => state.toggle_selected_logs(),
                        Action::NextPage => tasks.dispatch(state.next_page()),
                        Action::PrevPage => tasks.dispatch(state.prev_page()),
                        Action::Refresh => tasks.dispatch(state.history.refresh()),
                        Action::TriggerRun => {
                            let client = client.clone();
                            let app = state.config.app.clone();
                            let tx2 = tx.clone();
                            spawn_monitored(tx.clone(), "trigger_run", async move {
                                let result = client.trigger_run(&app).await;
                                if tx2.send(AppEvent::RunTriggered(result)).is_err() {
                                    tracing::warn!("trigger_run: channel closed");
                                }
                            });
                        }
                        Action::Configure => {
                            state.resolve_authorize_card(AuthorizeDecision::Configure);
                        }
                        Action::Cancel => state.resolve_authorize_card(AuthorizeDecision::Cancel),
                        Action::None => {}
                    }
                }
                AppEvent::Tick => {
                    if last_tick.elapsed() >= TICK_RATE {
                        state.advance_spinner();
                        last_tick = Instant::now();
                    }
                }
                AppEvent::PageResult { seq, result } => {
                    let outcome = state.history.complete(seq, result, reporter);
                    tracing::debug!(seq, ?outcome, "run history fetch completed");
                    state.clamp_cursor();
                }
                AppEvent::RunTriggered(Ok(())) => {
                    state.push_notification(format!("Run triggered for {}", state.config.app));
                    tasks.dispatch(state.history.refresh());
                }
                AppEvent::RunTriggered(Err(e)) => reporter.report(&e),
                AppEvent::Error(e) => state.set_error(e),
            }
        }

        if state.should_quit {
            return Ok(());
        }
    }
}
