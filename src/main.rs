mod app;
mod config;
mod domain;
mod infrastructure;
mod logging;
mod render;
mod store;
mod ui;

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tracing::{info, warn};

use crate::app::{App, RpcEndpointOption, StatusLevel};
use crate::infrastructure::ethereum::ProviderConfig;
use crate::infrastructure::runtime::{RuntimeBridge, RuntimeCommand, RuntimeEvent};

const TICK_RATE: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(
    name = "tokenfeed",
    version,
    about = "Live feed of ERC-20/721/1155 token events from an Ethereum node"
)]
struct Args {
    /// HTTP JSON-RPC endpoint (e.g. http://localhost:8545)
    #[arg(long)]
    rpc: Option<String>,

    /// WebSocket endpoint (e.g. ws://localhost:8546)
    #[arg(long)]
    ws: Option<String>,

    /// IPC path (e.g. ~/.ethereum/geth.ipc). Unix only.
    #[arg(long)]
    ipc: Option<PathBuf>,

    /// Block explorer base URL used for transaction links
    #[arg(long)]
    explorer: Option<String>,

    /// Log filter directive, overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (mut config, config_error) = match config::load() {
        Ok(config) => (config, None),
        Err(err) => (config::Config::default(), Some(format!("{err:#}"))),
    };
    if let Some(explorer) = args.explorer.clone() {
        config.explorer_prefix = Some(explorer);
    }
    if let Some(level) = args.log_level.clone() {
        config.log.level = level;
    }

    let log_result = logging::init_tracing(&config.log);
    let (rpc_endpoints, rpc_endpoint_options) = endpoints_from_args_and_config(&args, &config)?;
    info!(endpoints = rpc_endpoints.len(), "starting tokenfeed");

    let mut app = App::new(&config);
    app.rpc_endpoint = rpc_endpoints
        .first()
        .map(|endpoint| endpoint.display())
        .unwrap_or_else(|| "localhost:8545".to_string());
    app.rpc_endpoints = rpc_endpoint_options;
    app.rpc_endpoint_index = 0;
    app.set_status("Connecting…", StatusLevel::Info);
    if let Err(err) = log_result {
        app.set_status(format!("Logging disabled: {err:#}"), StatusLevel::Warn);
    }
    if let Some(err) = config_error {
        warn!(error = %err, "config not loaded, using defaults");
        app.set_status(format!("Config ignored: {err}"), StatusLevel::Warn);
    }

    let runtime = RuntimeBridge::new(rpc_endpoints, config.pipeline.worker_settings())?;

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, runtime);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    runtime: RuntimeBridge,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        pump_background(&mut app, &runtime);
        terminal.draw(|f| ui::draw(f, &mut app))?;
        if app.should_quit {
            let _ = runtime.send(RuntimeCommand::Shutdown);
            return Ok(());
        }

        let mut timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if let Some(wait) = app.time_until_paint(Instant::now()) {
            timeout = timeout.min(wait);
        }

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => handle_key(&mut app, key),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                _ => {}
            }
        }

        app.on_tick(Instant::now());
        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

fn pump_background(app: &mut App, runtime: &RuntimeBridge) {
    for event in runtime.poll_events() {
        match event {
            RuntimeEvent::Connected {
                endpoint,
                chain_id,
                head,
            } => app.apply_connected(endpoint, chain_id, head),
            RuntimeEvent::NewHeader { number, timestamp } => app.apply_header(number, timestamp),
            RuntimeEvent::Events {
                block,
                events,
                stats,
            } => app.ingest_events(block, events, stats),
            RuntimeEvent::Error { message } => app.apply_rpc_error(message),
        }
    }

    if let Some(index) = app.take_endpoint_switch_request() {
        if let Err(err) = runtime.send(RuntimeCommand::SwitchEndpoint { index }) {
            app.set_status(format!("Endpoint switch failed: {err}"), StatusLevel::Error);
        }
    }
}

fn endpoints_from_args_and_config(
    args: &Args,
    config: &config::Config,
) -> Result<(Vec<ProviderConfig>, Vec<RpcEndpointOption>)> {
    fn push_endpoint(
        endpoints: &mut Vec<ProviderConfig>,
        options: &mut Vec<RpcEndpointOption>,
        seen: &mut BTreeSet<String>,
        endpoint: ProviderConfig,
        name: Option<String>,
    ) {
        let display = endpoint.display();
        if !seen.insert(display.to_lowercase()) {
            return;
        }
        let label = name
            .filter(|value| !value.trim().is_empty())
            .map(|name| format!("{name} ({display})"))
            .unwrap_or_else(|| display.clone());
        options.push(RpcEndpointOption { label, display });
        endpoints.push(endpoint);
    }

    let mut endpoints = Vec::new();
    let mut options = Vec::new();
    let mut seen = BTreeSet::<String>::new();
    let cli = Some("cli".to_string());

    if let Some(ipc) = args.ipc.clone() {
        #[cfg(unix)]
        {
            push_endpoint(
                &mut endpoints,
                &mut options,
                &mut seen,
                ProviderConfig::Ipc(ipc),
                cli.clone(),
            );
        }
        #[cfg(not(unix))]
        {
            let _ = ipc;
            return Err(anyhow::anyhow!("IPC is not supported on this platform"));
        }
    }
    if let Some(ws) = non_empty(args.ws.as_deref()) {
        push_endpoint(
            &mut endpoints,
            &mut options,
            &mut seen,
            ProviderConfig::WebSocket(ws.to_string()),
            cli.clone(),
        );
    }
    if let Some(rpc) = non_empty(args.rpc.as_deref()) {
        push_endpoint(
            &mut endpoints,
            &mut options,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint(rpc)),
            cli,
        );
    }

    for (idx, entry) in config.endpoints.iter().enumerate() {
        let name = entry.name.clone();
        if let Some(ws) = non_empty(entry.ws.as_deref()) {
            push_endpoint(
                &mut endpoints,
                &mut options,
                &mut seen,
                ProviderConfig::WebSocket(ws.to_string()),
                name,
            );
        } else if let Some(rpc) = non_empty(entry.rpc.as_deref()) {
            push_endpoint(
                &mut endpoints,
                &mut options,
                &mut seen,
                ProviderConfig::Http(normalize_http_endpoint(rpc)),
                name,
            );
        } else if let Some(ipc) = non_empty(entry.ipc.as_deref()) {
            #[cfg(unix)]
            {
                if let Some(path) = expand_path(ipc) {
                    push_endpoint(
                        &mut endpoints,
                        &mut options,
                        &mut seen,
                        ProviderConfig::Ipc(path),
                        name.or_else(|| Some(format!("ipc-{idx}"))),
                    );
                }
            }
            #[cfg(not(unix))]
            {
                warn!(endpoint = idx, path = ipc, "IPC endpoint skipped on this platform");
            }
        }
    }

    if endpoints.is_empty() {
        push_endpoint(
            &mut endpoints,
            &mut options,
            &mut seen,
            ProviderConfig::Http(normalize_http_endpoint("localhost:8545")),
            Some("local".to_string()),
        );
    }

    Ok((endpoints, options))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(unix)]
fn expand_path(path: &str) -> Option<PathBuf> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return Some(home.join(rest));
        }
    }
    let mut buf = PathBuf::from(trimmed);
    if buf.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            buf = cwd.join(buf);
        }
    }
    Some(buf)
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }
    if app.help_open {
        app.help_open = false;
        return;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            app.should_quit = true
        }
        (KeyCode::Char('?'), _) => app.help_open = true,
        (KeyCode::Char(c @ '1'..='9'), _) => {
            app.toggle_kind_at(c as usize - '1' as usize);
        }
        (KeyCode::Char(']'), _) | (KeyCode::Right, _) => app.next_page(),
        (KeyCode::Char('['), _) | (KeyCode::Left, _) => app.prev_page(),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => app.first_page(),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => app.last_page(),
        (KeyCode::Char('p'), _) => app.cycle_page_size(true),
        (KeyCode::Char('P'), _) => app.cycle_page_size(false),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => app.move_selection_down(),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => app.move_selection_up(),
        (KeyCode::PageDown, _) => app.next_page(),
        (KeyCode::PageUp, _) => app.prev_page(),
        (KeyCode::Char('e'), _) => app.cycle_rpc_endpoint(true),
        (KeyCode::Char('E'), _) => app.cycle_rpc_endpoint(false),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.help_open {
        return;
    }
    let Some(size) = terminal_rect() else {
        return;
    };
    let areas = ui::layout::areas(size);
    if !rect_contains(areas.list, mouse.column, mouse.row) {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(),
        MouseEventKind::ScrollDown => app.scroll_down(),
        _ => {}
    }
}

fn terminal_rect() -> Option<Rect> {
    let (width, height) = crossterm::terminal::size().ok()?;
    Some(Rect {
        x: 0,
        y: 0,
        width,
        height,
    })
}

fn rect_contains(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x
        && col < rect.x.saturating_add(rect.width)
        && row >= rect.y
        && row < rect.y.saturating_add(rect.height)
}
