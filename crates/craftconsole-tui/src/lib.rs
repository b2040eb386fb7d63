pub mod commands;
pub mod render;

use anyhow::Result;
use commands::{CdTarget, UiCommand};
use craftconsole_config::{AppConfig, ConfigManager};
use craftconsole_core::{
    format_file_size, ConnectionStatus, ConsoleView, CoreError, Event as CoreEvent, EventBus,
    FileEntry, Inbound, InsightsTick, NoticeLevel, RemoteFileSystemNavigator,
};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use zeroize::Zeroizing;

struct AppRunContext {
    view: ConsoleView,
    live: broadcast::Receiver<Inbound>,
    bus: EventBus,
    config_manager: ConfigManager,
    config: AppConfig,
    server: String,
}

pub async fn run(
    view: ConsoleView,
    live: broadcast::Receiver<Inbound>,
    bus: EventBus,
    config_manager: ConfigManager,
    config: AppConfig,
    server: String,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let ctx = AppRunContext {
        view,
        live,
        bus,
        config_manager,
        config,
        server,
    };
    let res = run_app(&mut terminal, ctx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

async fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    ctx: AppRunContext,
) -> Result<()> {
    let mut event_stream = EventStream::new();
    let mut event_rx = ctx.bus.subscribe();
    let mut live = ctx.live;
    let mut live_open = true;
    let (tick_tx, mut tick_rx) = mpsc::channel::<InsightsTick>(1);
    let mut app = AppState::new(ctx.view, ctx.config_manager, ctx.config, ctx.server);
    app.view.start_insights(tick_tx);

    loop {
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            maybe_event = event_stream.next() => {
                match input_step(maybe_event) {
                    InputStep::Event(event) => {
                        if app.handle_event(event).await? {
                            break;
                        }
                    }
                    InputStep::Skip => {}
                    InputStep::Ended => {
                        warn!("terminal input stream ended");
                        break;
                    }
                }
            }
            inbound = live.recv(), if live_open => {
                match inbound {
                    Ok(Inbound::Message(raw)) => {
                        app.view.process(&raw);
                    }
                    Ok(Inbound::Closed) | Err(broadcast::error::RecvError::Closed) => {
                        live_open = false;
                        app.view.on_stream_closed();
                        app.status = Some(Status::error("disconnected from server"));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "console fell behind, messages dropped");
                    }
                }
            }
            maybe_bus = event_rx.recv() => {
                match maybe_bus {
                    Ok(event) => app.handle_bus_event(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {}
                }
            }
            Some(_) = tick_rx.recv() => {
                app.view.on_insights_tick();
            }
        }
    }

    app.view.stop_insights();
    Ok(())
}

#[derive(Debug)]
enum InputStep {
    Event(Event),
    Skip,
    Ended,
}

fn input_step(next: Option<io::Result<Event>>) -> InputStep {
    match next {
        Some(Ok(event)) => InputStep::Event(event),
        Some(Err(err)) => {
            warn!(error = %err, "terminal input error");
            InputStep::Skip
        }
        None => InputStep::Ended,
    }
}

#[derive(Clone, Debug)]
struct Status {
    text: String,
    error: bool,
}

impl Status {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: true,
        }
    }
}

enum Overlay {
    None,
    Help,
    Password {
        input: Zeroizing<String>,
        remember: bool,
    },
}

#[derive(Clone, Copy, Debug)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    text: Color,
    muted: Color,
    error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::LightGreen,
            accent_soft: Color::Green,
            text: Color::White,
            muted: Color::Gray,
            error: Color::LightRed,
        }
    }
}

struct AppState {
    view: ConsoleView,
    config_manager: ConfigManager,
    config: AppConfig,
    server: String,
    theme: Theme,
    input: String,
    overlay: Overlay,
    status: Option<Status>,
    scroll_back: usize,
}

impl AppState {
    fn new(view: ConsoleView, config_manager: ConfigManager, config: AppConfig, server: String) -> Self {
        Self {
            view,
            config_manager,
            config,
            server,
            theme: Theme::default(),
            input: String::new(),
            overlay: Overlay::None,
            status: None,
            scroll_back: 0,
        }
    }

    async fn handle_event(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key).await,
            _ => Ok(false),
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
        {
            return Ok(true);
        }

        match &mut self.overlay {
            Overlay::Help => {
                self.overlay = Overlay::None;
                return Ok(false);
            }
            Overlay::Password { input, remember } => {
                match key.code {
                    KeyCode::Esc => self.overlay = Overlay::None,
                    KeyCode::Tab => *remember = !*remember,
                    KeyCode::Backspace => {
                        input.pop();
                    }
                    KeyCode::Char(c) => input.push(c),
                    KeyCode::Enter => {
                        let password = Zeroizing::new(std::mem::take(&mut **input));
                        let remember = *remember;
                        self.overlay = Overlay::None;
                        self.submit_password(password, remember);
                    }
                    _ => {}
                }
                return Ok(false);
            }
            Overlay::None => {}
        }

        match key.code {
            KeyCode::Enter => {
                let input = std::mem::take(&mut self.input);
                self.view.reset_history_cursor();
                self.scroll_back = 0;
                if input.starts_with(':') {
                    return self.run_ui_command(&input).await;
                }
                if let Err(err) = self.view.send_command(&input) {
                    self.status = Some(Status::error(err.to_string()));
                }
            }
            KeyCode::Up => {
                if let Some(cmd) = self.view.history_up() {
                    self.input = cmd;
                }
            }
            KeyCode::Down => self.input = self.view.history_down(),
            KeyCode::PageUp => self.scroll_back = self.scroll_back.saturating_add(10),
            KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(10),
            KeyCode::Esc => self.input.clear(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        Ok(false)
    }

    fn submit_password(&mut self, password: Zeroizing<String>, remember: bool) {
        if remember {
            if let Err(err) =
                self.config_manager
                    .remember_password(&mut self.config, &self.server, &password)
            {
                warn!(server = %self.server, error = %err, "failed to remember password");
                self.status = Some(Status::error(format!("password not saved: {err}")));
            }
        }
        if let Err(err) = self.view.submit_password(password, remember) {
            self.status = Some(Status::error(err.to_string()));
        }
    }

    async fn run_ui_command(&mut self, input: &str) -> Result<bool> {
        let command = match commands::parse(input) {
            Ok(command) => command,
            Err(message) => {
                self.status = Some(Status::error(message));
                return Ok(false);
            }
        };
        if command == UiCommand::Quit {
            return Ok(true);
        }
        let outcome = self.apply_ui_command(command).await;
        if let Err(err) = outcome {
            self.status = Some(Status::error(err.to_string()));
        }
        Ok(false)
    }

    async fn apply_ui_command(&mut self, command: UiCommand) -> Result<(), CoreError> {
        match command {
            UiCommand::Help => self.overlay = Overlay::Help,
            UiCommand::Insights => {
                let show = !self.view.show_server_info();
                self.view.set_show_server_info(show);
            }
            UiCommand::Files => {
                self.view.toggle_file_manager()?;
            }
            UiCommand::Quit => {}
            command => {
                if !self.view.show_file_manager() {
                    self.view.toggle_file_manager()?;
                }
                self.apply_file_command(command).await?;
            }
        }
        Ok(())
    }

    async fn apply_file_command(&mut self, command: UiCommand) -> Result<(), CoreError> {
        let local_files = match &command {
            UiCommand::Put(paths) => Some(read_local_files(paths).await?),
            _ => None,
        };
        let (nav, conn) = self.view.navigator_mut();

        match command {
            UiCommand::List(None) => nav.refresh(conn),
            UiCommand::List(Some(dir)) | UiCommand::Cd(CdTarget::Folder(dir)) => {
                let folder = find_entry(nav, &dir)?;
                nav.navigate_to_folder(conn, &folder)
            }
            UiCommand::Cd(CdTarget::Up) => nav.go_up(conn).map(|_| ()),
            UiCommand::Cd(CdTarget::Root) => nav.navigate_to_root(conn),
            UiCommand::Cd(CdTarget::Segment(index)) => nav.navigate_to_segment(conn, index),
            UiCommand::Cat(name) => {
                let file = find_entry(nav, &name)?;
                nav.open_file(conn, &file)
            }
            UiCommand::Save(content) => {
                if let Some(content) = content {
                    nav.edit(content)?;
                }
                nav.save(conn)
            }
            UiCommand::Close => {
                nav.cancel_edit();
                Ok(())
            }
            UiCommand::Rm(name) => {
                let target = find_entry(nav, &name)?;
                nav.delete_entry(conn, &target)
            }
            UiCommand::Mv(old, new) => {
                let target = find_entry(nav, &old)?;
                nav.rename_entry(conn, &target, &new)
            }
            UiCommand::Mkdir(name) => nav.create_folder_named(conn, &name),
            UiCommand::Touch(name) => nav.create_file(conn, &name),
            UiCommand::Get(name) => {
                let file = find_entry(nav, &name)?;
                nav.download_entry(conn, &file)
            }
            UiCommand::Put(_) => nav.upload(conn, &local_files.unwrap_or_default()),
            UiCommand::Insights | UiCommand::Files | UiCommand::Help | UiCommand::Quit => Ok(()),
        }
    }

    fn handle_bus_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Notice { level, message } => {
                self.status = Some(match level {
                    NoticeLevel::Error => Status::error(message),
                    NoticeLevel::Info => Status::info(message),
                });
            }
            CoreEvent::PasswordRequired { server } if server == self.server => {
                self.overlay = Overlay::Password {
                    input: Zeroizing::new(String::new()),
                    remember: false,
                };
            }
            CoreEvent::LoggedIn {
                username, as_role, ..
            } => {
                self.status = Some(Status::info(format!("logged in as {username} ({as_role})")));
            }
            CoreEvent::DownloadSaved { path } => {
                self.status = Some(Status::info(format!("saved {}", path.display())));
            }
            CoreEvent::ConnectionStatusChanged { server, status } => {
                info!(server = %server, status = ?status, "connection status changed");
            }
            CoreEvent::PasswordRequired { .. } => {}
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let size = f.area();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(size);
        self.draw_header(f, layout[0]);
        if self.view.show_file_manager() {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(layout[1]);
            self.draw_console(f, body[0]);
            self.draw_files(f, body[1]);
        } else {
            self.draw_console(f, layout[1]);
        }
        self.draw_input(f, layout[2]);
        match &self.overlay {
            Overlay::None => {}
            Overlay::Help => self.draw_help_overlay(f, centered_rect(70, 60, size)),
            Overlay::Password { input, remember } => {
                self.draw_password_overlay(f, centered_rect(60, 30, size), input.len(), *remember)
            }
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let conn = self.view.connection();
        let (state, state_color) = match conn.status() {
            ConnectionStatus::Connected => ("connected", theme.accent),
            ConnectionStatus::Connecting => ("connecting", theme.muted),
            ConnectionStatus::Disconnected => ("disconnected", theme.error),
        };
        let mut spans = vec![
            Span::styled(
                self.server.clone(),
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(state, Style::default().fg(state_color)),
        ];
        if let Some((user, role)) = self.view.logged_in_as() {
            spans.push(Span::styled(
                format!("  {user} ({role})"),
                Style::default().fg(theme.accent_soft),
            ));
        }
        if self.view.show_server_info() {
            spans.push(Span::styled(
                format!("  {}", self.view.insights().summary()),
                Style::default().fg(theme.muted),
            ));
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent_soft));
        f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn draw_console(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let height = area.height.saturating_sub(2) as usize;
        let lines = self.view.log().lines();
        let end = lines.len().saturating_sub(self.scroll_back.min(lines.len()));
        let start = end.saturating_sub(height);
        let text: Vec<Line> = lines[start..end].iter().map(render::log_line).collect();
        let title = if self.scroll_back > 0 {
            format!("console (-{})", self.scroll_back)
        } else {
            "console".to_string()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(theme.accent_soft));
        f.render_widget(Paragraph::new(Text::from(text)).block(block), area);
    }

    fn draw_files(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let nav = self.view.navigator();
        let mut title = nav.root().unwrap_or("files").to_string();
        for (i, segment) in nav.segments().iter().enumerate() {
            title.push_str(&format!(" › #{i} {segment}"));
        }
        if nav.is_loading() {
            title.push_str(" …");
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(theme.accent_soft));

        if let Some(buffer) = nav.edit_buffer() {
            let marker = if buffer.dirty { " *" } else { "" };
            let block = block.title(format!("{}{marker}", buffer.path));
            let paragraph = Paragraph::new(buffer.content.as_str())
                .block(block)
                .wrap(Wrap { trim: false })
                .style(Style::default().fg(theme.text));
            f.render_widget(paragraph, area);
            return;
        }

        let items: Vec<ListItem> = nav
            .files()
            .iter()
            .map(|entry| {
                if entry.is_folder {
                    ListItem::new(Line::from(Span::styled(
                        format!("{}/", entry.name),
                        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                    )))
                } else {
                    ListItem::new(Line::from(vec![
                        Span::styled(entry.name.clone(), Style::default().fg(theme.text)),
                        Span::styled(
                            format!("  {}", format_file_size(entry.size)),
                            Style::default().fg(theme.muted),
                        ),
                    ]))
                }
            })
            .collect();
        f.render_widget(List::new(items).block(block), area);
    }

    fn draw_input(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let title = match &self.status {
            Some(status) => Span::styled(
                status.text.clone(),
                Style::default().fg(if status.error { theme.error } else { theme.accent_soft }),
            ),
            None => Span::styled(":help for commands", Style::default().fg(theme.muted)),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Line::from(title))
            .border_style(Style::default().fg(theme.accent_soft));
        let paragraph = Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent)),
            Span::styled(self.input.clone(), Style::default().fg(theme.text)),
        ]))
        .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_help_overlay(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .title("help")
            .border_style(Style::default().fg(theme.accent));
        let mut lines: Vec<Line> = vec![
            Line::from("Enter sends a console command, Up/Down browse history,"),
            Line::from("PageUp/PageDown scroll, Ctrl+Q quits."),
            Line::from(""),
        ];
        lines.extend(commands::HELP.iter().map(|l| Line::from(*l)));
        f.render_widget(Clear, area);
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(theme.text));
        f.render_widget(paragraph, area);
    }

    fn draw_password_overlay(&self, f: &mut ratatui::Frame<'_>, area: Rect, len: usize, remember: bool) {
        let theme = self.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("password for {}", self.server))
            .border_style(Style::default().fg(theme.accent));
        let check = if remember { "[x]" } else { "[ ]" };
        let lines = vec![
            Line::from(Span::styled(
                format!("> {}", "*".repeat(len)),
                Style::default().fg(theme.accent),
            )),
            Line::from(""),
            Line::from(format!("{check} remember (Tab)   Enter to log in, Esc to cancel")),
        ];
        f.render_widget(Clear, area);
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(theme.text));
        f.render_widget(paragraph, area);
    }
}

fn find_entry(nav: &RemoteFileSystemNavigator, name: &str) -> Result<FileEntry, CoreError> {
    nav.find(name)
        .cloned()
        .ok_or_else(|| CoreError::Invalid(format!("{name}: no such entry")))
}

async fn read_local_files(paths: &[PathBuf]) -> Result<Vec<(String, Vec<u8>)>, CoreError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::Invalid(format!("{} has no file name", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        files.push((name, bytes));
    }
    Ok(files)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}
