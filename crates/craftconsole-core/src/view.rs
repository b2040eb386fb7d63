use crate::connection::{Connection, ConnectionStatus, Inbound};
use crate::console::{ConsoleRenderer, LogBuffer};
use crate::dispatcher::{Dispatch, ResponseDispatcher, ResponseHandler};
use crate::error::CoreError;
use crate::events::{Event, EventBus, NoticeLevel};
use crate::files::{DirectorySink, DownloadSink, RemoteFileSystemNavigator};
use crate::history::CommandHistory;
use crate::insights::{InsightsGate, InsightsPoller, InsightsTick, ServerInsights};
use crate::login::{LoginFlow, LoginOutcome};
use crate::protocol::{CommandKind, Route};
use craftconsole_config::{AppConfig, ListParamsStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

#[derive(Clone, Debug)]
pub struct ViewSettings {
    pub show_timestamp: bool,
    pub insights_enabled: bool,
    pub insights_interval: Duration,
    pub list_params: ListParamsStyle,
    pub download_dir: PathBuf,
}

impl ViewSettings {
    pub fn from_config(cfg: &AppConfig, default_download_dir: PathBuf) -> Self {
        Self {
            show_timestamp: cfg.console.show_timestamp,
            insights_enabled: cfg.insights.enabled,
            insights_interval: Duration::from_millis(cfg.insights.interval_ms.max(100)),
            list_params: cfg.files.list_params,
            download_dir: cfg.files.download_dir.clone().unwrap_or(default_download_dir),
        }
    }
}

pub struct ConsoleView {
    conn: Arc<Connection>,
    bus: EventBus,
    dispatcher: ResponseDispatcher,
    renderer: ConsoleRenderer,
    log: LogBuffer,
    navigator: RemoteFileSystemNavigator,
    login: LoginFlow,
    history: CommandHistory,
    insights: ServerInsights,
    poller: InsightsPoller,
    insights_enabled: bool,
    downloads: Box<dyn DownloadSink + Send>,
    show_server_info: bool,
    show_console: bool,
    show_file_manager: bool,
    logged_in_as: Option<(String, String)>,
    replaying: bool,
}

impl ConsoleView {
    pub fn new(
        conn: Arc<Connection>,
        bus: EventBus,
        settings: ViewSettings,
        remembered_password: Option<String>,
    ) -> Self {
        let downloads = Box::new(DirectorySink::new(settings.download_dir.clone()));
        Self::with_sink(conn, bus, settings, remembered_password, downloads)
    }

    pub fn with_sink(
        conn: Arc<Connection>,
        bus: EventBus,
        settings: ViewSettings,
        remembered_password: Option<String>,
        downloads: Box<dyn DownloadSink + Send>,
    ) -> Self {
        let history = CommandHistory::from_entries(conn.exec_history());
        let show_console = conn.status() == ConnectionStatus::Connected;
        Self {
            conn,
            bus,
            dispatcher: ResponseDispatcher::new(),
            renderer: ConsoleRenderer::new(settings.show_timestamp),
            log: LogBuffer::new(),
            navigator: RemoteFileSystemNavigator::new(settings.list_params),
            login: LoginFlow::new(remembered_password),
            history,
            insights: ServerInsights::default(),
            poller: InsightsPoller::new(settings.insights_interval),
            insights_enabled: settings.insights_enabled,
            downloads,
            show_server_info: true,
            show_console,
            show_file_manager: false,
            logged_in_as: None,
            replaying: false,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    pub fn navigator(&self) -> &RemoteFileSystemNavigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> (&mut RemoteFileSystemNavigator, &Connection) {
        (&mut self.navigator, &*self.conn)
    }

    pub fn insights(&self) -> &ServerInsights {
        &self.insights
    }

    pub fn logged_in_as(&self) -> Option<(&str, &str)> {
        self.logged_in_as
            .as_ref()
            .map(|(user, role)| (user.as_str(), role.as_str()))
    }

    pub fn show_server_info(&self) -> bool {
        self.show_server_info
    }

    pub fn set_show_server_info(&mut self, show: bool) {
        self.show_server_info = show;
    }

    pub fn show_console(&self) -> bool {
        self.show_console
    }

    pub fn show_file_manager(&self) -> bool {
        self.show_file_manager
    }

    pub fn toggle_file_manager(&mut self) -> Result<bool, CoreError> {
        if !self.show_file_manager {
            let path = self.navigator.current_path().to_string();
            self.navigator.list(&self.conn, &path)?;
        }
        self.show_file_manager = !self.show_file_manager;
        Ok(self.show_file_manager)
    }

    // Replays what the connection already received, then returns the live
    // subscription. Replay rebuilds view state without sending anything.
    pub fn resume(&mut self) -> broadcast::Receiver<Inbound> {
        let (backlog, live) = self.conn.resume();
        debug!(server = %self.conn.server(), replayed = backlog.len(), "resuming view");
        let dispatcher = self.dispatcher;
        self.replaying = true;
        for raw in backlog {
            dispatcher.dispatch(&raw, self);
        }
        self.replaying = false;
        live
    }

    pub fn process(&mut self, raw: &str) -> Dispatch {
        self.show_console = true;
        let dispatcher = self.dispatcher;
        dispatcher.dispatch(raw, self)
    }

    pub fn on_stream_closed(&mut self) {
        info!(server = %self.conn.server(), "disconnected from server");
        self.show_server_info = false;
    }

    pub fn insights_gate(&self) -> InsightsGate {
        InsightsGate {
            panel_visible: self.show_server_info && self.insights_enabled,
            console_visible: self.show_console,
            connected: self.conn.status() == ConnectionStatus::Connected,
            logged_in: self.conn.is_logged_in(),
        }
    }

    pub fn start_insights(&mut self, ticks: mpsc::Sender<InsightsTick>) -> bool {
        self.insights_enabled && self.poller.start(ticks)
    }

    pub fn stop_insights(&mut self) {
        self.poller.stop();
    }

    pub fn on_insights_tick(&mut self) -> usize {
        InsightsPoller::poll(self.insights_gate(), &self.conn)
    }

    pub fn send_command(&mut self, input: &str) -> Result<(), CoreError> {
        if input.is_empty() {
            return Ok(());
        }
        self.conn.send(CommandKind::Exec, Some(input.to_string()))?;
        self.history.record(input);
        Ok(())
    }

    pub fn history_up(&mut self) -> Option<String> {
        self.history.up().map(str::to_string)
    }

    pub fn history_down(&mut self) -> String {
        self.history.down().to_string()
    }

    pub fn reset_history_cursor(&mut self) {
        self.history.reset();
    }

    pub fn submit_password(
        &mut self,
        password: Zeroizing<String>,
        remember: bool,
    ) -> Result<(), CoreError> {
        self.login.submit(&self.conn, password, remember)
    }

    fn report(&self, context: &str, result: Result<(), CoreError>) {
        if let Err(err) = result {
            warn!(server = %self.conn.server(), error = %err, "{context} failed");
        }
    }
}

impl ResponseHandler for ConsoleView {
    fn console_output(&mut self, message: String, time: Option<String>) {
        let line = self.renderer.render(&message, time.as_deref());
        self.log.push(line);
    }

    fn logged_in(&mut self, username: String, as_role: String) {
        if self.conn.status() == ConnectionStatus::Connected {
            self.conn.set_logged_in(true);
        }
        info!(server = %self.conn.server(), user = %username, role = %as_role, "logged in");
        if !self.replaying {
            self.bus.send(Event::LoggedIn {
                server: self.conn.server().to_string(),
                username: username.clone(),
                as_role: as_role.clone(),
            });
        }
        self.logged_in_as = Some((username, as_role));
    }

    fn operation_succeeded(&mut self, path: Option<String>) {
        if self.replaying {
            return;
        }
        let result = self
            .navigator
            .apply_operation_success(&self.conn, path.as_deref());
        self.report("refresh after file operation", result);
    }

    fn login_required(&mut self) {
        if self.replaying {
            return;
        }
        match self.login.on_login_required(&self.conn) {
            Ok(LoginOutcome::PromptRequired) => self.bus.send(Event::PasswordRequired {
                server: self.conn.server().to_string(),
            }),
            Ok(LoginOutcome::Sent) | Ok(LoginOutcome::Ignored) => {}
            Err(err) => self.report("login", Err(err)),
        }
    }

    fn server_error(&mut self, status: u16, message: String) {
        self.navigator.apply_error();
        if self.replaying {
            return;
        }
        warn!(server = %self.conn.server(), status, message = %message, "server reported an error");
        self.bus.notice(NoticeLevel::Error, message);
    }

    fn players(&mut self, connected: u32, max: u32) {
        self.insights.connected_players = Some(connected);
        self.insights.max_players = Some(max);
    }

    fn cpu_usage(&mut self, usage: f64) {
        self.insights.cpu_usage = Some(usage);
    }

    fn ram_usage(&mut self, free: u64, used: u64, max: u64) {
        self.insights.ram_free = Some(free);
        self.insights.ram_used = Some(used);
        self.insights.ram_max = Some(max);
    }

    fn tps(&mut self, tps: f64) {
        self.insights.tps = Some(tps);
    }

    fn file_list(&mut self, files: String, current_path: String) {
        self.navigator.apply_listing(&files, &current_path);
    }

    fn file_read(&mut self, content: String) {
        self.navigator.apply_file_content(&content);
    }

    fn file_written(&mut self, path: Option<String>) {
        self.operation_succeeded(path);
    }

    fn file_download(&mut self, content: String) {
        if self.replaying {
            return;
        }
        if let Some(path) = self
            .navigator
            .apply_download(&content, self.downloads.as_ref())
        {
            self.bus.send(Event::DownloadSaved { path });
        }
    }

    fn malformed(&mut self, route: Route) {
        if matches!(
            route,
            Route::FileList | Route::FileRead | Route::FileWrite | Route::FileDownload
        ) {
            self.navigator.apply_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::connected;
    use serde_json::json;
    use std::io;
    use std::path::Path;

    struct NullSink;

    impl DownloadSink for NullSink {
        fn save(&self, filename: &str, _bytes: &[u8]) -> io::Result<PathBuf> {
            Ok(Path::new("/tmp").join(filename))
        }
    }

    fn settings() -> ViewSettings {
        ViewSettings {
            show_timestamp: false,
            insights_enabled: true,
            insights_interval: Duration::from_millis(2500),
            list_params: ListParamsStyle::Json,
            download_dir: PathBuf::from("downloads"),
        }
    }

    fn view(conn: Arc<Connection>, bus: EventBus, password: Option<&str>) -> ConsoleView {
        ConsoleView::with_sink(
            conn,
            bus,
            settings(),
            password.map(str::to_string),
            Box::new(NullSink),
        )
    }

    #[test]
    fn console_output_is_rendered_into_the_log() {
        let bus = EventBus::new(16);
        let (conn, _) = connected("lobby", bus.clone());
        let mut view = view(conn, bus, None);
        view.process(r#"{"status":10,"message":"[ERROR] boom"}"#);
        assert_eq!(view.log().len(), 1);
        assert!(view.log().lines()[0].plain_text().ends_with("boom"));
        assert!(view.show_console());
    }

    #[test]
    fn login_required_twice_sends_one_login() {
        let bus = EventBus::new(16);
        let (conn, transport) = connected("lobby", bus.clone());
        let mut events = bus.subscribe();
        let mut view = view(conn, bus, Some("secret"));
        view.process(r#"{"status":401,"message":"login"}"#);
        view.process(r#"{"status":401,"message":"login"}"#);
        assert_eq!(transport.commands_of(CommandKind::Login).len(), 1);
        let mut prompts = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, Event::PasswordRequired { .. }) {
                prompts += 1;
            }
        }
        assert_eq!(prompts, 1);
    }

    #[test]
    fn login_enables_insights_polling() {
        let bus = EventBus::new(16);
        let (conn, transport) = connected("lobby", bus.clone());
        let mut view = view(conn.clone(), bus, None);
        assert_eq!(view.on_insights_tick(), 0);

        view.process(r#"{"status":200,"username":"steve","as":"ADMIN"}"#);
        assert!(conn.is_logged_in());
        assert_eq!(view.logged_in_as(), Some(("steve", "ADMIN")));
        assert_eq!(view.on_insights_tick(), 4);

        view.process(r#"{"status":1000,"connectedPlayers":1,"maxPlayers":10}"#);
        view.process(r#"{"status":1003,"tps":20.0}"#);
        assert_eq!(view.insights().connected_players, Some(1));
        assert_eq!(view.insights().tps, Some(20.0));

        view.set_show_server_info(false);
        transport.clear();
        assert_eq!(view.on_insights_tick(), 0);
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn closed_stream_hides_metrics() {
        let bus = EventBus::new(16);
        let (conn, _) = connected("lobby", bus.clone());
        let mut view = view(conn.clone(), bus, None);
        conn.set_logged_in(true);
        conn.mark_disconnected();
        view.on_stream_closed();
        assert!(!view.show_server_info());
        assert_eq!(view.on_insights_tick(), 0);
    }

    #[test]
    fn server_errors_become_notices() {
        let bus = EventBus::new(16);
        let (conn, _) = connected("lobby", bus.clone());
        let mut events = bus.subscribe();
        let mut view = view(conn, bus, None);
        view.toggle_file_manager().unwrap();
        assert!(view.navigator().is_loading());
        view.process(r#"{"status":403,"message":"Access denied"}"#);
        assert!(!view.navigator().is_loading());
        let notice = std::iter::from_fn(|| events.try_recv().ok()).find_map(|e| match e {
            Event::Notice { message, .. } => Some(message),
            _ => None,
        });
        assert_eq!(notice.as_deref(), Some("Access denied"));
    }

    #[test]
    fn file_replies_drive_the_navigator() {
        let bus = EventBus::new(16);
        let (conn, transport) = connected("lobby", bus.clone());
        let mut view = view(conn, bus, None);
        let files = json!([{"name": "world", "is_folder": true, "last_modified": 0,
                            "size": 0, "icon": "folder"}])
        .to_string();
        view.process(&json!({"status": 2000, "files": files, "currentPath": "/srv/"}).to_string());
        assert_eq!(view.navigator().files().len(), 1);

        view.process(r#"{"status":2002,"path":"/srv/x.txt"}"#);
        let last = transport.commands().pop().unwrap();
        assert_eq!(last.command, CommandKind::FileList);
    }

    #[test]
    fn resume_replays_without_side_effects() {
        let bus = EventBus::new(16);
        let (conn, transport) = connected("lobby", bus.clone());
        conn.deliver(r#"{"status":10,"message":"earlier"}"#.to_string());
        conn.deliver(r#"{"status":401,"message":"login"}"#.to_string());
        conn.deliver(r#"{"status":200,"username":"steve","as":"USER"}"#.to_string());
        conn.send(CommandKind::Exec, Some("list".to_string())).unwrap();
        transport.clear();

        let mut view = view(conn.clone(), bus, Some("secret"));
        let _live = view.resume();
        assert_eq!(view.log().len(), 1);
        assert!(transport.commands().is_empty());
        assert!(conn.is_logged_in());
        assert_eq!(view.history_up().as_deref(), Some("list"));
    }

    #[test]
    fn replayed_login_does_not_revive_a_dropped_connection() {
        let bus = EventBus::new(16);
        let (conn, _) = connected("lobby", bus.clone());
        conn.deliver(r#"{"status":200,"username":"steve","as":"USER"}"#.to_string());
        conn.mark_disconnected();

        let mut view = view(conn.clone(), bus, None);
        let _live = view.resume();
        assert!(!conn.is_logged_in());
        assert_eq!(view.on_insights_tick(), 0);
    }

    #[test]
    fn file_manager_stays_closed_when_listing_cannot_be_sent() {
        let bus = EventBus::new(16);
        let conn = Connection::new("lobby", bus.clone());
        let mut view = view(conn, bus, None);
        assert!(view.toggle_file_manager().is_err());
        assert!(!view.show_file_manager());
    }

    #[test]
    fn send_command_records_history() {
        let bus = EventBus::new(16);
        let (conn, transport) = connected("lobby", bus.clone());
        let mut view = view(conn, bus, None);
        view.send_command("a").unwrap();
        view.send_command("").unwrap();
        view.send_command("b").unwrap();
        assert_eq!(transport.commands_of(CommandKind::Exec).len(), 2);
        assert_eq!(view.history_up().as_deref(), Some("b"));
        assert_eq!(view.history_up().as_deref(), Some("a"));
        assert_eq!(view.history_down(), "b");
    }
}
