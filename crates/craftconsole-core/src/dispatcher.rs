use crate::protocol::{ProtocolError, Response, Route};
use tracing::{debug, warn};

pub trait ResponseHandler {
    fn console_output(&mut self, message: String, time: Option<String>);
    fn logged_in(&mut self, username: String, as_role: String);
    fn operation_succeeded(&mut self, path: Option<String>);
    fn unknown_command(&mut self, message: String, responds_to: Option<String>) {
        debug!(message = %message, responds_to = ?responds_to, "server did not recognize command");
    }
    fn login_required(&mut self);
    fn server_error(&mut self, status: u16, message: String);
    fn players(&mut self, connected: u32, max: u32);
    fn cpu_usage(&mut self, usage: f64);
    fn ram_usage(&mut self, free: u64, used: u64, max: u64);
    fn tps(&mut self, tps: f64);
    fn file_list(&mut self, files: String, current_path: String);
    fn file_read(&mut self, content: String);
    fn file_written(&mut self, path: Option<String>);
    fn file_download(&mut self, content: String);
    fn malformed(&mut self, _route: Route) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Handled(Route),
    Unrecognized(i64),
    Malformed,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseDispatcher;

impl ResponseDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn dispatch<H: ResponseHandler + ?Sized>(&self, raw: &str, handler: &mut H) -> Dispatch {
        let response = match Response::decode(raw) {
            Ok(response) => response,
            Err(ProtocolError::UnknownStatus(status)) => {
                warn!(status, "unrecognized response status");
                return Dispatch::Unrecognized(status);
            }
            Err(ProtocolError::Payload { route, source }) => {
                warn!(route = ?route, error = %source, "malformed response payload");
                handler.malformed(route);
                return Dispatch::Malformed;
            }
            Err(err) => {
                warn!(error = %err, "discarding inbound message");
                return Dispatch::Malformed;
            }
        };
        let route = route_of(&response);
        Self::route(response, handler);
        Dispatch::Handled(route)
    }

    fn route<H: ResponseHandler + ?Sized>(response: Response, handler: &mut H) {
        match response {
            Response::ConsoleOutput { message, time } => handler.console_output(message, time),
            Response::LoggedIn { username, as_role } => handler.logged_in(username, as_role),
            Response::OperationSucceeded { path, .. } => handler.operation_succeeded(path),
            Response::UnknownCommand {
                message,
                responds_to,
            } => handler.unknown_command(message, responds_to),
            Response::LoginRequired { .. } => handler.login_required(),
            Response::Error { status, message } => handler.server_error(status, message),
            Response::Players { connected, max } => handler.players(connected, max),
            Response::CpuUsage { usage } => handler.cpu_usage(usage),
            Response::RamUsage { free, used, max } => handler.ram_usage(free, used, max),
            Response::Tps { tps } => handler.tps(tps),
            Response::FileList {
                files,
                current_path,
            } => handler.file_list(files, current_path),
            Response::FileRead { content } => handler.file_read(content),
            Response::FileWritten { path, .. } => handler.file_written(path),
            Response::FileDownload { content } => handler.file_download(content),
        }
    }
}

fn route_of(response: &Response) -> Route {
    match response {
        Response::ConsoleOutput { .. } => Route::ConsoleOutput,
        Response::LoggedIn { .. } | Response::OperationSucceeded { .. } => Route::LoginOrSuccess,
        Response::UnknownCommand { .. } => Route::UnknownOrError,
        Response::Error { status: 400, .. } => Route::UnknownOrError,
        Response::Error { .. } => Route::Error,
        Response::LoginRequired { .. } => Route::LoginRequired,
        Response::Players { .. } => Route::Players,
        Response::CpuUsage { .. } => Route::CpuUsage,
        Response::RamUsage { .. } => Route::RamUsage,
        Response::Tps { .. } => Route::Tps,
        Response::FileList { .. } => Route::FileList,
        Response::FileRead { .. } => Route::FileRead,
        Response::FileWritten { .. } => Route::FileWrite,
        Response::FileDownload { .. } => Route::FileDownload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ResponseHandler for Recorder {
        fn console_output(&mut self, message: String, _time: Option<String>) {
            self.calls.push(format!("console:{message}"));
        }
        fn logged_in(&mut self, username: String, _as_role: String) {
            self.calls.push(format!("login:{username}"));
        }
        fn operation_succeeded(&mut self, path: Option<String>) {
            self.calls.push(format!("ok:{}", path.unwrap_or_default()));
        }
        fn unknown_command(&mut self, _message: String, responds_to: Option<String>) {
            self.calls.push(format!("unknown:{}", responds_to.unwrap_or_default()));
        }
        fn login_required(&mut self) {
            self.calls.push("login_required".to_string());
        }
        fn server_error(&mut self, status: u16, message: String) {
            self.calls.push(format!("error:{status}:{message}"));
        }
        fn players(&mut self, connected: u32, max: u32) {
            self.calls.push(format!("players:{connected}/{max}"));
        }
        fn cpu_usage(&mut self, usage: f64) {
            self.calls.push(format!("cpu:{usage}"));
        }
        fn ram_usage(&mut self, _free: u64, used: u64, _max: u64) {
            self.calls.push(format!("ram:{used}"));
        }
        fn tps(&mut self, tps: f64) {
            self.calls.push(format!("tps:{tps}"));
        }
        fn file_list(&mut self, _files: String, current_path: String) {
            self.calls.push(format!("list:{current_path}"));
        }
        fn file_read(&mut self, _content: String) {
            self.calls.push("read".to_string());
        }
        fn file_written(&mut self, path: Option<String>) {
            self.calls.push(format!("written:{}", path.unwrap_or_default()));
        }
        fn file_download(&mut self, _content: String) {
            self.calls.push("download".to_string());
        }
        fn malformed(&mut self, route: Route) {
            self.calls.push(format!("malformed:{route:?}"));
        }
    }

    #[test]
    fn routes_each_message_to_one_handler_in_order() {
        let dispatcher = ResponseDispatcher::new();
        let mut recorder = Recorder::default();
        let inbound = [
            r#"{"status":10,"message":"hello","time":"10:00"}"#,
            r#"{"status":401,"message":"login"}"#,
            r#"{"status":200,"username":"steve","as":"ADMIN"}"#,
            r#"{"status":200,"path":"/srv/a"}"#,
            r#"{"status":400,"message":"?","respondsTo":"FOO"}"#,
            r#"{"status":404,"message":"File not found"}"#,
            r#"{"status":1001,"usage":12.5}"#,
            r#"{"status":2000,"files":"[]","currentPath":"/srv/"}"#,
            r#"{"status":2002,"path":"/srv/a.txt"}"#,
        ];
        for raw in inbound {
            assert!(matches!(
                dispatcher.dispatch(raw, &mut recorder),
                Dispatch::Handled(_)
            ));
        }
        assert_eq!(
            recorder.calls,
            [
                "console:hello",
                "login_required",
                "login:steve",
                "ok:/srv/a",
                "unknown:FOO",
                "error:404:File not found",
                "cpu:12.5",
                "list:/srv/",
                "written:/srv/a.txt",
            ]
        );
    }

    #[test]
    fn unknown_status_and_garbage_are_dropped() {
        let dispatcher = ResponseDispatcher::new();
        let mut recorder = Recorder::default();
        assert_eq!(
            dispatcher.dispatch(r#"{"status":7}"#, &mut recorder),
            Dispatch::Unrecognized(7)
        );
        assert_eq!(dispatcher.dispatch("[1,2]", &mut recorder), Dispatch::Malformed);
        assert_eq!(
            dispatcher.dispatch(r#"{"status":2000,"files":"[]"}"#, &mut recorder),
            Dispatch::Malformed
        );
        assert_eq!(recorder.calls, ["malformed:FileList"]);
    }

    #[test]
    fn generic_400_is_an_error_route() {
        let dispatcher = ResponseDispatcher::new();
        let mut recorder = Recorder::default();
        assert_eq!(
            dispatcher.dispatch(r#"{"status":400,"message":"missing-parameters"}"#, &mut recorder),
            Dispatch::Handled(Route::UnknownOrError)
        );
        assert_eq!(recorder.calls, ["error:400:missing-parameters"]);
    }
}
