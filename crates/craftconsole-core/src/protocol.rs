use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    #[serde(rename = "LOGIN")]
    Login,
    #[serde(rename = "EXEC")]
    Exec,
    #[serde(rename = "PLAYERS")]
    Players,
    #[serde(rename = "CPUUSAGE")]
    CpuUsage,
    #[serde(rename = "RAMUSAGE")]
    RamUsage,
    #[serde(rename = "TPS")]
    Tps,
    #[serde(rename = "READLOGFILE")]
    ReadLogFile,
    #[serde(rename = "FILE_LIST")]
    FileList,
    #[serde(rename = "FILE_READ")]
    FileRead,
    #[serde(rename = "FILE_WRITE")]
    FileWrite,
    #[serde(rename = "FILE_CREATE_FOLDER")]
    FileCreateFolder,
    #[serde(rename = "FILE_DELETE")]
    FileDelete,
    #[serde(rename = "FILE_RENAME")]
    FileRename,
    #[serde(rename = "FILE_DOWNLOAD")]
    FileDownload,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Login => "LOGIN",
            CommandKind::Exec => "EXEC",
            CommandKind::Players => "PLAYERS",
            CommandKind::CpuUsage => "CPUUSAGE",
            CommandKind::RamUsage => "RAMUSAGE",
            CommandKind::Tps => "TPS",
            CommandKind::ReadLogFile => "READLOGFILE",
            CommandKind::FileList => "FILE_LIST",
            CommandKind::FileRead => "FILE_READ",
            CommandKind::FileWrite => "FILE_WRITE",
            CommandKind::FileCreateFolder => "FILE_CREATE_FOLDER",
            CommandKind::FileDelete => "FILE_DELETE",
            CommandKind::FileRename => "FILE_RENAME",
            CommandKind::FileDownload => "FILE_DOWNLOAD",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

impl Command {
    pub fn new(command: CommandKind, params: Option<String>) -> Self {
        Self { command, params }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

pub fn path_params(path: &str) -> String {
    serde_json::json!({ "path": path }).to_string()
}

pub fn write_params(path: &str, content: &str) -> String {
    serde_json::json!({ "path": path, "content": content }).to_string()
}

pub fn rename_params(old_path: &str, new_path: &str) -> String {
    serde_json::json!({ "oldPath": old_path, "newPath": new_path }).to_string()
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("envelope is not valid json: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("envelope has no integer status")]
    MissingStatus,
    #[error("unrecognized status {0}")]
    UnknownStatus(i64),
    #[error("malformed {route:?} payload: {source}")]
    Payload {
        route: Route,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed nested {what}: {source}")]
    Nested {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid base64 in {what}: {source}")]
    Base64 {
        what: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    ConsoleOutput,
    LoginOrSuccess,
    UnknownOrError,
    LoginRequired,
    Error,
    Players,
    CpuUsage,
    RamUsage,
    Tps,
    FileList,
    FileRead,
    FileWrite,
    FileDownload,
}

pub const ROUTES: &[(u16, Route)] = &[
    (10, Route::ConsoleOutput),
    (200, Route::LoginOrSuccess),
    (400, Route::UnknownOrError),
    (401, Route::LoginRequired),
    (403, Route::Error),
    (404, Route::Error),
    (500, Route::Error),
    (1000, Route::Players),
    (1001, Route::CpuUsage),
    (1002, Route::RamUsage),
    (1003, Route::Tps),
    (2000, Route::FileList),
    (2001, Route::FileRead),
    (2002, Route::FileWrite),
    (2003, Route::FileDownload),
];

pub fn route_for(status: i64) -> Option<Route> {
    ROUTES
        .iter()
        .find(|(code, _)| i64::from(*code) == status)
        .map(|(_, route)| *route)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    ConsoleOutput {
        message: String,
        time: Option<String>,
    },
    LoggedIn {
        username: String,
        as_role: String,
    },
    OperationSucceeded {
        message: Option<String>,
        path: Option<String>,
    },
    UnknownCommand {
        message: String,
        responds_to: Option<String>,
    },
    LoginRequired {
        message: Option<String>,
    },
    Error {
        status: u16,
        message: String,
    },
    Players {
        connected: u32,
        max: u32,
    },
    CpuUsage {
        usage: f64,
    },
    RamUsage {
        free: u64,
        used: u64,
        max: u64,
    },
    Tps {
        tps: f64,
    },
    FileList {
        files: String,
        current_path: String,
    },
    FileRead {
        content: String,
    },
    FileWritten {
        path: Option<String>,
        message: Option<String>,
    },
    FileDownload {
        content: String,
    },
}

#[derive(Deserialize)]
struct ConsolePayload {
    message: String,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Deserialize)]
struct SuccessPayload {
    #[serde(default)]
    username: Option<String>,
    #[serde(default, rename = "as")]
    as_role: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "respondsTo")]
    responds_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayersPayload {
    connected_players: u32,
    max_players: u32,
}

#[derive(Deserialize)]
struct CpuPayload {
    usage: f64,
}

#[derive(Deserialize)]
struct RamPayload {
    free: u64,
    used: u64,
    max: u64,
}

#[derive(Deserialize)]
struct TpsPayload {
    tps: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPayload {
    files: String,
    current_path: String,
}

#[derive(Deserialize)]
struct ContentPayload {
    content: String,
}

#[derive(Deserialize)]
struct FileWritePayload {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Response {
    pub fn decode(raw: &str) -> Result<Response, ProtocolError> {
        let value: Value = serde_json::from_str(raw).map_err(ProtocolError::Envelope)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Response, ProtocolError> {
        let status = value
            .get("status")
            .and_then(Value::as_i64)
            .ok_or(ProtocolError::MissingStatus)?;
        let route = route_for(status).ok_or(ProtocolError::UnknownStatus(status))?;

        let response = match route {
            Route::ConsoleOutput => {
                let p: ConsolePayload = payload(route, value)?;
                Response::ConsoleOutput {
                    message: p.message,
                    time: p.time.filter(|t| !t.is_empty()),
                }
            }
            Route::LoginOrSuccess => {
                let p: SuccessPayload = payload(route, value)?;
                match p.username {
                    Some(username) => Response::LoggedIn {
                        username,
                        as_role: p.as_role.unwrap_or_default(),
                    },
                    None => Response::OperationSucceeded {
                        message: p.message,
                        path: p.path,
                    },
                }
            }
            Route::UnknownOrError => {
                let p: ErrorPayload = payload(route, value)?;
                let message = p.message.unwrap_or_default();
                match p.responds_to {
                    Some(command) => Response::UnknownCommand {
                        message,
                        responds_to: Some(command),
                    },
                    None => Response::Error {
                        status: 400,
                        message,
                    },
                }
            }
            Route::LoginRequired => {
                let p: ErrorPayload = payload(route, value)?;
                Response::LoginRequired { message: p.message }
            }
            Route::Error => {
                let p: ErrorPayload = payload(route, value)?;
                Response::Error {
                    // route_for only yields Error for 403/404/500
                    status: status as u16,
                    message: p.message.unwrap_or_default(),
                }
            }
            Route::Players => {
                let p: PlayersPayload = payload(route, value)?;
                Response::Players {
                    connected: p.connected_players,
                    max: p.max_players,
                }
            }
            Route::CpuUsage => {
                let p: CpuPayload = payload(route, value)?;
                Response::CpuUsage { usage: p.usage }
            }
            Route::RamUsage => {
                let p: RamPayload = payload(route, value)?;
                Response::RamUsage {
                    free: p.free,
                    used: p.used,
                    max: p.max,
                }
            }
            Route::Tps => {
                let p: TpsPayload = payload(route, value)?;
                Response::Tps { tps: p.tps }
            }
            Route::FileList => {
                let p: FileListPayload = payload(route, value)?;
                Response::FileList {
                    files: p.files,
                    current_path: p.current_path,
                }
            }
            Route::FileRead => {
                let p: ContentPayload = payload(route, value)?;
                Response::FileRead { content: p.content }
            }
            Route::FileWrite => {
                let p: FileWritePayload = payload(route, value)?;
                Response::FileWritten {
                    path: p.path,
                    message: p.message,
                }
            }
            Route::FileDownload => {
                let p: ContentPayload = payload(route, value)?;
                Response::FileDownload { content: p.content }
            }
        };
        Ok(response)
    }
}

fn payload<T: DeserializeOwned>(route: Route, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::Payload { route, source })
}

// One row of a remote directory listing. Field names are accepted in both
// snake and camel case since server builds differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(alias = "isFolder")]
    pub is_folder: bool,
    #[serde(default, alias = "lastModified")]
    pub last_modified: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub icon: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, alias = "isBinary")]
    pub is_binary: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadContent {
    pub filename: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    pub content: String,
}

pub fn decode_file_list(files: &str) -> Result<Vec<FileEntry>, ProtocolError> {
    nested("file list", files)
}

pub fn decode_file_content(content: &str) -> Result<FileContent, ProtocolError> {
    nested("file content", content)
}

pub fn decode_download(content: &str) -> Result<DownloadContent, ProtocolError> {
    nested("download", content)
}

fn nested<T: DeserializeOwned>(what: &'static str, raw: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(raw).map_err(|source| ProtocolError::Nested { what, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_envelope_uses_wire_names() {
        let cmd = Command::new(CommandKind::FileCreateFolder, Some(path_params("/srv/a")));
        let json: Value = serde_json::from_str(&cmd.to_json().unwrap()).unwrap();
        assert_eq!(json["command"], "FILE_CREATE_FOLDER");
        let params: Value = serde_json::from_str(json["params"].as_str().unwrap()).unwrap();
        assert_eq!(params["path"], "/srv/a");

        let bare = Command::new(CommandKind::Players, None).to_json().unwrap();
        assert_eq!(bare, r#"{"command":"PLAYERS"}"#);
        assert_eq!(CommandKind::CpuUsage.as_str(), "CPUUSAGE");
    }

    #[test]
    fn rename_params_are_camel_case() {
        let params: Value = serde_json::from_str(&rename_params("/a", "/b")).unwrap();
        assert_eq!(params["oldPath"], "/a");
        assert_eq!(params["newPath"], "/b");
    }

    #[test]
    fn status_200_with_username_is_login() {
        let r = Response::decode(r#"{"status":200,"message":"ok","username":"steve","as":"ADMIN"}"#)
            .unwrap();
        assert_eq!(
            r,
            Response::LoggedIn {
                username: "steve".to_string(),
                as_role: "ADMIN".to_string()
            }
        );
    }

    #[test]
    fn status_200_without_username_is_generic_success() {
        let r = Response::decode(r#"{"status":200,"message":"renamed","path":"/srv/b"}"#).unwrap();
        assert_eq!(
            r,
            Response::OperationSucceeded {
                message: Some("renamed".to_string()),
                path: Some("/srv/b".to_string())
            }
        );
        let bare = Response::decode(r#"{"status":200}"#).unwrap();
        assert!(matches!(bare, Response::OperationSucceeded { path: None, .. }));
    }

    #[test]
    fn status_400_is_split_by_responds_to() {
        let unknown =
            Response::decode(r#"{"status":400,"message":"Unknown","respondsTo":"FOO"}"#).unwrap();
        assert!(matches!(unknown, Response::UnknownCommand { .. }));

        let file_error = Response::decode(r#"{"status":400,"message":"missing-parameters"}"#).unwrap();
        assert_eq!(
            file_error,
            Response::Error {
                status: 400,
                message: "missing-parameters".to_string()
            }
        );
    }

    #[test]
    fn metrics_decode() {
        assert_eq!(
            Response::decode(r#"{"status":1000,"connectedPlayers":3,"maxPlayers":20}"#).unwrap(),
            Response::Players {
                connected: 3,
                max: 20
            }
        );
        assert_eq!(
            Response::decode(r#"{"status":1002,"free":100,"used":900,"max":2048}"#).unwrap(),
            Response::RamUsage {
                free: 100,
                used: 900,
                max: 2048
            }
        );
        assert_eq!(
            Response::decode(r#"{"status":1003,"tps":19.8}"#).unwrap(),
            Response::Tps { tps: 19.8 }
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_envelopes() {
        assert!(matches!(
            Response::decode(r#"{"status":9999}"#),
            Err(ProtocolError::UnknownStatus(9999))
        ));
        assert!(matches!(
            Response::decode(r#"{"message":"x"}"#),
            Err(ProtocolError::MissingStatus)
        ));
        assert!(matches!(
            Response::decode("not json"),
            Err(ProtocolError::Envelope(_))
        ));
        assert!(matches!(
            Response::decode(r#"{"status":1000,"connectedPlayers":"three"}"#),
            Err(ProtocolError::Payload {
                route: Route::Players,
                ..
            })
        ));
    }

    #[test]
    fn console_output_drops_empty_time() {
        let r = Response::decode(r#"{"status":10,"message":"hello","time":""}"#).unwrap();
        assert_eq!(
            r,
            Response::ConsoleOutput {
                message: "hello".to_string(),
                time: None
            }
        );
    }

    #[test]
    fn nested_file_list_decodes() {
        let files = decode_file_list(
            r#"[{"name":"world","is_folder":true,"last_modified":1,"size":0,"icon":"folder"}]"#,
        )
        .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_folder);
        assert!(decode_file_list("[{").is_err());

        let camel = decode_file_list(
            r#"[{"name":"a.png","isFolder":false,"lastModified":5,"size":12,"icon":"file-image"}]"#,
        )
        .unwrap();
        assert_eq!(camel[0].last_modified, 5);
        let content =
            decode_file_content(r#"{"path":"/a","name":"a","content":"aGk=","isBinary":true}"#)
                .unwrap();
        assert!(content.is_binary);
    }
}
