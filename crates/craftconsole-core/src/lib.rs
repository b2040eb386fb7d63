pub mod connection;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod files;
pub mod history;
pub mod insights;
pub mod login;
pub mod protocol;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{spawn_pump, Connection, ConnectionRegistry, ConnectionStatus, Inbound, Transport};
pub use console::{
    ConsoleRenderer, Fragment, LogBuffer, LogLevel, LogLine, Marker, McColor, SpanStyle,
    StyledSpan,
};
pub use dispatcher::{Dispatch, ResponseDispatcher, ResponseHandler};
pub use error::CoreError;
pub use events::{Event, EventBus, NoticeLevel};
pub use files::{
    format_file_size, is_text_file, sort_entries, DirectorySink, DownloadSink, EditBuffer,
    RemoteFileSystemNavigator, UploadBatch,
};
pub use history::CommandHistory;
pub use insights::{InsightsGate, InsightsPoller, InsightsTick, ServerInsights, METRIC_COMMANDS};
pub use login::{LoginFlow, LoginOutcome, LoginState};
pub use protocol::{Command, CommandKind, FileEntry, ProtocolError, Response, Route};
pub use view::{ConsoleView, ViewSettings};
