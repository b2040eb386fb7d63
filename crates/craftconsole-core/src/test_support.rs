use crate::connection::{Connection, Transport};
use crate::error::CoreError;
use crate::events::EventBus;
use crate::protocol::{Command, CommandKind};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        self.sent
            .lock()
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("recorded frame is a command"))
            .collect()
    }

    pub(crate) fn commands_of(&self, kind: CommandKind) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|c| c.command == kind)
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for RecordingTransport {
    fn send_text(&self, text: String) -> Result<(), CoreError> {
        self.sent.lock().push(text);
        Ok(())
    }
}

pub(crate) fn connected(server: &str, bus: EventBus) -> (Arc<Connection>, Arc<RecordingTransport>) {
    let conn = Connection::new(server, bus);
    let transport = RecordingTransport::new();
    conn.attach(transport.clone());
    (conn, transport)
}
