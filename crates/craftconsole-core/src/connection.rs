use crate::error::CoreError;
use crate::events::{Event, EventBus};
use crate::protocol::{Command, CommandKind};
use craftconsole_ws::{LinkError, WsFrame, WsLink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub trait Transport: Send + Sync {
    fn send_text(&self, text: String) -> Result<(), CoreError>;
}

impl Transport for WsLink {
    fn send_text(&self, text: String) -> Result<(), CoreError> {
        WsLink::send_text(self, text).map_err(|e: LinkError| CoreError::Link(e.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Message(Arc<str>),
    Closed,
}

struct ConnectionState {
    status: ConnectionStatus,
    logged_in: bool,
    closed: bool,
    transport: Option<Arc<dyn Transport>>,
    sent: Vec<Command>,
    received: Vec<Arc<str>>,
}

pub struct Connection {
    id: Uuid,
    server: String,
    state: Mutex<ConnectionState>,
    live: broadcast::Sender<Inbound>,
    bus: EventBus,
}

impl Connection {
    pub fn new(server: impl Into<String>, bus: EventBus) -> Arc<Self> {
        let (live, _) = broadcast::channel(1024);
        Arc::new(Self {
            id: Uuid::new_v4(),
            server: server.into(),
            state: Mutex::new(ConnectionState {
                status: ConnectionStatus::Disconnected,
                logged_in: false,
                closed: false,
                transport: None,
                sent: Vec::new(),
                received: Vec::new(),
            }),
            live,
            bus,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        let mut state = self.state.lock();
        if !state.closed {
            state.logged_in = logged_in;
        }
    }

    pub fn mark_connecting(&self) {
        self.set_status(ConnectionStatus::Connecting);
    }

    pub fn attach(&self, transport: Arc<dyn Transport>) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.transport = Some(transport);
        }
        self.set_status(ConnectionStatus::Connected);
        info!(server = %self.server, connection_id = %self.id, "connection attached");
    }

    pub fn mark_disconnected(&self) {
        {
            let mut state = self.state.lock();
            state.transport = None;
            state.logged_in = false;
        }
        self.set_status(ConnectionStatus::Disconnected);
        let _ = self.live.send(Inbound::Closed);
    }

    fn set_status(&self, status: ConnectionStatus) {
        {
            let mut state = self.state.lock();
            if state.status == status {
                return;
            }
            state.status = status;
        }
        self.bus.send(Event::ConnectionStatusChanged {
            server: self.server.clone(),
            status,
        });
    }

    pub fn send(&self, kind: CommandKind, params: Option<String>) -> Result<(), CoreError> {
        let command = Command::new(kind, params);
        let text = command.to_json()?;
        let mut state = self.state.lock();
        let transport = match (&state.transport, state.status) {
            (Some(t), ConnectionStatus::Connected) if !state.closed => t.clone(),
            _ => return Err(CoreError::NotConnected(self.server.clone())),
        };
        transport.send_text(text)?;
        debug!(server = %self.server, command = kind.as_str(), "command sent");
        state.sent.push(command);
        Ok(())
    }

    pub fn deliver(&self, raw: String) {
        let message: Arc<str> = Arc::from(raw);
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.received.push(message.clone());
        // sent under the lock so `resume` never misses or duplicates a message
        let _ = self.live.send(Inbound::Message(message));
    }

    pub fn resume(&self) -> (Vec<Arc<str>>, broadcast::Receiver<Inbound>) {
        let state = self.state.lock();
        (state.received.clone(), self.live.subscribe())
    }

    pub fn sent_commands(&self) -> Vec<Command> {
        self.state.lock().sent.clone()
    }

    pub fn exec_history(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|c| c.command == CommandKind::Exec)
            .filter_map(|c| c.params.clone())
            .collect()
    }

    fn close(&self) {
        self.mark_disconnected();
        self.state.lock().closed = true;
    }
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    bus: EventBus,
    connections: Arc<Mutex<HashMap<String, Arc<Connection>>>>,
}

impl ConnectionRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn open(&self, server: &str) -> Arc<Connection> {
        let mut map = self.connections.lock();
        map.entry(server.to_string())
            .or_insert_with(|| {
                info!(server = %server, "connection registered");
                Connection::new(server, self.bus.clone())
            })
            .clone()
    }

    pub fn get(&self, server: &str) -> Option<Arc<Connection>> {
        self.connections.lock().get(server).cloned()
    }

    pub fn close(&self, server: &str) -> bool {
        let removed = self.connections.lock().remove(server);
        match removed {
            Some(conn) => {
                conn.close();
                info!(server = %server, "connection closed");
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

pub fn spawn_pump(conn: Arc<Connection>, mut frames: mpsc::Receiver<WsFrame>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            match frame {
                WsFrame::Text(text) => conn.deliver(text),
                WsFrame::Closed => break,
            }
        }
        warn!(server = %conn.server(), "connection stream ended");
        conn.mark_disconnected();
    })
}
