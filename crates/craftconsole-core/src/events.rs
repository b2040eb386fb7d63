use crate::connection::ConnectionStatus;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub enum Event {
    ConnectionStatusChanged {
        server: String,
        status: ConnectionStatus,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
    PasswordRequired { server: String },
    LoggedIn {
        server: String,
        username: String,
        as_role: String,
    },
    DownloadSaved { path: PathBuf },
}

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.send(Event::Notice {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_sent_after_subscribing() {
        let bus = EventBus::new(8);
        bus.notice(NoticeLevel::Info, "dropped");
        let mut rx = bus.subscribe();
        bus.notice(NoticeLevel::Error, "File not found");
        match rx.recv().await.unwrap() {
            Event::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Error);
                assert_eq!(message, "File not found");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
