use crate::connection::Connection;
use crate::error::CoreError;
use crate::protocol::CommandKind;
use tracing::{debug, info};
use zeroize::Zeroizing;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginState {
    NotSent,
    SentThisSession,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Sent,
    PromptRequired,
    Ignored,
}

// Answers login-required signals for one view. A remembered password is
// sent at most once per session so a wrong one cannot loop.
pub struct LoginFlow {
    state: LoginState,
    remembered: Option<Zeroizing<String>>,
}

impl LoginFlow {
    pub fn new(remembered: Option<String>) -> Self {
        Self {
            state: LoginState::NotSent,
            remembered: remembered.filter(|p| !p.is_empty()).map(Zeroizing::new),
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn on_login_required(&mut self, conn: &Connection) -> Result<LoginOutcome, CoreError> {
        if conn.is_logged_in() {
            debug!(server = %conn.server(), "login request while logged in, ignoring");
            return Ok(LoginOutcome::Ignored);
        }
        match (&self.remembered, self.state) {
            (Some(password), LoginState::NotSent) => {
                self.state = LoginState::SentThisSession;
                conn.send(CommandKind::Login, Some(password.to_string()))?;
                info!(server = %conn.server(), "sent remembered password");
                Ok(LoginOutcome::Sent)
            }
            _ => Ok(LoginOutcome::PromptRequired),
        }
    }

    pub fn submit(
        &mut self,
        conn: &Connection,
        password: Zeroizing<String>,
        remember: bool,
    ) -> Result<(), CoreError> {
        conn.send(CommandKind::Login, Some(password.to_string()))?;
        self.state = LoginState::SentThisSession;
        if remember {
            self.remembered = Some(password);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::test_support::RecordingTransport;

    #[test]
    fn remembered_password_is_sent_once_per_session() {
        let conn = Connection::new("lobby", EventBus::new(4));
        let transport = RecordingTransport::new();
        conn.attach(transport.clone());
        let mut flow = LoginFlow::new(Some("hunter2".to_string()));

        assert_eq!(flow.on_login_required(&conn).unwrap(), LoginOutcome::Sent);
        assert_eq!(
            flow.on_login_required(&conn).unwrap(),
            LoginOutcome::PromptRequired
        );
        let logins = transport.commands_of(CommandKind::Login);
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].params.as_deref(), Some("hunter2"));
    }

    #[test]
    fn without_password_the_user_is_prompted() {
        let conn = Connection::new("lobby", EventBus::new(4));
        let transport = RecordingTransport::new();
        conn.attach(transport.clone());
        let mut flow = LoginFlow::new(Some(String::new()));
        assert_eq!(
            flow.on_login_required(&conn).unwrap(),
            LoginOutcome::PromptRequired
        );
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn logged_in_connections_ignore_requests() {
        let conn = Connection::new("lobby", EventBus::new(4));
        conn.attach(RecordingTransport::new());
        conn.set_logged_in(true);
        let mut flow = LoginFlow::new(Some("pw".to_string()));
        assert_eq!(flow.on_login_required(&conn).unwrap(), LoginOutcome::Ignored);
        assert_eq!(flow.state(), LoginState::NotSent);
    }

    #[test]
    fn submit_sends_and_optionally_remembers() {
        let conn = Connection::new("lobby", EventBus::new(4));
        let transport = RecordingTransport::new();
        conn.attach(transport.clone());
        let mut flow = LoginFlow::new(None);
        flow.submit(&conn, Zeroizing::new("typed".to_string()), true)
            .unwrap();
        assert_eq!(flow.state(), LoginState::SentThisSession);
        assert_eq!(transport.commands_of(CommandKind::Login).len(), 1);
        assert_eq!(
            flow.on_login_required(&conn).unwrap(),
            LoginOutcome::PromptRequired
        );
    }
}
