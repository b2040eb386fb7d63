use crate::connection::Connection;
use crate::protocol::CommandKind;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const METRIC_COMMANDS: [CommandKind; 4] = [
    CommandKind::Players,
    CommandKind::CpuUsage,
    CommandKind::RamUsage,
    CommandKind::Tps,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsightsGate {
    pub panel_visible: bool,
    pub console_visible: bool,
    pub connected: bool,
    pub logged_in: bool,
}

impl InsightsGate {
    pub fn is_open(&self) -> bool {
        self.panel_visible && self.console_visible && self.connected && self.logged_in
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerInsights {
    pub connected_players: Option<u32>,
    pub max_players: Option<u32>,
    pub cpu_usage: Option<f64>,
    pub ram_free: Option<u64>,
    pub ram_used: Option<u64>,
    pub ram_max: Option<u64>,
    pub tps: Option<f64>,
}

impl ServerInsights {
    pub fn summary(&self) -> String {
        fn or_dash<T: ToString>(v: Option<T>) -> String {
            v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
        }
        format!(
            "players {}/{} | cpu {}% | ram {}/{} MB | tps {}",
            or_dash(self.connected_players),
            or_dash(self.max_players),
            or_dash(self.cpu_usage.map(|v| format!("{v:.1}"))),
            or_dash(self.ram_used),
            or_dash(self.ram_max),
            or_dash(self.tps.map(|v| format!("{v:.1}"))),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsightsTick;

pub struct InsightsPoller {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl InsightsPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn start(&mut self, ticks: mpsc::Sender<InsightsTick>) -> bool {
        if self.is_running() {
            return false;
        }
        let period = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                match ticks.try_send(InsightsTick) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }));
        debug!(interval_ms = period.as_millis() as u64, "insights timer started");
        true
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("insights timer stopped");
        }
    }

    pub fn poll(gate: InsightsGate, conn: &Connection) -> usize {
        if !gate.is_open() {
            return 0;
        }
        let mut sent = 0;
        for kind in METRIC_COMMANDS {
            match conn.send(kind, None) {
                Ok(()) => sent += 1,
                Err(err) => warn!(server = %conn.server(), command = kind.as_str(), error = %err, "metric request failed"),
            }
        }
        sent
    }
}

impl Drop for InsightsPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::test_support::RecordingTransport;

    fn open_gate() -> InsightsGate {
        InsightsGate {
            panel_visible: true,
            console_visible: true,
            connected: true,
            logged_in: true,
        }
    }

    #[test]
    fn poll_sends_all_metrics_only_when_gate_is_open() {
        let conn = Connection::new("lobby", EventBus::new(4));
        let transport = RecordingTransport::new();
        conn.attach(transport.clone());

        let closed = InsightsGate {
            logged_in: false,
            ..open_gate()
        };
        assert_eq!(InsightsPoller::poll(closed, &conn), 0);
        assert!(transport.commands().is_empty());

        assert_eq!(InsightsPoller::poll(open_gate(), &conn), 4);
        let kinds: Vec<CommandKind> = transport.commands().iter().map(|c| c.command).collect();
        assert_eq!(kinds, METRIC_COMMANDS.to_vec());
    }

    #[tokio::test]
    async fn timer_starts_once_and_ticks() {
        let mut poller = InsightsPoller::new(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::channel(1);
        assert!(poller.start(tx.clone()));
        assert!(!poller.start(tx));
        let tick = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(tick, Some(InsightsTick));
        poller.stop();
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn dropping_the_poller_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(1);
        {
            let mut poller = InsightsPoller::new(Duration::from_millis(5));
            poller.start(tx);
        }
        // the aborted task drops the only sender
        let end = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(end.is_ok());
    }

    #[test]
    fn summary_marks_missing_values() {
        let insights = ServerInsights {
            connected_players: Some(2),
            max_players: Some(20),
            tps: Some(19.96),
            ..Default::default()
        };
        assert_eq!(
            insights.summary(),
            "players 2/20 | cpu -% | ram -/- MB | tps 20.0"
        );
    }
}
