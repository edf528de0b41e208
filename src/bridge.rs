use crate::event::{ConnectionState, RelayEvent, StreamFailure};
use crate::ollama::{ChatMessage, OllamaClient, OllamaError};
use crate::session::{Role, SessionId, Turn};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tokio::runtime::Handle;
use tokio::time::{self, Duration};

const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Runs the streaming side of the app: one background task per in-flight
/// request, relaying Ollama output to the UI thread over the event channel.
#[derive(Clone)]
pub struct StreamingBridge {
    client: OllamaClient,
    model: String,
    tx: mpsc::Sender<RelayEvent>,
    runtime_handle: Handle,
    health_poller_started: Arc<AtomicBool>,
}

impl StreamingBridge {
    pub fn new(client: OllamaClient, model: String, tx: mpsc::Sender<RelayEvent>) -> Result<Self> {
        let runtime_handle = Handle::try_current().context("tokio runtime unavailable")?;
        Ok(Self {
            client,
            model,
            tx,
            runtime_handle,
            health_poller_started: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn start(&self) {
        let _ = self
            .tx
            .send(RelayEvent::StatusChanged(ConnectionState::Connecting));
        self.spawn_health_poller();
    }

    /// Stream one reply for `session`: every content fragment is relayed as a
    /// Chunk, followed by exactly one Completed or Failed.
    pub fn send(&self, session: SessionId, history: &[Turn]) {
        let client = self.client.clone();
        let model = self.model.clone();
        let tx = self.tx.clone();
        let messages = wire_history(history);

        self.runtime_handle.spawn(async move {
            log::debug!("streaming request for {session} ({} turns)", messages.len());
            let mut relay_chunk = {
                let tx = tx.clone();
                let session = session.clone();
                move |text: &str| {
                    let _ = tx.send(RelayEvent::Chunk {
                        session: session.clone(),
                        text: text.to_string(),
                    });
                }
            };

            match client.chat_stream(&model, messages, &mut relay_chunk).await {
                Ok(content) => {
                    let _ = tx.send(RelayEvent::Completed { session, content });
                }
                Err(err) => {
                    let failure = match err {
                        OllamaError::Api(detail) => StreamFailure::Service(detail),
                        OllamaError::Request(err) => StreamFailure::Unexpected(err.to_string()),
                    };
                    let _ = tx.send(RelayEvent::Failed { session, failure });
                }
            }
        });
    }

    fn spawn_health_poller(&self) {
        if self
            .health_poller_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let tx = self.tx.clone();
        let client = self.client.clone();
        self.runtime_handle.spawn(async move {
            let mut ticker = time::interval(HEALTH_PROBE_INTERVAL);
            let mut last_state: Option<ConnectionState> = None;

            loop {
                ticker.tick().await;
                let state = match client.list_models().await {
                    Ok(models) => {
                        if last_state != Some(ConnectionState::Connected) {
                            let names: Vec<&str> =
                                models.iter().map(|m| m.name.as_str()).collect();
                            log::info!("ollama reachable, models: [{}]", names.join(", "));
                        }
                        ConnectionState::Connected
                    }
                    Err(err) => {
                        if last_state != Some(ConnectionState::Disconnected) {
                            log::warn!("ollama unreachable: {err}");
                        }
                        ConnectionState::Disconnected
                    }
                };
                if last_state != Some(state) {
                    last_state = Some(state);
                    let _ = tx.send(RelayEvent::StatusChanged(state));
                }
            }
        });
    }
}

fn wire_history(history: &[Turn]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|turn| ChatMessage {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: turn.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::wire_history;
    use crate::session::Turn;

    #[test]
    fn wire_history_maps_roles_in_order() {
        let history = vec![Turn::assistant("Hello!"), Turn::user("Plan my week")];
        let messages = wire_history(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[0].content, "Hello!");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "Plan my week");
    }
}
