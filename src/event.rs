use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Why a streaming request ended without a reply. `Service` means the server
/// answered with an error; `Unexpected` covers transport and everything else.
#[derive(Debug, Clone)]
pub enum StreamFailure {
    Service(String),
    Unexpected(String),
}

impl StreamFailure {
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(detail) => format!("Ollama error: {detail}\nIs the server running?"),
            Self::Unexpected(detail) => format!("Unexpected error: {detail}"),
        }
    }
}

/// Messages from the streaming task to the UI loop. `Chunk` is display-only;
/// `Completed` and `Failed` are the terminal events that mutate history.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Chunk { session: SessionId, text: String },
    Completed { session: SessionId, content: String },
    Failed { session: SessionId, failure: StreamFailure },
    StatusChanged(ConnectionState),
}
