use corkboard_core::types::BoardId;
use corkboard_core::ErrorKind;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a structured error.
    #[error("Server rejected request ({status}): {message}")]
    Api {
        status: u16,
        kind: Option<ErrorKind>,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    /// No cached copy to fall back to and the fetch failed.
    #[error("Board {0} could not be loaded: {1}")]
    LoadFailed(BoardId, String),

    /// Fewer rows were repositioned than submitted.
    #[error("Reorder rewrote {updated} of {requested} entries")]
    PartialReorder { requested: usize, updated: usize },

    #[error("A reorder of {0} is already in flight")]
    ReorderInFlight(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No entity is being edited")]
    NoActiveEdit,

    #[error("Dragging is disabled while an entity is being edited")]
    DragDisabled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ClientError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api { kind, .. } => *kind,
            ClientError::Validation(_) => Some(ErrorKind::Validation),
            ClientError::Transport(_) => Some(ErrorKind::Transient),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        ClientError::Transport(value.to_string())
    }
}
