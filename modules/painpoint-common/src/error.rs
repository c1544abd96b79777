use thiserror::Error;

#[derive(Error, Debug)]
pub enum PainpointError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Why a batch could not be classified. Either kind sends the whole batch to
/// the dead-letter log; neither aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClassifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::MalformedResponse(_) => "malformed_response",
            ClassifyError::Transport(_) => "transport",
        }
    }
}
