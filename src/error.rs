use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("worker {worker} failed; training aborted")]
    WorkerFailed { worker: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
