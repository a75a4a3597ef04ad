use thiserror::Error;

pub type CrptResult<T> = Result<T, CrptError>;

#[derive(Debug, Error)]
pub enum CrptError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
