use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid timeout '{0}'")]
    InvalidTimeout(String),
}
