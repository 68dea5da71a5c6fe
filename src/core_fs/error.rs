use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} escapes the served root")]
    OutsideRoot(String),
}
