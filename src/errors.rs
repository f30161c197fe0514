use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("connection setup error: {0}")]
    ConnectionSetup(String),
    #[error("frame decode error: {0}")]
    FrameDecode(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    IO(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self { AppError::IO(format!("{}", e)) }
}
