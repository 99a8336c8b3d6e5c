use crate::{config::ConfigError, network::SocketError};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Socket operation failed")]
    Socket(#[from] SocketError),

    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("Invalid configuration")]
    Config(#[from] ConfigError),
}
