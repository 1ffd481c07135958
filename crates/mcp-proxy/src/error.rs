use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Server error: {0}")]
    Server(#[from] mcp_server::ServerError),

    #[error("Client error: {0}")]
    Client(#[from] mcp_client::ClientError),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
