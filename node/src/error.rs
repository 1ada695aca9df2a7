use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("key file error: {0}")]
    KeyFile(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] drawtree_crypto::CryptoError),

    #[error("protocol error: {0}")]
    Protocol(#[from] drawtree_protocol::ProtocolError),

    #[error("network error: {0}")]
    Network(#[from] drawtree_network::NetworkError),

    #[error("invalid peer address: {0}")]
    Address(#[from] drawtree_messages::AddressError),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    #[error("node not started")]
    NotStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
