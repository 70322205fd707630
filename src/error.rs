use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Malformed encapsulated request: {0}")]
    MalformedRequest(String),

    #[error("No key configuration for key ID {0}")]
    UnknownKey(u8),

    #[error("Decapsulation failed")]
    DecapsulationFailed,

    #[error("Response encapsulation failed")]
    EncapsulationFailed,

    #[error("Malformed binary message: {0}")]
    MalformedMessage(String),

    #[error("Target host is forbidden")]
    TargetForbidden,

    #[error("Application handler failed: {0}")]
    Application(String),

    #[error("Invalid key registry: {0}")]
    InvalidRegistry(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
