use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Authentication failed for device {0}")]
    AuthenticationFailed(String),

    #[error("No handler registered for method {0}")]
    UnregisteredMethod(String),

    #[error("No handler registered for command {category}/{cmd_type}")]
    UnregisteredCommand { category: String, cmd_type: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Media server provisioning failed: {0}")]
    UpstreamProvisionFailed(String),

    #[error("Timed out waiting for {category}/{id}")]
    CorrelationTimeout { category: String, id: String },

    #[error("No dialog for {device_id}@{channel_id}")]
    DialogNotFound {
        device_id: String,
        channel_id: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SignalError>;
