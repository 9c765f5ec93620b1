#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid device name: `{0}`")]
    InvalidDeviceName(String),
    #[error("invalid class id: `{0}`")]
    InvalidClassId(String),
    #[error("invalid weight `{0}`: must be a positive integer")]
    InvalidWeight(String),
    #[error("invalid rps cpu mask: `{0}`")]
    InvalidCpuMask(String),
    #[error("invalid receive queue: `{0}`")]
    InvalidRxQueue(String),
}

pub type Result<T> = std::result::Result<T, Error>;
