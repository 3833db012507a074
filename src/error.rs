use thiserror::Error;

pub type Result<T> = std::result::Result<T, CarouselError>;

#[derive(Error, Debug)]
pub enum CarouselError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Target size must be greater than 0")]
    ZeroTargetSize,

    #[error("Hysteresis ratio must be finite and greater than 1, got {ratio}")]
    InvalidHysteresisRatio { ratio: f64 },

    #[error("Filter must have at least one bit")]
    ZeroFilterBits,

    #[error("Filter must use at least one hash function")]
    ZeroHashFunctions,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Drain worker panicked")]
    WorkerPanicked,
}
