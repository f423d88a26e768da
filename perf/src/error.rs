use places_core::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}
