use thiserror::Error;

/// Errors returned by the lifecycle operations of
/// [`PipelineEngine`](crate::pipeline::PipelineEngine).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source refused to open. The engine is left without a source.
    #[error("failed to open video source '{identifier}': {reason:#}")]
    SourceOpen {
        identifier: String,
        reason: anyhow::Error,
    },

    /// The source opened but reported no usable frame rate. It has been
    /// closed again and the engine is left without a source.
    #[error("video source '{identifier}' did not report a frame rate")]
    FrameRateUnavailable { identifier: String },

    #[error("pipeline has been shut down")]
    ShutDown,

    #[error("failed to spawn pipeline worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}
