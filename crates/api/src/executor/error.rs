use studio_core::workflow::StepKind;

/// Failure of one executor call.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The request body does not fit the step kind.
    #[error("{0}")]
    BadInput(String),

    /// The generation backend refused the job.
    #[error("Backend error: {body}")]
    Backend { status: u16, body: String },

    /// The status endpoint answered with a non-success status.
    #[error("Polling error: {body}")]
    Polling { status: u16, body: String },

    /// The backend accepted the job but returned no media id.
    #[error("Couldn't create {0}")]
    MissingId(&'static str),

    /// The backend reported the job as failed.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Step kind {0} is not executed by this service")]
    NotImplemented(StepKind),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}
