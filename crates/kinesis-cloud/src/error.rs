/// Errors that can occur when querying CloudWatch.
///
/// # Examples
///
/// ```rust
/// use kinesis_cloud::error::CloudWatchError;
///
/// let err = CloudWatchError::UnknownRegion("mars-north-1".to_string());
/// assert!(err.to_string().contains("mars-north-1"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CloudWatchError {
    /// HTTP-level error: non-2xx status code with a body that is not a CloudWatch error document.
    #[error("CloudWatch HTTP error: status={status}, body={body}")]
    HttpError { status: u16, body: String },

    /// CloudWatch rejected the request with a typed error (`__type` / `message`).
    #[error("CloudWatch API error: code={code}, message={message}")]
    ApiResponseError { code: String, message: String },

    /// Request was throttled. No retry is attempted; the metric is skipped for this run.
    #[error("CloudWatch API rate limited: {0}")]
    RateLimited(String),

    /// HMAC key setup failed while signing a request.
    #[error("Request signing error: {0}")]
    SigningError(String),

    /// An underlying HTTP transport error from `reqwest`.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The region code is not one CloudWatch is served from.
    #[error("Unknown AWS region: {0}")]
    UnknownRegion(String),

    /// Neither flags nor environment supplied an access key pair.
    #[error("Missing AWS credentials: {0}")]
    MissingCredentials(String),

    /// The query succeeded but the window held no datapoints.
    #[error("{metric}: fetched no datapoints")]
    NoDatapoints { metric: String },

    /// The latest datapoint does not carry the requested statistic.
    #[error("{metric}: latest datapoint has no {statistic} value")]
    MissingStatistic { metric: String, statistic: String },

    /// The fetch did not finish within the per-request budget.
    #[error("{metric}: timed out after {secs}s")]
    Timeout { metric: String, secs: u64 },
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CloudWatchError>;
