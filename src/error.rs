use failure::Fail;

/// Error taxonomy surfaced on a [`crate::channel::Channel`], per the
/// recovery policy: authentication and redirect retries happen in-band,
/// everything else is terminal for the current request.
#[derive(Debug, Fail)]
pub enum Error {
    /// No terminal state has been reached yet; transient.
    #[fail(display = "request is still in progress")]
    Incomplete,

    #[fail(display = "could not open connection: {}", _0)]
    NoConnection(String),

    #[fail(display = "timed out")]
    Timeout,

    #[fail(display = "connection lost: {}", _0)]
    LostConnection(String),

    #[fail(display = "response was not valid HTTP: {}", _0)]
    NonHttpResponse(String),

    #[fail(display = "invalid HTTP message: {}", _0)]
    InvalidHttp(String),

    #[fail(display = "TLS error: {}", _0)]
    Tls(String),

    #[fail(display = "could not open download target: {}", _0)]
    DownloadOpenError(String),

    #[fail(display = "could not write to download target: {}", _0)]
    DownloadWriteError(String),

    #[fail(display = "invalid byte range for download: {}", _0)]
    DownloadInvalidRange(String),

    /// Any status code >= 400, surfaced verbatim.
    #[fail(display = "HTTP error {}: {}", code, reason)]
    Http { code: u16, reason: String },
}

pub type Result<T> = std::result::Result<T, failure::Error>;
