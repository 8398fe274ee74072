/// Failure of a single vendor API call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Bad credentials, HTTP 401/403, or no token in the login response.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Connection refused, timeout, non-auth HTTP error or malformed JSON.
    #[error("connectivity error: {0}")]
    Connectivity(String),
    /// Well-formed JSON that does not have the expected shape.
    #[error("unexpected API response: {0}")]
    DataShape(String),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}
