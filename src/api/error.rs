use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized - token missing or expired")]
    Unauthorized,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited - wait before retrying")]
    RateLimited,

    #[error("server error: {0}")]
    ServerError(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Cap on response bodies quoted in error messages.
const MAX_ERROR_BODY_BYTES: usize = 400;

impl ApiError {
    /// Quote at most `MAX_ERROR_BODY_BYTES` of a response body, backing up
    /// to a character boundary so multibyte text never splits mid-character.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_BYTES {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... ({} bytes total)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let quoted = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(quoted),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(quoted),
            404 => ApiError::NotFound(quoted),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(quoted),
            _ => ApiError::InvalidResponse(format!("status {}: {}", status, quoted)),
        }
    }
}
