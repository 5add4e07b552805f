use thiserror::Error;

/// Closed error taxonomy for the dispatch engine. Every fallible engine
/// operation resolves to one of these kinds; nothing else escapes the
/// engine boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound(_) => "not_found",
            DispatchError::Conflict(_) => "conflict",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::Unavailable(_) => "unavailable",
            DispatchError::Malformed(_) => "malformed",
            DispatchError::Invariant(_) => "invariant",
        }
    }
}

/// Errors local to the route client, collapsed into [`DispatchError`] at
/// the agent/motion boundary rather than surfaced raw — the route cache
/// never actually returns these, since it always falls back to a
/// synthetic polyline, but the underlying client needs its own vocabulary.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing request timed out")]
    Timeout,

    #[error("routing service unavailable: {0}")]
    Unavailable(String),

    #[error("routing response malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RouteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RouteError::Timeout
        } else {
            RouteError::Unavailable(err.to_string())
        }
    }
}

/// Errors local to the advisor client. Every caller of an `AdvisorClient`
/// has a documented rule-based fallback, so these never propagate past the
/// matcher/adapter agent that issued the call.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor request timed out")]
    Timeout,

    #[error("advisor unavailable: {0}")]
    Unavailable(String),

    #[error("advisor response malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdvisorError::Timeout
        } else {
            AdvisorError::Unavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_error_messages() {
        assert_eq!(
            DispatchError::NotFound("vehicle v-1".into()).to_string(),
            "not found: vehicle v-1"
        );
        assert_eq!(
            DispatchError::Conflict("load already matched".into()).to_string(),
            "conflict: load already matched"
        );
        assert_eq!(DispatchError::Timeout("route call".into()).kind(), "timeout");
    }

    #[test]
    fn dispatch_error_kind_is_stable() {
        assert_eq!(DispatchError::Unavailable("x".into()).kind(), "unavailable");
        assert_eq!(DispatchError::Malformed("x".into()).kind(), "malformed");
        assert_eq!(DispatchError::Invariant("x".into()).kind(), "invariant");
    }

    #[test]
    fn route_error_display() {
        assert_eq!(RouteError::Timeout.to_string(), "routing request timed out");
    }
}
