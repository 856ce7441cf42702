use std::borrow::Cow;

/// ErrorMetadata can be attached to an anyhow error chain via
/// `.context(e /*ErrorMetadata*/)`. It is a generic object used across the
/// codebase to tag errors with information that is used to classify them.
///
/// The msg is conveyed as the caller-facing error message if it makes it to
/// an RPC response.
///
/// The short_msg is used as a tag - available for tests and for metrics
/// logging - to have a message that is resilient to changes in copy.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    /// The error code associated with this ErrorMetadata
    pub code: ErrorCode,
    /// short ScreamingCamelCase. Usable in tests for string matching.
    /// Eg InvalidTimestamp
    pub short_msg: Cow<'static, str>,
    /// human readable - developer facing. Should be longer and descriptive.
    pub msg: Cow<'static, str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    Overloaded,
    OperationalInternalServerError,
}

impl ErrorMetadata {
    /// Malformed input. The request can never succeed as written.
    ///
    /// The short_msg should be CapitalCamelCased describing the error.
    /// The msg should be a descriptive message targeted toward the developer.
    pub fn bad_request(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// Resource not found.
    pub fn not_found(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::NotFound,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// The node cannot take this request right now, but it may succeed later
    /// (admission control, disk pressure). Callers should back off.
    pub fn overloaded(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::Overloaded,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// An invariant the server should have upheld was violated. Not the
    /// caller's fault.
    pub fn operational_internal_server_error() -> Self {
        Self {
            code: ErrorCode::OperationalInternalServerError,
            short_msg: "InternalServerError".into(),
            msg: "Internal server error".into(),
        }
    }
}

/// Helpers for inspecting the `ErrorMetadata` attached to an anyhow chain.
pub trait ErrorMetadataAnyhowExt {
    fn metadata(&self) -> Option<&ErrorMetadata>;
    fn short_msg(&self) -> Option<&str>;
    fn is_bad_request(&self) -> bool;
    fn is_overloaded(&self) -> bool;
}

impl ErrorMetadataAnyhowExt for anyhow::Error {
    fn metadata(&self) -> Option<&ErrorMetadata> {
        self.downcast_ref::<ErrorMetadata>()
    }

    fn short_msg(&self) -> Option<&str> {
        self.metadata().map(|em| &*em.short_msg)
    }

    fn is_bad_request(&self) -> bool {
        matches!(
            self.metadata(),
            Some(ErrorMetadata {
                code: ErrorCode::BadRequest,
                ..
            })
        )
    }

    fn is_overloaded(&self) -> bool {
        matches!(
            self.metadata(),
            Some(ErrorMetadata {
                code: ErrorCode::Overloaded,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_survives_context_chain() {
        let err: anyhow::Error = anyhow::anyhow!("disk probe failed")
            .context(ErrorMetadata::overloaded("DiskFull", "disk usage over threshold"));
        assert!(err.is_overloaded());
        assert_eq!(err.short_msg(), Some("DiskFull"));
        assert!(!err.is_bad_request());
    }
}
