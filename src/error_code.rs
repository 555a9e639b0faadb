#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl ErrorCode {
    pub(crate) const fn as_str(&self) -> &'static str {
        self.code
    }

    pub(crate) const COMMAND_TIMEOUT: ErrorCode = ErrorCode {
        code: "command-timeout",
    };
    pub(crate) const COMMAND_ERROR: ErrorCode = ErrorCode {
        code: "command-error",
    };
    pub(crate) const COMMAND_FAILURE: ErrorCode = ErrorCode {
        code: "command-failure",
    };
    pub(crate) const COMMAND_NOT_FOUND: ErrorCode = ErrorCode {
        code: "command-not-found",
    };
    pub(crate) const COMMAND_PERMISSION_DENIED: ErrorCode = ErrorCode {
        code: "command-permission-denied",
    };
    pub(crate) const NOT_FOUND: ErrorCode = ErrorCode { code: "not-found" };
    pub(crate) const FILE_IO_ERROR: ErrorCode = ErrorCode {
        code: "file-io-error",
    };
    pub(crate) const FILE_EXISTS: ErrorCode = ErrorCode {
        code: "file-exists",
    };
    pub(crate) const INVALID_OBJECT_KEY: ErrorCode = ErrorCode {
        code: "invalid-object-key",
    };
    pub(crate) const FOREIGN_NAMESPACE: ErrorCode = ErrorCode {
        code: "foreign-namespace",
    };
    pub(crate) const INVALID_PUBLIC_URL: ErrorCode = ErrorCode {
        code: "invalid-public-url",
    };
    pub(crate) const INVALID_SIGNATURE: ErrorCode = ErrorCode {
        code: "invalid-signature",
    };
    pub(crate) const SIGNATURE_EXPIRED: ErrorCode = ErrorCode {
        code: "signature-expired",
    };
    pub(crate) const OBJECT_REQUEST_ERROR: ErrorCode = ErrorCode {
        code: "object-request-error",
    };
    pub(crate) const OBJECT_IO_ERROR: ErrorCode = ErrorCode {
        code: "object-io-error",
    };
    pub(crate) const SLED_ERROR: ErrorCode = ErrorCode {
        code: "sled-error",
    };
    pub(crate) const EXTRACT_VIDEO: ErrorCode = ErrorCode {
        code: "extract-video",
    };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const PANIC: ErrorCode = ErrorCode { code: "panic" };
    pub(crate) const FILE_UPLOAD_ERROR: ErrorCode = ErrorCode {
        code: "file-upload-error",
    };
    pub(crate) const VALIDATE_NO_FILES: ErrorCode = ErrorCode {
        code: "validate-no-files",
    };
    pub(crate) const INVALID_VIDEO_ID: ErrorCode = ErrorCode {
        code: "invalid-video-id",
    };
    pub(crate) const VIDEO_NOT_FOUND: ErrorCode = ErrorCode {
        code: "video-not-found",
    };
    pub(crate) const NOT_VIDEO_OWNER: ErrorCode = ErrorCode {
        code: "not-video-owner",
    };
    pub(crate) const UNSUPPORTED_MEDIA_TYPE: ErrorCode = ErrorCode {
        code: "unsupported-media-type",
    };
    pub(crate) const UNSUPPORTED_THUMBNAIL_TYPE: ErrorCode = ErrorCode {
        code: "unsupported-thumbnail-type",
    };
    pub(crate) const MISSING_AUTHORIZATION: ErrorCode = ErrorCode {
        code: "missing-authorization",
    };
    pub(crate) const INVALID_AUTHORIZATION: ErrorCode = ErrorCode {
        code: "invalid-authorization",
    };
    pub(crate) const INVALID_TOKEN: ErrorCode = ErrorCode {
        code: "invalid-token",
    };
    pub(crate) const PROBE_NO_STREAMS: ErrorCode = ErrorCode {
        code: "probe-no-streams",
    };
    pub(crate) const PROBE_INVALID_OUTPUT: ErrorCode = ErrorCode {
        code: "probe-invalid-output",
    };
    pub(crate) const PROBE_ZERO_DIMENSION: ErrorCode = ErrorCode {
        code: "probe-zero-dimension",
    };
    pub(crate) const INVALID_THUMBNAIL_NAME: ErrorCode = ErrorCode {
        code: "invalid-thumbnail-name",
    };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}
