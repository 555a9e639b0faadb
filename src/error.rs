use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error in ffprobe")]
    Discover(#[from] crate::discover::DiscoverError),

    #[error("Error in ffmpeg")]
    Ffmpeg(#[from] crate::ffmpeg::FfMpegError),

    #[error("Couldn't authenticate request")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Error in thumbnail storage")]
    Thumbnail(#[from] crate::thumbnail::ThumbnailError),

    #[error("Panic in blocking operation")]
    Canceled,

    #[error("Application state is missing from the request")]
    MissingState,

    #[error("No files present in upload")]
    NoFiles,

    #[error("Invalid video ID")]
    InvalidVideoId(#[source] uuid::Error),

    #[error("Requested video doesn't exist")]
    MissingVideo,

    #[error("User is not the video's owner")]
    NotOwner,

    #[error("Unsupported video type {0}, expected video/mp4")]
    UnsupportedMediaType(String),

    #[error("Unsupported thumbnail type {0}, expected image/jpeg or image/png")]
    UnsupportedThumbnailType(String),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Repo(e) => e.error_code(),
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Store(e) => e.error_code(),
            Self::Discover(e) => e.error_code(),
            Self::Ffmpeg(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::Thumbnail(e) => e.error_code(),
            Self::Canceled => ErrorCode::PANIC,
            Self::MissingState => ErrorCode::UNKNOWN_ERROR,
            Self::NoFiles => ErrorCode::VALIDATE_NO_FILES,
            Self::InvalidVideoId(_) => ErrorCode::INVALID_VIDEO_ID,
            Self::MissingVideo => ErrorCode::VIDEO_NOT_FOUND,
            Self::NotOwner => ErrorCode::NOT_VIDEO_OWNER,
            Self::UnsupportedMediaType(_) => ErrorCode::UNSUPPORTED_MEDIA_TYPE,
            Self::UnsupportedThumbnailType(_) => ErrorCode::UNSUPPORTED_THUMBNAIL_TYPE,
        }
    }
}

impl From<actix_web::error::BlockingError> for UploadError {
    fn from(_: actix_web::error::BlockingError) -> Self {
        UploadError::Canceled
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(
                UploadError::Upload(_)
                | UploadError::NoFiles
                | UploadError::InvalidVideoId(_)
                | UploadError::UnsupportedThumbnailType(_),
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::UnsupportedMediaType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Some(UploadError::Auth(e)) if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            Some(UploadError::NotOwner) => StatusCode::UNAUTHORIZED,
            Some(UploadError::Store(e)) if e.is_forbidden() => StatusCode::FORBIDDEN,
            Some(UploadError::Store(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(UploadError::Thumbnail(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(UploadError::Repo(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(UploadError::MissingVideo) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, ResponseError};

    use super::{Error, UploadError};

    #[test]
    fn client_errors_map_to_4xx() {
        let cases: [(Error, StatusCode); 4] = [
            (
                UploadError::UnsupportedMediaType(String::from("image/gif")).into(),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (UploadError::NotOwner.into(), StatusCode::UNAUTHORIZED),
            (UploadError::MissingVideo.into(), StatusCode::NOT_FOUND),
            (UploadError::NoFiles.into(), StatusCode::BAD_REQUEST),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[test]
    fn dependency_errors_map_to_5xx() {
        let error: Error = crate::discover::DiscoverError::NoStreams.into();

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.error_code().as_str(), "probe-no-streams");
    }
}
