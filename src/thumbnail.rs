use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use actix_web::web::Bytes;

use crate::{error_code::ErrorCode, file::File, formats::ThumbnailFormat, repo::VideoId};

pub(crate) type ArcThumbnails = Arc<dyn ThumbnailStore>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ThumbnailError {
    #[error("Failed to read or write thumbnail")]
    Io(#[source] std::io::Error),

    #[error("Thumbnail doesn't exist")]
    NotFound,

    #[error("Invalid thumbnail name {0:?}")]
    InvalidName(String),
}

impl ThumbnailError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::NotFound => ErrorCode::NOT_FOUND,
            Self::InvalidName(_) => ErrorCode::INVALID_THUMBNAIL_NAME,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::InvalidName(_))
    }
}

impl From<std::io::Error> for ThumbnailError {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(value)
        }
    }
}

/// `<video id>.<extension>`, one thumbnail per video
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ThumbnailName {
    pub(crate) video_id: VideoId,
    pub(crate) format: ThumbnailFormat,
}

impl std::fmt::Display for ThumbnailName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.video_id, self.format.extension())
    }
}

impl FromStr for ThumbnailName {
    type Err = ThumbnailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ThumbnailError::InvalidName(s.to_string());

        let (id, ext) = s.rsplit_once('.').ok_or_else(invalid)?;

        Ok(ThumbnailName {
            video_id: id.parse().map_err(|_| invalid())?,
            format: ThumbnailFormat::from_extension(ext).ok_or_else(invalid)?,
        })
    }
}

/// Where thumbnail bytes live. Handlers only see this capability, never a concrete location
#[async_trait::async_trait(?Send)]
pub(crate) trait ThumbnailStore: Send + Sync + Debug {
    async fn save(&self, name: &ThumbnailName, bytes: Bytes) -> Result<(), ThumbnailError>;

    async fn open(&self, name: &ThumbnailName) -> Result<Bytes, ThumbnailError>;
}

#[derive(Clone, Debug)]
pub(crate) struct FileThumbnails {
    root: PathBuf,
}

impl FileThumbnails {
    pub(crate) async fn build(root: PathBuf) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&root).await?;

        Ok(FileThumbnails { root })
    }

    fn path(&self, name: &ThumbnailName) -> PathBuf {
        self.root.join(name.to_string())
    }
}

#[async_trait::async_trait(?Send)]
impl ThumbnailStore for FileThumbnails {
    #[tracing::instrument(skip(bytes))]
    async fn save(&self, name: &ThumbnailName, bytes: Bytes) -> Result<(), ThumbnailError> {
        let path = self.path(name);

        let mut file = File::create(&path).await.map_err(ThumbnailError::Io)?;

        if let Err(e) = file.write_from_bytes(bytes).await {
            remove_partial(&path).await;
            return Err(ThumbnailError::Io(e));
        }

        file.close().await.map_err(ThumbnailError::Io)?;

        for format in ThumbnailFormat::ALL {
            if format == name.format {
                continue;
            }

            let stale = self.path(&ThumbnailName {
                video_id: name.video_id,
                format,
            });

            match tokio::fs::remove_file(&stale).await {
                Ok(()) => tracing::debug!("Replaced {}", stale.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {e}", stale.display()),
            }
        }

        Ok(())
    }

    async fn open(&self, name: &ThumbnailName) -> Result<Bytes, ThumbnailError> {
        let bytes = tokio::fs::read(self.path(name)).await?;

        Ok(Bytes::from(bytes))
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to remove partial thumbnail {}: {e}", path.display());
    }
}
