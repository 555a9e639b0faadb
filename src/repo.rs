use std::{fmt::Debug, str::FromStr, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{config, error_code::ErrorCode, store::StorageReference};

pub(crate) mod sled;

pub(crate) type ArcRepo = Arc<dyn VideoRepo>;

#[derive(Clone, Debug)]
pub(crate) enum Repo {
    Sled(self::sled::SledRepo),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] self::sled::SledError),

    #[error("Panic in blocking operation")]
    Canceled,
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::Canceled => ErrorCode::PANIC,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::SledError(self::sled::SledError::Deleted))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct VideoId(Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct UserId(Uuid);

impl VideoId {
    pub(crate) fn generate() -> Self {
        VideoId(Uuid::now_v7())
    }

    pub(crate) const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl UserId {
    pub(crate) const fn from_uuid(uuid: Uuid) -> Self {
        UserId(uuid)
    }

    pub(crate) const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl FromStr for VideoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(VideoId)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A video's metadata. `video` is only set once the object it names exists in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Video {
    pub(crate) id: VideoId,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) video: Option<StorageReference>,
    pub(crate) user_id: UserId,
}

impl Video {
    pub(crate) fn new(user_id: UserId, title: String, description: String) -> Self {
        let now = OffsetDateTime::now_utc();

        Video {
            id: VideoId::generate(),
            created_at: now,
            updated_at: now,
            title,
            description,
            thumbnail_url: None,
            video: None,
            user_id,
        }
    }

    pub(crate) fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo: Send + Sync + Debug {
    async fn health_check(&self) -> Result<(), RepoError>;

    async fn create_video(&self, video: &Video) -> Result<(), RepoError>;

    async fn video(&self, id: VideoId) -> Result<Option<Video>, RepoError>;

    /// All of a user's videos, newest first
    async fn videos_for_user(&self, user_id: UserId) -> Result<Vec<Video>, RepoError>;

    /// Overwrite the stored record, bumping `updated_at`. Last write wins
    async fn update_video(&self, video: &Video) -> Result<Video, RepoError>;

    async fn delete_video(&self, video: &Video) -> Result<(), RepoError>;
}

impl Repo {
    #[tracing::instrument]
    pub(crate) fn open(config: config::Repo) -> color_eyre::Result<Self> {
        match config {
            config::Repo::Sled(config::Sled {
                path,
                cache_capacity,
            }) => {
                let repo = self::sled::SledRepo::build(path, cache_capacity)?;

                Ok(Self::Sled(repo))
            }
        }
    }

    pub(crate) fn to_arc(&self) -> ArcRepo {
        match self {
            Self::Sled(sled_repo) => Arc::new(sled_repo.clone()),
        }
    }
}
