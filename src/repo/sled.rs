use crate::{
    error_code::ErrorCode,
    repo::{RepoError, UserId, Video, VideoId, VideoRepo},
    serde_str::Serde,
    store::StorageReference,
};
use sled::{
    transaction::{ConflictableTransactionError, TransactionError},
    Db, Transactional, Tree,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use time::OffsetDateTime;
use uuid::Uuid;

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        actix_web::rt::task::spawn_blocking(move || $expr)
            .await
            .map_err(SledError::from)??
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid video json")]
    Video(#[from] serde_json::Error),

    #[error("Transaction was aborted")]
    Aborted,

    #[error("Video was deleted before it could be updated")]
    Deleted,

    #[error("Operation panicked")]
    Panic,
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) | Self::Aborted => ErrorCode::SLED_ERROR,
            Self::Video(_) => ErrorCode::EXTRACT_VIDEO,
            Self::Deleted => ErrorCode::VIDEO_NOT_FOUND,
            Self::Panic => ErrorCode::PANIC,
        }
    }
}

impl From<tokio::task::JoinError> for SledError {
    fn from(_: tokio::task::JoinError) -> Self {
        SledError::Panic
    }
}

impl From<TransactionError<()>> for SledError {
    fn from(value: TransactionError<()>) -> Self {
        match value {
            TransactionError::Abort(()) => SledError::Aborted,
            TransactionError::Storage(e) => SledError::Sled(e),
        }
    }
}

// - Videos Tree
//   - video id -> video json
//
// - User Videos Tree
//   - user id ++ video id -> ()

#[derive(Clone)]
pub(crate) struct SledRepo {
    healthz_count: Arc<AtomicU64>,
    healthz: Tree,
    videos: Tree,
    user_videos: Tree,
    _db: Db,
}

#[derive(serde::Deserialize, serde::Serialize)]
struct InnerVideo {
    id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    title: String,
    description: String,
    thumbnail_url: Option<String>,
    video_url: Option<Serde<StorageReference>>,
    user_id: Uuid,
}

impl From<&Video> for InnerVideo {
    fn from(video: &Video) -> Self {
        InnerVideo {
            id: video.id.0,
            created_at: video.created_at,
            updated_at: video.updated_at,
            title: video.title.clone(),
            description: video.description.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            video_url: video.video.clone().map(Serde::new),
            user_id: video.user_id.0,
        }
    }
}

impl From<InnerVideo> for Video {
    fn from(inner: InnerVideo) -> Self {
        Video {
            id: VideoId(inner.id),
            created_at: inner.created_at,
            updated_at: inner.updated_at,
            title: inner.title,
            description: inner.description,
            thumbnail_url: inner.thumbnail_url,
            video: inner.video_url.map(Serde::into_inner),
            user_id: UserId(inner.user_id),
        }
    }
}

fn user_video_key(user_id: UserId, video_id: VideoId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.0.as_bytes());
    key.extend_from_slice(video_id.0.as_bytes());
    key
}

fn decode_video(bytes: &[u8]) -> Result<Video, SledError> {
    let inner: InnerVideo = serde_json::from_slice(bytes)?;

    Ok(Video::from(inner))
}

impl SledRepo {
    #[tracing::instrument]
    pub(crate) fn build(path: PathBuf, cache_capacity: u64) -> Result<Self, SledError> {
        let db = ::sled::Config::new()
            .cache_capacity(cache_capacity)
            .path(path)
            .open()?;

        Ok(SledRepo {
            healthz_count: Arc::new(AtomicU64::new(0)),
            healthz: db.open_tree("tubely-healthz-tree")?,
            videos: db.open_tree("tubely-videos-tree")?,
            user_videos: db.open_tree("tubely-user-videos-tree")?,
            _db: db,
        })
    }
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.healthz_count.fetch_add(1, Ordering::Relaxed);

        b!(self.healthz, {
            healthz.insert("healthz", &next.to_be_bytes()[..])?;
            Ok(()) as Result<(), SledError>
        });
        self.healthz.flush_async().await.map_err(SledError::from)?;
        b!(self.healthz, {
            healthz.get("healthz")?;
            Ok(()) as Result<(), SledError>
        });

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn create_video(&self, video: &Video) -> Result<(), RepoError> {
        let value = serde_json::to_vec(&InnerVideo::from(video)).map_err(SledError::from)?;
        let id = video.id.0;
        let user_video = user_video_key(video.user_id, video.id);

        let user_videos = self.user_videos.clone();
        b!(self.videos, {
            (&videos, &user_videos).transaction(|(videos, user_videos)| {
                videos.insert(&id.as_bytes()[..], value.as_slice())?;
                user_videos.insert(user_video.as_slice(), &[] as &[u8])?;

                Ok::<_, ConflictableTransactionError<()>>(())
            })?;

            Ok(()) as Result<(), SledError>
        });

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn video(&self, id: VideoId) -> Result<Option<Video>, RepoError> {
        let video = b!(self.videos, {
            videos
                .get(id.0.as_bytes())?
                .map(|bytes| decode_video(&bytes))
                .transpose()
        });

        Ok(video)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn videos_for_user(&self, user_id: UserId) -> Result<Vec<Video>, RepoError> {
        let user_videos = self.user_videos.clone();

        let mut list = b!(self.videos, {
            let mut list = Vec::new();

            for res in user_videos.scan_prefix(user_id.0.as_bytes()) {
                let (key, _) = res?;

                if let Some(bytes) = videos.get(&key[16..])? {
                    list.push(decode_video(&bytes)?);
                }
            }

            Ok(list) as Result<Vec<Video>, SledError>
        });

        list.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(list)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn update_video(&self, video: &Video) -> Result<Video, RepoError> {
        let mut updated = video.clone();
        updated.updated_at = OffsetDateTime::now_utc();

        let value = serde_json::to_vec(&InnerVideo::from(&updated)).map_err(SledError::from)?;
        let id = updated.id.0;

        b!(self.videos, {
            let res = videos.transaction(|videos| {
                if videos.get(&id.as_bytes()[..])?.is_none() {
                    return Err(ConflictableTransactionError::Abort(()));
                }

                videos.insert(&id.as_bytes()[..], value.as_slice())?;

                Ok(())
            });

            match res {
                Ok(()) => Ok(()),
                Err(TransactionError::Abort(())) => Err(SledError::Deleted),
                Err(TransactionError::Storage(e)) => Err(SledError::Sled(e)),
            }
        });

        Ok(updated)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_video(&self, video: &Video) -> Result<(), RepoError> {
        let id = video.id.0;
        let user_video = user_video_key(video.user_id, video.id);

        let user_videos = self.user_videos.clone();
        b!(self.videos, {
            (&videos, &user_videos).transaction(|(videos, user_videos)| {
                videos.remove(&id.as_bytes()[..])?;
                user_videos.remove(user_video.as_slice())?;

                Ok::<_, ConflictableTransactionError<()>>(())
            })?;

            Ok(()) as Result<(), SledError>
        });

        Ok(())
    }
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}
