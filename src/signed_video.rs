use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    repo::Video,
    store::{Store, StoreError},
};

/// A video as clients see it, with `video_url` replaced by a freshly signed URL
#[derive(Debug, serde::Serialize)]
pub(crate) struct SignedVideo {
    id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    title: String,
    description: String,
    thumbnail_url: Option<String>,
    video_url: Option<String>,
    user_id: Uuid,
}

/// Sign the video's storage reference for `expires_in`. The signed URL is never persisted
#[tracing::instrument(level = "debug", skip(store, video), fields(video_id = %video.id))]
pub(crate) async fn sign<S: Store>(
    store: &S,
    video: Video,
    expires_in: Duration,
) -> Result<SignedVideo, StoreError> {
    let video_url = match &video.video {
        Some(reference) => Some(store.signed_url(reference, expires_in).await?.to_string()),
        None => None,
    };

    Ok(SignedVideo {
        id: video.id.as_uuid(),
        created_at: video.created_at,
        updated_at: video.updated_at,
        title: video.title,
        description: video.description,
        thumbnail_url: video.thumbnail_url,
        video_url,
        user_id: video.user_id.as_uuid(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        discover::Orientation,
        formats::VideoFormat,
        repo::{UserId, Video},
        store::{file_store::FileStore, ObjectKey, Store},
    };

    #[tokio::test]
    async fn only_stored_videos_get_urls() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let store = FileStore::build(
            dir.path().join("files"),
            String::from("tubely"),
            "http://localhost:8091".parse().expect("Valid url"),
            None,
        )
        .await
        .expect("Built store");

        let owner = UserId::from_uuid(uuid::Uuid::new_v4());
        let draft = Video::new(owner, String::from("Draft"), String::new());

        let signed = super::sign(&store, draft.clone(), Duration::from_secs(300))
            .await
            .expect("Signed");
        assert!(signed.video_url.is_none());

        let key = ObjectKey::generate(Orientation::Landscape, VideoFormat::Mp4);
        let reference = store
            .save_async_read(&key, &b"video"[..], &VideoFormat::Mp4.media_type())
            .await
            .expect("Saved");

        let mut stored = draft;
        stored.video = Some(reference);

        let signed = super::sign(&store, stored, Duration::from_secs(300))
            .await
            .expect("Signed");
        let url = signed.video_url.expect("Signed url");

        assert!(url.starts_with(&format!(
            "http://localhost:8091/files/tubely/{key}?expires="
        )));
        assert!(url.contains("&signature="));

        let json = serde_json::to_value(&signed.user_id).expect("Serialized");
        assert_eq!(json, serde_json::json!(owner.to_string()));
    }
}
