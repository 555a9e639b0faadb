use actix_web::web::Bytes;
use futures_core::Stream;
use mime::Mime;

use crate::{
    discover::{self, Orientation},
    error::{Error, UploadError},
    ffmpeg,
    file::File,
    formats::VideoFormat,
    future::WithMetrics,
    repo::{UserId, Video, VideoId},
    signed_video::{self, SignedVideo},
    state::State,
    store::{ObjectKey, Store},
    tmp_file::TmpFile,
};

/// Take an uploaded video from the request body to a stored, fast-start mp4 recorded on its video.
///
/// Nothing is staged until the content type and ownership have been checked, and every temporary
/// file is gone once this returns, whether or not it succeeded.
#[tracing::instrument(skip(state, stream), fields(%user_id, %video_id))]
pub(crate) async fn ingest<S, St>(
    state: &State<S>,
    user_id: UserId,
    video_id: VideoId,
    content_type: Option<&Mime>,
    stream: St,
) -> Result<SignedVideo, Error>
where
    S: Store,
    St: Stream<Item = Result<Bytes, Error>>,
{
    let content_type = content_type
        .ok_or_else(|| UploadError::UnsupportedMediaType(String::from("(none)")))?;

    let format = VideoFormat::from_media_type(content_type)
        .ok_or_else(|| UploadError::UnsupportedMediaType(content_type.to_string()))?;

    let video = state
        .repo
        .video(video_id)
        .await?
        .ok_or(UploadError::MissingVideo)?;

    if !video.is_owned_by(user_id) {
        return Err(UploadError::NotOwner.into());
    }

    let staged = state.tmp_dir.tmp_file(Some(format.file_extension()));

    let res = stage_and_store(state, video, format, content_type, &staged, stream)
        .with_metrics(crate::init_metrics::INGEST_DURATION)
        .await;

    if let Err(e) = staged.cleanup().await {
        tracing::warn!("Failed to remove staged upload: {e}");
    }

    res
}

async fn stage_and_store<S, St>(
    state: &State<S>,
    video: Video,
    format: VideoFormat,
    content_type: &Mime,
    staged: &TmpFile,
    stream: St,
) -> Result<SignedVideo, Error>
where
    S: Store,
    St: Stream<Item = Result<Bytes, Error>>,
{
    let mut file = File::create(staged).await?;
    file.write_from_stream(stream).await?;
    file.close().await?;

    let orientation = discover::classify(&state.config.media, staged).await?;

    metrics::counter!(
        crate::init_metrics::INGEST_ORIENTATION,
        "orientation" => orientation.as_prefix()
    )
    .increment(1);

    let optimized = ffmpeg::fast_start(&state.config.media, staged).await?;

    let res = store_optimized(state, video, orientation, format, content_type, &optimized).await;

    if let Err(e) = optimized.cleanup().await {
        tracing::warn!("Failed to remove optimized upload: {e}");
    }

    res
}

#[tracing::instrument(level = "debug", skip(state, video, optimized), fields(video_id = %video.id))]
async fn store_optimized<S>(
    state: &State<S>,
    mut video: Video,
    orientation: Orientation,
    format: VideoFormat,
    content_type: &Mime,
    optimized: &TmpFile,
) -> Result<SignedVideo, Error>
where
    S: Store,
{
    let key = ObjectKey::generate(orientation, format);

    let file = File::open(optimized).await?;
    let reference = state.store.save_async_read(&key, file, content_type).await?;

    video.video = Some(reference.clone());

    let updated = match state.repo.update_video(&video).await {
        Ok(updated) => updated,
        Err(e) => {
            metrics::counter!(crate::init_metrics::INGEST_ORPHANED).increment(1);
            tracing::warn!("Stored {reference} but couldn't record it on video {}", video.id);

            if let Err(remove_err) = state.store.remove(&reference).await {
                tracing::warn!("Failed to remove orphaned object {reference}: {remove_err}");
            }

            return Err(e.into());
        }
    };

    let signed = signed_video::sign(
        &state.store,
        updated,
        state.config.media.signature_duration(),
    )
    .await?;

    Ok(signed)
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use actix_web::web::Bytes;

    use crate::{
        error::{Error, UploadError},
        repo::{ArcRepo, RepoError, UserId, Video, VideoId, VideoRepo},
        state::State,
        store::file_store::FileStore,
        test_util,
    };

    fn mp4() -> mime::Mime {
        "video/mp4".parse().expect("Valid mime")
    }

    fn body(bytes: &'static [u8]) -> impl futures_core::Stream<Item = Result<Bytes, Error>> {
        streem::try_from_fn(move |yielder| async move {
            yielder.yield_ok(Bytes::from_static(bytes)).await;

            Ok(())
        })
    }

    async fn draft(state: &State<FileStore>) -> Video {
        let video = Video::new(
            UserId::from_uuid(uuid::Uuid::new_v4()),
            String::from("Boots"),
            String::from("A video"),
        );

        state.repo.create_video(&video).await.expect("Created video");

        video
    }

    fn stored_objects(dir: &std::path::Path) -> usize {
        test_util::count_entries(dir.join("files"))
    }

    #[actix_web::test]
    async fn landscape_upload_is_stored_and_signed() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;
        let video = draft(&state).await;

        let signed = super::ingest(
            &state,
            video.user_id,
            video.id,
            Some(&mp4()),
            body(b"1920x1080 video"),
        )
        .await
        .expect("Ingested");

        let stored = state
            .repo
            .video(video.id)
            .await
            .expect("Fetched")
            .expect("Present");
        let reference = stored.video.expect("Reference recorded");

        assert_eq!(reference.namespace, test_util::NAMESPACE);
        assert!(reference.key.as_str().starts_with("landscape/"));
        assert!(reference.key.as_str().ends_with(".mp4"));
        assert_eq!(
            std::fs::read(test_util::stored_path(dir.path(), reference.key.as_str()))
                .expect("Read stored object"),
            test_util::remuxed(b"1920x1080 video")
        );

        let json = serde_json::to_value(&signed).expect("Serialized");
        let url = json["video_url"].as_str().expect("Signed url");
        assert!(url.starts_with(&format!(
            "{}/files/{}/landscape/",
            test_util::PUBLIC_URL,
            test_util::NAMESPACE
        )));

        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
    }

    #[actix_web::test]
    async fn portrait_uploads_get_their_own_prefix() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::PORTRAIT_PROBE).await;
        let video = draft(&state).await;

        super::ingest(
            &state,
            video.user_id,
            video.id,
            Some(&mp4()),
            body(b"1080x1920 video"),
        )
        .await
        .expect("Ingested");

        let stored = state
            .repo
            .video(video.id)
            .await
            .expect("Fetched")
            .expect("Present");

        assert!(stored
            .video
            .expect("Reference recorded")
            .key
            .as_str()
            .starts_with("portrait/"));
    }

    #[actix_web::test]
    async fn other_content_types_are_rejected_before_staging() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;
        let video = draft(&state).await;

        let polled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&polled);
        let stream = streem::try_from_fn(move |yielder| async move {
            flag.store(true, Ordering::Release);
            yielder.yield_ok(Bytes::from_static(b"GIF89a")).await;

            Ok::<_, Error>(())
        });

        let err = super::ingest(&state, video.user_id, video.id, Some(&mime::IMAGE_GIF), stream)
            .await
            .expect_err("Rejected");

        assert!(matches!(
            err.kind(),
            Some(UploadError::UnsupportedMediaType(media_type)) if media_type == "image/gif"
        ));
        assert!(!polled.load(Ordering::Acquire));
        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
        assert_eq!(stored_objects(dir.path()), 0);
    }

    #[actix_web::test]
    async fn parts_without_a_content_type_are_rejected_before_staging() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;
        let video = draft(&state).await;

        let err = super::ingest(&state, video.user_id, video.id, None, body(b"video"))
            .await
            .expect_err("Rejected");

        assert!(matches!(
            err.kind(),
            Some(UploadError::UnsupportedMediaType(_))
        ));
        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
        assert_eq!(stored_objects(dir.path()), 0);
    }

    #[actix_web::test]
    async fn only_the_owner_can_upload() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;
        let video = draft(&state).await;

        let err = super::ingest(
            &state,
            UserId::from_uuid(uuid::Uuid::new_v4()),
            video.id,
            Some(&mp4()),
            body(b"video"),
        )
        .await
        .expect_err("Rejected");

        assert!(matches!(err.kind(), Some(UploadError::NotOwner)));
        assert_eq!(
            state.repo.video(video.id).await.expect("Fetched"),
            Some(video)
        );
        assert_eq!(stored_objects(dir.path()), 0);
        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
    }

    #[actix_web::test]
    async fn missing_videos_are_not_found() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;

        let err = super::ingest(
            &state,
            UserId::from_uuid(uuid::Uuid::new_v4()),
            VideoId::generate(),
            Some(&mp4()),
            body(b"video"),
        )
        .await
        .expect_err("Rejected");

        assert!(matches!(err.kind(), Some(UploadError::MissingVideo)));
    }

    #[actix_web::test]
    async fn media_without_streams_is_never_uploaded() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (state, _) = test_util::state(dir.path(), test_util::NO_STREAMS_PROBE).await;
        let video = draft(&state).await;

        let err = super::ingest(
            &state,
            video.user_id,
            video.id,
            Some(&mp4()),
            body(b"not really a video"),
        )
        .await
        .expect_err("Rejected");

        assert!(matches!(
            err.kind(),
            Some(UploadError::Discover(crate::discover::DiscoverError::NoStreams))
        ));
        assert_eq!(stored_objects(dir.path()), 0);
        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
    }

    #[actix_web::test]
    async fn failed_remux_cleans_up() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (mut state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;
        state.config.media.ffmpeg_path = test_util::failing_tool(dir.path(), "ffmpeg");
        let video = draft(&state).await;

        let err = super::ingest(
            &state,
            video.user_id,
            video.id,
            Some(&mp4()),
            body(b"video"),
        )
        .await
        .expect_err("Rejected");

        assert!(matches!(err.kind(), Some(UploadError::Ffmpeg(_))));
        assert_eq!(stored_objects(dir.path()), 0);
        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
        assert!(state
            .repo
            .video(video.id)
            .await
            .expect("Fetched")
            .expect("Present")
            .video
            .is_none());
    }

    #[derive(Debug)]
    struct FailingUpdates(ArcRepo);

    #[async_trait::async_trait(?Send)]
    impl VideoRepo for FailingUpdates {
        async fn health_check(&self) -> Result<(), RepoError> {
            self.0.health_check().await
        }

        async fn create_video(&self, video: &Video) -> Result<(), RepoError> {
            self.0.create_video(video).await
        }

        async fn video(&self, id: VideoId) -> Result<Option<Video>, RepoError> {
            self.0.video(id).await
        }

        async fn videos_for_user(&self, user_id: UserId) -> Result<Vec<Video>, RepoError> {
            self.0.videos_for_user(user_id).await
        }

        async fn update_video(&self, _: &Video) -> Result<Video, RepoError> {
            Err(RepoError::Canceled)
        }

        async fn delete_video(&self, video: &Video) -> Result<(), RepoError> {
            self.0.delete_video(video).await
        }
    }

    #[actix_web::test]
    async fn unrecorded_objects_are_removed() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let (mut state, _) = test_util::state(dir.path(), test_util::LANDSCAPE_PROBE).await;
        let video = draft(&state).await;
        state.repo = Arc::new(FailingUpdates(state.repo.clone()));

        let err = super::ingest(
            &state,
            video.user_id,
            video.id,
            Some(&mp4()),
            body(b"video"),
        )
        .await
        .expect_err("Rejected");

        assert!(matches!(err.kind(), Some(UploadError::Repo(_))));
        assert_eq!(stored_objects(dir.path()), 0);
        assert_eq!(test_util::count_entries(&*state.tmp_dir), 0);
    }
}
