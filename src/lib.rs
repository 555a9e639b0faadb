mod auth;
mod bytes_stream;
mod config;
mod discover;
mod error;
mod error_code;
mod ffmpeg;
mod file;
mod formats;
mod future;
mod ingest;
mod init_metrics;
mod init_tracing;
mod middleware;
mod process;
mod repo;
mod serde_str;
mod signed_video;
mod state;
mod store;
mod stream;
#[cfg(all(test, unix))]
mod test_util;
mod thumbnail;
mod tmp_file;

use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{marker::PhantomData, sync::Arc};
use tracing::Instrument;
use tracing_actix_web::TracingLogger;
use url::Url;

use self::{
    auth::Authenticated,
    bytes_stream::BytesStream,
    error::{Error, UploadError},
    formats::{ThumbnailFormat, VideoFormat},
    init_tracing::init_tracing,
    middleware::{Metrics, NoCache},
    repo::{Repo, UserId, Video, VideoId},
    signed_video::SignedVideo,
    state::State,
    store::{file_store::FileStore, object_store::ObjectStore, Store},
    thumbnail::{FileThumbnails, ThumbnailName},
    tmp_file::TmpDir,
};

pub use self::config::{ConfigSource, TubelyConfiguration};

const MEGABYTES: usize = 1024 * 1024;

fn state_from_request<S: Store + 'static>(
    req: &HttpRequest,
) -> Result<web::Data<State<S>>, Error> {
    req.app_data::<web::Data<State<S>>>()
        .cloned()
        .ok_or_else(|| UploadError::MissingState.into())
}

/// Who is uploading, and to which video. Both are settled before any of the body is read
fn upload_target(req: &HttpRequest) -> Result<(UserId, VideoId), Error> {
    let Authenticated(user_id) = auth::authenticate(req)?;

    let video_id = req
        .match_info()
        .query("video_id")
        .parse()
        .map_err(UploadError::InvalidVideoId)?;

    Ok((user_id, video_id))
}

struct VideoUpload<S: Store + 'static>(Value<SignedVideo>, PhantomData<S>);

impl<S: Store + 'static> FormData for VideoUpload<S> {
    type Item = SignedVideo;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // This form expects a single file field, 'video'
        let state = state_from_request::<S>(req)?;
        let (user_id, video_id) = upload_target(req)?;

        Ok(Form::new()
            .max_files(1)
            .max_file_size(state.config.media.max_file_size * MEGABYTES)
            .transform_error(transform_error)
            .field(
                "video",
                Field::file(move |filename, content_type, stream| {
                    let state = state.clone();

                    metrics::counter!(init_metrics::UPLOADS).increment(1);

                    let span = tracing::info_span!("video-upload", ?filename);

                    let stream = crate::stream::from_err::<_, _, _, Error>(stream);

                    Box::pin(
                        async move {
                            ingest::ingest(&state, user_id, video_id, content_type.as_ref(), stream)
                                .await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(VideoUpload(value, PhantomData))
    }
}

struct ThumbnailUpload<S: Store + 'static>(Value<SignedVideo>, PhantomData<S>);

impl<S: Store + 'static> FormData for ThumbnailUpload<S> {
    type Item = SignedVideo;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // This form expects a single file field, 'thumbnail'
        let state = state_from_request::<S>(req)?;
        let (user_id, video_id) = upload_target(req)?;

        Ok(Form::new()
            .max_files(1)
            .max_file_size(state.config.media.max_thumbnail_size * MEGABYTES)
            .transform_error(transform_error)
            .field(
                "thumbnail",
                Field::file(move |filename, content_type, stream| {
                    let state = state.clone();

                    metrics::counter!(init_metrics::THUMBNAILS).increment(1);

                    let span = tracing::info_span!("thumbnail-upload", ?filename);

                    let stream = crate::stream::from_err::<_, _, _, Error>(stream);

                    Box::pin(
                        async move {
                            let format = content_type
                                .as_ref()
                                .and_then(ThumbnailFormat::from_media_type)
                                .ok_or_else(|| {
                                    UploadError::UnsupportedThumbnailType(describe(&content_type))
                                })?;

                            let mut video = owned_video(&state, user_id, video_id).await?;

                            let bytes = BytesStream::try_from_stream(stream).await?.into_bytes();

                            let name = ThumbnailName {
                                video_id: video.id,
                                format,
                            };
                            state.thumbnails.save(&name, bytes).await?;

                            video.thumbnail_url =
                                Some(thumbnail_url(&state.config.server.public_url, &name));

                            let updated = state.repo.update_video(&video).await?;

                            sign(&state, updated).await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(ThumbnailUpload(value, PhantomData))
    }
}

fn describe(content_type: &Option<mime::Mime>) -> String {
    content_type
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| String::from("(none)"))
}

fn thumbnail_url(public_url: &Url, name: &ThumbnailName) -> String {
    format!(
        "{}/assets/{name}",
        public_url.as_str().trim_end_matches('/')
    )
}

async fn sign<S: Store>(state: &State<S>, video: Video) -> Result<SignedVideo, Error> {
    let signed =
        signed_video::sign(&state.store, video, state.config.media.signature_duration()).await?;

    Ok(signed)
}

async fn owned_video<S: Store>(
    state: &State<S>,
    user_id: UserId,
    video_id: VideoId,
) -> Result<Video, Error> {
    let video = state
        .repo
        .video(video_id)
        .await?
        .ok_or(UploadError::MissingVideo)?;

    if !video.is_owned_by(user_id) {
        return Err(UploadError::NotOwner.into());
    }

    Ok(video)
}

fn parse_video_id(video_id: &str) -> Result<VideoId, Error> {
    Ok(video_id.parse().map_err(UploadError::InvalidVideoId)?)
}

fn uploaded(value: Value<SignedVideo>, field: &str) -> Result<SignedVideo, Error> {
    let file = value
        .map()
        .and_then(|mut m| m.remove(field))
        .and_then(|file| file.file())
        .ok_or(UploadError::NoFiles)?;

    tracing::debug!(
        "Uploaded {} as {}",
        file.filename,
        describe(&file.content_type)
    );

    Ok(file.result)
}

#[derive(Debug, serde::Deserialize)]
struct NewVideo {
    title: String,
    #[serde(default)]
    description: String,
}

#[tracing::instrument(name = "Creating video", skip(state, new_video))]
async fn create_video<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    web::Json(new_video): web::Json<NewVideo>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video = Video::new(user_id, new_video.title, new_video.description);

    state.repo.create_video(&video).await?;

    Ok(HttpResponse::Created().json(&sign(&state, video).await?))
}

#[tracing::instrument(name = "Listing videos", skip(state))]
async fn list_videos<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let videos = state.repo.videos_for_user(user_id).await?;

    let mut signed = Vec::with_capacity(videos.len());

    for video in videos {
        signed.push(sign(&state, video).await?);
    }

    Ok(HttpResponse::Ok().json(&signed))
}

#[tracing::instrument(name = "Fetching video", skip(state))]
async fn get_video<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video = owned_video(&state, user_id, parse_video_id(&video_id)?).await?;

    Ok(HttpResponse::Ok().json(&sign(&state, video).await?))
}

#[tracing::instrument(name = "Deleting video", skip(state))]
async fn delete_video<S: Store + 'static>(
    Authenticated(user_id): Authenticated,
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video = owned_video(&state, user_id, parse_video_id(&video_id)?).await?;

    state.repo.delete_video(&video).await?;

    if let Some(reference) = &video.video {
        if let Err(e) = state.store.remove(reference).await {
            tracing::warn!("Failed to remove {reference} for deleted video: {e}");
        }
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Respond with the video as it looks after a successful upload
#[tracing::instrument(name = "Uploaded video", skip(value))]
async fn upload_video<S: Store + 'static>(
    Multipart(VideoUpload(value, _)): Multipart<VideoUpload<S>>,
) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(&uploaded(value, "video")?))
}

#[tracing::instrument(name = "Uploaded thumbnail", skip(value))]
async fn upload_thumbnail<S: Store + 'static>(
    Multipart(ThumbnailUpload(value, _)): Multipart<ThumbnailUpload<S>>,
) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(&uploaded(value, "thumbnail")?))
}

#[tracing::instrument(name = "Serving thumbnail", skip(state))]
async fn serve_thumbnail<S: Store + 'static>(
    filename: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let name: ThumbnailName = filename.parse()?;

    let bytes = state.thumbnails.open(&name).await?;

    Ok(HttpResponse::Ok()
        .content_type(name.format.media_type().to_string())
        .body(bytes))
}

#[derive(Debug, serde::Deserialize)]
struct SignedQuery {
    expires: i64,
    signature: String,
}

#[tracing::instrument(name = "Serving file", skip(state))]
async fn serve_file(
    path: web::Path<(String, String)>,
    query: web::Query<SignedQuery>,
    state: web::Data<State<FileStore>>,
) -> Result<HttpResponse, Error> {
    let (namespace, key) = path.into_inner();
    let SignedQuery { expires, signature } = query.into_inner();

    let now = time::OffsetDateTime::now_utc().unix_timestamp();

    let file = state
        .store
        .open_signed(&namespace, &key, expires, &signature, now)
        .await?;

    let content_type = if key.ends_with(VideoFormat::Mp4.file_extension()) {
        VideoFormat::Mp4.media_type()
    } else {
        mime::APPLICATION_OCTET_STREAM
    };

    Ok(HttpResponse::Ok()
        .content_type(content_type.to_string())
        .streaming(file.read_to_stream()))
}

#[tracing::instrument(name = "Checking health", skip(state))]
async fn healthz<S: Store + 'static>(state: web::Data<State<S>>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state.store.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn configure_endpoints<S: Store + 'static, F: Fn(&mut web::ServiceConfig)>(
    config: &mut web::ServiceConfig,
    state: State<S>,
    extra_config: F,
) {
    config
        .app_data(web::Data::new(state.config.clone()))
        .app_data(web::Data::new(state))
        .route("/healthz", web::get().to(healthz::<S>))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/videos")
                        .route(web::post().to(create_video::<S>))
                        .route(web::get().to(list_videos::<S>)),
                )
                .service(
                    web::resource("/videos/{video_id}")
                        .route(web::get().to(get_video::<S>))
                        .route(web::delete().to(delete_video::<S>)),
                )
                .service(
                    web::resource("/video_upload/{video_id}")
                        .route(web::post().to(upload_video::<S>)),
                )
                .service(
                    web::resource("/thumbnail_upload/{video_id}")
                        .route(web::post().to(upload_thumbnail::<S>)),
                ),
        )
        .service(
            web::scope("/assets")
                .wrap(NoCache)
                .service(web::resource("/{filename}").route(web::get().to(serve_thumbnail::<S>))),
        )
        .configure(extra_config);
}

/// Signed file URLs are only served when this server is the one signing them
fn file_store_routes(config: &mut web::ServiceConfig) {
    config.service(web::resource("/files/{namespace}/{key:.*}").route(web::get().to(serve_file)));
}

async fn launch<S, F>(state: State<S>, extra_config: F) -> std::io::Result<()>
where
    S: Store + Send + 'static,
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let address = state.config.server.address;

    tracing::info!("Starting tubely on {address}");

    HttpServer::new(move || {
        let state = state.clone();
        let extra_config = extra_config.clone();

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Metrics)
            .configure(move |sc| configure_endpoints(sc, state, extra_config))
    })
    .bind(address)?
    .run()
    .await
}

impl TubelyConfiguration {
    /// Build the tubely configuration from commandline arguments
    ///
    /// This is probably not useful for 3rd party applications that handle their own commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        config::configure()
    }

    /// Install the default tubely tracer
    ///
    /// This is probably not useful for 3rd party applications that install their own tracing
    /// subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
        }

        init_metrics::init_metrics();

        Ok(self)
    }

    /// Run the tubely server until it is shut down
    pub async fn run(self) -> color_eyre::Result<()> {
        let TubelyConfiguration { config } = self;

        let repo = Repo::open(config.repo.clone())?.to_arc();
        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;
        let thumbnails = Arc::new(FileThumbnails::build(config.media.assets_path.clone()).await?);

        match config.store.clone() {
            config::Store::Filesystem(config::Filesystem {
                path,
                namespace,
                signing_key,
            }) => {
                let store = FileStore::build(
                    path,
                    namespace,
                    config.server.public_url.clone(),
                    signing_key,
                )
                .await?;

                store.health_check().await?;

                let state = State {
                    config,
                    tmp_dir: tmp_dir.clone(),
                    repo,
                    store,
                    thumbnails,
                };

                launch(state, file_store_routes).await?;
            }
            config::Store::ObjectStorage(config::ObjectStorage {
                endpoint,
                use_path_style,
                bucket_name,
                region,
                access_key,
                secret_key,
                session_token,
            }) => {
                let store = ObjectStore::build(
                    endpoint,
                    bucket_name,
                    use_path_style,
                    region,
                    access_key,
                    secret_key,
                    session_token,
                )?;

                store.health_check().await?;

                let state = State {
                    config,
                    tmp_dir: tmp_dir.clone(),
                    repo,
                    store,
                    thumbnails,
                };

                launch(state, |_: &mut web::ServiceConfig| {}).await?;
            }
        }

        tmp_dir.cleanup().await?;

        Ok(())
    }
}
