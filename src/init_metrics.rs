pub(super) fn init_metrics() {
    describe_toplevel();
    describe_ingest();
    describe_process();
    describe_middleware();
}

fn describe_toplevel() {
    metrics::describe_counter!(UPLOADS, "How many videos have been uploaded to tubely");
    metrics::describe_counter!(
        THUMBNAILS,
        "How many thumbnails have been uploaded to tubely"
    );
}

pub(crate) const UPLOADS: &str = "tubely.uploads";
pub(crate) const THUMBNAILS: &str = "tubely.thumbnails";

fn describe_ingest() {
    metrics::describe_histogram!(
        INGEST_DURATION,
        "Timings for staging, probing, remuxing and storing an uploaded video"
    );
    metrics::describe_counter!(
        INGEST_ORIENTATION,
        "How many ingested videos fell into each orientation"
    );
    metrics::describe_counter!(
        INGEST_ORPHANED,
        "How many stored videos could not be recorded in the repo afterwards"
    );
}

pub(crate) const INGEST_DURATION: &str = "tubely.ingest.duration";
pub(crate) const INGEST_ORIENTATION: &str = "tubely.ingest.orientation";
pub(crate) const INGEST_ORPHANED: &str = "tubely.ingest.orphaned";

fn describe_process() {
    metrics::describe_counter!(
        PROCESS_START,
        "How many times tubely has spawned ffprobe or ffmpeg"
    );
    metrics::describe_histogram!(
        PROCESS_DURATION,
        "Timings for how long ffprobe and ffmpeg take to complete"
    );
    metrics::describe_counter!(PROCESS_END, "How many spawned processes have completed");
}

pub(crate) const PROCESS_START: &str = "tubely.process.start";
pub(crate) const PROCESS_DURATION: &str = "tubely.process.duration";
pub(crate) const PROCESS_END: &str = "tubely.process.end";

fn describe_middleware() {
    metrics::describe_counter!(
        REQUEST_START,
        "How many requests have been made to tubely, by requested path"
    );
    metrics::describe_counter!(
        REQUEST_END,
        "How many requests tubely has finished serving, by requested path"
    );
    metrics::describe_histogram!(
        REQUEST_TIMINGS,
        "How long tubely takes to serve requests, by requested path"
    );
}

pub(crate) const REQUEST_START: &str = "tubely.request.start";
pub(crate) const REQUEST_END: &str = "tubely.request.end";
pub(crate) const REQUEST_TIMINGS: &str = "tubely.request.timings";
