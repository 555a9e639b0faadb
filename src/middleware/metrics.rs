use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    HttpResponse, ResponseError,
};
use std::{
    cell::RefCell,
    future::{ready, Future, Ready},
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use crate::init_metrics::{REQUEST_END, REQUEST_START, REQUEST_TIMINGS};

/// Records one request. Until a status is known the request counts as dropped
struct RequestGuard {
    start: Instant,
    path: String,
    status: Option<StatusCode>,
}

impl RequestGuard {
    fn new(path: Option<String>) -> Self {
        let path = path.unwrap_or_else(|| String::from("unmatched"));

        metrics::counter!(REQUEST_START, "path" => path.clone()).increment(1);

        RequestGuard {
            start: Instant::now(),
            path,
            status: None,
        }
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let status = self
            .status
            .map(|status| status.as_u16().to_string())
            .unwrap_or_else(|| String::from("dropped"));

        metrics::counter!(REQUEST_END, "path" => self.path.clone(), "status" => status.clone())
            .increment(1);
        metrics::histogram!(REQUEST_TIMINGS, "path" => self.path.clone(), "status" => status)
            .record(self.start.elapsed().as_secs_f64());
    }
}

pub(crate) struct Metrics;

pub(crate) struct MetricsMiddleware<S> {
    inner: S,
}

/// Carries the guard to the error response so failed requests are timed with their real status
pub(crate) struct MetricsError {
    guard: RefCell<Option<RequestGuard>>,
    inner: actix_web::Error,
}

pin_project_lite::pin_project! {
    pub(crate) struct MetricsFuture<F> {
        guard: Option<RequestGuard>,

        #[pin]
        inner: F,
    }
}

pin_project_lite::pin_project! {
    pub(crate) struct MetricsBody<B> {
        guard: Option<RequestGuard>,

        #[pin]
        inner: B,
    }
}

impl<S, B> Transform<S, ServiceRequest> for Metrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>>,
    S::Future: 'static,
    S::Error: Into<actix_web::Error>,
{
    type Response = ServiceResponse<MetricsBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = MetricsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddleware { inner: service }))
    }
}

impl<S, B> Service<ServiceRequest> for MetricsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>>,
    S::Future: 'static,
    S::Error: Into<actix_web::Error>,
{
    type Response = ServiceResponse<MetricsBody<B>>;
    type Error = actix_web::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&self, cx: &mut core::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        MetricsFuture {
            guard: Some(RequestGuard::new(req.match_pattern())),
            inner: self.inner.call(req),
        }
    }
}

impl<F, B, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<ServiceResponse<B>, E>>,
    E: Into<actix_web::Error>,
{
    type Output = Result<ServiceResponse<MetricsBody<B>>, actix_web::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let res = std::task::ready!(this.inner.poll(cx));
        let guard = this.guard.take();

        Poll::Ready(match res {
            Ok(response) => Ok(response.map_body(|head, inner| MetricsBody {
                guard: guard.map(|guard| guard.with_status(head.status)),
                inner,
            })),
            Err(e) => Err(MetricsError {
                guard: RefCell::new(guard),
                inner: e.into(),
            }
            .into()),
        })
    }
}

impl<B> MessageBody for MetricsBody<B>
where
    B: MessageBody,
{
    type Error = B::Error;

    fn size(&self) -> actix_web::body::BodySize {
        self.inner.size()
    }

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<actix_web::web::Bytes, Self::Error>>> {
        let this = self.project();

        let opt = std::task::ready!(this.inner.poll_next(cx));

        if opt.is_none() {
            this.guard.take();
        }

        Poll::Ready(opt)
    }
}

impl std::fmt::Debug for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsError")
            .field("inner", &self.inner)
            .finish()
    }
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl ResponseError for MetricsError {
    fn status_code(&self) -> StatusCode {
        self.inner.as_response_error().status_code()
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let guard = self.guard.borrow_mut().take();

        self.inner.error_response().map_body(|head, inner| {
            MetricsBody {
                guard: guard.map(|guard| guard.with_status(head.status)),
                inner,
            }
            .boxed()
        })
    }
}
