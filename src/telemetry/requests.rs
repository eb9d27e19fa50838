use std::{convert::Infallible, fmt, sync::Arc, task, time::Duration};

use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Request},
    response::Response,
};
use eyre::Report;
use futures::future::BoxFuture;
use http_body::combinators::UnsyncBoxBody;
use tower::{BoxError, Layer, Service};
use tower_http::{
    classify::{ClassifiedResponse, ClassifyResponse, NeverClassifyEos, SharedClassifier},
    trace::{DefaultOnBodyChunk, DefaultOnEos, TraceLayer},
};
use tracing::Span;
use uuid::Uuid;

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identifies one request across log lines and the response.
#[derive(Clone)]
pub(crate) struct RequestId(HeaderValue);

impl RequestId {
    fn generate() -> Self {
        // a hyphenated UUID is always a valid header value
        Self(HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(/* known good */))
    }

    /// Reuse the caller's id when it sent a printable one.
    fn for_request<B>(request: &Request<B>) -> Self {
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .filter(|value| !value.is_empty() && value.to_str().is_ok())
            .cloned()
            .map(Self)
            .unwrap_or_else(Self::generate)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.to_str().unwrap_or("-"))
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Tags each request with a [`RequestId`] and echoes it in the response headers.
#[derive(Clone)]
pub(crate) struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>, Error = Infallible>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut task::Context<'_>) -> task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let id = RequestId::for_request(&request);
        request.extensions_mut().insert(id.clone());

        let response = self.inner.call(request);

        Box::pin(async move {
            let mut response = response.await?;
            response.headers_mut().insert(REQUEST_ID_HEADER, id.0);
            Ok(response)
        })
    }
}

pub(crate) fn id_layer() -> RequestIdLayer {
    RequestIdLayer
}

pub(crate) fn trace_layer() -> TraceLayer<
    SharedClassifier<Classifier>,
    impl (FnMut(&Request<Body>) -> Span) + Clone,
    impl FnMut(&Request<Body>, &Span) + Clone,
    impl FnOnce(&Response<UnsyncBoxBody<Bytes, BoxError>>, Duration, &Span) + Clone,
    DefaultOnBodyChunk,
    DefaultOnEos,
    impl FnMut(Arc<Report>, Duration, &Span) + Clone,
> {
    TraceLayer::new(SharedClassifier::new(Classifier::default()))
        .make_span_with(|request: &Request<Body>| {
            let id = request
                .extensions()
                .get::<RequestId>()
                .map(ToString::to_string)
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                %id,
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|_request: &Request<Body>, _span: &Span| {
            tracing::debug!("started processing request")
        })
        .on_response(|response: &Response<UnsyncBoxBody<Bytes, BoxError>>, latency: Duration, _span: &Span| {
            tracing::info!(
                status = %response.status().as_u16(),
                latency = %format_args!("{}ms", latency.as_millis()),
                "finished processing request",
            )
        })
        .on_failure(|error: Arc<Report>, latency: Duration, _span: &Span| {
            tracing::error!(
                error = ?error.as_ref(),
                latency = %format_args!("{}ms", latency.as_millis()),
                "error processing request",
            );
        })
}

/// Treats a response as failed when the handler attached an internal error to it, or when it
/// is a 5xx.
#[derive(Clone, Default)]
pub(crate) struct Classifier;

impl ClassifyResponse for Classifier {
    type FailureClass = Arc<Report>;
    type ClassifyEos = NeverClassifyEos<Self::FailureClass>;

    fn classify_response<B>(
        self,
        response: &Response<B>,
    ) -> ClassifiedResponse<Self::FailureClass, Self::ClassifyEos> {
        let error: Option<&Arc<Report>> = response.extensions().get();
        if let Some(error) = error {
            ClassifiedResponse::Ready(Err(error.clone()))
        } else if response.status().is_server_error() {
            ClassifiedResponse::Ready(Err(Arc::new(Report::msg(format!(
                "{} returned without a recorded error",
                response.status()
            )))))
        } else {
            ClassifiedResponse::Ready(Ok(()))
        }
    }

    fn classify_error<E>(self, error: &E) -> Self::FailureClass
    where
        E: std::fmt::Display + 'static,
    {
        Arc::new(Report::msg(error.to_string()))
    }
}
