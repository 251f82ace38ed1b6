//! Tower integration.

use crate::interceptor::body::{BoxError, ResponseBody};
use crate::interceptor::handler::{InterceptorConfig, RequestInterceptor};
use crate::pipeline::InspectionPipeline;

use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that inspects request bodies before they reach the wrapped service.
#[derive(Debug, Clone)]
pub struct ScanLayer {
    interceptor: RequestInterceptor,
}

impl ScanLayer {
    /// Creates a layer around a shared pipeline.
    pub fn new(pipeline: Arc<InspectionPipeline>, config: InterceptorConfig) -> Self {
        Self {
            interceptor: RequestInterceptor::new(pipeline, config),
        }
    }

    /// Creates a layer from an existing interceptor.
    pub fn from_interceptor(interceptor: RequestInterceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for ScanLayer {
    type Service = ScanService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ScanService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Service produced by [`ScanLayer`].
#[derive(Debug, Clone)]
pub struct ScanService<S> {
    inner: S,
    interceptor: RequestInterceptor,
}

impl<S, B, ResBody> Service<Request<B>> for ScanService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<ResponseBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // Keep the service that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = self.interceptor.clone();

        Box::pin(async move {
            interceptor
                .handle(request, move |req| inner.call(req))
                .await
        })
    }
}
