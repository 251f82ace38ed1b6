//! Body capture and replay.

use crate::core::ScanError;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use std::convert::Infallible;

/// Boxed error type used by response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type of every response produced by the interceptor.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Reads the whole body into one owned buffer.
pub(crate) async fn capture<B>(body: B, limit: Option<usize>) -> Result<Bytes, ScanError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    match limit {
        Some(limit) => {
            let collected = Limited::new(body, limit).collect().await.map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ScanError::BodyTooLarge { limit }
                } else {
                    ScanError::body_read(e.to_string())
                }
            })?;
            Ok(collected.to_bytes())
        }
        None => {
            let collected = body.collect().await.map_err(|e| {
                let e: BoxError = e.into();
                ScanError::body_read(e.to_string())
            })?;
            Ok(collected.to_bytes())
        }
    }
}

/// Rebuilds the request around a fresh view of the captured buffer.
///
/// A bodyless request without framing headers is left without them.
pub(crate) fn replay(mut parts: http::request::Parts, buffer: Bytes) -> Request<Full<Bytes>> {
    let chunked = parts.headers.remove(TRANSFER_ENCODING).is_some();
    if chunked || parts.headers.contains_key(CONTENT_LENGTH) || !buffer.is_empty() {
        parts
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(buffer.len()));
    }
    Request::from_parts(parts, Full::new(buffer))
}

/// A terminal plain-text response.
pub(crate) fn reject(status: StatusCode, reason: &'static str) -> Response<ResponseBody> {
    let body = Full::new(Bytes::from_static(reason.as_bytes()))
        .map_err(|never: Infallible| -> BoxError { match never {} })
        .boxed_unsync();

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Boxes a downstream response body.
pub(crate) fn boxed<ResBody>(response: Response<ResBody>) -> Response<ResponseBody>
where
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    response.map(|body| body.map_err(Into::<BoxError>::into).boxed_unsync())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_within_limit() {
        let bytes = capture(Full::new(Bytes::from_static(b"payload")), Some(16))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"payload");
    }

    #[tokio::test]
    async fn test_capture_over_limit() {
        let err = capture(Full::new(Bytes::from(vec![0u8; 32])), Some(16))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::BodyTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_capture_unlimited() {
        let bytes = capture(Full::new(Bytes::from(vec![7u8; 1024])), None)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 1024);
    }

    #[test]
    fn test_replay_fixes_framing_headers() {
        let (parts, _) = Request::post("/upload")
            .header(TRANSFER_ENCODING, "chunked")
            .header(CONTENT_LENGTH, "999")
            .body(())
            .unwrap()
            .into_parts();

        let request = replay(parts, Bytes::from_static(b"12345"));
        assert_eq!(request.headers().get(CONTENT_LENGTH).unwrap(), "5");
        assert!(request.headers().get(TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_replay_leaves_bodyless_request_unframed() {
        let (parts, _) = Request::get("/object").body(()).unwrap().into_parts();
        let request = replay(parts, Bytes::new());
        assert!(request.headers().get(CONTENT_LENGTH).is_none());

        let (parts, _) = Request::head("/object").body(()).unwrap().into_parts();
        let request = replay(parts, Bytes::new());
        assert!(request.headers().get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_replay_keeps_declared_empty_length() {
        let (parts, _) = Request::post("/upload")
            .header(CONTENT_LENGTH, "0")
            .body(())
            .unwrap()
            .into_parts();
        let request = replay(parts, Bytes::new());
        assert_eq!(request.headers().get(CONTENT_LENGTH).unwrap(), "0");

        let (parts, _) = Request::post("/upload")
            .header(TRANSFER_ENCODING, "chunked")
            .body(())
            .unwrap()
            .into_parts();
        let request = replay(parts, Bytes::new());
        assert_eq!(request.headers().get(CONTENT_LENGTH).unwrap(), "0");
        assert!(request.headers().get(TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_replay_sets_length_for_undeclared_body() {
        let (parts, _) = Request::put("/upload").body(()).unwrap().into_parts();
        let request = replay(parts, Bytes::from_static(b"abc"));
        assert_eq!(request.headers().get(CONTENT_LENGTH).unwrap(), "3");
    }

    #[tokio::test]
    async fn test_reject_response() {
        let response = reject(StatusCode::FORBIDDEN, "Forbidden");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Forbidden");
    }
}
