//! Duplication of an inbound request into two independently consumable
//! copies, so one can be served locally while the other is replayed to the
//! mirror endpoint.

use bytes::{Bytes, BytesMut};
use http::request::Parts;
use hyper::body::HttpBody;
use hyper::{Body, Request};
use tracing::debug;

/// Read the request body exactly once and produce two requests that carry
/// identical metadata and independently readable copies of it.
///
/// Reading either copy never blocks on, or is affected by, reads of the
/// other: both bodies are backed by the same frozen buffer. If the original
/// body fails partway through, both copies observe exactly the bytes read
/// so far and the handler path sees parsing fail naturally.
///
/// At most `max_bytes` (plus one in-flight chunk) are buffered. A body
/// over the limit stops being read; the copies end up over `max_bytes`,
/// which is enough for the handler's own size check to reject the request.
pub(crate) async fn duplicate_request(
    req: Request<Body>,
    max_bytes: usize,
) -> (Request<Body>, Request<Body>) {
    let (parts, mut payload) = req.into_parts();

    let mut buf = BytesMut::new();
    while let Some(chunk) = payload.data().await {
        match chunk {
            Ok(chunk) => {
                buf.extend_from_slice(&chunk);
                if buf.len() > max_bytes {
                    debug!(bytes = buf.len(), "request body over the size limit, stopping the tee read");
                    break;
                }
            }
            Err(error) => {
                debug!(%error, "request body truncated while teeing");
                break;
            }
        }
    }
    let body = buf.freeze();

    (rebuild(&parts, body.clone()), rebuild(&parts, body))
}

fn rebuild(parts: &Parts, body: Bytes) -> Request<Body> {
    let mut req = Request::new(Body::from(body));
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = parts.uri.clone();
    *req.version_mut() = parts.version;
    *req.headers_mut() = parts.headers.clone();
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use pretty_assertions::assert_eq;

    fn write_request(body: Body) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/write?db=metrics&precision=s")
            .header("content-encoding", "gzip")
            .header("host", "gateway.local")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn copies_carry_identical_metadata() {
        let req = write_request(Body::from("cpu usage=1i 1"));
        let (primary, mirrored) = duplicate_request(req, usize::MAX).await;

        for copy in [&primary, &mirrored] {
            assert_eq!(copy.method(), Method::POST);
            assert_eq!(copy.uri(), "/write?db=metrics&precision=s");
            assert_eq!(copy.headers()["content-encoding"], "gzip");
            assert_eq!(copy.headers()["host"], "gateway.local");
        }
    }

    #[tokio::test]
    async fn bodies_are_independent() {
        let req = write_request(Body::from("cpu usage=1i 1"));
        let (primary, mirrored) = duplicate_request(req, usize::MAX).await;

        // Consume the mirrored copy first; the primary must be unaffected.
        let mirrored_body = hyper::body::to_bytes(mirrored.into_body()).await.unwrap();
        let primary_body = hyper::body::to_bytes(primary.into_body()).await.unwrap();

        assert_eq!(mirrored_body, Bytes::from("cpu usage=1i 1"));
        assert_eq!(primary_body, mirrored_body);
    }

    #[tokio::test]
    async fn oversized_body_stops_being_buffered() {
        let (mut tx, body) = Body::channel();
        let req = write_request(body);

        let tee = tokio::spawn(duplicate_request(req, 16));
        let sender = tokio::spawn(async move {
            for _ in 0..4 {
                if tx.send_data(Bytes::from(vec![b'x'; 8])).await.is_err() {
                    // The tee stopped reading; remaining chunks go nowhere.
                    break;
                }
            }
        });

        let (primary, _mirrored) = tee.await.unwrap();
        sender.await.unwrap();
        let primary_body = hyper::body::to_bytes(primary.into_body()).await.unwrap();

        // Over the limit, so the handler's size check trips, but bounded:
        // reading stopped at the first chunk past the limit.
        assert!(primary_body.len() > 16, "{}", primary_body.len());
        assert!(primary_body.len() <= 24, "{}", primary_body.len());
    }

    #[tokio::test]
    async fn failed_body_read_truncates_both_copies() {
        let (mut tx, body) = Body::channel();
        let req = write_request(body);

        let tee = tokio::spawn(duplicate_request(req, usize::MAX));
        tx.send_data(Bytes::from("cpu usage=1i")).await.unwrap();
        tx.abort();

        let (primary, mirrored) = tee.await.unwrap();
        let primary_body = hyper::body::to_bytes(primary.into_body()).await.unwrap();
        let mirrored_body = hyper::body::to_bytes(mirrored.into_body()).await.unwrap();

        assert_eq!(primary_body, Bytes::from("cpu usage=1i"));
        assert_eq!(mirrored_body, primary_body);
    }
}
