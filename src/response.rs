//! Outgoing HTTP responses.
//!
//! Handlers never build these. The dispatcher turns a handler's
//! [`Payload`](crate::Payload) or an [`RpcError`] into one of four shapes:
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | single message | 200 | one JSON document |
//! | message stream | 200 | newline-delimited JSON, one message per line |
//! | error | from [`Code::http_status`](crate::Code::http_status) | `{"code": …, "message": …}` |
//! | not an RPC route | 404 / 405 | empty |

use std::convert::Infallible;

use bytes::Bytes;
use futures::future;
use futures::stream::StreamExt;
use http::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use serde::Serialize;

use crate::code::RpcError;
use crate::handler::{Message, MessageStream, Payload};

/// The response body type handed to hyper.
pub type Body = UnsyncBoxBody<Bytes, Infallible>;

const JSON: &str = "application/json";
const NDJSON: &str = "application/x-ndjson";

/// An outgoing HTTP response.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// `200 OK` with one JSON message.
    pub fn message(msg: &Message) -> Self {
        match serde_json::to_vec(msg) {
            Ok(bytes) => Self::full(StatusCode::OK, JSON, bytes),
            Err(e) => Self::error(&RpcError::internal(format!("encode: {e}"))),
        }
    }

    /// `200 OK` streaming one JSON line per element, flushed as produced.
    ///
    /// A failing element ends the body with `{"error": {...}}`.
    pub fn stream(messages: MessageStream) -> Self {
        let frames = messages
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                let line = match item {
                    Ok(msg) => line(&msg),
                    Err(e) => {
                        *failed = true;
                        line(&EndOfStream { error: &e })
                    }
                };
                future::ready(Some(Ok::<_, Infallible>(Frame::data(line))))
            });
        Self {
            status: StatusCode::OK,
            headers: content_type(NDJSON),
            body: StreamBody::new(frames).boxed_unsync(),
        }
    }

    /// The error payload with its code's HTTP status.
    pub fn error(err: &RpcError) -> Self {
        let body = serde_json::to_vec(err).unwrap_or_default();
        Self::full(err.code().http_status(), JSON, body)
    }

    /// A response with no body.
    pub fn status(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Empty::new().boxed_unsync() }
    }

    /// `405 Method Not Allowed` with `allow: POST`.
    pub fn method_not_allowed() -> Self {
        let mut res = Self::status(StatusCode::METHOD_NOT_ALLOWED);
        res.headers.insert(ALLOW, HeaderValue::from_static("POST"));
        res
    }

    pub(crate) fn from_payload(payload: Payload) -> Self {
        match payload {
            Payload::Single(msg) => Self::message(&msg),
            Payload::Stream(s) => Self::stream(s),
        }
    }

    /// Appends `headers` (collected from guards and middlewares).
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers {
            if let Some(name) = name {
                self.headers.append(name, value);
            }
        }
        self
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub(crate) fn into_inner(self) -> http::Response<Body> {
        let mut res = http::Response::new(self.body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }

    fn full(status: StatusCode, ct: &'static str, body: Vec<u8>) -> Self {
        Self { status, headers: content_type(ct), body: Full::new(Bytes::from(body)).boxed_unsync() }
    }
}

#[derive(Serialize)]
struct EndOfStream<'a> {
    error: &'a RpcError,
}

fn line<T: Serialize>(value: &T) -> Bytes {
    let mut buf = serde_json::to_vec(value).unwrap_or_default();
    buf.push(b'\n');
    Bytes::from(buf)
}

fn content_type(ct: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
    headers
}
