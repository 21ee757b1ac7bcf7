//! Request body decoding.
//!
//! Single messages are one JSON document (an empty body is `{}`). Streamed
//! requests are newline-delimited JSON; blank lines are skipped and each
//! remaining line decodes to one element, so a malformed line fails only its
//! own element.
//!
//! Streamed bodies are collected in full before they are split, so input
//! streams reach handlers only once the client has finished sending.

use std::fmt::Display;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::BodyExt;
use hyper::body::Body;

use crate::code::RpcError;
use crate::descriptor::MethodKind;
use crate::handler::{Message, Payload};

pub(crate) async fn decode_request<B>(body: B, kind: MethodKind) -> Result<Payload, RpcError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| RpcError::internal(format!("reading request body: {e}")))?
        .to_bytes();

    if kind.streams_input() {
        Ok(Payload::Stream(stream::iter(split_lines(bytes)).boxed()))
    } else {
        decode_single(&bytes).map(Payload::Single)
    }
}

fn decode_single(bytes: &[u8]) -> Result<Message, RpcError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Message::Object(Default::default()));
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn split_lines(bytes: Bytes) -> Vec<Result<Message, RpcError>> {
    bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| serde_json::from_slice(line).map_err(RpcError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use serde_json::json;

    use super::*;
    use crate::code::Code;

    fn body(s: &'static str) -> Full<Bytes> {
        Full::new(Bytes::from_static(s.as_bytes()))
    }

    #[tokio::test]
    async fn empty_unary_body_is_empty_object() {
        let payload = decode_request(body(""), MethodKind::Unary).await.unwrap();
        assert_eq!(payload.into_single(), Some(json!({})));
    }

    #[tokio::test]
    async fn malformed_unary_body_is_invalid_argument() {
        let err = decode_request(body("{nope"), MethodKind::Unary).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn streamed_body_splits_on_newlines() {
        let payload = decode_request(body("{\"a\":1}\n\n{\"a\":2}\n"), MethodKind::ClientStreaming)
            .await
            .unwrap();
        let items: Vec<_> = payload.into_stream().map(Result::unwrap).collect().await;
        assert_eq!(items, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
    }

    #[tokio::test]
    async fn bad_line_fails_only_its_element() {
        let payload = decode_request(body("{\"a\":1}\nbad\n"), MethodKind::BidiStreaming).await.unwrap();
        let items: Vec<_> = payload.into_stream().collect().await;
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().code(), Code::InvalidArgument);
    }
}
