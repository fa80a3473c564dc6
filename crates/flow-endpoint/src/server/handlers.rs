//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::protocol::{ErrorResponse, HealthResponse, StatusReply};
use common::FlowError;
use tracing::{error, info, warn};

use super::state::AppState;
use crate::crypto::Inbound;
use crate::exchange::{self, FlowAction};

/// `GET /`: process liveness.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// `POST /`: encrypted flow exchange.
///
/// Bodies with fewer than two non-whitespace characters are platform health
/// probes and get the plain "active" status, whether or not they are valid
/// UTF-8. Everything else is decoded,
/// classified, answered, and the answer encrypted with the request's session
/// key. Bodies accepted through the plaintext fallback are answered in clear.
#[tracing::instrument(skip_all, fields(exchange_id = %uuid::Uuid::new_v4()))]
pub async fn flow_exchange(State(state): State<AppState>, body: Bytes) -> Response {
    if is_liveness_probe(&String::from_utf8_lossy(&body)) {
        info!(body_len = body.len(), "liveness probe");
        return (StatusCode::OK, Json(StatusReply::active())).into_response();
    }

    let Ok(raw) = std::str::from_utf8(&body) else {
        warn!(body_len = body.len(), "body is not UTF-8");
        return error_response(&FlowError::BadRequest);
    };

    // RSA unwrap is CPU-bound.
    let codec = state.codec.clone();
    let owned = raw.to_owned();
    let span = tracing::Span::current();
    let decoded = tokio::task::spawn_blocking(move || {
        span.in_scope(|| codec.decode_inbound(&owned))
    })
    .await
    .unwrap_or_else(|e| {
        error!(error = %e, "decode task failed");
        Err(FlowError::Internal)
    });

    let inbound = match decoded {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!(body_len = raw.len(), code = e.code(), "envelope rejected");
            return error_response(&e);
        }
    };

    let action = exchange::classify(inbound.cleartext());
    match &action {
        FlowAction::HealthCheck => info!("health check"),
        FlowAction::Submission(fields) => info!(
            field_names = ?fields.keys().collect::<Vec<_>>(),
            "form submission"
        ),
    }
    let reply = exchange::reply_for(&action, &state.success_screen).to_value();

    match inbound {
        Inbound::Plaintext(_) => (StatusCode::OK, Json(reply)).into_response(),
        Inbound::Encrypted(request) => match state.codec.encode(&reply, &request) {
            Ok(wire) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                wire,
            )
                .into_response(),
            Err(e) => {
                error!(code = e.code(), "reply encoding failed");
                error_response(&e)
            }
        },
    }
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

/// Fewer than two characters other than whitespace and byte order marks.
///
/// Callers decode the body lossily first, so each invalid UTF-8 sequence
/// counts as one character.
pub fn is_liveness_probe(raw: &str) -> bool {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{feff}')
        .take(2)
        .count()
        < 2
}

/// Map a [`FlowError`] to its status and a body with a fixed, generic message.
fn error_response(e: &FlowError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match e {
        FlowError::BadRequest => "request body is not JSON",
        FlowError::InvalidPlaintext => "decrypted payload is not JSON",
        e if e.is_decrypt_failure() => "request could not be decrypted",
        _ => "internal error",
    };
    (status, Json(ErrorResponse::new(e.code(), message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encoder::open_response;
    use crate::crypto::{test_support, CodecOptions, DerivedIv, ResponseFraming, SessionKey};
    use crate::server::router;
    use axum_test::TestServer;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use std::future::IntoFuture;

    const IV: [u8; 12] = [0x21; 12];

    fn server(options: CodecOptions) -> TestServer {
        let state = AppState::new(test_support::codec(options), "SERVICE_SUCCESS".into());
        TestServer::new(router::build(state)).unwrap()
    }

    #[test]
    fn liveness_threshold() {
        assert!(is_liveness_probe(""));
        assert!(is_liveness_probe("   \n\t"));
        assert!(is_liveness_probe(" x "));
        assert!(is_liveness_probe("{\n"));
        assert!(!is_liveness_probe("{}"));
        assert!(!is_liveness_probe(" a b "));
    }

    #[test]
    fn byte_order_mark_is_not_counted() {
        assert!(is_liveness_probe("\u{feff}"));
        assert!(is_liveness_probe("\u{feff}x\n"));
        assert!(!is_liveness_probe("\u{feff}{}"));
    }

    #[tokio::test]
    async fn get_reports_ok() {
        let resp = server(CodecOptions::default()).get("/").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn near_empty_post_is_plain_active() {
        let server = server(CodecOptions::default());
        for body in ["", " ", "x", "\n{\n"] {
            let resp = server.post("/").text(body).await;
            resp.assert_status_ok();
            resp.assert_json(&json!({"data": {"status": "active"}}));
        }
    }

    #[tokio::test]
    async fn encrypted_health_check_gets_encrypted_active() {
        let key = [0x31u8; 32];
        let body = test_support::envelope_body(&key, &IV, &json!({"action": "ping"}));

        let resp = server(CodecOptions::default()).post("/").text(body).await;
        resp.assert_status_ok();
        assert_eq!(resp.header(header::CONTENT_TYPE), "text/plain");

        let session = SessionKey::from_slice(&key).unwrap();
        let opened =
            open_response(&resp.text(), &session, &IV, ResponseFraming::Envelope).unwrap();
        assert_eq!(opened, json!({"data": {"status": "active"}}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_exchanges_use_their_own_keys() {
        let server = server(CodecOptions::default());
        let (key_a, key_b) = ([0x41u8; 16], [0x42u8; 32]);
        let body_a = test_support::envelope_body(&key_a, &IV, &json!({"action": "ping"}));
        let body_b = test_support::envelope_body(&key_b, &IV, &json!({"op": "health_check"}));

        let (resp_a, resp_b) = tokio::join!(
            server.post("/").text(body_a).into_future(),
            server.post("/").text(body_b).into_future()
        );
        for (resp, key) in [(resp_a, &key_a[..]), (resp_b, &key_b[..])] {
            resp.assert_status_ok();
            let session = SessionKey::from_slice(key).unwrap();
            let opened =
                open_response(&resp.text(), &session, &IV, ResponseFraming::Envelope).unwrap();
            assert_eq!(opened, json!({"data": {"status": "active"}}));
        }
    }

    #[tokio::test]
    async fn submission_gets_success_screen_concatenated() {
        let framing = ResponseFraming::Concatenated(DerivedIv::Flipped);
        let key = [0x32u8; 16];
        let body = test_support::envelope_body(
            &key,
            &IV,
            &json!({"screen": "BOOK", "data": {"fields": [{"name": "full_name", "value": "Ada"}]}}),
        );

        let resp = server(CodecOptions {
            framing,
            self_check: true,
            ..CodecOptions::default()
        })
        .post("/")
        .text(body)
        .await;
        resp.assert_status_ok();

        let session = SessionKey::from_slice(&key).unwrap();
        let opened = open_response(&resp.text(), &session, &IV, framing).unwrap();
        assert_eq!(
            opened,
            json!({"version": "3.0", "screen": "SERVICE_SUCCESS", "data": {"ok": true}})
        );
    }

    #[tokio::test]
    async fn base64_body_is_accepted() {
        let key = [0x33u8; 16];
        let body = test_support::envelope_body(&key, &IV, &json!({}));
        let resp = server(CodecOptions::default())
            .post("/")
            .text(STANDARD.encode(body))
            .await;
        resp.assert_status_ok();
    }

    #[tokio::test]
    async fn garbage_is_400_bad_request() {
        let resp = server(CodecOptions::default()).post("/").text("hello world").await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let err: ErrorResponse = resp.json();
        assert_eq!(err.code, "bad_request");
    }

    #[tokio::test]
    async fn missing_fields_is_400_without_detail() {
        let resp = server(CodecOptions::default())
            .post("/")
            .text(r#"{"encrypted_flow_data":"AAAA"}"#)
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let err: ErrorResponse = resp.json();
        assert_eq!(err.code, "malformed_envelope");
        assert_eq!(err.message, "request could not be decrypted");
    }

    #[tokio::test]
    async fn tampered_envelope_is_400() {
        let mut body = test_support::envelope(&[0x34u8; 32], &IV, b"{}");
        body["initial_vector"] = json!(STANDARD.encode([0x22u8; 12]));
        let resp = server(CodecOptions::default())
            .post("/")
            .text(body.to_string())
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let err: ErrorResponse = resp.json();
        assert_eq!(err.code, "authentication_failed");
    }

    #[tokio::test]
    async fn plaintext_fallback_answers_in_clear() {
        let options = CodecOptions {
            allow_plaintext_fallback: true,
            ..CodecOptions::default()
        };
        let resp = server(options)
            .post("/")
            .text(r#"{"op":"health_check"}"#)
            .await;
        resp.assert_status_ok();
        resp.assert_json(&json!({"data": {"status": "active"}}));
    }

    #[tokio::test]
    async fn single_invalid_byte_is_plain_active() {
        let server = server(CodecOptions::default());
        for body in [&[0xffu8][..], &[0x20, 0xc3, 0x0a][..], &[0xef, 0xbb, 0xbf, 0x78][..]] {
            let resp = server.post("/").bytes(Bytes::copy_from_slice(body)).await;
            resp.assert_status_ok();
            resp.assert_json(&json!({"data": {"status": "active"}}));
        }
    }

    #[tokio::test]
    async fn non_utf8_body_is_400() {
        let resp = server(CodecOptions::default())
            .post("/")
            .bytes(Bytes::from_static(&[0xff, 0xfe, 0xfd]))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }
}
