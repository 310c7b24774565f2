//! JSON HTTP surface over the annotation services

use resonance_core::{
    analyze_triad, generate_triad, AnnotatorError, CorpusWriter, ErrorKind, GenerativeModel,
    SampleDraft, Triad,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Body of `POST /api/generate-triad`
#[derive(Debug, Default, Deserialize)]
struct TopicRequest {
    #[serde(default)]
    topic: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug, Serialize)]
struct SavedBody {
    status: &'static str,
}

/// HTTP status for a failure kind
pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::EmptyInput | ErrorKind::IncompleteSample => StatusCode::BAD_REQUEST,
        ErrorKind::ExternalCallFailed
        | ErrorKind::Malformed
        | ErrorKind::MissingField
        | ErrorKind::InvalidValue => StatusCode::BAD_GATEWAY,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::DiskFull => StatusCode::INSUFFICIENT_STORAGE,
        ErrorKind::InvalidTransition => StatusCode::CONFLICT,
        ErrorKind::PermissionDenied | ErrorKind::Configuration => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_reply(error: &str, message: String, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error, message }), status)
        .into_response()
}

fn failure(err: impl Into<AnnotatorError>) -> Response {
    let err = err.into();
    let kind = err.kind();
    let status = status_for(kind);
    if status.is_server_error() {
        tracing::error!(kind = %kind, error = %err, "request failed");
    } else {
        tracing::warn!(kind = %kind, error = %err, "request rejected");
    }
    error_reply(kind.as_str(), err.to_string(), status)
}

/// All API routes, with rejections rendered as JSON errors
pub(crate) fn routes<M>(
    model: Arc<M>,
    writer: Arc<CorpusWriter>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    M: GenerativeModel + 'static,
{
    let with_model = warp::any().map(move || model.clone());
    let with_writer = warp::any().map(move || writer.clone());
    let json_body = || warp::body::content_length_limit(MAX_BODY_BYTES);

    let generate = warp::path!("api" / "generate-triad")
        .and(warp::post())
        .and(json_body())
        .and(warp::body::json())
        .and(with_model.clone())
        .and_then(handle_generate::<M>);

    let analyze = warp::path!("api" / "analyze-triad")
        .and(warp::post())
        .and(json_body())
        .and(warp::body::json())
        .and(with_model)
        .and_then(handle_analyze::<M>);

    let save = warp::path!("api" / "save-sample")
        .and(warp::post())
        .and(json_body())
        .and(warp::body::bytes())
        .and(with_writer)
        .and_then(handle_save);

    generate
        .or(analyze)
        .or(save)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

async fn handle_generate<M>(request: TopicRequest, model: Arc<M>) -> Result<Response, Infallible>
where
    M: GenerativeModel,
{
    Ok(match generate_triad(model.as_ref(), &request.topic).await {
        Ok(triad) => warp::reply::json(&triad).into_response(),
        Err(e) => failure(e),
    })
}

async fn handle_analyze<M>(triad: Triad, model: Arc<M>) -> Result<Response, Infallible>
where
    M: GenerativeModel,
{
    Ok(match analyze_triad(model.as_ref(), &triad).await {
        Ok(label) => warp::reply::json(&label).into_response(),
        Err(e) => failure(e),
    })
}

// The body is decoded here rather than by a filter so that every
// malformed sample is reported as `IncompleteSample`.
async fn handle_save(body: Bytes, writer: Arc<CorpusWriter>) -> Result<Response, Infallible> {
    let draft = match SampleDraft::from_slice(&body) {
        Ok(draft) => draft,
        Err(e) => return Ok(failure(e)),
    };
    Ok(match writer.save_sample(draft).await {
        Ok(()) => warp::reply::json(&SavedBody { status: "saved" }).into_response(),
        Err(e) => failure(e),
    })
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (error, message, status) = if rejection.is_not_found() {
        ("NotFound", "no such route", StatusCode::NOT_FOUND)
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("MethodNotAllowed", "use POST", StatusCode::METHOD_NOT_ALLOWED)
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        ("PayloadTooLarge", "request body is too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if rejection.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (
            "BadRequest",
            "request body does not match the expected JSON shape",
            StatusCode::BAD_REQUEST,
        )
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ("BadRequest", "request body must be application/json", StatusCode::BAD_REQUEST)
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        ("BadRequest", "content-length is required", StatusCode::BAD_REQUEST)
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        ("Internal", "internal error", StatusCode::INTERNAL_SERVER_ERROR)
    };

    tracing::debug!(?rejection, "request rejected by filters");
    Ok(error_reply(error, message.to_string(), status))
}

/// Bind `addr` and serve until `shutdown` resolves
///
/// Returns the bound address and the server future.
///
/// # Errors
/// - `warp::Error` if the address cannot be bound
pub(crate) fn bind<M>(
    model: Arc<M>,
    writer: Arc<CorpusWriter>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), warp::Error>
where
    M: GenerativeModel + 'static,
{
    warp::serve(routes(model, writer)).try_bind_with_graceful_shutdown(addr, shutdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::ModelError;
    use resonance_test_utils::{
        corpus_bytes, corpus_records, label_reply, label_value, sample_draft, temp_corpus,
        triad_reply, ScriptedModel,
    };
    use serde_json::{json, Value};
    use std::time::Duration;

    fn api(
        model: ScriptedModel,
        writer: CorpusWriter,
    ) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        routes(Arc::new(model), Arc::new(writer))
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn generate_returns_triad() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::always(triad_reply("a", "b", "c")), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/generate-triad")
            .json(&json!({"topic": "loss"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!({"fragment_a": "a", "fragment_b": "b", "fragment_c": "c"})
        );
    }

    #[tokio::test]
    async fn empty_topic_is_bad_request() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::always(triad_reply("a", "b", "c")), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/generate-triad")
            .json(&json!({"topic": "   "}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"], "EmptyInput");
    }

    #[tokio::test]
    async fn analyze_maps_model_failure_to_bad_gateway() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::failing(ModelError::Timeout(Duration::from_secs(30)));
        let filter = api(model, writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/analyze-triad")
            .json(&json!({"fragment_a": "a", "fragment_b": "b", "fragment_c": "c"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(&response)["error"], "ExternalCallFailed");
    }

    #[tokio::test]
    async fn analyze_returns_label() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::always(label_reply("ECHO", 0.25)), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/analyze-triad")
            .json(&json!({"fragment_a": "a", "fragment_b": "b", "fragment_c": "c"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let label = body(&response);
        assert_eq!(label["resulting_type"], "ECHO");
        assert_eq!(label["resulting_strength"], 0.25);
    }

    #[tokio::test]
    async fn analyze_reports_schema_violation() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::always(label_reply("ECHO", 1.7)), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/analyze-triad")
            .json(&json!({"fragment_a": "a", "fragment_b": "b", "fragment_c": "c"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(&response)["error"], "InvalidValue");
    }

    #[tokio::test]
    async fn save_appends_one_line() {
        let (_dir, writer) = temp_corpus();
        let path = writer.path().to_path_buf();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/save-sample")
            .json(&sample_draft("x", "y", "z", label_value("CONTRAST", 0.4)))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), json!({"status": "saved"}));
        assert_eq!(corpus_records(&path).len(), 1);
    }

    #[tokio::test]
    async fn save_without_label_is_incomplete() {
        let (_dir, writer) = temp_corpus();
        let path = writer.path().to_path_buf();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/save-sample")
            .json(&json!({"fragment_a": "x", "fragment_b": "y", "fragment_c": "z"}))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"], "IncompleteSample");
        assert!(corpus_bytes(&path).is_empty());
    }

    #[tokio::test]
    async fn save_with_non_string_fragment_is_incomplete() {
        let (_dir, writer) = temp_corpus();
        let path = writer.path().to_path_buf();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/save-sample")
            .json(&json!({
                "fragment_a": 5,
                "fragment_b": "y",
                "fragment_c": "z",
                "label": label_value("CONTRAST", 0.4),
            }))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let reply = body(&response);
        assert_eq!(reply["error"], "IncompleteSample");
        assert!(reply["message"].as_str().unwrap().contains("fragment_a"));
        assert!(corpus_bytes(&path).is_empty());
    }

    #[tokio::test]
    async fn save_with_non_json_body_is_incomplete() {
        let (_dir, writer) = temp_corpus();
        let path = writer.path().to_path_buf();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/save-sample")
            .header("content-type", "application/json")
            .body("{\"fragment_a\": ")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"], "IncompleteSample");
        assert!(corpus_bytes(&path).is_empty());
    }

    #[tokio::test]
    async fn unwritable_store_is_service_unavailable() {
        let (dir, _) = temp_corpus();
        let writer = CorpusWriter::new(dir.path().join("missing").join("corpus.jsonl"));
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/save-sample")
            .json(&sample_draft("x", "y", "z", label_value("CONTRAST", 0.4)))
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(&response)["error"], "StoreUnavailable");
    }

    #[tokio::test]
    async fn non_json_body_is_bad_request() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/analyze-triad")
            .header("content-type", "application/json")
            .body("not json")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let reply = body(&response);
        assert_eq!(reply["error"], "BadRequest");
        assert_eq!(reply["message"], "request body does not match the expected JSON shape");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("POST")
            .path("/api/train")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response), json!({"error": "NotFound", "message": "no such route"}));
    }

    #[tokio::test]
    async fn wrong_method_has_short_message() {
        let (_dir, writer) = temp_corpus();
        let filter = api(ScriptedModel::default(), writer);

        let response = warp::test::request()
            .method("GET")
            .path("/api/save-sample")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let message = body(&response)["message"].as_str().unwrap().to_string();
        assert!(!message.contains("Rejection"), "{message}");
    }

    #[test]
    fn status_table() {
        assert_eq!(status_for(ErrorKind::EmptyInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::MissingField), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::PermissionDenied), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorKind::DiskFull), StatusCode::INSUFFICIENT_STORAGE);
    }
}
