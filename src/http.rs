// ABOUTME: HTTP boundary of the gateway: POST /sms, the service card, OPTIONS and a catch-all
// ABOUTME: Maps each send outcome to a JSON body and a 200 or 500 status

use crate::client::{Gateway, SendOutcome};
use crate::store::DeliveryStore;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared state behind every handler
pub struct AppState<S> {
    pub gateway: Arc<Gateway<S>>,
    /// Reported as `server` in the service card
    pub server_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendRequest {
    pub msisdn: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceCard {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
    pub status: &'static str,
    pub version: &'static str,
    pub server: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatchAll {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: u16,
    pub message: &'static str,
}

pub fn router<S: DeliveryStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route(
            "/",
            get(service_card::<S>).options(options).fallback(catch_all),
        )
        .route(
            "/sms",
            post(send_sms::<S>).options(options).fallback(catch_all),
        )
        .fallback(catch_all)
        .with_state(state)
}

async fn service_card<S: DeliveryStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<ServiceCard> {
    Json(ServiceCard {
        name: "SMPP ESME",
        kind: "microservice",
        description: "SMPP Gateway",
        status: "success",
        version: env!("CARGO_PKG_VERSION"),
        server: state.server_name.clone(),
    })
}

async fn send_sms<S: DeliveryStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<SendRequest>,
) -> Response {
    info!(msisdn = %request.msisdn, length = request.message.chars().count(), "Send SMS");

    let outcome: SendOutcome = state.gateway.send(&request.msisdn, &request.message).await;
    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome)).into_response()
}

async fn options() -> StatusCode {
    StatusCode::OK
}

async fn catch_all(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(CatchAll {
            kind: "catchall",
            code: 501,
            message: "Requested method or path is invalid",
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BindCredentials, GatewayBuilder};
    use crate::store::MemoryStore;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let gateway = GatewayBuilder::new("127.0.0.1", 9, BindCredentials::transceiver("id", "pw"))
            .connect_timeout(Duration::from_secs(2))
            .delivery_timeout(Duration::from_secs(1))
            .build(MemoryStore::new());
        router(Arc::new(AppState {
            gateway: Arc::new(gateway),
            server_name: "test-node".into(),
        }))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn service_card_describes_the_service() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["type"], "microservice");
        assert_eq!(body["server"], "test-node");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn failed_send_is_500_with_outcome() {
        let request = Request::post("/sms")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"msisdn":"06304988888","message":"Hello World!"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["code"], 520);
    }

    #[tokio::test]
    async fn options_is_allowed_anywhere() {
        for path in ["/", "/sms", "/anything/else"] {
            let request = Request::builder()
                .method(Method::OPTIONS)
                .uri(path)
                .body(Body::empty())
                .unwrap();
            let response = app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", path);
        }
    }

    #[tokio::test]
    async fn unknown_routes_hit_the_catch_all() {
        let routes = [
            (Method::POST, "/nope"),
            (Method::DELETE, "/sms"),
            (Method::POST, "/"),
        ];
        for (method, path) in routes {
            let request = Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap();
            let response = app().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

            let body = json_body(response).await;
            assert_eq!(body["type"], "catchall");
            assert_eq!(body["code"], 501);
        }
    }
}
