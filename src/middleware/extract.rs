// src/middleware/extract.rs

// Versões de Json, Path e Query cuja falha de extração vira o mesmo
// JSON de erro (400 + `message`) que o resto da API devolve.

use axum::{
    extract::{FromRef, FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

use crate::{
    common::{
        error::{ApiError, AppError},
        i18n::I18nStore,
    },
    config::AppState,
    middleware::i18n::Locale,
};

impl FromRef<AppState> for I18nStore {
    fn from_ref(state: &AppState) -> Self {
        state.i18n_store.clone()
    }
}

fn reject(detail: String, headers: &HeaderMap, store: &I18nStore) -> ApiError {
    tracing::debug!("Requisição rejeitada na extração: {}", detail);
    let locale = Locale::from_header(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok()),
    );
    AppError::InvalidInput(detail).to_api_error(&locale, store)
}

#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    I18nStore: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = request.headers().clone();
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(reject(rejection.body_text(), &headers, &I18nStore::from_ref(state))),
        }
    }
}

#[derive(Debug)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    I18nStore: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(reject(rejection.body_text(), &parts.headers, &I18nStore::from_ref(state))),
        }
    }
}

#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    I18nStore: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(reject(rejection.body_text(), &parts.headers, &I18nStore::from_ref(state))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        response::Response,
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::models::certificate::CertificateType;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Payload {
        #[serde(rename = "type")]
        certificate_type: CertificateType,
    }

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Paging {
        limit: i64,
    }

    fn app() -> Router {
        let store = I18nStore::load().expect("catálogo embutido");
        Router::new()
            .route("/json", post(|ApiJson(_): ApiJson<Payload>| async { "ok" }))
            .route("/path/{id}", get(|ApiPath(_): ApiPath<Uuid>| async { "ok" }))
            .route("/query", get(|ApiQuery(_): ApiQuery<Paging>| async { "ok" }))
            .with_state(store)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_json_error(response: &Response) {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "application/json");
    }

    #[tokio::test]
    async fn unknown_enum_variant_is_a_structured_400() {
        let request = HttpRequest::post("/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"type":"A9"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_json_error(&response);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().starts_with("Dados inválidos"));
    }

    #[tokio::test]
    async fn missing_content_type_is_a_structured_400() {
        let request = HttpRequest::post("/json").body(Body::from(r#"{"type":"A1"}"#)).unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_json_error(&response);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn malformed_uuid_in_path_is_a_structured_400() {
        let request = HttpRequest::get("/path/nao-e-uuid").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_json_error(&response);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn bad_query_is_a_structured_400_in_the_client_language() {
        let request = HttpRequest::get("/query?limit=muitos")
            .header(header::ACCEPT_LANGUAGE, "en-US")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_json_error(&response);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().starts_with("Invalid data"));
    }

    #[tokio::test]
    async fn valid_requests_pass_through() {
        let id = Uuid::new_v4();
        let request = HttpRequest::get(format!("/path/{}", id)).body(Body::empty()).unwrap();
        assert_eq!(app().oneshot(request).await.unwrap().status(), StatusCode::OK);

        let request = HttpRequest::post("/json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"type":"A3"}"#))
            .unwrap();
        assert_eq!(app().oneshot(request).await.unwrap().status(), StatusCode::OK);
    }
}
