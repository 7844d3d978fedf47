//! Extractors that reject with `AppError`, so every error body is JSON.

use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;
use crate::storage::Upload;

/// Multipart part that carries the license document.
pub const DOCUMENT_FIELD: &str = "document";

/// JSON extractor that returns `AppError` on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let result = axum::Json::<T>::from_request(req, state).await?;
        Ok(Json(result.0))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query extractor that returns `AppError` on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

impl<S, T> FromRequestParts<S> for Query<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let result = axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Query(result.0))
    }
}

/// Path extractor that returns `AppError` on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Path<T>(pub T);

impl<S, T> FromRequestParts<S> for Path<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let result = axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(Path(result.0))
    }
}

/// Body that is either JSON or `multipart/form-data` with an optional file.
///
/// Multipart text parts are collected into an object and deserialized into
/// `T`, so `T` must accept text for its typed fields (see `models::fields`).
/// Empty text parts are treated as absent. The file comes from the part
/// named [`DOCUMENT_FIELD`]; an empty file part is ignored.
#[derive(Debug)]
pub struct FormWithFile<T> {
    pub fields: T,
    pub file: Option<Upload>,
}

impl<S, T> FromRequest<S> for FormWithFile<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(fields) = Json::<T>::from_request(req, state).await?;
            return Ok(Self { fields, file: None });
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut object = serde_json::Map::new();
        let mut file = None;

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == DOCUMENT_FIELD {
                let file_name = field.file_name().unwrap_or(DOCUMENT_FIELD).to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    file = Some(Upload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                continue;
            }

            let text = field.text().await?;
            if !text.is_empty() {
                object.insert(name, serde_json::Value::String(text));
            }
        }

        let fields = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Ok(Self { fields, file })
    }
}
