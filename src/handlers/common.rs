use crate::{errors::ServiceError, services::products::StoredImage, ApiResponse};
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON body whose rejections render as `ServiceError` (400) instead of axum's plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Content type of a raw upload; images are sent as the request body.
pub fn upload_content_type(headers: &HeaderMap) -> Result<String, ServiceError> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::ValidationError("Content-Type header is required".to_string()))
}

/// Serves stored image bytes with a strong ETag; a matching `If-None-Match` gets 304.
pub fn image_response(image: StoredImage, headers: &HeaderMap) -> Result<Response, ServiceError> {
    let etag = HeaderValue::from_str(&image.etag)
        .map_err(|e| ServiceError::InternalError(format!("Invalid ETag: {}", e)))?;
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.split(',').any(|tag| tag.trim() == image.etag));

    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ETAG, etag),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=3600"),
            ),
        ],
        image.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::products::image_etag;

    fn image() -> StoredImage {
        let bytes = vec![0x89, b'P', b'N', b'G'];
        StoredImage {
            etag: image_etag(&bytes),
            content_type: "image/png".to_string(),
            bytes,
        }
    }

    #[test]
    fn image_is_served_with_etag() {
        let response = image_response(image(), &HeaderMap::new()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert!(response.headers().contains_key(header::ETAG));
    }

    #[test]
    fn matching_etag_is_not_modified() {
        let img = image();
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&img.etag).unwrap());
        let response = image_response(img, &headers).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[test]
    fn upload_requires_content_type() {
        assert!(upload_content_type(&HeaderMap::new()).is_err());
    }
}
