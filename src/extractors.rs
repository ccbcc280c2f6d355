//! Extractors that reject with `AppError` so every error body is JSON.
//!
//! Axum's own extractors answer malformed input with plain-text bodies. These
//! wrappers delegate to them and convert the rejection into a 400 with the
//! usual `{"error", "details"}` shape.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;

/// JSON body extractor and response type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Json(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Wrap an axum request-parts extractor so it rejects with `AppError`.
macro_rules! parts_extractor {
    ($(#[$meta:meta])* $name:ident => $inner:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name<T>(pub T);

        impl<S, T> FromRequestParts<S> for $name<T>
        where
            S: Send + Sync,
            T: DeserializeOwned + Send,
        {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                let value = <$inner>::from_request_parts(parts, state).await?;
                Ok($name(value.0))
            }
        }
    };
}

parts_extractor!(
    /// Query string extractor.
    Query => axum::extract::Query<T>
);

parts_extractor!(
    /// Path parameter extractor.
    Path => axum::extract::Path<T>
);
