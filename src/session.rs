//! Session resolution. Every protected endpoint extracts an `AuthUser`;
//! this is the only place that produces `Unauthorized`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::error::Error;
use crate::models::User;
use crate::routes::AppState;

/// The authenticated caller, resolved from the bearer token by the identity
/// collaborator (sessions table).
#[derive(Debug)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Error> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthorized)?;

        let user = state
            .store
            .user_for_token(bearer.token())
            .await?
            .ok_or(Error::Unauthorized)?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;

    use super::*;
    use crate::renderer::{FsDocumentStore, PdfCertificateRenderer};
    use crate::store::memory::MemoryStore;

    fn state_with(store: MemoryStore) -> AppState {
        AppState {
            store: Arc::new(store),
            renderer: Arc::new(PdfCertificateRenderer),
            documents: Arc::new(FsDocumentStore::new("./data")),
        }
    }

    fn parts_with_auth(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/heartbeat");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn bearer_token_resolves_to_its_user() {
        let store = MemoryStore::new();
        let user = store.add_user(None, "ada@example.com");
        store.add_session(user.id, "tok-1");
        let state = state_with(store);

        let mut parts = parts_with_auth(Some("Bearer tok-1"));
        let AuthUser(resolved) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn missing_or_unknown_tokens_are_unauthorized() {
        let store = MemoryStore::new();
        let user = store.add_user(None, "ada@example.com");
        store.add_session(user.id, "tok-1");
        let state = state_with(store);

        let mut parts = parts_with_auth(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized));

        let mut parts = parts_with_auth(Some("Bearer stale"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }
}
