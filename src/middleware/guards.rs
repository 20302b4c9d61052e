//! Request identity extraction.
//!
//! Session issuance and verification are upstream concerns; the gateway in
//! front of this service authenticates the caller and installs the verified
//! identity in the `x-user-id` header. The extractor only refuses requests
//! where that header is missing or malformed.

use crate::error::AppError;
use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

impl FromRequest for User {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(|id| User { id })
            .ok_or_else(|| AppError::Unauthorized.into());
        ready(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_rt::test]
    async fn extracts_identity_from_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header(("x-user-id", id.to_string()))
            .to_http_request();
        let user = User::from_request(&req, &mut Payload::None).await.unwrap();
        assert_eq!(user.id, id);
    }

    #[actix_rt::test]
    async fn rejects_missing_or_malformed_header() {
        let req = TestRequest::default().to_http_request();
        assert!(User::from_request(&req, &mut Payload::None).await.is_err());

        let req = TestRequest::default()
            .insert_header(("x-user-id", "not-a-uuid"))
            .to_http_request();
        assert!(User::from_request(&req, &mut Payload::None).await.is_err());
    }
}
