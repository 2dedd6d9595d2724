//! Caller identity.
//!
//! Users are authenticated upstream, by the gateway that fronts this service. The gateway forwards the authenticated
//! identity in two headers:
//! * `x-pds-user-id` (required): the id of the user making the call.
//! * `x-pds-pharmacy-id` (optional): present when the user is a pharmacist, and names their pharmacy.
//!
//! Handlers receive the identity through the [`CallerClaims`] extractor.
use std::ops::Deref;

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, Ready};
use log::debug;
use pharmacy_dispatch_engine::order_objects::Caller;

use crate::errors::{AuthError, ServerError};

pub const USER_ID_HEADER: &str = "x-pds-user-id";
pub const PHARMACY_ID_HEADER: &str = "x-pds-pharmacy-id";

/// Builds the caller from the identity headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, AuthError> {
    let user_id = header_id(headers, USER_ID_HEADER)?.ok_or(AuthError::MissingIdentity)?;
    let caller = match header_id(headers, PHARMACY_ID_HEADER)? {
        Some(pharmacy_id) => Caller::pharmacist(user_id, pharmacy_id),
        None => Caller::requester(user_id),
    };
    Ok(caller)
}

fn header_id(headers: &HeaderMap, name: &str) -> Result<Option<i64>, AuthError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|e| AuthError::InvalidIdentity(format!("{name}: {e}")))?;
    match value.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(Some(id)),
        Ok(id) => Err(AuthError::InvalidIdentity(format!("{name} must be positive, got {id}"))),
        Err(e) => Err(AuthError::InvalidIdentity(format!("{name}: {e}"))),
    }
}

/// The identity of the caller, extracted from the request.
///
/// If an ACL middleware has already resolved the caller, that value is reused. Otherwise the headers are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerClaims(pub Caller);

impl Deref for CallerClaims {
    type Target = Caller;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for CallerClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let resolved = req.extensions().get::<Caller>().copied();
        let caller = match resolved {
            Some(caller) => Ok(caller),
            None => caller_from_headers(req.headers()),
        };
        let result = caller.map(CallerClaims).map_err(|e| {
            debug!("💻️ Rejecting request to {}. {e}", req.path());
            ServerError::from(e)
        });
        ready(result)
    }
}
