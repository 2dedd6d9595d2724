//! Access control list middleware for the Pharmacy Dispatch Server.
//! This middleware can be placed on any route or service.
//!
//! It resolves the caller from the identity headers (see [`crate::identity`]) and checks the caller's role against the
//! roles required by the route. If the caller has one of the required roles, the resolved [`Caller`] is stored in the
//! request extensions and the request continues. Otherwise a 401 (no valid identity) or 403 (wrong role) response is
//! returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::debug;
use pharmacy_dispatch_engine::order_objects::{Caller, Role};

use crate::{
    errors::{AuthError, ServerError},
    identity::caller_from_headers,
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let existing = req.extensions().get::<Caller>().copied();
            let caller = match existing {
                Some(caller) => caller,
                None => caller_from_headers(req.headers()).map_err(ServerError::from)?,
            };
            if required_roles.contains(&caller.role()) {
                req.extensions_mut().insert(caller);
                service.call(req).await
            } else {
                debug!("💻️ {caller} was denied access to {}. Requires one of {required_roles:?}", req.path());
                let err = AuthError::InsufficientPermissions(format!("This endpoint requires one of {required_roles:?}"));
                Err(ServerError::from(err).into())
            }
        })
    }
}
