//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the database through the engine API, so
//! nothing blocks.
//!
//! Handlers are generic over the backend, so that the endpoint tests can run them against mocks. Use the `route!`
//! macro to declare the service type for a handler:
//!
//! ```nocompile
//!     route!(my_handler => Get "/path/{id}" impl DispatchBackend);
//!     route!(my_handler => Post "/path" impl DispatchBackend where requires [Role::Pharmacist]);
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use pharmacy_dispatch_engine::{
    order_objects::{NewEmergencyOrderRequest, PharmacyResponseRequest, Role},
    DispatchBackend,
    EmergencyOrderApi,
};

use crate::{errors::ServerError, identity::CallerClaims};

macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:path),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Emergency orders  ----------------------------------------------------
route!(create_emergency_order => Post "/emergency-orders" impl DispatchBackend);
/// Route handler for creating an emergency order.
///
/// The caller becomes the requester. The order is broadcast to the best nearby pharmacies that have the product in
/// stock, and is returned with a `201 Created`.
pub async fn create_emergency_order<B: DispatchBackend>(
    claims: CallerClaims,
    api: web::Data<EmergencyOrderApi<B>>,
    body: web::Json<NewEmergencyOrderRequest>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST emergency order for '{}' from {}", body.requested_medicine_name, *claims);
    let order = api.create_smart_emergency_order(claims.user_id(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(emergency_order_by_id => Get "/emergency-orders/{id}" impl DispatchBackend);
/// Fetches a single emergency order. Visible to the requester and to every pharmacy it was broadcast to.
pub async fn emergency_order_by_id<B: DispatchBackend>(
    claims: CallerClaims,
    path: web::Path<i64>,
    api: web::Data<EmergencyOrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET emergency order #{order_id} for {}", *claims);
    let order = api.fetch_order(order_id, &claims).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(respond_to_emergency_order => Post "/emergency-orders/{id}/respond" impl DispatchBackend where requires [Role::Pharmacist]);
/// A pharmacist accepts or rejects an emergency order on behalf of their pharmacy.
///
/// The first acceptance wins. Anything else that stops the response from being recorded (the order is no longer
/// pending, the pharmacy wasn't targeted, or has already responded) results in a `409 Conflict`.
pub async fn respond_to_emergency_order<B: DispatchBackend>(
    claims: CallerClaims,
    path: web::Path<i64>,
    api: web::Data<EmergencyOrderApi<B>>,
    body: web::Json<PharmacyResponseRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST {} response to emergency order #{order_id} from {}", body.decision, *claims);
    let order = api.respond_to_order(order_id, &claims, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_emergency_order => Post "/emergency-orders/{id}/cancel" impl DispatchBackend);
pub async fn cancel_emergency_order<B: DispatchBackend>(
    claims: CallerClaims,
    path: web::Path<i64>,
    api: web::Data<EmergencyOrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST cancel emergency order #{order_id} from {}", *claims);
    let order = api.cancel_order(order_id, claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(fulfill_emergency_order => Post "/emergency-orders/{id}/fulfill" impl DispatchBackend);
/// Closes an accepted order. Either the requester or a pharmacist of the accepted pharmacy may do this.
pub async fn fulfill_emergency_order<B: DispatchBackend>(
    claims: CallerClaims,
    path: web::Path<i64>,
    api: web::Data<EmergencyOrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST fulfill emergency order #{order_id} from {}", *claims);
    let order = api.fulfill_order(order_id, &claims).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(my_emergency_orders => Get "/my/emergency-orders" impl DispatchBackend);
/// All of the caller's own emergency orders, newest first.
pub async fn my_emergency_orders<B: DispatchBackend>(
    claims: CallerClaims,
    api: web::Data<EmergencyOrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET my emergency orders for {}", *claims);
    let orders = api.orders_for_user(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(pharmacy_emergency_orders => Get "/pharmacy/emergency-orders" impl DispatchBackend where requires [Role::Pharmacist]);
/// The pending orders that were broadcast to the caller's pharmacy. High priority orders come first, then the oldest.
pub async fn pharmacy_emergency_orders<B: DispatchBackend>(
    claims: CallerClaims,
    api: web::Data<EmergencyOrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let pharmacy_id = claims
        .pharmacy_id()
        .ok_or_else(|| ServerError::InsufficientPermissions("Only pharmacists have a pharmacy order queue".into()))?;
    trace!("💻️ GET pending emergency orders for pharmacy #{pharmacy_id}");
    let orders = api.pending_orders_for_pharmacy(pharmacy_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}
