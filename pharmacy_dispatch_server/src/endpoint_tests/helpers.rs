use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;

use crate::identity::{PHARMACY_ID_HEADER, USER_ID_HEADER};

/// Who the test request claims to be.
#[derive(Debug, Clone, Copy)]
pub enum As {
    Anonymous,
    User(i64),
    Pharmacist(i64, i64),
}

pub fn with_identity(mut req: TestRequest, who: As) -> TestRequest {
    match who {
        As::Anonymous => {},
        As::User(user_id) => {
            req = req.insert_header((USER_ID_HEADER, user_id.to_string()));
        },
        As::Pharmacist(user_id, pharmacy_id) => {
            req = req
                .insert_header((USER_ID_HEADER, user_id.to_string()))
                .insert_header((PHARMACY_ID_HEADER, pharmacy_id.to_string()));
        },
    }
    req
}

/// Sends the request to an app built by `configure` and returns the status and body. Errors raised by middleware are
/// rendered into responses the same way the server would.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    let res = match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = to_bytes(res.into_body()).await.unwrap();
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub async fn get_request<F>(who: As, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(with_identity(TestRequest::get().uri(path), who), configure).await
}

pub async fn post_request<F>(who: As, path: &str, body: serde_json::Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(with_identity(TestRequest::post().uri(path).set_json(body), who), configure).await
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
