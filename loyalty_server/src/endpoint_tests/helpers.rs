use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;

pub async fn get_request(path: &str, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let req = TestRequest::get().uri(path).to_request();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request to {path}");
    let (_, res) = test::call_service(&service, req).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
