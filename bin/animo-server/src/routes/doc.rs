use utoipa::OpenApi;

use crate::routes::{compat, health, video};

#[derive(OpenApi)]
#[openapi(info(
    title = "animo-server",
    description = "Educational video rendering API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(video::VideoApi::openapi());
    root.merge(compat::CompatApi::openapi());
    root
}
