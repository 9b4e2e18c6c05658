use utoipa::OpenApi;

use crate::{error, handlers, models, status};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_devices,
        handlers::get_device,
        handlers::update_location,
        handlers::update_description,
        handlers::get_device_status,
        handlers::get_all_device_status,
        handlers::execute_command_get,
        handlers::execute_command_post,
        handlers::execute_command_put,
    ),
    components(
        schemas(
            models::DeviceDescriptor,
            models::DeviceList,
            models::UpdateLocationRequest,
            models::UpdateDescriptionRequest,
            status::DeviceStatusResponse,
            error::ErrorBody,
            error::ErrorDetail,
        )
    ),
    tags(
        (name = "devices", description = "Device configuration and status"),
        (name = "commands", description = "Device command execution")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_route_is_documented() {
        let doc = ApiDoc::openapi();
        let path = doc
            .paths
            .paths
            .get("/api/v1/devices/{device_id}/commands/{command}")
            .unwrap();
        assert!(path.get.is_some());
        assert!(path.post.is_some());
        assert!(path.put.is_some());
    }
}
