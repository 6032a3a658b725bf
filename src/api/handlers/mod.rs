use rocket::Route;

pub mod grant;
pub mod images;
pub mod instances;
pub mod upload;

pub fn generate_grant_routes() -> Vec<Route> {
    routes![grant::create_presigned_post]
}

pub fn generate_upload_routes() -> Vec<Route> {
    routes![upload::upload]
}

pub fn generate_inspection_routes() -> Vec<Route> {
    routes![images::get_image, instances::get_instance, instances::list_instances]
}
