mod db;
mod faceswap;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use std::env;

use db::dynamodb_repository::SwapRepository;
use faceswap::client::FaceSwapClient;
use routes::configure_routes;
use storage::media_service::MediaService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    // Initialize AWS configuration
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let dynamodb_client = DynamoDbClient::new(&aws_config);
    let s3_client = S3Client::new(&aws_config);

    let swaps_table = env::var("DYNAMODB_SWAPS_TABLE").unwrap().to_string();
    let media_bucket = env::var("S3_MEDIA_BUCKET").unwrap().to_string();
    let media_base_url = env::var("MEDIA_BASE_URL").unwrap().to_string();

    let swap_repo = SwapRepository::new(dynamodb_client, swaps_table);
    let media_service = MediaService::new(s3_client, media_bucket, media_base_url);

    let swap_client = FaceSwapClient::from_env();
    if swap_client.is_configured() {
        log::info!("Face swap client is configured");
    } else {
        log::warn!(
            "FACESWAP_API_KEY / FACESWAP_API_BASE are missing or incomplete; swap requests will be rejected until they are set."
        );
    }

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(swap_client.clone()))
            .app_data(web::Data::new(media_service.clone()))
            .app_data(web::Data::new(swap_repo.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
