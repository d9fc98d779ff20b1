use std::io::Write;
use std::path::PathBuf;

use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::db::dynamodb_repository::{RepositoryError, SwapRepository};
use crate::db::models::SwapRecord;
use crate::faceswap::acquire::ImageSource;
use crate::faceswap::client::FaceSwapClient;
use crate::faceswap::error::SwapError;
use crate::storage::media_service::MediaService;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/swaps")
            .route(web::post().to(create_swap))
            .route(web::get().to(list_swaps)),
    )
    .service(
        web::resource("/api/swaps/{id}")
            .route(web::get().to(get_swap))
            .route(web::delete().to(delete_swap)),
    )
    .service(web::resource("/api/swaps/{id}/download").route(web::get().to(download_swap)))
    .service(web::resource("/api/stats").route(web::get().to(get_stats)))
    .service(web::resource("/api/stats/reset").route(web::post().to(reset_stats)))
    .service(web::resource("/api/health").route(web::get().to(health)));
}

/// Inputs parsed out of the multipart form. File fields become temp
/// files that must be cleaned up once the job is done.
#[derive(Default)]
struct SwapForm {
    source: Option<ImageSource>,
    target: Option<ImageSource>,
    temp_files: Vec<PathBuf>,
}

fn spool_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| name.rsplit('.').next())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "jpg".to_string())
}

async fn parse_swap_form(mut payload: Multipart) -> Result<SwapForm, Error> {
    let mut form = SwapForm::default();

    while let Ok(Some(mut field)) = payload.try_next().await {
        let (name, filename) = {
            let disposition = field.content_disposition();
            (
                disposition
                    .and_then(|cd| cd.get_name())
                    .unwrap_or_default()
                    .to_string(),
                disposition
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string),
            )
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            data.write_all(&chunk)?;
        }

        match name.as_str() {
            "source_image" | "target_image" => {
                if data.is_empty() {
                    continue;
                }
                let extension = spool_extension(filename.as_deref());
                let path = std::env::temp_dir()
                    .join(format!("faceswap-{}.{}", Uuid::new_v4(), extension));
                tokio::fs::write(&path, &data).await?;
                form.temp_files.push(path.clone());

                let source = ImageSource::LocalPath(path);
                if name == "source_image" {
                    form.source = Some(source);
                } else {
                    form.target = Some(source);
                }
            }
            "source_url" | "target_url" => {
                let url = String::from_utf8_lossy(&data).trim().to_string();
                if url.is_empty() || Url::parse(&url).is_err() {
                    continue;
                }
                let source = ImageSource::RemoteUrl(url);
                if name == "source_url" {
                    form.source = Some(source);
                } else {
                    form.target = Some(source);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn cleanup_temp_files(paths: &[PathBuf]) {
    for path in paths {
        tokio::fs::remove_file(path).await.ok();
    }
}

/// Validation, configuration and account errors surface their text to
/// the submitter; everything else maps to a generic failure with the
/// detail logged.
fn swap_error_response(err: &SwapError) -> HttpResponse {
    if err.is_client_fault() {
        HttpResponse::BadRequest().json(ErrorResponse {
            error: err.to_string(),
        })
    } else {
        error!("face swap job failed: {}", err);
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Face swap failed, please try again later".to_string(),
        })
    }
}

async fn create_swap(
    payload: Multipart,
    client: web::Data<FaceSwapClient>,
    media: web::Data<MediaService>,
    repo: web::Data<SwapRepository>,
) -> Result<HttpResponse, Error> {
    if !client.is_configured() {
        return Ok(HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: "Face swap service is not configured".to_string(),
        }));
    }

    let form = parse_swap_form(payload).await?;
    let (source, target) = match (&form.source, &form.target) {
        (Some(source), Some(target)) => (source, target),
        _ => {
            cleanup_temp_files(&form.temp_files).await;
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: "Both a source and a target image are required".to_string(),
            }));
        }
    };

    let swap_result = client.perform_face_swap(source, target).await;
    cleanup_temp_files(&form.temp_files).await;

    let result_url = match swap_result {
        Ok(url) => url,
        Err(e) => return Ok(swap_error_response(&e)),
    };

    let asset = match media.store_from_url(&result_url).await {
        Ok(asset) => asset,
        Err(e) => {
            error!("failed to mirror swap result {}: {}", result_url, e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Face swap completed but the result could not be stored".to_string(),
            }));
        }
    };

    let record = SwapRecord::new(result_url, &asset);
    if let Err(e) = repo.create_record(&record).await {
        error!("failed to persist swap record {}: {}", record.id, e);
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Face swap completed but the record could not be saved".to_string(),
        }));
    }

    info!("face swap request {} completed", record.id);
    Ok(HttpResponse::Created().json(record))
}

async fn list_swaps(repo: web::Data<SwapRepository>) -> HttpResponse {
    match repo.list_records().await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => {
            error!("failed to list swap records: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to list swap records".to_string(),
            })
        }
    }
}

fn parse_record_id(raw: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid record id".to_string(),
        })
    })
}

async fn get_swap(repo: web::Data<SwapRepository>, path: web::Path<String>) -> HttpResponse {
    let id = match parse_record_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match repo.get_record(id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Swap record not found".to_string(),
        }),
        Err(e) => {
            error!("failed to fetch swap record {}: {}", id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch swap record".to_string(),
            })
        }
    }
}

async fn delete_swap(
    repo: web::Data<SwapRepository>,
    media: web::Data<MediaService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = match parse_record_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let record = match repo.get_existing_record(id).await {
        Ok(record) => record,
        Err(RepositoryError::NotFound) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Swap record not found".to_string(),
            });
        }
        Err(e) => {
            error!("failed to fetch swap record {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to delete swap record".to_string(),
            });
        }
    };

    if let Err(e) = media.delete_media(&record.media_public_id).await {
        // The stored copy is best-effort; the record itself still goes.
        error!("failed to delete media {}: {}", record.media_public_id, e);
    }

    match repo.delete_record(id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => {
            error!("failed to delete swap record {}: {}", id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to delete swap record".to_string(),
            })
        }
    }
}

async fn download_swap(
    repo: web::Data<SwapRepository>,
    media: web::Data<MediaService>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = match parse_record_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let record = match repo.get_existing_record(id).await {
        Ok(record) => record,
        Err(RepositoryError::NotFound) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Swap record not found".to_string(),
            });
        }
        Err(e) => {
            error!("failed to fetch swap record {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch swap record".to_string(),
            });
        }
    };

    match media.get_media(&record.media_public_id).await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type(format!("image/{}", record.format))
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"swap-{}.{}\"", record.id, record.format),
            ))
            .body(bytes),
        Err(e) => {
            error!("failed to read media {}: {}", record.media_public_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to download swap result".to_string(),
            })
        }
    }
}

async fn get_stats(
    client: web::Data<FaceSwapClient>,
    repo: web::Data<SwapRepository>,
) -> HttpResponse {
    let snapshot = client.stats();
    let stored_records = match repo.count_records().await {
        Ok(count) => count,
        Err(e) => {
            error!("failed to count swap records: {}", e);
            -1
        }
    };

    HttpResponse::Ok().json(json!({
        "client": snapshot,
        "stored_records": stored_records,
    }))
}

async fn reset_stats(client: web::Data<FaceSwapClient>) -> HttpResponse {
    client.reset_stats();
    info!("face swap statistics reset");
    HttpResponse::Ok().json(json!({ "reset": true }))
}

async fn health(client: web::Data<FaceSwapClient>) -> HttpResponse {
    let configured = client.is_configured();
    let connected = if configured {
        client.test_connection().await
    } else {
        false
    };

    HttpResponse::Ok().json(json!({
        "configured": configured,
        "connected": connected,
    }))
}
