/// Post handlers - HTTP endpoints for post operations
use crate::error::{AppError, Result};
use crate::models::Attachment;
use crate::services::PostService;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Post fields submitted on create (as the multipart `body` part) and update
/// (as the JSON body).
#[derive(Debug, Deserialize, Validate)]
pub struct PostPayload {
    #[validate(length(min = 1, message = "text for post is required"))]
    pub text: String,
    #[validate(length(min = 1, message = "author for post is required"))]
    pub author: String,
}

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page_number: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
}

fn default_page_size() -> i64 {
    10
}

impl PageParams {
    fn validated(&self) -> Result<(i64, i64)> {
        if self.page_number < 0 {
            return Err(AppError::Validation(
                "page_number must not be negative".to_string(),
            ));
        }
        if self.size < 1 {
            return Err(AppError::Validation("size must be positive".to_string()));
        }
        Ok((self.page_number, self.size))
    }
}

/// Create a new post with attachment files
/// POST /api/v1/posts (multipart: `body` JSON part + `files` parts)
pub async fn create_post(
    service: web::Data<PostService>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let (body, files) = read_create_form(payload).await?;
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let view = service.create(body.text, body.author, files).await?;

    Ok(HttpResponse::Created().json(view))
}

/// Get a post by ID
/// GET /api/v1/posts/{id}
pub async fn get_post(
    service: web::Data<PostService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let view = service.get_by_id(*id).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Get the paginated feed of all posts
/// GET /api/v1/posts/feed
pub async fn get_feed(
    service: web::Data<PostService>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let (page_number, size) = query.validated()?;
    let page = service.get_feed(page_number, size).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Get the paginated posts of one author
/// GET /api/v1/posts/author/{author}
pub async fn get_by_author(
    service: web::Data<PostService>,
    author: web::Path<String>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let (page_number, size) = query.validated()?;
    let page = service
        .get_by_author(author.into_inner(), page_number, size)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Update a post's text and author
/// PUT /api/v1/posts/{id}
pub async fn update_post(
    service: web::Data<PostService>,
    id: web::Path<Uuid>,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let view = service.update(*id, payload.text, payload.author).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Delete a post
/// DELETE /api/v1/posts/{id}
pub async fn delete_post(
    service: web::Data<PostService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    service.delete(*id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Read the create form: a `body` part holding the post JSON and any number
/// of `files` parts holding attachment binaries.
async fn read_create_form(mut payload: Multipart) -> Result<(PostPayload, Vec<Attachment>)> {
    let mut body: Option<PostPayload> = None;
    let mut files = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::Validation(format!("Multipart error: {}", e)))?;

        let field_name = field.name().to_string();
        match field_name.as_str() {
            "body" => {
                let raw = read_field_bytes(&mut field).await?;
                body = Some(
                    serde_json::from_slice(&raw)
                        .map_err(|e| AppError::Validation(format!("Invalid post body: {}", e)))?,
                );
            }
            "files" => {
                let name = field
                    .content_disposition()
                    .get_filename()
                    .unwrap_or_default()
                    .to_string();
                let data = read_field_bytes(&mut field).await?;
                files.push(Attachment { name, data });
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let body = body.ok_or_else(|| AppError::Validation("missing post body part".to_string()))?;

    Ok((body, files))
}

async fn read_field_bytes(field: &mut actix_multipart::Field) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| AppError::Validation(format!("Field read error: {}", e)))?;
        data.extend_from_slice(&bytes);
    }
    Ok(data)
}
