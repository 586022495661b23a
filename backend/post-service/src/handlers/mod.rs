/// HTTP handlers for post endpoints
///
/// This module contains handlers for creating, reading, updating and deleting
/// posts, plus the paginated feed and per-author listings.
pub mod posts;

use actix_web::web;

// Re-export handler functions at module level
pub use posts::{create_post, delete_post, get_by_author, get_feed, get_post, update_post};

/// Register the post routes under /api/v1/posts.
///
/// The literal segments (feed, author) are registered before the {id}
/// resource so they are not swallowed by the id match.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/posts")
            .service(web::resource("").route(web::post().to(posts::create_post)))
            .service(web::resource("/feed").route(web::get().to(posts::get_feed)))
            .service(
                web::resource("/author/{author}").route(web::get().to(posts::get_by_author)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(posts::get_post))
                    .route(web::put().to(posts::update_post))
                    .route(web::delete().to(posts::delete_post)),
            ),
    );
}
