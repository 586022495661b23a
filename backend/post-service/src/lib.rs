//! Post Service
//!
//! Microservice for social-media posts: CRUD operations, a paginated feed and
//! per-author listings, post views enriched with attachments fetched from the
//! image service, and asynchronous like/comment count updates consumed from
//! Kafka.
//!
//! # Modules
//!
//! - `handlers`: Post-related HTTP request handlers
//! - `models`: Data structures for posts, pages, attachments, activity events
//! - `services`: The post aggregation workflow
//! - `db`: Post store contract and PostgreSQL repository
//! - `clients`: Image service HTTP client
//! - `consumers`: Kafka activity consumer
//! - `error`: Error types and handling
//! - `config`: Configuration management

pub mod clients;
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
