/// Remote service clients
///
/// The image service owns attachment binaries; posts reference them by parent
/// id only, and the HTTP client here is the sole bridge between the two.
pub mod image;

pub use image::{HttpImageClient, ImageClient};
