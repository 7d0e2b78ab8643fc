//! Object storage backends for product media.

mod r2;

pub use r2::{R2Config, R2Storage};
