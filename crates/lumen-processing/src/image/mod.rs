//! Photo thumbnails.

pub mod scale;
pub mod thumbnail;

pub use scale::scale;
pub use thumbnail::{render_thumbnail, PhotoDerivativeGenerator};
