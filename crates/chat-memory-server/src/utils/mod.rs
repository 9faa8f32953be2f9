pub mod error;
pub mod html;
pub mod limiters;

pub use html::escape_html;
