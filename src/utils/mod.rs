pub mod image_ops;

// Re-export commonly used items
pub use image_ops::{encode_jpeg_async, load_image_from_memory_async};
