mod format;
mod interface;
mod negotiate;
#[cfg(test)]
mod tests;

pub use format::{FrameEncoding, NegotiatedFormat, PreviewFormat};
pub use interface::{CameraFactory, CameraResource};
pub use negotiate::configure_preview;
