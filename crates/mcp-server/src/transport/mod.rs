pub mod stdio;

pub use stdio::{decode_frame, stdio, Frame, FrameReader, FrameWriter};
