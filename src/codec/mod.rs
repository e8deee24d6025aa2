//! Content stream decoding: block framing and the LZ block decoder.

pub mod block;
pub mod lz;
