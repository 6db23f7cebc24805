// Slice data formats around the decoder
//
// series     serde model of the archive's series listing
// downscale  size check + staged external rescale before decoding
// slice      fetch -> fit -> decode pipeline shared by workers and viewer
// transport  binary and legacy text encodings of a decoded slice

pub mod downscale;
pub mod series;
pub mod slice;
pub mod transport;
