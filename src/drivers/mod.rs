// Out-of-process collaborators: the image archive (HTTP) and the
// external rescaler (ImageMagick). Everything here blocks the calling
// thread; callers run it on worker threads.

pub mod archive;
pub mod rescale;

pub use archive::{ArchiveClient, DicomTag};
pub use rescale::{ImageMagick, Rescaler};
