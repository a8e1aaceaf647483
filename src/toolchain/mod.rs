//! WASI toolchain plumbing: flag presets and SDK archive fetching.

pub mod archive;
pub mod fetch;
pub mod flags;

pub use archive::{detect_format, ArchiveExtractor, Extractor};
pub use fetch::{fetch_and_extract, Fetcher, HttpTransport, Transport};
pub use flags::{compose, strip_link_invalid};
