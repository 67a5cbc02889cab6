//! Transfer module
//!
//! Upload and download pipelines plus the byte metering and speed sampling
//! they share.

pub mod download;
pub mod meter;
pub mod results;
pub mod sampler;
pub mod upload;

pub use download::{PreparedDownload, prepare_download};
pub use meter::{TransferMeter, TransferStats};
pub use results::{SpeedInfo, UploadMode, UploadResult};
pub use sampler::SpeedSampler;
pub use upload::{UploadSettings, receive_upload};
