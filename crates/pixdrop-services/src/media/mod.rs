mod service;

pub use service::{
    FetchedImage, ImageSummary, MediaService, ProcessRequest, ProcessedImage, UploadRequest,
    UploadedImage,
};
