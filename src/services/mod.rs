pub mod local_store;
pub mod media_probe;
pub mod object_key;
pub mod object_store;
pub mod presign;
pub mod remux;
pub mod s3_store;
pub mod staging;
pub mod tool;
pub mod upload_pipeline;
pub mod video_repository;
