//! Ecs block storage resources

pub mod resource_ebs_storage_set;

pub use resource_ebs_storage_set::EbsStorageSetResource;
