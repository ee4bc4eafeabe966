//! Nas file systems and mount targets

pub mod resource_file_system;
pub mod resource_mount_target;

pub use resource_file_system::FileSystemResource;
pub use resource_mount_target::MountTargetResource;
