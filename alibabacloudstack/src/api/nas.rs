//! Nas (2017-06-26): file systems, mount targets and zones

use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_array, json_string, RpcParams};
use super::error::{ApiError, Result};

/// Codes Nas returns when a file system no longer exists
pub const FILE_SYSTEM_GONE: &[&str] = &["InvalidFileSystem.NotFound", "Forbidden.NasNotFound"];

/// Codes Nas returns when a mount target (or its file system) no longer exists
pub const MOUNT_TARGET_GONE: &[&str] = &[
    "Forbidden.NasNotFound",
    "InvalidFileSystem.NotFound",
    "InvalidMountTarget.NotFound",
];

pub struct NasApi<'a> {
    client: &'a Client,
}

impl<'a> NasApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    async fn call(&self, action: &str, params: RpcParams) -> Result<Value> {
        self.client.rpc(Product::Nas, action, params).await
    }

    /// Returns the new FileSystemId
    pub async fn create_file_system(&self, params: RpcParams) -> Result<String> {
        let body = self.call("CreateFileSystem", params).await?;
        json_string(&body, "FileSystemId").ok_or_else(|| {
            ApiError::Parse("CreateFileSystem response has no FileSystemId".to_string())
        })
    }

    /// `FileSystems.FileSystem[0]`, or `None` when the file system is gone
    pub async fn describe_file_system(&self, id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new().add("FileSystemId", id);
        match self.call("DescribeFileSystems", params).await {
            Ok(body) => Ok(json_array(&body, "FileSystems.FileSystem")
                .iter()
                .find(|fs| json_string(fs, "FileSystemId").as_deref() == Some(id))
                .or_else(|| json_array(&body, "FileSystems.FileSystem").first())
                .cloned()),
            Err(e) if e.is_expected(FILE_SYSTEM_GONE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_file_system(&self, params: RpcParams) -> Result<()> {
        self.call("ModifyFileSystem", params).await.map(|_| ())
    }

    pub async fn delete_file_system(&self, id: &str) -> Result<()> {
        self.call("DeleteFileSystem", RpcParams::new().add("FileSystemId", id))
            .await
            .map(|_| ())
    }

    /// Returns the MountTargetDomain of the new mount target
    pub async fn create_mount_target(&self, params: RpcParams) -> Result<String> {
        let body = self.call("CreateMountTarget", params).await?;
        json_string(&body, "MountTargetDomain").ok_or_else(|| {
            ApiError::Parse("CreateMountTarget response has no MountTargetDomain".to_string())
        })
    }

    /// `MountTargets.MountTarget[0]`, or `None` when it is gone
    pub async fn describe_mount_target(
        &self,
        file_system_id: &str,
        mount_target_domain: &str,
    ) -> Result<Option<Value>> {
        let params = RpcParams::new()
            .add("FileSystemId", file_system_id)
            .add("MountTargetDomain", mount_target_domain);
        match self.call("DescribeMountTargets", params).await {
            Ok(body) => Ok(json_array(&body, "MountTargets.MountTarget")
                .first()
                .cloned()),
            Err(e) if e.is_expected(MOUNT_TARGET_GONE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_mount_target(&self, params: RpcParams) -> Result<()> {
        self.call("ModifyMountTarget", params).await.map(|_| ())
    }

    pub async fn delete_mount_target(
        &self,
        file_system_id: &str,
        mount_target_domain: &str,
    ) -> Result<()> {
        let params = RpcParams::new()
            .add("FileSystemId", file_system_id)
            .add("MountTargetDomain", mount_target_domain);
        self.call("DeleteMountTarget", params).await.map(|_| ())
    }

    /// Raw `DescribeZones` response
    pub async fn describe_zones(&self) -> Result<Value> {
        self.call("DescribeZones", RpcParams::new()).await
    }
}
