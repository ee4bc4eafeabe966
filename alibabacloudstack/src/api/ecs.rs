use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_array, json_string, RpcParams};
use super::error::{ApiError, Result};

/// Codes DeleteStorageSet returns once the storage set is already gone
pub const STORAGE_SET_GONE: &[&str] = &[
    "InvalidCmdId.NotFound",
    "InvalidRegionId.NotFound",
    "Operation.Forbidden",
];

pub struct EcsApi<'a> {
    client: &'a Client,
}

impl<'a> EcsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_storage_set(
        &self,
        name: &str,
        max_partition_number: Option<&str>,
        zone_id: Option<&str>,
    ) -> Result<String> {
        let params = RpcParams::new()
            .add("StorageSetName", name)
            .add_optional("MaxPartitionNumber", max_partition_number)
            .add_optional("ZoneId", zone_id);
        let body = self
            .client
            .rpc(Product::Ecs, "CreateStorageSet", params)
            .await?;
        json_string(&body, "StorageSetId").ok_or_else(|| {
            ApiError::Parse("CreateStorageSet response has no StorageSetId".to_string())
        })
    }

    pub async fn describe_storage_set(&self, id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new().add_json_list("StorageSetIds", &[id.to_string()]);
        match self
            .client
            .rpc(Product::Ecs, "DescribeStorageSets", params)
            .await
        {
            Ok(body) => Ok(json_array(&body, "StorageSets.StorageSet").first().cloned()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_storage_set(&self, id: &str) -> Result<()> {
        self.client
            .rpc(
                Product::Ecs,
                "DeleteStorageSet",
                RpcParams::new().add("StorageSetId", id),
            )
            .await
            .map(|_| ())
    }
}
