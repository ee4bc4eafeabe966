use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_array, json_string, RpcParams};
use super::error::{ApiError, Result};

pub const INSTANCE_GONE: &[&str] = &["InvalidDBInstanceId.NotFound", "InvalidDBInstance.NotFound"];

pub struct GdbApi<'a> {
    client: &'a Client,
}

impl<'a> GdbApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    async fn call(&self, action: &str, params: RpcParams) -> Result<Value> {
        self.client.rpc(Product::Gdb, action, params).await
    }

    /// Returns the new DBInstanceId
    pub async fn create_db_instance(&self, params: RpcParams) -> Result<String> {
        let body = self.call("CreateDBInstance", params).await?;
        json_string(&body, "DBInstanceId").ok_or_else(|| {
            ApiError::Parse("CreateDBInstance response has no DBInstanceId".to_string())
        })
    }

    /// `Items.DBInstance[0]`, `None` when the instance does not exist
    pub async fn describe_db_instance(&self, id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new().add("DBInstanceId", id);
        match self.call("DescribeDBInstanceAttribute", params).await {
            Ok(body) => Ok(json_array(&body, "Items.DBInstance").first().cloned()),
            Err(e) if e.is_expected(INSTANCE_GONE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `Items.DbInstanceIpArray[]`
    pub async fn describe_access_white_list(&self, id: &str) -> Result<Vec<Value>> {
        let params = RpcParams::new().add("DBInstanceId", id);
        let body = self.call("DescribeDBInstanceAccessWhiteList", params).await?;
        Ok(json_array(&body, "Items.DbInstanceIpArray").to_vec())
    }

    /// `mode` is `Cover` to create or replace a group, `Delete` to remove it
    pub async fn modify_access_white_list(
        &self,
        id: &str,
        group_name: &str,
        security_ips: &str,
        mode: &str,
    ) -> Result<()> {
        let params = RpcParams::new()
            .add("DBInstanceId", id)
            .add("DBInstanceIPArrayName", group_name)
            .add("SecurityIps", security_ips)
            .add("ModifyMode", mode);
        self.call("ModifyDBInstanceAccessWhiteList", params)
            .await
            .map(|_| ())
    }

    pub async fn modify_description(&self, id: &str, description: &str) -> Result<()> {
        let params = RpcParams::new()
            .add("DBInstanceId", id)
            .add("DBInstanceDescription", description);
        self.call("ModifyDBInstanceDescription", params)
            .await
            .map(|_| ())
    }

    pub async fn modify_spec(&self, params: RpcParams) -> Result<()> {
        self.call("ModifyDBInstanceSpec", params).await.map(|_| ())
    }

    pub async fn delete_db_instance(&self, id: &str) -> Result<()> {
        self.call(
            "DeleteDBInstance",
            RpcParams::new().add("DBInstanceId", id),
        )
        .await
        .map(|_| ())
    }
}
