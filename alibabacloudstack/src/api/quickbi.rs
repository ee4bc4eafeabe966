use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_path, json_string, RpcParams};
use super::error::{ApiError, Result};

pub const USER_GONE: &[&str] = &["User.Not.In.Organization"];

pub struct QuickBiApi<'a> {
    client: &'a Client,
}

impl<'a> QuickBiApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Returns `Result.UserId`
    pub async fn add_user(&self, params: RpcParams) -> Result<String> {
        let body = self
            .client
            .rpc(Product::QuickBi, "AddUser", params)
            .await?;
        json_string(&body, "Result.UserId")
            .ok_or_else(|| ApiError::Parse("AddUser response has no Result.UserId".to_string()))
    }

    pub async fn query_user(&self, user_id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new().add("UserId", user_id);
        match self
            .client
            .rpc(Product::QuickBi, "QueryUserInfoByUserId", params)
            .await
        {
            Ok(body) => Ok(json_path(&body, "Result")
                .filter(|result| result.is_object())
                .cloned()),
            Err(e) if e.is_expected(USER_GONE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update_user(&self, params: RpcParams) -> Result<()> {
        self.client
            .rpc(Product::QuickBi, "UpdateUser", params)
            .await
            .map(|_| ())
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.client
            .rpc(
                Product::QuickBi,
                "DeleteUser",
                RpcParams::new().add("UserId", user_id),
            )
            .await
            .map(|_| ())
    }
}
