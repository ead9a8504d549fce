use crate::model::ImageRef;
use crate::resource::{ReadOnly, Resource};
use crate::transport::Endpoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storefront customer account. The console can only list and delete these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<ImageRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

pub struct Users;

impl Resource for Users {
    type Item = User;
    type Draft = ReadOnly;

    const NAME: &'static str = "users";
    const LABEL: &'static str = "User";
    const COLLECTION_KEY: &'static str = "users";
    const ITEM_KEY: &'static str = "user";

    fn id_of(item: &User) -> &str {
        &item.id
    }

    fn list_endpoint() -> Endpoint {
        Endpoint::post("/admin/users")
    }

    fn delete_endpoint(id: &str) -> Option<Endpoint> {
        Some(Endpoint::post(format!("/admin/user/{id}")))
    }
}
