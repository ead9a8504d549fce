use crate::error::{ConsoleError, ConsoleResult};
use crate::model::lenient_string;
use crate::resource::{Ack, Draft, DraftFields, Editable, Resource, ResourceController};
use crate::transport::{Attachment, Endpoint, RequestBody};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use strum::{EnumIter, EnumString};

/// Order lifecycle status.
///
/// Statuses outside the four known ones decode as `Other` with the raw text,
/// so one unexpected row never fails a whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    #[strum(disabled)]
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value
            .trim()
            .parse()
            .unwrap_or_else(|_| Self::Other(value.trim().to_string()))
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderCustomer {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// The `user` field is either populated or a bare id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Populated(OrderCustomer),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product id, or the populated product document.
    #[serde(default)]
    pub product: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OrderItem {
    pub fn product_id(&self) -> Option<&str> {
        match &self.product {
            Value::String(id) => Some(id),
            Value::Object(map) => map.get("_id").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pin_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone_no: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user: Option<CustomerRef>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub items_price: f64,
    #[serde(default)]
    pub tax_price: f64,
    #[serde(default)]
    pub shipping_price: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub total_price: f64,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub shipping_info: Option<ShippingInfo>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Display name of the customer; orders without a populated user are guests.
    pub fn customer_name(&self) -> &str {
        match &self.user {
            Some(CustomerRef::Populated(customer)) if !customer.name.is_empty() => {
                &customer.name
            }
            _ => "Guest",
        }
    }

    pub fn item_count(&self) -> usize {
        self.order_items.len()
    }
}

/// Edit form of an order: only the status can change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDraft {
    pub status: Option<OrderStatus>,
}

impl OrderDraft {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
        }
    }
}

impl DraftFields for OrderDraft {
    fn validate(&self) -> ConsoleResult<()> {
        match &self.status {
            Some(status) if status.is_known() => Ok(()),
            Some(status) => Err(ConsoleError::validation(format!(
                "Unknown order status `{status}`"
            ))),
            None => Err(ConsoleError::validation("Please select an order status")),
        }
    }

    fn encode(&self, _attachments: &[Attachment]) -> ConsoleResult<RequestBody> {
        let status = self.status.clone().map(String::from).unwrap_or_default();
        Ok(RequestBody::Json(json!({ "orderStatus": status })))
    }
}

pub struct Orders;

impl Resource for Orders {
    type Item = Order;
    type Draft = OrderDraft;

    const NAME: &'static str = "orders";
    const LABEL: &'static str = "Order";
    const COLLECTION_KEY: &'static str = "orders";
    const ITEM_KEY: &'static str = "order";

    fn id_of(item: &Order) -> &str {
        &item.id
    }

    fn list_endpoint() -> Endpoint {
        Endpoint::post("/admin/orders")
    }

    fn get_endpoint(id: &str) -> Option<Endpoint> {
        Some(Endpoint::post(format!("/admin/get/order/{id}")))
    }

    fn delete_endpoint(id: &str) -> Option<Endpoint> {
        Some(Endpoint::delete(format!("/admin/order/{id}")))
    }
}

impl Editable for Orders {
    fn update_endpoint(id: &str) -> Endpoint {
        Endpoint::post(format!("/admin/update/order/{id}"))
    }

    fn hydrate(item: &Order) -> OrderDraft {
        OrderDraft::new(item.order_status.clone())
    }
}

impl ResourceController<Orders> {
    pub async fn set_status(&self, id: &str, status: OrderStatus) -> ConsoleResult<Ack<Order>> {
        self.update(id, &Draft::update(id, OrderDraft::new(status)))
            .await
    }
}
