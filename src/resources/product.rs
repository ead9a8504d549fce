use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{ImageRef, flag_from_wire, flag_to_wire};
use crate::resource::{DraftFields, Editable, Resource, ResourceController};
use crate::transport::{Attachment, Endpoint, IMAGES_FIELD, MultipartPayload, RequestBody};
use serde::{Deserialize, Serialize};
use std::fmt;

use strum::{EnumIter, EnumString};

/// Product category. Unrecognised names decode as `Other` with the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum Category {
    Rings,
    Necklaces,
    Earrings,
    Bracelets,
    #[strum(disabled)]
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rings => "Rings",
            Self::Necklaces => "Necklaces",
            Self::Earrings => "Earrings",
            Self::Bracelets => "Bracelets",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        value
            .trim()
            .parse()
            .unwrap_or_else(|_| Self::Other(value.trim().to_string()))
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default, deserialize_with = "flag_from_wire")]
    pub trending: bool,
}

impl Product {
    pub fn is_out_of_stock(&self) -> bool {
        self.stock == 0
    }
}

/// Case-insensitive substring match over name and category.
///
/// An empty term matches everything.
pub fn matches_search(product: &Product, term: &str) -> bool {
    let needle = term.to_lowercase();
    product.name.to_lowercase().contains(&needle)
        || product.category.as_str().to_lowercase().contains(&needle)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub price: Option<f64>,
    pub stock: Option<u32>,
    pub category: Option<Category>,
    pub description: String,
    pub trending: bool,
}

impl DraftFields for ProductDraft {
    fn validate(&self) -> ConsoleResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConsoleError::validation("Product name is required"));
        }
        match self.price {
            Some(price) if price.is_finite() && price >= 0.0 => {}
            Some(_) => return Err(ConsoleError::validation("Price must be zero or more")),
            None => return Err(ConsoleError::validation("Price is required")),
        }
        if self.stock.is_none() {
            return Err(ConsoleError::validation("Stock is required"));
        }
        match &self.category {
            Some(category) if !category.as_str().is_empty() => {}
            _ => return Err(ConsoleError::validation("Please select a category")),
        }
        Ok(())
    }

    fn encode(&self, attachments: &[Attachment]) -> ConsoleResult<RequestBody> {
        let mut payload = MultipartPayload::new()
            .text("name", self.name.trim())
            .text("price", self.price.unwrap_or_default().to_string())
            .text("stock", self.stock.unwrap_or_default().to_string())
            .text(
                "category",
                self.category.clone().map(String::from).unwrap_or_default(),
            )
            .text("description", self.description.clone())
            .text("trending", flag_to_wire(self.trending));
        for attachment in attachments {
            payload = payload.file(IMAGES_FIELD, attachment.clone());
        }
        Ok(RequestBody::Multipart(payload))
    }
}

pub struct Products;

impl Resource for Products {
    type Item = Product;
    type Draft = ProductDraft;

    const NAME: &'static str = "products";
    const LABEL: &'static str = "Product";
    const COLLECTION_KEY: &'static str = "products";
    const ITEM_KEY: &'static str = "product";

    fn id_of(item: &Product) -> &str {
        &item.id
    }

    fn list_endpoint() -> Endpoint {
        Endpoint::post("/admin/products")
    }

    fn delete_endpoint(id: &str) -> Option<Endpoint> {
        Some(Endpoint::post(format!("/admin/product/delete/{id}")))
    }
}

impl Editable for Products {
    fn create_endpoint() -> Option<Endpoint> {
        Some(Endpoint::post("/admin/product/new"))
    }

    fn update_endpoint(id: &str) -> Endpoint {
        Endpoint::post(format!("/admin/product/{id}"))
    }

    fn hydrate(item: &Product) -> ProductDraft {
        ProductDraft {
            name: item.name.clone(),
            price: Some(item.price),
            stock: Some(item.stock),
            category: Some(item.category.clone()),
            description: item.description.clone(),
            trending: item.trending,
        }
    }
}

impl ResourceController<Products> {
    /// Cached products matching `term`. Never touches the network.
    pub fn filtered(&self, term: &str) -> Vec<Product> {
        self.items()
            .into_iter()
            .filter(|product| matches_search(product, term))
            .collect()
    }
}
