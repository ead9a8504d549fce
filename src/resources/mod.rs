//! Per-resource wiring: item types, drafts and endpoint sets.

pub mod event;
pub mod order;
pub mod product;
pub mod user;

pub use event::{Event, EventDraft, Events};
pub use order::{Order, OrderDraft, OrderStatus, Orders};
pub use product::{Category, Product, ProductDraft, Products, matches_search};
pub use user::{User, Users};

use crate::resource::ResourceController;

pub type ProductController = ResourceController<Products>;
pub type OrderController = ResourceController<Orders>;
pub type UserController = ResourceController<Users>;
pub type EventController = ResourceController<Events>;
