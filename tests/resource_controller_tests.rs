mod support;

use std::cell::RefCell;
use std::sync::Arc;

use admin_console::error::ConsoleError;
use admin_console::notify::NoticeLevel;
use admin_console::resource::{ControllerState, Draft, DraftMode, Editable, Preset, Resource};
use admin_console::resources::{
    Category, EventDraft, Events, OrderDraft, OrderStatus, Orders, ProductDraft, Products, Users,
};
use admin_console::transport::{Attachment, Endpoint, IMAGES_FIELD};
use assert_matches::assert_matches;
use serde_json::json;
use support::fixtures::{event, order, product, user};
use support::{
    MockTransport, TEST_TOKEN, controller, network_down, ok_message, ok_with, rejected,
};
use tokio::sync::oneshot;

fn products_list() -> Endpoint {
    Products::list_endpoint()
}

fn gold_band_draft() -> ProductDraft {
    ProductDraft {
        name: "Gold Band".into(),
        price: Some(120.0),
        stock: Some(5),
        category: Some(Category::Rings),
        description: "18k".into(),
        trending: true,
    }
}

#[tokio::test]
async fn list_replaces_cache_and_sends_token() {
    let transport = MockTransport::new();
    transport.respond(
        products_list(),
        ok_with("products", json!([product("p1", "Gold Band", "Rings")])),
    );
    let (products, notices) = controller::<Products>(&transport);
    assert_eq!(products.state(), ControllerState::Idle);

    let items = products.list().await.expect("list");

    assert_eq!(items.len(), 1);
    assert_eq!(products.items(), items);
    assert_eq!(products.state(), ControllerState::Ready);
    assert!(!products.collection().is_loading);
    assert_eq!(transport.calls()[0].auth_token.as_deref(), Some(TEST_TOKEN));
    assert!(notices.is_empty());
}

#[tokio::test]
async fn missing_collection_key_is_an_empty_list() {
    let transport = MockTransport::new();
    transport.respond(products_list(), ok_with("products", json!(null)));
    let (products, _) = controller::<Products>(&transport);

    assert!(products.list().await.unwrap().is_empty());
    assert!(products.is_empty());
}

#[tokio::test]
async fn failed_list_keeps_previous_cache() {
    let transport = MockTransport::new();
    transport.respond(
        products_list(),
        ok_with("products", json!([product("p1", "Gold Band", "Rings")])),
    );
    transport.respond(products_list(), network_down());
    let (products, notices) = controller::<Products>(&transport);

    products.list().await.unwrap();
    let err = products.list().await.unwrap_err();

    assert_matches!(err, ConsoleError::Transport(_));
    assert_eq!(products.len(), 1);
    assert_eq!(products.state(), ControllerState::Ready);
    let notice = notices.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.starts_with("Failed to fetch products"));
}

#[tokio::test]
async fn stale_list_response_is_discarded() {
    let transport = MockTransport::new();
    let (release, gate) = oneshot::channel();
    transport.respond_when(
        products_list(),
        ok_with("products", json!([product("old", "Old Ring", "Rings")])),
        gate,
    );
    transport.respond(
        products_list(),
        ok_with("products", json!([product("new", "New Ring", "Rings")])),
    );
    let (products, notices) = controller::<Products>(&transport);
    let products = Arc::new(products);

    let slow = {
        let products = products.clone();
        tokio::spawn(async move { products.list().await })
    };
    while transport.call_count() < 1 {
        tokio::task::yield_now().await;
    }

    let fresh = products.list().await.expect("second fetch");
    release.send(()).expect("slow fetch still waiting");
    let stale = slow.await.expect("join");

    assert_eq!(fresh[0].id, "new");
    assert_matches!(stale, Err(ConsoleError::Superseded));
    assert_eq!(products.items()[0].id, "new");
    assert!(notices.is_empty(), "superseded fetches stay silent");
}

#[tokio::test]
async fn delete_resyncs_from_server() {
    let transport = MockTransport::new();
    transport.respond(
        products_list(),
        ok_with(
            "products",
            json!([
                product("p1", "Gold Band", "Rings"),
                product("p2", "Pearl Drop", "Earrings")
            ]),
        ),
    );
    transport.respond(
        Endpoint::post("/admin/product/delete/p1"),
        ok_message("Product removed"),
    );
    // The server's view after the delete also picked up someone else's edit.
    transport.respond(
        products_list(),
        ok_with("products", json!([product("p2", "Pearl Drop XL", "Earrings")])),
    );
    let (products, notices) = controller::<Products>(&transport);
    products.list().await.unwrap();

    products.delete("p1", &Preset(true)).await.expect("delete");

    assert_eq!(
        transport.call_log(),
        vec![
            "POST /admin/products",
            "POST /admin/product/delete/p1",
            "POST /admin/products",
        ]
    );
    let items = products.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Pearl Drop XL");
    assert_eq!(notices.last().unwrap().message, "Product removed");
    assert_eq!(products.state(), ControllerState::Ready);
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let transport = MockTransport::new();
    transport.respond(
        products_list(),
        ok_with("products", json!([product("p1", "Gold Band", "Rings")])),
    );
    let (products, notices) = controller::<Products>(&transport);
    products.list().await.unwrap();
    let before = transport.call_count();

    let prompts = RefCell::new(Vec::new());
    let confirm = |prompt: &str| {
        prompts.borrow_mut().push(prompt.to_string());
        false
    };
    let err = products.delete("p1", &confirm).await.unwrap_err();

    assert_matches!(err, ConsoleError::Declined);
    assert_eq!(transport.call_count(), before);
    assert_eq!(products.len(), 1);
    assert!(notices.is_empty());
    assert_eq!(
        prompts.into_inner(),
        vec!["Are you sure you want to delete this product?"]
    );
}

#[tokio::test]
async fn delete_without_server_message_uses_default_notice() {
    let transport = MockTransport::new();
    transport.respond(Endpoint::post("/admin/user/u1"), ok_message(""));
    transport.respond(
        Users::list_endpoint(),
        ok_with("users", json!([user("u2", "Ravi")])),
    );
    let (users, notices) = controller::<Users>(&transport);

    users.delete("u1", &Preset(true)).await.unwrap();

    assert_eq!(notices.snapshot()[0].message, "User deleted successfully");
    assert_eq!(users.items()[0].name, "Ravi");
}

#[tokio::test]
async fn create_sends_multipart_with_images_and_resyncs() {
    let transport = MockTransport::new();
    transport.respond(Endpoint::post("/admin/product/new"), ok_message(""));
    transport.respond(
        products_list(),
        ok_with("products", json!([product("p9", "Gold Band", "Rings")])),
    );
    let (products, notices) = controller::<Products>(&transport);

    let draft = Draft::create_with(gold_band_draft())
        .with_attachment(Attachment::new("front.png", "image/png", vec![1, 2, 3]))
        .with_attachment(Attachment::new("side.png", "image/png", vec![4, 5]));
    products.create(&draft).await.expect("create");

    let sent = transport.calls_to(&Endpoint::post("/admin/product/new"));
    let payload = sent[0].body.as_multipart().expect("multipart body");
    assert_eq!(payload.field("name"), Some("Gold Band"));
    assert_eq!(payload.field("price"), Some("120"));
    assert_eq!(payload.field("stock"), Some("5"));
    assert_eq!(payload.field("category"), Some("Rings"));
    assert_eq!(payload.field("trending"), Some("Y"));
    assert_eq!(payload.files_named(IMAGES_FIELD).count(), 2);
    assert_eq!(sent[0].auth_token.as_deref(), Some(TEST_TOKEN));

    assert_eq!(notices.snapshot()[0].message, "Product created successfully");
    assert_eq!(products.items()[0].id, "p9");
}

#[tokio::test]
async fn invalid_draft_is_rejected_locally() {
    let transport = MockTransport::new();
    let (products, notices) = controller::<Products>(&transport);

    products.open_create();
    let err = products.submit_draft().await.unwrap_err();

    assert_matches!(err, ConsoleError::Validation(ref m) if m == "Product name is required");
    assert_eq!(transport.call_count(), 0);
    assert_eq!(notices.last().unwrap().message, "Product name is required");
    assert!(products.draft().is_some(), "form stays open");
}

#[tokio::test]
async fn failed_create_keeps_draft_and_skips_resync() {
    let transport = MockTransport::new();
    transport.respond(
        Endpoint::post("/admin/product/new"),
        rejected("Product already exists"),
    );
    let (products, notices) = controller::<Products>(&transport);

    products.open_create();
    assert!(products.edit_draft(|draft| draft.fields = gold_band_draft()));
    let err = products.submit_draft().await.unwrap_err();

    assert_eq!(err.server_message(), Some("Product already exists"));
    assert_eq!(notices.last().unwrap().message, "Product already exists");
    assert_eq!(transport.call_log(), vec!["POST /admin/product/new"]);
    let kept = products.draft().expect("draft kept for retry");
    assert_eq!(kept.fields, gold_band_draft());
    assert_eq!(products.state(), ControllerState::Ready);
}

#[tokio::test]
async fn failed_resync_still_reports_mutation_success() {
    let transport = MockTransport::new();
    transport.respond(Endpoint::post("/admin/product/new"), ok_message("Saved"));
    transport.respond(products_list(), network_down());
    let (products, notices) = controller::<Products>(&transport);

    let ack = products
        .create(&Draft::create_with(gold_band_draft()))
        .await
        .expect("mutation stands");

    assert_eq!(ack.message.as_deref(), Some("Saved"));
    let levels: Vec<_> = notices.snapshot().into_iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Success, NoticeLevel::Error]);
}

#[tokio::test]
async fn product_detail_falls_back_to_list_search() {
    let transport = MockTransport::new();
    transport.always(
        products_list(),
        ok_with(
            "products",
            json!([
                product("p1", "Gold Band", "Rings"),
                product("p2", "Pearl Drop", "Earrings")
            ]),
        ),
    );
    let (products, notices) = controller::<Products>(&transport);

    let found = products.get_one("p2").await.unwrap();
    assert_eq!(found.name, "Pearl Drop");

    let missing = products.get_one("nope").await.unwrap_err();
    assert_eq!(missing.server_message(), Some("Product not found"));
    assert_eq!(notices.last().unwrap().message, "Product not found");
}

#[tokio::test]
async fn open_edit_hydrates_from_server_copy() {
    let transport = MockTransport::new();
    transport.always(
        products_list(),
        ok_with("products", json!([product("p1", "Gold Band", "Rings")])),
    );
    transport.respond(Endpoint::post("/admin/product/p1"), ok_message(""));
    let (products, _) = controller::<Products>(&transport);

    let draft = products.open_edit("p1").await.unwrap();
    assert_eq!(draft.mode, DraftMode::Update("p1".into()));
    assert_eq!(draft.fields.name, "Gold Band");
    assert_eq!(draft.fields.category, Some(Category::Rings));
    assert!(draft.attachments.is_empty());

    products.edit_draft(|draft| draft.fields.stock = Some(0));
    products.submit_draft().await.unwrap();

    let sent = transport.calls_to(&Endpoint::post("/admin/product/p1"));
    assert_eq!(sent[0].body.as_multipart().unwrap().field("stock"), Some("0"));
    assert!(products.draft().is_none(), "successful submit closes the form");
}

#[tokio::test]
async fn order_status_update_sends_minimal_payload() {
    let transport = MockTransport::new();
    transport.respond(Endpoint::post("/admin/update/order/o1"), ok_message(""));
    transport.respond(
        Orders::list_endpoint(),
        ok_with("orders", json!([order("o1", "Shipped")])),
    );
    let (orders, notices) = controller::<Orders>(&transport);

    orders.set_status("o1", OrderStatus::Shipped).await.unwrap();

    let sent = transport.calls_to(&Endpoint::post("/admin/update/order/o1"));
    assert_eq!(sent[0].body.as_json(), Some(&json!({"orderStatus": "Shipped"})));
    assert_eq!(orders.items()[0].order_status, OrderStatus::Shipped);
    assert_eq!(notices.snapshot()[0].message, "Order updated successfully");
}

#[tokio::test]
async fn order_detail_uses_single_item_endpoint() {
    let transport = MockTransport::new();
    transport.respond(
        Endpoint::post("/admin/get/order/o1"),
        ok_with("order", order("o1", "Processing")),
    );
    let (orders, _) = controller::<Orders>(&transport);

    let draft = orders.open_edit("o1").await.unwrap();

    assert_eq!(draft.fields, OrderDraft::new(OrderStatus::Processing));
    assert_eq!(transport.call_log(), vec!["POST /admin/get/order/o1"]);
}

#[tokio::test]
async fn orders_cannot_be_created() {
    let transport = MockTransport::new();
    let (orders, notices) = controller::<Orders>(&transport);

    let err = orders
        .create(&Draft::create_with(OrderDraft::new(OrderStatus::Processing)))
        .await
        .unwrap_err();

    assert_matches!(err, ConsoleError::Unsupported { operation: "create", .. });
    assert!(Orders::create_endpoint().is_none());
    assert_eq!(transport.call_count(), 0);
    assert_eq!(notices.len(), 1);
}

#[tokio::test]
async fn event_update_uses_put_and_form_dates() {
    let transport = MockTransport::new();
    transport.respond(
        Endpoint::get("/admin/event/e1"),
        ok_with("event", event("e1", "Summer Sale")),
    );
    transport.respond(Endpoint::put("/admin/event/e1"), ok_message("Event updated"));
    transport.respond(
        Events::list_endpoint(),
        ok_with("events", json!([event("e1", "Summer Sale")])),
    );
    let (events, _) = controller::<Events>(&transport);

    let draft = events.open_edit("e1").await.unwrap();
    assert_eq!(draft.fields.discount, Some(20.0));
    events.edit_draft(|draft| draft.fields.discount = Some(25.0));
    events.submit_draft().await.unwrap();

    let sent = transport.calls_to(&Endpoint::put("/admin/event/e1"));
    let payload = sent[0].body.as_multipart().unwrap();
    assert_eq!(payload.field("startDate"), Some("2024-06-01T10:00"));
    assert_eq!(payload.field("endDate"), Some("2024-06-03T18:00"));
    assert_eq!(payload.field("discount"), Some("25"));
    assert_eq!(
        transport.call_log(),
        vec![
            "GET /admin/event/e1",
            "PUT /admin/event/e1",
            "POST /admin/events"
        ]
    );
}

#[tokio::test]
async fn cancel_draft_discards_form() {
    let transport = MockTransport::new();
    let (events, _) = controller::<Events>(&transport);

    events.open_create();
    events.edit_draft(|draft| draft.fields.title = "Flash".into());
    events.cancel_draft();

    assert!(events.draft().is_none());
    assert!(!events.edit_draft(|draft| draft.fields = EventDraft::default()));
    assert_matches!(
        events.submit_draft().await,
        Err(ConsoleError::Validation(_))
    );
    assert_eq!(transport.call_count(), 0);
}

async fn wait_for_calls(transport: &MockTransport, count: usize) {
    while transport.call_count() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn state_machine_while_requests_are_in_flight() {
    let transport = MockTransport::new();
    let (release_list, list_gate) = oneshot::channel();
    transport.respond_when(
        Orders::list_endpoint(),
        ok_with("orders", json!([order("o1", "Processing")])),
        list_gate,
    );
    let (release_delete, delete_gate) = oneshot::channel();
    transport.respond_when(
        Orders::delete_endpoint("o1").unwrap(),
        ok_message(""),
        delete_gate,
    );
    transport.respond(Orders::list_endpoint(), ok_with("orders", json!([])));
    let (orders, _) = controller::<Orders>(&transport);
    let orders = Arc::new(orders);
    assert_eq!(orders.state(), ControllerState::Idle);

    let mount = {
        let orders = orders.clone();
        tokio::spawn(async move { orders.list().await })
    };
    wait_for_calls(&transport, 1).await;
    assert_eq!(orders.state(), ControllerState::Loading);
    assert!(orders.collection().is_loading);
    release_list.send(()).unwrap();
    mount.await.unwrap().unwrap();
    assert_eq!(orders.state(), ControllerState::Ready);
    assert!(!orders.collection().is_loading);

    let deletion = {
        let orders = orders.clone();
        tokio::spawn(async move { orders.delete("o1", &Preset(true)).await })
    };
    wait_for_calls(&transport, 2).await;
    assert_eq!(orders.state(), ControllerState::Submitting);
    assert!(!orders.collection().is_loading);
    release_delete.send(()).unwrap();
    deletion.await.unwrap().unwrap();

    assert_eq!(orders.state(), ControllerState::Ready);
    assert!(orders.is_empty());
}

#[tokio::test]
async fn failed_mutation_returns_to_ready() {
    let transport = MockTransport::new();
    transport.respond(
        Orders::list_endpoint(),
        ok_with("orders", json!([order("o1", "Processing")])),
    );
    let (release, gate) = oneshot::channel();
    transport.respond_when(
        Orders::update_endpoint("o1"),
        network_down(),
        gate,
    );
    let (orders, notices) = controller::<Orders>(&transport);
    let orders = Arc::new(orders);
    orders.list().await.unwrap();

    let update = {
        let orders = orders.clone();
        tokio::spawn(async move { orders.set_status("o1", OrderStatus::Shipped).await })
    };
    wait_for_calls(&transport, 2).await;
    assert_eq!(orders.state(), ControllerState::Submitting);
    release.send(()).unwrap();

    assert_matches!(update.await.unwrap(), Err(ConsoleError::Transport(_)));
    assert_eq!(orders.state(), ControllerState::Ready);
    assert_eq!(orders.items()[0].order_status, OrderStatus::Processing);
    assert_eq!(notices.errors().len(), 1);
}

#[tokio::test]
async fn unexpected_order_status_keeps_the_rest_of_the_list() {
    let transport = MockTransport::new();
    transport.respond(
        Orders::list_endpoint(),
        ok_with(
            "orders",
            json!([order("o1", "Processing"), order("o2", "Packed")]),
        ),
    );
    let (orders, notices) = controller::<Orders>(&transport);

    let items = orders.list().await.expect("list");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].order_status, OrderStatus::Processing);
    assert_eq!(items[1].order_status, OrderStatus::Other("Packed".into()));
    assert_eq!(orders.len(), 2);
    assert!(notices.is_empty());
}

#[tokio::test]
async fn unexpected_category_keeps_the_rest_of_the_list() {
    let transport = MockTransport::new();
    transport.respond(
        products_list(),
        ok_with(
            "products",
            json!([
                product("p1", "Gold Band", "Rings"),
                product("p2", "Star Charm", "Pendants")
            ]),
        ),
    );
    let (products, notices) = controller::<Products>(&transport);

    products.list().await.expect("list");

    assert_eq!(products.len(), 2);
    assert_eq!(
        products.items()[1].category,
        Category::Other("Pendants".into())
    );
    assert_eq!(products.filtered("pendant").len(), 1);
    assert!(notices.is_empty());
}
