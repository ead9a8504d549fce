//! Dashboard aggregator.
//!
//! Four independent widgets fetched concurrently. A failing widget reports its
//! own notice and leaves the other three untouched. Nothing is cached: every
//! `load()` is a fresh snapshot.

use crate::error::{ConsoleResult, ERROR_METRICS};
use crate::notify::{Notice, Notifier};
use crate::session::SessionContext;
use crate::transport::{ApiRequest, ApiTransport, Endpoint};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_sales: f64,
    pub total_orders: u64,
    pub total_products: u64,
    pub total_users: u64,
    pub sales_growth: f64,
    pub order_growth: f64,
    pub out_of_stock: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlySeries {
    pub months: Vec<String>,
    pub values: Vec<f64>,
}

impl MonthlySeries {
    /// Month/value pairs; a trailing unmatched entry on either side is dropped.
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.months
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// One slice of the stock-status breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSlice {
    pub name: String,
    #[serde(alias = "value", alias = "count")]
    pub y: f64,
}

/// Outcome of one dashboard widget.
pub type Widget<T> = ConsoleResult<T>;

#[derive(Debug)]
pub struct DashboardSnapshot {
    pub stats: Widget<DashboardStats>,
    pub sales: Widget<MonthlySeries>,
    pub orders: Widget<MonthlySeries>,
    pub stock: Widget<Vec<StockSlice>>,
}

impl DashboardSnapshot {
    pub fn loaded_count(&self) -> usize {
        [
            self.stats.is_ok(),
            self.sales.is_ok(),
            self.orders.is_ok(),
            self.stock.is_ok(),
        ]
        .into_iter()
        .filter(|ok| *ok)
        .count()
    }

    pub fn is_complete(&self) -> bool {
        self.loaded_count() == 4
    }
}

struct WidgetRoute {
    name: &'static str,
    path: &'static str,
    key: &'static str,
    failure: &'static str,
}

static STATS: WidgetRoute = WidgetRoute {
    name: "stats",
    path: "/admin/dashboard/stats",
    key: "stats",
    failure: "Failed to fetch stats",
};
static SALES: WidgetRoute = WidgetRoute {
    name: "sales",
    path: "/admin/dashboard/sales-chart",
    key: "data",
    failure: "Failed to fetch sales data",
};
static ORDERS: WidgetRoute = WidgetRoute {
    name: "orders",
    path: "/admin/dashboard/orders-chart",
    key: "data",
    failure: "Failed to fetch orders data",
};
static STOCK: WidgetRoute = WidgetRoute {
    name: "stock",
    path: "/admin/dashboard/stock-status",
    key: "data",
    failure: "Failed to fetch stock data",
};

pub struct Dashboard {
    session: SessionContext,
    transport: Arc<dyn ApiTransport>,
    notifier: Arc<dyn Notifier>,
}

impl Dashboard {
    pub fn new(
        session: SessionContext,
        transport: Arc<dyn ApiTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            transport,
            notifier,
        }
    }

    pub async fn load(&self) -> DashboardSnapshot {
        let (stats, sales, orders, stock) = tokio::join!(
            self.widget::<DashboardStats>(&STATS),
            self.widget::<MonthlySeries>(&SALES),
            self.widget::<MonthlySeries>(&ORDERS),
            self.widget::<Vec<StockSlice>>(&STOCK),
        );
        let snapshot = DashboardSnapshot {
            stats,
            sales,
            orders,
            stock,
        };
        tracing::info!(loaded = snapshot.loaded_count(), "dashboard snapshot ready");
        snapshot
    }

    async fn widget<T: DeserializeOwned>(&self, route: &WidgetRoute) -> Widget<T> {
        let result = self.fetch(route).await;
        if let Err(error) = &result {
            ERROR_METRICS.record(error, &format!("dashboard.{}", route.name));
            tracing::warn!(widget = route.name, %error, "dashboard widget failed");
            self.notifier
                .notify(Notice::error(error.notice_text(route.failure)));
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(&self, route: &WidgetRoute) -> Widget<T> {
        let request = self
            .session
            .authorize(ApiRequest::new(Endpoint::post(route.path)));
        let mut envelope = self.transport.send(request).await?.ensure_success()?;
        envelope.take(route.key)
    }
}
