use crate::users::model::UserProfile;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    ReadyToServe,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::ReadyToServe => "ready_to_serve",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "ready_to_serve" => Some(OrderStatus::ReadyToServe),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "pre-selection")]
    PreSelection,
    #[serde(rename = "walk-in")]
    WalkIn,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::PreSelection => "pre-selection",
            OrderType::WalkIn => "walk-in",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pre-selection" => Some(OrderType::PreSelection),
            "walk-in" => Some(OrderType::WalkIn),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderType::PreSelection => "Pre-Selection",
            OrderType::WalkIn => "Walk-In",
        }
    }

    /// Order-number prefix for orders of this type
    pub fn prefix(&self) -> &'static str {
        match self {
            OrderType::PreSelection => "ORDER",
            OrderType::WalkIn => "POS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiningMethod {
    #[serde(rename = "dine-in")]
    DineIn,
    #[serde(rename = "take-out")]
    TakeOut,
}

impl DiningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiningMethod::DineIn => "dine-in",
            DiningMethod::TakeOut => "take-out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dine-in" => Some(DiningMethod::DineIn),
            "take-out" => Some(DiningMethod::TakeOut),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DiningMethod::DineIn => "Dine-In",
            DiningMethod::TakeOut => "Take-Out",
        }
    }
}

/// The purchased size as shown on an order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderVariation {
    pub id: i64,
    pub size_name: String,
    pub price: Decimal,
    pub menu_item_name: String,
    pub menu_item_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub variation: OrderVariation,
    pub quantity: i64,
    pub price_at_order: Decimal,
}

impl OrderItem {
    /// `Adobo (Regular) x2`
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) x{}",
            self.variation.menu_item_name, self.variation.size_name, self.quantity
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user: Option<UserProfile>,
    pub processed_by_staff: Option<UserProfile>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub dining_method: DiningMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub order_items: Vec<OrderItem>,
    pub table_number: Option<String>,
    pub amount_paid: Option<Decimal>,
    pub change_given: Option<Decimal>,
}

/// Completed-order row of the sales report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReportRow {
    pub id: i64,
    pub order_number: String,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: String,
    pub user: Option<UserProfile>,
    pub processed_by_staff: Option<UserProfile>,
    pub items_summary: String,
    pub total_amount: Decimal,
}

impl From<Order> for SalesReportRow {
    fn from(order: Order) -> Self {
        let items_summary = order
            .order_items
            .iter()
            .map(OrderItem::summary)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: order.id,
            order_number: order.order_number,
            processed_at: order.processed_at,
            kind: format!(
                "{} ({})",
                order.order_type.label(),
                order.dining_method.label()
            ),
            user: order.user,
            processed_by_staff: order.processed_by_staff,
            items_summary,
            total_amount: order.total_amount,
        }
    }
}

/// One requested cart line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub variation_id: i64,
    pub quantity: i64,
}

/// A cart line resolved against the menu, priced at order time
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub variation_id: i64,
    pub quantity: i64,
    pub price: Decimal,
}

pub fn cart_total(lines: &[PricedLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum()
}

/// `PREFIX#` followed by eight uppercase hex digits
pub fn new_order_number<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    format!("{}#{:08X}", prefix, rng.gen::<u32>())
}
