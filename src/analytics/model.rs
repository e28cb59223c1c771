use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Daily,
        ReportType::Weekly,
        ReportType::Monthly,
        ReportType::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Daily => "daily",
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
            ReportType::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(ReportType::Daily),
            "weekly" => Some(ReportType::Weekly),
            "monthly" => Some(ReportType::Monthly),
            "yearly" => Some(ReportType::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    #[default]
    Pending,
    Implemented,
    Dismissed,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Implemented => "implemented",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RecommendationStatus::Pending),
            "implemented" => Some(RecommendationStatus::Implemented),
            "dismissed" => Some(RecommendationStatus::Dismissed),
            _ => None,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "Pending Review",
            RecommendationStatus::Implemented => "Implemented",
            RecommendationStatus::Dismissed => "Dismissed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishSales {
    pub dish_name: String,
    pub sold: i64,
}

/// Whole counts for daily reports, per-day averages otherwise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HourlyValue {
    Count(u64),
    Average(f64),
}

impl HourlyValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            HourlyValue::Count(count) => *count as f64,
            HourlyValue::Average(avg) => *avg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyOrders {
    pub hour: u32,
    pub orders: HourlyValue,
}

/// Figures computed for one reporting window
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KpiSnapshot {
    pub total_sales_revenue: Decimal,
    pub total_order_count: i64,
    pub online_order_count: i64,
    pub walkin_order_count: i64,
    pub avg_items_per_order: f64,
    pub dish_performance: Vec<DishSales>,
    pub avg_hourly_orders: Vec<HourlyOrders>,
}

/// A stored snapshot as served to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub id: i64,
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_sales_revenue: Decimal,
    pub total_order_count: i64,
    pub online_order_count: i64,
    pub walkin_order_count: i64,
    pub avg_items_per_order: f64,
    pub dish_performance: Vec<DishSales>,
    pub avg_hourly_orders: Vec<HourlyOrders>,
    pub recommendation: Option<String>,
    pub recommendation_status: RecommendationStatus,
    pub recommendation_status_display: &'static str,
    pub recommendation_updated_at: Option<DateTime<Utc>>,
    pub is_viewed: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub total_items_sold: i64,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPerformance {
    pub item_name: String,
    pub variation_name: String,
    pub units_sold: i64,
    pub total_revenue: Decimal,
    pub average_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub summary: PerformanceSummary,
    pub item_performance: Vec<ItemPerformance>,
}

/// Round half away from zero to two places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
