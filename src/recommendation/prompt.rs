//! Prompt assembly for the weekly recommendation

use crate::analytics::model::{AnalyticsReport, DishSales, HourlyOrders, HourlyValue};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Queries run alongside the KPI-derived one
pub const FIXED_QUERIES: [&str; 2] = [
    "actionable advice for restaurant menu optimization based on sales data",
    "strategies to improve customer traffic patterns in a restaurant",
];

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const REVENUE_TARGET: i64 = 150_000;
const ITEMS_PER_ORDER_TARGET: f64 = 3.0;

const RESTAURANT_PROFILE: &str = "RESTAURANT PROFILE:

LUK'S BY GOODCHOICE is a fast-casual Filipino diner located in a busy urban area with consistently high foot traffic. It has been in operation for approximately one and a half year.

Key Characteristics:
- Restaurant Type: Fast-casual, Filipino comfort food.
- Location: High-traffic commercial area.
- Operating Hours: Open 24 hours a day, from Monday to Saturday (closed on Sundays).
- Capacity: Can accommodate up to 120 dine-in customers at once.
- Ordering System:
  - Online kiosk accessible via customers' personal devices.
  - Orders placed online must still be paid for in-store.
  - Walk-in customers may also order directly at the counter.";

const ROLE: &str = "You are an expert restaurant business strategist. Your task is to act as a consultant, determine the key issues of the restaurant based on the sales data, and provide a single, comprehensive, actionable recommendation for the upcoming week. To do this, you must analyze various sources of information: general business principles, last week's recommendation, its corresponding status, and the current week's sales data. Your final recommendation must be a logical next step, building upon or diverging from last week's advice based on the new data. DO NOT simply repeat the previous recommendation.";

const TASK: &str = "TASK:
Provide your observations for the week and identify potential issues. Review the general strategies, the PREVIOUS WEEK'S RECOMMENDATION, PREVIOUS WEEK'S RECOMMENDATION STATUS, and the CURRENT WEEK'S KPIs. Generate a new, follow-up strategy. What is the logical next step? Generate a unified strategic recommendation that considers the given factors.";

const IMPORTANT: &str = "**IMPORTANT:**
- Your recommendation should be a single, clear action item that the restaurant can implement next week.
- It should not be a repeat of last week's recommendation unless it is a necessary follow-up.
- DO NOT stray too far from the context provided. Your recommendation must be grounded in the current week's KPIs and the previous week's recommendation.
- DO NOT include the restaurant's limitations in the potential issues section. Focus on the data and the recommendation.";

/// Floats print like `2.5` and `3.0`, never `3`
fn float_text(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn hourly_text(value: HourlyValue) -> String {
    match value {
        HourlyValue::Count(count) => count.to_string(),
        HourlyValue::Average(avg) => float_text(avg),
    }
}

pub fn top_dishes(report: &AnalyticsReport) -> Vec<&DishSales> {
    let mut dishes: Vec<&DishSales> = report.dish_performance.iter().collect();
    dishes.sort_by(|a, b| b.sold.cmp(&a.sold));
    dishes.truncate(3);
    dishes
}

pub fn peak_hours(report: &AnalyticsReport) -> Vec<HourlyOrders> {
    let mut hours = report.avg_hourly_orders.clone();
    hours.sort_by(|a, b| b.orders.as_f64().total_cmp(&a.orders.as_f64()));
    hours.truncate(3);
    hours
}

pub fn slowest_hours(report: &AnalyticsReport) -> Vec<HourlyOrders> {
    let mut hours = report.avg_hourly_orders.clone();
    hours.sort_by(|a, b| a.orders.as_f64().total_cmp(&b.orders.as_f64()));
    hours.truncate(3);
    hours
}

fn hour_lines(hours: &[HourlyOrders]) -> String {
    hours
        .iter()
        .map(|h| format!("  - {}:00: {} avg orders", h.hour, hourly_text(h.orders)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable KPI block for the prompt
pub fn format_kpi_text(report: &AnalyticsReport) -> String {
    let dishes = top_dishes(report)
        .iter()
        .map(|d| format!("  - {}: {} sold", d.dish_name, d.sold))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "📅 Week: {} to {}\n\
         - Total Sales Revenue: ₱{}\n\
         - Total Order Count: {}\n\
         - Online Orders: {}\n\
         - Walk-in Orders: {}\n\
         - Avg Items per Order: {}\n\
         \n🍽️ Top Performing Dishes:\n{dishes}\n\
         \n⏰ Peak Order Hours:\n{}\n\
         \n🕒 Slowest Hours of the Day:\n{}",
        report.start_date,
        report.end_date,
        report.total_sales_revenue,
        report.total_order_count,
        report.online_order_count,
        report.walkin_order_count,
        float_text(report.avg_items_per_order),
        hour_lines(&peak_hours(report)),
        hour_lines(&slowest_hours(report)),
    )
    .trim()
    .to_string()
}

/// Knowledge-base query aimed at the weakest figures of the week
pub fn retrieval_query(report: &AnalyticsReport, slow_hours: &[HourlyOrders]) -> String {
    let mut parts = Vec::new();
    if report.total_sales_revenue < Decimal::from(REVENUE_TARGET) {
        parts.push("strategies to increase overall restaurant sales revenue");
    }
    if report.avg_items_per_order < ITEMS_PER_ORDER_TARGET {
        parts.push("how to increase average order size and upsell items");
    }
    if slow_hours.len() >= 3 && slow_hours.iter().any(|h| h.orders.as_f64() < 1.0) {
        parts.push("how to attract customers during off-peak or slow hours");
    }
    if parts.is_empty() {
        return "general strategies to improve restaurant operations and menu performance"
            .to_string();
    }
    parts.join(", ")
}

/// Everything the prompt is built from
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub kpi_text: &'a str,
    pub previous_recommendation: &'a str,
    pub previous_status: &'a str,
    pub context: &'a str,
    pub week_start: NaiveDate,
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let heading = input.week_start.format("%B %d, %Y");
    format!(
        "{RESTAURANT_PROFILE}

{ROLE}

CURRENT WEEK'S KPIs (Analytics Data for this Week):
{kpis}

PREVIOUS WEEK'S RECOMMENDATION (Last Week's Advice):
{previous}

PREVIOUS WEEK'S RECOMMENDATION STATUS:
{status}

CONTEXT FROM THE KNOWLEDGE BASE (General Strategies):
{context}

{TASK}

STRICTLY FOLLOW THIS FORMAT: (
## Weekly Business Insights (Week of {heading})

**Summary:**
(Start with a brief summary of the current week's performance.)

**Observations & Potential Issues:**
(List down the identified key issues or opportunities in a bulleted form with its corresponding description.)

**Recommendation for Next Week:**
(Provide an actionable recommendation for the upcoming week, building on or diverging from last week's advice.)
)

{IMPORTANT}",
        kpis = input.kpi_text,
        previous = input.previous_recommendation,
        status = input.previous_status,
        context = input.context,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::model::{RecommendationStatus, ReportType};
    use chrono::Utc;

    fn weekly_report(revenue: i64, avg_items: f64, hourly: Vec<f64>) -> AnalyticsReport {
        AnalyticsReport {
            id: 1,
            report_type: ReportType::Weekly,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            total_sales_revenue: Decimal::new(revenue * 100, 2),
            total_order_count: 120,
            online_order_count: 70,
            walkin_order_count: 50,
            avg_items_per_order: avg_items,
            dish_performance: vec![
                DishSales {
                    dish_name: "Sinigang".to_string(),
                    sold: 12,
                },
                DishSales {
                    dish_name: "Adobo".to_string(),
                    sold: 40,
                },
                DishSales {
                    dish_name: "Halo-Halo".to_string(),
                    sold: 3,
                },
                DishSales {
                    dish_name: "Lechon Kawali".to_string(),
                    sold: 25,
                },
            ],
            avg_hourly_orders: hourly
                .into_iter()
                .enumerate()
                .map(|(hour, orders)| HourlyOrders {
                    hour: hour as u32,
                    orders: HourlyValue::Average(orders),
                })
                .collect(),
            recommendation: None,
            recommendation_status: RecommendationStatus::Pending,
            recommendation_status_display: "Pending Review",
            recommendation_updated_at: None,
            is_viewed: false,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_kpi_text_lists_top_dishes_and_hours() {
        let report = weekly_report(98_000, 2.5, vec![0.0, 3.5, 1.25, 6.0, 2.0]);
        let text = format_kpi_text(&report);

        assert!(text.starts_with("📅 Week: 2025-03-03 to 2025-03-09"));
        assert!(text.contains("- Total Sales Revenue: ₱98000.00"));
        assert!(text.contains("- Avg Items per Order: 2.5\n\n🍽️ Top Performing Dishes:\n  - Adobo"));
        assert!(text.contains("- Online Orders: 70\n- Walk-in Orders: 50\n"));
        assert!(text.contains("  - Adobo: 40 sold\n  - Lechon Kawali: 25 sold\n  - Sinigang: 12 sold"));
        assert!(!text.contains("Halo-Halo"));
        assert!(text.contains("⏰ Peak Order Hours:\n  - 3:00: 6.0 avg orders\n  - 1:00: 3.5 avg orders"));
        assert!(text.contains("🕒 Slowest Hours of the Day:\n  - 0:00: 0.0 avg orders\n  - 2:00: 1.25 avg orders"));
    }

    #[test]
    fn test_query_targets_weak_figures() {
        let weak = weekly_report(98_000, 2.5, vec![0.0, 3.5, 1.25, 6.0]);
        let slow = slowest_hours(&weak);
        assert_eq!(
            retrieval_query(&weak, &slow),
            "strategies to increase overall restaurant sales revenue, \
             how to increase average order size and upsell items, \
             how to attract customers during off-peak or slow hours"
        );

        let strong = weekly_report(200_000, 3.2, vec![4.0, 5.0, 6.0]);
        let slow = slowest_hours(&strong);
        assert_eq!(
            retrieval_query(&strong, &slow),
            "general strategies to improve restaurant operations and menu performance"
        );
    }

    #[test]
    fn test_revenue_threshold_is_exclusive() {
        let report = weekly_report(150_000, 3.0, vec![2.0, 2.0]);
        let slow = slowest_hours(&report);
        assert_eq!(
            retrieval_query(&report, &slow),
            "general strategies to improve restaurant operations and menu performance"
        );
    }

    #[test]
    fn test_slow_hours_need_three_entries() {
        let report = weekly_report(200_000, 4.0, vec![0.0, 0.5]);
        let slow = slowest_hours(&report);
        assert!(!retrieval_query(&report, &slow).contains("off-peak"));
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_prompt(&PromptInput {
            kpi_text: "📅 Week: 2025-03-03 to 2025-03-09",
            previous_recommendation: "N/A (First week of data)",
            previous_status: "N/A",
            context: "Bundle drinks with meals.",
            week_start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        });

        assert!(prompt.starts_with("RESTAURANT PROFILE:"));
        assert!(prompt.contains("## Weekly Business Insights (Week of March 03, 2025)"));
        let order = [
            "You are an expert restaurant business strategist.",
            "CURRENT WEEK'S KPIs",
            "PREVIOUS WEEK'S RECOMMENDATION (Last Week's Advice):\nN/A (First week of data)",
            "PREVIOUS WEEK'S RECOMMENDATION STATUS:\nN/A",
            "CONTEXT FROM THE KNOWLEDGE BASE (General Strategies):\nBundle drinks with meals.",
            "TASK:",
            "STRICTLY FOLLOW THIS FORMAT",
            "**IMPORTANT:**",
        ];
        let positions: Vec<usize> = order.iter().map(|s| prompt.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
