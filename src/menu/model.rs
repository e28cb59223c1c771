use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// One purchasable size of a menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub id: i64,
    pub size_name: String,
    pub price: Decimal,
    pub stock_level: i64,
    pub is_available: bool,
}

impl Variation {
    pub fn in_stock(&self) -> bool {
        self.is_available && self.stock_level > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub is_available: bool,
    pub category: Category,
    pub variations: Vec<Variation>,
    pub is_fully_out_of_stock: bool,
}

impl MenuItem {
    /// Build an item, deriving the out-of-stock flag from its variations
    pub fn new(
        id: i64,
        name: String,
        image: Option<String>,
        is_available: bool,
        category: Category,
        variations: Vec<Variation>,
    ) -> Self {
        let is_fully_out_of_stock = !variations.iter().any(Variation::in_stock);
        Self {
            id,
            name,
            image,
            is_available,
            category,
            variations,
            is_fully_out_of_stock,
        }
    }
}

/// Admin list filter over `?status=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockFilter {
    #[default]
    Active,
    OutOfStock,
    Archived,
    All,
}

impl StockFilter {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("active") => StockFilter::Active,
            Some("outofstock") => StockFilter::OutOfStock,
            Some("archived") => StockFilter::Archived,
            Some(_) => StockFilter::All,
        }
    }

    pub fn matches(&self, item: &MenuItem) -> bool {
        match self {
            StockFilter::Active => item.is_available,
            StockFilter::OutOfStock => item.is_available && item.is_fully_out_of_stock,
            StockFilter::Archived => !item.is_available,
            StockFilter::All => true,
        }
    }
}

/// Validated item fields; `None` leaves a column untouched on update
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub category_id: Option<i64>,
    pub name: Option<String>,
    pub image: Option<Option<String>>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariationChanges {
    pub id: Option<i64>,
    pub size_name: Option<String>,
    pub price: Option<Decimal>,
    pub stock_level: Option<i64>,
    pub is_available: Option<bool>,
}
