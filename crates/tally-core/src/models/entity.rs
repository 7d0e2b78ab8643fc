//! Entity type model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Logical category of business data with its own push endpoint and claim scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Products,
    Customer,
    BusinessDetails,
    Orders,
    CashDrawerTxns,
    StockHistory,
    Batch,
    BillingSettings,
    AdsReport,
    KitchenManagement,
    SectionTables,
    BoxCrates,
    OrderNumberSequence,
}

impl EntityType {
    /// Every entity type, in the order push cycles visit them.
    pub const ALL: [Self; 13] = [
        Self::Products,
        Self::Customer,
        Self::BusinessDetails,
        Self::Orders,
        Self::CashDrawerTxns,
        Self::StockHistory,
        Self::Batch,
        Self::BillingSettings,
        Self::AdsReport,
        Self::KitchenManagement,
        Self::SectionTables,
        Self::BoxCrates,
        Self::OrderNumberSequence,
    ];

    /// Wire and storage name of the entity type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Customer => "customer",
            Self::BusinessDetails => "business-details",
            Self::Orders => "orders",
            Self::CashDrawerTxns => "cash-drawer-txns",
            Self::StockHistory => "stock-history",
            Self::Batch => "batch",
            Self::BillingSettings => "billing-settings",
            Self::AdsReport => "ads-report",
            Self::KitchenManagement => "kitchen-management",
            Self::SectionTables => "section-tables",
            Self::BoxCrates => "box-crates",
            Self::OrderNumberSequence => "order-number-sequence",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown entity type: {needle}")))
    }
}
