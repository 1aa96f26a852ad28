use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TenantId;

/// Partner inventory update, as decoded from one wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    pub branch_id: String,
    pub product_id: String,
    pub adjustment_quantity: Decimal,
    pub adjustment_units: String,
    pub reason_code: String,
}

/// Quantity adjustment with its unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub quantity: Decimal,
    pub units: String,
}

/// Inventory update in the central system's contract form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub tenant_id: TenantId,
    pub branch_id: String,
    pub product_id: String,
    pub adjustment: Adjustment,
    pub reason_code: String,
}

impl ProductUpdate {
    pub fn from_message(message: UpdateMessage, tenant_id: &TenantId) -> Self {
        Self {
            tenant_id: tenant_id.clone(),
            branch_id: message.branch_id,
            product_id: message.product_id,
            adjustment: Adjustment {
                quantity: message.adjustment_quantity,
                units: message.adjustment_units,
            },
            reason_code: message.reason_code,
        }
    }
}
