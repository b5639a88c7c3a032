/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. Each role maps to a fixed set;
 * `admin` is granted everything and additionally bypasses checks.
 */

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use utoipa::ToSchema;

/// Back-office roles
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    BranchManager,
    Cashier,
}

/// Permission string constants
pub mod consts {
    // Catalog
    pub const CATALOG_READ: &str = "catalog:read";
    pub const CATALOG_WRITE: &str = "catalog:write";

    // Orders
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE: &str = "orders:update";
    pub const ORDERS_PAY: &str = "orders:pay";
    pub const ORDERS_CANCEL: &str = "orders:cancel";
    pub const ORDERS_DELETE: &str = "orders:delete";

    // Discounts
    pub const DISCOUNTS_READ: &str = "discounts:read";
    pub const DISCOUNTS_WRITE: &str = "discounts:write";

    // Settings
    pub const SETTINGS_READ: &str = "settings:read";
    pub const SETTINGS_WRITE: &str = "settings:write";

    // Adjustments
    pub const ADJUSTMENTS_READ: &str = "adjustments:read";
    pub const ADJUSTMENTS_WRITE: &str = "adjustments:write";

    // End day
    pub const END_DAY_READ: &str = "end_day:read";
    pub const END_DAY_RUN: &str = "end_day:run";

    pub const REPORTS_READ: &str = "reports:read";
    pub const AUDIT_READ: &str = "audit:read";
    pub const USERS_MANAGE: &str = "users:manage";

    pub const ALL: &[&str] = &[
        CATALOG_READ,
        CATALOG_WRITE,
        ORDERS_READ,
        ORDERS_CREATE,
        ORDERS_UPDATE,
        ORDERS_PAY,
        ORDERS_CANCEL,
        ORDERS_DELETE,
        DISCOUNTS_READ,
        DISCOUNTS_WRITE,
        SETTINGS_READ,
        SETTINGS_WRITE,
        ADJUSTMENTS_READ,
        ADJUSTMENTS_WRITE,
        END_DAY_READ,
        END_DAY_RUN,
        REPORTS_READ,
        AUDIT_READ,
        USERS_MANAGE,
    ];
}

use consts::*;

lazy_static! {
    static ref ROLE_PERMISSIONS: HashMap<Role, Vec<&'static str>> = {
        let mut map = HashMap::new();
        map.insert(Role::Admin, ALL.to_vec());
        map.insert(
            Role::BranchManager,
            vec![
                CATALOG_READ,
                CATALOG_WRITE,
                ORDERS_READ,
                ORDERS_CREATE,
                ORDERS_UPDATE,
                ORDERS_PAY,
                ORDERS_CANCEL,
                ORDERS_DELETE,
                DISCOUNTS_READ,
                DISCOUNTS_WRITE,
                SETTINGS_READ,
                ADJUSTMENTS_READ,
                ADJUSTMENTS_WRITE,
                END_DAY_READ,
                END_DAY_RUN,
                REPORTS_READ,
            ],
        );
        map.insert(
            Role::Cashier,
            vec![
                CATALOG_READ,
                ORDERS_READ,
                ORDERS_CREATE,
                ORDERS_UPDATE,
                ORDERS_PAY,
                DISCOUNTS_READ,
                SETTINGS_READ,
                ADJUSTMENTS_READ,
                ADJUSTMENTS_WRITE,
                END_DAY_READ,
            ],
        );
        map
    };
}

/// Permissions granted to `role`.
pub fn permissions_for_role(role: Role) -> Vec<String> {
    ROLE_PERMISSIONS
        .get(&role)
        .map(|perms| perms.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

/// Every role name, for CLI help and validation messages.
pub fn role_names() -> Vec<String> {
    Role::iter().map(|r| r.to_string()).collect()
}
