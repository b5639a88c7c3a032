use crate::{
    config::AppConfig,
    db::{self, DbPool},
    entities::MAX_MONEY,
    entities::business_logo::{self, Entity as LogoEntity},
    entities::setting::{self, Entity as SettingEntity},
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::audit::{self, actions, RequestContext},
    services::pricing::PricingPolicy,
    services::products::{image_etag, validate_image, StoredImage},
};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr, sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod keys {
    pub const BUSINESS_NAME: &str = "business_name";
    pub const BUSINESS_ADDRESS: &str = "business_address";
    pub const BUSINESS_PHONE: &str = "business_phone";
    pub const BUSINESS_EMAIL: &str = "business_email";
    pub const RECEIPT_HEADER: &str = "receipt_header";
    pub const RECEIPT_FOOTER: &str = "receipt_footer";
    pub const SHOW_LOGO: &str = "show_logo";
    pub const TAX_RATE_CARD: &str = "tax_rate_card";
    pub const TAX_RATE_CASH: &str = "tax_rate_cash";
    pub const TAX_NAME: &str = "tax_name";
    pub const TAX_NUMBER: &str = "tax_number";
    pub const ENABLE_TAX: &str = "enable_tax";
    pub const SERVICE_CHARGE_PERCENT: &str = "service_charge_percent";
    pub const DELIVERY_CHARGE: &str = "delivery_charge";
    pub const CURRENCY_SYMBOL: &str = "currency_symbol";
    pub const CURRENCY_CODE: &str = "currency_code";
    pub const LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";
}

pub mod groups {
    pub const BUSINESS: &str = "business";
    pub const RECEIPT: &str = "receipt";
    pub const TAX: &str = "tax";
    pub const CHARGES: &str = "charges";
    pub const SYSTEM: &str = "system";
    pub const CUSTOM: &str = "custom";
}

/// Where the stored logo is served from.
pub const LOGO_PATH: &str = "/api/v1/settings/logo";

lazy_static! {
    static ref SETTING_KEY_RE: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid regex");
}

/// Built-in setting seeded at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSetting {
    pub key: &'static str,
    pub value: String,
    pub group: &'static str,
    pub description: &'static str,
}

/// Built-in keys with their seed values.
pub fn default_settings(config: &AppConfig) -> Vec<DefaultSetting> {
    let d = |key: &'static str,
             value: String,
             group: &'static str,
             description: &'static str| DefaultSetting {
        key,
        value,
        group,
        description,
    };
    vec![
        d(keys::BUSINESS_NAME, "My Restaurant".into(), groups::BUSINESS, "Business name printed on receipts"),
        d(keys::BUSINESS_ADDRESS, String::new(), groups::BUSINESS, "Business address"),
        d(keys::BUSINESS_PHONE, String::new(), groups::BUSINESS, "Business phone number"),
        d(keys::BUSINESS_EMAIL, String::new(), groups::BUSINESS, "Business email address"),
        d(keys::RECEIPT_HEADER, "Thank you for dining with us".into(), groups::RECEIPT, "Line printed above the items"),
        d(keys::RECEIPT_FOOTER, "Please visit again".into(), groups::RECEIPT, "Line printed below the totals"),
        d(keys::SHOW_LOGO, "true".into(), groups::RECEIPT, "Print the logo on receipts"),
        d(keys::TAX_RATE_CARD, config.default_tax_rate_card.to_string(), groups::TAX, "Tax percentage for card payments"),
        d(keys::TAX_RATE_CASH, config.default_tax_rate_cash.to_string(), groups::TAX, "Tax percentage for cash payments"),
        d(keys::TAX_NAME, "GST".into(), groups::TAX, "Tax label on receipts"),
        d(keys::TAX_NUMBER, String::new(), groups::TAX, "Tax registration number"),
        d(keys::ENABLE_TAX, "true".into(), groups::TAX, "Charge tax on orders"),
        d(keys::SERVICE_CHARGE_PERCENT, config.default_service_charge_percent.to_string(), groups::CHARGES, "Service charge percentage for dine-in orders"),
        d(keys::DELIVERY_CHARGE, config.default_delivery_charge.to_string(), groups::CHARGES, "Flat charge for delivery orders"),
        d(keys::CURRENCY_SYMBOL, config.default_currency_symbol.clone(), groups::SYSTEM, "Currency symbol"),
        d(keys::CURRENCY_CODE, config.default_currency.clone(), groups::SYSTEM, "ISO currency code"),
        d(keys::LOW_STOCK_THRESHOLD, config.default_low_stock_threshold.to_string(), groups::SYSTEM, "Stock level that counts as low"),
    ]
}

fn is_builtin(key: &str) -> bool {
    matches!(
        key,
        keys::BUSINESS_NAME
            | keys::BUSINESS_ADDRESS
            | keys::BUSINESS_PHONE
            | keys::BUSINESS_EMAIL
            | keys::RECEIPT_HEADER
            | keys::RECEIPT_FOOTER
            | keys::SHOW_LOGO
            | keys::TAX_RATE_CARD
            | keys::TAX_RATE_CASH
            | keys::TAX_NAME
            | keys::TAX_NUMBER
            | keys::ENABLE_TAX
            | keys::SERVICE_CHARGE_PERCENT
            | keys::DELIVERY_CHARGE
            | keys::CURRENCY_SYMBOL
            | keys::CURRENCY_CODE
            | keys::LOW_STOCK_THRESHOLD
    )
}

fn group_for(key: &str) -> &'static str {
    match key {
        keys::BUSINESS_NAME | keys::BUSINESS_ADDRESS | keys::BUSINESS_PHONE | keys::BUSINESS_EMAIL => {
            groups::BUSINESS
        }
        keys::RECEIPT_HEADER | keys::RECEIPT_FOOTER | keys::SHOW_LOGO => groups::RECEIPT,
        keys::TAX_RATE_CARD | keys::TAX_RATE_CASH | keys::TAX_NAME | keys::TAX_NUMBER
        | keys::ENABLE_TAX => groups::TAX,
        keys::SERVICE_CHARGE_PERCENT | keys::DELIVERY_CHARGE => groups::CHARGES,
        keys::CURRENCY_SYMBOL | keys::CURRENCY_CODE | keys::LOW_STOCK_THRESHOLD => groups::SYSTEM,
        _ => groups::CUSTOM,
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ServiceError> {
    Decimal::from_str(value.trim()).map_err(|_| {
        ServiceError::ValidationError(format!("{} must be a number, got '{}'", key, value))
    })
}

/// Checks a value against the rules of a built-in key. Custom keys accept any text.
pub fn validate_setting_value(key: &str, value: &str) -> Result<(), ServiceError> {
    match key {
        keys::TAX_RATE_CARD | keys::TAX_RATE_CASH | keys::SERVICE_CHARGE_PERCENT => {
            let rate = parse_decimal(key, value)?;
            if rate < Decimal::ZERO || rate > dec!(100) {
                return Err(ServiceError::ValidationError(format!(
                    "{} must be between 0 and 100",
                    key
                )));
            }
        }
        keys::DELIVERY_CHARGE => {
            let charge = parse_decimal(key, value)?;
            if charge < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} cannot be negative",
                    key
                )));
            }
            if charge > MAX_MONEY {
                return Err(ServiceError::ValidationError(format!(
                    "{} cannot exceed {}",
                    key, MAX_MONEY
                )));
            }
        }
        keys::LOW_STOCK_THRESHOLD => {
            let threshold: i32 = value.trim().parse().map_err(|_| {
                ServiceError::ValidationError(format!("{} must be a whole number", key))
            })?;
            if threshold < 0 {
                return Err(ServiceError::ValidationError(format!(
                    "{} cannot be negative",
                    key
                )));
            }
        }
        keys::ENABLE_TAX | keys::SHOW_LOGO => {
            if value != "true" && value != "false" {
                return Err(ServiceError::ValidationError(format!(
                    "{} must be 'true' or 'false'",
                    key
                )));
            }
        }
        keys::BUSINESS_EMAIL => {
            if !value.is_empty() && !validator::validate_email(value) {
                return Err(ServiceError::ValidationError(
                    "business_email must be a valid email address".to_string(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<(), ServiceError> {
    if key.len() > 100 || !SETTING_KEY_RE.is_match(key) {
        return Err(ServiceError::ValidationError(format!(
            "Invalid setting key '{}': use lowercase letters, digits and underscores",
            key
        )));
    }
    Ok(())
}

/// Business details used on receipts and the till header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessInfo {
    pub business_name: String,
    pub business_address: String,
    pub business_phone: String,
    pub business_email: String,
    pub receipt_header: String,
    pub receipt_footer: String,
    pub show_logo: bool,
    pub tax_name: String,
    pub tax_number: String,
    pub currency_symbol: String,
    pub currency_code: String,
}

/// Stored logo, without the bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LogoInfo {
    pub url: String,
    pub content_type: String,
    pub size: usize,
    pub etag: String,
}

/// Request to create or change one setting
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpsertSettingRequest {
    pub value: String,
    pub group: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct SettingsService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    config: Arc<AppConfig>,
}

impl SettingsService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    /// Inserts every built-in key that is missing. Returns how many were added.
    #[instrument(skip(self))]
    pub async fn ensure_defaults(&self) -> Result<usize, ServiceError> {
        let db = &*self.db_pool;
        let existing = self.load_map(db).await?;
        let mut inserted = 0;

        for default in default_settings(&self.config) {
            if existing.contains_key(default.key) {
                continue;
            }
            let now = Utc::now();
            setting::ActiveModel {
                id: Set(Uuid::new_v4()),
                setting_key: Set(default.key.to_string()),
                setting_value: Set(default.value),
                setting_group: Set(default.group.to_string()),
                setting_description: Set(Some(default.description.to_string())),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await
            .map_err(|e| {
                error!(error = %e, key = default.key, "Failed to seed setting");
                ServiceError::DatabaseError(e)
            })?;
            inserted += 1;
        }

        if inserted > 0 {
            info!(inserted, "Seeded default settings");
        }
        Ok(inserted)
    }

    async fn load_map<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<BTreeMap<String, String>, ServiceError> {
        let rows = SettingEntity::find().all(conn).await.map_err(|e| {
            error!(error = %e, "Failed to load settings");
            ServiceError::DatabaseError(e)
        })?;
        Ok(rows
            .into_iter()
            .map(|s| (s.setting_key, s.setting_value))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list(&self, group: Option<String>) -> Result<Vec<setting::Model>, ServiceError> {
        let db = &*self.db_pool;
        let mut query = SettingEntity::find();
        if let Some(group) = group {
            query = query.filter(setting::Column::SettingGroup.eq(group));
        }
        query
            .order_by_asc(setting::Column::SettingGroup)
            .order_by_asc(setting::Column::SettingKey)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list settings");
                ServiceError::DatabaseError(e)
            })
    }

    async fn find_by_key<C: ConnectionTrait>(
        conn: &C,
        key: &str,
    ) -> Result<Option<setting::Model>, ServiceError> {
        SettingEntity::find()
            .filter(setting::Column::SettingKey.eq(key))
            .one(conn)
            .await
            .map_err(|e| {
                error!(error = %e, key, "Failed to fetch setting");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<setting::Model, ServiceError> {
        Self::find_by_key(&*self.db_pool, key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Setting '{}' not found", key)))
    }

    async fn write_one<C: ConnectionTrait>(
        conn: &C,
        key: &str,
        request: UpsertSettingRequest,
    ) -> Result<setting::Model, ServiceError> {
        validate_key(key)?;
        validate_setting_value(key, &request.value)?;

        let saved = match Self::find_by_key(conn, key).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.setting_value = Set(request.value);
                if let Some(description) = request.description {
                    active.setting_description = Set(Some(description));
                }
                active.update(conn).await
            }
            None => {
                let group = request
                    .group
                    .unwrap_or_else(|| group_for(key).to_string());
                let now = Utc::now();
                setting::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    setting_key: Set(key.to_string()),
                    setting_value: Set(request.value),
                    setting_group: Set(group),
                    setting_description: Set(request.description),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(conn)
                .await
            }
        };

        saved.map_err(|e| {
            error!(error = %e, key, "Failed to save setting");
            ServiceError::DatabaseError(e)
        })
    }

    /// Creates or updates one key.
    #[instrument(skip(self, request, ctx))]
    pub async fn upsert(
        &self,
        key: &str,
        request: UpsertSettingRequest,
        ctx: &RequestContext,
    ) -> Result<setting::Model, ServiceError> {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "settings.upsert").await?;

        let saved = Self::write_one(&txn, key, request).await?;
        audit::record(
            &txn,
            ctx,
            actions::SETTINGS_UPDATE,
            "setting",
            Some(saved.id),
            Some(format!("{}={}", saved.setting_key, saved.setting_value)),
        )
        .await?;

        db::commit(txn, "settings.upsert", started).await?;
        info!(key, "Setting saved");

        events::publish_all(
            self.event_sender.as_deref(),
            vec![Event::SettingsUpdated {
                keys: vec![key.to_string()],
            }],
        )
        .await;
        Ok(saved)
    }

    /// Updates many keys at once; nothing is written if any value is rejected.
    #[instrument(skip(self, values, ctx), fields(count = values.len()))]
    pub async fn bulk_update(
        &self,
        values: BTreeMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<Vec<setting::Model>, ServiceError> {
        if values.is_empty() {
            return Err(ServiceError::ValidationError(
                "No settings provided".to_string(),
            ));
        }
        for (key, value) in &values {
            validate_key(key)?;
            validate_setting_value(key, value)?;
        }

        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "settings.bulk_update").await?;
        let mut saved = Vec::with_capacity(values.len());
        for (key, value) in &values {
            let request = UpsertSettingRequest {
                value: value.clone(),
                group: None,
                description: None,
            };
            saved.push(Self::write_one(&txn, key, request).await?);
        }
        let keys: Vec<String> = values.keys().cloned().collect();
        audit::record(
            &txn,
            ctx,
            actions::SETTINGS_UPDATE,
            "setting",
            None,
            Some(keys.join(",")),
        )
        .await?;
        db::commit(txn, "settings.bulk_update", started).await?;

        events::publish_all(
            self.event_sender.as_deref(),
            vec![Event::SettingsUpdated { keys }],
        )
        .await;
        Ok(saved)
    }

    /// Removes a custom key. Built-in keys are permanent.
    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, key: &str, ctx: &RequestContext) -> Result<(), ServiceError> {
        if is_builtin(key) {
            return Err(ServiceError::InvalidOperation(format!(
                "Built-in setting '{}' cannot be deleted",
                key
            )));
        }
        let existing = self.get(key).await?;
        let db = &*self.db_pool;
        SettingEntity::delete_by_id(existing.id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, key, "Failed to delete setting");
                ServiceError::DatabaseError(e)
            })?;
        audit::record(
            db,
            ctx,
            actions::SETTINGS_DELETE,
            "setting",
            Some(existing.id),
            Some(key.to_string()),
        )
        .await?;
        Ok(())
    }

    async fn find_logo(&self) -> Result<Option<business_logo::Model>, ServiceError> {
        LogoEntity::find().one(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to load business logo");
            ServiceError::DatabaseError(e)
        })
    }

    /// Replaces the business logo.
    #[instrument(skip(self, bytes, ctx), fields(size = bytes.len()))]
    pub async fn set_logo(
        &self,
        content_type: &str,
        bytes: Vec<u8>,
        ctx: &RequestContext,
    ) -> Result<LogoInfo, ServiceError> {
        let content_type = validate_image(content_type, &bytes)?;
        let info = LogoInfo {
            url: LOGO_PATH.to_string(),
            content_type: content_type.clone(),
            size: bytes.len(),
            etag: image_etag(&bytes),
        };

        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "settings.set_logo").await?;
        LogoEntity::delete_many().exec(&txn).await.map_err(|e| {
            error!(error = %e, "Failed to clear business logo");
            ServiceError::DatabaseError(e)
        })?;
        let saved = business_logo::ActiveModel {
            id: Set(Uuid::new_v4()),
            content_type: Set(content_type),
            data: Set(bytes),
            updated_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store business logo");
            ServiceError::DatabaseError(e)
        })?;
        audit::record(
            &txn,
            ctx,
            actions::SETTINGS_UPDATE,
            "business_logo",
            Some(saved.id),
            Some(format!("{} {} bytes", info.content_type, info.size)),
        )
        .await?;
        db::commit(txn, "settings.set_logo", started).await?;

        info!(size = info.size, "Business logo saved");
        Ok(info)
    }

    pub async fn get_logo(&self) -> Result<StoredImage, ServiceError> {
        match self.find_logo().await? {
            Some(logo) if !logo.data.is_empty() => Ok(StoredImage {
                etag: image_etag(&logo.data),
                content_type: logo.content_type,
                bytes: logo.data,
            }),
            _ => Err(ServiceError::NotFound(
                "No business logo has been uploaded".to_string(),
            )),
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete_logo(&self, ctx: &RequestContext) -> Result<(), ServiceError> {
        let existing = self.find_logo().await?.ok_or_else(|| {
            ServiceError::NotFound("No business logo has been uploaded".to_string())
        })?;
        let db = &*self.db_pool;
        LogoEntity::delete_by_id(existing.id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to delete business logo");
                ServiceError::DatabaseError(e)
            })?;
        audit::record(
            db,
            ctx,
            actions::SETTINGS_DELETE,
            "business_logo",
            Some(existing.id),
            None,
        )
        .await?;
        Ok(())
    }

    /// Logo reference for printed documents: set only when `show_logo` is on
    /// and a logo has been uploaded.
    pub async fn receipt_logo_url(&self, business: &BusinessInfo) -> Result<Option<String>, ServiceError> {
        if !business.show_logo {
            return Ok(None);
        }
        Ok(self.find_logo().await?.map(|_| LOGO_PATH.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn business_info(&self) -> Result<BusinessInfo, ServiceError> {
        let map = self.load_map(&*self.db_pool).await?;
        let text = |key: &str, fallback: &str| {
            map.get(key)
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        Ok(BusinessInfo {
            business_name: text(keys::BUSINESS_NAME, "My Restaurant"),
            business_address: text(keys::BUSINESS_ADDRESS, ""),
            business_phone: text(keys::BUSINESS_PHONE, ""),
            business_email: text(keys::BUSINESS_EMAIL, ""),
            receipt_header: text(keys::RECEIPT_HEADER, ""),
            receipt_footer: text(keys::RECEIPT_FOOTER, ""),
            show_logo: parse_or(&map, keys::SHOW_LOGO, true),
            tax_name: text(keys::TAX_NAME, "GST"),
            tax_number: text(keys::TAX_NUMBER, ""),
            currency_symbol: text(keys::CURRENCY_SYMBOL, &self.config.default_currency_symbol),
            currency_code: text(keys::CURRENCY_CODE, &self.config.default_currency),
        })
    }

    /// Rates for the total engine. Unparsable values fall back to configured defaults.
    pub async fn pricing_policy(&self) -> Result<PricingPolicy, ServiceError> {
        self.pricing_policy_on(&*self.db_pool).await
    }

    pub async fn pricing_policy_on<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<PricingPolicy, ServiceError> {
        let map = self.load_map(conn).await?;
        Ok(policy_from_map(&map, &PricingPolicy::from_config(&self.config)))
    }

    pub async fn low_stock_threshold(&self) -> Result<i32, ServiceError> {
        self.low_stock_threshold_on(&*self.db_pool).await
    }

    pub async fn low_stock_threshold_on<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<i32, ServiceError> {
        let map = self.load_map(conn).await?;
        Ok(parse_or(
            &map,
            keys::LOW_STOCK_THRESHOLD,
            self.config.default_low_stock_threshold,
        ))
    }
}

fn parse_or<T: FromStr + Copy>(map: &BTreeMap<String, String>, key: &str, fallback: T) -> T {
    match map.get(key) {
        None => fallback,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparsable setting value, using default");
            fallback
        }),
    }
}

pub(crate) fn policy_from_map(
    map: &BTreeMap<String, String>,
    defaults: &PricingPolicy,
) -> PricingPolicy {
    PricingPolicy {
        tax_rate_card: parse_or(map, keys::TAX_RATE_CARD, defaults.tax_rate_card),
        tax_rate_cash: parse_or(map, keys::TAX_RATE_CASH, defaults.tax_rate_cash),
        service_charge_percent: parse_or(
            map,
            keys::SERVICE_CHARGE_PERCENT,
            defaults.service_charge_percent,
        ),
        delivery_charge: parse_or(map, keys::DELIVERY_CHARGE, defaults.delivery_charge),
        enable_tax: parse_or(map, keys::ENABLE_TAX, defaults.enable_tax),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test_case(keys::TAX_RATE_CASH, "15" ; "whole rate")]
    #[test_case(keys::TAX_RATE_CARD, "7.5" ; "fractional rate")]
    #[test_case(keys::SERVICE_CHARGE_PERCENT, "0" ; "zero service")]
    #[test_case(keys::DELIVERY_CHARGE, "150.00" ; "delivery charge")]
    #[test_case(keys::LOW_STOCK_THRESHOLD, "5" ; "threshold")]
    #[test_case(keys::ENABLE_TAX, "false" ; "boolean")]
    #[test_case("printer_name", "anything goes" ; "custom key")]
    fn accepts(key: &str, value: &str) {
        assert!(validate_setting_value(key, value).is_ok());
    }

    #[test_case(keys::TAX_RATE_CASH, "abc" ; "not a number")]
    #[test_case(keys::TAX_RATE_CARD, "101" ; "rate above 100")]
    #[test_case(keys::SERVICE_CHARGE_PERCENT, "-1" ; "negative rate")]
    #[test_case(keys::DELIVERY_CHARGE, "-10" ; "negative charge")]
    #[test_case(keys::DELIVERY_CHARGE, "10000000000" ; "charge beyond the money column")]
    #[test_case(keys::LOW_STOCK_THRESHOLD, "2.5" ; "fractional threshold")]
    #[test_case(keys::SHOW_LOGO, "yes" ; "loose boolean")]
    #[test_case(keys::BUSINESS_EMAIL, "not-an-email" ; "bad email")]
    fn rejects(key: &str, value: &str) {
        assert_matches!(
            validate_setting_value(key, value),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn keys_must_be_snake_case() {
        assert!(validate_key("printer_name").is_ok());
        assert!(validate_key("Printer").is_err());
        assert!(validate_key("1st").is_err());
        assert!(validate_key("with space").is_err());
    }

    #[test]
    fn policy_falls_back_on_garbage() {
        let defaults = PricingPolicy::default();
        let mut map = BTreeMap::new();
        map.insert(keys::TAX_RATE_CASH.to_string(), "sixteen".to_string());
        map.insert(keys::TAX_RATE_CARD.to_string(), "8".to_string());
        map.insert(keys::ENABLE_TAX.to_string(), "false".to_string());

        let policy = policy_from_map(&map, &defaults);
        assert_eq!(policy.tax_rate_cash, defaults.tax_rate_cash);
        assert_eq!(policy.tax_rate_card, dec!(8));
        assert!(!policy.enable_tax);
        assert_eq!(policy.delivery_charge, defaults.delivery_charge);
    }

    #[test]
    fn every_default_is_builtin_and_valid() {
        let config = AppConfig::new(
            "sqlite::memory:".into(),
            "x".repeat(64),
            3600,
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        let defaults = default_settings(&config);
        assert_eq!(defaults.len(), 17);
        for d in defaults {
            assert!(is_builtin(d.key), "{} should be built in", d.key);
            assert_eq!(group_for(d.key), d.group);
            assert!(validate_setting_value(d.key, &d.value).is_ok(), "{}", d.key);
        }
    }
}
