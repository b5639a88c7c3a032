use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_discounts_table::Migration),
            Box::new(m20240101_000004_create_orders_tables::Migration),
            Box::new(m20240101_000005_create_settings_table::Migration),
            Box::new(m20240101_000006_create_adjustments_tables::Migration),
            Box::new(m20240101_000007_create_end_day_tables::Migration),
            Box::new(m20240101_000008_create_audit_logs_table::Migration),
        ]
    }
}

/// Money columns: 12 digits, 2 after the point.
fn money(col: &mut ColumnDef) -> &mut ColumnDef {
    col.decimal_len(12, 2).not_null().default(0)
}

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::FullName).string().null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Username,
        FullName,
        PasswordHash,
        Role,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).string_len(255).null())
                        .col(
                            ColumnDef::new(Categories::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(money(&mut ColumnDef::new(Products::Price)))
                        .col(ColumnDef::new(Products::CostPrice).decimal_len(12, 2).null())
                        .col(ColumnDef::new(Products::Barcode).string_len(100).null())
                        .col(ColumnDef::new(Products::Sku).string_len(50).null())
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::RunningItem)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Products::Image).blob().null())
                        .col(ColumnDef::new(Products::ImageContentType).string_len(64).null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category_id")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category_id")
                        .table(Products::Table)
                        .col(Products::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_barcode")
                        .table(Products::Table)
                        .col(Products::Barcode)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        Description,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        CategoryId,
        Name,
        Description,
        Price,
        CostPrice,
        Barcode,
        Sku,
        StockQuantity,
        RunningItem,
        IsAvailable,
        IsArchived,
        Image,
        ImageContentType,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_discounts_table {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_discounts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Discounts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Discounts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Discounts::Name).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Discounts::Code)
                                .string_len(50)
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Discounts::DiscountType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(money(&mut ColumnDef::new(Discounts::Value)))
                        .col(
                            ColumnDef::new(Discounts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Discounts::StartDate).date().null())
                        .col(ColumnDef::new(Discounts::EndDate).date().null())
                        .col(
                            ColumnDef::new(Discounts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Discounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Discounts {
        Table,
        Id,
        Name,
        Code,
        DiscountType,
        Value,
        IsActive,
        StartDate,
        EndDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_orders_tables {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::UserId).uuid().null())
                        .col(ColumnDef::new(Orders::CustomerName).string_len(100).null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string_len(20).null())
                        .col(ColumnDef::new(Orders::OrderType).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentMethod)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::DiscountId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::ManualDiscountType)
                                .string_len(16)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ManualDiscountValue)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(money(&mut ColumnDef::new(Orders::Subtotal)))
                        .col(money(&mut ColumnDef::new(Orders::DiscountAmount)))
                        .col(
                            ColumnDef::new(Orders::TaxRate)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(money(&mut ColumnDef::new(Orders::TaxAmount)))
                        .col(money(&mut ColumnDef::new(Orders::ServiceCharge)))
                        .col(money(&mut ColumnDef::new(Orders::DeliveryCharges)))
                        .col(money(&mut ColumnDef::new(Orders::TotalAmount)))
                        .col(ColumnDef::new(Orders::OrderStatus).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentStatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_discount_id")
                                .from(Orders::Table, Orders::DiscountId)
                                .to(Discounts::Table, Discounts::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, col) in [
                ("idx_orders_created_at", Orders::CreatedAt),
                ("idx_orders_order_status", Orders::OrderStatus),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Orders::Table)
                            .col(col)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderItems::ProductName)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(money(&mut ColumnDef::new(OrderItems::UnitPrice)))
                        .col(money(&mut ColumnDef::new(OrderItems::TotalPrice)))
                        .col(
                            ColumnDef::new(OrderItems::StockDeducted)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(OrderItems::Notes).text().null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product_id")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(PaymentTransactions::TransactionNumber)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(money(&mut ColumnDef::new(PaymentTransactions::Amount)))
                        .col(
                            ColumnDef::new(PaymentTransactions::PaymentMethod)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::TransactionStatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::TransactionNote)
                                .text()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payment_transactions_order_id")
                                .from(PaymentTransactions::Table, PaymentTransactions::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        UserId,
        CustomerName,
        CustomerPhone,
        OrderType,
        PaymentMethod,
        DiscountId,
        ManualDiscountType,
        ManualDiscountValue,
        Subtotal,
        DiscountAmount,
        TaxRate,
        TaxAmount,
        ServiceCharge,
        DeliveryCharges,
        TotalAmount,
        OrderStatus,
        PaymentStatus,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        TotalPrice,
        StockDeducted,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PaymentTransactions {
        Table,
        Id,
        OrderId,
        TransactionNumber,
        Amount,
        PaymentMethod,
        TransactionStatus,
        TransactionNote,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Discounts {
        Table,
        Id,
    }
}

mod m20240101_000005_create_settings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_settings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Settings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Settings::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Settings::SettingKey)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Settings::SettingValue).text().not_null())
                        .col(
                            ColumnDef::new(Settings::SettingGroup)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Settings::SettingDescription)
                                .string_len(255)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Settings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Settings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BusinessLogos::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BusinessLogos::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(BusinessLogos::ContentType)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BusinessLogos::Data).blob().not_null())
                        .col(
                            ColumnDef::new(BusinessLogos::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BusinessLogos::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Settings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Settings {
        Table,
        Id,
        SettingKey,
        SettingValue,
        SettingGroup,
        SettingDescription,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BusinessLogos {
        Table,
        Id,
        ContentType,
        Data,
        UpdatedAt,
    }
}

mod m20240101_000006_create_adjustments_tables {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_adjustments_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BillAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BillAdjustments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BillAdjustments::Name)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BillAdjustments::Quantity).integer().null())
                        .col(money(&mut ColumnDef::new(BillAdjustments::Price)))
                        .col(ColumnDef::new(BillAdjustments::Notes).text().null())
                        .col(ColumnDef::new(BillAdjustments::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(BillAdjustments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BillAdjustments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BillAdjustmentImages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BillAdjustmentImages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BillAdjustmentImages::BillAdjustmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BillAdjustmentImages::ContentType)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BillAdjustmentImages::Data).blob().not_null())
                        .col(
                            ColumnDef::new(BillAdjustmentImages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_bill_adjustment_images_bill_adjustment_id")
                                .from(
                                    BillAdjustmentImages::Table,
                                    BillAdjustmentImages::BillAdjustmentId,
                                )
                                .to(BillAdjustments::Table, BillAdjustments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AdvanceAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AdvanceAdjustments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdvanceAdjustments::Name)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(money(&mut ColumnDef::new(AdvanceAdjustments::Amount)))
                        .col(ColumnDef::new(AdvanceAdjustments::Notes).text().null())
                        .col(ColumnDef::new(AdvanceAdjustments::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(AdvanceAdjustments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdvanceAdjustments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AdvanceAdjustments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BillAdjustmentImages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BillAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BillAdjustments {
        Table,
        Id,
        Name,
        Quantity,
        Price,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BillAdjustmentImages {
        Table,
        Id,
        BillAdjustmentId,
        ContentType,
        Data,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum AdvanceAdjustments {
        Table,
        Id,
        Name,
        Amount,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_end_day_tables {
    use super::money;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_end_day_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(EndDays::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(EndDays::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(EndDays::EndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(EndDays::Notes).text().null())
                        .col(ColumnDef::new(EndDays::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(EndDays::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_end_days_end_date")
                        .table(EndDays::Table)
                        .col(EndDays::EndDate)
                        .to_owned(),
                )
                .await?;

            let mut table = Table::create();
            table
                .table(SalesSummaries::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(SalesSummaries::Id)
                        .uuid()
                        .primary_key()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(SalesSummaries::EndDayId)
                        .uuid()
                        .not_null()
                        .unique_key(),
                )
                .col(
                    ColumnDef::new(SalesSummaries::PeriodStart)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .col(
                    ColumnDef::new(SalesSummaries::PeriodEnd)
                        .timestamp_with_time_zone()
                        .not_null(),
                );
            for count in [
                SalesSummaries::OrderCount,
                SalesSummaries::CompletedOrders,
                SalesSummaries::PendingOrders,
                SalesSummaries::CancelledOrders,
            ] {
                table.col(ColumnDef::new(count).integer().not_null().default(0));
            }
            for amount in [
                SalesSummaries::Subtotal,
                SalesSummaries::DiscountTotal,
                SalesSummaries::TaxTotal,
                SalesSummaries::ServiceChargeTotal,
                SalesSummaries::DeliveryTotal,
                SalesSummaries::GrossSales,
                SalesSummaries::CashSales,
                SalesSummaries::CardSales,
                SalesSummaries::OtherSales,
                SalesSummaries::BillAdjustmentsTotal,
                SalesSummaries::AdvanceAdjustmentsTotal,
                SalesSummaries::NetTotal,
            ] {
                table.col(money(&mut ColumnDef::new(amount)));
            }
            table
                .col(
                    ColumnDef::new(SalesSummaries::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_sales_summaries_end_day_id")
                        .from(SalesSummaries::Table, SalesSummaries::EndDayId)
                        .to(EndDays::Table, EndDays::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                );

            manager.create_table(table.to_owned()).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SalesSummaries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(EndDays::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum EndDays {
        Table,
        Id,
        EndDate,
        Notes,
        CreatedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SalesSummaries {
        Table,
        Id,
        EndDayId,
        PeriodStart,
        PeriodEnd,
        OrderCount,
        CompletedOrders,
        PendingOrders,
        CancelledOrders,
        Subtotal,
        DiscountTotal,
        TaxTotal,
        ServiceChargeTotal,
        DeliveryTotal,
        GrossSales,
        CashSales,
        CardSales,
        OtherSales,
        BillAdjustmentsTotal,
        AdvanceAdjustmentsTotal,
        NetTotal,
        CreatedAt,
    }
}

mod m20240101_000008_create_audit_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLogs::UserId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogs::Entity).string_len(50).not_null())
                        .col(ColumnDef::new(AuditLogs::EntityId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::Details).text().null())
                        .col(ColumnDef::new(AuditLogs::IpAddress).string_len(50).null())
                        .col(ColumnDef::new(AuditLogs::UserAgent).string_len(255).null())
                        .col(
                            ColumnDef::new(AuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_created_at")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        UserId,
        Action,
        Entity,
        EntityId,
        Details,
        IpAddress,
        UserAgent,
        CreatedAt,
    }
}

/// Connects to `db_url` and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
