use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_statuses_table::Migration),
            Box::new(m20240601_000002_create_orders_table::Migration),
            Box::new(m20240601_000003_create_checkout_sessions_table::Migration),
            Box::new(m20240601_000004_create_payment_transactions_table::Migration),
        ]
    }
}

mod m20240601_000001_create_statuses_table {

    use crate::entities::status::SEED;
    use sea_orm::ConnectionTrait;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_statuses_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Statuses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Statuses::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Statuses::Name).string_len(64).not_null().unique_key())
                        .col(ColumnDef::new(Statuses::DisplayName).string().not_null())
                        .col(ColumnDef::new(Statuses::Description).string().null())
                        .to_owned(),
                )
                .await?;

            // Inserted in order so ids line up with the seed position
            for (name, display_name, description) in SEED {
                let insert = Query::insert()
                    .into_table(Statuses::Table)
                    .columns([Statuses::Name, Statuses::DisplayName, Statuses::Description])
                    .values([name.into(), display_name.into(), description.into()])
                    .map_err(|e| DbErr::Custom(format!("status seed: {}", e)))?
                    .to_owned();
                let backend = manager.get_database_backend();
                manager.get_connection().execute(backend.build(&insert)).await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Statuses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Statuses {
        Table,
        Id,
        Name,
        DisplayName,
        Description,
    }
}

mod m20240601_000002_create_orders_table {

    use super::m20240601_000001_create_statuses_table::Statuses;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_orders_table"
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
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Orders::Products).json_binary().not_null())
                        .col(ColumnDef::new(Orders::StatusId).integer().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Orders::Currency).string_len(8).not_null())
                        .col(ColumnDef::new(Orders::User).json_binary().not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::PaymentReference).string_len(64).null())
                        .col(ColumnDef::new(Orders::PaymentProviderReference).string_len(128).null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_status_id")
                                .from(Orders::Table, Orders::StatusId)
                                .to(Statuses::Table, Statuses::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Second line of defence against a double-delivered callback
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_payment_reference")
                        .table(Orders::Table)
                        .col(Orders::PaymentReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        Products,
        StatusId,
        Total,
        Currency,
        User,
        PaymentMethod,
        PaymentReference,
        PaymentProviderReference,
        CreatedAt,
    }
}

mod m20240601_000003_create_checkout_sessions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_checkout_sessions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CheckoutSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CheckoutSessions::Id)
                                .string_len(64)
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::UserData).json_binary().not_null())
                        .col(ColumnDef::new(CheckoutSessions::CartItems).json_binary().not_null())
                        .col(
                            ColumnDef::new(CheckoutSessions::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::Status)
                                .string_len(16)
                                .not_null()
                                .default("new"),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::UpdatedAt)
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
                        .name("idx_checkout_sessions_status")
                        .table(CheckoutSessions::Table)
                        .col(CheckoutSessions::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CheckoutSessions {
        Table,
        Id,
        UserData,
        CartItems,
        TotalAmount,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000004_create_payment_transactions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_payment_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentTransactions::Id)
                                .string_len(64)
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(PaymentTransactions::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Currency).string_len(8).not_null())
                        .col(
                            ColumnDef::new(PaymentTransactions::PaymentMethod)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentTransactions::InstallmentCount)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Provider).string_len(16).not_null())
                        .col(
                            ColumnDef::new(PaymentTransactions::ProviderReference)
                                .string_len(128)
                                .null(),
                        )
                        .col(ColumnDef::new(PaymentTransactions::Metadata).json_binary().null())
                        .col(ColumnDef::new(PaymentTransactions::FailureReason).text().null())
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
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PaymentTransactions {
        Table,
        Id,
        Status,
        Amount,
        Currency,
        PaymentMethod,
        InstallmentCount,
        Provider,
        ProviderReference,
        Metadata,
        FailureReason,
        CreatedAt,
        UpdatedAt,
    }
}
