//! Initial schema.
//!
//! - `users`: people that can join groups, keyed by username
//! - `groups`: named collections of users sharing expenses
//! - `group_memberships`: who belongs to which group, and with which role
//! - `expenses`: money paid by one member on behalf of others
//! - `expense_participants`: per-participant share of an expense
//! - `settlements`: out-of-band payments between two members

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Username,
    DisplayName,
    CreatedAt,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
    Owner,
    CreatedAt,
}

#[derive(Iden)]
enum GroupMemberships {
    Table,
    GroupId,
    UserId,
    Role,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    GroupId,
    PaidBy,
    AmountMinor,
    Description,
    OccurredAt,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum ExpenseParticipants {
    Table,
    ExpenseId,
    UserId,
    ShareMinor,
}

#[derive(Iden)]
enum Settlements {
    Table,
    Id,
    GroupId,
    FromUser,
    ToUser,
    AmountMinor,
    Description,
    OccurredAt,
    CreatedBy,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string().not_null())
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Groups
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::Owner).string().not_null())
                    .col(ColumnDef::new(Groups::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-groups-owner")
                            .from(Groups::Table, Groups::Owner)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Group memberships
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(GroupMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMemberships::GroupId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupMemberships::UserId).string().not_null())
                    .col(ColumnDef::new(GroupMemberships::Role).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(GroupMemberships::GroupId)
                            .col(GroupMemberships::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_memberships-group_id")
                            .from(GroupMemberships::Table, GroupMemberships::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_memberships-user_id")
                            .from(GroupMemberships::Table, GroupMemberships::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::GroupId).string().not_null())
                    .col(ColumnDef::new(Expenses::PaidBy).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(ColumnDef::new(Expenses::OccurredAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-group_id")
                            .from(Expenses::Table, Expenses::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-paid_by")
                            .from(Expenses::Table, Expenses::PaidBy)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Expense participants
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ExpenseParticipants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseParticipants::ExpenseId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseParticipants::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseParticipants::ShareMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ExpenseParticipants::ExpenseId)
                            .col(ExpenseParticipants::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_participants-expense_id")
                            .from(ExpenseParticipants::Table, ExpenseParticipants::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_participants-user_id")
                            .from(ExpenseParticipants::Table, ExpenseParticipants::UserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Settlements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settlements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settlements::GroupId).string().not_null())
                    .col(ColumnDef::new(Settlements::FromUser).string().not_null())
                    .col(ColumnDef::new(Settlements::ToUser).string().not_null())
                    .col(
                        ColumnDef::new(Settlements::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::Description).string())
                    .col(
                        ColumnDef::new(Settlements::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Settlements::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-group_id")
                            .from(Settlements::Table, Settlements::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-from_user")
                            .from(Settlements::Table, Settlements::FromUser)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-to_user")
                            .from(Settlements::Table, Settlements::ToUser)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse creation order (FK dependencies).
        manager
            .drop_table(Table::drop().table(Settlements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseParticipants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
