//! Lookup indexes for the per-group ledger reads.
//!
//! Balances are recomputed from scratch on every request, so every read is a
//! full scan of one group's expenses, shares and settlements.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum GroupMemberships {
    Table,
    UserId,
}

#[derive(Iden)]
enum Expenses {
    Table,
    GroupId,
    OccurredAt,
}

#[derive(Iden)]
enum ExpenseParticipants {
    Table,
    UserId,
}

#[derive(Iden)]
enum Settlements {
    Table,
    GroupId,
    OccurredAt,
}

const IDX_MEMBERSHIPS_USER: &str = "idx-group_memberships-user_id";
const IDX_EXPENSES_GROUP: &str = "idx-expenses-group_id-occurred_at";
const IDX_PARTICIPANTS_USER: &str = "idx-expense_participants-user_id";
const IDX_SETTLEMENTS_GROUP: &str = "idx-settlements-group_id-occurred_at";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name(IDX_MEMBERSHIPS_USER)
                    .table(GroupMemberships::Table)
                    .col(GroupMemberships::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_EXPENSES_GROUP)
                    .table(Expenses::Table)
                    .col(Expenses::GroupId)
                    .col(Expenses::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_PARTICIPANTS_USER)
                    .table(ExpenseParticipants::Table)
                    .col(ExpenseParticipants::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_SETTLEMENTS_GROUP)
                    .table(Settlements::Table)
                    .col(Settlements::GroupId)
                    .col(Settlements::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, table) in [
            (IDX_SETTLEMENTS_GROUP, Settlements::Table.to_string()),
            (IDX_PARTICIPANTS_USER, ExpenseParticipants::Table.to_string()),
            (IDX_EXPENSES_GROUP, Expenses::Table.to_string()),
            (IDX_MEMBERSHIPS_USER, GroupMemberships::Table.to_string()),
        ] {
            manager
                .drop_index(Index::drop().name(name).table(Alias::new(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}
