//! Initial schema.
//!
//! - `users`: login accounts, referenced by every ledger row
//! - `groups`: the unit expenses and settlements are scoped to
//! - `group_members` / `group_member_events`: membership state and its trail
//! - `expenses` / `expense_shares`: what was paid and who owes what
//! - `settlements`: direct payments between members
//!
//! Group-owned rows cascade with their group. User references on ledger rows
//! are set to NULL when the user is deleted so the amounts survive.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    Password,
}

#[derive(Iden)]
enum Groups {
    Table,
    Id,
    Name,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum GroupMembers {
    Table,
    Id,
    GroupId,
    UserId,
    JoinedAt,
    State,
    StateChangedAt,
}

#[derive(Iden)]
enum GroupMemberEvents {
    Table,
    Id,
    MemberId,
    Kind,
    At,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    GroupId,
    AmountMinor,
    Description,
    PaidBy,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(Iden)]
enum ExpenseShares {
    Table,
    Id,
    ExpenseId,
    UserId,
    AmountOwedMinor,
    UpdatedAt,
    Version,
}

#[derive(Iden)]
enum Settlements {
    Table,
    Id,
    GroupId,
    PayerId,
    PayeeId,
    AmountMinor,
    SettledAt,
}

fn id_column<T: IntoIden>(name: T) -> ColumnDef {
    ColumnDef::new(name)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(id_column(Users::Id))
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(id_column(Groups::Id))
                    .col(ColumnDef::new(Groups::Name).string().not_null())
                    .col(ColumnDef::new(Groups::CreatedBy).big_integer())
                    .col(ColumnDef::new(Groups::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-groups-created_by")
                            .from(Groups::Table, Groups::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Memberships are soft-deleted through `state`; the row only goes
        // away with its group or its user.
        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(id_column(GroupMembers::Id))
                    .col(ColumnDef::new(GroupMembers::GroupId).big_integer().not_null())
                    .col(ColumnDef::new(GroupMembers::UserId).big_integer().not_null())
                    .col(ColumnDef::new(GroupMembers::JoinedAt).timestamp().not_null())
                    .col(ColumnDef::new(GroupMembers::State).string().not_null())
                    .col(
                        ColumnDef::new(GroupMembers::StateChangedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-group_id")
                            .from(GroupMembers::Table, GroupMembers::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_members-user_id")
                            .from(GroupMembers::Table, GroupMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-group_members-group_id-user_id-unique")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::GroupId)
                    .col(GroupMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMemberEvents::Table)
                    .if_not_exists()
                    .col(id_column(GroupMemberEvents::Id))
                    .col(
                        ColumnDef::new(GroupMemberEvents::MemberId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupMemberEvents::Kind).string().not_null())
                    .col(ColumnDef::new(GroupMemberEvents::At).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-group_member_events-member_id")
                            .from(GroupMemberEvents::Table, GroupMemberEvents::MemberId)
                            .to(GroupMembers::Table, GroupMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(id_column(Expenses::Id))
                    .col(ColumnDef::new(Expenses::GroupId).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(ColumnDef::new(Expenses::PaidBy).big_integer())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::UpdatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Expenses::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .check(Expr::col(Expenses::AmountMinor).gt(0))
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
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-group_id")
                    .table(Expenses::Table)
                    .col(Expenses::GroupId)
                    .to_owned(),
            )
            .await?;

        // A share is meaningless without its user, so it cascades.
        manager
            .create_table(
                Table::create()
                    .table(ExpenseShares::Table)
                    .if_not_exists()
                    .col(id_column(ExpenseShares::Id))
                    .col(
                        ColumnDef::new(ExpenseShares::ExpenseId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseShares::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ExpenseShares::AmountOwedMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseShares::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseShares::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .check(Expr::col(ExpenseShares::AmountOwedMinor).gt(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_shares-expense_id")
                            .from(ExpenseShares::Table, ExpenseShares::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_shares-user_id")
                            .from(ExpenseShares::Table, ExpenseShares::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expense_shares-expense_id-user_id-unique")
                    .table(ExpenseShares::Table)
                    .col(ExpenseShares::ExpenseId)
                    .col(ExpenseShares::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Settlements::Table)
                    .if_not_exists()
                    .col(id_column(Settlements::Id))
                    .col(ColumnDef::new(Settlements::GroupId).big_integer().not_null())
                    .col(ColumnDef::new(Settlements::PayerId).big_integer())
                    .col(ColumnDef::new(Settlements::PayeeId).big_integer())
                    .col(
                        ColumnDef::new(Settlements::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Settlements::SettledAt).timestamp().not_null())
                    .check(Expr::col(Settlements::AmountMinor).gt(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-group_id")
                            .from(Settlements::Table, Settlements::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-payer_id")
                            .from(Settlements::Table, Settlements::PayerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-settlements-payee_id")
                            .from(Settlements::Table, Settlements::PayeeId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-settlements-group_id-settled_at")
                    .table(Settlements::Table)
                    .col(Settlements::GroupId)
                    .col(Settlements::SettledAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Settlements::Table.into_iden(),
            ExpenseShares::Table.into_iden(),
            Expenses::Table.into_iden(),
            GroupMemberEvents::Table.into_iden(),
            GroupMembers::Table.into_iden(),
            Groups::Table.into_iden(),
            Users::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
