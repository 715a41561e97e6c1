use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Engine, EngineError, ExpenseCmd, GroupDebts, MembershipRole, MoneyCents, SettlementCmd,
    ValidationError,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    for (username, name) in [
        ("alice", "Alice"),
        ("bob", "Bob"),
        ("carol", "Carol"),
        ("dave", "Dave"),
        ("eve", "Eve"),
    ] {
        engine.create_user(username, name).await.unwrap();
    }
    (engine, db)
}

/// A group owned by alice with the given extra members.
async fn group_with(engine: &Engine, members: &[&str]) -> String {
    let group_id = engine.create_group("Trip", "alice").await.unwrap();
    for member in members {
        engine.add_member(&group_id, member, "alice").await.unwrap();
    }
    group_id
}

fn money(raw: &str) -> MoneyCents {
    raw.parse().unwrap()
}

async fn balance_map(engine: &Engine, group_id: &str) -> HashMap<String, i64> {
    engine
        .group_balances(group_id)
        .await
        .unwrap()
        .balances
        .into_iter()
        .map(|b| (b.user_id, b.balance.cents()))
        .collect()
}

async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

fn debt_triples(debts: &GroupDebts) -> Vec<(&str, &str, i64)> {
    debts
        .debts
        .iter()
        .map(|d| (d.from_user.as_str(), d.to_user.as_str(), d.amount.cents()))
        .collect()
}

#[tokio::test]
async fn equal_split_between_three() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol"]).await;

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("30.00"), "Dinner", Utc::now())
                .split_equally(["alice", "bob", "carol"]),
        )
        .await
        .unwrap();

    let balances = engine.group_balances(&group_id).await.unwrap();
    let pairs: Vec<(&str, &str, i64)> = balances
        .balances
        .iter()
        .map(|b| (b.user_id.as_str(), b.user_name.as_str(), b.balance.cents()))
        .collect();
    assert_eq!(
        pairs,
        vec![("alice", "Alice", 2000), ("bob", "Bob", -1000), ("carol", "Carol", -1000)]
    );

    let debts = engine.group_debts(&group_id).await.unwrap();
    assert_eq!(debts.group_id, group_id);
    assert_eq!(
        debt_triples(&debts),
        vec![("bob", "alice", 1000), ("carol", "alice", 1000)]
    );
    assert_eq!(debts.debts[0].to_user_name, "Alice");
}

#[tokio::test]
async fn settlement_reduces_open_debt() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("20"), "Taxi", Utc::now())
                .split_exact([("alice", money("10")), ("bob", money("10"))]),
        )
        .await
        .unwrap();
    engine
        .create_settlement(SettlementCmd::new(
            &group_id,
            "bob",
            "bob",
            "alice",
            money("5"),
            Utc::now(),
        ))
        .await
        .unwrap();

    let balances = balance_map(&engine, &group_id).await;
    assert_eq!(balances["alice"], 500);
    assert_eq!(balances["bob"], -500);

    let debts = engine.group_debts(&group_id).await.unwrap();
    assert_eq!(debt_triples(&debts), vec![("bob", "alice", 500)]);
}

#[tokio::test]
async fn four_users_two_payers() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol", "dave"]).await;
    let everyone = ["alice", "bob", "carol", "dave"];

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("40"), "Hotel", Utc::now())
                .split_equally(everyone),
        )
        .await
        .unwrap();
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "bob", money("20"), "Fuel", Utc::now())
                .split_equally(everyone),
        )
        .await
        .unwrap();

    let balances = balance_map(&engine, &group_id).await;
    assert_eq!(balances["alice"], 2500);
    assert_eq!(balances["bob"], 500);
    assert_eq!(balances["carol"], -1500);
    assert_eq!(balances["dave"], -1500);

    let debts = engine.group_debts(&group_id).await.unwrap();
    assert!(debts.debts.len() <= 3);
    assert_eq!(
        debts.debts.iter().map(|d| d.amount).sum::<MoneyCents>(),
        money("30")
    );
    assert!(
        debts
            .debts
            .iter()
            .all(|d| d.from_user == "carol" || d.from_user == "dave")
    );
    assert_eq!(
        debt_triples(&debts),
        vec![("carol", "alice", 1500), ("dave", "alice", 1000), ("dave", "bob", 500)]
    );
}

#[tokio::test]
async fn share_sum_mismatch_persists_nothing() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    let err = engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("20"), "Taxi", Utc::now())
                .split_exact([("alice", money("10")), ("bob", money("9.50"))]),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::ShareSumMismatch {
            amount: money("20"),
            shares: money("19.50"),
        })
    );

    assert_eq!(count_rows(&db, "expenses").await, 0);
    assert_eq!(count_rows(&db, "expense_participants").await, 0);
    assert!(engine.group_balances(&group_id).await.unwrap().balances.is_empty());
}

#[tokio::test]
async fn one_cent_share_drift_is_absorbed_by_the_payer() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol"]).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let id = engine
            .create_expense(
                ExpenseCmd::new(&group_id, "alice", money("10"), "Snacks", Utc::now())
                    .split_exact([
                        ("alice", money("3.33")),
                        ("bob", money("3.33")),
                        ("carol", money("3.33")),
                    ]),
            )
            .await
            .unwrap();
        ids.push(id);
    }

    let expense = engine.expense(&group_id, ids[0], "alice").await.unwrap();
    let stored: Vec<(&str, i64)> = expense
        .participants
        .iter()
        .map(|p| (p.user_id.as_str(), p.share.cents()))
        .collect();
    assert_eq!(stored, vec![("alice", 334), ("bob", 333), ("carol", 333)]);

    let balances = balance_map(&engine, &group_id).await;
    assert_eq!(balances["alice"], 1998);
    assert_eq!(balances["bob"], -999);
    assert_eq!(balances["carol"], -999);
    assert_eq!(balances.values().sum::<i64>(), 0);

    let debts = engine.group_debts(&group_id).await.unwrap();
    assert_eq!(
        debt_triples(&debts),
        vec![("bob", "alice", 999), ("carol", "alice", 999)]
    );
}

#[tokio::test]
async fn drift_without_payer_share_goes_to_first_participant() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol"]).await;

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("5"), "Parking", Utc::now())
                .split_exact([("carol", money("2.51")), ("bob", money("2.50"))]),
        )
        .await
        .unwrap();

    let balances = balance_map(&engine, &group_id).await;
    assert_eq!(balances["alice"], 500);
    assert_eq!(balances["carol"], -250);
    assert_eq!(balances["bob"], -250);
}

#[tokio::test]
async fn exact_splits_keep_balances_and_debts_consistent() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol", "dave", "eve"]).await;
    let everyone = ["alice", "bob", "carol", "dave", "eve"];

    let mut state: u64 = 0x0123_4567_89ab_cdef;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for round in 0..40 {
        let payer = everyone[(next() % everyone.len() as u64) as usize];
        let amount = MoneyCents::new(1 + (next() % 20_000) as i64);
        let count = 1 + (next() % everyone.len() as u64) as usize;
        let mut shares: Vec<(&str, MoneyCents)> = everyone[..count]
            .iter()
            .copied()
            .zip(amount.split_even(count))
            .collect();
        // Nudge one share by a cent either way, as a hand-typed split would.
        let drift = (next() % 3) as i64 - 1;
        let idx = (next() % count as u64) as usize;
        if !(shares[idx].1 + MoneyCents::new(drift)).is_negative() {
            shares[idx].1 += MoneyCents::new(drift);
        }

        engine
            .create_expense(
                ExpenseCmd::new(&group_id, payer, amount, format!("round {round}"), Utc::now())
                    .split_exact(shares),
            )
            .await
            .unwrap();

        if round % 4 == 3 {
            let from = everyone[(next() % everyone.len() as u64) as usize];
            let to = everyone[(next() % everyone.len() as u64) as usize];
            if from != to {
                engine
                    .create_settlement(SettlementCmd::new(
                        &group_id,
                        from,
                        from,
                        to,
                        MoneyCents::new(1 + (next() % 5_000) as i64),
                        Utc::now(),
                    ))
                    .await
                    .unwrap();
            }
        }

        let balances = balance_map(&engine, &group_id).await;
        assert_eq!(balances.values().sum::<i64>(), 0, "round {round}");
    }

    let balances = balance_map(&engine, &group_id).await;
    let debts = engine.group_debts(&group_id).await.unwrap();
    let mut flows: HashMap<&str, i64> = HashMap::new();
    for debt in &debts.debts {
        *flows.entry(debt.to_user.as_str()).or_default() += debt.amount.cents();
        *flows.entry(debt.from_user.as_str()).or_default() -= debt.amount.cents();
    }
    for (user, balance) in &balances {
        let flow = flows.get(user.as_str()).copied().unwrap_or(0);
        assert!(
            (flow - balance).abs() <= 1,
            "{user}: balance {balance}, debts settle {flow}"
        );
    }
}

#[tokio::test]
async fn non_members_cannot_pay_or_participate() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    let err = engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("10"), "Lunch", Utc::now())
                .paid_by("dave")
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::PayerNotMember("dave".to_string()))
    );

    let err = engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("30"), "Lunch", Utc::now())
                .split_equally(["alice", "dave", "eve"]),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::ParticipantsNotMembers(vec![
            "dave".to_string(),
            "eve".to_string(),
        ]))
    );

    assert_eq!(count_rows(&db, "expenses").await, 0);
}

#[tokio::test]
async fn mutations_on_missing_group_are_validation_errors() {
    let (engine, _db) = engine_with_db().await;
    let missing = Uuid::new_v4().to_string();

    let err = engine
        .create_expense(
            ExpenseCmd::new(&missing, "alice", money("10"), "Lunch", Utc::now())
                .split_equally(["alice"]),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::GroupNotFound(missing.clone()))
    );

    let err = engine
        .create_settlement(SettlementCmd::new(
            &missing,
            "alice",
            "alice",
            "bob",
            money("1"),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::GroupNotFound(missing))
    );
}

#[tokio::test]
async fn outsiders_cannot_write_to_a_group() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    let err = engine
        .create_expense(
            ExpenseCmd::new(&group_id, "eve", money("10"), "Lunch", Utc::now())
                .split_equally(["eve"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn settlements_reject_self_and_outsiders() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    let err = engine
        .create_settlement(SettlementCmd::new(
            &group_id,
            "bob",
            "bob",
            "bob",
            money("5"),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::SelfSettlement("bob".to_string()))
    );

    let err = engine
        .create_settlement(SettlementCmd::new(
            &group_id,
            "bob",
            "bob",
            "carol",
            money("5"),
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::SettlementPartyNotMember(
            "carol".to_string()
        ))
    );

    let err = engine
        .create_settlement(SettlementCmd::new(
            &group_id,
            "bob",
            "bob",
            "alice",
            MoneyCents::ZERO,
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::NonPositiveAmount(MoneyCents::ZERO))
    );

    assert_eq!(count_rows(&db, "settlements").await, 0);
}

#[tokio::test]
async fn overpayment_flips_the_debt() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("10"), "Cinema", Utc::now())
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap();
    engine
        .create_settlement(
            SettlementCmd::new(&group_id, "bob", "bob", "alice", money("8"), Utc::now())
                .description("rounded up"),
        )
        .await
        .unwrap();

    let debts = engine.group_debts(&group_id).await.unwrap();
    assert_eq!(debt_triples(&debts), vec![("alice", "bob", 300)]);
}

#[tokio::test]
async fn unknown_group_yields_empty_results() {
    let (engine, _db) = engine_with_db().await;
    let missing = Uuid::new_v4().to_string();

    let balances = engine.group_balances(&missing).await.unwrap();
    assert_eq!(balances.group_id, missing);
    assert!(balances.balances.is_empty());
    assert!(engine.group_debts(&missing).await.unwrap().debts.is_empty());

    let fresh = group_with(&engine, &["bob"]).await;
    assert!(engine.group_balances(&fresh).await.unwrap().balances.is_empty());
}

#[tokio::test]
async fn reads_are_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol", "dave"]).await;
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "carol", money("17.35"), "Groceries", Utc::now())
                .split_equally(["alice", "bob", "carol", "dave"]),
        )
        .await
        .unwrap();

    assert_eq!(
        engine.group_balances(&group_id).await.unwrap(),
        engine.group_balances(&group_id).await.unwrap()
    );
    assert_eq!(
        engine.group_debts(&group_id).await.unwrap(),
        engine.group_debts(&group_id).await.unwrap()
    );
}

#[tokio::test]
async fn settling_every_suggested_debt_zeroes_the_group() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol", "dave", "eve"]).await;
    let everyone = ["alice", "bob", "carol", "dave", "eve"];

    let mut state: u64 = 0xdead_beef_cafe_f00d;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for round in 0..25 {
        let payer = everyone[(next() % everyone.len() as u64) as usize];
        let amount = MoneyCents::new(1 + (next() % 50_000) as i64);
        let count = 1 + (next() % everyone.len() as u64) as usize;
        engine
            .create_expense(
                ExpenseCmd::new(&group_id, payer, amount, format!("round {round}"), Utc::now())
                    .split_equally(everyone[..count].iter().copied()),
            )
            .await
            .unwrap();

        if round % 5 == 4 {
            let from = everyone[(next() % everyone.len() as u64) as usize];
            let to = everyone[(next() % everyone.len() as u64) as usize];
            if from != to {
                engine
                    .create_settlement(SettlementCmd::new(
                        &group_id,
                        from,
                        from,
                        to,
                        MoneyCents::new(1 + (next() % 10_000) as i64),
                        Utc::now(),
                    ))
                    .await
                    .unwrap();
            }
        }

        let balances = engine.group_balances(&group_id).await.unwrap();
        let total: MoneyCents = balances.balances.iter().map(|b| b.balance).sum();
        assert_eq!(total, MoneyCents::ZERO);
    }

    let balances = balance_map(&engine, &group_id).await;
    let debts = engine.group_debts(&group_id).await.unwrap();
    let non_zero = balances.values().filter(|b| b.abs() > 1).count();
    assert!(debts.debts.len() <= non_zero.saturating_sub(1));

    for debt in &debts.debts {
        assert_ne!(debt.from_user, debt.to_user);
        engine
            .settle_debt(&group_id, debt, "alice", Utc::now())
            .await
            .unwrap();
    }

    for (user, balance) in balance_map(&engine, &group_id).await {
        assert!(balance.abs() <= 1, "{user} left with {balance}");
    }
    assert!(engine.group_debts(&group_id).await.unwrap().debts.is_empty());
}

#[tokio::test]
async fn expense_detail_and_listing() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    let first = engine
        .create_expense(
            ExpenseCmd::new(
                &group_id,
                "alice",
                money("10"),
                "  Coffee ",
                Utc::now() - Duration::hours(1),
            )
                .split_equally(["bob", "alice"]),
        )
        .await
        .unwrap();
    let second = engine
        .create_expense(
            ExpenseCmd::new(&group_id, "bob", money("3"), "Water", Utc::now())
                .split_equally(["bob"]),
        )
        .await
        .unwrap();

    let expense = engine.expense(&group_id, first, "bob").await.unwrap();
    assert_eq!(expense.description, "Coffee");
    assert_eq!(expense.created_by, "alice");
    let shares: Vec<(&str, i64)> = expense
        .participants
        .iter()
        .map(|p| (p.user_id.as_str(), p.share.cents()))
        .collect();
    assert_eq!(shares, vec![("alice", 500), ("bob", 500)]);

    let listed: Vec<Uuid> = engine
        .list_expenses(&group_id, "alice")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(listed, vec![second, first]);

    let err = engine.expense(&group_id, first, "eve").await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn deleting_an_expense_removes_its_effect() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol"]).await;

    let expense_id = engine
        .create_expense(
            ExpenseCmd::new(&group_id, "bob", money("9"), "Bread", Utc::now())
                .split_equally(["alice", "bob", "carol"]),
        )
        .await
        .unwrap();

    let err = engine
        .delete_expense(&group_id, expense_id, "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // The owner may delete expenses recorded by others.
    engine
        .delete_expense(&group_id, expense_id, "alice")
        .await
        .unwrap();

    assert_eq!(count_rows(&db, "expense_participants").await, 0);
    assert!(engine.group_balances(&group_id).await.unwrap().balances.is_empty());

    let err = engine
        .delete_expense(&group_id, expense_id, "bob")
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("expense not exists".to_string()));
}

#[tokio::test]
async fn deleting_a_settlement_restores_the_debt() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("10"), "Pizza", Utc::now())
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap();
    let settlement_id = engine
        .create_settlement(SettlementCmd::new(
            &group_id,
            "bob",
            "bob",
            "alice",
            money("5"),
            Utc::now(),
        ))
        .await
        .unwrap();
    assert!(engine.group_debts(&group_id).await.unwrap().debts.is_empty());

    let listed = engine.list_settlements(&group_id, "alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].amount, money("5"));

    engine
        .delete_settlement(&group_id, settlement_id, "bob")
        .await
        .unwrap();
    let debts = engine.group_debts(&group_id).await.unwrap();
    assert_eq!(debt_triples(&debts), vec![("bob", "alice", 500)]);
}

#[tokio::test]
async fn members_with_open_balance_cannot_leave() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("10"), "Tickets", Utc::now())
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap();

    let err = engine
        .remove_member(&group_id, "bob", "alice")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::MemberHasBalance {
            user: "bob".to_string(),
            balance: money("-5"),
        })
    );

    let debts = engine.group_debts(&group_id).await.unwrap();
    engine
        .settle_debt(&group_id, &debts.debts[0], "bob", Utc::now())
        .await
        .unwrap();
    engine.remove_member(&group_id, "bob", "alice").await.unwrap();

    let members: Vec<String> = engine
        .list_members(&group_id, "alice")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    assert_eq!(members, vec!["alice".to_string()]);

    // History stays: bob still shows up with a settled balance.
    assert_eq!(balance_map(&engine, &group_id).await["bob"], 0);
}

#[tokio::test]
async fn owner_manages_membership() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["carol", "bob"]).await;

    let members = engine.list_members(&group_id, "bob").await.unwrap();
    let listed: Vec<(&str, &str, MembershipRole)> = members
        .iter()
        .map(|m| (m.user_id.as_str(), m.display_name.as_str(), m.role))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("alice", "Alice", MembershipRole::Owner),
            ("bob", "Bob", MembershipRole::Member),
            ("carol", "Carol", MembershipRole::Member),
        ]
    );

    assert!(matches!(
        engine.add_member(&group_id, "dave", "bob").await,
        Err(EngineError::Forbidden(_))
    ));
    assert_eq!(
        engine.add_member(&group_id, "bob", "alice").await,
        Err(EngineError::ExistingKey("bob".to_string()))
    );
    assert_eq!(
        engine.add_member(&group_id, "zoe", "alice").await,
        Err(EngineError::KeyNotFound("user not exists".to_string()))
    );
    assert!(matches!(
        engine.remove_member(&group_id, "alice", "alice").await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn groups_are_listed_per_member() {
    let (engine, _db) = engine_with_db().await;
    let trip = engine.create_group("Trip", "alice").await.unwrap();
    let flat = engine.create_group("  Flat   rent ", "bob").await.unwrap();
    engine.add_member(&flat, "alice", "bob").await.unwrap();

    let names: Vec<String> = engine
        .list_groups("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["Flat rent".to_string(), "Trip".to_string()]);
    assert_eq!(engine.list_groups("bob").await.unwrap().len(), 1);

    engine.rename_group(&trip, "Lisbon", "alice").await.unwrap();
    assert_eq!(engine.group(&trip, "alice").await.unwrap().name, "Lisbon");
    assert!(matches!(
        engine.rename_group(&flat, "Mine", "alice").await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn deleting_a_group_drops_its_ledger() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("10"), "Museum", Utc::now())
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap();
    engine
        .create_settlement(SettlementCmd::new(
            &group_id,
            "bob",
            "bob",
            "alice",
            money("2"),
            Utc::now(),
        ))
        .await
        .unwrap();

    assert!(matches!(
        engine.delete_group(&group_id, "bob").await,
        Err(EngineError::Forbidden(_))
    ));
    engine.delete_group(&group_id, "alice").await.unwrap();

    for table in [
        "groups",
        "group_memberships",
        "expenses",
        "expense_participants",
        "settlements",
    ] {
        assert_eq!(count_rows(&db, table).await, 0, "{table} not emptied");
    }
    assert!(engine.group_balances(&group_id).await.unwrap().balances.is_empty());
    assert_eq!(
        engine.group(&group_id, "alice").await,
        Err(EngineError::KeyNotFound("group not exists".to_string()))
    );
}

#[tokio::test]
async fn usernames_are_normalized() {
    let (engine, _db) = engine_with_db().await;

    assert_eq!(
        engine.create_user(" ALICE ", "Alice again").await,
        Err(EngineError::ExistingKey("alice".to_string()))
    );
    let id = engine.create_user("Frank", "  Frank  Zappa ").await.unwrap();
    assert_eq!(id, "frank");
    let user = engine.user("FRANK").await.unwrap();
    assert_eq!(user.display_name, "Frank Zappa");

    let group_id = engine.create_group("Band", "Frank").await.unwrap();
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "FRANK", money("4"), "Strings", Utc::now())
                .split_equally(["frank"]),
        )
        .await
        .unwrap();
    assert_eq!(balance_map(&engine, &group_id).await["frank"], 0);
}

#[tokio::test]
async fn balances_serialize_as_cents() {
    let (engine, _db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("1.50"), "Gum", Utc::now())
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap();

    let json = serde_json::to_value(engine.group_debts(&group_id).await.unwrap()).unwrap();
    assert_eq!(json["debts"][0]["amount"], 75);
    assert_eq!(json["debts"][0]["from_user_name"], "Bob");
}

#[tokio::test]
async fn settling_a_group_records_every_suggested_payment() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob", "carol", "dave"]).await;
    let everyone = ["alice", "bob", "carol", "dave"];

    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("40"), "Hotel", Utc::now())
                .split_equally(everyone),
        )
        .await
        .unwrap();
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "bob", money("20"), "Fuel", Utc::now())
                .split_equally(everyone),
        )
        .await
        .unwrap();

    let suggested = engine.group_debts(&group_id).await.unwrap().debts;
    let settled = engine
        .settle_group(&group_id, "carol", Utc::now())
        .await
        .unwrap();
    assert_eq!(settled, suggested);
    assert_eq!(count_rows(&db, "settlements").await, 3);

    assert!(balance_map(&engine, &group_id).await.values().all(|b| *b == 0));
    assert!(engine.group_debts(&group_id).await.unwrap().debts.is_empty());

    // Nothing left to settle: a second run records nothing.
    assert!(
        engine
            .settle_group(&group_id, "alice", Utc::now())
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(count_rows(&db, "settlements").await, 3);
}

#[tokio::test]
async fn settling_a_group_is_all_or_nothing_for_outsiders() {
    let (engine, db) = engine_with_db().await;
    let group_id = group_with(&engine, &["bob"]).await;
    engine
        .create_expense(
            ExpenseCmd::new(&group_id, "alice", money("10"), "Pizza", Utc::now())
                .split_equally(["alice", "bob"]),
        )
        .await
        .unwrap();

    assert!(matches!(
        engine.settle_group(&group_id, "eve", Utc::now()).await,
        Err(EngineError::Forbidden(_))
    ));
    let missing = Uuid::new_v4().to_string();
    assert_eq!(
        engine.settle_group(&missing, "alice", Utc::now()).await,
        Err(EngineError::Validation(ValidationError::GroupNotFound(
            missing.clone()
        )))
    );
    assert_eq!(count_rows(&db, "settlements").await, 0);
}
