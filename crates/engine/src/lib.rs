//! Shared-expense ledger engine.
//!
//! Users form groups, log expenses with per-participant shares and record
//! settlements. From those facts the engine derives:
//!
//! - one net balance per user ([`Engine::group_balances`]), and
//! - a short list of suggested payments that settles the group
//!   ([`Engine::group_debts`]).
//!
//! Both are recomputed from the stored facts on every call. The pure parts
//! live in [`balances`] and [`debts`] and can be used without a database.

pub use balances::{GroupBalances, LedgerFacts, UserBalance};
pub use commands::{ExpenseCmd, SettlementCmd, Split};
pub use debts::{Debt, GroupDebts, minimize_debts};
pub use error::{EngineError, ValidationError};
pub use expenses::{Expense, ExpenseShare};
pub use group_memberships::MembershipRole;
pub use groups::Group;
pub use money::{MoneyCents, SETTLE_EPSILON};
pub use ops::{Engine, EngineBuilder, GroupMember};
pub use settlements::Settlement;
pub use users::User;

pub mod balances;
mod commands;
pub mod debts;
mod error;
mod expense_participants;
mod expenses;
mod group_memberships;
mod groups;
mod money;
mod ops;
mod settlements;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
