use std::error::Error;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{Engine, ExpenseCmd, MoneyCents, SettlementCmd};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use serde::Serialize;
use uuid::Uuid;

mod settings;

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "splitledger")]
#[command(about = "Shared-expense ledger: record expenses, see who owes whom")]
struct Cli {
    /// Settings file (TOML). Defaults to `splitledger.toml` when present.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Database connection string; overrides the settings file.
    #[arg(long, global = true, env = "SPLITLEDGER_DATABASE_URL")]
    database_url: Option<String>,

    /// Username acting on the ledger.
    #[arg(long = "as", global = true, env = "SPLITLEDGER_USER")]
    acting_user: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply or inspect database migrations.
    #[command(subcommand)]
    Db(DbCommand),
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Group(GroupCommand),
    #[command(subcommand)]
    Expense(ExpenseCommand),
    #[command(subcommand)]
    Settle(SettleCommand),
    /// Net balance of every user in a group.
    Balances(GroupArg),
    /// Suggested payments that settle a group.
    Debts(GroupArg),
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    Up,
    Down,
    Fresh,
    Status,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    /// Display name; defaults to the username.
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args, Debug)]
struct GroupArg {
    #[arg(long)]
    group: String,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    List,
    Members(GroupArg),
    AddMember(MemberArgs),
    RemoveMember(MemberArgs),
    Rename {
        #[arg(long)]
        group: String,
        #[arg(long)]
        name: String,
    },
    Delete(GroupArg),
}

#[derive(Args, Debug)]
struct MemberArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    user: String,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Add(ExpenseAddArgs),
    List(GroupArg),
    Delete(RecordArgs),
}

#[derive(Args, Debug)]
struct ExpenseAddArgs {
    #[arg(long)]
    group: String,
    #[arg(long, value_parser = parse_amount)]
    amount: MoneyCents,
    #[arg(long)]
    description: String,
    /// Payer; defaults to the acting user.
    #[arg(long)]
    paid_by: Option<String>,
    /// Participant of an equal split (repeatable).
    #[arg(long = "split", conflicts_with = "shares")]
    split: Vec<String>,
    /// Exact share as `user=amount` (repeatable).
    #[arg(long = "share", value_parser = parse_share)]
    shares: Vec<(String, MoneyCents)>,
    /// When it happened (RFC 3339); defaults to now.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct RecordArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    id: Uuid,
}

#[derive(Subcommand, Debug)]
enum SettleCommand {
    Add(SettleAddArgs),
    List(GroupArg),
    Delete(RecordArgs),
    /// Record every suggested payment of the group as settled, all or nothing.
    All(GroupArg),
}

#[derive(Args, Debug)]
struct SettleAddArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long, value_parser = parse_amount)]
    amount: MoneyCents,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

fn parse_amount(raw: &str) -> Result<MoneyCents, String> {
    raw.parse::<MoneyCents>().map_err(|err| err.to_string())
}

fn parse_share(raw: &str) -> Result<(String, MoneyCents), String> {
    let (user, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected user=amount, got {raw}"))?;
    Ok((user.trim().to_string(), parse_amount(amount)?))
}

struct Output {
    json: bool,
}

impl Output {
    /// Prints `value` as JSON, or the human lines otherwise.
    fn emit<T: Serialize>(&self, value: &T, lines: Vec<String>) -> CliResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in lines {
                println!("{line}");
            }
        }
        Ok(())
    }
}

fn acting_user(cli: &Cli) -> CliResult<String> {
    cli.acting_user
        .clone()
        .ok_or_else(|| "missing acting user: pass --as or set SPLITLEDGER_USER".into())
}

async fn connect_db(database_url: &str) -> CliResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    Ok(db)
}

async fn run_db(db: &DatabaseConnection, command: &DbCommand) -> CliResult<()> {
    match command {
        DbCommand::Up => migration::Migrator::up(db, None).await?,
        DbCommand::Down => migration::Migrator::down(db, None).await?,
        DbCommand::Fresh => migration::Migrator::fresh(db).await?,
        DbCommand::Status => migration::Migrator::status(db).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitledger={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    tracing::debug!(%database_url, "connecting");
    let db = connect_db(&database_url).await?;

    if let Command::Db(command) = &cli.command {
        return run_db(&db, command).await;
    }

    migration::Migrator::up(&db, None).await?;
    let engine = Engine::builder().database(db).build().await?;
    let out = Output { json: cli.json };

    match &cli.command {
        Command::Db(_) => {}
        Command::User(UserCommand::Create(args)) => {
            let display_name = args.name.as_deref().unwrap_or(&args.username);
            let username = engine.create_user(&args.username, display_name).await?;
            println!("created user: {username}");
        }
        Command::Group(command) => run_group(&engine, &cli, command, &out).await?,
        Command::Expense(command) => run_expense(&engine, &cli, command, &out).await?,
        Command::Settle(command) => run_settle(&engine, &cli, command, &out).await?,
        Command::Balances(args) => {
            let balances = engine.group_balances(&args.group).await?;
            let lines = balances
                .balances
                .iter()
                .map(|b| format!("{:<20} {:>12}", b.user_name, b.balance.to_string()))
                .collect();
            out.emit(&balances, lines)?;
        }
        Command::Debts(args) => {
            let debts = engine.group_debts(&args.group).await?;
            let lines = if debts.debts.is_empty() {
                vec!["all settled".to_string()]
            } else {
                debts
                    .debts
                    .iter()
                    .map(|d| format!("{} -> {}: {}", d.from_user_name, d.to_user_name, d.amount))
                    .collect()
            };
            out.emit(&debts, lines)?;
        }
    }

    Ok(())
}

async fn run_group(
    engine: &Engine,
    cli: &Cli,
    command: &GroupCommand,
    out: &Output,
) -> CliResult<()> {
    let user = acting_user(cli)?;
    match command {
        GroupCommand::Create { name } => {
            let group_id = engine.create_group(name, &user).await?;
            println!("created group: {name} ({group_id})");
        }
        GroupCommand::List => {
            let groups = engine.list_groups(&user).await?;
            let lines = groups
                .iter()
                .map(|g| format!("{}  {} (owner {})", g.id, g.name, g.owner))
                .collect();
            out.emit(&groups, lines)?;
        }
        GroupCommand::Members(args) => {
            let members = engine.list_members(&args.group, &user).await?;
            let lines = members
                .iter()
                .map(|m| format!("{:<20} {:<20} {}", m.user_id, m.display_name, m.role.as_str()))
                .collect();
            out.emit(&members, lines)?;
        }
        GroupCommand::AddMember(args) => {
            engine.add_member(&args.group, &args.user, &user).await?;
            println!("added {} to {}", args.user, args.group);
        }
        GroupCommand::RemoveMember(args) => {
            engine.remove_member(&args.group, &args.user, &user).await?;
            println!("removed {} from {}", args.user, args.group);
        }
        GroupCommand::Rename { group, name } => {
            engine.rename_group(group, name, &user).await?;
            println!("renamed {group} to {name}");
        }
        GroupCommand::Delete(args) => {
            engine.delete_group(&args.group, &user).await?;
            println!("deleted group {}", args.group);
        }
    }
    Ok(())
}

async fn run_expense(
    engine: &Engine,
    cli: &Cli,
    command: &ExpenseCommand,
    out: &Output,
) -> CliResult<()> {
    let user = acting_user(cli)?;
    match command {
        ExpenseCommand::Add(args) => {
            let mut cmd = ExpenseCmd::new(
                &args.group,
                &user,
                args.amount,
                &args.description,
                args.at.unwrap_or_else(Utc::now),
            );
            if let Some(payer) = &args.paid_by {
                cmd = cmd.paid_by(payer);
            }
            cmd = if args.shares.is_empty() {
                cmd.split_equally(args.split.iter().map(String::as_str))
            } else {
                cmd.split_exact(args.shares.iter().cloned())
            };
            let expense_id = engine.create_expense(cmd).await?;
            println!("created expense: {expense_id}");
        }
        ExpenseCommand::List(args) => {
            let expenses = engine.list_expenses(&args.group, &user).await?;
            let lines = expenses
                .iter()
                .map(|e| {
                    let shares = e
                        .participants
                        .iter()
                        .map(|p| format!("{} {}", p.user_id, p.share))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "{}  {}  {} paid {} for {} [{}]",
                        e.id,
                        e.occurred_at.format("%Y-%m-%d"),
                        e.paid_by,
                        e.amount,
                        e.description,
                        shares
                    )
                })
                .collect();
            out.emit(&expenses, lines)?;
        }
        ExpenseCommand::Delete(args) => {
            engine.delete_expense(&args.group, args.id, &user).await?;
            println!("deleted expense {}", args.id);
        }
    }
    Ok(())
}

async fn run_settle(
    engine: &Engine,
    cli: &Cli,
    command: &SettleCommand,
    out: &Output,
) -> CliResult<()> {
    let user = acting_user(cli)?;
    match command {
        SettleCommand::Add(args) => {
            let mut cmd = SettlementCmd::new(
                &args.group,
                &user,
                &args.from,
                &args.to,
                args.amount,
                args.at.unwrap_or_else(Utc::now),
            );
            if let Some(description) = &args.description {
                cmd = cmd.description(description);
            }
            let settlement_id = engine.create_settlement(cmd).await?;
            println!("created settlement: {settlement_id}");
        }
        SettleCommand::List(args) => {
            let settlements = engine.list_settlements(&args.group, &user).await?;
            let lines = settlements
                .iter()
                .map(|s| {
                    format!(
                        "{}  {}  {} -> {}: {}{}",
                        s.id,
                        s.occurred_at.format("%Y-%m-%d"),
                        s.from_user,
                        s.to_user,
                        s.amount,
                        s.description
                            .as_deref()
                            .map(|d| format!(" ({d})"))
                            .unwrap_or_default()
                    )
                })
                .collect();
            out.emit(&settlements, lines)?;
        }
        SettleCommand::Delete(args) => {
            engine.delete_settlement(&args.group, args.id, &user).await?;
            println!("deleted settlement {}", args.id);
        }
        SettleCommand::All(args) => {
            let settled = engine.settle_group(&args.group, &user, Utc::now()).await?;
            let lines = if settled.is_empty() {
                vec!["all settled".to_string()]
            } else {
                settled
                    .iter()
                    .map(|d| format!("{} -> {}: {} settled", d.from_user, d.to_user, d.amount))
                    .collect()
            };
            out.emit(&settled, lines)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_arguments_split_on_equals() {
        assert_eq!(
            parse_share("bob=12,50"),
            Ok(("bob".to_string(), MoneyCents::new(1250)))
        );
        assert!(parse_share("bob").is_err());
        assert!(parse_share("bob=1.234").is_err());
    }

    #[test]
    fn expense_add_accepts_equal_or_exact_split() {
        let cli = Cli::try_parse_from([
            "splitledger",
            "--as",
            "alice",
            "expense",
            "add",
            "--group",
            "g",
            "--amount",
            "30",
            "--description",
            "dinner",
            "--split",
            "alice",
            "--split",
            "bob",
        ])
        .unwrap();
        let Command::Expense(ExpenseCommand::Add(args)) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(args.amount, MoneyCents::new(3000));
        assert_eq!(args.split, vec!["alice".to_string(), "bob".to_string()]);

        let conflicting = Cli::try_parse_from([
            "splitledger",
            "expense",
            "add",
            "--group",
            "g",
            "--amount",
            "30",
            "--description",
            "dinner",
            "--split",
            "alice",
            "--share",
            "alice=30",
        ]);
        assert!(conflicting.is_err());
    }
}
