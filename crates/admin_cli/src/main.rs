use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use ledger::{Ledger, users};
use migration::MigratorTrait;
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set};

#[derive(Parser, Debug)]
#[command(name = "splitledger_admin")]
#[command(about = "Admin utilities for SplitLedger (bootstrap users, groups and members)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./splitledger.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Group(Group),
    Member(Member),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create(GroupCreateArgs),
}

#[derive(Args, Debug)]
struct GroupCreateArgs {
    /// Username of the creator, who joins the group.
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct Member {
    #[command(subcommand)]
    command: MemberCommand,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    Add(MemberArgs),
    Remove(MemberArgs),
    Reinstate(MemberArgs),
}

#[derive(Args, Debug)]
struct MemberArgs {
    #[arg(long)]
    group: i64,
    /// Username of the member.
    #[arg(long)]
    user: String,
    /// Username of an active member performing the change.
    #[arg(long = "as")]
    acting: String,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn find_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<users::Model>, Box<dyn Error + Send + Sync>> {
    Ok(users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?)
}

async fn require_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<users::Model, Box<dyn Error + Send + Sync>> {
    match find_user(db, username).await? {
        Some(user) => Ok(user),
        None => {
            eprintln!("user not found: {username}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            if find_user(&db, &args.username).await?.is_some() {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let password = prompt_password_twice()?;
            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password: Set(password),
                ..Default::default()
            };
            let created = users::Entity::insert(user).exec(&db).await?;

            println!("created user: {} ({})", args.username, created.last_insert_id);
        }
        Command::Group(Group {
            command: GroupCommand::Create(args),
        }) => {
            let owner = require_user(&db, &args.owner).await?;

            let ledger = Ledger::builder().database(db.clone()).build().await?;
            let group = ledger.create_group(&args.name, owner.id).await?;
            println!("created group: {} ({})", group.name, group.id);
        }
        Command::Member(Member { command }) => {
            let (args, verb) = match &command {
                MemberCommand::Add(args) => (args, "added"),
                MemberCommand::Remove(args) => (args, "removed"),
                MemberCommand::Reinstate(args) => (args, "reinstated"),
            };
            let member = require_user(&db, &args.user).await?;
            let acting = require_user(&db, &args.acting).await?;

            let ledger = Ledger::builder().database(db.clone()).build().await?;
            let result = match &command {
                MemberCommand::Add(_) => ledger.add_member(args.group, member.id, acting.id).await,
                MemberCommand::Remove(_) => {
                    ledger
                        .remove_member(args.group, member.id, acting.id)
                        .await
                }
                MemberCommand::Reinstate(_) => {
                    ledger
                        .reinstate_member(args.group, member.id, acting.id)
                        .await
                }
            };
            match result {
                Ok(_) => println!("{verb} {} in group {}", args.user, args.group),
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
