//! Tracker server command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use anyhow::Error;

use garde::Validate;

use hearthstone_tracker_model::Rank;

use sqlx::{Connection as _, SqliteConnection, sqlite::SqliteConnectOptions};

use crate::{
    auth::hash_password,
    user::{self, NewUser},
};

/// The command line arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// The command to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operational commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "create-user")]
    CreateUser(CreateUser),
    #[command(name = "set-rank")]
    SetRank(SetRank),
    #[command(name = "generate-key")]
    GenerateKey(GenerateKey),
}

/// Creates a user that can sign in to the tracker.
#[derive(clap::Args, Debug, Validate)]
pub struct CreateUser {
    /// The name shown on the tracker.
    #[arg(long)]
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    /// The email the user signs in with.
    #[arg(long)]
    #[garde(email)]
    pub email: String,
    /// The user's password.
    #[arg(long)]
    #[garde(length(min = 8))]
    pub password: String,
    /// The user's starting rank.
    #[arg(long)]
    #[garde(skip)]
    pub rank: Option<Rank>,
}

/// Sets or clears the rank of a user.
#[derive(clap::Args, Debug)]
pub struct SetRank {
    /// The email of the user.
    pub email: String,
    /// The new rank. Leave out to make the user unranked.
    pub rank: Option<Rank>,
}

/// Generates a cookie encryption key.
#[derive(clap::Args, Debug)]
pub struct GenerateKey;

/// Creates a user.
pub async fn create_user(
    command: &CreateUser,
    bcrypt_cost: u32,
    conn: &mut SqliteConnection,
) -> Result<i32, Error> {
    command.validate()?;

    let password_hash = hash_password(command.password.as_str(), bcrypt_cost).await?;

    let id = user::create_user(
        &NewUser {
            name: &command.name,
            email: &command.email,
            password_hash: &password_hash,
            rank: command.rank,
        },
        conn,
    )
    .await?;

    Ok(id)
}

/// Opens a connection for a command, bringing the database up to date
/// first.
pub async fn connect(options: &SqliteConnectOptions) -> Result<SqliteConnection, Error> {
    let mut conn = SqliteConnection::connect_with(options).await?;
    sqlx::migrate!().run(&mut conn).await?;
    Ok(conn)
}

/// Sets the rank of a user.
pub async fn set_rank(command: &SetRank, conn: &mut SqliteConnection) -> Result<i32, Error> {
    user::set_rank_by_email(&command.email, command.rank, conn)
        .await?
        .ok_or_else(|| Error::msg(format!("no user with email {}", command.email)))
}
