//! Promotes an existing user to admin.
//!
//! Usage: `make_admin <username>`

use curator::{create_db_pool, init_tracing, Actor, Catalog, Config, PgStore, Role, Store};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> ExitCode {
    let config = Config::from_env();
    init_tracing(&config);

    let Some(username) = std::env::args().nth(1) else {
        eprintln!("usage: make_admin <username>");
        return ExitCode::from(2);
    };

    let pool = match create_db_pool(&config) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Could not connect to database");
            return ExitCode::FAILURE;
        }
    };
    let store = PgStore::new(pool);
    if let Err(e) = store.migrate() {
        error!(error = %e, "Could not apply migrations");
        return ExitCode::FAILURE;
    }

    let catalog = Catalog::new(Arc::new(store));
    let user = match catalog.store().find_user_by_username(&username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            error!(username = %username, "No such user");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "User lookup failed");
            return ExitCode::FAILURE;
        }
    };

    match catalog.set_user_role(&Actor::System, user.id, Role::Admin) {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "User is now an admin");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Promotion failed");
            ExitCode::FAILURE
        }
    }
}
