//! Reconciliation driver.
//!
//! # Responsibility
//! - Wire the core pipeline to the current directory: logging, config,
//!   index connection, one reconciliation run.
//! - Stay silent on a clean run; point at the manifest otherwise.

use log::error;
use plainorg_core::logging::{default_log_level, init_logging};
use plainorg_core::{
    manifest_path, open_db, reconcile, Config, ConfigIdentityGenerator, ReconcileContext, DB_FILE,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(err) => {
            eprintln!("plainorg: cannot resolve working directory: {err}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = init_logging(default_log_level(), &root.join("_logs")) {
        eprintln!("plainorg: {err}");
        return ExitCode::from(2);
    }

    let config = match Config::load_or_create(&root) {
        Ok(config) => config,
        Err(err) => {
            error!("event=run module=cli status=error error={err}");
            eprintln!("plainorg: {err}");
            return ExitCode::from(2);
        }
    };

    let conn = match open_db(root.join(DB_FILE)) {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=run module=cli status=error error={err}");
            eprintln!("plainorg: cannot open index: {err}");
            return ExitCode::from(2);
        }
    };

    let ctx = ReconcileContext::new(&root, config.clone());
    let mut generator = ConfigIdentityGenerator::new(&root, config);

    match reconcile(&conn, &ctx, &mut generator) {
        Ok(outcome) if outcome.is_clean() => ExitCode::SUCCESS,
        Ok(outcome) => {
            eprintln!(
                "plainorg: {} entity error(s); see {}",
                outcome.failures.len(),
                manifest_path(&root).display()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("event=run module=cli status=fatal error={err}");
            eprintln!("plainorg: reconciliation aborted: {err}");
            ExitCode::from(2)
        }
    }
}
