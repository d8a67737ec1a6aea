#![deny(rust_2018_idioms)]

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
#[macro_use]
extern crate maplit;

mod assign;
mod config;
mod domain;
mod error;
mod pulls;
mod server;
mod store;
mod teams;
mod users;

use std::process;
use std::sync::Arc;

use chrono::Local;

use crate::assign::Picker;
use crate::server::Services;
use crate::store::PgStore;

fn main() {
    use std::io::Write;

    // init environment variables and logging
    dotenv::dotenv().ok();

    env_logger::Builder::new()
        .format(|buf, rec| {
            writeln!(
                buf,
                "[{} {}:{} {}] {}",
                rec.level(),
                rec.module_path().unwrap_or("<unnamed>"),
                rec.line().unwrap_or(0),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                rec.args()
            )
        })
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    debug!("Logging initialized.");

    let config = match config::init() {
        Ok(config) => config,
        Err(missing) => {
            error!(
                "Unable to start: missing or invalid configuration variables: {:?}",
                missing
            );
            process::exit(1);
        }
    };

    let store = match PgStore::connect(&config.db_url, config.db_pool_size)
        .and_then(|store| store.run_migrations().map(|_| store))
    {
        Ok(store) => Arc::new(store),
        Err(why) => {
            error!("Unable to prepare the database: {}", why);
            process::exit(1);
        }
    };

    info!("max reviewers per pull request: {}", config.max_reviewers);
    let services = Services::new(store, Picker::from_entropy(), config.max_reviewers);

    if let Err(why) = server::serve(&config, services) {
        error!("Server exited with an error: {}", why);
        process::exit(1);
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Mutex, Once, PoisonError};

    use log::{LevelFilter, Log, Metadata, Record};

    static RECORDS: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());
    static INSTALL: Once = Once::new();

    struct Capture;

    impl Log for Capture {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, rec: &Record<'_>) {
            RECORDS
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((rec.target().to_string(), rec.args().to_string()));
        }

        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture;

    /// Install the capturing logger. Called before any Rocket instance is
    /// built so Rocket's own logger never claims the global slot.
    pub fn init_logging() {
        INSTALL.call_once(|| {
            log::set_logger(&CAPTURE).unwrap();
            log::set_max_level(LevelFilter::Trace);
        });
    }

    #[test]
    fn crate_logs_carry_module_targets() {
        init_logging();
        info!("target check {}", 7);

        let records = RECORDS.lock().unwrap_or_else(PoisonError::into_inner);
        let (target, _) = records
            .iter()
            .find(|(_, msg)| msg == "target check 7")
            .unwrap();
        assert_eq!(target, "reviewbot::test");
    }
}
