use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub db_url: String,
    pub db_pool_size: u32,
    pub admin_token: String,
    pub max_reviewers: usize,
    pub address: String,
    pub port: u16,
}

const DB_URL: &str = "DATABASE_URL";
const DB_POOL_SIZE: &str = "DB_POOL_SIZE";
const ADMIN_TOKEN: &str = "ADMIN_TOKEN";
const MAX_REVIEWERS: &str = "MAX_REVIEWERS";
const APP_ADDRESS: &str = "APP_ADDRESS";
const APP_PORT: &str = "APP_PORT";

const DEFAULT_POOL_SIZE: u32 = 5;
const DEFAULT_MAX_REVIEWERS: usize = 2;
const DEFAULT_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Read the configuration from the process environment.
///
/// On failure, returns the names of every variable that was missing or
/// couldn't be parsed so they can all be reported at once.
pub fn init() -> Result<Config, Vec<&'static str>> {
    init_from(|key| env::var(key).ok())
}

fn init_from<F>(lookup: F) -> Result<Config, Vec<&'static str>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut required: BTreeMap<&'static str, Option<String>> = BTreeMap::new();
    for var in vec![DB_URL, ADMIN_TOKEN] {
        required.insert(var, lookup(var).filter(|v| !v.trim().is_empty()));
    }

    let mut bad = required
        .iter()
        .filter(|&(_, v)| v.is_none())
        .map(|(&k, _)| k)
        .collect::<Vec<_>>();

    let db_pool_size = parse_or(&lookup, DB_POOL_SIZE, DEFAULT_POOL_SIZE, &mut bad);
    let max_reviewers = parse_or(&lookup, MAX_REVIEWERS, DEFAULT_MAX_REVIEWERS, &mut bad);
    let port = parse_or(&lookup, APP_PORT, DEFAULT_PORT, &mut bad);
    let address = lookup(APP_ADDRESS).unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    if !bad.is_empty() {
        return Err(bad);
    }

    let mut take = |key: &'static str| required.remove(&key).flatten().unwrap_or_default();

    Ok(Config {
        db_url: take(DB_URL),
        admin_token: take(ADMIN_TOKEN),
        db_pool_size,
        max_reviewers,
        address,
        port,
    })
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T, bad: &mut Vec<&'static str>) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                bad.push(key);
                default
            }
        },
    }
}
