//! Stress test: two registries over the same `tokens.json`.
//!
//! The second writer must be refused, leave the file untouched, and
//! succeed after reloading and re-applying its change.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

use aoc_runner::{
    AuthError, Config, HttpResponse, IdentityRecord, IdentityResolver, Registry, Result,
    Transport,
};

/// Transport for registries that never resolve anything.
struct Offline;

impl Transport for Offline {
    fn get(&self, _: &str, _: Option<&str>, _: bool) -> Result<HttpResponse> {
        Err(AuthError::Transport("offline".into()))
    }

    fn post(&self, _: &str, _: &str, _: &[(&str, &str)]) -> Result<HttpResponse> {
        Err(AuthError::Transport("offline".into()))
    }
}

fn open(config: &Config) -> Registry<Offline> {
    Registry::open(config, IdentityResolver::new(Offline, config)).expect("open registry")
}

/// Read the current file without the construction-time save of `open`.
fn load(config: &Config) -> Registry<Offline> {
    Registry::load(config, IdentityResolver::new(Offline, config)).expect("load registry")
}

fn user(source: &str, id: i64) -> IdentityRecord {
    IdentityRecord::new(
        format!("user-{id}"),
        id,
        source,
        aoc_runner::time::now(),
        format!("token-{id}"),
    )
    .unwrap()
}

/// Push the file's mtime well away from anything we wrote ourselves.
fn touch_later(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn second_writer_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());

    let mut first = open(&config);
    let mut second = load(&config);

    first.add_record(user("github", 1), false).unwrap();
    touch_later(&config.tokens_file(), 30);
    let on_disk = std::fs::read(config.tokens_file()).unwrap();

    let err = second.add_record(user("google", 2), false).unwrap_err();
    assert!(matches!(err, AuthError::ConcurrentModification(_)));
    assert_eq!(std::fs::read(config.tokens_file()).unwrap(), on_disk);
}

#[test]
fn reload_and_reapply_after_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());

    let mut first = open(&config);
    let mut second = load(&config);

    first.add_record(user("github", 1), false).unwrap();
    touch_later(&config.tokens_file(), 30);
    assert!(matches!(
        second.add_record(user("google", 2), false),
        Err(AuthError::ConcurrentModification(_))
    ));

    let mut reloaded = load(&config);
    reloaded.add_record(user("google", 2), false).unwrap();

    let keys: Vec<String> = reloaded.list_records().iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["github.1", "google.2"]);
    assert_eq!(reloaded.default_key(), Some("github.1"));
}

#[test]
fn every_mutation_checks_for_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());

    let mut registry = open(&config);
    registry.add_record(user("github", 1), false).unwrap();
    registry.add_record(user("reddit", 2), false).unwrap();

    let mut offset = 10;
    let mut conflict = |registry: &mut Registry<Offline>| {
        offset += 10;
        touch_later(registry.tokens_file(), offset);
    };

    conflict(&mut registry);
    assert!(matches!(
        registry.remove("reddit.2"),
        Err(AuthError::ConcurrentModification(_))
    ));

    let mut registry = load(&config);
    conflict(&mut registry);
    assert!(matches!(
        registry.set_default_by_key("reddit.2"),
        Err(AuthError::ConcurrentModification(_))
    ));

    let mut registry = load(&config);
    conflict(&mut registry);
    assert!(matches!(
        registry.update_credential("github.1", "fresh"),
        Err(AuthError::ConcurrentModification(_))
    ));

    let mut registry = load(&config);
    conflict(&mut registry);
    assert!(matches!(
        registry.save(),
        Err(AuthError::ConcurrentModification(_))
    ));
}

#[test]
fn deleted_file_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());

    let mut registry = open(&config);
    std::fs::remove_file(config.tokens_file()).unwrap();

    registry.add_record(user("twitter", 3), false).unwrap();
    assert!(config.tokens_file().exists());
}
