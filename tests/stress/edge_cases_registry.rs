//! Edge case tests for the registry: many users, key uniqueness,
//! persisted order, odd display names and hand-edited files.

use aoc_runner::{
    AuthError, Config, HttpResponse, IdentityRecord, IdentityResolver, Registry, Result,
    Transport, LOGIN_SOURCES,
};

struct Offline;

impl Transport for Offline {
    fn get(&self, _: &str, _: Option<&str>, _: bool) -> Result<HttpResponse> {
        Err(AuthError::Transport("offline".into()))
    }

    fn post(&self, _: &str, _: &str, _: &[(&str, &str)]) -> Result<HttpResponse> {
        Err(AuthError::Transport("offline".into()))
    }
}

fn resolver(config: &Config) -> IdentityResolver<Offline> {
    IdentityResolver::new(Offline, config)
}

fn user(name: &str, source: &str, id: i64, token: &str) -> IdentityRecord {
    IdentityRecord::new(name, id, source, aoc_runner::time::now(), token).unwrap()
}

#[test]
fn hundred_users_keep_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    let mut registry = Registry::open(&config, resolver(&config)).unwrap();

    let mut expected = Vec::new();
    for i in 0..100 {
        let source = LOGIN_SOURCES[i % LOGIN_SOURCES.len()];
        let id = 1000 - i as i64;
        registry
            .add_record(user(&format!("u{i}"), source, id, &format!("t{i}")), false)
            .unwrap();
        expected.push(format!("{source}.{id}"));
    }

    let loaded = Registry::load(&config, resolver(&config)).unwrap();
    let keys: Vec<String> = loaded.list_records().iter().map(|r| r.key()).collect();
    assert_eq!(keys, expected);
    assert_eq!(loaded.default_key(), Some(expected[0].as_str()));
}

#[test]
fn same_id_different_source_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    let mut registry = Registry::open(&config, resolver(&config)).unwrap();

    for source in LOGIN_SOURCES {
        registry
            .add_record(user("x", source, 42, &format!("tok-{source}")), false)
            .unwrap();
    }
    assert_eq!(registry.len(), LOGIN_SOURCES.len());

    for source in LOGIN_SOURCES {
        let err = registry
            .add_record(user("y", source, 42, "dup"), false)
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists(ref k) if *k == format!("{source}.42")));
    }
}

#[test]
fn unicode_display_names_survive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    let mut registry = Registry::open(&config, resolver(&config)).unwrap();

    registry
        .add_record(user("Zoë \"quoted\" 名前", "google", 7, "t"), false)
        .unwrap();
    let loaded = Registry::load(&config, resolver(&config)).unwrap();
    assert_eq!(loaded.get("google.7").unwrap().display_name, "Zoë \"quoted\" 名前");
}

#[test]
fn duplicate_keys_in_file_collapse_to_last() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    config.ensure_dirs().unwrap();
    std::fs::write(
        config.tokens_file(),
        r#"{"default_user": "github.1", "users": [
            {"user_name": "a", "aoc_id": 1, "login_source": "github",
             "last_updated": "2024-01-16T10:12:22", "token": "first"},
            {"user_name": "b", "aoc_id": 2, "login_source": "reddit",
             "last_updated": "2024-01-16T10:12:22", "token": "other"},
            {"user_name": "a", "aoc_id": 1, "login_source": "github",
             "last_updated": "2024-01-17T10:12:22", "token": "second"}
        ]}"#,
    )
    .unwrap();

    let loaded = Registry::load(&config, resolver(&config)).unwrap();
    let records = loaded.list_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].key(), "github.1");
    assert_eq!(records[0].credential, "second");
}

#[test]
fn invalid_record_in_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    config.ensure_dirs().unwrap();
    std::fs::write(
        config.tokens_file(),
        r#"{"default_user": null, "users": [
            {"user_name": "a", "aoc_id": 0, "login_source": "myspace",
             "last_updated": "2024-01-16T10:12:22", "token": "t"}
        ]}"#,
    )
    .unwrap();

    let result = Registry::load(&config, resolver(&config));
    match result {
        Err(AuthError::InvalidFileFormat(msg)) => {
            assert!(msg.contains("aoc_id"), "got: {msg}");
            assert!(msg.contains("login_source"), "got: {msg}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("invalid record must not load"),
    }
}

#[test]
fn empty_one_shot_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    config.ensure_dirs().unwrap();
    std::fs::write(config.credential_file(), "   \n\n").unwrap();

    let registry = Registry::open(&config, resolver(&config)).unwrap();
    assert!(registry.is_empty());
    assert_eq!(registry.default_key(), None);
}

#[test]
fn removing_everything_clears_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_root(dir.path());
    let mut registry = Registry::open(&config, resolver(&config)).unwrap();

    for id in 1..=5 {
        registry
            .add_record(user("u", "github", id, &format!("t{id}")), false)
            .unwrap();
    }
    for id in 1..=5 {
        registry.remove(&format!("github.{id}")).unwrap();
        let expected = (id < 5).then(|| format!("github.{}", id + 1));
        assert_eq!(registry.default_key(), expected.as_deref());
    }
    assert!(registry.is_empty());
}
