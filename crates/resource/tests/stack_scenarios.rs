//! End-to-end scenarios for composed scopes over real resources

use std::fs;

use pretty_assertions::assert_eq;
use scopekit_resource::resources::{
    Connection, ConnectionConfig, Database, FileConfig, FileResource, LockConfig, LockResource,
    LockTable, Transaction, TransactionConfig,
};
use scopekit_resource::{Error, ErrorKind, Journal, Level, Policy, ResourceEvent, ResourceStack};

#[test]
fn two_files_and_a_transaction_survive_a_mid_body_failure() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");
    let db = Database::new();
    let journal = Journal::new();

    let outcome = ResourceStack::run(&journal, |stack| {
        let suppress = Policy::Suppress;
        let a = stack.acquire::<FileResource>("first", &FileConfig::output(&first), suppress)?;
        let b = stack.acquire::<FileResource>("second", &FileConfig::output(&second), suppress)?;
        let tx = stack.acquire::<Transaction>(
            "tx",
            &TransactionConfig::new(&db),
            Policy::Transactional { propagate: true },
        )?;

        stack.get_mut(a)?.write_line("Ligne 1")?;
        stack.get_mut(b)?.write_line("Ligne 2")?;
        stack.get_mut(tx)?.execute("INSERT INTO log VALUES ('done')")?;
        Err::<(), _>(Error::operation("body", "failed mid-way"))
    })
    .expect("no error escapes the stack");

    assert!(outcome.is_suppressed());
    assert_eq!(fs::read_to_string(&first).unwrap(), "Ligne 1\n");
    assert_eq!(fs::read_to_string(&second).unwrap(), "Ligne 2\n");
    assert!(db.is_empty(), "transaction rolled back");
    assert_eq!(
        journal.count(|e| matches!(e, ResourceEvent::RolledBack { .. })),
        1
    );
    assert_eq!(
        journal.count(|e| matches!(e, ResourceEvent::Committed { .. })),
        0
    );
    assert_eq!(
        journal.released(),
        vec!["tx".to_string(), "second".to_string(), "first".to_string()]
    );
    assert_eq!(journal.count_level(Level::Error), 1, "one suppressed entry");
}

#[test]
fn completed_body_commits_and_releases_in_reverse() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new();
    let journal = Journal::new();

    let outcome = ResourceStack::run(&journal, |stack| {
        let log = stack.acquire::<FileResource>(
            "log",
            &FileConfig::log(dir.path().join("log.txt")),
            Policy::Propagate,
        )?;
        let tx = stack.acquire::<Transaction>(
            "tx",
            &TransactionConfig::new(&db),
            Policy::Transactional { propagate: true },
        )?;
        stack.get_mut(tx)?.execute("UPDATE accounts SET balance = 0")?;
        stack.get_mut(log)?.write_line("Operations normales terminees")?;
        Ok(stack.names().len())
    })
    .unwrap();

    assert_eq!(outcome.completed(), Some(2));
    assert_eq!(db.committed(), vec!["UPDATE accounts SET balance = 0".to_string()]);
    assert_eq!(journal.released(), vec!["tx".to_string(), "log".to_string()]);
}

#[test]
fn heterogeneous_members_release_even_when_a_later_lock_is_taken() {
    let dir = tempfile::tempdir().unwrap();
    let temp = dir.path().join("temp.txt");
    let locks = LockTable::new();
    let journal = Journal::new();

    // Someone else holds the lock this stack wants last.
    let mut other = ResourceStack::new(&journal);
    other
        .acquire::<LockResource>("orders", &LockConfig::new(&locks), Policy::Propagate)
        .unwrap();

    let err = ResourceStack::run(&journal, |stack| {
        stack.acquire::<FileResource>("temp", &FileConfig::temporary(&temp), Policy::Suppress)?;
        stack.acquire::<Connection>(
            "db",
            &ConnectionConfig::new("DatabaseX"),
            Policy::Suppress,
        )?;
        stack.acquire::<LockResource>("orders", &LockConfig::new(&locks), Policy::Suppress)?;
        Ok(())
    })
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Acquisition);
    assert_eq!(err.resource_id(), Some("orders"));
    assert!(!temp.exists(), "temporary file removed during abort");
    assert_eq!(journal.released(), vec!["db".to_string(), "temp".to_string()]);
    assert_eq!(locks.held(), vec!["orders".to_string()]);

    other.unwind().unwrap();
    assert!(locks.held().is_empty());
}

#[test]
fn propagating_stack_returns_the_body_error_after_full_unwind() {
    let journal = Journal::new();
    let err = ResourceStack::run(&journal, |stack| {
        let conn = stack.acquire::<Connection>(
            "service",
            &ConnectionConfig::new("ServiceA"),
            Policy::Propagate,
        )?;
        stack.get_mut(conn)?.query("")?;
        Ok(())
    })
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Operation);
    assert_eq!(journal.released(), vec!["service".to_string()]);
    assert_eq!(
        journal.count(|e| matches!(e, ResourceEvent::Propagated { .. })),
        1
    );
}

#[test]
fn every_entry_is_timestamped_in_order() {
    let journal = Journal::new();
    let _ = ResourceStack::run(&journal, |stack| {
        stack.acquire::<Connection>("a", &ConnectionConfig::new("A"), Policy::Propagate)?;
        stack.acquire::<Connection>("b", &ConnectionConfig::new("B"), Policy::Propagate)?;
        Ok(())
    })
    .unwrap();

    let entries = journal.entries();
    assert_eq!(entries.len(), 4);
    assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}
