#![cfg(feature = "test-utils")]

use std::sync::Arc;

use sql_dao::prelude::*;
use sql_dao::test_utils::{ScriptedStore, StoreEvent};

fn executor(store: &ScriptedStore) -> Executor {
    Executor::new(Arc::new(store.clone()))
}

fn name(row: &DbRow) -> Result<String, DaoError> {
    row.try_text(0)
}

fn names_store() -> ScriptedStore {
    ScriptedStore::new().with_rows(
        &["name"],
        vec![row_values!["Ann"], row_values!["Cid"], row_values!["Eve"]],
    )
}

#[tokio::test]
async fn values_are_bound_by_position_in_sequence_order() {
    let store = ScriptedStore::new().with_rows_affected(1);
    executor(&store)
        .update("UPDATE users SET name=? WHERE id=?", &row_values!["Bob", 42])
        .await
        .unwrap();

    assert_eq!(
        store.bindings(),
        vec![
            (1, RowValues::Text("Bob".into())),
            (2, RowValues::Int(42)),
        ]
    );
    assert_eq!(
        store.events(),
        vec![
            StoreEvent::Connect,
            StoreEvent::Prepare("UPDATE users SET name=? WHERE id=?".into()),
            StoreEvent::Bind { position: 1, value: RowValues::Text("Bob".into()) },
            StoreEvent::Bind { position: 2, value: RowValues::Int(42) },
            StoreEvent::Execute,
            StoreEvent::Close,
        ]
    );
}

#[tokio::test]
async fn load_many_visits_every_row() {
    let store = names_store();
    let names = executor(&store)
        .load_many("SELECT name FROM users WHERE age > ?", &row_values![18], name)
        .await
        .unwrap();
    assert_eq!(names, ["Ann", "Cid", "Eve"]);
    assert_eq!(store.open_connections(), 0);
}

#[tokio::test]
async fn load_one_fetches_a_single_row() {
    let store = names_store();
    let first = executor(&store)
        .load_one("SELECT name FROM users", &[], name)
        .await
        .unwrap();
    assert_eq!(first, "Ann");

    let fetched: Vec<_> = store
        .events()
        .into_iter()
        .filter(|event| matches!(event, StoreEvent::Fetch(_)))
        .collect();
    assert_eq!(fetched, vec![StoreEvent::Fetch(0)]);
}

#[tokio::test]
async fn load_one_on_empty_result_is_not_found_and_releases() {
    let store = ScriptedStore::new().with_rows(&["name"], vec![]);
    let err = executor(&store)
        .load_one("SELECT name FROM users WHERE id = ?", &row_values![7], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.open_connections(), 0);
    assert_eq!(store.events().last(), Some(&StoreEvent::Close));
}

#[tokio::test]
async fn connection_is_released_on_every_failure_path() {
    let cases = [
        names_store().failing_execute("disk I/O error"),
        ScriptedStore::new().with_rows_affected(0),
        names_store(),
    ];

    let err = executor(&cases[0])
        .load_many("SELECT name FROM users", &[], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let err = executor(&cases[1])
        .delete("DELETE FROM users WHERE id = ?", &row_values![1])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);

    let err = executor(&cases[2])
        .load_many("SELECT name FROM users", &[], |_row: &DbRow| -> Result<(), DaoError> {
            Err(DaoError::execution("mapper rejected row"))
        })
        .await
        .unwrap_err();
    assert_eq!(err.message(), "mapper rejected row");

    for store in &cases {
        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.events().last(), Some(&StoreEvent::Close));
    }
}

#[tokio::test]
async fn mapper_error_stops_the_cursor() {
    let store = names_store();
    let mut seen = 0;
    let _ = executor(&store)
        .load_many("SELECT name FROM users", &[], |row: &DbRow| {
            seen += 1;
            let name = row.try_text(0)?;
            if name == "Cid" {
                return Err(DaoError::execution("no Cids"));
            }
            Ok(name)
        })
        .await
        .unwrap_err();
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn close_failure_surfaces_only_when_the_statement_succeeded() {
    let store = names_store().failing_close("socket reset");
    let err = executor(&store)
        .load_many("SELECT name FROM users", &[], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.message().contains("socket reset"));

    let store = ScriptedStore::new()
        .with_rows_affected(0)
        .failing_close("socket reset");
    let err = executor(&store)
        .update("UPDATE users SET name = ? WHERE id = ?", &row_values!["Bob", 9])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);

    let store = names_store()
        .failing_execute("syntax error")
        .failing_close("socket reset");
    let err = executor(&store)
        .load_many("SELECT name FROM users", &[], name)
        .await
        .unwrap_err();
    assert!(err.message().contains("syntax error"));
}

#[tokio::test]
async fn connect_failure_is_an_execution_failure() {
    let store = names_store().failing_connect("connection refused");
    let err = executor(&store)
        .load_many("SELECT name FROM users", &[], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.cause().is_some());
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn create_checks_rows_before_keys() {
    let sql = "INSERT INTO users(name) VALUES (?)";

    let store = ScriptedStore::new()
        .with_rows_affected(1)
        .with_generated_key(Some(42));
    assert_eq!(executor(&store).create(sql, &row_values!["Alice"]).await.unwrap(), 42);

    let store = ScriptedStore::new()
        .with_rows_affected(0)
        .with_generated_key(None);
    let err = executor(&store).create(sql, &row_values!["Alice"]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);

    let store = ScriptedStore::new()
        .with_rows_affected(1)
        .with_generated_key(None);
    let err = executor(&store).create(sql, &row_values!["Alice"]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoIdentifier);
}

#[tokio::test]
async fn batch_runs_every_unit_before_reporting() {
    let store = ScriptedStore::new().with_batch_counts(vec![1, 0, 1]);
    let err = executor(&store)
        .batch_update(
            "UPDATE users SET age = ? WHERE id = ?",
            &[row_values![1, 1], row_values![2, 2], row_values![3, 3]],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);
    assert!(err.message().contains("unit 1 of 3"), "{err}");

    let executed = store
        .events()
        .iter()
        .filter(|event| **event == StoreEvent::Execute)
        .count();
    assert_eq!(executed, 3);
    assert_eq!(store.bindings().len(), 6);
    assert_eq!(store.open_connections(), 0);
}

#[tokio::test]
async fn batch_with_all_units_applied_succeeds() {
    let store = ScriptedStore::new().with_batch_counts(vec![1, 3]);
    executor(&store)
        .batch_update(
            "DELETE FROM users WHERE age < ?",
            &[row_values![10], row_values![20]],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_batch_succeeds() {
    let store = ScriptedStore::new().with_batch_counts(vec![]);
    executor(&store)
        .batch_update("UPDATE users SET age = ? WHERE id = ?", &[])
        .await
        .unwrap();
    assert_eq!(store.open_connections(), 0);
}

#[tokio::test]
async fn binding_mismatch_fails_before_execution() {
    let store = ScriptedStore::new().with_rows_affected(1);
    let err = executor(&store)
        .update("UPDATE users SET name = ? WHERE id = ?", &row_values!["Bob"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(!store.events().contains(&StoreEvent::Execute));
    assert_eq!(store.open_connections(), 0);
}

#[tokio::test]
async fn blank_statement_never_connects() {
    let store = names_store();
    let err = executor(&store)
        .load_many("  \n", &[], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn every_call_opens_its_own_connection() {
    let store = names_store().with_rows_affected(1);
    let exec = executor(&store);
    exec.load_many("SELECT name FROM users", &[], name).await.unwrap();
    exec.update("UPDATE users SET age = ?", &row_values![1]).await.unwrap();
    exec.delete("DELETE FROM users", &[]).await.unwrap();

    let events = store.events();
    let connects = events.iter().filter(|e| **e == StoreEvent::Connect).count();
    let closes = events.iter().filter(|e| **e == StoreEvent::Close).count();
    assert_eq!((connects, closes), (3, 3));
}

#[test]
fn mappers_can_be_tested_against_handmade_rows() {
    let row = sql_dao::test_utils::create_test_row(
        &["name", "age"],
        row_values!["Ann", 34],
    );
    assert_eq!(name(&row).unwrap(), "Ann");
    assert_eq!(row.get("age"), Some(&RowValues::Int(34)));
}

#[tokio::test]
async fn close_failure_keeps_not_found_and_no_identifier() {
    let store = ScriptedStore::new()
        .with_rows(&["name"], vec![])
        .failing_close("socket reset");
    let err = executor(&store)
        .load_one("SELECT name FROM users WHERE id = ?", &row_values![7], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let store = ScriptedStore::new()
        .with_rows_affected(1)
        .with_generated_key(None)
        .failing_close("socket reset");
    let err = executor(&store)
        .create("INSERT INTO users(name) VALUES (?)", &row_values!["Alice"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoIdentifier);

    let store = ScriptedStore::new()
        .with_batch_counts(vec![1, 0])
        .failing_close("socket reset");
    let err = executor(&store)
        .batch_update(
            "UPDATE users SET age = ? WHERE id = ?",
            &[row_values![1, 1], row_values![2, 2]],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);
    assert_eq!(store.open_connections(), 0);
}

#[tokio::test]
async fn batch_binding_mismatch_runs_no_unit() {
    let store = ScriptedStore::new().with_rows_affected(1);
    let err = executor(&store)
        .batch_update(
            "UPDATE users SET name = ? WHERE id = ?",
            &[row_values!["Xia", 1], row_values!["Yan"], row_values!["Zed", 3]],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(!store.events().contains(&StoreEvent::Execute));
    assert_eq!(store.open_connections(), 0);
}
