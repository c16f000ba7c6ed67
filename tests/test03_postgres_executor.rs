#![cfg(feature = "postgres")]

use std::str::FromStr;

use sql_dao::postgres::tokio_postgres::{self, NoTls};
use sql_dao::prelude::*;

const POSTGRES_URL_ENV: &str = "SQL_DAO_TEST_POSTGRES_URL";

/// A scratch table named after the test, dropped by the caller when done.
struct Scratch {
    url: String,
    table: String,
}

impl Scratch {
    fn executor(&self) -> Executor {
        let endpoint = Endpoint::parse(&self.url).expect("endpoint");
        Executor::from_endpoint(&endpoint).expect("executor")
    }

    fn sql(&self, template: &str) -> String {
        template.replace("{table}", &self.table)
    }

    async fn admin(&self, statements: &str) -> Result<(), tokio_postgres::Error> {
        let config = tokio_postgres::Config::from_str(&self.url)?;
        let (client, connection) = config.connect(NoTls).await?;
        let driver = tokio::spawn(connection);
        client.batch_execute(statements).await?;
        drop(client);
        let _ = driver.await;
        Ok(())
    }

    async fn drop_table(&self) -> Result<(), tokio_postgres::Error> {
        self.admin(&self.sql("DROP TABLE IF EXISTS {table}")).await
    }
}

/// Returns `None` when no test server is configured.
async fn scratch(name: &str) -> Result<Option<Scratch>, Box<dyn std::error::Error>> {
    let Ok(url) = std::env::var(POSTGRES_URL_ENV) else {
        eprintln!("skipping: {POSTGRES_URL_ENV} is not set");
        return Ok(None);
    };
    let scratch = Scratch {
        url,
        table: format!("sql_dao_{name}_{}", std::process::id()),
    };
    scratch
        .admin(&scratch.sql(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                 id BIGSERIAL PRIMARY KEY,
                 name TEXT NOT NULL,
                 age INTEGER NOT NULL DEFAULT 0,
                 score REAL,
                 seen_at TIMESTAMP
             );
             INSERT INTO {table} (name, age) VALUES
                 ('Ann', 34), ('Ben', 17), ('Cid', 52), ('Dee', 18), ('Eve', 29);",
        ))
        .await?;
    Ok(Some(scratch))
}

fn name(row: &DbRow) -> Result<String, DaoError> {
    row.try_text(0)
}

#[tokio::test]
async fn loads_map_rows_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = scratch("loads").await? else {
        return Ok(());
    };
    let executor = db.executor();

    let adults = executor
        .load_many(
            &db.sql("SELECT name FROM {table} WHERE age > $1 ORDER BY id"),
            &row_values![18],
            name,
        )
        .await?;
    assert_eq!(adults, ["Ann", "Cid", "Eve"]);

    let first = executor
        .load_one(&db.sql("SELECT name FROM {table} ORDER BY id"), &[], name)
        .await?;
    assert_eq!(first, "Ann");

    let err = executor
        .load_one(
            &db.sql("SELECT name FROM {table} WHERE id = $1"),
            &row_values![9999],
            name,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    db.drop_table().await?;
    Ok(())
}

#[tokio::test]
async fn create_returns_the_returning_key() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = scratch("create").await? else {
        return Ok(());
    };
    let executor = db.executor();

    let id = executor
        .create(
            &db.sql("INSERT INTO {table}(name) VALUES ($1) RETURNING id"),
            &row_values!["Alice"],
        )
        .await?;
    assert_eq!(id, 6);

    let err = executor
        .create(&db.sql("INSERT INTO {table}(name) VALUES ($1)"), &row_values!["Bob"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoIdentifier);

    let err = executor
        .create(
            &db.sql("INSERT INTO {table}(name) SELECT name FROM {table} WHERE id = $1 RETURNING id"),
            &row_values![9999],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);

    db.drop_table().await?;
    Ok(())
}

#[tokio::test]
async fn mutations_require_affected_rows() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = scratch("mutations").await? else {
        return Ok(());
    };
    let executor = db.executor();

    executor
        .update(
            &db.sql("UPDATE {table} SET name = $1, score = $2 WHERE id = $3"),
            &row_values!["Bob", 2.5, 2],
        )
        .await?;
    let err = executor
        .update(
            &db.sql("UPDATE {table} SET name = $1 WHERE id = $2"),
            &row_values!["Bob", 9999],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);

    let score = executor
        .load_one(
            &db.sql("SELECT score FROM {table} WHERE id = $1"),
            &row_values![2],
            |row: &DbRow| row.try_float(0),
        )
        .await?;
    assert!((score - 2.5).abs() < f64::EPSILON);

    executor
        .delete(&db.sql("DELETE FROM {table} WHERE id = $1"), &row_values![3])
        .await?;
    let err = executor
        .delete(&db.sql("DELETE FROM {table} WHERE id = $1"), &row_values![3])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);

    db.drop_table().await?;
    Ok(())
}

#[tokio::test]
async fn batch_reports_the_first_empty_unit() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = scratch("batch").await? else {
        return Ok(());
    };
    let executor = db.executor();
    let sql = db.sql("UPDATE {table} SET age = $1 WHERE id = $2");

    executor
        .batch_update(&sql, &[row_values![1, 1], row_values![2, 2]])
        .await?;

    let err = executor
        .batch_update(
            &sql,
            &[row_values![7, 1], row_values![8, 9999], row_values![9, 3]],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEffect);
    assert!(err.message().contains("unit 1 of 3"), "{err}");

    let ages = executor
        .load_many(
            &db.sql("SELECT age FROM {table} WHERE id IN (1, 3) ORDER BY id"),
            &[],
            |row: &DbRow| row.try_int(0),
        )
        .await?;
    assert_eq!(ages, [7, 9]);

    db.drop_table().await?;
    Ok(())
}

#[tokio::test]
async fn driver_errors_are_execution_failures() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = scratch("errors").await? else {
        return Ok(());
    };
    let executor = db.executor();

    let err = executor
        .load_many(&db.sql("SELECT nope FROM {table}"), &[], name)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.cause().is_some());

    let err = executor
        .update(&db.sql("UPDATE {table} SET name = $1 WHERE id = $2"), &row_values!["x"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    db.drop_table().await?;
    Ok(())
}

#[tokio::test]
async fn timestamps_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = scratch("timestamps").await? else {
        return Ok(());
    };
    let executor = db.executor();
    let at = chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
        .and_then(|d| d.and_hms_opt(7, 8, 9))
        .expect("valid timestamp");

    executor
        .update(
            &db.sql("UPDATE {table} SET seen_at = $1 WHERE id = $2"),
            &row_values![at, 1],
        )
        .await?;
    let seen = executor
        .load_one(
            &db.sql("SELECT seen_at FROM {table} WHERE id = $1"),
            &row_values![1],
            |row: &DbRow| row.try_timestamp(0),
        )
        .await?;
    assert_eq!(seen, at);

    db.drop_table().await?;
    Ok(())
}
