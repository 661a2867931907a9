//! The data-access collaborator handed to data-aware handlers.
//!
//! The pipeline never talks to storage itself. Applications plug in an
//! implementation (usually backed by a connection pool) and register routes
//! with [`Handler::Data`](crate::router::Handler::Data).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DataAccessError;

/// One result row, column label -> value.
pub type Row = Map<String, Value>;

/// Query and update operations against persistent storage.
///
/// Shared by every worker thread, so implementations must be safe for
/// concurrent use.
pub trait DataExecutor: Send + Sync {
    /// Runs a query and returns every row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataAccessError>;

    /// Runs an update inside its own transaction. Anything other than exactly
    /// one affected row is rolled back and reported as
    /// [`DataAccessError::UnexpectedRowCount`].
    fn update_one(&self, sql: &str, params: &[Value]) -> Result<u64, DataAccessError>;
}

impl dyn DataExecutor + '_ {
    /// Runs a query and hands the rows to `extractor`.
    pub fn query_with<T, F>(&self, sql: &str, params: &[Value], extractor: F) -> Result<T, DataAccessError>
    where
        F: FnOnce(Vec<Row>) -> Result<T, DataAccessError>,
    {
        extractor(self.query(sql, params)?)
    }

    /// Maps the single row returned by `sql` onto `T`. No rows is `Ok(None)`,
    /// more than one is an error.
    pub fn query_for_single_object<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<T>, DataAccessError> {
        let mut rows = self.query(sql, params)?;
        match rows.len() {
            0 => Ok(None),
            1 => {
                let row = rows.remove(0);
                Ok(Some(serde_json::from_value(Value::Object(row))?))
            }
            count => Err(DataAccessError::TooManyRows { rows: count }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    /// An in-memory table of users keyed by id.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryExecutor {
        pub(crate) rows: Mutex<Vec<Row>>,
    }

    impl MemoryExecutor {
        pub(crate) fn with_users(users: &[(i64, &str)]) -> Self {
            let rows = users
                .iter()
                .map(|(id, username)| {
                    let Value::Object(row) = json!({ "id": id, "username": username }) else {
                        unreachable!()
                    };
                    row
                })
                .collect();
            MemoryExecutor { rows: Mutex::new(rows) }
        }
    }

    impl DataExecutor for MemoryExecutor {
        // Understands `WHERE id = ?` and nothing else.
        fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataAccessError> {
            let rows = self.rows.lock().map_err(DataAccessError::query)?;
            if !sql.contains("WHERE id = ?") {
                return Ok(rows.clone());
            }
            let id = params.first().ok_or_else(|| DataAccessError::query("missing id"))?;
            Ok(rows.iter().filter(|row| row.get("id") == Some(id)).cloned().collect())
        }

        // `UPDATE users SET username = ? WHERE id = ?`
        fn update_one(&self, _sql: &str, params: &[Value]) -> Result<u64, DataAccessError> {
            let [username, id] = params else {
                return Err(DataAccessError::query("expected two params"));
            };
            let mut rows = self.rows.lock().map_err(DataAccessError::query)?;
            let mut staged = rows.clone();
            let mut affected = 0;
            for row in staged.iter_mut().filter(|row| row.get("id") == Some(id)) {
                row.insert("username".to_string(), username.clone());
                affected += 1;
            }
            if affected != 1 {
                return Err(DataAccessError::UnexpectedRowCount { affected });
            }
            *rows = staged;
            Ok(affected)
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        username: String,
    }

    #[test]
    fn test_query_for_single_object() {
        let executor = MemoryExecutor::with_users(&[(1, "ada"), (2, "grace")]);
        let executor: &dyn DataExecutor = &executor;

        let user: Option<User> = executor
            .query_for_single_object("SELECT * FROM users WHERE id = ?", &[json!(2)])
            .unwrap();
        assert_eq!(user, Some(User { id: 2, username: "grace".to_string() }));

        let missing: Option<User> = executor
            .query_for_single_object("SELECT * FROM users WHERE id = ?", &[json!(9)])
            .unwrap();
        assert_eq!(missing, None);

        let too_many = executor.query_for_single_object::<User>("SELECT * FROM users", &[]);
        assert!(matches!(too_many, Err(DataAccessError::TooManyRows { rows: 2 })));
    }

    #[test]
    fn test_query_with_extractor() {
        let executor = MemoryExecutor::with_users(&[(1, "ada"), (2, "grace")]);
        let executor: &dyn DataExecutor = &executor;
        let count = executor.query_with("SELECT * FROM users", &[], |rows| Ok(rows.len())).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_update_one_rolls_back_on_wrong_count() {
        let executor = MemoryExecutor::with_users(&[(1, "ada"), (1, "dup")]);
        let result = executor.update_one("UPDATE users SET username = ? WHERE id = ?", &[json!("x"), json!(1)]);
        assert!(matches!(result, Err(DataAccessError::UnexpectedRowCount { affected: 2 })));
        let rows = executor.rows.lock().unwrap();
        assert_eq!(rows[0].get("username"), Some(&json!("ada")));
    }
}
