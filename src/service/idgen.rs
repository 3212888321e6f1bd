//! Display-ID generation strategies.
//!
//! Two philosophies coexist: short random IDs checked against the store for
//! collisions (attendance, departments, shifts) and dense sequential numbers
//! drawn from an atomic counter (employee codes).

use async_trait::async_trait;
use rand::Rng;
use sqlx::SqlitePool;

use crate::error::ApiResult;

/// Uppercase letters and digits minus the confusable ones (I, L, O, 0, 1).
const ID_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

const MAX_ATTEMPTS: usize = 5;

#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn next_id(&self, pool: &SqlitePool) -> ApiResult<String>;
}

/// Random fixed-length IDs, existence-checked by field-equality query and
/// retried a bounded number of times. On exhaustion falls back to a
/// timestamp-derived suffix; the residual collision risk is accepted.
pub struct RandomCollisionChecked {
    prefix: &'static str,
    length: u32,
    table: &'static str,
    column: &'static str,
}

impl RandomCollisionChecked {
    pub const fn new(
        prefix: &'static str,
        length: u32,
        table: &'static str,
        column: &'static str,
    ) -> Self {
        Self {
            prefix,
            length,
            table,
            column,
        }
    }

    fn candidate(&self) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..self.length)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

#[async_trait]
impl IdGenerator for RandomCollisionChecked {
    async fn next_id(&self, pool: &SqlitePool) -> ApiResult<String> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)",
            self.table, self.column
        );

        for _ in 0..MAX_ATTEMPTS {
            let candidate = self.candidate();
            let exists: bool = sqlx::query_scalar(&sql)
                .bind(&candidate)
                .fetch_one(pool)
                .await?;
            if !exists {
                return Ok(candidate);
            }
        }

        tracing::warn!(
            prefix = self.prefix,
            "Random ID attempts exhausted, falling back to timestamp suffix"
        );
        let millis = chrono::Utc::now().timestamp_millis();
        let modulus = 10_i64.pow(self.length);
        Ok(format!(
            "{}{:0width$}",
            self.prefix,
            millis % modulus,
            width = self.length as usize
        ))
    }
}

/// Dense zero-padded sequence numbers from the `counters` table. The
/// upsert-increment is a single atomic statement so concurrent writers never
/// observe the same value.
pub struct AtomicSequential {
    counter: &'static str,
    prefix: &'static str,
    width: usize,
}

impl AtomicSequential {
    pub const fn new(counter: &'static str, prefix: &'static str, width: usize) -> Self {
        Self {
            counter,
            prefix,
            width,
        }
    }
}

#[async_trait]
impl IdGenerator for AtomicSequential {
    async fn next_id(&self, pool: &SqlitePool) -> ApiResult<String> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, value) VALUES (?, 1)
            ON CONFLICT(name) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(self.counter)
        .fetch_one(pool)
        .await?;

        Ok(format!("{}{:0width$}", self.prefix, value, width = self.width))
    }
}

pub const ATTENDANCE_IDS: RandomCollisionChecked =
    RandomCollisionChecked::new("ATT_", 6, "attendance", "attendance_id");
pub const DEPARTMENT_IDS: RandomCollisionChecked =
    RandomCollisionChecked::new("DEPT_", 4, "departments", "department_id");
pub const SHIFT_IDS: RandomCollisionChecked =
    RandomCollisionChecked::new("SHIFT_", 4, "shifts", "shift_id");
pub const EMPLOYEE_CODES: AtomicSequential = AtomicSequential::new("employee_code", "EMP_", 5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[actix_web::test]
    async fn random_ids_have_prefix_length_and_alphabet() {
        let pool = test_pool().await;
        let id = ATTENDANCE_IDS.next_id(&pool).await.unwrap();

        assert!(id.starts_with("ATT_"));
        let suffix = &id["ATT_".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[actix_web::test]
    async fn sequential_codes_are_dense_and_padded() {
        let pool = test_pool().await;

        let first = EMPLOYEE_CODES.next_id(&pool).await.unwrap();
        let second = EMPLOYEE_CODES.next_id(&pool).await.unwrap();

        assert_eq!(first, "EMP_00001");
        assert_eq!(second, "EMP_00002");
    }

    #[actix_web::test]
    async fn counters_are_independent_per_name() {
        let pool = test_pool().await;
        let other = AtomicSequential::new("badge", "BDG_", 3);

        EMPLOYEE_CODES.next_id(&pool).await.unwrap();
        assert_eq!(other.next_id(&pool).await.unwrap(), "BDG_001");
    }
}
