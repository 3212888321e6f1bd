use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::time::Duration;

use crate::service::directory::DepartmentSnapshot;

/// Department snapshots sit on the hot path of every attendance mark, so
/// they are cached in memory. Entries are invalidated on department update.
pub static DEPARTMENT_CACHE: Lazy<Cache<i64, DepartmentSnapshot>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(3600)) // 1h TTL
        .build()
});

pub async fn get(department_id: i64) -> Option<DepartmentSnapshot> {
    DEPARTMENT_CACHE.get(&department_id).await
}

pub async fn put(snapshot: DepartmentSnapshot) {
    DEPARTMENT_CACHE.insert(snapshot.id, snapshot).await;
}

/// Drop a department after a directory update so the next lookup re-reads it.
pub async fn invalidate(department_id: i64) {
    DEPARTMENT_CACHE.invalidate(&department_id).await;
}

/// Load all active departments into the cache at startup (batched).
pub async fn warmup_department_cache(pool: &SqlitePool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, DepartmentSnapshot>(
        r#"
        SELECT id, name, is_active
        FROM departments
        WHERE is_active = 1
        ORDER BY id
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total_count += 1;

        if batch.len() >= batch_size {
            batch_put(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_put(&batch).await;
    }

    log::info!(
        "Department cache warmup complete: {} active departments",
        total_count
    );

    Ok(())
}

async fn batch_put(snapshots: &[DepartmentSnapshot]) {
    let futures: Vec<_> = snapshots
        .iter()
        .map(|s| DEPARTMENT_CACHE.insert(s.id, s.clone()))
        .collect();

    futures::future::join_all(futures).await;
}
