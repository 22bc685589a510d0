//! 运行记录存储 - 业务能力层
//!
//! 每个商品的每次运行追加一条带版本号的记录，只追加不修改，
//! 重新优化等下游读最新版本即可
//!
//! ## 技术栈
//! - SQLite（`rusqlite`，bundled），连接放在 `tokio::sync::Mutex` 里串行访问
//! - 结果列表按 JSON 落列，读出时再反序列化

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::candidate::{ProductCandidate, SearchHit};
use crate::models::run::ItemRun;

/// 待落库的一次运行
#[derive(Debug, Clone)]
pub struct NewRun {
    pub item_id: String,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub ranked: Vec<ProductCandidate>,
    pub trace: String,
}

/// 运行记录存储能力
///
/// `append_run` 负责分配版本号（同商品内单调递增，从 1 开始）
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn append_run(&self, run: NewRun) -> Result<ItemRun, StoreError>;
    async fn latest_run(&self, item_id: &str) -> Result<Option<ItemRun>, StoreError>;
}

/// SQLite 存储
pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    /// 打开（或创建）数据库文件
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        Self::init(conn)
    }

    /// 内存数据库
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS item_runs (
                id          TEXT PRIMARY KEY,
                item_id     TEXT NOT NULL,
                version     INTEGER NOT NULL,
                query       TEXT NOT NULL,
                hits_json   TEXT NOT NULL,
                ranked_json TEXT NOT NULL,
                trace       TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_item_runs_item_version
                ON item_runs (item_id, version);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn append_run(&self, run: NewRun) -> Result<ItemRun, StoreError> {
        // 版本号查询和插入在同一把锁内，保证同商品内单调递增
        let conn = self.conn.lock().await;

        let version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM item_runs WHERE item_id = ?1",
            params![run.item_id],
            |row| row.get(0),
        )?;

        let record = ItemRun {
            id: Uuid::new_v4().to_string(),
            item_id: run.item_id,
            version,
            query: run.query,
            hits: run.hits,
            ranked: run.ranked,
            trace: run.trace,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO item_runs (id, item_id, version, query, hits_json, ranked_json, trace, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.item_id,
                record.version,
                record.query,
                serde_json::to_string(&record.hits)?,
                serde_json::to_string(&record.ranked)?,
                record.trace,
                record.created_at.to_rfc3339(),
            ],
        )?;

        debug!(
            "📦 运行记录落库: 商品 {} 版本 {}",
            record.item_id, record.version
        );

        Ok(record)
    }

    async fn latest_run(&self, item_id: &str) -> Result<Option<ItemRun>, StoreError> {
        let conn = self.conn.lock().await;

        let row = conn
            .query_row(
                "SELECT id, item_id, version, query, hits_json, ranked_json, trace, created_at
                 FROM item_runs WHERE item_id = ?1
                 ORDER BY version DESC LIMIT 1",
                params![item_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, item_id, version, query, hits_json, ranked_json, trace, created_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(ItemRun {
            id,
            item_id,
            version,
            query,
            hits: serde_json::from_str(&hits_json)?,
            ranked: serde_json::from_str(&ranked_json)?,
            trace,
            created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        }))
    }
}

/// 内存存储，测试和一次性运行用
#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<String, Vec<ItemRun>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn append_run(&self, run: NewRun) -> Result<ItemRun, StoreError> {
        let mut runs = self.runs.lock().await;
        let entry = runs.entry(run.item_id.clone()).or_default();

        let version = entry.iter().map(|r| r.version).max().unwrap_or(0) + 1;
        let record = ItemRun {
            id: Uuid::new_v4().to_string(),
            item_id: run.item_id,
            version,
            query: run.query,
            hits: run.hits,
            ranked: run.ranked,
            trace: run.trace,
            created_at: Utc::now(),
        };

        entry.push(record.clone());
        Ok(record)
    }

    async fn latest_run(&self, item_id: &str) -> Result<Option<ItemRun>, StoreError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .get(item_id)
            .and_then(|entry| entry.iter().max_by_key(|r| r.version))
            .cloned())
    }
}
