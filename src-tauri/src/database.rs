// ============================================================================
// 数据库模块：SQLite 持久化层
// 使用 rusqlite 直接操作 SQLite，遵循 KISS 原则，不引入 ORM
// 保存两类数据：本地购物篮（按站点模块分组）和键值设置
// ============================================================================

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::dtos::CartItem;

/// 数据库文件名
pub const DB_FILE_NAME: &str = "boring_browser.db";

// ============================================================================
// 数据结构定义
// ============================================================================

/// 应用设置
///
/// 时长类设置以毫秒字符串保存，解析与校验在 services::config 中完成。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// 覆盖功能开关（默认开启）
    pub overlay_enabled: bool,
    /// 启动首页
    pub home_url: Option<String>,
    /// 站点模块资源目录（为空时使用打包资源）
    pub modules_dir: Option<String>,
    pub loader_failsafe_ms: Option<String>,
    pub extraction_timeout_ms: Option<String>,
    pub checkout_poll_timeout_ms: Option<String>,
    pub db_path: String,
}

// ============================================================================
// 数据库管理器
// ============================================================================

/// 数据库管理器，封装 rusqlite 连接
pub struct Database {
    /// SQLite 数据库连接
    conn: Connection,
}

impl Database {
    /// 初始化数据库：在指定目录创建数据库文件并建表
    ///
    /// # 参数
    /// - `app_data_dir`: 应用数据目录路径（Tauri app_data_dir）
    ///
    /// # 返回
    /// - `Ok(Database)`: 初始化成功，返回数据库实例
    /// - `Err(String)`: 初始化失败，返回中文错误描述
    pub fn init(app_data_dir: &Path) -> Result<Self, String> {
        // 确保数据目录存在
        std::fs::create_dir_all(app_data_dir).map_err(|e| {
            format!(
                "数据库初始化失败：无法创建数据目录 {}: {}",
                app_data_dir.display(),
                e
            )
        })?;

        let db_path = app_data_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path).map_err(|e| {
            format!(
                "数据库初始化失败：无法打开数据库文件 {}: {}",
                db_path.display(),
                e
            )
        })?;

        Self::create_tables(&conn)?;

        Ok(Database { conn })
    }

    /// 创建所有数据库表（如果不存在）
    fn create_tables(conn: &Connection) -> Result<(), String> {
        conn.execute_batch(
            "
            -- 本地购物篮：同一模块下商品键唯一
            CREATE TABLE IF NOT EXISTS cart_items (
                module_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                title TEXT NOT NULL,
                price TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1,
                added_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (module_id, item_id)
            );

            -- 设置表（键值对）
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| format!("数据库初始化失败：创建表结构时出错: {}", e))?;

        Ok(())
    }

    /// 获取数据库连接的引用
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ========================================================================
    // 购物篮
    // ========================================================================

    /// 加入购物篮；同一模块下已存在相同商品键时不重复加入
    ///
    /// # 返回
    /// - `Ok(true)`: 新加入
    /// - `Ok(false)`: 已在购物篮中
    /// - `Err(String)`: 写入失败，返回中文错误描述
    pub fn add_cart_item(&self, module_id: &str, item: &CartItem) -> Result<bool, String> {
        if item.id.trim().is_empty() {
            return Err("加入购物篮失败：商品键为空".to_string());
        }
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO cart_items (module_id, item_id, title, price, url, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    module_id,
                    item.id,
                    item.title,
                    item.price,
                    item.url,
                    item.quantity.max(1)
                ],
            )
            .map_err(|e| format!("加入购物篮失败：{}", e))?;

        Ok(changed > 0)
    }

    /// 列出某个模块的购物篮，按加入顺序
    pub fn list_cart_items(&self, module_id: &str) -> Result<Vec<CartItem>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT item_id, title, price, url, quantity FROM cart_items
                 WHERE module_id = ?1 ORDER BY rowid",
            )
            .map_err(|e| format!("查询购物篮失败：{}", e))?;

        let items = stmt
            .query_map(params![module_id], |row| {
                Ok(CartItem {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    price: row.get(2)?,
                    url: row.get(3)?,
                    quantity: row.get(4)?,
                })
            })
            .map_err(|e| format!("查询购物篮失败：{}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("查询购物篮失败：读取记录时出错: {}", e))?;

        Ok(items)
    }

    /// 从购物篮移除一件商品；不存在时返回错误
    pub fn remove_cart_item(&self, module_id: &str, item_id: &str) -> Result<(), String> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM cart_items WHERE module_id = ?1 AND item_id = ?2",
                params![module_id, item_id],
            )
            .map_err(|e| format!("移除商品失败：{}", e))?;

        if affected == 0 {
            return Err(format!("移除商品失败：购物篮中没有 {}", item_id));
        }

        Ok(())
    }

    /// 清空某个模块的购物篮，返回删除的条数
    pub fn clear_cart(&self, module_id: &str) -> Result<usize, String> {
        self.conn
            .execute(
                "DELETE FROM cart_items WHERE module_id = ?1",
                params![module_id],
            )
            .map_err(|e| format!("清空购物篮失败：{}", e))
    }

    // ========================================================================
    // 设置
    // ========================================================================

    /// 读取全部设置，缺失的键取默认值
    ///
    /// # 参数
    /// - `db_path`: 数据库文件路径（原样回填到结果中，供前端展示）
    pub fn get_settings(&self, db_path: &str) -> Result<AppSettings, String> {
        let overlay_enabled = self
            .read_setting("overlay_enabled")?
            .map(|v| v != "false")
            .unwrap_or(true);

        Ok(AppSettings {
            overlay_enabled,
            home_url: self.read_setting("home_url")?,
            modules_dir: self.read_setting("modules_dir")?,
            loader_failsafe_ms: self.read_setting("loader_failsafe_ms")?,
            extraction_timeout_ms: self.read_setting("extraction_timeout_ms")?,
            checkout_poll_timeout_ms: self.read_setting("checkout_poll_timeout_ms")?,
            db_path: db_path.to_string(),
        })
    }

    /// 保存单个设置项（INSERT OR REPLACE 实现 upsert 语义）
    pub fn save_setting(&self, key: &str, value: &str) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| format!("保存设置失败：{}", e))?;

        Ok(())
    }

    fn read_setting(&self, key: &str) -> Result<Option<String>, String> {
        match self.conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(format!("读取设置 {} 失败：{}", key, e)),
        }
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn item(id: &str) -> CartItem {
        CartItem {
            id: id.to_string(),
            title: format!("商品 {}", id),
            price: "$9.99".to_string(),
            url: format!("https://www.amazon.com/dp/{}", id),
            quantity: 1,
        }
    }

    /// 测试数据库初始化：创建文件和两张表
    #[test]
    fn test_database_init_creates_file_and_tables() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();

        assert!(dir.path().join(DB_FILE_NAME).exists());

        let table_names: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(table_names.contains(&"cart_items".to_string()));
        assert!(table_names.contains(&"settings".to_string()));
    }

    /// 测试重复初始化不破坏已有数据
    #[test]
    fn test_database_init_idempotent() {
        let dir = TempDir::new().unwrap();
        {
            let db = Database::init(dir.path()).unwrap();
            db.add_cart_item("amazon", &item("B000000001")).unwrap();
        }
        let db = Database::init(dir.path()).unwrap();
        assert_eq!(db.list_cart_items("amazon").unwrap().len(), 1);
    }

    #[test]
    fn test_database_init_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        Database::init(&nested).unwrap();
        assert!(nested.join(DB_FILE_NAME).exists());
    }

    #[test]
    fn test_add_cart_item_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();

        assert!(db.add_cart_item("amazon", &item("B000000001")).unwrap());
        assert!(!db.add_cart_item("amazon", &item("B000000001")).unwrap());
        assert_eq!(db.list_cart_items("amazon").unwrap().len(), 1);
    }

    #[test]
    fn test_add_cart_item_rejects_empty_key() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();
        assert!(db.add_cart_item("amazon", &item("  ")).is_err());
    }

    #[test]
    fn test_cart_is_scoped_by_module() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();

        db.add_cart_item("amazon", &item("B000000001")).unwrap();
        db.add_cart_item("shop", &item("B000000001")).unwrap();
        assert_eq!(db.list_cart_items("amazon").unwrap().len(), 1);
        assert_eq!(db.list_cart_items("shop").unwrap().len(), 1);

        assert_eq!(db.clear_cart("amazon").unwrap(), 1);
        assert!(db.list_cart_items("amazon").unwrap().is_empty());
        assert_eq!(db.list_cart_items("shop").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_cart_item() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();
        db.add_cart_item("amazon", &item("B000000001")).unwrap();

        db.remove_cart_item("amazon", "B000000001").unwrap();
        assert!(db.list_cart_items("amazon").unwrap().is_empty());

        let err = db.remove_cart_item("amazon", "B000000001").unwrap_err();
        assert!(err.contains("移除商品失败"));
    }

    #[test]
    fn test_zero_quantity_stored_as_one() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();
        let mut it = item("B000000001");
        it.quantity = 0;
        db.add_cart_item("amazon", &it).unwrap();
        assert_eq!(db.list_cart_items("amazon").unwrap()[0].quantity, 1);
    }

    #[test]
    fn test_get_settings_default() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();

        let settings = db.get_settings("/path/to/db").unwrap();
        assert!(settings.overlay_enabled);
        assert_eq!(settings.home_url, None);
        assert_eq!(settings.modules_dir, None);
        assert_eq!(settings.db_path, "/path/to/db");
    }

    #[test]
    fn test_save_setting_upsert() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();

        db.save_setting("overlay_enabled", "false").unwrap();
        assert!(!db.get_settings("/db").unwrap().overlay_enabled);

        db.save_setting("overlay_enabled", "true").unwrap();
        assert!(db.get_settings("/db").unwrap().overlay_enabled);

        db.save_setting("home_url", "https://example.test/").unwrap();
        db.save_setting("loader_failsafe_ms", "5000").unwrap();
        let settings = db.get_settings("/db").unwrap();
        assert_eq!(settings.home_url.as_deref(), Some("https://example.test/"));
        assert_eq!(settings.loader_failsafe_ms.as_deref(), Some("5000"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// 任意加入序列（含重复）后，列表按首次加入顺序、无重复
        #[test]
        fn prop_cart_keeps_insertion_order_without_duplicates(
            ids in prop::collection::vec("[A-Z0-9]{10}", 1..15)
        ) {
            let dir = TempDir::new().unwrap();
            let db = Database::init(dir.path()).unwrap();

            let mut expected: Vec<String> = Vec::new();
            for id in &ids {
                let added = db.add_cart_item("amazon", &item(id)).unwrap();
                prop_assert_eq!(added, !expected.contains(id));
                if added {
                    expected.push(id.clone());
                }
            }

            let listed: Vec<String> = db
                .list_cart_items("amazon")
                .unwrap()
                .into_iter()
                .map(|i| i.id)
                .collect();
            prop_assert_eq!(listed, expected);
        }
    }
}
