// ============================================================================
// 本地购物篮 Commands
// 作为模板与数据库层之间的薄接口层，仅负责：
// 1. 接收模板参数
// 2. 从 Tauri State 获取 Database 实例
// 3. 调用 Database 方法
// 4. 返回结果
// ============================================================================

use std::sync::{Arc, Mutex};

use tauri::State;

use crate::database::Database;
use crate::models::dtos::CartItem;
use crate::services::registry::ModuleRegistry;

/// 查询某个站点模块的购物篮
#[tauri::command]
pub async fn cart_list(
    db: State<'_, Mutex<Database>>,
    module_id: String,
) -> Result<Vec<CartItem>, String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    db.list_cart_items(&module_id)
}

/// 加入购物篮；商品键缺失时按模块规则从链接推导
///
/// 返回 false 表示该商品已在购物篮中
#[tauri::command]
pub async fn cart_add(
    db: State<'_, Mutex<Database>>,
    registry: State<'_, Arc<ModuleRegistry>>,
    module_id: String,
    mut item: CartItem,
) -> Result<bool, String> {
    if item.id.trim().is_empty() {
        item.id = registry
            .get(&module_id)
            .and_then(|m| m.product_key(&item.url))
            .ok_or_else(|| format!("加入购物篮失败：无法从链接识别商品 {}", item.url))?;
    }
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    db.add_cart_item(&module_id, &item)
}

/// 从购物篮移除一件商品
#[tauri::command]
pub async fn cart_remove(
    db: State<'_, Mutex<Database>>,
    module_id: String,
    item_id: String,
) -> Result<(), String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    db.remove_cart_item(&module_id, &item_id)
}

/// 清空某个站点模块的购物篮
#[tauri::command]
pub async fn cart_clear(
    db: State<'_, Mutex<Database>>,
    module_id: String,
) -> Result<usize, String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    db.clear_cart(&module_id)
}
