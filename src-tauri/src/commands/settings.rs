// ============================================================================
// 设置 Commands
// ============================================================================

use std::sync::Mutex;

use tauri::State;

use crate::database::{AppSettings, Database};

/// 获取应用设置
#[tauri::command]
pub async fn get_app_settings(db: State<'_, Mutex<Database>>) -> Result<AppSettings, String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    let db_path = db.conn().path().map(|p| p.to_string()).unwrap_or_default();
    db.get_settings(&db_path)
}

/// 保存单个设置项（时长类设置在下次启动时生效）
#[tauri::command]
pub async fn save_app_setting(
    db: State<'_, Mutex<Database>>,
    key: String,
    value: String,
) -> Result<(), String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    db.save_setting(&key, &value)
}

/// 覆盖功能当前是否开启（顶部栏启动时查询）
#[tauri::command]
pub async fn get_overlay_state(db: State<'_, Mutex<Database>>) -> Result<bool, String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    Ok(db.get_settings("")?.overlay_enabled)
}
