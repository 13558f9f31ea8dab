// ============================================================================
// [总线] 程序的组装车间
// ✅ 只能做：pub mod 暴露子模块、注册 .invoke_handler()、初始化 State、启动状态机
// ⛔ 禁止：直接实现 command 函数
// ============================================================================

pub mod commands;
pub mod database;
pub mod models;
pub mod services;
pub mod shell;
pub mod utils;

use std::sync::{Arc, Mutex};

use tauri::Manager;
use tokio::sync::mpsc;

use crate::services::config::PipelineConfig;
use crate::services::extraction::ScriptBroker;
use crate::services::pipeline::{OverlayPersist, Pipeline, PipelineDeps};
use crate::services::registry::ModuleRegistry;
use crate::services::surface::{DirResources, ResourceSource};

// ============================================================================
// 应用入口
// ============================================================================

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            // 获取应用数据目录并初始化数据库
            let app_data_dir = app
                .path()
                .app_data_dir()
                .map_err(|e| format!("获取应用数据目录失败: {}", e))?;
            let db = database::Database::init(&app_data_dir)
                .map_err(|e| Box::new(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            let db_path = app_data_dir.join(database::DB_FILE_NAME);
            let settings = db
                .get_settings(&db_path.to_string_lossy())
                .map_err(|e| Box::new(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            app.manage(Mutex::new(db));

            // 站点模块：优先使用设置中的磁盘目录，否则读打包资源
            let resources: Arc<dyn ResourceSource> = match settings.modules_dir.as_deref() {
                Some(dir) => {
                    log::info!("从目录加载站点模块：{}", dir);
                    Arc::new(DirResources::new(dir))
                }
                None => Arc::new(shell::AssetResources::new(app.handle().clone())),
            };
            let registry = match ModuleRegistry::load(resources.as_ref()) {
                Ok(registry) => registry,
                Err(e) => {
                    log::error!("{}，本次运行不启用站点模块", e);
                    ModuleRegistry::default()
                }
            };
            let registry = Arc::new(registry);

            let (tx, rx) = mpsc::unbounded_channel();
            let shell = shell::build_window(app.handle(), tx.clone())?;
            let broker = ScriptBroker::new();

            // 开关变化写回 settings 表
            let persist_handle = app.handle().clone();
            let persist: OverlayPersist = Arc::new(move |enabled| {
                let db = persist_handle.state::<Mutex<database::Database>>();
                let result = match db.lock() {
                    Ok(db) => db.save_setting("overlay_enabled", if enabled { "true" } else { "false" }),
                    Err(_) => Err("数据库访问失败：无法获取锁".to_string()),
                };
                if let Err(e) = result {
                    log::warn!("保存覆盖开关失败：{}", e);
                }
            });

            let pipeline = Pipeline::new(
                PipelineDeps {
                    surface: shell.surface,
                    overlay: shell.loader,
                    notifier: Arc::new(shell::TauriNotifier::new(app.handle().clone())),
                    resources,
                    registry: registry.clone(),
                    broker: broker.clone(),
                },
                PipelineConfig::from_settings(&settings),
                settings.overlay_enabled,
                shell.viewport,
                tx.clone(),
            )
            .with_overlay_persist(persist);

            app.manage(commands::PipelineHandle::new(tx));
            app.manage(broker);
            app.manage(registry);
            tauri::async_runtime::spawn(pipeline.run(rx));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // 导航 commands
            commands::navigation::nav_go,
            commands::navigation::nav_back,
            commands::navigation::nav_forward,
            commands::navigation::nav_reload,
            commands::navigation::toggle_overlay,
            // 模板与页面脚本 commands
            commands::template::template_navigate,
            commands::template::template_checkout,
            commands::template::overlay_ready,
            commands::template::surface_report,
            commands::template::open_external,
            // 购物篮 commands
            commands::cart::cart_list,
            commands::cart::cart_add,
            commands::cart::cart_remove,
            commands::cart::cart_clear,
            // 设置 commands
            commands::settings::get_app_settings,
            commands::settings::save_app_setting,
            commands::settings::get_overlay_state,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
