fn main() {
    // 显式声明应用 commands，生成 allow-* 权限供 capabilities 引用
    tauri_build::try_build(
        tauri_build::Attributes::new().app_manifest(tauri_build::AppManifest::new().commands(&[
            "nav_go",
            "nav_back",
            "nav_forward",
            "nav_reload",
            "toggle_overlay",
            "template_navigate",
            "template_checkout",
            "overlay_ready",
            "surface_report",
            "open_external",
            "cart_list",
            "cart_add",
            "cart_remove",
            "cart_clear",
            "get_app_settings",
            "save_app_setting",
            "get_overlay_state",
        ])),
    )
    .expect("failed to run tauri-build");
}
