mod db;
mod models;
mod store;
mod subscriptions;

use std::sync::Mutex;

use db::Database;
use log::warn;
use models::Dialog;
use store::SubscriptionStore;
use subscriptions::commands::{
    add_subscription, delete_subscription, list_subscriptions, mark_session, renew_subscription,
    unmark_session, update_subscription,
};
use tauri::{Emitter, Manager, State};

pub(crate) struct AppState {
    pub(crate) store: SubscriptionStore,
    pub(crate) dialog: Mutex<Dialog>,
}

#[tauri::command]
fn get_dialog(state: State<AppState>) -> Result<Dialog, String> {
    Ok(state.dialog.lock().unwrap().clone())
}

#[tauri::command]
fn open_dialog(dialog: Dialog, state: State<AppState>) -> Result<Dialog, String> {
    // Opening replaces whatever dialog was showing; at most one is open.
    let mut guard = state.dialog.lock().unwrap();
    *guard = dialog.clone();
    Ok(dialog)
}

#[tauri::command]
fn close_dialog(state: State<AppState>) -> Result<(), String> {
    *state.dialog.lock().unwrap() = Dialog::None;
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Punchcard starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let db_path = app_data_dir.join("punchcard.sqlite3");
                let database = Database::new(db_path)?;

                let store = tauri::async_runtime::block_on(SubscriptionStore::load(database))?;

                // Re-render signal for the webview: every successful mutation
                // pushes the new full collection.
                let app_handle = app.handle().clone();
                store.subscribe(move |records| {
                    if let Err(err) = app_handle.emit("subscriptions-changed", records) {
                        warn!("Failed to emit subscriptions-changed: {err}");
                    }
                });

                app.manage(AppState {
                    store,
                    dialog: Mutex::new(Dialog::None),
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            list_subscriptions,
            add_subscription,
            update_subscription,
            renew_subscription,
            mark_session,
            unmark_session,
            delete_subscription,
            get_dialog,
            open_dialog,
            close_dialog,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
