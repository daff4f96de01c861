use std::{path::PathBuf, sync::Arc};

mod backend_bridge;
mod controller;
mod ui;

use anyhow::{anyhow, Context};
use clap::Parser;
use client_core::{
    load_settings, load_settings_from, ProfileScreen, ProfileStore, RemoteClient,
    SessionController, SupabaseClient,
};
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use backend_bridge::{
    commands::BackendCommand,
    runtime::{launch, BackendServices, ChannelNotifier},
};
use controller::events::UiEvent;
use ui::{ProfileSyncApp, LAST_EMAIL_STORAGE_KEY};

#[derive(Parser, Debug)]
#[command(name = "desktop_gui", about = "Desktop profile editor backed by Supabase")]
struct Args {
    /// Settings file; defaults to ./profile_sync.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build backend runtime")?;

    let remote: Arc<dyn RemoteClient> = Arc::new(SupabaseClient::from_settings(&settings)?);
    let controller = SessionController::mount_on(runtime.handle(), Arc::clone(&remote));

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(256);

    let store = Arc::new(ProfileStore::with_table(
        Arc::clone(&remote),
        settings.profile_table.clone(),
    ));
    let profile = Arc::new(ProfileScreen::new(
        Arc::clone(&remote),
        store,
        Arc::new(ChannelNotifier::new(ui_tx.clone())),
        controller.sign_out_callback(),
    ));
    launch(
        runtime.handle().clone(),
        BackendServices {
            remote,
            profile: Arc::clone(&profile),
        },
        cmd_rx,
        ui_tx,
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Profile Sync")
            .with_inner_size([520.0, 640.0])
            .with_min_inner_size([380.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Profile Sync",
        options,
        Box::new(move |cc| {
            let last_email = cc
                .storage
                .and_then(|storage| storage.get_string(LAST_EMAIL_STORAGE_KEY));
            Ok(Box::new(ProfileSyncApp::new(
                controller, profile, cmd_tx, ui_rx, last_email,
            )))
        }),
    )
    .map_err(|err| anyhow!("desktop gui exited with error: {err}"))
}
