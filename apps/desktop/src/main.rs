use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, load_settings_from, ClientSettings, Notification, NotificationKind, Notifier,
    ProfileScreen, ProfileStore, ProfileView, RemoteClient, RootView, SaveOutcome,
    SessionController, SupabaseClient,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "desktop", about = "Headless profile sync client")]
struct Args {
    /// Settings file; defaults to ./profile_sync.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print which screen the app would show.
    Status,
    /// Load (or create) and print the signed-in user's profile.
    Show,
    Update {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        device_info: Option<String>,
    },
    SignOut,
    /// Follow session changes until interrupted.
    Watch,
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => {
                eprintln!("{}: {}", notification.title, notification.message)
            }
            NotificationKind::Success | NotificationKind::Info => {
                println!("{}: {}", notification.title, notification.message)
            }
        }
    }
}

struct App {
    settings: ClientSettings,
    remote: Arc<dyn RemoteClient>,
}

impl App {
    fn profile_screen(&self, controller: &SessionController) -> ProfileScreen {
        let store = Arc::new(ProfileStore::with_table(
            Arc::clone(&self.remote),
            self.settings.profile_table.clone(),
        ));
        ProfileScreen::new(
            Arc::clone(&self.remote),
            store,
            Arc::new(ConsoleNotifier),
            controller.sign_out_callback(),
        )
    }

    /// Mounts the controller and waits for the first session read.
    async fn controller(&self) -> SessionController {
        let controller = SessionController::mount(Arc::clone(&self.remote));
        controller.ready().await;
        controller
    }

    async fn signed_in_screen(&self, controller: &SessionController) -> Result<ProfileScreen> {
        if controller.route() != RootView::Profile {
            bail!("not signed in; run `desktop sign-in` first");
        }
        let screen = self.profile_screen(controller);
        screen.mount().await;
        Ok(screen)
    }
}

fn route_label(route: RootView) -> &'static str {
    match route {
        RootView::Loading => "loading",
        RootView::Profile => "profile",
        RootView::Authentication => "authentication",
    }
}

fn render_profile(view: &ProfileView) -> Vec<String> {
    let mut lines = vec![
        format!("Email:       {}", view.email.as_deref().unwrap_or("-")),
        format!("Full name:   {}", view.full_name),
        format!("Device info: {}", view.device_info),
    ];
    if let Some(account) = &view.account {
        lines.push(format!("User ID:     {}", account.user_id));
        if let Some(created) = &account.created {
            lines.push(format!("Created:     {created}"));
        }
    }
    lines
}

async fn run(app: App, command: Command) -> Result<()> {
    match command {
        Command::SignIn { email, password } => {
            let controller = app.controller().await;
            let session = app.remote.sign_in_with_password(&email, &password).await?;
            controller.on_auth_success(Some(&session));
            println!("Signed in as {}", session.user.email.as_deref().unwrap_or(&email));
        }
        Command::SignUp { email, password } => {
            let controller = app.controller().await;
            match app.remote.sign_up(&email, &password).await? {
                Some(session) => {
                    controller.on_auth_success(Some(&session));
                    println!("Account created; signed in as {email}");
                }
                None => println!("Account created; confirm {email} before signing in"),
            }
        }
        Command::Status => {
            let controller = app.controller().await;
            let state = controller.state();
            println!("Route: {}", route_label(state.route()));
            if let Some(session) = state.session {
                println!("User:  {}", session.user.id);
            }
        }
        Command::Show => {
            let controller = app.controller().await;
            let screen = app.signed_in_screen(&controller).await?;
            for line in render_profile(&screen.view()) {
                println!("{line}");
            }
        }
        Command::Update {
            full_name,
            device_info,
        } => {
            let controller = app.controller().await;
            let screen = app.signed_in_screen(&controller).await?;
            if let Some(full_name) = full_name {
                screen.set_full_name(full_name);
            }
            if let Some(device_info) = device_info {
                screen.set_device_info(device_info);
            }
            match screen.save().await {
                SaveOutcome::Saved => {
                    for line in render_profile(&screen.view()) {
                        println!("{line}");
                    }
                }
                SaveOutcome::Failed => bail!("profile update failed"),
                outcome => bail!("profile update not sent ({outcome:?})"),
            }
        }
        Command::SignOut => {
            let controller = app.controller().await;
            let screen = app.profile_screen(&controller);
            screen.sign_out().await?;
            println!("Route: {}", route_label(controller.route()));
        }
        Command::Watch => {
            let controller = app.controller().await;
            let mut rx = controller.subscribe();
            println!("Route: {}", route_label(rx.borrow_and_update().route()));
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        println!("Route: {}", route_label(rx.borrow_and_update().route()));
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("watch interrupted");
                        break;
                    }
                }
            }
            controller.unmount();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };
    let remote = Arc::new(SupabaseClient::from_settings(&settings)?);
    run(App { settings, remote }, args.command).await
}
