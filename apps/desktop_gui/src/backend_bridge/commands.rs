//! Backend commands queued from UI to backend worker.

pub enum BackendCommand {
    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    /// Load-or-create for a profile screen mounted under `generation`.
    MountProfile { generation: u64 },
    SaveProfile,
    SignOut,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::SignIn { .. } => "sign_in",
            BackendCommand::SignUp { .. } => "sign_up",
            BackendCommand::MountProfile { .. } => "mount_profile",
            BackendCommand::SaveProfile => "save_profile",
            BackendCommand::SignOut => "sign_out",
        }
    }

    /// Issued from the auth screen, whose status line reports its failures.
    pub fn from_auth_screen(&self) -> bool {
        matches!(self, BackendCommand::SignIn { .. } | BackendCommand::SignUp { .. })
    }
}
