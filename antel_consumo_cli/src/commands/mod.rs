pub mod check_login;
pub mod fetch;
pub mod watch;

use anyhow::{bail, Result};
use antel_consumo_lib::Credentials;
use clap::Args;

/// Portal account, shared by every subcommand.
#[derive(Args)]
pub struct AccountArgs {
    /// Portal username (document number or e-mail)
    #[arg(long, env = "ANTEL_USER", global = true)]
    pub username: Option<String>,

    /// Portal password
    #[arg(long, env = "ANTEL_PASS", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Service identifier, when the account holds several services
    #[arg(long, env = "ANTEL_SERVICE_ID", global = true)]
    pub service_id: Option<String>,
}

impl AccountArgs {
    pub fn credentials(&self) -> Result<Credentials> {
        let username = match self.username.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u,
            _ => bail!("username is required (--username or ANTEL_USER)"),
        };
        let password = match self.password.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => bail!("password is required (--password or ANTEL_PASS)"),
        };
        let mut credentials = Credentials::new(username, password);
        if let Some(id) = &self.service_id {
            credentials = credentials.with_service_id(id.as_str());
        }
        Ok(credentials)
    }
}
