use std::path::PathBuf;

use clap::Subcommand;
use meeting_reminder_core::integrations::{google, GoogleAuth, GoogleCredentials};
use meeting_reminder_core::storage::data_dir;
use meeting_reminder_core::Config;

use super::CliResult;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Google Calendar: login / logout / status
    Google {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Authenticate in the browser and store the token
    Login {
        /// OAuth client ID (stored in the keyring together with the secret)
        #[arg(long, requires = "client_secret")]
        client_id: Option<String>,
        /// OAuth client secret
        #[arg(long, requires = "client_id")]
        client_secret: Option<String>,
        /// Google client-secret JSON downloaded from the API console
        #[arg(long, conflicts_with = "client_id")]
        credentials_file: Option<PathBuf>,
    },
    /// Remove the stored token
    Logout {
        /// Also remove the client id/secret saved by `login --client-id`
        #[arg(long)]
        forget_credentials: bool,
    },
    /// Check authentication status
    Status,
}

pub async fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::Google { action: op } => handle_google(op).await,
    }
}

async fn handle_google(op: AuthOp) -> CliResult {
    let config = Config::load()?;
    let store = config.calendar.token_store(&data_dir()?);

    match op {
        AuthOp::Login {
            client_id,
            client_secret,
            credentials_file,
        } => {
            let credentials = match (client_id, client_secret) {
                (Some(client_id), Some(client_secret)) => {
                    let credentials = GoogleCredentials {
                        client_id,
                        client_secret,
                    };
                    credentials.save_to_keyring()?;
                    credentials
                }
                _ => {
                    let file = credentials_file.or_else(|| config.calendar.credentials_path());
                    GoogleCredentials::resolve(file.as_deref())?
                }
            };
            GoogleAuth::new(&credentials, store).login().await?;
            println!("Google authenticated");
        }
        AuthOp::Logout { forget_credentials } => {
            store.delete(google::SERVICE)?;
            if forget_credentials {
                GoogleCredentials::clear_keyring()?;
            }
            println!("Google disconnected");
        }
        AuthOp::Status => match store.load(google::SERVICE)? {
            Some(tokens) if tokens.is_expired() && tokens.refresh_token.is_none() => {
                println!("token expired")
            }
            Some(_) => println!("authenticated"),
            None => println!("not authenticated"),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        op: AuthOp,
    }

    #[test]
    fn logout_keeps_credentials_by_default() {
        let parsed = Harness::try_parse_from(["auth", "logout"]).unwrap();
        assert!(matches!(parsed.op, AuthOp::Logout { forget_credentials: false }));
    }

    #[test]
    fn logout_can_forget_credentials() {
        let parsed = Harness::try_parse_from(["auth", "logout", "--forget-credentials"]).unwrap();
        assert!(matches!(parsed.op, AuthOp::Logout { forget_credentials: true }));
    }
}
