// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::io::BufRead;

use chrono::{Duration, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use log::{info, warn};
use werkbot_core::auth::jwt::{TokenSigner, generate_secret, resolve_jwt_secret};
use werkbot_core::auth::password::{check_password_policy, hash_password};
use werkbot_core::environment::Environment;
use werkbot_core::models::auth::AccessClaims;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::HashPassword { password } => {
            let password = match password {
                Some(p) => p,
                None => read_stdin_line()?,
            };
            if password.trim() != password {
                warn!("the password has leading or trailing whitespace");
            }
            check_password_policy(&password)?;
            println!("{}", hash_password(&password)?);
        }
        Commands::GenerateSecret => {
            println!("{}", generate_secret());
        }
        Commands::IssueToken {
            user_id,
            email,
            role,
            workshop_id,
            workshop_name,
            expires_in,
            mock,
        } => {
            let now = Utc::now();
            let lifetime = Duration::try_seconds(expires_in)
                .filter(|d| *d > Duration::zero() && now.checked_add_signed(*d).is_some())
                .ok_or_else(|| {
                    Error::Custom(format!("--expires-in {expires_in} is not a usable lifetime"))
                })?;
            let mut claims = AccessClaims::new(user_id, email, role, now, lifetime);
            claims.workshop_id = workshop_id;
            claims.workshop_name = workshop_name;
            if mock {
                claims = claims.mock();
            }
            let token = signer()?.sign_access(&claims)?;
            info!("issued {role} token for {user_id}, valid {expires_in}s");
            println!("{token}");
        }
        Commands::InspectToken { token } => {
            let claims = signer()?.verify_access_token(token.trim())?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}

fn signer() -> Result<TokenSigner> {
    let secret = resolve_jwt_secret(Environment::from_env())?;
    Ok(TokenSigner::new(secret.as_bytes()))
}

fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        return Err(Error::Custom("no password given on stdin".into()));
    }
    Ok(line)
}
