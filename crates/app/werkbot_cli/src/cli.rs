use clap::{Parser, Subcommand};
use uuid::Uuid;
use werkbot_core::auth::jwt::ACCESS_TOKEN_EXPIRY_SECS;
use werkbot_core::models::session::Role;

#[derive(Parser, Debug)]
#[command(name = "werkbot", version, about = "Werkbot operator tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Print a bcrypt hash for seeding `users.password_hash`.
    HashPassword {
        /// Password to hash. Read from the first line of stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Print a random secret suitable for `JWT_SECRET`.
    GenerateSecret,

    /// Sign an access token with the configured secret.
    IssueToken {
        #[arg(long)]
        user_id: Uuid,

        #[arg(long)]
        email: String,

        /// owner, employee or customer.
        #[arg(long, default_value = "customer")]
        role: Role,

        #[arg(long)]
        workshop_id: Option<Uuid>,

        #[arg(long, requires = "workshop_id")]
        workshop_name: Option<String>,

        /// Lifetime in seconds.
        #[arg(long, default_value_t = ACCESS_TOKEN_EXPIRY_SECS)]
        expires_in: i64,

        /// Mark the token as a demo identity.
        #[arg(long, default_value_t = false)]
        mock: bool,
    },

    /// Verify an access token with the configured secret and print its claims.
    InspectToken {
        token: String,
    },
}
