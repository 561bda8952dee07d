use std::process::ExitCode;

use chrono::TimeDelta;
use clap::Parser;
use tenant_gate::services::auth::{Role, TokenService};

/// Issue an access token (compact JWE, dir + A256GCM) for local testing.
///
/// The key is read from TOKEN_SECRET_HEX (a `.env` file is honored), the same key
/// the server verifies with.
#[derive(Parser, Debug)]
#[command(name = "token-gen", version, about)]
struct Args {
    /// Internal user id
    #[arg(long)]
    user_id: i64,

    /// Tenant id (must match the tenant resolved from the request host)
    #[arg(long)]
    tenant_id: String,

    /// Role: an integer is a role id, anything else a role name
    #[arg(long, default_value = "member")]
    role: String,

    /// Lifetime in seconds. Negative values issue an already expired token.
    #[arg(
        long,
        env = "ACCESS_TOKEN_TTL_SECONDS",
        default_value_t = 28_800,
        allow_negative_numbers = true
    )]
    ttl_seconds: i64,
}

fn parse_role(raw: &str) -> Role {
    raw.parse::<i64>()
        .map(Role::Id)
        .unwrap_or_else(|_| Role::Name(raw.to_string()))
}

fn issue(tokens: &TokenService, args: &Args) -> Result<String, String> {
    let ttl = TimeDelta::try_seconds(args.ttl_seconds)
        .ok_or_else(|| format!("--ttl-seconds out of range: {}", args.ttl_seconds))?;

    tokens
        .issue(args.user_id, &args.tenant_id, parse_role(&args.role), ttl)
        .map_err(|err| format!("failed to issue token: {err}"))
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let Ok(secret_hex) = std::env::var("TOKEN_SECRET_HEX") else {
        eprintln!("TOKEN_SECRET_HEX is not set");
        return ExitCode::FAILURE;
    };

    let tokens = match TokenService::from_hex(secret_hex.trim()) {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("invalid TOKEN_SECRET_HEX: {err}");
            return ExitCode::FAILURE;
        }
    };

    match issue(&tokens, &args) {
        Ok(token) => {
            println!("{token}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
