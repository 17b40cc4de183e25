use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use async_trait::async_trait;
use clap::{ArgAction, Parser};
use rusoto_core::Region;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use assume_role::assume_role::{AssumeRoleParameters, RoleAssumer};
use assume_role::clock::SystemClock;
use assume_role::config::{load_config, Config};
use assume_role::handler::export::ExportCredentialsHandler;
use assume_role::handler::shell::ExecCredentialsHandler;
use assume_role::handler::{HandleCredentials, HandleCredentialsRequest};
use assume_role::mfa::{ReadMfaToken, StaticMfaTokenReader, StreamMfaTokenReader};
use assume_role::profile::store::ini::IniProfileStore;
use assume_role::provider::rusoto::RusotoIdentityProvider;
use assume_role::run::AssumeRoles;
use assume_role_schema::shell::Shell;

/// Assume an AWS role, prompting for MFA when the role requires it, and run
/// a command with the temporary credentials (or print them as shell exports).
#[derive(Parser, Debug)]
#[command(name = "assume-role", version)]
struct Args {
    /// Role name in the current account, or a full role ARN.
    #[arg(long)]
    role: String,

    /// Session name; defaults to the IAM user name.
    #[arg(long)]
    role_session_name: Option<String>,

    /// Path to assume-role.yaml; defaults to the nearest one above the working directory.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// MFA token code, skips the interactive prompt.
    #[arg(short, long)]
    token: Option<String>,

    /// MFA device to use with --token.
    #[arg(long, requires = "token")]
    mfa_serial: Option<String>,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Command to run with the credentials; prints shell exports when omitted.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("error:{:?}", e);
            report_error(&e, &mut io::stderr().lock());
            ExitCode::FAILURE
        }
    }
}

// tracing repeats the error at debug level only
fn report_error<W: Write>(err: &anyhow::Error, out: &mut W) {
    let _ = writeln!(out, "Error: {:#}", err);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins over -v
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    // stdout is reserved for the exports
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

enum MfaReader {
    Stdin(StreamMfaTokenReader<BufReader<io::Stdin>, io::Stderr>),
    Static(StaticMfaTokenReader),
}

#[async_trait]
impl ReadMfaToken for MfaReader {
    async fn select_mfa_device(&self, mfa_serials: &[String]) -> assume_role::Result<String> {
        use MfaReader::*;
        match self {
            Stdin(r) => r.select_mfa_device(mfa_serials).await,
            Static(r) => r.select_mfa_device(mfa_serials).await,
        }
    }

    async fn read_mfa_token(&self, mfa_serial: &str) -> assume_role::Result<String> {
        use MfaReader::*;
        match self {
            Stdin(r) => r.read_mfa_token(mfa_serial).await,
            Static(r) => r.read_mfa_token(mfa_serial).await,
        }
    }
}

fn mfa_reader_from(args: &Args) -> MfaReader {
    if let Some(token) = args.token.as_ref() {
        MfaReader::Static(StaticMfaTokenReader::from(token).with_mfa_serial(args.mfa_serial.clone()))
    } else {
        MfaReader::Stdin(StreamMfaTokenReader::new(
            BufReader::new(io::stdin()),
            io::stderr(),
        ))
    }
}

enum CredentialsHandler {
    Exec(ExecCredentialsHandler),
    Export(ExportCredentialsHandler<io::Stdout>),
}

impl HandleCredentials for CredentialsHandler {
    fn handle_credentials(self, request: HandleCredentialsRequest) -> anyhow::Result<()> {
        use CredentialsHandler::*;
        match self {
            Exec(h) => h.handle_credentials(request),
            Export(h) => h.handle_credentials(request),
        }
    }
}

fn handler_from(args: &Args) -> anyhow::Result<CredentialsHandler> {
    if args.command.is_empty() {
        Ok(CredentialsHandler::Export(ExportCredentialsHandler::new(
            Shell::from_env(),
            io::stdout(),
        )))
    } else {
        Ok(CredentialsHandler::Exec(ExecCredentialsHandler::new(
            args.command.clone(),
        )?))
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match args.config.as_ref() {
        Some(path) => load_config(path)?,
        None => Config::load_default()?,
    };

    let region = match args.region.as_deref() {
        Some(name) => Region::from_str(name)?,
        None => Region::default(),
    };
    let provider = RusotoIdentityProvider::new(region).with_duration_seconds(config.duration_seconds);

    let assumer = RoleAssumer::new(
        provider,
        IniProfileStore::from_env()?,
        mfa_reader_from(&args),
        SystemClock,
        config,
    );
    let assume_roles =
        AssumeRoles::new(assumer, handler_from(&args)?).with_region_name(args.region.clone());

    let params = AssumeRoleParameters::new(args.role.as_str())
        .with_role_session_name(args.role_session_name.clone());
    assume_roles.run(params).await
}
