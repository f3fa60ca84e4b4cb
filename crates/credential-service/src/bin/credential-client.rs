//! Command-line client for the credential service.
//!
//! ```text
//! credential-client create -u alice -p 'Secur3@pw'
//! credential-client auth -u alice -p 'Secur3@pw' --tls --ca-file ca.pem
//! ```

#![warn(clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use proto_gen::credentials::auth_client::AuthClient;
use proto_gen::credentials::{AuthenticateRequest, CreateUserRequest};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "credential-client", about = "Create users and request tokens")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new user
    Create(CredentialArgs),
    /// Authenticate and print a token
    Auth(CredentialArgs),
}

#[derive(Debug, Args)]
struct CredentialArgs {
    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    password: String,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// Server address
    #[arg(short, long, global = true, default_value = "http://localhost:50051")]
    addr: String,

    /// Connect over TLS
    #[arg(long, global = true)]
    tls: bool,

    /// CA certificate used to verify the server
    #[arg(long, global = true)]
    ca_file: Option<PathBuf>,

    /// Client certificate for mutual TLS
    #[arg(long, global = true, requires = "key_file")]
    cert_file: Option<PathBuf>,

    /// Client private key for mutual TLS
    #[arg(long, global = true, requires = "cert_file")]
    key_file: Option<PathBuf>,

    /// Server name to verify against the certificate
    #[arg(long, global = true)]
    domain: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let channel = connect(&cli.connection).await?;
    let mut client = AuthClient::new(channel);

    let result = match cli.command {
        Command::Create(args) => client
            .create_user(CreateUserRequest {
                username: args.username,
                password: args.password,
            })
            .await
            .map(|response| format!("success: {}", response.into_inner().success)),
        Command::Auth(args) => client
            .authenticate(AuthenticateRequest {
                username: args.username,
                password: args.password,
            })
            .await
            .map(|response| response.into_inner().token),
    };

    match result {
        Ok(output) => {
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(status) => {
            eprintln!("error: {:?}: {}", status.code(), status.message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn connect(args: &ConnectionArgs) -> Result<Channel> {
    let mut endpoint = Channel::from_shared(args.addr.clone())
        .with_context(|| format!("invalid server address: {}", args.addr))?
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(REQUEST_TIMEOUT);

    if args.tls {
        endpoint = endpoint
            .tls_config(client_tls_config(args)?)
            .context("invalid TLS configuration")?;
    }

    endpoint
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", args.addr))
}

fn client_tls_config(args: &ConnectionArgs) -> Result<ClientTlsConfig> {
    let mut tls = ClientTlsConfig::new();

    if let Some(domain) = &args.domain {
        tls = tls.domain_name(domain.clone());
    }
    if let Some(ca_file) = &args.ca_file {
        tls = tls.ca_certificate(Certificate::from_pem(read_pem(ca_file)?));
    } else {
        tls = tls.with_native_roots();
    }
    if let (Some(cert_file), Some(key_file)) = (&args.cert_file, &args.key_file) {
        tls = tls.identity(Identity::from_pem(
            read_pem(cert_file)?,
            read_pem(key_file)?,
        ));
    }

    Ok(tls)
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
