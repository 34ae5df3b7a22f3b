#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for probing a mailbox store's lifecycle support

use clap::{Parser, Subcommand};
use mailbox_probe::{Endpoint, ImapSession, LifecycleProbe, ProbeConfig, utf7};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "probe-cli")]
#[command(
    about = "Exercise a mailbox store's create/list/status/rename/acl/delete lifecycle"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full mailbox lifecycle probe
    Run {
        /// Endpoint spec string, e.g. "{localhost:143/imap/notls}".
        /// Defaults to the endpoint from the environment.
        #[arg(long)]
        endpoint: Option<String>,

        /// Namespace prefix for the probe mailbox
        #[arg(long)]
        namespace: Option<String>,

        /// Display name for the created mailbox
        #[arg(long, default_value = "probebox")]
        name: String,

        /// Display name the mailbox is renamed to
        #[arg(long, default_value = "probeböx")]
        rename_to: String,

        /// Principal granted rights by the set-acl step
        #[arg(long, default_value = "anyone")]
        principal: String,

        /// Rights string granted to the principal
        #[arg(long, default_value = "c")]
        rights: String,
    },

    /// Encode a display name to its transport form
    Encode {
        /// Display name (may contain non-ASCII characters)
        name: String,
    },

    /// Decode a transport-form name to its display form
    Decode {
        /// Transport-form name (7-bit modified UTF-7)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match &args.command {
        Command::Run {
            endpoint,
            namespace,
            name,
            rename_to,
            principal,
            rights,
        } => {
            cmd_run(
                &args,
                endpoint.as_deref(),
                namespace.as_deref(),
                name,
                rename_to,
                principal,
                rights,
            )
            .await
        }
        Command::Encode { name } => {
            println!("{}", utf7::encode(name)?);
            Ok(())
        }
        Command::Decode { name } => {
            println!("{}", utf7::decode(name)?);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    args: &Args,
    endpoint: Option<&str>,
    namespace: Option<&str>,
    name: &str,
    rename_to: &str,
    principal: &str,
    rights: &str,
) -> anyhow::Result<()> {
    let config = ProbeConfig::from_env()?;
    let endpoint: Endpoint = match endpoint {
        Some(spec) => spec.parse()?,
        None => config.endpoint(),
    };
    let namespace = namespace.unwrap_or(&config.namespace);

    let session =
        ImapSession::open(&endpoint, &config.username, &config.password).await?;

    let probe = LifecycleProbe::new(endpoint, namespace)
        .with_names(name, rename_to)
        .with_acl(principal, rights);
    let report = probe.run(session).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
