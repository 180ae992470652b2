// bin/chronochat.rs - ChronoChat CLI Tool
//
//! ChronoChat Command Line Interface
//!
//! Manages the local identity, the contact list and invitations.
//!
//! # Usage
//!
//! ```bash
//! # Create an identity
//! chronochat identity create /ndn/alice --nick alice
//!
//! # Hand your certificate to a contact
//! chronochat identity export ./alice.cert
//!
//! # Trust a contact
//! chronochat contact add bob ./bob.cert --introducer
//!
//! # Build a signed invitation
//! chronochat invite /ndn/bob lobby
//!
//! # Check an invitation you received
//! chronochat verify '/ndn/broadcast/chronos/invitation/...'
//! ```

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chronos_chat::config::ChatConfig;
use chronos_chat::name::Name;
use chronos_chat::observability::{init_metrics, init_tracing, TracingConfig};
use chronos_chat::packet::{Interest, SignedObject};
use chronos_chat::protocol::{Invitation, OutgoingInvitation};
use chronos_chat::trust::{now_ms, Certificate, Conf, Contact, ContactStore, Identity};
use chronos_chat::validator::{validate, StaticCertificates};

/// ChronoChat CLI Tool
#[derive(Parser, Debug)]
#[command(name = "chronochat")]
#[command(version)]
#[command(about = "ChronoChat - identities, contacts and chatroom invitations")]
#[command(long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (overrides the configured filter)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Local identity commands
    #[command(subcommand)]
    Identity(IdentityCommands),

    /// Contact list commands
    #[command(subcommand)]
    Contact(ContactCommands),

    /// Print a signed invitation for a contact
    Invite {
        /// Contact namespace
        contact: String,

        /// Chatroom name
        chatroom: String,

        /// Allow the invitee to introduce others
        #[arg(long)]
        introducer: bool,
    },

    /// Validate a signed invitation name against the contact list
    Verify {
        /// Invitation name (URI)
        invitation: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Generate a new key chain
    Create {
        /// Identity namespace, e.g. /ndn/alice
        namespace: String,

        /// Default nick
        #[arg(short, long)]
        nick: Option<String>,

        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },

    /// Show the local identity
    Show,

    /// Write the KSK certificate to a file
    Export {
        /// Output path
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ContactCommands {
    /// Trust a contact's KSK certificate
    Add {
        /// Display alias
        alias: String,

        /// Certificate file written by `identity export`
        certificate: PathBuf,

        /// Allow the contact to introduce others
        #[arg(long)]
        introducer: bool,
    },

    /// Remove a contact
    Remove {
        /// Contact namespace
        namespace: String,
    },

    /// List contacts
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ChatConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(addr) = args.metrics_addr {
        config.metrics.listen_addr = Some(addr);
    }

    let tracing = match &args.log_level {
        Some(level) => TracingConfig::from_level(level),
        None => config.tracing.clone(),
    };
    init_tracing(tracing);

    if config.metrics.listen_addr.is_some() {
        init_metrics(config.metrics.clone()).map_err(|e| anyhow::anyhow!("metrics: {e}"))?;
    }

    match &args.command {
        Commands::Identity(cmd) => cmd_identity(&args, &config, cmd),
        Commands::Contact(cmd) => cmd_contact(&args, &config, cmd),
        Commands::Invite {
            contact,
            chatroom,
            introducer,
        } => cmd_invite(&args, &config, contact, chatroom, *introducer),
        Commands::Verify { invitation } => cmd_verify(&args, &config, invitation).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn open_store(config: &ChatConfig) -> Result<ContactStore> {
    let path = config.data_dir.join("store");
    ContactStore::open(&path).with_context(|| format!("Failed to open store at {}", path.display()))
}

fn require_identity(store: &ContactStore) -> Result<Identity> {
    store
        .load_identity()?
        .context("No identity; run `chronochat identity create <namespace>` first")
}

fn parse_name(uri: &str) -> Result<Name> {
    Name::from_uri(uri).with_context(|| format!("Invalid name: {uri}"))
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

// =============================================================================
// Command Handlers
// =============================================================================

fn cmd_identity(args: &Args, config: &ChatConfig, cmd: &IdentityCommands) -> Result<()> {
    let store = open_store(config)?;

    match cmd {
        IdentityCommands::Create {
            namespace,
            nick,
            force,
        } => {
            if !force && store.load_identity()?.is_some() {
                bail!("An identity already exists; pass --force to replace it");
            }
            let namespace = parse_name(namespace)?;
            let identity = Identity::generate(namespace.clone())?;
            store.save_identity(&identity)?;

            let nick = nick
                .clone()
                .or_else(|| namespace.get(-1).map(|c| c.to_escaped()))
                .unwrap_or_default();
            store.save_conf(&Conf {
                identity: namespace.clone(),
                nick,
            })?;

            println!("{} {}", "Created identity".green(), namespace);
            println!("  {} {}", "KSK:".bold(), identity.ksk_certificate().name());
            println!("  {} {}", "DSK:".bold(), identity.dsk_certificate().name());
            Ok(())
        }

        IdentityCommands::Show => {
            let identity = require_identity(&store)?;
            let nick = store.load_conf()?.map(|conf| conf.nick).unwrap_or_default();
            let ksk = identity.ksk_certificate();
            let dsk = identity.dsk_certificate();

            if args.format == OutputFormat::Json {
                let json = serde_json::json!({
                    "namespace": identity.namespace().to_uri(),
                    "nick": nick,
                    "ksk": ksk.name().to_uri(),
                    "dsk": dsk.name().to_uri(),
                    "public_key": hex::encode(ksk.public_key().as_bytes()),
                    "dsk_not_after": dsk.not_after(),
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
                return Ok(());
            }

            println!("{}", identity.namespace().to_string().bold().cyan());
            println!("{}", "─".repeat(40));
            println!("  {} {}", "Nick:".bold(), nick);
            println!("  {} {}", "KSK:".bold(), ksk.name());
            println!("  {} {}", "Key:".bold(), ksk.public_key().short());
            println!("  {} {}", "DSK:".bold(), dsk.name());
            let status = if dsk.is_valid_at(now_ms()) {
                "valid".green()
            } else {
                "expired".red()
            };
            println!(
                "  {} {} until {}",
                "DSK status:".bold(),
                status,
                format_ms(dsk.not_after())
            );
            Ok(())
        }

        IdentityCommands::Export { output } => {
            let identity = require_identity(&store)?;
            std::fs::write(output, identity.ksk_certificate().to_bytes()?)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} {}", "Wrote".green(), output.display());
            Ok(())
        }
    }
}

fn read_certificate(path: &Path) -> Result<Certificate> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Certificate::from_bytes(&bytes).with_context(|| format!("{} is not a certificate", path.display()))
}

fn cmd_contact(args: &Args, config: &ChatConfig, cmd: &ContactCommands) -> Result<()> {
    let store = open_store(config)?;

    match cmd {
        ContactCommands::Add {
            alias,
            certificate,
            introducer,
        } => {
            let contact = Contact::new(alias.clone(), read_certificate(certificate)?)
                .with_introducer(*introducer);
            store.add_contact(&contact)?;
            store.flush()?;
            println!("{} {} ({})", "Added".green(), contact.namespace, contact.alias);
            Ok(())
        }

        ContactCommands::Remove { namespace } => {
            match store.remove_contact(&parse_name(namespace)?)? {
                Some(contact) => println!("{} {}", "Removed".green(), contact.namespace),
                None => println!("{} {}", "No such contact:".yellow(), namespace),
            }
            store.flush()?;
            Ok(())
        }

        ContactCommands::List => {
            let contacts = store.contacts()?;

            if args.format == OutputFormat::Json {
                let json: Vec<_> = contacts
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "namespace": c.namespace.to_uri(),
                            "alias": c.alias,
                            "certificate": c.certificate.name().to_uri(),
                            "introducer": c.is_introducer,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
                return Ok(());
            }

            if contacts.is_empty() {
                println!("{}", "No contacts".yellow());
                return Ok(());
            }
            println!("{:<30} {:<16} {}", "NAMESPACE".bold(), "ALIAS".bold(), "INTRODUCER".bold());
            for contact in contacts {
                println!(
                    "{:<30} {:<16} {}",
                    contact.namespace.to_uri(),
                    contact.alias,
                    if contact.is_introducer { "yes" } else { "no" }
                );
            }
            Ok(())
        }
    }
}

fn cmd_invite(
    args: &Args,
    config: &ChatConfig,
    contact: &str,
    chatroom: &str,
    introducer: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let identity = require_identity(&store)?;
    let namespace = parse_name(contact)?;
    let contact = store
        .contact(&namespace)?
        .with_context(|| format!("Unknown contact {namespace}"))?;

    let nick = store.load_conf()?.map(|conf| conf.nick).unwrap_or_default();
    let settings = config.session_settings(chatroom, nick)?;
    let invitation = Invitation::new(
        contact.namespace.clone(),
        chatroom,
        settings.chat_prefix(identity.namespace(), chatroom),
        identity.dsk_certificate().clone(),
        now_ms(),
    );
    let mut outgoing = OutgoingInvitation::new(invitation, introducer, config.invitation_retries);
    let interest = outgoing.send(&identity, &settings.broadcast_root)?;

    if args.format == OutputFormat::Json {
        let json = serde_json::json!({
            "invitee": contact.namespace.to_uri(),
            "chatroom": chatroom,
            "introducer": introducer,
            "name": interest.name().to_uri(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", interest.name());
    }
    Ok(())
}

async fn cmd_verify(args: &Args, config: &ChatConfig, invitation: &str) -> Result<()> {
    let store = open_store(config)?;
    let interest = Interest::new(parse_name(invitation)?);
    let broadcast_root = config.broadcast_root()?;
    let parsed = Invitation::parse_signed(&interest, &broadcast_root)?;

    let mut validator = config.validator()?;
    let anchors = store.load_anchors(validator.anchors_mut())?;

    // the inviter's certificate travels inside the invitation
    let mut fetcher = StaticCertificates::new();
    fetcher.insert(&parsed.inviter_certificate);

    let outcome = validate(&mut validator, SignedObject::from(interest), &fetcher).await;

    if args.format == OutputFormat::Json {
        let json = serde_json::json!({
            "inviter": parsed.inviter_namespace().to_uri(),
            "chatroom": parsed.chatroom,
            "anchors": anchors,
            "valid": outcome.is_ok(),
            "reason": outcome.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("  {} {}", "Inviter:".bold(), parsed.inviter_namespace());
    println!("  {} {}", "Chatroom:".bold(), parsed.chatroom);
    println!("  {} {}", "Sent:".bold(), format_ms(parsed.timestamp));
    match outcome {
        Ok(()) => println!("  {} {}", "Status:".bold(), "trusted".green()),
        Err(failure) => println!("  {} {} ({})", "Status:".bold(), "untrusted".red(), failure),
    }
    Ok(())
}
