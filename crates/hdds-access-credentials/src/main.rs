// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS Credential Checker CLI
//!
//! Validate the access-control credentials of a participant before deploying it.
//!
//! # Usage
//!
//! ```bash
//! # Load and verify permissions CA, governance and permissions
//! hdds-credcheck check security.yaml
//!
//! # Show how a property value is interpreted
//! hdds-credcheck resolve "file:///etc/dds/permissions_ca.pem"
//! ```
//!
//! `security.yaml` maps property names to values:
//!
//! ```yaml
//! dds.sec.access.permissions_ca: file:certs/permissions_ca.pem
//! dds.sec.access.governance: file:governance.p7s
//! dds.sec.access.permissions: file:permissions.p7s
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdds_access_credentials::{
    resolve, AccessCredentials, CredentialReference, GovernanceRules, PermissionsGrants,
    PropertyList, SignedDocument,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hdds-credcheck")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check DDS Security access-control credentials (permissions CA, governance, permissions)")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose mode (show load steps)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load and verify the credentials named in a YAML property file
    Check {
        /// Property file (mapping or list of name/value entries)
        properties: PathBuf,
    },
    /// Print how a property value resolves
    Resolve {
        /// Property value, e.g. file:ca.pem, data:,..., pkcs11:...
        value: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("hdds_access_credentials=debug,hdds_credcheck=debug")
    } else {
        EnvFilter::new("hdds_access_credentials=warn,hdds_credcheck=info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Command::Check { properties } => check(&properties),
        Command::Resolve { value } => {
            print_reference(&resolve(&value));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check(path: &Path) -> Result<ExitCode> {
    let props = PropertyList::from_yaml_file(path)
        .with_context(|| format!("Failed to read property file {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = props.len(), "Loaded property file");

    let mut credentials = AccessCredentials::new();
    if let Err(failure) = credentials.load(&props) {
        let exception = failure.to_exception();
        println!("FAILED  {}", failure.artifact());
        println!("  code:       {}", exception.code);
        println!("  minor_code: {}", exception.minor_code);
        println!("  message:    {}", exception.message);
        return Ok(ExitCode::FAILURE);
    }

    let anchor = credentials.trust_anchor()?;
    println!("OK");
    println!("permissions CA");
    println!("  subject:     {}", anchor.subject_name());
    println!("  serial:      {}", anchor.serial_hex());
    println!("  sha256:      {}", anchor.fingerprint_sha256());

    let governance = credentials.governance_document()?;
    print_document("governance", governance);
    match GovernanceRules::from_document(governance) {
        Ok(rules) => println!("  domain rules: {}", rules.domain_rules.len()),
        Err(e) => tracing::warn!("Governance content not understood: {}", e),
    }

    let permissions = credentials.permissions_document()?;
    print_document("permissions", permissions);
    match PermissionsGrants::from_document(permissions) {
        Ok(grants) => {
            for grant in &grants.grants {
                println!("  grant:       {} ({})", grant.name, grant.subject_name);
            }
        }
        Err(e) => tracing::warn!("Permissions content not understood: {}", e),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_document(label: &str, document: &SignedDocument) {
    println!("{}", label);
    println!("  signer:      {}", document.signer_subject());
    println!("  content:     {} bytes", document.content().len());
}

fn print_reference(reference: &CredentialReference) {
    match reference {
        CredentialReference::File(path) => println!("file      {}", path.display()),
        CredentialReference::Data(bytes) => println!("data      {} bytes inline", bytes.len()),
        CredentialReference::KeyStore(token) => println!("pkcs11    {}", token),
    }
}
