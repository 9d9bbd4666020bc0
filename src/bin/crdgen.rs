//! # CRD Generator
//!
//! Generates Kubernetes CustomResourceDefinition (CRD) YAML from the Rust type
//! definitions in the library.
//!
//! ## Usage
//!
//! ```bash
//! # All CRDs
//! cargo run --bin crdgen > config/crd/vault-config-controller.yaml
//!
//! # A single kind, applied directly
//! cargo run --bin crdgen -- --kind policy | kubectl apply -f -
//! ```

use clap::{Parser, ValueEnum};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::CustomResourceExt;
use vault_config_controller::crd::{VaultKVMount, VaultMount, VaultPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Mount,
    KvMount,
    Policy,
}

/// Print the CRDs served by the Vault Config Controller
#[derive(Debug, Parser)]
#[command(name = "crdgen")]
struct Cli {
    /// Only print the CRD for this kind
    #[arg(long, value_enum)]
    kind: Option<Kind>,
}

fn crds(kind: Option<Kind>) -> Vec<CustomResourceDefinition> {
    match kind {
        Some(Kind::Mount) => vec![VaultMount::crd()],
        Some(Kind::KvMount) => vec![VaultKVMount::crd()],
        Some(Kind::Policy) => vec![VaultPolicy::crd()],
        None => vec![VaultMount::crd(), VaultKVMount::crd(), VaultPolicy::crd()],
    }
}

fn main() {
    let cli = Cli::parse();

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    for crd in crds(cli.kind) {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
