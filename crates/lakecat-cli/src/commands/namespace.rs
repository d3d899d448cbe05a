//! Namespace subcommands.

use anyhow::Result;
use clap::Subcommand;
use lakecat_core::{Catalog, Identifier, Properties};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{parse_key_val, print_properties};

#[derive(Subcommand)]
pub enum NamespaceAction {
    /// List namespaces, optionally under a parent
    List {
        /// Dotted parent namespace
        parent: Option<Identifier>,
    },

    /// Create a namespace
    Create {
        namespace: Identifier,

        /// Property to set, as key=value
        #[arg(short, long = "property", value_parser = parse_key_val)]
        properties: Vec<(String, String)>,
    },

    /// Drop an empty namespace
    Drop { namespace: Identifier },

    /// Show namespace properties
    Describe { namespace: Identifier },

    /// Set and remove namespace properties
    Update {
        namespace: Identifier,

        /// Property to set, as key=value
        #[arg(long = "set", value_parser = parse_key_val)]
        updates: Vec<(String, String)>,

        /// Property key to remove
        #[arg(long = "remove")]
        removals: Vec<String>,
    },
}

pub async fn run(
    catalog: Arc<dyn Catalog>,
    ctx: &CancellationToken,
    action: NamespaceAction,
) -> Result<()> {
    match action {
        NamespaceAction::List { parent } => {
            let parent = parent.unwrap_or_else(Identifier::empty);
            for namespace in catalog.list_namespaces(ctx, &parent).await? {
                println!("{}", namespace);
            }
        }
        NamespaceAction::Create {
            namespace,
            properties,
        } => {
            let properties: Properties = properties.into_iter().collect();
            catalog
                .create_namespace(ctx, &namespace, &properties)
                .await?;
            println!("Created namespace {}", namespace);
        }
        NamespaceAction::Drop { namespace } => {
            catalog.drop_namespace(ctx, &namespace).await?;
            println!("Dropped namespace {}", namespace);
        }
        NamespaceAction::Describe { namespace } => {
            let properties = catalog.load_namespace_properties(ctx, &namespace).await?;
            print_properties(&properties);
        }
        NamespaceAction::Update {
            namespace,
            updates,
            removals,
        } => {
            let updates: Properties = updates.into_iter().collect();
            let summary = catalog
                .update_namespace_properties(ctx, &namespace, &removals, &updates)
                .await?;
            println!("Updated: {}", summary.updated.join(", "));
            println!("Removed: {}", summary.removed.join(", "));
            if !summary.missing.is_empty() {
                println!("Missing: {}", summary.missing.join(", "));
            }
        }
    }
    Ok(())
}
