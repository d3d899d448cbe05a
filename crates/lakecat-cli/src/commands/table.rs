//! Table subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use lakecat_core::options::{with_location, with_properties};
use lakecat_core::table::Schema;
use lakecat_core::{Catalog, Identifier, Properties, Table};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{parse_key_val, print_properties};

#[derive(Subcommand)]
pub enum TableAction {
    /// List tables in a namespace
    List { namespace: Identifier },

    /// Create a table from a JSON schema file
    Create {
        table: Identifier,

        /// Path to an Iceberg schema in JSON form
        #[arg(short, long)]
        schema: PathBuf,

        /// Table location; defaults to the warehouse layout
        #[arg(short, long)]
        location: Option<String>,

        /// Table property, as key=value
        #[arg(short, long = "property", value_parser = parse_key_val)]
        properties: Vec<(String, String)>,
    },

    /// Show table metadata
    Describe {
        table: Identifier,

        /// Print the full metadata document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a table from the catalog
    Drop { table: Identifier },

    /// Rename a table
    Rename { from: Identifier, to: Identifier },
}

pub async fn run(
    catalog: Arc<dyn Catalog>,
    ctx: &CancellationToken,
    action: TableAction,
) -> Result<()> {
    match action {
        TableAction::List { namespace } => {
            for table in catalog.list_tables(ctx, &namespace).await? {
                println!("{}", table);
            }
        }
        TableAction::Create {
            table,
            schema,
            location,
            properties,
        } => {
            let content = tokio::fs::read_to_string(&schema)
                .await
                .with_context(|| format!("reading schema file {}", schema.display()))?;
            let schema: Schema = serde_json::from_str(&content)
                .with_context(|| format!("parsing schema file {}", schema.display()))?;

            let mut options = vec![with_properties(properties.into_iter().collect::<Properties>())];
            if let Some(location) = location {
                options.push(with_location(location));
            }

            let created = catalog.create_table(ctx, &table, schema, options).await?;
            println!("Created table {}", created.identifier());
            println!("Metadata: {}", created.metadata_location());
        }
        TableAction::Describe { table, json } => {
            let table = catalog.load_table(ctx, &table, &Properties::new()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(table.metadata())?);
            } else {
                print_summary(&table);
            }
        }
        TableAction::Drop { table } => {
            catalog.drop_table(ctx, &table).await?;
            println!("Dropped table {}", table);
        }
        TableAction::Rename { from, to } => {
            let renamed = catalog.rename_table(ctx, &from, &to).await?;
            println!("Renamed {} to {}", from, renamed.identifier());
        }
    }
    Ok(())
}

fn print_summary(table: &Table) {
    let metadata = table.metadata();
    println!("Table:            {}", table.identifier());
    println!("UUID:             {}", metadata.table_uuid);
    println!("Format version:   {}", metadata.format_version);
    println!("Location:         {}", table.location());
    println!("Metadata:         {}", table.metadata_location());
    match table.current_snapshot_id() {
        Some(id) => println!("Current snapshot: {}", id),
        None => println!("Current snapshot: none"),
    }
    println!("Snapshots:        {}", metadata.snapshots.len());

    if let Some(schema) = metadata.current_schema() {
        println!();
        println!("Schema {}:", schema.schema_id);
        for field in &schema.fields {
            let required = if field.required { "required" } else { "optional" };
            println!(
                "  {:>3}  {:<24} {:<16} {}",
                field.id,
                field.name,
                field.type_string(),
                required
            );
        }
    }

    if !table.properties().is_empty() {
        println!();
        println!("Properties:");
        print_properties(table.properties());
    }
}
