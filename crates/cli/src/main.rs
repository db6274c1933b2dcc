//! Threadline CLI - Database migrations and store operations.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! tl-cli migrate
//!
//! # Seed the catalog from a YAML file
//! tl-cli seed catalog.yaml
//!
//! # Receive 10 units of a variant
//! tl-cli inventory adjust --variant 6f1c... --delta 10
//!
//! # Show the most recent orders
//! tl-cli orders list --limit 20
//!
//! # Place an order and open its Razorpay order
//! tl-cli checkout --item 6f1c...:2 --customer customer.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Create products, variants, and stock from YAML
//! - `inventory` - Inspect and adjust on-hand stock
//! - `orders` - List and inspect orders
//! - `checkout` - Place an order with configured pricing
//! - `payments` - Open provider orders and replay webhooks

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use threadline_core::{OrderId, VariantId};

mod commands;

const DEFAULT_LOG_FILTER: &str = "threadline_cli=info,threadline_commerce=info";

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Threadline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog from a YAML file
    Seed {
        /// Path to the catalog YAML file
        file: String,
    },
    /// Inspect and adjust inventory
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
    /// List and inspect orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Place an order from cart lines
    Checkout {
        /// Cart line as VARIANT_ID:QUANTITY (repeatable)
        #[arg(short, long = "item", required = true, value_parser = commands::checkout::parse_item)]
        items: Vec<(VariantId, i32)>,

        /// Path to the customer YAML file
        #[arg(short, long)]
        customer: String,
    },
    /// Provider payment operations
    Payments {
        #[command(subcommand)]
        action: PaymentsAction,
    },
}

#[derive(Subcommand)]
enum InventoryAction {
    /// Show a variant's on-hand and reserved counts
    Show {
        /// Variant ID
        #[arg(short, long)]
        variant: VariantId,
    },
    /// Change a variant's on-hand count
    Adjust {
        /// Variant ID
        #[arg(short, long)]
        variant: VariantId,

        /// Units to add (negative to remove)
        #[arg(short, long, allow_hyphen_values = true)]
        delta: i32,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List the most recent orders
    List {
        /// Maximum number of orders (1-200)
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Show one order with its lines and payment
    Show {
        /// Order ID
        id: OrderId,
    },
}

#[derive(Subcommand)]
enum PaymentsAction {
    /// Open the Razorpay order for a pending order
    Open {
        /// Order ID
        id: OrderId,
    },
    /// Verify and apply a saved webhook body
    Webhook {
        /// Path to the raw webhook body
        #[arg(short, long)]
        file: String,

        /// Value of the X-Razorpay-Signature header
        #[arg(short, long)]
        signature: String,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::catalog(&file).await?,
        Commands::Inventory { action } => match action {
            InventoryAction::Show { variant } => commands::inventory::show(variant).await?,
            InventoryAction::Adjust { variant, delta } => {
                commands::inventory::adjust(variant, delta).await?;
            }
        },
        Commands::Orders { action } => match action {
            OrdersAction::List { limit } => commands::orders::list(limit).await?,
            OrdersAction::Show { id } => commands::orders::show(id).await?,
        },
        Commands::Checkout { items, customer } => commands::checkout::run(&items, &customer).await?,
        Commands::Payments { action } => match action {
            PaymentsAction::Open { id } => commands::payments::open(id).await?,
            PaymentsAction::Webhook { file, signature } => {
                commands::payments::webhook(&file, &signature).await?;
            }
        },
    }
    Ok(())
}
