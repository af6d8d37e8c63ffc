//! Larkspur CLI - inspect and edit persisted carts.
//!
//! # Usage
//!
//! ```bash
//! # Show the default cart under $LARKSPUR_CART_DIR
//! larkspur cart show
//!
//! # Add two scarves to a named cart
//! larkspur cart --namespace 3f2b8c1e-9d4a-4c1b-8f7e-2a6d5c4b3a21 add \
//!     --variant-key price_scarf --product-id 3 --name "Wool Scarf" \
//!     --unit-price 45.00 --image-url https://cdn.example.com/scarf.jpg \
//!     --quantity 2 --stock-ceiling 5
//!
//! # Operate on an explicit snapshot file
//! larkspur cart --file ./cart-storage.json decrease price_scarf
//!
//! # Hand the cart off to the payment-link provider
//! larkspur cart checkout
//! ```
//!
//! # Commands
//!
//! - `cart show` - Print the cart
//! - `cart add|increase|decrease|remove|clear` - Mutate the cart and print it
//! - `cart checkout` - Create a payment link, clear the cart, print `{ url }`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use larkspur_core::CartStore;
use larkspur_storefront::storage::JsonFileStorage;

mod commands;

use commands::cart::CartAction;

#[derive(Parser)]
#[command(name = "larkspur")]
#[command(author, version, about = "Larkspur cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit a persisted cart
    Cart {
        /// Cart snapshot directory
        #[arg(long, env = "LARKSPUR_CART_DIR", default_value = "./data/carts")]
        dir: PathBuf,

        /// Cart namespace under the snapshot directory
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Explicit snapshot file (overrides --dir and --namespace)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Reject first inserts above their stock ceiling
        #[arg(long, env = "LARKSPUR_STRICT_STOCK")]
        strict: bool,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Cart {
            dir,
            namespace,
            file,
            strict,
            action,
        } => {
            let storage = match file {
                Some(path) => JsonFileStorage::at(path),
                None => JsonFileStorage::new(&dir, &namespace)?,
            };
            tracing::debug!(path = %storage.path().display(), "Opening cart");

            let mut store = CartStore::open(storage).with_strict_first_insert(strict);
            let output = commands::cart::execute(&mut store, action).await?;
            print_json(&output);
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_json(value: &serde_json::Value) {
    println!("{value:#}");
}
