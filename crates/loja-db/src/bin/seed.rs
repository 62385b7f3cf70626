//! # Seed Data Generator
//!
//! Populates a development database with sales, service records and
//! charges in every state.
//!
//! ## Usage
//! ```bash
//! # 200 sales (default)
//! cargo run -p loja-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p loja-db --bin seed -- --count 1000 --db ./data/loja.db
//!
//! # Verbose
//! RUST_LOG=loja_db=debug cargo run -p loja-db --bin seed
//! ```
//!
//! ## Generated Charges
//! For sale `n` (deterministic, no RNG):
//! - every 4th sale is paid upfront
//! - the rest are deferred, split into 1, 2, 3, 6 or 10 installments
//! - every 3rd deferred charge gets a partial payment on installment 1
//! - every 7th deferred charge is cancelled
//! - every 5th sale also gets a service record billed in one go

use std::env;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use loja_core::{
    ChargeOrigin, Money, NewCharge, PaymentFlow, PaymentMethod, SaleRef, ServiceRef,
};
use loja_db::{BillingConfig, Database, DbConfig};

const DEFAULT_COUNT: i64 = 200;
const INSTALLMENT_CYCLE: &[u32] = &[1, 2, 3, 6, 10];
const METHODS: &[PaymentMethod] = &[
    PaymentMethod::Pix,
    PaymentMethod::Boleto,
    PaymentMethod::Credito,
    PaymentMethod::Dinheiro,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BillingConfig::from_env()?;

    let args: Vec<String> = env::args().collect();
    let mut count = DEFAULT_COUNT;
    let mut db_path = config.database_path.display().to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(DEFAULT_COUNT);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("LojaWeb Billing Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of sales to bill (default: {DEFAULT_COUNT})");
                println!("  -d, --db <PATH>    Database file path (default: $LOJA_DATABASE_PATH or loja.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding billing data");

    let db = Database::new(DbConfig::new(&db_path).max_connections(config.max_connections)).await?;

    let existing = db.charges().list().await?.len();
    if existing > 0 {
        warn!(existing, "Database already has charges, skipping seed");
        return Ok(());
    }

    let billing = db.billing(config.pix.clone());
    let start = std::time::Instant::now();
    let first_id = db.origins().max_sale_id().await? + 1;
    let mut opened = 0usize;

    for n in 0..count {
        let sale = SaleRef {
            id: first_id + n,
            total: Money::from_cents(1990 + (n * 3779) % 48000),
            cancelled: false,
        };
        db.origins().insert_sale(&sale).await?;

        let index = usize::try_from(n).unwrap_or(0);
        let upfront = n % 4 == 0;
        let installments = if upfront {
            1
        } else {
            INSTALLMENT_CYCLE[index % INSTALLMENT_CYCLE.len()]
        };

        let charge = billing
            .open_charge(NewCharge {
                origin: ChargeOrigin::Sale(sale),
                reference: None,
                due_date: None,
                discount: Money::from_cents(if n % 6 == 0 { 500 } else { 0 }),
                down_payment: Money::zero(),
                payment_method: METHODS[index % METHODS.len()],
                installment_count: installments,
                installment_due_dates: Vec::new(),
                flow: if upfront {
                    PaymentFlow::Upfront
                } else {
                    PaymentFlow::Deferred
                },
            })
            .await?;
        opened += 1;

        if !upfront && n % 3 == 0 {
            let number = (installments > 1).then_some(1);
            billing
                .apply_payment(&charge.id, Money::from_cents(1000), number)
                .await?;
        }
        if !upfront && n % 7 == 0 {
            billing.cancel(&charge.id).await?;
        }

        if n % 5 == 0 {
            let service = ServiceRef {
                id: first_id + n,
                total_price: Money::from_cents(4500 + (n * 911) % 20000),
            };
            db.origins().insert_service(&service).await?;
            billing
                .open_charge(NewCharge {
                    origin: ChargeOrigin::Service(service),
                    reference: None,
                    due_date: None,
                    discount: Money::zero(),
                    down_payment: Money::from_cents(2000),
                    payment_method: PaymentMethod::Pix,
                    installment_count: 1,
                    installment_due_dates: Vec::new(),
                    flow: PaymentFlow::Deferred,
                })
                .await?;
            opened += 1;
        }
    }

    let summary = billing.summary().await?;
    let report = billing.delinquency_report().await?;

    info!(
        opened,
        elapsed_ms = start.elapsed().as_millis() as u64,
        overdue = %summary.overdue_total,
        due_soon = %summary.due_soon_total,
        received = %summary.received_total,
        open_debts = report.lines.len(),
        outstanding = %report.total,
        "Seed complete"
    );

    Ok(())
}
