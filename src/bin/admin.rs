//! Maintenance commands for an EquipLend database
//!
//! ```text
//! equiplend-admin seed
//! equiplend-admin fix-equipment-status
//! ```

use anyhow::{bail, Context};
use sqlx::postgres::PgPoolOptions;
use std::env;

use equiplend_server::{
    config::AppConfig,
    models::{bulk::BulkImportRequest, equipment::CreateEquipment},
    repository::Repository,
    services::Services,
};

const SAMPLE_EQUIPMENT: &[(&str, &str, &str, &str, &str)] = &[
    ("MacBook Pro 14", "laptop", "Apple", "A2442", "SEED-LAP-001"),
    ("ThinkPad T14", "laptop", "Lenovo", "20W0", "SEED-LAP-002"),
    ("EOS R6", "camera", "Canon", "R6", "SEED-CAM-001"),
    ("Zoom H5 recorder", "audio", "Zoom", "H5", "SEED-AUD-001"),
    ("UltraSharp 27", "monitor", "Dell", "U2723QE", "SEED-MON-001"),
    ("Epson projector", "projector", "Epson", "EB-W51", "SEED-PRJ-001"),
];

fn usage() {
    eprintln!("equiplend-admin commands:");
    eprintln!("  seed                  create the administrator account and sample equipment");
    eprintln!("  fix-equipment-status  recompute equipment status from active loan requests");
}

async fn seed(services: &Services) -> anyhow::Result<()> {
    let email = env::var("EQUIPLEND_ADMIN_EMAIL").context("EQUIPLEND_ADMIN_EMAIL is not set")?;
    let password =
        env::var("EQUIPLEND_ADMIN_PASSWORD").context("EQUIPLEND_ADMIN_PASSWORD is not set")?;
    if password.len() < 8 {
        bail!("EQUIPLEND_ADMIN_PASSWORD must be at least 8 characters");
    }

    let admin = services
        .users
        .ensure_admin(&email, &password, "Administrator")
        .await?;
    println!("Administrator {} ready (id {})", admin.email, admin.id);

    let records = SAMPLE_EQUIPMENT
        .iter()
        .map(|(name, category, brand, model, serial)| CreateEquipment {
            name: name.to_string(),
            category: category.to_string(),
            brand: Some(brand.to_string()),
            model: Some(model.to_string()),
            serial_number: serial.to_string(),
            status: None,
            location: Some("Main office".to_string()),
            description: None,
            image_url: None,
        })
        .collect();

    let result = services
        .bulk
        .import_equipment(admin.id, &BulkImportRequest { records })
        .await?;
    println!(
        "Sample equipment: {} created, {} already present",
        result.succeeded.len(),
        result.failed.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = env::args().nth(1).unwrap_or_else(|| "help".to_string());
    if !matches!(command.as_str(), "seed" | "fix-equipment-status") {
        usage();
        if matches!(command.as_str(), "help" | "--help" | "-h") {
            return Ok(());
        }
        bail!("unknown command: {}", command);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "equiplend_server=info".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let services = Services::new(Repository::new(pool), &config);

    match command.as_str() {
        "seed" => seed(&services).await?,
        _ => {
            let changed = services.equipment.reconcile_statuses().await?;
            println!("{} equipment item(s) updated", changed);
        }
    }
    Ok(())
}
