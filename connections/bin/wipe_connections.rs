use anyhow::Result;
use chrono::Utc;
use clap::{Arg, Command};
use sqlx::{PgPool, Row};
use std::env;
use std::fs;
use std::io::Write;
use tracing::{info, warn};
use user_connections::{Config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let matches = Command::new("backup-and-wipe-connections")
        .about("Backup and wipe the user_connections table")
        .arg(
            Arg::new("backup-only")
                .long("backup-only")
                .help("Only create backup, don't wipe the table")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("confirm-wipe")
                .long("confirm-wipe")
                .help("Confirm that you want to wipe the user_connections table (required for wipe)")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let backup_only = matches.get_flag("backup-only");
    let confirm_wipe = matches.get_flag("confirm-wipe");

    let mut config = Config::from_env()?;

    // Use DATABASE_PUBLIC_URL if available (for prod access), otherwise DATABASE_URL
    if let Ok(public_url) = env::var("DATABASE_PUBLIC_URL") {
        info!("Using DATABASE_PUBLIC_URL for production database access");
        config.database_url = public_url;
    } else {
        info!("Using DATABASE_URL (DATABASE_PUBLIC_URL not set)");
    }
    config.max_db_connections = 5;

    let pool = db::connect(&config).await?;
    info!("Connected to database");

    info!("Creating backup of user_connections table...");
    let backup_file = create_backup(&pool).await?;
    info!("Backup created successfully: {}", backup_file);

    if backup_only {
        info!("Backup-only mode. user_connections table was not modified.");
        return Ok(());
    }

    if !confirm_wipe {
        warn!("Wipe not confirmed. Use --confirm-wipe to proceed with wiping the table.");
        info!("Backup created: {}", backup_file);
        return Ok(());
    }

    info!("Wiping user_connections table...");
    let deleted_count = wipe_connections_table(&pool).await?;
    info!("Wiped {} records from user_connections table", deleted_count);
    info!("Backup: {}", backup_file);

    Ok(())
}

async fn create_backup(pool: &PgPool) -> Result<String> {
    fs::create_dir_all("./db_backups")?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let backup_file = format!("./db_backups/user_connections_backup_{}.json", timestamp);

    let rows = sqlx::query("SELECT * FROM user_connections ORDER BY created_at")
        .fetch_all(pool)
        .await?;

    info!("Found {} connection records to backup", rows.len());

    let mut records = Vec::new();
    for row in rows {
        let record = serde_json::json!({
            "id": row.get::<uuid::Uuid, _>("id").to_string(),
            "initiator_user_id": row.get::<i32, _>("initiator_user_id"),
            "recipient_user_id": row.get::<i32, _>("recipient_user_id"),
            "status": row.get::<String, _>("status"),
            "token": row.get::<String, _>("token"),
            "activity_count": row.get::<i32, _>("activity_count"),
            "email_sent": row.get::<bool, _>("email_sent"),
            "created_at": row.get::<chrono::DateTime<chrono::Utc>, _>("created_at").to_rfc3339(),
        });
        records.push(record);
    }

    let json_data = serde_json::to_string_pretty(&records)?;
    let mut file = fs::File::create(&backup_file)?;
    file.write_all(json_data.as_bytes())?;

    // Also create a SQL restore script
    let sql_backup_file = format!("./db_backups/user_connections_backup_{}.sql", timestamp);
    let mut sql_file = fs::File::create(&sql_backup_file)?;

    writeln!(sql_file, "-- user_connections table backup created at {}", Utc::now().to_rfc3339())?;
    writeln!(sql_file, "-- Records: {}", records.len())?;
    writeln!(sql_file, "-- To restore: psql $DATABASE_PUBLIC_URL -f {}", sql_backup_file)?;
    writeln!(sql_file)?;

    for record in &records {
        let insert_sql = format!(
            "INSERT INTO user_connections (id, initiator_user_id, recipient_user_id, status, token, activity_count, email_sent, created_at) VALUES ('{}', {}, {}, '{}', '{}', {}, {}, '{}');",
            record["id"].as_str().unwrap(),
            record["initiator_user_id"],
            record["recipient_user_id"],
            record["status"].as_str().unwrap(),
            record["token"].as_str().unwrap(),
            record["activity_count"],
            record["email_sent"],
            record["created_at"].as_str().unwrap()
        );
        writeln!(sql_file, "{}", insert_sql)?;
    }

    info!("Created JSON backup: {}", backup_file);
    info!("Created SQL backup: {}", sql_backup_file);

    Ok(backup_file)
}

async fn wipe_connections_table(pool: &PgPool) -> Result<u64> {
    let count_before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_connections")
        .fetch_one(pool)
        .await?;

    info!("Records before deletion: {}", count_before);

    let result = sqlx::query("DELETE FROM user_connections")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
