use user_connections::{Config, db, utils};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let config = Config::from_env()?;
    let pool = db::connect(&config).await?;

    println!("Running database migrations...");
    db::run_migrations(&pool).await?;
    println!("Migrations completed successfully!");

    Ok(())
}
