use dotenv::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://marketmorph.db".to_string());
    println!("🔌 Connecting to: {}", db_url);

    let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await?;

    for table in ["products", "mentions", "pipeline_runs"] {
        println!("\n📋 {}", table);
        let columns = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&pool)
            .await?;
        if columns.is_empty() {
            println!("   (missing)");
            continue;
        }
        for col in &columns {
            let name: String = col.get("name");
            let ty: String = col.get("type");
            println!("   - {} ({})", name, ty);
        }
        let count: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(&pool)
            .await?
            .get("n");
        println!("   rows: {}", count);
    }

    Ok(())
}
