use sqlx::PgPool;

/// Integration tests need a throwaway Postgres database. They skip (early
/// return) when TEST_DATABASE_URL is not set, so a plain `cargo test` stays
/// green on machines without one.
pub async fn pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

/// Account ids are Telegram chat ids in production; tests mint random ones
/// far away from each other so runs never collide.
pub fn fresh_id() -> i64 {
    1_000_000_000 + (rand::random::<u32>() as i64)
}

pub async fn create_account(pool: &PgPool) -> i64 {
    let id = fresh_id();
    sqlx::query("INSERT INTO accounts (id, username, card_status) VALUES ($1, $2, 'active')")
        .bind(id)
        .bind(format!("user{id}"))
        .execute(pool)
        .await
        .expect("insert test account");
    id
}
