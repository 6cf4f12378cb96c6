#[derive(Debug, sqlx::FromRow)]
pub struct SubscriptionSql {
    pub id: u64,
    pub school_id: u64,
    pub proof_path: Option<String>,
}
