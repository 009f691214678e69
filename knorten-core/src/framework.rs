use sqlx::PgPool;

/// Runs the SQL query structs in [`crate::entities`] against a pool.
///
/// Each query is a plain struct with a `kanau::processor::Processor`
/// implementation for this type, so call sites read as
/// `processor.process(ClaimEvent { id }).await`.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
