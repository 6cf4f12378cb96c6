pub mod activity;
pub mod admission;
pub mod evaluation;
pub mod report;
pub mod subscription;
pub mod support;

#[cfg(test)]
pub mod test_support {
    use crate::auth::jwt::{TokenSubject, generate_access_token};
    use crate::config::Config;
    use crate::model::role::Role;
    use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

    /// Pool that never connects unless a query actually runs.
    pub fn lazy_pool() -> MySqlPool {
        let config = config();
        MySqlPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("valid test database url")
    }

    pub fn config() -> Config {
        Config::for_tests(std::env::temp_dir())
    }

    pub fn bearer(role: Role, school_id: u64) -> (&'static str, String) {
        let subject = TokenSubject {
            user_id: 99,
            username: "tester".into(),
            role: role.id(),
            school_id,
        };
        let token = generate_access_token(&subject, &config().jwt_secret, 300)
            .expect("token encodes");
        ("Authorization", format!("Bearer {token}"))
    }
}
