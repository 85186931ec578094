//! Connection settings for the HTTP interface.

use serde::Deserialize;

/// Where and how to reach a ClickHouse server.
///
/// Deserializes from any serde format; missing keys take their defaults:
///
/// ```
/// # use quarry_clickhouse::ClickHouseConfig;
/// let config: ClickHouseConfig =
///     serde_json::from_str(r#"{ "database": "analytics" }"#).unwrap();
/// assert_eq!(config.url, "http://localhost:8123");
/// assert!(config.mutations_sync);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    /// Base URL of the HTTP interface.
    pub url: String,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Wait for `ALTER TABLE .. UPDATE/DELETE` mutations before returning.
    pub mutations_sync: bool,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_owned(),
            database: None,
            user: None,
            password: None,
            mutations_sync: true,
        }
    }
}

impl ClickHouseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn mutations_sync(mut self, wait: bool) -> Self {
        self.mutations_sync = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ClickHouseConfig::new("http://ch:8123")
            .database("events")
            .credentials("reader", "secret")
            .mutations_sync(false);
        assert_eq!(config.url, "http://ch:8123");
        assert_eq!(config.database.as_deref(), Some("events"));
        assert_eq!(config.user.as_deref(), Some("reader"));
        assert!(!config.mutations_sync);
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: ClickHouseConfig =
            serde_json::from_str(r#"{ "url": "http://ch:8123", "mutations_sync": false }"#)
                .unwrap();
        assert_eq!(config.url, "http://ch:8123");
        assert_eq!(config.database, None);
        assert!(!config.mutations_sync);
    }
}
