use std::collections::HashMap;

/// Where the result database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Local database file (`:memory:` for a throwaway database).
    pub path: String,
    /// Remote libSQL URL; takes precedence over `path` when set.
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: Self::DEFAULT_PATH.to_string(),
            url: None,
            auth_token: None,
        }
    }
}

impl DatabaseSettings {
    const DEFAULT_PATH: &'static str = "Codebuddy.db";
    const NAME_ENV: &'static str = "DB_NAME";
    const URL_ENV: &'static str = "DB_URL";
    const TOKEN_ENV: &'static str = "DB_AUTH_TOKEN";

    /// Load settings from `DB_NAME`, `DB_URL` and `DB_AUTH_TOKEN`.
    pub fn from_env() -> Self {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Self {
        let non_blank = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            path: non_blank(Self::NAME_ENV).unwrap_or_else(|| Self::DEFAULT_PATH.to_string()),
            url: non_blank(Self::URL_ENV),
            auth_token: non_blank(Self::TOKEN_ENV),
        }
    }

    /// Human-readable target, without credentials.
    pub fn describe(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_file() {
        let settings = DatabaseSettings::from_map(HashMap::new());
        assert_eq!(settings, DatabaseSettings::default());
        assert_eq!(settings.describe(), "Codebuddy.db");
    }

    #[test]
    fn remote_url_wins_in_description() {
        let vars = HashMap::from([
            ("DB_NAME".to_string(), "local.db".to_string()),
            ("DB_URL".to_string(), "libsql://smells.example.io".to_string()),
            ("DB_AUTH_TOKEN".to_string(), "token".to_string()),
        ]);
        let settings = DatabaseSettings::from_map(vars);
        assert_eq!(settings.path, "local.db");
        assert_eq!(settings.describe(), "libsql://smells.example.io");
        assert_eq!(settings.auth_token.as_deref(), Some("token"));
    }
}
