use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// Read the deployment environment from `ENVIRONMENT`, defaulting to
    /// development when unset or unrecognized.
    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `development` or `production`.",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_defaults_to_development() {
        unsafe { std::env::remove_var("ENVIRONMENT") };
        assert_eq!(Environment::from_env(), Environment::Development);
    }

    #[test]
    #[serial]
    fn from_env_reads_production() {
        unsafe { std::env::set_var("ENVIRONMENT", "Production") };
        assert_eq!(Environment::from_env(), Environment::Production);
        unsafe { std::env::remove_var("ENVIRONMENT") };
    }

    #[test]
    fn try_from_rejects_unknown_value() {
        let err = Environment::try_from("staging".to_string()).unwrap_err();
        assert!(err.contains("staging"), "error should name the bad value");
    }

    #[test]
    fn try_from_accepts_short_forms() {
        assert_eq!(
            Environment::try_from("prod".to_string()).unwrap(),
            Environment::Production
        );
        assert_eq!(
            Environment::try_from("dev".to_string()).unwrap(),
            Environment::Development
        );
    }
}
