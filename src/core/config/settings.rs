use super::parsing::{
    env_flag, env_number, env_optional, env_or_default, normalize_api_prefix,
    parse_cors_origins, parse_environment,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, AuthSettings, ConfigError, CorsSettings, DatabaseSettings,
    ReviewSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, SyncSettings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("QUIZBANK_HOST", "0.0.0.0");
        let port = env_or_default("QUIZBANK_PORT", "8000");

        let environment =
            parse_environment(env_optional("QUIZBANK_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config = env_flag("QUIZBANK_STRICT_CONFIG") || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Quizbank API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_prefix = normalize_api_prefix(&env_or_default("API_PREFIX", "/api"));

        let (secret_key, secret_key_generated) = match env_optional("SECRET_KEY") {
            Some(value) => (value, false),
            None => (load_or_create_secret_key(), true),
        };
        let access_token_expire_minutes = env_number("ACCESS_TOKEN_EXPIRE_MINUTES", 10_080u64)?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = env_number("POSTGRES_PORT", 5432u16)?;
        let postgres_user = env_or_default("POSTGRES_USER", "quizbank");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "quizbank");
        let database_url = env_optional("DATABASE_URL");
        let connect_retries = env_number("DB_CONNECT_RETRIES", 5u32)?;
        let connect_retry_delay_seconds = env_number("DB_CONNECT_RETRY_DELAY_SECONDS", 5u64)?;

        let max_login_attempts = env_number("MAX_LOGIN_ATTEMPTS", 5u32)?;
        let lock_minutes = env_number("LOGIN_LOCK_MINUTES", 120u64)?;

        let session_size = env_number("REVIEW_SESSION_SIZE", 20u32)?;

        let sync_server_url = env_or_default("SYNC_SERVER_URL", "http://localhost:8000/api");
        let sync_access_token = env_or_default("SYNC_ACCESS_TOKEN", "");
        let sync_interval_seconds = env_number("SYNC_INTERVAL_SECONDS", 300u64)?;
        let sync_health_probe_seconds = env_number("SYNC_HEALTH_PROBE_SECONDS", 30u64)?;
        let sync_data_path = env_or_default("SYNC_DATA_PATH", "quizbank-sync.json");

        let first_admin_username = env_or_default("FIRST_ADMIN_USERNAME", "admin");
        let first_admin_password = env_or_default("FIRST_ADMIN_PASSWORD", "");

        let log_level = env_or_default("QUIZBANK_LOG_LEVEL", "info");
        let json = env_flag("QUIZBANK_LOG_JSON");
        let prometheus_enabled = env_flag("PROMETHEUS_ENABLED");

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_prefix },
            security: SecuritySettings {
                secret_key,
                secret_key_generated,
                access_token_expire_minutes,
                algorithm,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                connect_retries,
                connect_retry_delay_seconds,
            },
            auth: AuthSettings { max_login_attempts, lock_minutes },
            review: ReviewSettings { session_size },
            sync: SyncSettings {
                server_url: sync_server_url,
                access_token: sync_access_token,
                interval_seconds: sync_interval_seconds,
                health_probe_seconds: sync_health_probe_seconds,
                data_path: sync_data_path,
            },
            admin: AdminSettings { first_admin_username, first_admin_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn auth(&self) -> &AuthSettings {
        &self.auth
    }

    pub(crate) fn review(&self) -> &ReviewSettings {
        &self.review
    }

    pub(crate) fn sync(&self) -> &SyncSettings {
        &self.sync
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.max_login_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_LOGIN_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.review.session_size == 0 || self.review.session_size > 200 {
            return Err(ConfigError::InvalidValue {
                field: "REVIEW_SESSION_SIZE",
                value: self.review.session_size.to_string(),
            });
        }

        if self.sync.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SYNC_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.sync.health_probe_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SYNC_HEALTH_PROBE_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.security.secret_key_generated {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }
        if self.admin.first_admin_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_ADMIN_PASSWORD"));
        }

        Ok(())
    }
}
