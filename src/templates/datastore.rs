use super::{RenderContext, RenderedFile, ServiceCategory, ServiceTemplate};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default credentials baked into generated databases. Users override them
/// through the node's environment; connection URLs follow the override.
const DEFAULT_USER: &str = "app";
const DEFAULT_PASSWORD: &str = "app_password";

/// Database names allow underscores but not dashes.
fn database_name(service_name: &str) -> String {
    service_name.replace('-', "_")
}

fn env_or(env: &BTreeMap<String, String>, key: &str, fallback: &str) -> String {
    env.get(key).cloned().unwrap_or_else(|| fallback.to_string())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresTemplate;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTemplate;

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoTemplate;

#[derive(Debug, Clone, Copy, Default)]
pub struct RedisTemplate;

impl ServiceTemplate for PostgresTemplate {
    fn service_type(&self) -> &str {
        "postgresql"
    }

    fn display_name(&self) -> &str {
        "PostgreSQL"
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Database
    }

    fn default_port(&self) -> u16 {
        5432
    }

    fn default_environment(&self, service_name: &str, _port: u16) -> Vec<(String, String)> {
        vec![
            ("POSTGRES_DB".to_string(), database_name(service_name)),
            ("POSTGRES_PASSWORD".to_string(), DEFAULT_PASSWORD.to_string()),
            ("POSTGRES_USER".to_string(), DEFAULT_USER.to_string()),
        ]
    }

    fn connection_url(&self, host: &str, port: u16, env: &BTreeMap<String, String>) -> Option<String> {
        Some(format!(
            "postgresql://{}:{}@{}:{}/{}",
            env_or(env, "POSTGRES_USER", DEFAULT_USER),
            env_or(env, "POSTGRES_PASSWORD", DEFAULT_PASSWORD),
            host,
            port,
            env_or(env, "POSTGRES_DB", &database_name(host))
        ))
    }

    fn data_mount(&self) -> Option<&str> {
        Some("/var/lib/postgresql/data")
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        vec![RenderedFile::new(
            "init/01-schema.sql",
            format!(
                "-- Initial schema for {}\nCREATE TABLE IF NOT EXISTS service_health (\n    id SERIAL PRIMARY KEY,\n    checked_at TIMESTAMPTZ NOT NULL DEFAULT now()\n);\n",
                ctx.title()
            ),
        )]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "FROM postgres:16-alpine\nCOPY init/ /docker-entrypoint-initdb.d/\nEXPOSE {port}\nCMD [\"postgres\", \"-p\", \"{port}\"]\n",
            port = ctx.port
        )
    }
}

impl ServiceTemplate for MySqlTemplate {
    fn service_type(&self) -> &str {
        "mysql"
    }

    fn display_name(&self) -> &str {
        "MySQL"
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Database
    }

    fn default_port(&self) -> u16 {
        3306
    }

    fn default_environment(&self, service_name: &str, _port: u16) -> Vec<(String, String)> {
        vec![
            ("MYSQL_DATABASE".to_string(), database_name(service_name)),
            ("MYSQL_PASSWORD".to_string(), DEFAULT_PASSWORD.to_string()),
            ("MYSQL_ROOT_PASSWORD".to_string(), format!("root_{}", DEFAULT_PASSWORD)),
            ("MYSQL_USER".to_string(), DEFAULT_USER.to_string()),
        ]
    }

    fn connection_url(&self, host: &str, port: u16, env: &BTreeMap<String, String>) -> Option<String> {
        Some(format!(
            "mysql://{}:{}@{}:{}/{}",
            env_or(env, "MYSQL_USER", DEFAULT_USER),
            env_or(env, "MYSQL_PASSWORD", DEFAULT_PASSWORD),
            host,
            port,
            env_or(env, "MYSQL_DATABASE", &database_name(host))
        ))
    }

    fn data_mount(&self) -> Option<&str> {
        Some("/var/lib/mysql")
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        vec![RenderedFile::new(
            "init/01-schema.sql",
            format!(
                "-- Initial schema for {}\nCREATE TABLE IF NOT EXISTS service_health (\n    id INT AUTO_INCREMENT PRIMARY KEY,\n    checked_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n);\n",
                ctx.title()
            ),
        )]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "FROM mysql:8.4\nCOPY init/ /docker-entrypoint-initdb.d/\nEXPOSE {port}\nCMD [\"mysqld\", \"--port={port}\"]\n",
            port = ctx.port
        )
    }
}

impl ServiceTemplate for MongoTemplate {
    fn service_type(&self) -> &str {
        "mongodb"
    }

    fn display_name(&self) -> &str {
        "MongoDB"
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Database
    }

    fn default_port(&self) -> u16 {
        27017
    }

    fn default_environment(&self, service_name: &str, _port: u16) -> Vec<(String, String)> {
        vec![("MONGO_INITDB_DATABASE".to_string(), database_name(service_name))]
    }

    fn connection_url(&self, host: &str, port: u16, env: &BTreeMap<String, String>) -> Option<String> {
        Some(format!(
            "mongodb://{}:{}/{}",
            host,
            port,
            env_or(env, "MONGO_INITDB_DATABASE", &database_name(host))
        ))
    }

    fn data_mount(&self) -> Option<&str> {
        Some("/data/db")
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        let db = env_or(ctx.environment, "MONGO_INITDB_DATABASE", &database_name(ctx.service_name));
        vec![RenderedFile::new(
            "init/01-init.js",
            format!(
                "// Initial collections for {}\ndb = db.getSiblingDB({});\ndb.createCollection('service_health');\n",
                ctx.title(),
                super::render::quoted(&db)
            ),
        )]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "FROM mongo:7\nCOPY init/ /docker-entrypoint-initdb.d/\nEXPOSE {port}\nCMD [\"mongod\", \"--bind_ip_all\", \"--port\", \"{port}\"]\n",
            port = ctx.port
        )
    }
}

impl ServiceTemplate for RedisTemplate {
    fn service_type(&self) -> &str {
        "redis"
    }

    fn display_name(&self) -> &str {
        "Redis"
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Cache
    }

    fn default_port(&self) -> u16 {
        6379
    }

    fn connection_url(&self, host: &str, port: u16, _env: &BTreeMap<String, String>) -> Option<String> {
        Some(format!("redis://{}:{}", host, port))
    }

    fn data_mount(&self) -> Option<&str> {
        Some("/data")
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        vec![RenderedFile::new(
            "redis.conf",
            format!(
                "# {}\nbind 0.0.0.0\nport {}\nappendonly yes\ndir /data\n",
                ctx.title(),
                ctx.port
            ),
        )]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "FROM redis:7-alpine\nCOPY redis.conf /usr/local/etc/redis/redis.conf\nEXPOSE {}\nCMD [\"redis-server\", \"/usr/local/etc/redis/redis.conf\"]\n",
            ctx.port
        )
    }
}

pub fn templates() -> Vec<Arc<dyn ServiceTemplate>> {
    vec![
        Arc::new(MongoTemplate),
        Arc::new(PostgresTemplate),
        Arc::new(MySqlTemplate),
        Arc::new(RedisTemplate),
    ]
}
