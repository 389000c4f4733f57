//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{GatewayConfig, RouteConfig};
use crate::config::validation::{validate_config, validate_routes, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse route table {path}: {source}")]
    RouteTable {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, resolve and validate configuration from a TOML file.
///
/// When `route_table` is set, the JSON route table it points to is loaded into
/// `routes`. Relative paths resolve against the config file's directory.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(table_path) = config.route_table.clone() {
        if !config.routes.is_empty() {
            return Err(ConfigError::Validation(vec![
                ValidationError::ConflictingRouteSources,
            ]));
        }
        let resolved = match path.parent() {
            Some(dir) if table_path.is_relative() => dir.join(&table_path),
            _ => table_path,
        };
        config.routes = load_route_table(&resolved)?;
        config.route_table = Some(resolved);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load a JSON route table: an array of `{"method", "path", "target"}` objects.
pub fn load_route_table(path: &Path) -> Result<Vec<RouteConfig>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let routes: Vec<RouteConfig> =
        serde_json::from_str(&content).map_err(|source| ConfigError::RouteTable {
            path: path.to_path_buf(),
            source,
        })?;

    let errors = validate_routes(&routes);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    tracing::debug!(path = %path.display(), routes = routes.len(), "Route table loaded");
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_inline_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "gateway.toml",
            r#"
            [[routes]]
            method = "*"
            path_prefix = "/sales"
            target = "http://localhost:9001"
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].path_prefix, "/sales");
    }

    #[test]
    fn test_load_relative_route_table() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "routes.json",
            r#"[
                {"method": "GET", "path": "/users", "target": "http://users:8080"},
                {"method": "*", "path": "/", "target": "http://fallback:8080"}
            ]"#,
        );
        let path = write_file(dir.path(), "gateway.toml", "route_table = \"routes.json\"\n");

        let config = load_config(&path).unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].method, "GET");
        assert_eq!(config.routes[1].target, "http://fallback:8080");
        assert_eq!(config.route_table, Some(dir.path().join("routes.json")));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_route_table() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "routes.json", "{ not json");
        let path = write_file(dir.path(), "gateway.toml", "route_table = \"routes.json\"\n");

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::RouteTable { .. }));
    }

    #[test]
    fn test_conflicting_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "gateway.toml",
            r#"
            route_table = "routes.json"

            [[routes]]
            path_prefix = "/"
            target = "http://x"
            "#,
        );

        match load_config(&path).unwrap_err() {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::ConflictingRouteSources]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_route_in_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "routes.json",
            r#"[{"method": "GET", "path": "", "target": "http://x"}]"#,
        );

        let err = load_route_table(&path).unwrap_err();
        assert!(err.to_string().contains("path prefix must not be empty"));
    }
}
