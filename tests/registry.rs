//! Clusters started from a configuration file.

use std::path::PathBuf;
use std::time::Duration;

use search_cluster_client::config::AuthStrategy;
use search_cluster_client::{ClusterRegistry, ConfigError, Error};

mod common;

struct TempConfig(PathBuf);

impl TempConfig {
    fn write(content: &str) -> Self {
        let path = std::env::temp_dir().join(format!("clusters-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        Self(path)
    }
}

impl Drop for TempConfig {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[tokio::test]
async fn test_registry_from_file() {
    let mock = common::start_mock_cluster().await;
    let file = TempConfig::write(&format!(
        r#"
[observability]
log_level = "debug"

[clusters.main]
url = "{url}"
username = "u"
password = "p"
pool_size = 2

[clusters.main.conn_opts]
receive_timeout_ms = 2000

[clusters.anonymous]
url = "{url}"
auth = "none"
username = "u"
password = "p"
"#,
        url = mock.url()
    ));

    let registry = ClusterRegistry::from_file(&file.0).unwrap();
    assert_eq!(registry.names(), vec!["anonymous", "main"]);
    assert_eq!(registry.observability().log_level, "debug");

    let main = registry.get("main").unwrap();
    assert_eq!(main.config().pool_size, 2);
    assert_eq!(main.config().conn_opts.receive_timeout_ms, 2000);
    main.get("/_cluster/health", &[]).await.unwrap();

    let anonymous = registry.get("anonymous").unwrap();
    assert_eq!(anonymous.config().auth, AuthStrategy::None);
    anonymous.get("/_cluster/health", &[]).await.unwrap();

    assert_eq!(
        mock.state.auth_headers(),
        vec![Some("Basic dTpw".to_string()), None]
    );

    assert!(registry.stop_all(Duration::from_secs(1)).await);
    assert!(matches!(main.get("/", &[]).await, Err(Error::NotStarted(_))));
}

#[test]
fn test_invalid_file_reports_every_problem() {
    let file = TempConfig::write(
        r#"
[clusters.bad]
url = "ftp://example.com"

[clusters.bad.conn_opts]
pool_timeout_ms = 0
"#,
    );

    match ClusterRegistry::from_file(&file.0).unwrap_err() {
        Error::Config(ConfigError::Validation { cluster, errors }) => {
            assert_eq!(cluster, "bad");
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ClusterRegistry::from_file(std::path::Path::new("/nonexistent/clusters.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Io(_))));
}
