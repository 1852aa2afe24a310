//! Plugin lifecycle across the host.

use cairn_core::{CoreError, Host, Lifecycle, PluginCatalog, PluginContext};
use cairn_plugin_api::{Plugin, PluginError, ServiceRegistry, StorageService};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[derive(Default)]
struct Journal(Mutex<Vec<String>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

struct Failing {
    journal: Arc<Journal>,
}

impl Plugin for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn register(&mut self, _: &ServiceRegistry) -> Result<(), PluginError> {
        self.journal.push("register failing");
        Err(PluginError::failed("refusing to register"))
    }

    fn start(&mut self) -> Result<(), PluginError> {
        self.journal.push("start failing");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        self.journal.push("stop failing");
        Ok(())
    }
}

struct Healthy {
    journal: Arc<Journal>,
}

impl Plugin for Healthy {
    fn name(&self) -> &str {
        "healthy"
    }

    fn version(&self) -> Option<&str> {
        Some("2.1.0")
    }

    fn register(&mut self, services: &ServiceRegistry) -> Result<(), PluginError> {
        services
            .get_service::<dyn StorageService>()
            .ok_or(PluginError::ServiceUnavailable {
                service: "StorageService",
            })?;
        self.journal.push("register healthy");
        Ok(())
    }

    fn start(&mut self) -> Result<(), PluginError> {
        self.journal.push("start healthy");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        self.journal.push("stop healthy");
        Ok(())
    }
}

fn catalog(journal: &Arc<Journal>) -> PluginCatalog {
    let failing = Arc::clone(journal);
    let healthy = Arc::clone(journal);
    PluginCatalog::builtin()
        .with("failing", move || {
            Box::new(Failing {
                journal: Arc::clone(&failing),
            })
        })
        .with("healthy", move || {
            Box::new(Healthy {
                journal: Arc::clone(&healthy),
            })
        })
}

#[test]
fn start_before_register_is_rejected() {
    let mut context = PluginContext::new(PluginCatalog::builtin());
    let err = context.start_plugins().unwrap_err();
    assert!(matches!(err, CoreError::Lifecycle { .. }));
    assert_eq!(context.state(), Lifecycle::Uninitialized);
}

#[test]
fn register_twice_is_rejected() {
    let mut context = PluginContext::new(PluginCatalog::builtin());
    context.register_plugins(None).unwrap();
    let err = context.register_plugins(None).unwrap_err();
    assert!(matches!(err, CoreError::Lifecycle { .. }));
    assert_eq!(context.state(), Lifecycle::Registered);
}

#[test]
fn failing_plugin_does_not_block_the_others() {
    let journal = Arc::new(Journal::default());
    let dir = tempdir().unwrap();
    let mut host = Host::new(catalog(&journal));
    host.register_plugins(None).unwrap();

    assert_eq!(host.context().active_plugin_names(), vec!["lsm", "healthy"]);
    assert!(host
        .context()
        .plugin_summary()
        .contains(&"ERROR failing".to_string()));
    assert!(host
        .context()
        .plugin_summary()
        .contains(&"TOTAL = 2 of 3 plugins successfully loaded".to_string()));

    let config = cairn_core::HostConfiguration::new().data_path(dir.path());
    host.start(&config).unwrap();
    host.shutdown().unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "register failing",
            "register healthy",
            "start healthy",
            "stop healthy"
        ]
    );
}

#[test]
fn plugins_directory_limits_what_loads() {
    let journal = Arc::new(Journal::default());
    let dir = tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    fs::create_dir_all(&plugins).unwrap();
    fs::write(plugins.join("10-lsm.plugin"), r#"{"name": "lsm"}"#).unwrap();
    fs::write(plugins.join("20-healthy.plugin"), r#"{"name": "healthy"}"#).unwrap();

    let mut host = Host::new(catalog(&journal));
    host.register_plugins(Some(&plugins)).unwrap();

    assert_eq!(host.context().active_plugin_names(), vec!["lsm", "healthy"]);
    assert_eq!(
        host.context().plugin_versions().get("healthy").map(String::as_str),
        Some("2.1.0")
    );
    let summary = host.context().plugin_summary();
    assert!(summary
        .last()
        .is_some_and(|line| line.starts_with("from ") && line.ends_with("plugins")));
    assert!(!journal.entries().contains(&"register failing".to_string()));
}
