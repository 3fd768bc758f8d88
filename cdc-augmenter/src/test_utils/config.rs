use cdc_config::shared::ReplicatorConfig;
use serde_json::json;

/// Configuration with an in-memory election, unsalted keys and a short retry interval.
pub fn replicator_config() -> ReplicatorConfig {
    let config = json!({
        "active_schema": {
            "connection": {"host": "localhost", "name": "active_schema", "username": "replicator"}
        },
        "mutation": {"salt_row_keys": false},
        "coordinator": {"election": {"type": "memory"}, "retry_interval_ms": 50},
        "checkpoint": {"path": "checkpoint"}
    });

    serde_json::from_value(config).expect("valid test configuration")
}
