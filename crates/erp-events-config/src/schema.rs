use crate::types::RuntimeConfig;
use schemars::schema_for;

/// The JSON Schema for [`RuntimeConfig`], for the `print-schema` CLI
/// subcommand and for editor/CI validation of config files.
pub fn config_json_schema() -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::to_value(schema_for!(RuntimeConfig))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_round_trips_through_json() {
        let schema = config_json_schema().unwrap();
        assert!(schema.get("properties").is_some());
    }
}
