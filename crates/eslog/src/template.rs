//! 📋 The index template: mappings for every index the logger will ever create.
//!
//! Registered once at startup under `template_name`, matched against new indices by the
//! wildcard derived from `index_format`. Without it Elasticsearch guesses the mappings
//! from the first document, and its guesses about `level` are not great.

use serde_json::{Value, json};

// ⏱️ Log indices are write-heavy and read-later. A slower refresh keeps indexing cheap.
const REFRESH_INTERVAL: &str = "5s";

/// 🏗️ Build the body for `PUT /_template/{name}`.
///
/// `match_pattern` is the wildcard (`"logstash-*"`), `type_name` keys the mapping.
/// Shards and replicas are only set when configured; otherwise the cluster default applies.
pub fn build_template(
    match_pattern: &str,
    type_name: &str,
    number_of_shards: Option<u32>,
    number_of_replicas: Option<u32>,
) -> Value {
    let mut settings = json!({ "index.refresh_interval": REFRESH_INTERVAL });
    if let Some(shards) = number_of_shards {
        settings["number_of_shards"] = json!(shards);
    }
    if let Some(replicas) = number_of_replicas {
        settings["number_of_replicas"] = json!(replicas);
    }

    json!({
        "index_patterns": [match_pattern],
        "settings": settings,
        "mappings": {
            type_name: {
                "dynamic_templates": [
                    {
                        "string_fields": {
                            "match": "*",
                            "match_mapping_type": "string",
                            "mapping": {
                                "type": "text",
                                "norms": false,
                                "fields": {
                                    "raw": { "type": "keyword", "ignore_above": 256 }
                                }
                            }
                        }
                    }
                ],
                "properties": {
                    "@timestamp": { "type": "date" },
                    "level": { "type": "keyword" },
                    "category": { "type": "keyword" },
                    "event_id": { "type": "integer" },
                    "message": { "type": "text" },
                    "exception": { "type": "text" }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_template_knows_its_indices() {
        let template = build_template("logs-*", "logevent", Some(3), None);
        assert_eq!(template["index_patterns"], json!(["logs-*"]));
        assert_eq!(template["settings"]["number_of_shards"], 3);
        assert!(template["settings"].get("number_of_replicas").is_none());
        assert_eq!(
            template["mappings"]["logevent"]["properties"]["level"]["type"],
            "keyword"
        );
        assert_eq!(
            template["mappings"]["logevent"]["properties"]["@timestamp"]["type"],
            "date"
        );
    }
}
