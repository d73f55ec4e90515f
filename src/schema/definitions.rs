//! JSON Schema documents for the schema set.
//!
//! Unknown properties are tolerated everywhere so that newer documents
//! keep validating against older schemas.

use serde_json::{json, Value};

use super::VERSION_PATTERN;

const SEVERITIES: [&str; 4] = ["info", "warn", "error", "critical"];

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

pub(super) fn config_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "confgate configuration",
        "type": "object",
        "required": ["version"],
        "properties": {
            "version": {
                "type": "string",
                "pattern": VERSION_PATTERN,
                "description": "Semantic version of the configuration document"
            },
            "model": { "type": "string", "minLength": 1 },
            "agents": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "required": ["role"],
                    "properties": {
                        "role": { "type": "string", "minLength": 1 },
                        "model": { "type": "string" }
                    }
                }
            },
            "skills": {
                "type": "array",
                "items": { "type": "string", "pattern": "^[^/\\s]+/[^/\\s]+$" }
            },
            "hooks": {
                "type": "object",
                "properties": {
                    "preTask": string_list(),
                    "postTask": string_list()
                }
            },
            "thinkingLens": { "type": "object" },
            "marketplace": { "type": "object" },
            "qualityGate": gate_body()
        }
    })
}

pub(super) fn settings_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "confgate project settings",
        "type": "object",
        "properties": {
            "model": { "type": "string" },
            "permissions": {
                "type": "object",
                "properties": {
                    "allow": string_list(),
                    "deny": string_list(),
                    "defaultMode": {
                        "type": "string",
                        "enum": ["default", "acceptEdits", "plan", "bypassPermissions"]
                    }
                }
            },
            "env": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "hooks": { "type": "object" },
            "respectGitignore": { "type": "boolean" },
            "cleanupPeriodDays": { "type": "integer", "minimum": 1 }
        }
    })
}

pub(super) fn quality_gate_schema() -> Value {
    let mut schema = gate_body();
    if let Some(map) = schema.as_object_mut() {
        map.insert(
            "$schema".to_string(),
            json!("http://json-schema.org/draft-07/schema#"),
        );
        map.insert("title".to_string(), json!("confgate quality gate"));
    }
    schema
}

fn gate_body() -> Value {
    json!({
        "type": "object",
        "properties": {
            "enabled": { "type": "boolean" },
            "severity": { "type": "string", "enum": SEVERITIES },
            "rules": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "enabled": { "type": "boolean" },
                        "severity": { "type": "string", "enum": SEVERITIES },
                        "config": { "type": "object" }
                    }
                }
            },
            "gates": {
                "type": "object",
                "properties": {
                    "preCommit": { "type": "boolean" },
                    "prePush": { "type": "boolean" },
                    "onToolUse": { "type": "boolean" }
                }
            },
            "reporting": {
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "enum": ["console", "json", "markdown", "html"]
                    },
                    "outputFile": { "type": "string" }
                }
            },
            "exclude": string_list()
        }
    })
}
