//! Log type classification.
//!
//! A client describes an action generically (`logType`, `userId`,
//! `metadata`, `changes`, `details`). The classifier turns it into one of a
//! closed set of canonical event shapes. This is the only place schema
//! knowledge lives; chains store the resulting payload as an opaque map.
//!
//! Missing metadata falls back to `"unknown"`, missing `changes` to `{}`,
//! missing `details` to `""`. A metadata value counts as missing when it is
//! absent, `null`, `false`, `0` or the empty string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ClassifyError;

/// The supported log types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    Login,
    Logout,
    PasswordChange,
    ConfigChange,
    DataUpdate,
    Deployment,
    AnomalyDetected,
    SecurityAlert,
    AuditLog,
}

impl LogType {
    pub const ALL: [LogType; 9] = [
        LogType::Login,
        LogType::Logout,
        LogType::PasswordChange,
        LogType::ConfigChange,
        LogType::DataUpdate,
        LogType::Deployment,
        LogType::AnomalyDetected,
        LogType::SecurityAlert,
        LogType::AuditLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogType::Login => "LOGIN",
            LogType::Logout => "LOGOUT",
            LogType::PasswordChange => "PASSWORD_CHANGE",
            LogType::ConfigChange => "CONFIG_CHANGE",
            LogType::DataUpdate => "DATA_UPDATE",
            LogType::Deployment => "DEPLOYMENT",
            LogType::AnomalyDetected => "ANOMALY_DETECTED",
            LogType::SecurityAlert => "SECURITY_ALERT",
            LogType::AuditLog => "AUDIT_LOG",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ClassifyError::UnsupportedLogType(s.to_string()))
    }
}

/// A generic log request as sent by clients.
///
/// `log_type` stays a string so an unknown value surfaces as
/// [`ClassifyError::UnsupportedLogType`] rather than a body parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInfo {
    pub log_type: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogInfo {
    /// Classify this request. The timestamp must already be set.
    pub fn classify(&self) -> Result<CanonicalEvent, ClassifyError> {
        let timestamp = self
            .timestamp
            .as_deref()
            .ok_or(ClassifyError::MissingField("timestamp"))?;

        LogTypeClassifier.classify(
            &self.log_type,
            &self.user_id,
            timestamp,
            self.metadata.as_ref(),
            self.changes.as_ref(),
            self.details.as_deref(),
        )
    }
}

/// The canonical event shapes, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CanonicalEvent {
    UserLogin {
        user_id: String,
        status: Value,
        timestamp: String,
        metadata: Map<String, Value>,
    },
    UserLogout {
        user_id: String,
        timestamp: String,
    },
    PasswordChange {
        user_id: String,
        timestamp: String,
    },
    UpdateConfig {
        user_id: String,
        changes: Map<String, Value>,
        timestamp: String,
    },
    UpdateRecord {
        user_id: String,
        record_id: Value,
        changes: Map<String, Value>,
        timestamp: String,
    },
    Deployment {
        user_id: String,
        environment: Value,
        version: Value,
        timestamp: String,
    },
    AnomalyDetected {
        user_id: String,
        anomaly_type: Value,
        details: String,
        timestamp: String,
    },
    SecurityAlert {
        user_id: String,
        alert_type: Value,
        details: String,
        timestamp: String,
    },
    LogAccess {
        user_id: String,
        auditor_id: Value,
        log_id: Value,
        timestamp: String,
    },
}

impl CanonicalEvent {
    /// The JSON-LD context document for this event shape.
    pub fn context(&self) -> &'static str {
        match self {
            CanonicalEvent::UserLogin { .. }
            | CanonicalEvent::UserLogout { .. }
            | CanonicalEvent::PasswordChange { .. } => "auth_event.json",
            CanonicalEvent::UpdateConfig { .. } => "config_change.json",
            CanonicalEvent::UpdateRecord { .. } => "data_access.json",
            CanonicalEvent::Deployment { .. } => "operation_event.json",
            CanonicalEvent::AnomalyDetected { .. } | CanonicalEvent::SecurityAlert { .. } => {
                "security_alert.json"
            }
            CanonicalEvent::LogAccess { .. } => "audit_log.json",
        }
    }

    /// The payload map stored in the chain, including `@context`.
    pub fn to_payload(&self) -> Result<Map<String, Value>, ClassifyError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.insert("@context".into(), Value::String(self.context().into()));
                Ok(map)
            }
            Ok(_) => Err(ClassifyError::Encoding("event did not encode as an object".into())),
            Err(e) => Err(ClassifyError::Encoding(e.to_string())),
        }
    }
}

/// Maps generic log requests to canonical events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTypeClassifier;

impl LogTypeClassifier {
    /// Classify a log request. Deterministic and side-effect free.
    pub fn classify(
        &self,
        log_type: &str,
        subject_id: &str,
        timestamp: &str,
        metadata: Option<&Map<String, Value>>,
        changes: Option<&Map<String, Value>>,
        details: Option<&str>,
    ) -> Result<CanonicalEvent, ClassifyError> {
        let log_type: LogType = log_type.parse()?;
        if subject_id.is_empty() {
            return Err(ClassifyError::MissingField("userId"));
        }

        let user_id = subject_id.to_string();
        let timestamp = timestamp.to_string();
        let meta = |field: &str| metadata_or_unknown(metadata, field);
        let changes = || changes.cloned().unwrap_or_default();
        let details = || details.unwrap_or_default().to_string();

        let event = match log_type {
            LogType::Login => CanonicalEvent::UserLogin {
                user_id,
                status: meta("status"),
                timestamp,
                metadata: metadata.cloned().unwrap_or_default(),
            },
            LogType::Logout => CanonicalEvent::UserLogout { user_id, timestamp },
            LogType::PasswordChange => CanonicalEvent::PasswordChange { user_id, timestamp },
            LogType::ConfigChange => CanonicalEvent::UpdateConfig {
                user_id,
                changes: changes(),
                timestamp,
            },
            LogType::DataUpdate => CanonicalEvent::UpdateRecord {
                user_id,
                record_id: meta("recordId"),
                changes: changes(),
                timestamp,
            },
            LogType::Deployment => CanonicalEvent::Deployment {
                user_id,
                environment: meta("environment"),
                version: meta("version"),
                timestamp,
            },
            LogType::AnomalyDetected => CanonicalEvent::AnomalyDetected {
                user_id,
                anomaly_type: meta("anomalyType"),
                details: details(),
                timestamp,
            },
            LogType::SecurityAlert => CanonicalEvent::SecurityAlert {
                user_id,
                alert_type: meta("alertType"),
                details: details(),
                timestamp,
            },
            LogType::AuditLog => CanonicalEvent::LogAccess {
                user_id,
                auditor_id: meta("auditorId"),
                log_id: meta("logId"),
                timestamp,
            },
        };

        Ok(event)
    }
}

fn metadata_or_unknown(metadata: Option<&Map<String, Value>>, field: &str) -> Value {
    metadata
        .and_then(|m| m.get(field))
        .filter(|v| is_present(v))
        .cloned()
        .unwrap_or_else(|| Value::String("unknown".into()))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: &str = "2024-12-29T12:00:00Z";

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn classify(log_type: &str, metadata: Option<Value>) -> Result<CanonicalEvent, ClassifyError> {
        let metadata = metadata.map(map);
        LogTypeClassifier.classify(log_type, "user123", TS, metadata.as_ref(), None, None)
    }

    #[test]
    fn test_login_with_status() {
        let event = classify("LOGIN", Some(json!({"status": "success", "ip": "10.0.0.1"}))).unwrap();
        let payload = event.to_payload().unwrap();

        assert_eq!(payload["@context"], "auth_event.json");
        assert_eq!(payload["action"], "user_login");
        assert_eq!(payload["userId"], "user123");
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["timestamp"], TS);
        assert_eq!(payload["metadata"]["ip"], "10.0.0.1");
    }

    #[test]
    fn test_login_without_metadata_defaults() {
        let payload = classify("LOGIN", None).unwrap().to_payload().unwrap();
        assert_eq!(payload["status"], "unknown");
        assert_eq!(payload["metadata"], json!({}));
    }

    #[test]
    fn test_falsy_metadata_counts_as_missing() {
        for falsy in [json!(""), json!(0), json!(false), Value::Null] {
            let event = classify("DEPLOYMENT", Some(json!({"environment": falsy, "version": 3})))
                .unwrap();
            assert_eq!(
                event,
                CanonicalEvent::Deployment {
                    user_id: "user123".into(),
                    environment: json!("unknown"),
                    version: json!(3),
                    timestamp: TS.into(),
                }
            );
        }
    }

    #[test]
    fn test_every_log_type_maps_to_action_and_context() {
        let expected = [
            ("LOGIN", "user_login", "auth_event.json"),
            ("LOGOUT", "user_logout", "auth_event.json"),
            ("PASSWORD_CHANGE", "password_change", "auth_event.json"),
            ("CONFIG_CHANGE", "update_config", "config_change.json"),
            ("DATA_UPDATE", "update_record", "data_access.json"),
            ("DEPLOYMENT", "deployment", "operation_event.json"),
            ("ANOMALY_DETECTED", "anomaly_detected", "security_alert.json"),
            ("SECURITY_ALERT", "security_alert", "security_alert.json"),
            ("AUDIT_LOG", "log_access", "audit_log.json"),
        ];
        for (log_type, action, context) in expected {
            let payload = classify(log_type, None).unwrap().to_payload().unwrap();
            assert_eq!(payload["action"], action, "{log_type}");
            assert_eq!(payload["@context"], context, "{log_type}");
        }
    }

    #[test]
    fn test_optional_fields_default() {
        let payload = classify("CONFIG_CHANGE", None).unwrap().to_payload().unwrap();
        assert_eq!(payload["changes"], json!({}));

        let payload = classify("SECURITY_ALERT", None).unwrap().to_payload().unwrap();
        assert_eq!(payload["alertType"], "unknown");
        assert_eq!(payload["details"], "");

        let payload = classify("AUDIT_LOG", Some(json!({"logId": "abc"})))
            .unwrap()
            .to_payload()
            .unwrap();
        assert_eq!(payload["auditorId"], "unknown");
        assert_eq!(payload["logId"], "abc");
    }

    #[test]
    fn test_logout_has_no_extra_fields() {
        let payload = classify("LOGOUT", Some(json!({"status": "ok"})))
            .unwrap()
            .to_payload()
            .unwrap();
        let mut keys: Vec<_> = payload.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["@context", "action", "timestamp", "userId"]);
    }

    #[test]
    fn test_unsupported_log_type() {
        assert_eq!(
            classify("REBOOT", None),
            Err(ClassifyError::UnsupportedLogType("REBOOT".into()))
        );
        assert!(matches!(
            classify("login", None),
            Err(ClassifyError::UnsupportedLogType(_))
        ));
    }

    #[test]
    fn test_log_info_from_json() {
        let info: LogInfo = serde_json::from_value(json!({
            "logType": "DATA_UPDATE",
            "userId": "u1",
            "timestamp": TS,
            "metadata": {"recordId": "r-9"},
            "changes": {"field": "value"}
        }))
        .unwrap();

        let event = info.classify().unwrap();
        assert_eq!(
            event,
            CanonicalEvent::UpdateRecord {
                user_id: "u1".into(),
                record_id: json!("r-9"),
                changes: map(json!({"field": "value"})),
                timestamp: TS.into(),
            }
        );
    }

    #[test]
    fn test_log_info_requires_timestamp_and_user() {
        let mut info = LogInfo {
            log_type: "LOGIN".into(),
            user_id: "u1".into(),
            ..Default::default()
        };
        assert_eq!(info.classify(), Err(ClassifyError::MissingField("timestamp")));

        info.timestamp = Some(TS.into());
        info.user_id.clear();
        assert_eq!(info.classify(), Err(ClassifyError::MissingField("userId")));
    }

    #[test]
    fn test_log_type_parse_display() {
        for t in LogType::ALL {
            assert_eq!(t.as_str().parse::<LogType>().unwrap(), t);
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                Value::String(t.to_string())
            );
        }
    }
}
