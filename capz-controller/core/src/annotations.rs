use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Annotation carrying the per-NSG security rules applied by the previous
/// reconcile, keyed by NSG name. Used to diff against user edits.
pub const SECURITY_RULES_LAST_APPLIED: &str =
    "azure.cluster.x-k8s.io/security-rules-last-applied";

/// RFC3339 timestamp of the last kubeconfig write for an ARO control plane.
pub const KUBECONFIG_LAST_UPDATED: &str = "aro.azure.com/kubeconfig-last-updated";

/// Set to `"true"` to force a kubeconfig refresh on the next reconcile.
pub const KUBECONFIG_REFRESH_NEEDED: &str = "aro.azure.com/kubeconfig-refresh-needed";

pub type AnnotationMap = BTreeMap<String, String>;

/// Reads a JSON object persisted under `key`. A missing annotation is `None`;
/// a present-but-unparseable one is an error.
pub fn get_json(
    annotations: &AnnotationMap,
    key: &str,
) -> Result<Option<serde_json::Map<String, serde_json::Value>>, serde_json::Error> {
    match annotations.get(key) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw).map(Some),
    }
}

/// Serializes `value` under `key`, replacing any prior payload.
pub fn set_json(
    annotations: &mut AnnotationMap,
    key: &str,
    value: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), serde_json::Error> {
    annotations.insert(key.to_string(), serde_json::to_string(value)?);
    Ok(())
}

/// The security rules applied to one NSG on the previous reconcile, keyed by
/// rule name.
pub type LastAppliedSecurityRules = BTreeMap<String, serde_json::Value>;

/// Reads the last-applied rule set for a single NSG from the cluster's
/// annotation payload.
pub fn last_applied_security_rules(
    annotations: &AnnotationMap,
    nsg_name: &str,
) -> LastAppliedSecurityRules {
    let Ok(Some(by_nsg)) = get_json(annotations, SECURITY_RULES_LAST_APPLIED) else {
        return LastAppliedSecurityRules::new();
    };
    match by_nsg.get(nsg_name).and_then(|v| v.as_object()) {
        Some(rules) => rules.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        None => LastAppliedSecurityRules::new(),
    }
}

/// Typed view of the kubeconfig bookkeeping annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KubeconfigMeta {
    pub last_updated: Option<DateTime<Utc>>,
    pub refresh_needed: bool,
}

// === impl KubeconfigMeta ===

impl KubeconfigMeta {
    pub fn from_annotations(annotations: &AnnotationMap) -> Self {
        let last_updated = annotations
            .get(KUBECONFIG_LAST_UPDATED)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));
        let refresh_needed = annotations
            .get(KUBECONFIG_REFRESH_NEEDED)
            .is_some_and(|v| v == "true");
        Self { last_updated, refresh_needed }
    }

    pub fn write_to(&self, annotations: &mut AnnotationMap) {
        match self.last_updated {
            Some(t) => {
                annotations.insert(KUBECONFIG_LAST_UPDATED.to_string(), t.to_rfc3339());
            }
            None => {
                annotations.remove(KUBECONFIG_LAST_UPDATED);
            }
        }
        if self.refresh_needed {
            annotations.insert(KUBECONFIG_REFRESH_NEEDED.to_string(), "true".to_string());
        } else {
            annotations.remove(KUBECONFIG_REFRESH_NEEDED);
        }
    }
}
