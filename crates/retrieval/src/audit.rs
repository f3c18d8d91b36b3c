use std::collections::HashSet;

use uuid::Uuid;

use mnemo_core::MnemoError;

use crate::RetrievalEngine;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AuditResult {
    pub violations: Vec<String>,
    pub stale_references: Vec<String>,
    pub missing_constraints: Vec<String>,
    pub fixes: Vec<String>,
}

impl RetrievalEngine {
    /// Checks a plan's text against the thread's memory for consistency
    /// violations. Shallow audits only populate `stale_references`; `deep`
    /// additionally asks the LLM to compare `plan_text` against active and
    /// superseded items.
    pub async fn audit_consistency(
        &self,
        thread_id: Uuid,
        plan_text: &str,
        deep: bool,
    ) -> Result<AuditResult, MnemoError> {
        let mut stale = self.stale_references(thread_id, plan_text).await?;

        if !deep {
            return Ok(AuditResult {
                stale_references: stale,
                ..Default::default()
            });
        }

        let active = self.store().list_active_by_thread(thread_id).await?;
        let history = self.store().list_active_and_superseded_by_thread(thread_id).await?;

        let active_rendered = active
            .iter()
            .map(|item| format!("[active] {}: {}", item.title, item.statement))
            .collect::<Vec<_>>()
            .join("\n");
        let history_rendered = history
            .iter()
            .map(|item| format!("[{:?}] {}: {}", item.status, item.title, item.statement))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "Compare the proposed plan against the thread's active and historical memory \
             items. Return strict JSON with keys violations, stale_references, missing_constraints, fixes.";
        let user = format!(
            "Proposed plan:\n{plan_text}\n\nActive items:\n{active_rendered}\n\nHistory:\n{history_rendered}"
        );
        let response = self.llm().chat_json(system, &user).await?;

        let violations = string_list(&response, "violations");
        let missing_constraints = string_list(&response, "missing_constraints");
        let fixes = string_list(&response, "fixes");
        let llm_stale = string_list(&response, "stale_references");

        let mut seen: HashSet<String> = stale.iter().cloned().collect();
        for item in llm_stale {
            if seen.insert(item.clone()) {
                stale.push(item);
            }
        }

        Ok(AuditResult {
            violations,
            stale_references: stale,
            missing_constraints,
            fixes,
        })
    }
}

fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_list_defaults_to_empty_when_missing() {
        let value = serde_json::json!({});
        assert!(string_list(&value, "violations").is_empty());
    }
}
