//! `retrieve.decision_state`: a flat, no-ranking view of a thread's active
//! memory graph, grouped by type for a caller that wants the whole picture
//! rather than a relevance-scored slice (that's `retrieve.context`).

use mnemo_core::{MemoryItem, MemoryItemType, MnemoError};
use mnemo_store::Store;
use uuid::Uuid;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DecisionState {
    pub decisions: Vec<MemoryItem>,
    pub constraints: Vec<MemoryItem>,
    pub avoid_list_mistakes: Vec<MemoryItem>,
    pub assumptions: Vec<MemoryItem>,
    pub open_questions: Vec<MemoryItem>,
}

pub async fn build(store: &Store, thread_id: Uuid) -> Result<DecisionState, MnemoError> {
    let items = store.list_active_by_thread(thread_id).await?;
    let mut state = DecisionState::default();
    for item in items {
        match item.item_type {
            MemoryItemType::Decision => state.decisions.push(item),
            MemoryItemType::Constraint => state.constraints.push(item),
            MemoryItemType::Mistake => state.avoid_list_mistakes.push(item),
            MemoryItemType::Assumption => state.assumptions.push(item),
            MemoryItemType::OpenQuestion => state.open_questions.push(item),
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_has_empty_groups() {
        let state = DecisionState::default();
        assert!(state.decisions.is_empty());
        assert!(state.avoid_list_mistakes.is_empty());
    }
}
