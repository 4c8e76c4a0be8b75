use std::collections::BTreeMap;

use crate::content::Attachment;

/// Lifecycle of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StageState {
    Open,
    Closed,
}

/// A named, independently closable progress indicator inside one call.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    pub name: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub state: StageState,
}

impl Stage {
    fn open(name: Option<String>) -> Self {
        Self {
            name: name.unwrap_or_default(),
            content: String::new(),
            attachments: Vec::new(),
            state: StageState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == StageState::Open
    }
}

/// Errors from strict stage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("stage {index} is already tracked")]
    Duplicate { index: u64 },
    #[error("stage {index} is not tracked")]
    Unknown { index: u64 },
}

/// Owns every stage of one stream, keyed by the stream-assigned index.
///
/// Closed stages are frozen: mutations addressed to them are accepted and
/// dropped. The `bool` returned by mutators reports whether the stage
/// actually changed.
#[derive(Debug, Default)]
pub struct StageTracker {
    stages: BTreeMap<u64, Stage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a new open stage, optionally seeded with a name.
    pub fn open(&mut self, index: u64, name: Option<String>) -> Result<&Stage, StageError> {
        if self.stages.contains_key(&index) {
            return Err(StageError::Duplicate { index });
        }
        Ok(self.stages.entry(index).or_insert_with(|| Stage::open(name)))
    }

    pub fn append_name(&mut self, index: u64, fragment: &str) -> Result<bool, StageError> {
        self.mutate_open(index, |stage| stage.name.push_str(fragment))
    }

    pub fn append_content(&mut self, index: u64, fragment: &str) -> Result<bool, StageError> {
        self.mutate_open(index, |stage| stage.content.push_str(fragment))
    }

    pub fn add_attachment(
        &mut self,
        index: u64,
        attachment: Attachment,
    ) -> Result<bool, StageError> {
        self.mutate_open(index, |stage| stage.attachments.push(attachment))
    }

    /// Closes the stage at `index`. Closing an untracked or already closed
    /// stage is a no-op; returns `true` only on an Open to Closed transition.
    pub fn close(&mut self, index: u64) -> bool {
        match self.stages.get_mut(&index) {
            Some(stage) if stage.is_open() => {
                stage.state = StageState::Closed;
                true
            }
            _ => false,
        }
    }

    /// Closes every open stage and returns the indices that were closed, in
    /// ascending order.
    pub fn close_all(&mut self) -> Vec<u64> {
        self.stages
            .iter_mut()
            .filter(|(_, stage)| stage.is_open())
            .map(|(index, stage)| {
                stage.state = StageState::Closed;
                *index
            })
            .collect()
    }

    pub fn get(&self, index: u64) -> Option<&Stage> {
        self.stages.get(&index)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.stages.contains_key(&index)
    }

    pub fn open_count(&self) -> usize {
        self.stages.values().filter(|stage| stage.is_open()).count()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn into_stages(self) -> BTreeMap<u64, Stage> {
        self.stages
    }

    fn mutate_open(
        &mut self,
        index: u64,
        apply: impl FnOnce(&mut Stage),
    ) -> Result<bool, StageError> {
        let stage = self
            .stages
            .get_mut(&index)
            .ok_or(StageError::Unknown { index })?;
        if !stage.is_open() {
            return Ok(false);
        }
        apply(stage);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_duplicate_index() {
        let mut tracker = StageTracker::new();
        tracker.open(4, Some("Search".into())).expect("open");
        assert_eq!(tracker.open(4, None), Err(StageError::Duplicate { index: 4 }));
        assert_eq!(tracker.get(4).map(|s| s.name.as_str()), Some("Search"));
    }

    #[test]
    fn appends_concatenate_fragments() {
        let mut tracker = StageTracker::new();
        tracker.open(0, Some("Read".into())).expect("open");
        assert_eq!(tracker.append_name(0, "ing"), Ok(true));
        assert_eq!(tracker.append_content(0, "a"), Ok(true));
        assert_eq!(tracker.append_content(0, "b"), Ok(true));
        let stage = tracker.get(0).expect("stage");
        assert_eq!(stage.name, "Reading");
        assert_eq!(stage.content, "ab");
    }

    #[test]
    fn mutating_untracked_stage_is_an_error() {
        let mut tracker = StageTracker::new();
        assert_eq!(tracker.append_name(9, "x"), Err(StageError::Unknown { index: 9 }));
        assert_eq!(
            tracker.add_attachment(9, Attachment::default()),
            Err(StageError::Unknown { index: 9 })
        );
    }

    #[test]
    fn closed_stage_ignores_late_fragments() {
        let mut tracker = StageTracker::new();
        tracker.open(1, Some("Load".into())).expect("open");
        assert!(tracker.close(1));
        let before = tracker.get(1).cloned();

        assert_eq!(tracker.append_name(1, "ing"), Ok(false));
        assert_eq!(tracker.append_content(1, "late"), Ok(false));
        assert_eq!(tracker.add_attachment(1, Attachment::link("x", None)), Ok(false));
        assert_eq!(tracker.get(1).cloned(), before);
    }

    #[test]
    fn close_is_idempotent() {
        let mut tracker = StageTracker::new();
        tracker.open(2, Some("Step".into())).expect("open");
        assert!(tracker.close(2));
        let once = tracker.get(2).cloned();
        assert!(!tracker.close(2));
        assert!(tracker.close_all().is_empty());
        assert_eq!(tracker.get(2).cloned(), once);
        assert!(!tracker.close(77));
    }

    #[test]
    fn close_all_closes_only_open_stages() {
        let mut tracker = StageTracker::new();
        for index in [5, 1, 3, 8] {
            tracker.open(index, Some(format!("s{index}"))).expect("open");
        }
        tracker.close(3);
        tracker.close(8);
        let closed_before = tracker.get(3).cloned();

        assert_eq!(tracker.close_all(), vec![1, 5]);
        assert_eq!(tracker.open_count(), 0);
        assert_eq!(tracker.len(), 4);
        assert_eq!(tracker.get(3).cloned(), closed_before);
        assert!(
            tracker
                .into_stages()
                .values()
                .all(|stage| stage.state == StageState::Closed)
        );
    }
}
