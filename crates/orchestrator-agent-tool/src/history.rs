use tracing::{debug, warn};

use crate::content::{ConversationTurn, Role};
use crate::delta::is_truthy;
use crate::model::AgentId;

/// A previous exchange with the same agent, ready to be replayed.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayPair {
    /// The turn immediately preceding `assistant` in the transcript.
    pub user: ConversationTurn,
    /// Copy of the assistant turn whose state holds only `agent`'s entry.
    pub assistant: ConversationTurn,
}

impl ReplayPair {
    pub fn into_turns(self) -> [ConversationTurn; 2] {
        [self.user, self.assistant]
    }
}

/// Selects the prior exchanges with `agent` from `transcript`, in order.
///
/// An assistant turn qualifies when its state map holds a non-empty entry
/// for `agent`. The replayed copy carries that entry alone, so one agent
/// never sees another agent's state.
pub fn reconstruct_history(transcript: &[ConversationTurn], agent: &AgentId) -> Vec<ReplayPair> {
    let mut pairs = Vec::new();
    for (position, turn) in transcript.iter().enumerate() {
        if turn.role != Role::Assistant {
            continue;
        }
        let Some(own_state) = turn
            .state()
            .and_then(|state| state.get(agent.as_str()))
            .filter(|state| is_truthy(state))
        else {
            continue;
        };
        let Some(user) = position
            .checked_sub(1)
            .and_then(|previous| transcript.get(previous))
        else {
            warn!(agent = %agent, "assistant turn at transcript start has no preceding user turn; skipped");
            continue;
        };

        let mut assistant = turn.clone();
        if let Some(custom_content) = assistant.custom_content.as_mut() {
            custom_content.state = Some(own_state.clone());
        }
        pairs.push(ReplayPair {
            user: user.clone(),
            assistant,
        });
    }
    debug!(agent = %agent, pairs = pairs.len(), "reconstructed agent history");
    pairs
}
