use std::collections::BTreeMap;
use std::time::Duration;

use futures::{Stream, StreamExt as _};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::content::{Attachment, ConversationTurn, CustomContent, Role};
use crate::delta::{DeltaEvent, StageAction, StageDelta};
use crate::errors::{ToolError, TransportError};
use crate::model::AgentId;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::stage::{Stage, StageError, StageTracker};

/// Handle used to request cancellation of an in-flight call.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Requests cancellation.
    ///
    /// The aggregator still closes every open stage before the call returns
    /// `ToolError::Cancelled`.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns a signal observed by the aggregation loop.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of an `AbortHandle`.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if every
    /// handle is dropped without aborting.
    pub async fn aborted(&mut self) {
        let handle_dropped = self.rx.wait_for(|aborted| *aborted).await.is_err();
        if handle_dropped {
            std::future::pending::<()>().await;
        }
    }
}

/// Everything collected from one drained stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateResult {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub state: Option<Value>,
    /// All stages seen on the stream; every one is closed after a drain.
    pub stages: BTreeMap<u64, Stage>,
}

impl AggregateResult {
    /// Packages the result as the tool reply for the orchestrating caller.
    ///
    /// The continuation state is stored under `agent` so that a later
    /// history replay can find it.
    pub fn into_reply(self, agent: &AgentId, tool_call_id: impl Into<String>) -> ConversationTurn {
        let state = self.state.map(|state| {
            let mut keyed = Map::new();
            keyed.insert(agent.to_string(), state);
            Value::Object(keyed)
        });
        ConversationTurn {
            role: Role::Tool,
            content: Some(self.content),
            custom_content: Some(CustomContent {
                attachments: self.attachments,
                state,
                extra: Map::new(),
            }),
            tool_call_id: Some(tool_call_id.into()),
            extra: Map::new(),
        }
    }
}

/// Folds the delta events of exactly one stream into an `AggregateResult`.
///
/// Events are applied strictly in arrival order; text fragments and stage
/// mutations are mirrored to the progress sink as they are applied.
pub struct StreamAggregator<'a> {
    content: String,
    attachments: Vec<Attachment>,
    state: Option<Value>,
    tracker: StageTracker,
    sink: &'a dyn ProgressSink,
}

impl<'a> StreamAggregator<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            content: String::new(),
            attachments: Vec::new(),
            state: None,
            tracker: StageTracker::new(),
            sink,
        }
    }

    /// Read access to the stages collected so far.
    pub fn tracker(&self) -> &StageTracker {
        &self.tracker
    }

    /// Drains `stream` to the end and returns the aggregate.
    ///
    /// A stream that simply ends yields whatever was received. A transport
    /// error, an abort or the timeout ends the drain with an error, but only
    /// after all open stages are closed.
    pub async fn drain<S>(
        self,
        stream: S,
        abort: Option<AbortSignal>,
        timeout: Option<Duration>,
    ) -> Result<AggregateResult, ToolError>
    where
        S: Stream<Item = Result<DeltaEvent, TransportError>>,
    {
        self.drain_until(stream, abort, timeout.map(Deadline::after))
            .await
    }

    /// Same as `drain`, against a deadline fixed by the caller.
    pub(crate) async fn drain_until<S>(
        mut self,
        stream: S,
        mut abort: Option<AbortSignal>,
        deadline: Option<Deadline>,
    ) -> Result<AggregateResult, ToolError>
    where
        S: Stream<Item = Result<DeltaEvent, TransportError>>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut expiry = std::pin::pin!(wait_for_deadline(deadline));

        let outcome = loop {
            tokio::select! {
                biased;
                () = wait_for_abort(abort.as_mut()) => break Err(ToolError::Cancelled),
                () = &mut expiry => break Err(timed_out(deadline)),
                next = stream.next() => match next {
                    Some(Ok(event)) => self.apply(event).await,
                    Some(Err(err)) => break Err(ToolError::Transport(err)),
                    None => break Ok(()),
                },
            }
        };

        if let Err(err) = &outcome {
            warn!(error = %err, open_stages = self.tracker.open_count(), "stream aborted; closing open stages");
        }
        self.close_all().await;
        outcome.map(|()| self.into_result())
    }

    /// Applies one event.
    pub async fn apply(&mut self, event: DeltaEvent) {
        match event {
            DeltaEvent::Content(text) => {
                self.content.push_str(&text);
                self.sink.emit(ProgressEvent::Content(text)).await;
            }
            DeltaEvent::Attachments(attachments) => self.attachments.extend(attachments),
            DeltaEvent::State(state) => {
                if self.state.is_some() {
                    debug!("continuation state replaced by a later delta");
                }
                self.state = Some(state);
            }
            DeltaEvent::Stages(deltas) => {
                for delta in deltas {
                    self.apply_stage(delta).await;
                }
            }
        }
    }

    async fn apply_stage(&mut self, delta: StageDelta) {
        let StageDelta { index, action } = delta;

        if !self.tracker.contains(index) {
            let seed = match &action {
                StageAction::AppendName(name) => Some(name.clone()),
                _ => None,
            };
            if let Err(err) = self.tracker.open(index, seed.clone()) {
                debug!(index, error = %err, "stage open rejected");
                return;
            }
            self.sink
                .emit(ProgressEvent::StageOpened { index, name: seed })
                .await;
            if !matches!(action, StageAction::Open | StageAction::AppendName(_)) {
                debug!(index, "payload on the opening delta of a stage dropped");
            }
            return;
        }

        match action {
            StageAction::Open => debug!(index, "stage delta without payload ignored"),
            StageAction::AppendName(fragment) => {
                if applied(index, self.tracker.append_name(index, &fragment)) {
                    self.sink
                        .emit(ProgressEvent::StageName { index, fragment })
                        .await;
                }
            }
            StageAction::AppendContent(fragment) => {
                if applied(index, self.tracker.append_content(index, &fragment)) {
                    self.sink
                        .emit(ProgressEvent::StageContent { index, fragment })
                        .await;
                }
            }
            StageAction::AddAttachments(attachments) => {
                for attachment in attachments {
                    if applied(index, self.tracker.add_attachment(index, attachment.clone())) {
                        self.sink
                            .emit(ProgressEvent::StageAttachment { index, attachment })
                            .await;
                    }
                }
            }
            StageAction::Complete => {
                if self.tracker.close(index) {
                    self.sink.emit(ProgressEvent::StageClosed { index }).await;
                }
            }
        }
    }

    /// Closes every stage that is still open, notifying the sink.
    pub async fn close_all(&mut self) {
        for index in self.tracker.close_all() {
            debug!(index, "force-closing stage at end of stream");
            self.sink.emit(ProgressEvent::StageClosed { index }).await;
        }
    }

    /// Closes remaining stages and returns the aggregate. For callers that
    /// feed events through `apply` themselves.
    pub async fn finish(mut self) -> AggregateResult {
        self.close_all().await;
        self.into_result()
    }

    fn into_result(self) -> AggregateResult {
        AggregateResult {
            content: self.content,
            attachments: self.attachments,
            state: self.state,
            stages: self.tracker.into_stages(),
        }
    }
}

fn applied(index: u64, result: Result<bool, StageError>) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            debug!(index, "late fragment for closed stage dropped");
            false
        }
        Err(err) => {
            debug!(index, error = %err, "stage mutation rejected");
            false
        }
    }
}

/// Instant at which a whole call is abandoned, with the budget it came from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
    at: Instant,
    after: Duration,
}

impl Deadline {
    pub(crate) fn after(after: Duration) -> Self {
        Self {
            at: Instant::now() + after,
            after,
        }
    }
}

pub(crate) fn timed_out(deadline: Option<Deadline>) -> ToolError {
    let after = deadline.map_or(Duration::ZERO, |d| d.after);
    ToolError::TimedOut {
        after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
    }
}

pub(crate) async fn wait_for_deadline(deadline: Option<Deadline>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.at).await,
        None => std::future::pending::<()>().await,
    }
}

pub(crate) async fn wait_for_abort(signal: Option<&mut AbortSignal>) {
    match signal {
        Some(signal) => signal.aborted().await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ChannelSink;
    use crate::stage::StageState;
    use futures::stream;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn ok_events(
        events: Vec<DeltaEvent>,
    ) -> impl Stream<Item = Result<DeltaEvent, TransportError>> {
        stream::iter(events.into_iter().map(Ok))
    }

    fn stage(index: u64, action: StageAction) -> DeltaEvent {
        DeltaEvent::Stages(vec![StageDelta::new(index, action)])
    }

    fn received(rx: &mut mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn scenario_content_and_explicitly_completed_stage() {
        let (sink, _rx) = ChannelSink::channel(64);
        let result = StreamAggregator::new(&sink)
            .drain(
                ok_events(vec![
                    DeltaEvent::Content("Hel".into()),
                    DeltaEvent::Content("lo".into()),
                    stage(0, StageAction::AppendName("Searching".into())),
                    stage(0, StageAction::Complete),
                ]),
                None,
                None,
            )
            .await
            .expect("drain");

        assert_eq!(result.content, "Hello");
        assert_eq!(result.stages.len(), 1);
        let searching = &result.stages[&0];
        assert_eq!(searching.name, "Searching");
        assert_eq!(searching.content, "");
        assert_eq!(searching.state, StageState::Closed);
    }

    #[tokio::test]
    async fn scenario_abrupt_end_force_closes_stage() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let result = StreamAggregator::new(&sink)
            .drain(
                ok_events(vec![stage(1, StageAction::AppendName("Loading".into()))]),
                None,
                None,
            )
            .await
            .expect("drain");

        assert_eq!(result.stages[&1].name, "Loading");
        assert_eq!(result.stages[&1].state, StageState::Closed);
        assert_eq!(
            received(&mut rx),
            vec![
                ProgressEvent::StageOpened {
                    index: 1,
                    name: Some("Loading".into())
                },
                ProgressEvent::StageClosed { index: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn content_is_forwarded_in_arrival_order() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let fragments = ["a", "b", "c", "d"];
        let result = StreamAggregator::new(&sink)
            .drain(
                ok_events(
                    fragments
                        .iter()
                        .map(|f| DeltaEvent::Content((*f).to_string()))
                        .collect(),
                ),
                None,
                None,
            )
            .await
            .expect("drain");

        assert_eq!(result.content, "abcd");
        let forwarded: Vec<_> = received(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Content(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(forwarded, fragments);
    }

    #[tokio::test]
    async fn name_on_known_stage_appends_and_late_fragments_are_dropped() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let result = StreamAggregator::new(&sink)
            .drain(
                ok_events(vec![
                    stage(7, StageAction::AppendName("Read".into())),
                    stage(7, StageAction::AppendName("ing file".into())),
                    stage(7, StageAction::AppendContent("line 1".into())),
                    stage(7, StageAction::Complete),
                    stage(7, StageAction::AppendContent("late".into())),
                    stage(7, StageAction::AppendName("late".into())),
                    stage(7, StageAction::Complete),
                ]),
                None,
                None,
            )
            .await
            .expect("drain");

        let read = &result.stages[&7];
        assert_eq!(read.name, "Reading file");
        assert_eq!(read.content, "line 1");
        let closes = received(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, ProgressEvent::StageClosed { .. }))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn first_delta_for_unseen_stage_only_opens_it() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let result = StreamAggregator::new(&sink)
            .drain(
                ok_events(vec![
                    stage(2, StageAction::AppendContent("body".into())),
                    stage(2, StageAction::AppendContent("more".into())),
                    stage(3, StageAction::Complete),
                    stage(4, StageAction::Open),
                    stage(
                        5,
                        StageAction::AddAttachments(vec![Attachment::link("x.md", None)]),
                    ),
                ]),
                None,
                None,
            )
            .await
            .expect("drain");

        assert_eq!(result.stages[&2].name, "");
        assert_eq!(result.stages[&2].content, "more");
        assert!(result.stages[&5].attachments.is_empty());
        assert!(result.stages.values().all(|s| s.state == StageState::Closed));

        let events = received(&mut rx);
        assert_eq!(
            events[..2],
            [
                ProgressEvent::StageOpened {
                    index: 2,
                    name: None
                },
                ProgressEvent::StageContent {
                    index: 2,
                    fragment: "more".into()
                },
            ]
        );
        // Stage 3 is opened by its completion delta and only closed at the end.
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ProgressEvent::StageClosed { index: 3 }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn attachments_accumulate_and_state_is_last_write_wins() {
        let (sink, _rx) = ChannelSink::channel(64);
        let first = Attachment::link("a.txt", None);
        let second = Attachment::link("b.txt", Some("B".into()));
        let result = StreamAggregator::new(&sink)
            .drain(
                ok_events(vec![
                    DeltaEvent::Attachments(vec![first.clone()]),
                    DeltaEvent::State(json!({"v": 1})),
                    DeltaEvent::Attachments(vec![second.clone()]),
                    DeltaEvent::State(json!({"v": 2})),
                    stage(0, StageAction::AddAttachments(vec![first.clone()])),
                ]),
                None,
                None,
            )
            .await
            .expect("drain");

        assert_eq!(result.attachments, vec![first.clone(), second]);
        assert_eq!(result.state, Some(json!({"v": 2})));
        assert_eq!(result.stages[&0].attachments, vec![first]);
    }

    #[tokio::test]
    async fn transport_error_propagates_after_closing_stages() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let events = vec![
            Ok(stage(0, StageAction::AppendName("Search".into()))),
            Err(TransportError::transport("web_search_agent", "connection reset")),
            Ok(DeltaEvent::Content("never".into())),
        ];
        let err = StreamAggregator::new(&sink)
            .drain(stream::iter(events), None, None)
            .await
            .expect_err("transport failure");

        assert!(matches!(err, ToolError::Transport(TransportError::Transport { .. })));
        let events = received(&mut rx);
        assert_eq!(events.last(), Some(&ProgressEvent::StageClosed { index: 0 }));
        assert!(!events.contains(&ProgressEvent::Content("never".into())));
    }

    #[tokio::test]
    async fn abort_closes_open_stages_before_returning() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let handle = AbortHandle::new();
        let stream = ok_events(vec![stage(5, StageAction::AppendName("Think".into()))])
            .chain(stream::pending());

        let (outcome, ()) = tokio::join!(
            StreamAggregator::new(&sink).drain(stream, Some(handle.signal()), None),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                handle.abort();
            }
        );

        assert_eq!(outcome, Err(ToolError::Cancelled));
        assert_eq!(
            received(&mut rx).last(),
            Some(&ProgressEvent::StageClosed { index: 5 })
        );
    }

    #[tokio::test]
    async fn timeout_closes_open_stages_before_returning() {
        let (sink, mut rx) = ChannelSink::channel(64);
        let stream = ok_events(vec![stage(0, StageAction::AppendName("Wait".into()))])
            .chain(stream::pending());

        let outcome = StreamAggregator::new(&sink)
            .drain(stream, None, Some(Duration::from_millis(10)))
            .await;

        assert_eq!(outcome, Err(ToolError::TimedOut { after_ms: 10 }));
        assert_eq!(
            received(&mut rx).last(),
            Some(&ProgressEvent::StageClosed { index: 0 })
        );
    }

    #[tokio::test]
    async fn manual_apply_then_finish_closes_everything() {
        let (sink, _rx) = ChannelSink::channel(64);
        let mut aggregator = StreamAggregator::new(&sink);
        aggregator
            .apply(stage(0, StageAction::AppendName("a".into())))
            .await;
        aggregator
            .apply(stage(1, StageAction::AppendName("b".into())))
            .await;
        aggregator.apply(stage(1, StageAction::Complete)).await;
        assert_eq!(aggregator.tracker().open_count(), 1);

        let result = aggregator.finish().await;
        assert!(result.stages.values().all(|s| s.state == StageState::Closed));
    }

    #[test]
    fn reply_embeds_state_under_agent_identity() {
        let result = AggregateResult {
            content: "done".into(),
            attachments: vec![Attachment::link("r.md", None)],
            state: Some(json!({"k": 1})),
            stages: BTreeMap::new(),
        };
        let reply = result.into_reply(&AgentId::from("web_search_agent"), "call-1");
        assert_eq!(reply.role, Role::Tool);
        assert_eq!(reply.content.as_deref(), Some("done"));
        assert_eq!(reply.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(reply.state(), Some(&json!({"web_search_agent": {"k": 1}})));
    }
}
