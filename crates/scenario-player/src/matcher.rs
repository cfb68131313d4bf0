//! Message matcher
//!
//! Pairs an arriving wire message with the receive step the scenario is
//! waiting on and settles that step: comparison through the codec, peer
//! check, then capture of received values into variables.

use crate::error::Result;
use scenario_core::{Comparison, MessageCodec, Scenario, StepId, WireMessage};
use std::time::Instant;
use tracing::debug;

/// Result of settling a receive step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    /// The differences found, one per line
    Mismatch(Vec<String>),
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched)
    }
}

/// Matches arrivals against expected messages
pub struct MessageMatcher<'a> {
    codec: &'a dyn MessageCodec,
}

impl<'a> MessageMatcher<'a> {
    pub fn new(codec: &'a dyn MessageCodec) -> Self {
        Self { codec }
    }

    /// The receive step an arrival would settle
    ///
    /// Only the step right after the last played one qualifies, and only
    /// while it has not been processed.
    pub fn pending_receive(&self, scenario: &Scenario) -> Result<Option<StepId>> {
        let Some(id) = scenario.next_step()? else {
            return Ok(None);
        };
        let pending = scenario
            .graph
            .step(id)?
            .as_message()
            .is_some_and(|m| m.is_receive() && !m.processed);
        Ok(pending.then_some(id))
    }

    /// Settle receive step `id` with `wire`, received at `at`
    ///
    /// The step is marked processed whatever the outcome. Captured values
    /// are stored only when the message matches.
    pub fn settle(
        &self,
        scenario: &mut Scenario,
        id: StepId,
        wire: &WireMessage,
        at: Instant,
    ) -> Result<MatchOutcome> {
        let Scenario { graph, vars, .. } = &mut *scenario;
        let message = graph.message_mut(id)?;
        message.mark_processed(at);
        message.wire = Some(wire.clone());

        let mut comparison = match self.codec.compare(wire, &message.template, &*vars) {
            Ok(comparison) => comparison,
            Err(e) => Comparison {
                diffs: vec![e.to_string()],
                captures: Vec::new(),
            },
        };
        if let (Some(expected), Some(origin)) = (&message.peer, &wire.origin) {
            if expected != origin {
                comparison.diff(format!("expected from {}, came from {}", expected, origin));
            }
        }
        if !comparison.is_match() {
            return Ok(MatchOutcome::Mismatch(comparison.diffs));
        }

        for (name, value) in comparison.captures {
            let var = vars
                .lookup(&name)
                .ok_or(scenario_core::Error::VariableNotFound(name))?;
            vars.set(var, value)?;
            let stale = vars.notify_if_changed(var);
            if !stale.is_empty() {
                debug!("Captured {}, rebuilding {:?}", var, stale);
                graph.mark_stale(&stale);
            }
        }
        Ok(MatchOutcome::Matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_core::{Value, VarLookup};
    use scenario_script::{Loader, MessageDoc, RonMessageCodec};
    use std::fs;
    use std::path::Path;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn wire(kind: &str, fields: &[(&str, &str)]) -> WireMessage {
        let doc = MessageDoc {
            kind: kind.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        RonMessageCodec.encode(&doc).unwrap()
    }

    fn scenario(dir: &Path) -> Scenario {
        write(
            dir,
            "req.ron",
            r##"(kind: "AUTH_REQ", fields: {"ue": "$UE_ID", "rand": "#RAND"})"##,
        );
        write(dir, "rsp.ron", r#"(kind: "AUTH_RSP", fields: {"rand": "$RAND"})"#);
        let script = r#"#![enable(implicit_some)]
            (name: "auth", steps: [
                Var(name: "UE_ID", value: "7"),
                Var(name: "RAND", hex: "00"),
                Message(action: Receive, file: "req.ron", peer: "TASK_MME_APP"),
                Message(action: Send, file: "rsp.ron", peer: "TASK_MME_APP"),
            ])"#;
        Loader::new(&RonMessageCodec)
            .load_scenario_str(script, dir.join("auth.ron"))
            .unwrap()
    }

    #[test]
    fn test_pending_receive_follows_last_played() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = scenario(dir.path());
        let matcher = MessageMatcher::new(&RonMessageCodec);

        // head is a var step
        assert_eq!(matcher.pending_receive(&scenario).unwrap(), None);
        scenario.last_played = Some(StepId::new(2));
        assert_eq!(
            matcher.pending_receive(&scenario).unwrap(),
            Some(StepId::new(3))
        );
        scenario.last_played = Some(StepId::new(3));
        assert_eq!(matcher.pending_receive(&scenario).unwrap(), None);
    }

    #[test]
    fn test_match_captures_and_marks_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = scenario(dir.path());
        let matcher = MessageMatcher::new(&RonMessageCodec);
        let arrival = wire("AUTH_REQ", &[("ue", "7"), ("rand", "a1b2")]).from_task("TASK_MME_APP");

        let outcome = matcher
            .settle(&mut scenario, StepId::new(3), &arrival, Instant::now())
            .unwrap();
        assert!(outcome.is_match());
        assert_eq!(
            scenario.vars.resolve("RAND"),
            Some(&Value::Bytes(vec![0xa1, 0xb2]))
        );
        assert!(scenario.graph.message(StepId::new(3)).unwrap().processed);
        assert!(scenario.graph.message(StepId::new(4)).unwrap().stale);
    }

    #[test]
    fn test_mismatch_keeps_variables() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = scenario(dir.path());
        let matcher = MessageMatcher::new(&RonMessageCodec);
        let arrival = wire("AUTH_REQ", &[("ue", "8"), ("rand", "ff")]);

        match matcher
            .settle(&mut scenario, StepId::new(3), &arrival, Instant::now())
            .unwrap()
        {
            MatchOutcome::Mismatch(diffs) => assert_eq!(diffs.len(), 1),
            MatchOutcome::Matched => panic!("expected a mismatch"),
        }
        assert_eq!(scenario.vars.resolve("RAND"), Some(&Value::Bytes(vec![0])));
        // still consumed
        assert!(scenario.graph.message(StepId::new(3)).unwrap().processed);
    }

    #[test]
    fn test_wrong_origin_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = scenario(dir.path());
        let matcher = MessageMatcher::new(&RonMessageCodec);
        let arrival = wire("AUTH_REQ", &[("ue", "7"), ("rand", "00")]).from_task("TASK_S1AP");

        let outcome = matcher
            .settle(&mut scenario, StepId::new(3), &arrival, Instant::now())
            .unwrap();
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_undecodable_payload_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = scenario(dir.path());
        let matcher = MessageMatcher::new(&RonMessageCodec);
        let arrival = WireMessage::new("AUTH_REQ", b"not ron".to_vec());

        let outcome = matcher
            .settle(&mut scenario, StepId::new(3), &arrival, Instant::now())
            .unwrap();
        assert!(!outcome.is_match());
    }
}
