//! Resumable scenario scheduler
//!
//! The scheduler is a plain state machine: every entry point takes the
//! playlist and the current instant, plays as many steps as it can, then
//! returns a [`Flow`] telling its driver what to wait for. It never blocks
//! and never reads the clock, so it can be driven by the tokio event loop in
//! [`crate::Player`] or stepped by hand in tests.
//!
//! Entry points:
//! - [`Scheduler::run`] - start or continue play
//! - [`Scheduler::on_timer`] - a receive (or anchored send) deadline expired
//! - [`Scheduler::on_message`] - a message arrived from the system under test

use crate::error::{Error, Result};
use crate::matcher::{MatchOutcome, MessageMatcher};
use crate::playlist::Playlist;
use crate::timer::TimerService;
use scenario_core::{
    Anchor, CredentialEngine, ExitStatus, JumpStep, MessageBus, MessageCodec, MessageStep,
    Operand, Scenario, ScenarioStatus, SecurityUpdateStep, SetVarStep, Step, StepId, StepKind,
    TimerKey, UnsupportedCredentials, Value, VariableStore, WireMessage,
};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const RAND: &str = "RAND";
const AUTN: &str = "AUTN";
const SELECTED_PLMN: &str = "SELECTED_PLMN";
const AUTH_RESPONSE: &str = "AUTHENTICATION_RESPONSE_PARAMETER";
const AUTH_FAILURE: &str = "AUTHENTICATION_FAILURE_PARAMETER";

/// What the driver has to do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Wait this long, then call [`Scheduler::run`] again
    Sleep(Duration),
    /// Nothing to do until a timer expires or a message arrives
    Waiting,
    /// Every scenario of the playlist is over
    Finished,
}

/// Result of playing one step
enum Outcome {
    Continue,
    Sleep(Duration),
    Wait,
    /// The scenario reached a terminal status
    End,
}

/// What a step does, detached from the graph so the scenario can be mutated
enum Action {
    Send,
    Receive,
    Declare,
    Set(SetVarStep),
    Add(StepId, i64),
    Label,
    Jump(JumpStep),
    Sleep,
    Exit(Option<ExitStatus>),
    ComputeAuth,
    UpdateSecurity(SecurityUpdateStep),
}

impl Action {
    fn of(kind: &StepKind) -> Self {
        match kind {
            StepKind::Message(m) if m.is_send() => Action::Send,
            StepKind::Message(_) => Action::Receive,
            StepKind::Variable(_) => Action::Declare,
            StepKind::SetVar(set) => Action::Set(set.clone()),
            StepKind::Increment(var) => Action::Add(*var, 1),
            StepKind::Decrement(var) => Action::Add(*var, -1),
            StepKind::Label(_) => Action::Label,
            StepKind::Jump(jump) => Action::Jump(jump.clone()),
            StepKind::Sleep(_) => Action::Sleep,
            StepKind::Exit(status) => Action::Exit(*status),
            StepKind::ComputeAuthResponse => Action::ComputeAuth,
            StepKind::UpdateSecurityContext(update) => Action::UpdateSecurity(update.clone()),
        }
    }
}

/// Plays the scenarios of a playlist one after the other
pub struct Scheduler {
    codec: Box<dyn MessageCodec>,
    bus: Box<dyn MessageBus>,
    credentials: Box<dyn CredentialEngine>,
    timers: Box<dyn TimerService>,
    next_timer_seq: u64,
}

impl Scheduler {
    /// Create a scheduler without a credential engine
    ///
    /// Credential steps fail the scenario until one is set with
    /// [`Scheduler::with_credentials`].
    pub fn new(
        codec: Box<dyn MessageCodec>,
        bus: Box<dyn MessageBus>,
        timers: Box<dyn TimerService>,
    ) -> Self {
        Self {
            codec,
            bus,
            credentials: Box::new(UnsupportedCredentials),
            timers,
            next_timer_seq: 0,
        }
    }

    pub fn with_credentials(mut self, credentials: Box<dyn CredentialEngine>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn codec(&self) -> &dyn MessageCodec {
        self.codec.as_ref()
    }

    /// Play until something has to be waited for
    pub fn run(&mut self, playlist: &mut Playlist, now: Instant) -> Result<Flow> {
        while let Some(index) = playlist.current_index() {
            let scenario = playlist.scenario_mut(index)?;
            match scenario.status() {
                status if status.is_terminal() => {
                    playlist.advance();
                    continue;
                }
                ScenarioStatus::Paused => return Ok(Flow::Waiting),
                ScenarioStatus::Loaded => {
                    info!("Playing scenario {}", scenario.name);
                    scenario.set_status(ScenarioStatus::Playing);
                    scenario.started = Some(now);
                }
                ScenarioStatus::Playing => {}
                status => {
                    return Err(Error::Internal(format!(
                        "scenario {} cannot be played while {}",
                        scenario.name, status
                    )))
                }
            }
            match self.step(index, scenario, now)? {
                Outcome::Continue | Outcome::End => {}
                Outcome::Sleep(remaining) => return Ok(Flow::Sleep(remaining)),
                Outcome::Wait => return Ok(Flow::Waiting),
            }
        }
        Ok(Flow::Finished)
    }

    /// Handle the expiry of a timer armed by this scheduler
    pub fn on_timer(&mut self, playlist: &mut Playlist, key: TimerKey, now: Instant) -> Result<Flow> {
        let armed = playlist
            .get(key.scenario)
            .and_then(|s| s.graph.get(key.step))
            .and_then(Step::as_message)
            .is_some_and(|m| m.timer == Some(key));
        if !armed {
            debug!("Ignoring stale {}", key);
            return self.run(playlist, now);
        }

        let scenario = playlist.scenario_mut(key.scenario)?;
        let message = scenario.graph.message_mut(key.step)?;
        message.timer = None;
        let (processed, is_send, kind) = (
            message.processed,
            message.is_send(),
            message.template.kind().to_string(),
        );
        scenario.timers = scenario.timers.saturating_sub(1);
        if scenario.status() == ScenarioStatus::Paused {
            scenario.set_status(ScenarioStatus::Playing);
        }

        if !processed {
            if is_send {
                self.transmit(scenario, key.step, now)?;
            } else {
                let reason = format!("timed out waiting for {} at {}", kind, key.step);
                self.fail(scenario, reason);
            }
        }
        self.run(playlist, now)
    }

    /// Handle a message sent by the system under test
    ///
    /// A message nobody waits for is logged and dropped.
    pub fn on_message(
        &mut self,
        playlist: &mut Playlist,
        wire: WireMessage,
        now: Instant,
    ) -> Result<Flow> {
        let Some(index) = playlist.current_index() else {
            warn!("Discarding {}: no scenario left to play", wire.kind);
            return Ok(Flow::Finished);
        };
        let scenario = playlist.scenario_mut(index)?;
        let pending = match scenario.status() {
            ScenarioStatus::Playing | ScenarioStatus::Paused => {
                MessageMatcher::new(self.codec.as_ref()).pending_receive(scenario)?
            }
            _ => None,
        };
        let Some(id) = pending else {
            warn!("{}: discarding unexpected {}", scenario.name, wire.kind);
            return self.run(playlist, now);
        };

        self.disarm(scenario, id)?;
        let outcome = MessageMatcher::new(self.codec.as_ref()).settle(scenario, id, &wire, now)?;
        match outcome {
            MatchOutcome::Matched => {
                info!("{}: received {} at {}", scenario.name, wire.kind, id);
                scenario.set_status(ScenarioStatus::Playing);
                scenario.last_played = Some(id);
            }
            MatchOutcome::Mismatch(diffs) => {
                for diff in &diffs {
                    error!("{}: {} at {}: {}", scenario.name, wire.kind, id, diff);
                }
                let reason = format!("{} did not match at {}: {}", wire.kind, id, diffs.join("; "));
                self.fail(scenario, reason);
            }
        }
        self.run(playlist, now)
    }

    fn step(&mut self, index: usize, scenario: &mut Scenario, now: Instant) -> Result<Outcome> {
        let Some(id) = scenario.next_step()? else {
            if scenario.timers == 0 {
                return Ok(self.conclude(scenario));
            }
            return Ok(Outcome::Wait);
        };
        let action = Action::of(&scenario.graph.step(id)?.kind);

        let outcome = match action {
            Action::Send => self.play_send(index, scenario, id, now)?,
            Action::Receive => self.play_receive(index, scenario, id, now)?,
            Action::Declare => {
                if scenario.vars.variable(id)?.mirror_of().is_some() {
                    scenario.vars.mirror(id)?;
                    propagate(scenario, id);
                }
                played(scenario, id)
            }
            Action::Set(set) => {
                let value = match &set.source {
                    Operand::Literal(value) => Some(value.clone()),
                    Operand::Variable(source) => scenario.vars.value(*source).cloned(),
                };
                match value {
                    Some(value) => {
                        assign(scenario, set.target, value)?;
                        played(scenario, id)
                    }
                    None => self.fail(scenario, format!("{}: source variable has no value", id)),
                }
            }
            Action::Add(var, delta) => match scenario.vars.value(var).and_then(Value::as_int) {
                Some(current) => {
                    assign(scenario, var, Value::Int(current.wrapping_add(delta)))?;
                    played(scenario, id)
                }
                None => self.fail(scenario, format!("{}: {} has no integer value", id, var)),
            },
            Action::Label => played(scenario, id),
            Action::Jump(jump) => self.play_jump(scenario, id, &jump),
            Action::Sleep => {
                let StepKind::Sleep(sleep) = &mut scenario.graph.step_mut(id)?.kind else {
                    return Err(Error::Internal(format!("{} is not a sleep step", id)));
                };
                let wake_at = match sleep.wake_at {
                    Some(wake_at) => wake_at,
                    None => match now.checked_add(sleep.duration) {
                        Some(wake_at) => *sleep.wake_at.insert(wake_at),
                        None => {
                            let reason =
                                format!("{}: sleep of {:?} is out of range", id, sleep.duration);
                            return Ok(self.fail(scenario, reason));
                        }
                    },
                };
                if wake_at > now {
                    return Ok(Outcome::Sleep(wake_at - now));
                }
                sleep.wake_at = None;
                played(scenario, id)
            }
            Action::Exit(status) => {
                scenario.last_played = Some(id);
                match status {
                    Some(ExitStatus::Failed) => self.fail(scenario, format!("exit at {}", id)),
                    Some(ExitStatus::Success) | None => self.conclude(scenario),
                }
            }
            Action::ComputeAuth => self.compute_auth(scenario, id)?,
            Action::UpdateSecurity(update) => self.update_security(scenario, id, &update),
        };
        Ok(outcome)
    }

    fn play_send(
        &mut self,
        index: usize,
        scenario: &mut Scenario,
        id: StepId,
        now: Instant,
    ) -> Result<Outcome> {
        let deadline = scenario.graph.message(id)?.deadline;
        let Some(anchored) = anchored_at(scenario, id, now)? else {
            debug!("{}: send {} waits for its anchor", scenario.name, id);
            return Ok(Outcome::Wait);
        };
        let Some(due) = deadline.due(anchored) else {
            let reason = format!("delay of {} ({}) is out of range", id, deadline);
            return Ok(self.fail(scenario, reason));
        };
        if due <= now {
            return self.transmit(scenario, id, now);
        }
        match deadline.anchor {
            Anchor::Itself => Ok(Outcome::Sleep(due - now)),
            Anchor::Step(_) => {
                self.arm(index, scenario, id, due - now)?;
                scenario.set_status(ScenarioStatus::Paused);
                Ok(Outcome::Wait)
            }
        }
    }

    /// Build (if stale) and send a message step
    fn transmit(&mut self, scenario: &mut Scenario, id: StepId, now: Instant) -> Result<Outcome> {
        let (destination, wire) = {
            let Scenario { graph, vars, .. } = &mut *scenario;
            let message = graph.message_mut(id)?;
            let destination = message
                .peer
                .clone()
                .ok_or_else(|| Error::Internal(format!("send {} has no destination", id)))?;
            (destination, rematerialize(self.codec.as_ref(), message, vars))
        };
        let wire = match wire {
            Ok(wire) => wire,
            Err(e) => return Ok(self.fail(scenario, format!("cannot build {}: {}", id, e))),
        };
        let kind = wire.kind.clone();
        if let Err(e) = self.bus.send(&destination, wire) {
            return Ok(self.fail(scenario, format!("cannot send {}: {}", kind, e)));
        }
        info!("{}: sent {} to {}", scenario.name, kind, destination);
        scenario.graph.message_mut(id)?.mark_processed(now);
        Ok(played(scenario, id))
    }

    fn play_receive(
        &mut self,
        index: usize,
        scenario: &mut Scenario,
        id: StepId,
        now: Instant,
    ) -> Result<Outcome> {
        let message = scenario.graph.message(id)?;
        if message.processed {
            return Ok(played(scenario, id));
        }
        if message.timer.is_some() {
            scenario.set_status(ScenarioStatus::Paused);
            return Ok(Outcome::Wait);
        }
        let deadline = message.deadline;
        let Some(anchored) = anchored_at(scenario, id, now)? else {
            debug!("{}: receive {} waits for its anchor", scenario.name, id);
            scenario.set_status(ScenarioStatus::Paused);
            return Ok(Outcome::Wait);
        };
        let Some(due) = deadline.due(anchored) else {
            let reason = format!("timeout of {} ({}) is out of range", id, deadline);
            return Ok(self.fail(scenario, reason));
        };
        if due <= now {
            return Ok(self.fail(
                scenario,
                format!("deadline of {} ({}) passed before it was reached", id, deadline),
            ));
        }
        self.arm(index, scenario, id, due - now)?;
        scenario.set_status(ScenarioStatus::Paused);
        Ok(Outcome::Wait)
    }

    fn play_jump(&mut self, scenario: &mut Scenario, id: StepId, jump: &JumpStep) -> Outcome {
        let Some(value) = scenario.vars.value(jump.variable).and_then(Value::as_int) else {
            return self.fail(scenario, format!("{}: {} has no integer value", id, jump.variable));
        };
        if !jump.op.evaluate(value, jump.operand) {
            return played(scenario, id);
        }
        debug!(
            "{}: {} {} {} holds, jumping to {}",
            scenario.name, value, jump.op, jump.operand, jump.label
        );
        if jump.label < id {
            for key in scenario.graph.rewind() {
                self.timers.cancel(key);
                scenario.timers = scenario.timers.saturating_sub(1);
            }
        }
        scenario.last_played = Some(jump.label);
        Outcome::Continue
    }

    fn compute_auth(&mut self, scenario: &mut Scenario, id: StepId) -> Result<Outcome> {
        let usim = scenario
            .usim
            .clone()
            .ok_or_else(|| Error::Internal(format!("scenario {} has no usim", scenario.name)))?;
        let (Some(rand), Some(autn)) = (bytes_of(&scenario.vars, RAND), bytes_of(&scenario.vars, AUTN))
        else {
            return Ok(self.fail(scenario, format!("{}: RAND and AUTN need values", id)));
        };
        let plmn = bytes_of(&scenario.vars, SELECTED_PLMN);

        let outcome = match self.credentials.compute(&usim, &rand, &autn, plmn.as_deref()) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.fail(scenario, format!("{}: {}", id, e))),
        };
        if let Some(res) = outcome.res {
            let var = scenario
                .vars
                .lookup(AUTH_RESPONSE)
                .ok_or_else(|| scenario_core::Error::VariableNotFound(AUTH_RESPONSE.into()))?;
            assign(scenario, var, Value::Bytes(res))?;
        }
        if let Some(auts) = outcome.auts {
            match scenario.vars.lookup(AUTH_FAILURE) {
                Some(var) => assign(scenario, var, Value::Bytes(auts))?,
                None => warn!(
                    "{}: synchronisation failure but {} is not declared",
                    scenario.name, AUTH_FAILURE
                ),
            }
        }
        if outcome.kasme.is_some() {
            scenario.security.kasme = outcome.kasme;
        }
        Ok(played(scenario, id))
    }

    fn update_security(
        &mut self,
        scenario: &mut Scenario,
        id: StepId,
        update: &SecurityUpdateStep,
    ) -> Outcome {
        let resolved = (
            resolve(&scenario.vars, update.eea.as_ref()),
            resolve(&scenario.vars, update.eia.as_ref()),
            resolve(&scenario.vars, update.ul_count.as_ref()),
        );
        let (eea, eia, ul_count) = match resolved {
            (Ok(eea), Ok(eia), Ok(ul_count)) => (eea, eia, ul_count),
            (Err(reason), _, _) | (_, Err(reason), _) | (_, _, Err(reason)) => {
                return self.fail(scenario, format!("{}: {}", id, reason))
            }
        };

        let nas = &mut scenario.security.nas;
        let mut changed = false;
        if let Some(eea) = eea {
            changed |= nas.eea != eea;
            nas.eea = eea;
        }
        if let Some(eia) = eia {
            changed |= nas.eia != eia;
            nas.eia = eia;
        }
        if let Some(count) = ul_count {
            nas.set_ul_count(count);
        }
        let selected = eea.is_some() || eia.is_some();
        let derive = selected && (changed || nas.keys.is_none());
        let (eea, eia) = (nas.eea, nas.eia);
        debug!(
            "{}: security context eea {} eia {} ul_count 0x{:06x}",
            scenario.name,
            eea,
            eia,
            nas.ul_count()
        );

        if derive {
            match scenario.security.kasme.clone() {
                None => warn!("{}: no KASME yet, NAS keys not derived", scenario.name),
                Some(kasme) => match self.credentials.derive_nas_keys(&kasme, eea, eia) {
                    Ok(keys) => scenario.security.nas.keys = Some(keys),
                    Err(e) => return self.fail(scenario, format!("{}: {}", id, e)),
                },
            }
        }
        played(scenario, id)
    }

    fn arm(
        &mut self,
        index: usize,
        scenario: &mut Scenario,
        id: StepId,
        after: Duration,
    ) -> Result<()> {
        self.next_timer_seq += 1;
        let key = TimerKey {
            scenario: index,
            step: id,
            seq: self.next_timer_seq,
        };
        scenario.graph.message_mut(id)?.timer = Some(key);
        scenario.timers += 1;
        self.timers.arm(key, after);
        Ok(())
    }

    fn disarm(&mut self, scenario: &mut Scenario, id: StepId) -> Result<()> {
        if let Some(key) = scenario.graph.message_mut(id)?.timer.take() {
            self.timers.cancel(key);
            scenario.timers = scenario.timers.saturating_sub(1);
        }
        Ok(())
    }

    fn cancel_all(&mut self, scenario: &mut Scenario) {
        let armed: Vec<StepId> = scenario
            .graph
            .messages()
            .filter(|(_, m)| m.timer.is_some())
            .map(|(id, _)| id)
            .collect();
        for id in armed {
            if let Some(key) = scenario
                .graph
                .get_mut(id)
                .and_then(Step::as_message_mut)
                .and_then(|m| m.timer.take())
            {
                self.timers.cancel(key);
            }
        }
        scenario.timers = 0;
    }

    fn fail(&mut self, scenario: &mut Scenario, reason: impl Into<String>) -> Outcome {
        let reason = reason.into();
        error!("Scenario {} failed: {}", scenario.name, reason);
        self.cancel_all(scenario);
        scenario.fail(reason);
        Outcome::End
    }

    fn conclude(&mut self, scenario: &mut Scenario) -> Outcome {
        self.cancel_all(scenario);
        scenario.set_status(ScenarioStatus::PlaySuccess);
        info!("Scenario {} passed", scenario.name);
        Outcome::End
    }
}

fn played(scenario: &mut Scenario, id: StepId) -> Outcome {
    scenario.last_played = Some(id);
    Outcome::Continue
}

/// Instant a message deadline counts from, `None` while the anchor has not fired
fn anchored_at(scenario: &mut Scenario, id: StepId, now: Instant) -> Result<Option<Instant>> {
    let message = scenario.graph.message_mut(id)?;
    let anchor = message.deadline.anchor;
    match anchor {
        Anchor::Itself => Ok(Some(*message.first_attempt.get_or_insert(now))),
        Anchor::Step(anchor) => Ok(scenario.graph.message(anchor)?.timestamp),
    }
}

/// Wire form of a message, rebuilt when a variable it uses has changed
fn rematerialize(
    codec: &dyn MessageCodec,
    message: &mut MessageStep,
    vars: &VariableStore,
) -> scenario_core::Result<WireMessage> {
    let wire = match message.wire.take() {
        Some(wire) if !message.stale => wire,
        _ => codec.materialize(&message.template, vars)?,
    };
    message.stale = false;
    message.wire = Some(wire.clone());
    Ok(wire)
}

fn assign(scenario: &mut Scenario, var: StepId, value: Value) -> Result<()> {
    scenario.vars.set(var, value)?;
    propagate(scenario, var);
    Ok(())
}

/// Mark the messages using `var` for rebuild if it changed
fn propagate(scenario: &mut Scenario, var: StepId) {
    let stale = scenario.vars.notify_if_changed(var);
    if !stale.is_empty() {
        debug!("{}: {} changed, rebuilding {:?}", scenario.name, var, stale);
        scenario.graph.mark_stale(&stale);
    }
}

fn bytes_of(vars: &VariableStore, name: &str) -> Option<Vec<u8>> {
    vars.by_name(name)?.value()?.as_bytes().map(<[u8]>::to_vec)
}

fn resolve<T>(
    vars: &VariableStore,
    operand: Option<&Operand<T>>,
) -> std::result::Result<Option<T>, String>
where
    T: TryFrom<i64> + Copy,
{
    match operand {
        None => Ok(None),
        Some(Operand::Literal(value)) => Ok(Some(*value)),
        Some(Operand::Variable(var)) => {
            let value = vars
                .value(*var)
                .and_then(Value::as_int)
                .ok_or_else(|| format!("{} has no integer value", var))?;
            T::try_from(value)
                .map(Some)
                .map_err(|_| format!("{} = {} is out of range", var, value))
        }
    }
}
