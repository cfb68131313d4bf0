//! RON scenario loader
//!
//! Builds [`Scenario`]s from scenario documents and playlists from scenario
//! lists. Relative paths are resolved against the directory of the file that
//! names them.

use crate::error::{Error, Result};
use crate::literal::{self, TimeRef, ValueSpec};
use crate::schema::{Action, ExitStatusDef, PlaylistDef, PlaylistEntry, ScenarioDef, StepDef};
use scenario_core::{
    CondOp, Deadline, Direction, ExitStatus, JumpStep, MessageCodec, MessageStep, Operand,
    Scenario, ScenarioStatus, SecurityUpdateStep, SetVarStep, SleepStep, StepId, StepKind, TaskId,
    UsimProfile, ValueKind, VarInit, DEFAULT_RECEIVE_TIMEOUT, SQN_MS_LIMIT,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

/// Variables read and written by the authentication response step
const AUTH_INPUTS: [&str; 3] = ["RAND", "AUTN", "AUTHENTICATION_RESPONSE_PARAMETER"];

/// Loader for RON scenario scripts
pub struct Loader<'a> {
    codec: &'a dyn MessageCodec,
    continue_on_error: bool,
}

impl<'a> Loader<'a> {
    /// Create a loader using `codec` for message files
    pub fn new(codec: &'a dyn MessageCodec) -> Self {
        Self {
            codec,
            continue_on_error: true,
        }
    }

    /// Whether a scenario that fails to load stops the whole playlist
    ///
    /// When continuing (the default), the scenario is kept in the playlist
    /// with status `LOAD_FAILED`.
    pub fn continue_on_error(mut self, yes: bool) -> Self {
        self.continue_on_error = yes;
        self
    }

    /// Load a scenario list and every scenario it names, in order
    pub fn load_playlist(&self, path: impl AsRef<Path>) -> Result<Vec<Scenario>> {
        let mut scenarios = Vec::new();
        let mut stack = Vec::new();
        self.load_list_into(path.as_ref(), &mut stack, &mut scenarios)?;
        info!(
            "Loaded {} scenario(s) from {}",
            scenarios.len(),
            path.as_ref().display()
        );
        Ok(scenarios)
    }

    fn load_list_into(
        &self,
        path: &Path,
        stack: &mut Vec<PathBuf>,
        out: &mut Vec<Scenario>,
    ) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if stack.contains(&canonical) {
            return Err(Error::IncludeCycle(path.to_path_buf()));
        }
        let content = read(path)?;
        let list: PlaylistDef = ron::from_str(&content)?;

        stack.push(canonical);
        for entry in list.scenarios {
            match entry {
                PlaylistEntry::Include(file) => {
                    self.load_list_into(&resolve(path, &file), stack, out)?;
                }
                PlaylistEntry::Scenario(file) => {
                    let file = resolve(path, &file);
                    match self.try_load_scenario(&file) {
                        Ok(scenario) => out.push(scenario),
                        Err(e) if self.continue_on_error => out.push(failed(&file, &e)),
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        stack.pop();
        Ok(())
    }

    /// Load a scenario, turning any failure into a `LOAD_FAILED` scenario
    pub fn load_scenario(&self, path: impl AsRef<Path>) -> Scenario {
        let path = path.as_ref();
        self.try_load_scenario(path)
            .unwrap_or_else(|e| failed(path, &e))
    }

    /// Load a scenario file
    pub fn try_load_scenario(&self, path: impl AsRef<Path>) -> Result<Scenario> {
        let path = path.as_ref();
        let content = read(path)?;
        self.load_scenario_str(&content, path)
    }

    /// Load a scenario from a RON string; `path` anchors relative file names
    pub fn load_scenario_str(&self, content: &str, path: impl AsRef<Path>) -> Result<Scenario> {
        let path = path.as_ref();
        let def: ScenarioDef = ron::from_str(content)?;
        let mut builder = Builder::new(self.codec, path, &def.name);
        for step in def.steps {
            builder.add(step)?;
        }
        let scenario = builder.finish()?;
        info!(
            "Loaded scenario {} ({} steps, {} variables)",
            scenario.name,
            scenario.graph.len(),
            scenario.vars.len()
        );
        Ok(scenario)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve `file` against the directory of `including`
fn resolve(including: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        return file.to_path_buf();
    }
    match including.parent() {
        Some(dir) => dir.join(file),
        None => file.to_path_buf(),
    }
}

fn failed(path: &Path, e: &Error) -> Scenario {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    error!("Failed to load scenario {}: {}", path.display(), e);
    Scenario::load_failed(name, path, e.to_string())
}

/// Builds one scenario step by step
struct Builder<'a> {
    codec: &'a dyn MessageCodec,
    path: PathBuf,
    scenario: Scenario,
    /// Jumps whose label was not declared yet
    pending_jumps: Vec<(StepId, String)>,
    needs_usim: bool,
}

impl<'a> Builder<'a> {
    fn new(codec: &'a dyn MessageCodec, path: &Path, name: &str) -> Self {
        let mut scenario = Scenario::new(name, path);
        scenario.set_status(ScenarioStatus::Loading);
        Self {
            codec,
            path: path.to_path_buf(),
            scenario,
            pending_jumps: Vec::new(),
            needs_usim: false,
        }
    }

    fn variable(&self, name: &str) -> Result<StepId> {
        self.scenario
            .vars
            .lookup(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    fn int_variable(&self, name: &str) -> Result<StepId> {
        let id = self.variable(name)?;
        self.expect_kind(id, ValueKind::Int)?;
        Ok(id)
    }

    fn expect_kind(&self, id: StepId, kind: ValueKind) -> Result<()> {
        let var = self.scenario.vars.variable(id)?;
        if var.kind() != kind {
            return Err(Error::InvalidSchema(format!(
                "variable {} is {}, expected {}",
                var.name(),
                var.kind(),
                kind
            )));
        }
        Ok(())
    }

    fn push(&mut self, kind: StepKind) -> Result<StepId> {
        let name = kind.name();
        let id = self.scenario.graph.push(kind)?;
        debug!("{}: loaded {} as {}", self.scenario.name, name, id);
        Ok(id)
    }

    fn add(&mut self, def: StepDef) -> Result<()> {
        match def {
            StepDef::Message {
                action,
                file,
                time,
                time_ref,
                peer,
            } => self.add_message(action, &file, time.as_deref(), time_ref.as_deref(), peer),
            StepDef::Var {
                name,
                value,
                ascii,
                hex,
            } => {
                let spec = literal::parse_value_spec(value.as_deref(), ascii.as_deref(), hex.as_deref())?;
                let init = match spec {
                    ValueSpec::Literal(value) => VarInit::Value(value),
                    ValueSpec::Reference(source) => VarInit::Mirror(self.variable(&source)?),
                };
                let id = self.scenario.graph.peek_id();
                self.scenario.vars.declare(id, name.clone(), init)?;
                self.push(StepKind::Variable(name))?;
                Ok(())
            }
            StepDef::SetVar {
                name,
                value,
                ascii,
                hex,
            } => {
                let target = self.variable(&name)?;
                let kind = self.scenario.vars.variable(target)?.kind();
                let spec = literal::parse_value_spec(value.as_deref(), ascii.as_deref(), hex.as_deref())?;
                let source = match spec {
                    ValueSpec::Literal(value) => {
                        if value.kind() != kind {
                            return Err(Error::InvalidSchema(format!(
                                "cannot set {} variable {} to a {} value",
                                kind,
                                name,
                                value.kind()
                            )));
                        }
                        Operand::Literal(value)
                    }
                    ValueSpec::Reference(source) => {
                        let source = self.variable(&source)?;
                        self.expect_kind(source, kind)?;
                        Operand::Variable(source)
                    }
                };
                self.push(StepKind::SetVar(SetVarStep { target, source }))?;
                Ok(())
            }
            StepDef::IncrVar { name } => {
                let target = self.int_variable(&name)?;
                self.push(StepKind::Increment(target))?;
                Ok(())
            }
            StepDef::DecrVar { name } => {
                let target = self.int_variable(&name)?;
                self.push(StepKind::Decrement(target))?;
                Ok(())
            }
            StepDef::Label { name } => {
                self.push(StepKind::Label(name))?;
                Ok(())
            }
            StepDef::JumpIf {
                var_name,
                cond,
                label,
                value,
            } => {
                let variable = self.int_variable(&var_name)?;
                let op: CondOp = cond.parse()?;
                let operand = literal::parse_int(&value)?;
                // 0 is never a step id; patched in `finish` for forward labels
                let target = self.scenario.graph.label(&label).unwrap_or(StepId::new(0));
                let id = self.push(StepKind::Jump(JumpStep {
                    variable,
                    op,
                    operand,
                    label: target,
                }))?;
                if target.raw() == 0 {
                    self.pending_jumps.push((id, label));
                }
                Ok(())
            }
            StepDef::Sleep { seconds, useconds } => {
                let duration = Duration::from_secs(seconds)
                    .checked_add(Duration::from_micros(useconds))
                    .ok_or_else(|| {
                        Error::InvalidLiteral(format!(
                            "sleep of {}s {}us is out of range",
                            seconds, useconds
                        ))
                    })?;
                self.push(StepKind::Sleep(SleepStep::new(duration)))?;
                Ok(())
            }
            StepDef::Exit { status } => {
                let status = status.map(|s| match s {
                    ExitStatusDef::Success => ExitStatus::Success,
                    ExitStatusDef::Failed => ExitStatus::Failed,
                });
                self.push(StepKind::Exit(status))?;
                Ok(())
            }
            StepDef::Usim { k, sqn_ms } => self.set_usim(&k, &sqn_ms),
            StepDef::ComputeAuthenticationResponseParameter => {
                for name in AUTH_INPUTS {
                    let id = self.variable(name)?;
                    self.expect_kind(id, ValueKind::Bytes)?;
                }
                self.needs_usim = true;
                self.push(StepKind::ComputeAuthResponse)?;
                Ok(())
            }
            StepDef::UpdateEmmSecurityContext {
                seea,
                seia,
                ul_count,
            } => {
                let update = SecurityUpdateStep {
                    eea: self.operand(seea.as_deref(), "seea", u8::MAX as i64)?
                        .map(|op| narrow(op, |v| v as u8)),
                    eia: self.operand(seia.as_deref(), "seia", u8::MAX as i64)?
                        .map(|op| narrow(op, |v| v as u8)),
                    ul_count: self.operand(ul_count.as_deref(), "ul_count", 0xff_ffff)?
                        .map(|op| narrow(op, |v| v as u32)),
                };
                self.push(StepKind::UpdateSecurityContext(update))?;
                Ok(())
            }
        }
    }

    fn add_message(
        &mut self,
        action: Action,
        file: &str,
        time: Option<&str>,
        time_ref: Option<&str>,
        peer: Option<String>,
    ) -> Result<()> {
        let direction = match action {
            Action::Send => Direction::Send,
            Action::Receive => Direction::Receive,
        };
        if direction == Direction::Send && peer.is_none() {
            return Err(Error::MissingField(format!("peer of send step {}", file)));
        }

        let delay = match time {
            Some(text) => literal::parse_time(text)?,
            None if direction == Direction::Receive => DEFAULT_RECEIVE_TIMEOUT,
            None => Duration::ZERO,
        };
        let deadline = match time_ref.map(literal::parse_time_ref).transpose()? {
            None | Some(TimeRef::Itself) => Deadline::after(delay),
            Some(TimeRef::Back(n)) => {
                let anchor = self.scenario.graph.nth_previous_message(n).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "time_ref -{} of {}: not enough previous messages",
                        n, file
                    ))
                })?;
                Deadline::relative_to(anchor, delay)
            }
        };

        let source = resolve(&self.path, file);
        let template = self.codec.load(&source)?;
        let mut references = Vec::new();
        for name in template.references() {
            references.push(self.variable(name)?);
        }
        for name in template.captures() {
            self.variable(name)?;
        }

        let step = MessageStep::new(direction, peer.map(TaskId::from), source, template, deadline);
        let id = self.push(StepKind::Message(step))?;
        for var in references {
            self.scenario.vars.subscribe(var, id)?;
        }
        Ok(())
    }

    fn set_usim(&mut self, k: &str, sqn_ms: &str) -> Result<()> {
        if self.scenario.usim.is_some() {
            return Err(Error::InvalidSchema("usim block given twice".into()));
        }
        let k: [u8; 16] = literal::parse_hex_stream(k)?
            .try_into()
            .map_err(|_| Error::InvalidLiteral("usim k must be 16 bytes".into()))?;
        let digits = sqn_ms.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let sqn_ms = u64::from_str_radix(digits, 16)
            .map_err(|_| Error::InvalidLiteral(format!("usim sqn_ms: {:?}", sqn_ms)))?;
        if sqn_ms >= SQN_MS_LIMIT {
            return Err(Error::InvalidLiteral(format!(
                "usim sqn_ms 0x{:x} out of range",
                sqn_ms
            )));
        }
        self.scenario.usim = Some(UsimProfile { k, sqn_ms });
        Ok(())
    }

    /// Parse an optional literal-or-`$NAME` attribute bounded by `max`
    fn operand(&self, text: Option<&str>, attr: &str, max: i64) -> Result<Option<Operand<i64>>> {
        let Some(text) = text else {
            return Ok(None);
        };
        if let Some(name) = literal::parse_reference(text) {
            return Ok(Some(Operand::Variable(self.int_variable(name)?)));
        }
        let value = literal::parse_int(text)?;
        if !(0..=max).contains(&value) {
            return Err(Error::InvalidLiteral(format!(
                "{} {} out of range 0..={}",
                attr, value, max
            )));
        }
        Ok(Some(Operand::Literal(value)))
    }

    fn finish(mut self) -> Result<Scenario> {
        for (id, name) in std::mem::take(&mut self.pending_jumps) {
            let label = self
                .scenario
                .graph
                .label(&name)
                .ok_or_else(|| Error::UnknownLabel(name.clone()))?;
            if let StepKind::Jump(jump) = &mut self.scenario.graph.step_mut(id)?.kind {
                jump.label = label;
            }
        }
        if self.needs_usim && self.scenario.usim.is_none() {
            return Err(Error::InvalidSchema(
                "compute_authentication_response_parameter needs a usim block".into(),
            ));
        }
        self.scenario.set_status(ScenarioStatus::Loaded);
        Ok(self.scenario)
    }
}

fn narrow<T>(op: Operand<i64>, f: impl FnOnce(i64) -> T) -> Operand<T> {
    match op {
        Operand::Literal(v) => Operand::Literal(f(v)),
        Operand::Variable(id) => Operand::Variable(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RonMessageCodec;
    use scenario_core::{Anchor, Value};
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "#![enable(implicit_some)]\n";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "a.ron", r#"(kind: "A", fields: {"ue": "$UE_ID"})"#);
        write(&dir, "b.ron", r#"(kind: "B", fields: {})"#);
        dir
    }

    fn load(dir: &TempDir, steps: &str) -> Result<Scenario> {
        let path = write(
            dir,
            "scenario.ron",
            &format!("{}(name: \"test\", steps: [{}])", HEADER, steps),
        );
        Loader::new(&RonMessageCodec).try_load_scenario(path)
    }

    #[test]
    fn test_load_scenario() {
        let dir = fixture();
        let scenario = load(
            &dir,
            r#"
                Var(name: "UE_ID", value: "1"),
                Message(action: Send, file: "a.ron", peer: "TASK_MME_APP"),
                Message(action: Receive, file: "b.ron", time: "5", time_ref: "-1"),
            "#,
        )
        .unwrap();

        assert_eq!(scenario.name, "test");
        assert_eq!(scenario.status(), ScenarioStatus::Loaded);
        assert_eq!(scenario.graph.len(), 3);

        let send = scenario.graph.message(StepId::new(2)).unwrap();
        assert!(send.is_send());
        assert_eq!(send.deadline, Deadline::immediate());
        assert_eq!(send.source, dir.path().join("a.ron"));

        let receive = scenario.graph.message(StepId::new(3)).unwrap();
        assert_eq!(receive.deadline.anchor, Anchor::Step(StepId::new(2)));
        assert_eq!(receive.deadline.delay, Duration::from_secs(5));

        // the send depends on UE_ID
        let ue = scenario.vars.by_name("UE_ID").unwrap();
        assert_eq!(ue.subscribers(), [StepId::new(2)]);
    }

    #[test]
    fn test_receive_defaults_to_long_timeout() {
        let dir = fixture();
        let scenario = load(&dir, r#"Message(action: Receive, file: "b.ron")"#).unwrap();
        let receive = scenario.graph.message(StepId::new(1)).unwrap();
        assert_eq!(receive.deadline, Deadline::after(DEFAULT_RECEIVE_TIMEOUT));
    }

    #[test]
    fn test_duplicate_variable_fails() {
        let dir = fixture();
        let err = load(
            &dir,
            r#"Var(name: "X", value: "1"), Var(name: "X", value: "2")"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Core(scenario_core::Error::DuplicateVariable(_))
        ));
    }

    #[test]
    fn test_undeclared_reference_fails() {
        let dir = fixture();
        assert!(matches!(
            load(&dir, r#"SetVar(name: "X", value: "1")"#),
            Err(Error::UnknownVariable(_))
        ));
        assert!(matches!(
            load(&dir, r#"Var(name: "X", value: "$Y")"#),
            Err(Error::UnknownVariable(_))
        ));
        // a.ron substitutes UE_ID, which is not declared
        assert!(matches!(
            load(&dir, r#"Message(action: Send, file: "a.ron", peer: "T")"#),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_unknown_label_fails() {
        let dir = fixture();
        let err = load(
            &dir,
            r#"Var(name: "X", value: "1"), JumpIf(var_name: "X", cond: "eq", label: "nowhere", value: "1")"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownLabel(name) if name == "nowhere"));
    }

    #[test]
    fn test_forward_and_backward_labels_resolve() {
        let dir = fixture();
        let scenario = load(
            &dir,
            r#"
                Var(name: "N", value: "0"),
                Label(name: "top"),
                IncrVar(name: "N"),
                JumpIf(var_name: "N", cond: "lt", label: "top", value: "3"),
                JumpIf(var_name: "N", cond: "eq", label: "end", value: "3"),
                Label(name: "end"),
            "#,
        )
        .unwrap();
        let jumps: Vec<StepId> = scenario
            .graph
            .iter()
            .filter_map(|s| match &s.kind {
                StepKind::Jump(j) => Some(j.label),
                _ => None,
            })
            .collect();
        assert_eq!(jumps, vec![StepId::new(2), StepId::new(6)]);
    }

    #[test]
    fn test_var_literal_kinds() {
        let dir = fixture();
        let scenario = load(
            &dir,
            r#"
                Var(name: "I", value: "-5"),
                Var(name: "H", value: "0x10"),
                Var(name: "S", ascii: "208950000000001"),
                Var(name: "B", hex: "00112233"),
                Var(name: "M", value: "$H"),
            "#,
        )
        .unwrap();
        let vars = &scenario.vars;
        assert_eq!(vars.by_name("I").unwrap().value(), Some(&Value::Int(-5)));
        assert_eq!(vars.by_name("H").unwrap().value(), Some(&Value::Int(16)));
        assert_eq!(
            vars.by_name("S").unwrap().value(),
            Some(&Value::Ascii("208950000000001".into()))
        );
        assert_eq!(
            vars.by_name("B").unwrap().value(),
            Some(&Value::Bytes(vec![0, 0x11, 0x22, 0x33]))
        );
        let mirror = vars.by_name("M").unwrap();
        assert_eq!(mirror.mirror_of(), vars.lookup("H"));
        assert!(mirror.value().is_none());
    }

    #[test]
    fn test_malformed_literals_fail() {
        let dir = fixture();
        assert!(matches!(
            load(&dir, r#"Var(name: "X", hex: "0g")"#),
            Err(Error::InvalidLiteral(_))
        ));
        assert!(matches!(
            load(&dir, r#"Message(action: Receive, file: "b.ron", time: "1.2.3")"#),
            Err(Error::InvalidLiteral(_))
        ));
        assert!(matches!(
            load(&dir, r#"Message(action: Receive, file: "b.ron", time_ref: "-1")"#),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_sleep_out_of_range_fails_loading() {
        let dir = fixture();
        assert!(matches!(
            load(&dir, "Sleep(seconds: 18446744073709551615, useconds: 1000000)"),
            Err(Error::InvalidLiteral(_))
        ));

        let path = write(
            &dir,
            "sleepy.ron",
            &format!(
                "{}(name: \"sleepy\", steps: [Sleep(seconds: 18446744073709551615, useconds: 1000000)])",
                HEADER
            ),
        );
        let scenario = Loader::new(&RonMessageCodec).load_scenario(path);
        assert_eq!(scenario.status(), ScenarioStatus::LoadFailed);
        assert!(scenario.reason().unwrap().contains("out of range"));
    }

    #[test]
    fn test_jump_comparand_uses_int_grammar() {
        let dir = fixture();
        let scenario = load(
            &dir,
            r#"
                Var(name: "N", value: "0"),
                Label(name: "top"),
                JumpIf(var_name: "N", cond: "eq", label: "top", value: "0xffffffffffffffff"),
                JumpIf(var_name: "N", cond: "lt", label: "top", value: "-2"),
            "#,
        )
        .unwrap();
        let operands: Vec<i64> = scenario
            .graph
            .iter()
            .filter_map(|s| match &s.kind {
                StepKind::Jump(j) => Some(j.operand),
                _ => None,
            })
            .collect();
        assert_eq!(operands, vec![-1, -2]);

        assert!(matches!(
            load(
                &dir,
                r#"Var(name: "N", value: "0"), Label(name: "l"), JumpIf(var_name: "N", cond: "eq", label: "l", value: "ten")"#,
            ),
            Err(Error::InvalidLiteral(_))
        ));
    }

    #[test]
    fn test_set_var_kind_must_match() {
        let dir = fixture();
        assert!(matches!(
            load(&dir, r#"Var(name: "X", value: "1"), SetVar(name: "X", ascii: "a")"#),
            Err(Error::InvalidSchema(_))
        ));
        assert!(matches!(
            load(&dir, r#"Var(name: "S", ascii: "a"), IncrVar(name: "S")"#),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_send_requires_peer() {
        let dir = fixture();
        assert!(matches!(
            load(&dir, r#"Message(action: Send, file: "b.ron")"#),
            Err(Error::MissingField(_))
        ));
    }

    #[test]
    fn test_usim_and_credentials() {
        let dir = fixture();
        let scenario = load(
            &dir,
            r#"
                Usim(k: "fec86ba6eb707ed08905757b1bb44b8f", sqn_ms: "0x000000000020"),
                Var(name: "RAND", hex: "00000000000000000000000000000000"),
                Var(name: "AUTN", hex: "00000000000000000000000000000000"),
                Var(name: "AUTHENTICATION_RESPONSE_PARAMETER", hex: "0000000000000000"),
                ComputeAuthenticationResponseParameter,
                UpdateEmmSecurityContext(seea: "0", seia: "2", ul_count: "0x10"),
            "#,
        )
        .unwrap();
        let usim = scenario.usim.as_ref().unwrap();
        assert_eq!(usim.k[0], 0xfe);
        assert_eq!(usim.sqn_ms, 0x20);
        match &scenario.graph.step(StepId::new(5)).unwrap().kind {
            StepKind::UpdateSecurityContext(update) => {
                assert_eq!(update.eia, Some(Operand::Literal(2)));
                assert_eq!(update.ul_count, Some(Operand::Literal(0x10)));
            }
            other => panic!("unexpected {:?}", other),
        }

        // without a usim block the credential step cannot play
        assert!(matches!(
            load(
                &dir,
                r#"
                    Var(name: "RAND", hex: "00"),
                    Var(name: "AUTN", hex: "00"),
                    Var(name: "AUTHENTICATION_RESPONSE_PARAMETER", hex: "00"),
                    ComputeAuthenticationResponseParameter,
                "#
            ),
            Err(Error::InvalidSchema(_))
        ));
        assert!(matches!(
            load(&dir, r#"Usim(k: "00", sqn_ms: "0")"#),
            Err(Error::InvalidLiteral(_))
        ));
        assert!(matches!(
            load(&dir, r#"UpdateEmmSecurityContext(seea: "256")"#),
            Err(Error::InvalidLiteral(_))
        ));
    }

    #[test]
    fn test_playlist_with_include() {
        let dir = fixture();
        write(&dir, "one.ron", "(name: \"one\", steps: [])");
        write(&dir, "sub/two.ron", "(name: \"two\", steps: [])");
        write(&dir, "sub/list.ron", r#"(scenarios: [Scenario("two.ron")])"#);
        write(
            &dir,
            "broken.ron",
            r#"(name: "broken", steps: [SetVar(name: "NOPE", value: "1")])"#,
        );
        let root = write(
            &dir,
            "list.ron",
            r#"(scenarios: [Scenario("one.ron"), Include("sub/list.ron"), Scenario("broken.ron")])"#,
        );

        let scenarios = Loader::new(&RonMessageCodec).load_playlist(&root).unwrap();
        let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "broken"]);
        assert_eq!(scenarios[1].status(), ScenarioStatus::Loaded);
        assert_eq!(scenarios[2].status(), ScenarioStatus::LoadFailed);
        assert!(scenarios[2].reason().unwrap().contains("NOPE"));

        let strict = Loader::new(&RonMessageCodec).continue_on_error(false);
        assert!(matches!(
            strict.load_playlist(&root),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_playlist_include_cycle() {
        let dir = fixture();
        write(&dir, "x.ron", r#"(scenarios: [Include("y.ron")])"#);
        let y = write(&dir, "y.ron", r#"(scenarios: [Include("x.ron")])"#);
        let err = Loader::new(&RonMessageCodec).load_playlist(&y).unwrap_err();
        assert!(matches!(err, Error::IncludeCycle(_)));
    }

    #[test]
    fn test_missing_scenario_file_is_load_failed() {
        let dir = fixture();
        let scenario = Loader::new(&RonMessageCodec).load_scenario(dir.path().join("none.ron"));
        assert_eq!(scenario.status(), ScenarioStatus::LoadFailed);
        assert_eq!(scenario.name, "none");
    }
}
