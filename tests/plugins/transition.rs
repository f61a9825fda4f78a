use modeward::core::audit::{AuditEntry, AuditKind, AuditLog, BlockIter, EntryIter, MemoryAuditLog};
use modeward::core::error::ModewardError;
use modeward::core::mode::Mode;
use modeward::plugins::transition::{
    ModeFile, ModePhrases, ModeRules, TransitionRequest, Trigger, apply_transition,
    record_transition,
};
use tempfile::tempdir;

fn rules() -> ModeRules {
    ModeRules::default()
}

#[test]
fn detection_table() {
    let cases = [
        ("companion activation phrase", "Atlas, companion mode", Mode::Operational, Mode::Companion),
        ("switch to companion", "switch to companion", Mode::Operational, Mode::Companion),
        ("debug reverts to operational", "can you debug this function?", Mode::Companion, Mode::Operational),
        ("analyze reverts to operational", "please analyze the data", Mode::Companion, Mode::Operational),
        ("no match keeps operational", "hello there", Mode::Operational, Mode::Operational),
        ("no match keeps companion", "how are you doing?", Mode::Companion, Mode::Companion),
        ("companion beats task keyword", "companion mode, then code something", Mode::Operational, Mode::Companion),
        ("administrative phrase", "enter administrative mode", Mode::Operational, Mode::Administrative),
        ("admin shorthand", "atlas, admin mode", Mode::Companion, Mode::Administrative),
        ("admin beats task keyword", "enter administrative mode and debug the logs", Mode::Operational, Mode::Administrative),
        ("no match keeps administrative", "show system status", Mode::Administrative, Mode::Administrative),
    ];
    for (name, text, current, expected) in cases {
        assert_eq!(rules().detect(text, current), expected, "{}", name);
    }
}

#[test]
fn administrative_wins_over_every_other_rule() {
    let text = "ADMIN MODE: switch to companion and refactor the plan";
    for current in Mode::ALL {
        assert_eq!(rules().detect(text, current), Mode::Administrative);
    }
}

#[test]
fn detection_is_total_and_deterministic() {
    let inputs = ["", "   ", "🦀🦀", "CODE", "nothing relevant here", "\n\n\tplan\n"];
    for text in inputs {
        for current in Mode::ALL {
            let first = rules().detect(text, current);
            assert_eq!(first, rules().detect(text, current));
            assert!(Mode::ALL.contains(&first));
        }
    }
}

#[test]
fn substring_matching_is_coarse_by_design() {
    // "decode" contains "code": no word boundaries are enforced.
    assert_eq!(rules().detect("decode this", Mode::Companion), Mode::Operational);
}

#[test]
fn configured_phrases_replace_defaults() {
    let phrases = ModePhrases {
        administrative: vec!["sudo mode".into()],
        companion: vec!["let's chat".into()],
        operational: vec!["ticket".into()],
    };
    let rules = ModeRules::from_phrases(&phrases);
    assert_eq!(rules.detect("admin mode", Mode::Companion), Mode::Companion);
    assert_eq!(rules.detect("Sudo Mode please", Mode::Companion), Mode::Administrative);
    assert_eq!(rules.detect("let's chat", Mode::Operational), Mode::Companion);
    assert_eq!(rules.detect("close the ticket", Mode::Companion), Mode::Operational);
}

#[test]
fn evaluate_then_record_writes_one_transition() {
    let log = MemoryAuditLog::new();
    let transition = rules().evaluate(TransitionRequest::new("switch to companion", Mode::Operational));
    assert_eq!(transition.to, Mode::Companion);
    assert!(matches!(transition.trigger, Trigger::Detected { ref pattern } if pattern == "switch to companion"));

    record_transition(&log, &transition).unwrap();
    let entries = log.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, AuditKind::ModeTransition);
    assert_eq!(entries[0].subject.as_deref(), Some("from operational"));

    let unchanged = rules().evaluate(TransitionRequest::new("hello", Mode::Companion));
    assert!(!unchanged.changed());
    assert_eq!(unchanged.trigger, Trigger::NoMatch);
    record_transition(&log, &unchanged).unwrap();
    assert_eq!(log.len().unwrap(), 1);
}

#[test]
fn apply_audits_then_persists() {
    let tmp = tempdir().unwrap();
    let mode_file = ModeFile::new(&tmp.path().join("mode"));
    let log = MemoryAuditLog::new();

    let transition = rules().evaluate(TransitionRequest::new("switch to companion", mode_file.load()));
    assert!(apply_transition(&log, &mode_file, &transition).unwrap());
    assert_eq!(mode_file.read().unwrap(), Some(Mode::Companion));
    assert_eq!(log.len().unwrap(), 1);

    let unchanged = rules().evaluate(TransitionRequest::new("hello", mode_file.load()));
    assert!(!apply_transition(&log, &mode_file, &unchanged).unwrap());
    assert_eq!(log.len().unwrap(), 1);
}

struct BrokenLog;

impl AuditLog for BrokenLog {
    fn append(&self, _entry: AuditEntry) -> Result<AuditEntry, ModewardError> {
        Err(ModewardError::IoError(std::io::Error::other("disk full")))
    }

    fn entries(&self) -> Result<EntryIter<'_>, ModewardError> {
        Ok(Box::new(std::iter::empty()))
    }

    fn blocks(&self) -> Result<BlockIter<'_>, ModewardError> {
        Ok(Box::new(std::iter::empty()))
    }
}

#[test]
fn unaudited_transition_is_not_persisted() {
    let tmp = tempdir().unwrap();
    let mode_file = ModeFile::new(&tmp.path().join("mode"));

    let transition = rules().evaluate(TransitionRequest::new("switch to companion", Mode::Operational));
    assert!(apply_transition(&BrokenLog, &mode_file, &transition).is_err());
    assert_eq!(mode_file.read().unwrap(), None);
    assert_eq!(mode_file.load(), Mode::Operational);
}
