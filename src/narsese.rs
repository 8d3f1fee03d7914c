//! The line-oriented Narsese wire protocol.
//!
//! Everything the bridge writes to or reads from a reasoner process goes
//! through this module: statement formatting on the way out, line parsing on
//! the way back. Both NARS backends speak variants of the same protocol;
//! the dialect differences live in the backend modules, the shared grammar
//! lives here.
//!
//! Outbound statements, one per line:
//! - event assertion      `<term --> seen>. :|: %f;c%`
//! - standing belief      `<term --> seen>. %f;c%`
//! - goal                 `<term --> seen>! :|:`
//! - question             `<term --> seen>?`
//! - operation feedback   `<(*,{SELF}) --> ^op>. :|:`
//! - cycle advance        a bare number, e.g. `5`

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A NAL truth value: frequency and confidence, both in `[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truth {
    pub frequency: f32,
    pub confidence: f32,
}

impl Truth {
    /// Construct a truth value, clamping both components into `[0,1]`.
    pub fn new(frequency: f32, confidence: f32) -> Self {
        Self {
            frequency: frequency.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Full-confidence observation: `%1.0;0.9%`.
    pub fn observed() -> Self {
        Self::new(1.0, 0.9)
    }
}

impl std::fmt::Display for Truth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{:.2};{:.2}%", self.frequency, self.confidence)
    }
}

/// Format an assertion line. Event assertions carry the occurrence marker.
pub fn assertion(term: &str, truth: Truth, is_event: bool) -> String {
    if is_event {
        format!("<{term} --> seen>. :|: {truth}")
    } else {
        format!("<{term} --> seen>. {truth}")
    }
}

/// Format a goal line: the reasoner should make this term be seen.
pub fn goal(term: &str) -> String {
    format!("<{term} --> seen>! :|:")
}

/// Format a question line.
pub fn question(term: &str) -> String {
    format!("<{term} --> seen>?")
}

/// Format the self-operation feedback event for an executed operator.
pub fn operation_event(op: &str) -> String {
    format!("<(*,{{SELF}}) --> {op}>. :|:")
}

/// Format the distinguished novelty event emitted when surprise refines the
/// vocabulary, tagged with the affected symbol.
pub fn novelty_event(term: &str) -> String {
    format!("<{term} --> novel>. :|:")
}

/// Format the cycle-advance token: a bare number of reasoning cycles.
pub fn cycles(n: u32) -> String {
    n.to_string()
}

/// A causal rule derived by the reasoner: `<A> =/> <B>. %f;c%`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedImplication {
    /// Subject of the antecedent copula (`event_0` in
    /// `<event_0 --> seen> =/> …`); the whole antecedent when it has no
    /// copula (compound sequences and the like).
    pub term: String,
    /// Full antecedent, angle brackets stripped.
    pub antecedent: String,
    /// Full consequent, angle brackets stripped.
    pub consequent: String,
    pub truth: Truth,
}

/// An anticipation the reasoner committed to, with its decision score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anticipation {
    pub score: f32,
    pub implication: String,
}

fn implication_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^<?(?P<ante>.+?)>?\s*=/>\s*<?(?P<cons>.+?)>?\s*\.\s*%(?P<f>[0-9.]+);(?P<c>[0-9.]+)%",
        )
        .expect("implication regex compiles")
    })
}

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\^([a-zA-Z0-9_]+)").expect("operator regex compiles"))
}

fn confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r";([0-9.]+)%").expect("confidence regex compiles"))
}

fn expectation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"decision expectation=(?P<score>[-0-9.]+)\s+implication:\s*(?P<imp>.*)")
            .expect("expectation regex compiles")
    })
}

/// Extract the first `^operator` occurring in a line, if any.
pub fn parse_operator(line: &str) -> Option<String> {
    operator_re()
        .captures(line)
        .map(|caps| format!("^{}", &caps[1]))
}

/// Extract the confidence component of a `%f;c%` truth anywhere in a line.
pub fn parse_confidence(line: &str) -> Option<f32> {
    confidence_re()
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a derived-implication line of the shape `<A> =/> <B>. %f;c%`.
///
/// Returns `None` for anything else; the caller decides whether an
/// unparseable line is noise or worth a log record.
pub fn parse_implication(line: &str) -> Option<DerivedImplication> {
    let caps = implication_re().captures(line.trim())?;
    let antecedent = caps["ante"].trim().trim_matches(['<', '>']).to_string();
    let consequent = caps["cons"].trim().trim_matches(['<', '>']).to_string();
    let truth = Truth::new(caps["f"].parse().ok()?, caps["c"].parse().ok()?);

    // `event_0 --> seen` names the concept `event_0`; compound antecedents
    // (sequences, operator tuples) are kept whole.
    let term = antecedent
        .split_once("-->")
        .map(|(subject, _)| subject.trim().trim_matches(['<', '>']).to_string())
        .filter(|s| !s.is_empty() && !s.contains('('))
        .unwrap_or_else(|| antecedent.clone());

    Some(DerivedImplication {
        term,
        antecedent,
        consequent,
        truth,
    })
}

/// Parse a `decision expectation=<score> implication: <rule>` line.
pub fn parse_expectation(line: &str) -> Option<Anticipation> {
    let caps = expectation_re().captures(line)?;
    Some(Anticipation {
        score: caps["score"].parse().ok()?,
        implication: caps["imp"].trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_display_is_wire_format() {
        assert_eq!(Truth::new(1.0, 0.9).to_string(), "%1.00;0.90%");
        assert_eq!(Truth::new(0.75, 0.5).to_string(), "%0.75;0.50%");
    }

    #[test]
    fn truth_clamps_out_of_range() {
        let t = Truth::new(1.5, -0.1);
        assert_eq!(t.frequency, 1.0);
        assert_eq!(t.confidence, 0.0);
    }

    #[test]
    fn assertion_formats() {
        assert_eq!(
            assertion("event_0", Truth::observed(), true),
            "<event_0 --> seen>. :|: %1.00;0.90%"
        );
        assert_eq!(
            assertion("event_0", Truth::new(1.0, 0.9), false),
            "<event_0 --> seen>. %1.00;0.90%"
        );
    }

    #[test]
    fn goal_and_question_format() {
        assert_eq!(goal("goal"), "<goal --> seen>! :|:");
        assert_eq!(question("event_3"), "<event_3 --> seen>?");
    }

    #[test]
    fn operation_event_formats() {
        assert_eq!(operation_event("^left"), "<(*,{SELF}) --> ^left>. :|:");
    }

    #[test]
    fn novelty_event_formats() {
        assert_eq!(novelty_event("event_9"), "<event_9 --> novel>. :|:");
    }

    #[test]
    fn cycles_is_a_bare_number() {
        assert_eq!(cycles(10), "10");
    }

    #[test]
    fn parses_simple_implication() {
        let imp =
            parse_implication("<event_0 --> seen> =/> <goal --> seen>. %0.9;0.85%").unwrap();
        assert_eq!(imp.term, "event_0");
        assert_eq!(imp.consequent, "goal --> seen");
        assert_eq!(imp.truth, Truth::new(0.9, 0.85));
        assert_eq!(imp.antecedent, "event_0 --> seen");
    }

    #[test]
    fn parses_compound_antecedent_whole() {
        let line =
            "<(&/, <event_1 --> seen>, +5, <(*,{SELF}) --> ^activate>) =/> <event_2 --> seen>>. %1.0;0.90%";
        let imp = parse_implication(line).unwrap();
        assert!(imp.term.contains("&/"));
        assert!(imp.consequent.contains("event_2"));
        assert_eq!(imp.truth, Truth::new(1.0, 0.90));
    }

    #[test]
    fn non_implications_do_not_parse() {
        assert!(parse_implication("<event_0 --> seen>. :|:").is_none());
        assert!(parse_implication("Input: processed").is_none());
        assert!(parse_implication("").is_none());
    }

    #[test]
    fn parses_operators() {
        assert_eq!(parse_operator("OUT: (^left,{SELF})!"), Some("^left".into()));
        assert_eq!(parse_operator("EXE: ^forward"), Some("^forward".into()));
        assert_eq!(parse_operator("no operator here"), None);
    }

    #[test]
    fn parses_confidence() {
        assert_eq!(parse_confidence("… %1.00;0.58% …"), Some(0.58));
        assert_eq!(parse_confidence("plain text"), None);
    }

    #[test]
    fn parses_expectation_lines() {
        let ant = parse_expectation(
            "decision expectation=0.62 implication: <<event_1 --> seen> =/> <goal --> seen>>",
        )
        .unwrap();
        assert!((ant.score - 0.62).abs() < 1e-6);
        assert!(ant.implication.contains("event_1"));
    }
}
