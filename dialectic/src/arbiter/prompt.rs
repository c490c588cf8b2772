//! Synthesis prompt construction.
//!
//! Outputs are embedded byte-for-byte in fixed role order, so identical
//! trace outputs always yield an identical arbitration prompt.

use super::{ArbitrationEntry, ArbitrationInput};

/// Key the arbiter must use for the endorsed role.
pub const ENDORSED_KEY: &str = "ENDORSED ROLE";
/// Key the arbiter must use for the final answer.
pub const ANSWER_KEY: &str = "FINAL ANSWER";
/// Key the arbiter must use for the justification.
pub const JUSTIFICATION_KEY: &str = "JUSTIFICATION";

const ABSENT_MARKER: &str = "[NO OUTPUT] This role produced no argument. \
Treat it as unavailable. Do not infer, reconstruct or attribute any argument to it.";

/// Build the single arbitration prompt for `input`.
pub fn build_arbitration_prompt(input: &ArbitrationInput) -> String {
    let mut prompt = String::new();

    prompt.push_str("[THE LOGIC OF NECESSITY]\n");
    prompt.push_str(
        "An argument is accepted only if its conclusion is NECESSITATED by the stated \
constraints: no counterexample consistent with every given constraint exists. \
A conclusion that is merely plausible, or frequent in similar-looking problems, is not accepted.\n\n",
    );

    prompt.push_str("[THE PROBLEM]\n");
    prompt.push_str(input.problem().statement());
    prompt.push_str("\n\n");

    prompt.push_str("[THE ARGUMENTS]\n");
    prompt.push_str("Three independent reasoning traces were produced:\n");
    for (role, _) in input.entries() {
        prompt.push_str(&format!(
            "- Trace {} ({}): {}\n",
            role.ordinal(),
            role.label(),
            role.description()
        ));
    }
    prompt.push('\n');
    for (role, entry) in input.entries() {
        prompt.push_str(&format!(
            "=== Trace {} ({}) ===\n",
            role.ordinal(),
            role.label()
        ));
        match entry {
            ArbitrationEntry::Argument(output) => prompt.push_str(output),
            ArbitrationEntry::Absent => prompt.push_str(ABSENT_MARKER),
        }
        prompt.push_str(&format!(
            "\n=== End of Trace {} ===\n\n",
            role.ordinal()
        ));
    }

    prompt.push_str("[YOUR TASK]\n");
    prompt.push_str(
        "1. IGNORE the vote count. How many traces agree is NOT evidence; majority does not mean truth.\n",
    );
    prompt.push_str(
        "2. For each available argument, examine its causal links and decide whether its \
conclusion is necessitated by the constraints, or only plausible or habitual.\n",
    );
    prompt.push_str(
        "3. Identify which constraint governs the problem (for example intent versus accident) \
and trace how it filters the space of possible outcomes.\n",
    );
    prompt.push_str(
        "4. Select the argument, if any, that survives the necessity test and explain the causal \
link that makes it necessary. If none survives, say so explicitly and endorse None.\n",
    );
    let absent: Vec<&str> = input.absent_roles().iter().map(|r| r.label()).collect();
    if !absent.is_empty() {
        prompt.push_str(&format!(
            "5. No argument exists for: {}. Do not endorse, cite or reconstruct it.\n",
            absent.join(", ")
        ));
    }
    prompt.push('\n');

    let options: Vec<&str> = input
        .available_roles()
        .iter()
        .map(|r| r.label())
        .chain(std::iter::once("None"))
        .collect();
    prompt.push_str("[VERDICT FORMAT]\n");
    prompt.push_str("Finish your response with exactly these three lines:\n");
    prompt.push_str(&format!("{ENDORSED_KEY}: <one of {}>\n", options.join(" | ")));
    prompt.push_str(&format!("{ANSWER_KEY}: \\boxed{{<the single necessary answer>}}\n"));
    prompt.push_str(&format!(
        "{JUSTIFICATION_KEY}: <the causal link that makes the endorsed conclusion necessary>\n"
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Problem;
    use crate::role::Role;
    use crate::trace::{Trace, TraceFailure};

    fn input(outputs: [Option<&str>; 3]) -> ArbitrationInput {
        let traces: Vec<Trace> = Role::ALL
            .iter()
            .zip(outputs)
            .map(|(role, out)| {
                let t = Trace::pending(*role, "p");
                match out {
                    Some(o) => t.complete(o.to_string(), 1),
                    None => t.fail(TraceFailure::Degenerate, 1),
                }
            })
            .collect();
        ArbitrationInput::from_traces(&Problem::new("P: accidental reveal").unwrap(), &traces)
            .unwrap()
    }

    #[test]
    fn test_every_output_embedded_verbatim_in_order() {
        let b = "Believer says switch.\n  \\boxed{2/3}  ";
        let l = "Logician: event 3 is ACCIDENTAL.\n\\boxed{1/2}";
        let c = "Contrarian: no advantage {really}.\n\\boxed{1/2}";
        let prompt = build_arbitration_prompt(&input([Some(b), Some(l), Some(c)]));

        let ib = prompt.find(b).expect("believer output present");
        let il = prompt.find(l).expect("logician output present");
        let ic = prompt.find(c).expect("contrarian output present");
        assert!(ib < il && il < ic);
        assert!(prompt.contains("P: accidental reveal"));
    }

    #[test]
    fn test_instructs_to_ignore_vote_count() {
        let prompt = build_arbitration_prompt(&input([Some("a"), Some("b"), Some("c")]));
        assert!(prompt.contains("IGNORE the vote count"));
        assert!(prompt.contains("NECESSITATED"));
        assert!(prompt.contains("ENDORSED ROLE: <one of Believer | Logician | Contrarian | None>"));
        assert!(!prompt.contains("[NO OUTPUT]"));
        assert!(prompt.contains("- Trace 3 (Contrarian): counterfactual attack on the obvious answer"));
    }

    #[test]
    fn test_absent_role_marked_and_not_offered() {
        let prompt = build_arbitration_prompt(&input([Some("a"), None, Some("c")]));
        assert!(prompt.contains("=== Trace 2 (Logician) ===\n[NO OUTPUT]"));
        assert!(prompt.contains("No argument exists for: Logician"));
        assert!(prompt.contains("<one of Believer | Contrarian | None>"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_arbitration_prompt(&input([Some("x"), Some("y"), Some("z")]));
        let b = build_arbitration_prompt(&input([Some("x"), Some("y"), Some("z")]));
        assert_eq!(a, b);
    }
}
