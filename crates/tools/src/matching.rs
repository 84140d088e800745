//! Step-matching strategy for tools that accept a natural-language
//! `step_description` instead of (or alongside) a `step_id` (§4.5).

use cl_engine::StepSnapshot;

pub enum Matched<'a> {
    Unique(&'a StepSnapshot),
    Ambiguous(Vec<&'a StepSnapshot>),
    NoMatch,
}

/// Finds the step a tool call is referring to among `candidates` (already
/// filtered by the caller to steps with the right status for the
/// operation). `step_id` takes precedence; ties are broken by an
/// exact-substring pass, then a keyword-overlap pass, then (only if
/// neither narrows it and exactly one candidate remains) by default.
pub fn find_step<'a>(
    candidates: &[&'a StepSnapshot],
    step_id: Option<&str>,
    step_description: Option<&str>,
) -> Matched<'a> {
    if let Some(id) = step_id {
        return match candidates.iter().find(|s| s.id == id) {
            Some(s) => Matched::Unique(s),
            None => Matched::NoMatch,
        };
    }

    if let Some(desc) = step_description {
        let query = desc.to_lowercase();

        let substring_hits: Vec<&StepSnapshot> = candidates
            .iter()
            .copied()
            .filter(|s| {
                let lower = s.descr.to_lowercase();
                lower.contains(&query) || query.contains(&lower)
            })
            .collect();
        if substring_hits.len() == 1 {
            return Matched::Unique(substring_hits[0]);
        }
        if substring_hits.len() > 1 {
            return Matched::Ambiguous(substring_hits);
        }

        let query_tokens: Vec<&str> = query.split_whitespace().collect();
        let score_of = |s: &StepSnapshot| -> usize {
            let lower = s.descr.to_lowercase();
            query_tokens.iter().filter(|tok| lower.contains(*tok)).count()
        };
        let top_score = candidates.iter().map(|s| score_of(s)).max().unwrap_or(0);
        if top_score == 0 {
            return Matched::NoMatch;
        }
        let top: Vec<&StepSnapshot> = candidates
            .iter()
            .copied()
            .filter(|s| score_of(s) == top_score)
            .collect();
        return match top.len() {
            1 => Matched::Unique(top[0]),
            _ => Matched::Ambiguous(top),
        };
    }

    match candidates.len() {
        0 => Matched::NoMatch,
        1 => Matched::Unique(candidates[0]),
        _ => Matched::Ambiguous(candidates.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_domain::recipe::{StepStatus, StepType};

    fn snapshot(id: &str, descr: &str) -> StepSnapshot {
        StepSnapshot {
            id: id.to_string(),
            descr: descr.to_string(),
            status: StepStatus::Pending,
            step_type: StepType::Immediate,
            depends_on: vec![],
            next: vec![],
            timer: None,
        }
    }

    #[test]
    fn matches_by_exact_id() {
        let a = snapshot("a", "Preheat the oven to 450F");
        let b = snapshot("b", "Chop the onions finely");
        let candidates = vec![&a, &b];
        match find_step(&candidates, Some("b"), None) {
            Matched::Unique(s) => assert_eq!(s.id, "b"),
            _ => panic!("expected unique match"),
        }
    }

    #[test]
    fn matches_by_substring_description() {
        let a = snapshot("a", "Preheat the oven to 450F");
        let b = snapshot("b", "Chop the onions finely");
        let candidates = vec![&a, &b];
        match find_step(&candidates, None, Some("chop the onions")) {
            Matched::Unique(s) => assert_eq!(s.id, "b"),
            _ => panic!("expected unique match"),
        }
    }

    #[test]
    fn ambiguous_when_no_hints_and_multiple_candidates() {
        let a = snapshot("a", "Preheat the oven to 450F");
        let b = snapshot("b", "Chop the onions finely");
        let candidates = vec![&a, &b];
        match find_step(&candidates, None, None) {
            Matched::Ambiguous(v) => assert_eq!(v.len(), 2),
            _ => panic!("expected ambiguous"),
        }
    }

    #[test]
    fn no_match_for_unknown_id() {
        let a = snapshot("a", "Preheat the oven to 450F");
        let candidates = vec![&a];
        match find_step(&candidates, Some("ghost"), None) {
            Matched::NoMatch => {}
            _ => panic!("expected no match"),
        }
    }

    #[test]
    fn keyword_overlap_breaks_ties_when_no_substring_hit() {
        let a = snapshot("a", "Simmer the marinara sauce");
        let b = snapshot("b", "Boil the pasta water");
        let candidates = vec![&a, &b];
        match find_step(&candidates, None, Some("boil pasta")) {
            Matched::Unique(s) => assert_eq!(s.id, "b"),
            _ => panic!("expected unique match"),
        }
    }
}
