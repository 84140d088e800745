//! Recipe document parsing and the immutable-topology / mutable-status
//! step model described by the data model.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::duration::is_parseable_duration;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Immediate,
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockWhen {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Pending,
    Ready,
    Active,
    WaitingAck,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnEnterAction {
    pub say: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub every: String,
}

/// Wire shape of a step inside a recipe document (§6.1). `status` is not
/// part of the document; it is always `Pending` at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDoc {
    pub id: String,
    pub descr: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub next: Vec<String>,
    #[serde(default)]
    pub unlock_when: UnlockWhen,
    #[serde(default)]
    pub auto_start: bool,
    pub duration: Option<String>,
    pub reminder: Option<Reminder>,
    #[serde(default)]
    pub requires_confirm: bool,
    #[serde(default)]
    pub on_enter: Vec<OnEnterAction>,
}

/// A step with load-time-frozen fields plus the one field the engine
/// mutates: `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub descr: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub depends_on: Vec<String>,
    pub next: Vec<String>,
    pub unlock_when: UnlockWhen,
    pub auto_start: bool,
    pub duration: Option<String>,
    pub reminder: Option<Reminder>,
    pub requires_confirm: bool,
    pub on_enter: Vec<OnEnterAction>,
    pub status: StepStatus,
}

impl From<StepDoc> for Step {
    fn from(doc: StepDoc) -> Self {
        Step {
            id: doc.id,
            descr: doc.descr,
            step_type: doc.step_type,
            depends_on: doc.depends_on,
            next: doc.next,
            unlock_when: doc.unlock_when,
            auto_start: doc.auto_start,
            duration: doc.duration,
            reminder: doc.reminder,
            requires_confirm: doc.requires_confirm,
            on_enter: doc.on_enter,
            status: StepStatus::Pending,
        }
    }
}

impl Step {
    pub fn duration_secs(&self) -> Option<i64> {
        self.duration
            .as_deref()
            .map(crate::duration::parse_iso_duration)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub servings: Option<i64>,
    pub estimated_total: Option<String>,
    pub difficulty: Option<String>,
    pub locale: Option<String>,
}

/// The wire document described in §6.1. Only `recipe.*` scalars and
/// `steps` are consumed by the core; `ingredients`/`utensils`/`notes` are
/// retained verbatim for pass-through to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDocument {
    pub recipe: RecipeMeta,
    #[serde(default)]
    pub ingredients: Vec<serde_json::Value>,
    #[serde(default)]
    pub utensils: Vec<serde_json::Value>,
    pub steps: Vec<StepDoc>,
    #[serde(default)]
    pub notes: Option<serde_json::Value>,
}

/// The in-memory recipe: topology frozen at load, step status mutable.
/// Steps are held in document (insertion) order, matching I3's
/// "document order" requirement for unlock evaluation.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub estimated_total: Option<String>,
    pub difficulty: Option<String>,
    pub locale: Option<String>,
    pub ingredients: Vec<serde_json::Value>,
    pub utensils: Vec<serde_json::Value>,
    pub notes: Option<serde_json::Value>,
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl Recipe {
    /// Builds a `Recipe` from a parsed document, running the load-time
    /// DAG validator (unique ids, referents exist, no cycles, timer
    /// steps carry a parseable duration).
    pub fn from_document(doc: RecipeDocument) -> Result<Recipe> {
        let mut index = HashMap::with_capacity(doc.steps.len());
        let mut steps = Vec::with_capacity(doc.steps.len());
        for (i, step_doc) in doc.steps.into_iter().enumerate() {
            if index.insert(step_doc.id.clone(), i).is_some() {
                return Err(Error::RecipeInvalid(format!(
                    "duplicate step id: {}",
                    step_doc.id
                )));
            }
            steps.push(Step::from(step_doc));
        }

        let recipe = Recipe {
            id: doc.recipe.id,
            title: doc.recipe.title,
            estimated_total: doc.recipe.estimated_total,
            difficulty: doc.recipe.difficulty,
            locale: doc.recipe.locale,
            ingredients: doc.ingredients,
            utensils: doc.utensils,
            notes: doc.notes,
            steps,
            index,
        };
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_json_str(raw: &str) -> Result<Recipe> {
        let doc: RecipeDocument = serde_json::from_str(raw)?;
        Recipe::from_document(doc)
    }

    fn validate(&self) -> Result<()> {
        for step in &self.steps {
            for dep in step.depends_on.iter().chain(step.next.iter()) {
                if !self.index.contains_key(dep) {
                    return Err(Error::RecipeInvalid(format!(
                        "step {} references unknown step {}",
                        step.id, dep
                    )));
                }
            }
            if step.step_type == StepType::Timer {
                match &step.duration {
                    Some(d) if is_parseable_duration(d) => {}
                    Some(d) => {
                        return Err(Error::RecipeInvalid(format!(
                            "step {} has unparseable duration {:?}",
                            step.id, d
                        )))
                    }
                    None => {
                        return Err(Error::RecipeInvalid(format!(
                            "step {} is type=timer but has no duration",
                            step.id
                        )))
                    }
                }
            }
        }
        self.check_acyclic()?;
        Ok(())
    }

    /// Depth-first cycle check over the `next` edges (the direction in
    /// which the engine actually walks the graph at runtime).
    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: HashMap<&str, Mark> = HashMap::new();

        fn visit<'a>(
            recipe: &'a Recipe,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(Error::RecipeInvalid(format!(
                        "cycle detected through step {id}"
                    )))
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(step) = recipe.step(id) {
                for next_id in &step.next {
                    visit(recipe, next_id, marks)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for step in &self.steps {
            visit(self, &step.id, &mut marks)?;
        }
        Ok(())
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.index.get(id).copied().map(move |i| &mut self.steps[i])
    }

    /// Steps in document order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn completed_ids(&self) -> HashSet<String> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(steps_json: &str) -> RecipeDocument {
        let raw = format!(
            r#"{{"recipe": {{"id": "r1", "title": "Test Recipe"}}, "steps": {steps_json}}}"#
        );
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn rejects_duplicate_ids() {
        let d = doc(r#"[{"id":"a","descr":"x","type":"immediate"},{"id":"a","descr":"y","type":"immediate"}]"#);
        assert!(matches!(
            Recipe::from_document(d),
            Err(Error::RecipeInvalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let d = doc(r#"[{"id":"a","descr":"x","type":"immediate","depends_on":["ghost"]}]"#);
        assert!(matches!(
            Recipe::from_document(d),
            Err(Error::RecipeInvalid(_))
        ));
    }

    #[test]
    fn rejects_cycle() {
        let d = doc(
            r#"[{"id":"a","descr":"x","type":"immediate","next":["b"]},
                {"id":"b","descr":"y","type":"immediate","next":["a"]}]"#,
        );
        assert!(matches!(
            Recipe::from_document(d),
            Err(Error::RecipeInvalid(_))
        ));
    }

    #[test]
    fn rejects_timer_without_duration() {
        let d = doc(r#"[{"id":"a","descr":"x","type":"timer"}]"#);
        assert!(matches!(
            Recipe::from_document(d),
            Err(Error::RecipeInvalid(_))
        ));
    }

    #[test]
    fn accepts_valid_recipe() {
        let d = doc(
            r#"[{"id":"a","descr":"x","type":"immediate","next":["b"]},
                {"id":"b","descr":"y","type":"timer","duration":"PT10M","depends_on":["a"]}]"#,
        );
        let recipe = Recipe::from_document(d).unwrap();
        assert_eq!(recipe.len(), 2);
        assert_eq!(recipe.step("b").unwrap().duration_secs(), Some(600));
    }
}
