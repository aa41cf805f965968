//! Ordered composition of transform rules.

use tracing::trace;

use crate::config::RuleChainConfiguration;
use crate::error::BbchError;
use crate::ir::AnnotationDocument;
use crate::rules::Rule;

/// An ordered sequence of rules applied to each document.
///
/// The pipeline adds no filtering of its own: a document left with zero
/// objects is a valid output, and the caller decides what to do with it.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    rules: Vec<Rule>,
}

impl Pipeline {
    /// Creates a pipeline, checking that label extraction runs before any
    /// rule that reads labels by value.
    pub fn new(rules: Vec<Rule>) -> Result<Self, BbchError> {
        if let Some(first_reader) = rules.iter().position(Rule::reads_label) {
            if let Some(late) = rules[first_reader..]
                .iter()
                .find(|rule| rule.writes_label_from_attribute())
            {
                return Err(BbchError::RuleOrder {
                    message: format!(
                        "{} must run before {}",
                        late.name(),
                        rules[first_reader].name()
                    ),
                });
            }
        }

        Ok(Self { rules })
    }

    /// Builds the pipeline described by a configuration.
    pub fn from_config(config: &RuleChainConfiguration) -> Result<Self, BbchError> {
        Self::new(config.rules.iter().map(Rule::from_spec).collect())
    }

    /// The rules in application order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Applies every rule in order, feeding each output into the next rule.
    pub fn process(&self, document: AnnotationDocument) -> Result<AnnotationDocument, BbchError> {
        self.rules.iter().try_fold(document, |document, rule| {
            let before = document.objects.len();
            let document = rule.apply(document)?;
            trace!(
                rule = rule.name(),
                before,
                after = document.objects.len(),
                "rule applied"
            );
            Ok(document)
        })
    }
}
