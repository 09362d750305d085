use std::time::Instant;

use tracing::debug;

use super::StageFailure;
use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::domain::{RunStage, RunState};
use crate::scoring::{aggregate, evaluate_all, generate_criteria};

/// Map evidence onto the domain's criteria and aggregate a final score.
///
/// Criteria generated earlier in the run are reused.
pub async fn evaluate(
    mut run: RunState,
    collaborators: &Collaborators,
    config: &EngineConfig,
) -> Result<RunState, StageFailure> {
    let started = Instant::now();

    let criteria = match run.criteria.take() {
        Some(existing) if existing.domain == run.domain() => existing,
        _ => {
            let generated = match generate_criteria(
                collaborators.clauses.as_ref(),
                run.domain(),
                config.retrieval_k,
                config.max_criteria_per_category,
            )
            .await
            {
                Ok(set) => set,
                Err(e) => return Err(StageFailure::new(run, e)),
            };
            debug!(criteria = generated.criteria.len(), "criteria generated");
            generated
        }
    };
    for category in criteria.empty_categories() {
        run.limit(format!(
            "no regulatory criteria retrieved for {}; category scored 0",
            category.as_str()
        ));
    }

    let mapped = evaluate_all(
        &criteria.criteria,
        &run.merged_documents,
        collaborators.judge.as_ref(),
        config.max_evidence_per_judgment,
    )
    .await;
    let mut evaluations = Vec::with_capacity(mapped.len());
    for m in mapped {
        if let Some(w) = m.warning {
            run.warn(format!("judge degraded for {w}"));
        }
        evaluations.push(m.evaluation);
    }

    let score = aggregate(&criteria, &evaluations, config);
    run.criteria = Some(criteria);
    run.evaluations = evaluations;
    match score {
        Ok(score) => run.final_score = Some(score),
        Err(e) => return Err(StageFailure::new(run, e)),
    }

    let processed = run.merged_documents.len();
    run.log_execution(RunStage::Evaluation, "evaluate criteria", started, processed);
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Document, EthauditError, SourceType};
    use crate::fakes::{clause, FailingClauseIndex, FixedJudge, StaticClauseIndex, TestCollaborators};
    use std::sync::Arc;

    fn run_with_evidence() -> RunState {
        let mut run = RunState::new("Acme", "medical");
        run.merged_documents.merge([Document::new(
            "d1",
            SourceType::Web,
            "https://acme.example/trust",
            0.9,
        )
        .with_excerpt("We publish model cards.")
        .with_topics([Category::Transparency])]);
        run
    }

    #[tokio::test]
    async fn produces_score_and_flags_empty_categories() {
        let collab = TestCollaborators::new()
            .clauses(Arc::new(StaticClauseIndex::new(vec![clause(
                "art13",
                0.9,
                Category::Transparency,
            )])))
            .judge(Arc::new(FixedJudge::new("fully_compliant")))
            .build();
        let run = evaluate(run_with_evidence(), &collab, &EngineConfig::default())
            .await
            .unwrap();
        let score = run.final_score.as_ref().unwrap();
        assert!(score.category_scores[&Category::Transparency] > 0.9);
        assert_eq!(run.limitations.len(), 4);
        assert_eq!(run.evaluations.len(), 1);
    }

    #[tokio::test]
    async fn existing_criteria_are_reused() {
        let collab = TestCollaborators::new()
            .clauses(Arc::new(StaticClauseIndex::new(vec![clause(
                "art13",
                0.9,
                Category::Transparency,
            )])))
            .build();
        let run = evaluate(run_with_evidence(), &collab, &EngineConfig::default())
            .await
            .unwrap();
        let generated_at = run.criteria.as_ref().unwrap().generated_at;

        // An index that now fails proves the second pass never queries it.
        let failing = TestCollaborators::new()
            .clauses(Arc::new(FailingClauseIndex))
            .build();
        let run = evaluate(run, &failing, &EngineConfig::default()).await.unwrap();
        assert_eq!(run.criteria.as_ref().unwrap().generated_at, generated_at);
    }

    #[tokio::test]
    async fn retrieval_failure_is_returned_with_the_run() {
        let collab = TestCollaborators::new()
            .clauses(Arc::new(FailingClauseIndex))
            .build();
        let failure = evaluate(run_with_evidence(), &collab, &EngineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, EthauditError::Retrieval(_)));
        assert!(failure.error.is_fatal());
        assert_eq!(failure.run.merged_documents.len(), 1);
    }
}
