use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use crate::collaborators::{CollectionBatch, CollectionRequest, Collector, Collaborators};
use crate::config::EngineConfig;
use crate::domain::{
    CollectionError, CollectionSummary, Document, ErrorImpact, ErrorLog, RunStage, RunState,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::quality::assess_quality;
use crate::scoring::keywords::collection_query;

async fn call_collector(
    collector: &Arc<dyn Collector>,
    request: &CollectionRequest,
    timeout: Duration,
) -> Result<CollectionBatch, CollectionError> {
    match tokio::time::timeout(timeout, collector.collect(request)).await {
        Ok(result) => result,
        Err(_) => Err(CollectionError::Timeout {
            collector: collector.name().to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Fold one collector's outcome into the run. Returns the documents to merge.
fn absorb(
    run: &mut RunState,
    collector: &Arc<dyn Collector>,
    outcome: Result<CollectionBatch, CollectionError>,
) -> (Vec<Document>, CollectionSummary) {
    let pass = run.collect_passes;
    let now = Utc::now();
    match outcome {
        Ok(batch) => {
            let source_type = collector.source_type();
            let mut documents = Vec::with_capacity(batch.documents.len());
            for mut doc in batch.documents {
                doc.source_type = source_type;
                match doc.validate() {
                    Ok(()) => documents.push(doc),
                    Err(e) => {
                        run.warn(format!("{}: dropped {e}", collector.name()));
                        run.record_error(ErrorLog::new(
                            RunStage::Collection.as_str(),
                            &e,
                            true,
                            ErrorImpact::Low,
                        ));
                    }
                }
            }
            let error = if batch.warnings.is_empty() {
                None
            } else {
                Some(batch.warnings.join("; "))
            };
            for w in batch.warnings {
                run.warn(format!("{}: {w}", collector.name()));
            }
            let summary =
                CollectionSummary::from_documents(collector.name(), pass, &documents, error, now);
            (documents, summary)
        }
        Err(e) => {
            METRICS.inc_collector_failures();
            obs::emit_collector_degraded(&run.run_key(), collector.name(), &e);
            run.warn(format!("collection degraded: {e}"));
            run.record_error(ErrorLog::new(
                RunStage::Collection.as_str(),
                &e,
                true,
                ErrorImpact::Medium,
            ));
            let summary = CollectionSummary::from_documents(
                collector.name(),
                pass,
                &[],
                Some(e.to_string()),
                now,
            );
            (Vec::new(), summary)
        }
    }
}

/// Run both collectors concurrently and merge their documents into the run.
///
/// Collector errors and timeouts become warnings; this stage never fails.
pub async fn collect(
    mut run: RunState,
    collaborators: &Collaborators,
    config: &EngineConfig,
) -> RunState {
    let started = Instant::now();
    run.collect_passes += 1;
    METRICS.inc_collect_passes();

    let request = CollectionRequest {
        company_name: run.company_name().to_string(),
        domain: run.domain().to_string(),
        query: collection_query(run.company_name(), run.domain(), &run.collection_focus),
        pass: run.collect_passes,
        focus: run.collection_focus.clone(),
    };
    let timeout = Duration::from_secs(config.collector_timeout_secs);

    let (web, specialized) = tokio::join!(
        call_collector(&collaborators.web, &request, timeout),
        call_collector(&collaborators.specialized, &request, timeout),
    );

    let (web_docs, web_summary) = absorb(&mut run, &collaborators.web, web);
    let (spec_docs, spec_summary) = absorb(&mut run, &collaborators.specialized, specialized);
    run.web_collection = Some(web_summary);
    run.specialized_collection = Some(spec_summary);

    let before = run.merged_documents.len();
    let web_stats = run.merged_documents.merge(web_docs);
    let spec_stats = run.merged_documents.merge(spec_docs);
    debug!(
        pass = run.collect_passes,
        before = before,
        after = run.merged_documents.len(),
        web_added = web_stats.added,
        specialized_added = spec_stats.added,
        "documents merged"
    );

    let quality = assess_quality(
        &run.merged_documents,
        Utc::now(),
        config.recency_half_life_days,
        config.thresholds.quality,
    );
    run.quality_score = Some(quality.quality_score);
    run.is_data_sufficient = quality.is_data_sufficient;
    run.quality = Some(quality);

    let processed = run.merged_documents.len();
    run.log_execution(
        RunStage::Collection,
        format!("collection pass {}", run.collect_passes),
        started,
        processed,
    );
    run
}
