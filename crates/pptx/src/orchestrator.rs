//! Slide orchestration.
//!
//! Drives every paragraph of every slide through merge, extraction, the
//! selected alignment strategy and reinsertion. Backend calls all pass
//! through a [`CallGate`], the single place where a failed call turns into
//! "keep the original text" and where cancellation is observed.

use crate::extract::ParagraphExtractor;
use crate::reinsert::ReinsertionEngine;
use crate::run::RunMerger;
use crate::slides::Slide;
use crate::strategy::{strategy_for, AlignmentStrategy, Reinsertion, StrategyOutcome};
use crate::xml::{NodeId, XmlDocument};
use slidemob_core::{
    classify, ContentTransformer, Error, FixedLanguageDetector, LanguageDetector,
    ParagraphOutcome, Result, RewriteConfig, RewriteOutcome, RewriteSummary, SlideProgress,
    TransformResult,
};

/// Result of a call made through a [`CallGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult<T> {
    Done(T),
    /// The call failed; the failure has been logged.
    Failed,
    /// Stop was requested earlier; the call was not made.
    Stopped,
}

/// Wraps the transformer with the stop check and the failure policy.
pub struct CallGate<'a> {
    transformer: &'a dyn ContentTransformer,
    stop: &'a dyn Fn() -> bool,
    stopped: bool,
    calls: usize,
}

impl<'a> CallGate<'a> {
    pub fn new(transformer: &'a dyn ContentTransformer, stop: &'a dyn Fn() -> bool) -> Self {
        Self {
            transformer,
            stop,
            stopped: false,
            calls: 0,
        }
    }

    /// Poll the stop check. Once it has fired it stays fired.
    pub fn check_stop(&mut self) -> bool {
        if !self.stopped && (self.stop)() {
            log::info!("Stop requested");
            self.stopped = true;
        }
        self.stopped
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Number of calls that reached the transformer.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Make one blocking call unless stop has been observed, then poll the
    /// stop check again.
    pub fn call<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&dyn ContentTransformer) -> TransformResult<T>,
    ) -> CallResult<T> {
        if self.stopped {
            log::trace!("Skipping {} call, stop requested", operation);
            return CallResult::Stopped;
        }

        self.calls += 1;
        let result = f(self.transformer);
        self.check_stop();

        match result {
            Ok(value) => CallResult::Done(value),
            Err(e) => {
                log::warn!(
                    "{} call to '{}' failed, keeping original text: {}",
                    operation,
                    self.transformer.name(),
                    e
                );
                CallResult::Failed
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphState {
    Pending,
    Extracting,
    Rewriting,
    Reinserting,
    Done,
}

fn advance(state: &mut ParagraphState, next: ParagraphState, paragraph: NodeId) {
    log::trace!("Paragraph {:?}: {:?} -> {:?}", paragraph, state, next);
    *state = next;
}

/// Rewrites the text of a presentation's slides.
pub struct SlideOrchestrator<'a> {
    config: &'a RewriteConfig,
    transformer: &'a dyn ContentTransformer,
    detector: Option<Box<dyn LanguageDetector + 'a>>,
    strategy: Box<dyn AlignmentStrategy>,
    merger: RunMerger,
    extractor: ParagraphExtractor,
    reinserter: ReinsertionEngine,
}

impl<'a> SlideOrchestrator<'a> {
    /// Create an orchestrator. The language detector defaults to the culture
    /// tag of the configured target language, when it has one.
    pub fn new(config: &'a RewriteConfig, transformer: &'a dyn ContentTransformer) -> Self {
        let detector = FixedLanguageDetector::for_language(&config.target_language)
            .map(|d| Box::new(d) as Box<dyn LanguageDetector + 'a>);
        if config.update_language && detector.is_none() {
            log::warn!(
                "No language tag known for '{}'; run languages will not be updated",
                config.target_language
            );
        }

        Self {
            config,
            transformer,
            detector,
            strategy: strategy_for(config),
            merger: RunMerger::new(),
            extractor: ParagraphExtractor::new(),
            reinserter: ReinsertionEngine::new(),
        }
    }

    /// Use a custom language detector for run language updates.
    pub fn with_language_detector(mut self, detector: impl LanguageDetector + 'a) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    /// Process slides in order.
    ///
    /// `progress` is called after each slide completes. `stop` is polled
    /// before each paragraph and after each backend call; once it returns
    /// true no further call is made and the run ends as cancelled. Slides
    /// already rewritten stay rewritten.
    pub fn process_slides(
        &self,
        slides: &mut [Slide],
        progress: &mut dyn FnMut(&SlideProgress),
        stop: &dyn Fn() -> bool,
    ) -> Result<RewriteOutcome> {
        if slides.is_empty() {
            return Err(Error::NoSlides("presentation".to_string()));
        }
        if !slides.iter().any(|s| self.config.includes_slide(&s.name)) {
            return Err(Error::ConfigError(format!(
                "none of the selected slides exist: {}",
                self.config.slides.join(", ")
            )));
        }

        let total = slides.len();
        let mut summary = RewriteSummary::new();
        let mut gate = CallGate::new(self.transformer, stop);

        log::info!(
            "Rewriting {} slides into {} with {:?} strategy via '{}'",
            total,
            self.config.target_language,
            self.strategy.kind(),
            self.transformer.name()
        );

        for (i, slide) in slides.iter_mut().enumerate() {
            if !self.config.includes_slide(&slide.name) {
                log::debug!("Skipping {} (not selected)", slide.name);
                continue;
            }

            let finished = self.process_document(&mut slide.document, &mut summary, &mut gate);
            if !finished {
                log::info!("Cancelled while processing {}", slide.name);
                log_summary(&summary, gate.calls());
                return Ok(RewriteOutcome::Cancelled(summary));
            }

            summary.slides_processed += 1;
            log::info!("Processed {} ({}/{})", slide.name, i + 1, total);
            progress(&SlideProgress {
                slide_name: slide.name.clone(),
                index: i + 1,
                total,
            });
        }

        log_summary(&summary, gate.calls());
        Ok(RewriteOutcome::Completed(summary))
    }

    /// Process every paragraph of one slide tree. Returns false when stop
    /// was observed.
    pub fn process_document(
        &self,
        doc: &mut XmlDocument,
        summary: &mut RewriteSummary,
        gate: &mut CallGate<'_>,
    ) -> bool {
        for paragraph in doc.descendants(doc.root(), "p") {
            if gate.check_stop() {
                return false;
            }
            if let Some(outcome) = self.process_paragraph(doc, paragraph, summary, gate) {
                summary.record(outcome);
            }
        }
        !gate.is_stopped()
    }

    /// Returns `None` when the paragraph was left alone because of a stop.
    fn process_paragraph(
        &self,
        doc: &mut XmlDocument,
        paragraph: NodeId,
        summary: &mut RewriteSummary,
        gate: &mut CallGate<'_>,
    ) -> Option<ParagraphOutcome> {
        let mut state = ParagraphState::Pending;

        advance(&mut state, ParagraphState::Extracting, paragraph);
        if self.config.merge_runs {
            summary.runs_merged += self.merger.merge(doc, paragraph);
        }
        let extracted = self.extractor.extract(doc, paragraph);
        if !classify(&extracted.text).is_translatable() {
            advance(&mut state, ParagraphState::Done, paragraph);
            return Some(ParagraphOutcome::Skipped);
        }
        log::debug!("Paragraph text ({}): {:?}", extracted.language, extracted.text);

        advance(&mut state, ParagraphState::Rewriting, paragraph);
        let reinsertion = match self.strategy.rewrite(doc, paragraph, &extracted, gate) {
            StrategyOutcome::Ready(reinsertion) => reinsertion,
            StrategyOutcome::Skipped => {
                advance(&mut state, ParagraphState::Done, paragraph);
                return Some(ParagraphOutcome::Skipped);
            }
            StrategyOutcome::Degraded => {
                advance(&mut state, ParagraphState::Done, paragraph);
                return Some(ParagraphOutcome::Degraded);
            }
            StrategyOutcome::Interrupted => return None,
        };

        advance(&mut state, ParagraphState::Reinserting, paragraph);
        let reinserted = match &reinsertion {
            Reinsertion::Mapping(mapping) => {
                self.reinserter.apply_mapping(doc, paragraph, mapping)
            }
            Reinsertion::Nodes(nodes) => self.reinserter.apply_decoded(doc, paragraph, nodes),
        };
        summary.runs_removed += reinserted.removed;

        if self.config.update_language {
            if let Some(detector) = &self.detector {
                self.reinserter
                    .update_languages(doc, &reinserted.runs, detector.as_ref());
            }
        }

        advance(&mut state, ParagraphState::Done, paragraph);
        Some(ParagraphOutcome::Rewritten)
    }
}

fn log_summary(summary: &RewriteSummary, calls: usize) {
    log::info!(
        "{} slides, {} paragraphs: {} rewritten, {} skipped, {} kept original; {} runs merged, {} removed; {} backend calls",
        summary.slides_processed,
        summary.paragraphs_seen,
        summary.paragraphs_rewritten,
        summary.paragraphs_skipped,
        summary.paragraphs_degraded,
        summary.runs_merged,
        summary.runs_removed,
        calls
    );
}
