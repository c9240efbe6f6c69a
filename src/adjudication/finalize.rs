//! Result finalizer: merges pass outputs into the terminal value,
//! confidence, and manual-review decision, writing the ordered
//! `reasoning_chain` audit trail as it goes.

use crate::adjudication::types::ExtractionResult;
use crate::adjudication::weights::finalizer;
use crate::adjudication::AdjudicationError;

impl ExtractionResult {
    /// Compute the terminal value. Must run exactly once, after Pass 4 —
    /// a second call is a caller contract violation (it would duplicate
    /// chain entries), so it fails fast instead.
    pub fn finalize(&mut self) -> Result<(), AdjudicationError> {
        if self.finalized {
            return Err(AdjudicationError::AlreadyFinalized(
                self.variable.as_str().to_string(),
            ));
        }
        self.finalized = true;

        for pass in &self.passes {
            self.reasoning_chain.push(match (&pass.value, pass.candidates.len()) {
                (Some(value), n) => format!(
                    "Pass {} ({}): value='{}' confidence={:.3} ({n} candidate(s))",
                    pass.pass_number,
                    pass.method.as_str(),
                    value,
                    pass.confidence
                ),
                (None, n) => format!(
                    "Pass {} ({}): no value ({n} candidate(s))",
                    pass.pass_number,
                    pass.method.as_str()
                ),
            });
        }

        // Flags from every pass flatten into the clinical record first so
        // the review rule below can see them.
        for pass in &self.passes {
            self.clinical_flags.extend(pass.flags.flattened());
        }

        match self.latest_valued_pass_index() {
            Some(idx) => self.finalize_from_pass(idx),
            None => self.finalize_from_candidates(),
        }

        self.apply_review_rule();
        tracing::info!(
            variable = self.variable.as_str(),
            patient = %self.patient_id,
            value = self.final_value.as_deref().unwrap_or("-"),
            confidence = self.final_confidence,
            review = self.needs_manual_review,
            "Extraction finalized"
        );
        Ok(())
    }

    fn latest_valued_pass_index(&self) -> Option<usize> {
        self.passes.iter().rposition(|p| p.has_value())
    }

    /// Latest non-empty pass is the value source; its own adjustment and
    /// every later pass's adjustment apply multiplicatively, then clamp.
    fn finalize_from_pass(&mut self, idx: usize) {
        let source = &self.passes[idx];
        self.final_value = source.value.clone();
        let mut confidence = source.confidence;
        self.reasoning_chain.push(format!(
            "Value source: pass {} ({}) -> '{}' at {:.3}",
            source.pass_number,
            source.method.as_str(),
            self.final_value.as_deref().unwrap_or(""),
            confidence
        ));

        let adjustments: Vec<(u8, f32)> = self.passes[idx..]
            .iter()
            .filter(|p| (p.confidence_adjustment - 1.0).abs() > f32::EPSILON)
            .map(|p| (p.pass_number, p.confidence_adjustment))
            .collect();
        for (pass_number, adjustment) in adjustments {
            let before = confidence;
            confidence *= adjustment;
            self.reasoning_chain.push(format!(
                "Pass {pass_number} adjustment ×{adjustment}: {before:.3} -> {confidence:.3}"
            ));
        }

        let clamped = confidence.clamp(0.0, 1.0);
        if clamped != confidence {
            self.reasoning_chain
                .push(format!("Confidence clamped: {confidence:.3} -> {clamped:.3}"));
        }
        self.final_confidence = clamped;
    }

    /// No pass produced a value: fall back to the best raw candidate, or
    /// the explicit sentinel when nothing confident exists. Never null.
    fn finalize_from_candidates(&mut self) {
        let best = self
            .all_candidates
            .iter()
            .enumerate()
            // fold keeps the first of equal-confidence candidates, so the
            // fallback is deterministic in insertion order.
            .fold(None::<(usize, f32)>, |acc, (i, c)| match acc {
                Some((_, conf)) if conf >= c.confidence => acc,
                _ => Some((i, c.confidence)),
            });

        match best {
            Some((idx, confidence)) if confidence >= finalizer::FALLBACK_CANDIDATE_THRESHOLD => {
                let candidate = &self.all_candidates[idx];
                self.final_value = Some(candidate.value.clone());
                self.final_confidence = confidence.clamp(0.0, 1.0);
                self.reasoning_chain.push(format!(
                    "No pass produced a value; best candidate '{}' from {} at {:.3} used as fallback",
                    candidate.value, candidate.source, confidence
                ));
            }
            _ => {
                self.final_value = Some(finalizer::NO_CONFIDENT_EXTRACTION.to_string());
                self.final_confidence = 0.0;
                self.needs_manual_review = true;
                self.reasoning_chain.push(format!(
                    "No confident extractions (no candidate ≥ {:.2}); manual review required",
                    finalizer::FALLBACK_CANDIDATE_THRESHOLD
                ));
            }
        }
    }

    /// The review conditions are OR'd; nothing ever un-sets the flag.
    fn apply_review_rule(&mut self) {
        if self.final_confidence < finalizer::MANUAL_REVIEW_THRESHOLD {
            self.needs_manual_review = true;
            self.reasoning_chain.push(format!(
                "Manual review: confidence {:.3} below {:.2}",
                self.final_confidence,
                finalizer::MANUAL_REVIEW_THRESHOLD
            ));
        }
        for flag in &self.clinical_flags {
            let lower = flag.to_lowercase();
            if let Some(term) = finalizer::REVIEW_FLAG_TERMS.iter().find(|t| lower.contains(**t)) {
                self.needs_manual_review = true;
                self.reasoning_chain
                    .push(format!("Manual review: flag '{flag}' contains '{term}'"));
            }
        }
    }
}
