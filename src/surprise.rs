//! Prediction-error monitoring and surprise-driven vocabulary refinement.
//!
//! Each perception step the monitor compares the embedding an external
//! predictor expected against the embedding that actually arrived. A large
//! error means the current vocabulary failed to anticipate the world: the
//! monitor forces an out-of-schedule quantizer growth at the observed vector
//! and reports the affected node so the caller can assert a distinguished
//! novelty event to the reasoner.
//!
//! The threshold is a single scalar; no decay or hysteresis is applied
//! around it.

use std::collections::VecDeque;

use crate::error::QuantizerError;
use crate::quantizer::{euclidean, GrowingGas, NodeId};

/// Outcome of one predicted-vs-actual comparison. Transient, one per step.
#[derive(Debug, Clone, PartialEq)]
pub struct SurpriseRecord {
    pub predicted: Vec<f32>,
    pub actual: Vec<f32>,
    pub error: f32,
    pub exceeded_threshold: bool,
}

/// Rolling prediction-error monitor.
#[derive(Debug, Clone)]
pub struct SurpriseMonitor {
    threshold: f32,
    trace: VecDeque<f32>,
    trace_capacity: usize,
}

impl SurpriseMonitor {
    /// Monitor with the given threshold and diagnostic trace capacity.
    pub fn new(threshold: f32, trace_capacity: usize) -> Self {
        Self {
            threshold,
            trace: VecDeque::with_capacity(trace_capacity),
            trace_capacity: trace_capacity.max(1),
        }
    }

    /// The configured surprise threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compare a predicted and an actual embedding.
    ///
    /// Fails if the two vectors disagree in length; the error is the
    /// Euclidean distance between them.
    pub fn observe(
        &mut self,
        predicted: &[f32],
        actual: &[f32],
    ) -> Result<SurpriseRecord, QuantizerError> {
        if predicted.len() != actual.len() {
            return Err(QuantizerError::DimensionMismatch {
                expected: predicted.len(),
                actual: actual.len(),
            });
        }
        let error = euclidean(predicted, actual);
        if self.trace.len() == self.trace_capacity {
            self.trace.pop_front();
        }
        self.trace.push_back(error);

        Ok(SurpriseRecord {
            predicted: predicted.to_vec(),
            actual: actual.to_vec(),
            error,
            exceeded_threshold: error > self.threshold,
        })
    }

    /// Observe, and on a threshold excess force the quantizer to adopt the
    /// actual embedding as a new prototype immediately.
    ///
    /// Returns the record plus the node to tag the novelty event with: the
    /// freshly grown node, or — once the gas is saturated — the nearest
    /// existing one.
    pub fn observe_and_refine(
        &mut self,
        predicted: &[f32],
        actual: &[f32],
        gas: &mut GrowingGas,
    ) -> Result<(SurpriseRecord, Option<NodeId>), QuantizerError> {
        let record = self.observe(predicted, actual)?;
        if !record.exceeded_threshold {
            return Ok((record, None));
        }

        tracing::info!(
            error = record.error,
            threshold = self.threshold,
            "surprise threshold exceeded"
        );
        let node = match gas.grow_at(actual)? {
            Some(id) => Some(id),
            None => gas.classify(actual).ok().map(|(id, _)| id),
        };
        Ok((record, node))
    }

    /// Recent errors, oldest first. Diagnostic only; not persisted.
    pub fn trace(&self) -> impl Iterator<Item = f32> + '_ {
        self.trace.iter().copied()
    }

    /// Mean of the recent error trace, if any observations were made.
    pub fn mean_recent_error(&self) -> Option<f32> {
        if self.trace.is_empty() {
            return None;
        }
        Some(self.trace.iter().sum::<f32>() / self.trace.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantizer::GasParams;

    #[test]
    fn threshold_excess_is_flagged() {
        let mut monitor = SurpriseMonitor::new(0.5, 16);
        // distance((0,0), (0.9,0)) = 0.9 > 0.5
        let record = monitor.observe(&[0.0, 0.0], &[0.9, 0.0]).unwrap();
        assert!(record.exceeded_threshold);
        assert!((record.error - 0.9).abs() < 1e-6);

        // distance 0.1 stays quiet.
        let record = monitor.observe(&[0.0, 0.0], &[0.1, 0.0]).unwrap();
        assert!(!record.exceeded_threshold);
    }

    #[test]
    fn excess_triggers_out_of_schedule_growth() {
        let mut monitor = SurpriseMonitor::new(0.5, 16);
        let mut gas = GrowingGas::new(GasParams::with_dimension(2));
        gas.insert(&[0.0, 0.0]).unwrap();
        gas.insert(&[0.1, 0.0]).unwrap();
        let before = gas.len();

        let (record, node) = monitor
            .observe_and_refine(&[0.0, 0.0], &[0.9, 0.0], &mut gas)
            .unwrap();
        assert!(record.exceeded_threshold);
        let node = node.expect("growth below capacity yields a node");
        assert_eq!(gas.len(), before + 1);
        assert_eq!(gas.node(node).unwrap().vector, vec![0.9, 0.0]);
    }

    #[test]
    fn small_error_does_not_grow() {
        let mut monitor = SurpriseMonitor::new(0.5, 16);
        let mut gas = GrowingGas::new(GasParams::with_dimension(2));
        gas.insert(&[0.0, 0.0]).unwrap();
        gas.insert(&[1.0, 0.0]).unwrap();
        let before = gas.len();

        let (record, node) = monitor
            .observe_and_refine(&[0.0, 0.0], &[0.1, 0.0], &mut gas)
            .unwrap();
        assert!(!record.exceeded_threshold);
        assert!(node.is_none());
        assert_eq!(gas.len(), before);
    }

    #[test]
    fn saturated_gas_reports_nearest_node() {
        let mut monitor = SurpriseMonitor::new(0.5, 16);
        let mut gas = GrowingGas::new(GasParams {
            max_nodes: 2,
            ..GasParams::with_dimension(2)
        });
        gas.insert(&[0.0, 0.0]).unwrap();
        let far = gas.insert(&[5.0, 5.0]).unwrap();

        let (record, node) = monitor
            .observe_and_refine(&[0.0, 0.0], &[4.0, 4.0], &mut gas)
            .unwrap();
        assert!(record.exceeded_threshold);
        assert_eq!(node, Some(far));
        assert_eq!(gas.len(), 2);
    }

    #[test]
    fn mismatched_vectors_are_rejected() {
        let mut monitor = SurpriseMonitor::new(0.5, 16);
        assert!(monitor.observe(&[0.0, 0.0], &[0.0]).is_err());
    }

    #[test]
    fn trace_is_bounded() {
        let mut monitor = SurpriseMonitor::new(0.5, 4);
        for i in 0..10 {
            monitor.observe(&[0.0], &[i as f32]).unwrap();
        }
        let trace: Vec<f32> = monitor.trace().collect();
        assert_eq!(trace.len(), 4);
        assert_eq!(trace, vec![6.0, 7.0, 8.0, 9.0]);
        assert!(monitor.mean_recent_error().unwrap() > 0.0);
    }
}
