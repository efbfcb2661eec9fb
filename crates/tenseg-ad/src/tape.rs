//! Gradient tape for chains of VJP contexts
//!
//! The tape records boxed [`VjpOp`] contexts in forward order and replays
//! them in reverse on `backward`. Replaying drains the tape, so each context
//! is consumed exactly once.
//!
//! The tape models a single chain: the input of each recorded operation is
//! the output of the one recorded before it. Each operation must produce
//! exactly one input gradient.
//!
//! # Example
//!
//! ```
//! use tenseg_ad::tape::{interpolate_recorded, GradientTape};
//! use tenseg_core::{DenseND, InterpolationMode};
//!
//! let mut tape = GradientTape::<f64>::new();
//! let x = DenseND::ones(&[1, 2, 4, 4]);
//!
//! let (h, _) = interpolate_recorded(&mut tape, &x, Some((8.0, 8.0)), None,
//!     InterpolationMode::Bilinear, Some(false)).unwrap();
//! let (y, _) = interpolate_recorded(&mut tape, &h, Some((2.0, 2.0)), None,
//!     InterpolationMode::Nearest, None).unwrap();
//!
//! let grad_x = tape.backward(&DenseND::ones(y.shape())).unwrap();
//! assert_eq!(grad_x.shape(), x.shape());
//! assert!(tape.is_empty());
//! ```

use crate::resize::{resize_forward, ScaleFactor};
use crate::vjp::VjpOp;
use anyhow::Result;
use scirs2_core::numeric::{Float, FromPrimitive};
use std::collections::HashMap;
use std::fmt;
use tenseg_core::{DenseND, InterpolationMode};

/// Unique identifier for a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u64);

struct TapeEntry<T>
where
    T: Float + FromPrimitive,
{
    id: OperationId,
    op: Box<dyn VjpOp<T>>,
}

/// Reverse-mode tape over a chain of operations
pub struct GradientTape<T>
where
    T: Float + FromPrimitive,
{
    /// Recorded operations in forward pass order
    entries: Vec<TapeEntry<T>>,

    /// Gradient w.r.t. the input of each replayed operation
    gradients: HashMap<OperationId, DenseND<T>>,

    next_op_id: u64,

    recording: bool,
}

impl<T> GradientTape<T>
where
    T: Float + FromPrimitive,
{
    /// Create an empty tape in recording mode
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            gradients: HashMap::new(),
            next_op_id: 0,
            recording: true,
        }
    }

    /// Start recording operations
    pub fn start_recording(&mut self) {
        self.recording = true;
    }

    /// Stop recording; contexts passed to `record` are dropped
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Number of operations waiting for backward
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no operation is waiting for backward
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a VJP context. Returns `None` when not recording.
    pub fn record(&mut self, op: Box<dyn VjpOp<T>>) -> Option<OperationId> {
        if !self.recording {
            log::debug!("tape not recording, dropping {} context", op.name());
            return None;
        }

        let id = OperationId(self.next_op_id);
        self.next_op_id += 1;
        log::debug!("tape: recorded {} as op {}", op.name(), id.0);
        self.entries.push(TapeEntry { id, op });
        Some(id)
    }

    /// Replay the tape in reverse, starting from the gradient of the last
    /// recorded output. Returns the gradient w.r.t. the first recorded input.
    ///
    /// The tape is drained even if a step fails. Gradients stored by an
    /// earlier replay are discarded, so [`get_gradient`](Self::get_gradient)
    /// only resolves ids from the latest one.
    pub fn backward(&mut self, output_grad: &DenseND<T>) -> Result<DenseND<T>> {
        self.gradients.clear();
        anyhow::ensure!(!self.entries.is_empty(), "backward called on an empty tape");

        let entries: Vec<TapeEntry<T>> = self.entries.drain(..).collect();
        let mut current = output_grad.clone();

        for entry in entries.into_iter().rev() {
            let mut input_grads = entry.op.vjp(&current)?;
            anyhow::ensure!(
                input_grads.len() == 1,
                "op {} ({}) returned {} input gradients, the tape expects one",
                entry.id.0,
                entry.op.name(),
                input_grads.len()
            );
            let grad = input_grads.remove(0);
            log::debug!(
                "tape: replayed {} (op {}) -> grad {:?}",
                entry.op.name(),
                entry.id.0,
                grad.shape()
            );
            self.gradients.insert(entry.id, grad.clone());
            current = grad;
        }

        Ok(current)
    }

    /// Gradient w.r.t. the input of an operation replayed by the latest
    /// `backward`
    pub fn get_gradient(&self, id: OperationId) -> Option<&DenseND<T>> {
        self.gradients.get(&id)
    }

    /// Drop recorded operations and stored gradients
    pub fn clear(&mut self) {
        self.entries.clear();
        self.gradients.clear();
        self.next_op_id = 0;
    }
}

impl<T> Default for GradientTape<T>
where
    T: Float + FromPrimitive,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for GradientTape<T>
where
    T: Float + FromPrimitive,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ops: Vec<&str> = self.entries.iter().map(|e| e.op.name()).collect();
        f.debug_struct("GradientTape")
            .field("pending", &ops)
            .field("stored_gradients", &self.gradients.len())
            .field("recording", &self.recording)
            .finish()
    }
}

/// Resize `input` and record its gradient context on `tape`
pub fn interpolate_recorded<T>(
    tape: &mut GradientTape<T>,
    input: &DenseND<T>,
    size: Option<(f64, f64)>,
    scale_factor: Option<ScaleFactor>,
    mode: InterpolationMode,
    align_corners: Option<bool>,
) -> Result<(DenseND<T>, Option<OperationId>)>
where
    T: Float + FromPrimitive + 'static,
{
    let (output, context) = resize_forward(input, size, scale_factor, mode, align_corners)?;
    let id = tape.record(Box::new(context));
    Ok((output, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tape_creation_and_recording_flag() {
        let mut tape = GradientTape::<f64>::new();
        assert!(tape.is_recording());
        assert!(tape.is_empty());

        tape.stop_recording();
        assert!(!tape.is_recording());
        tape.start_recording();
        assert!(tape.is_recording());
    }

    #[test]
    fn test_not_recording_drops_context() {
        let mut tape = GradientTape::<f64>::new();
        tape.stop_recording();
        let x = DenseND::ones(&[1, 1, 2, 2]);
        let (y, id) = interpolate_recorded(
            &mut tape,
            &x,
            Some((4.0, 4.0)),
            None,
            InterpolationMode::Nearest,
            None,
        )
        .unwrap();
        assert_eq!(y.shape(), &[1, 1, 4, 4]);
        assert!(id.is_none());
        assert!(tape.is_empty());
    }

    #[test]
    fn test_backward_drains_in_reverse() {
        let mut tape = GradientTape::<f64>::new();
        let x = DenseND::ones(&[1, 3, 5, 5]);

        let (h, first) = interpolate_recorded(
            &mut tape,
            &x,
            Some((10.0, 10.0)),
            None,
            InterpolationMode::Bilinear,
            None,
        )
        .unwrap();
        let (y, second) = interpolate_recorded(
            &mut tape,
            &h,
            None,
            Some(ScaleFactor::Pair(0.5, 0.4)),
            InterpolationMode::Nearest,
            None,
        )
        .unwrap();
        assert_eq!(y.shape(), &[1, 3, 5, 4]);
        assert_eq!(tape.len(), 2);

        let grad_x = tape.backward(&DenseND::ones(y.shape())).unwrap();
        assert_eq!(grad_x.shape(), x.shape());
        assert!(tape.is_empty());

        assert_eq!(
            tape.get_gradient(second.unwrap()).unwrap().shape(),
            &[1, 3, 10, 10]
        );
        assert_eq!(tape.get_gradient(first.unwrap()).unwrap().shape(), &[1, 3, 5, 5]);

        // Contexts were consumed
        assert!(tape.backward(&DenseND::ones(y.shape())).is_err());
    }

    #[test]
    fn test_backward_propagates_shape_errors() {
        let mut tape = GradientTape::<f64>::new();
        let x = DenseND::ones(&[1, 1, 3, 3]);
        interpolate_recorded(
            &mut tape,
            &x,
            Some((6.0, 6.0)),
            None,
            InterpolationMode::Bicubic,
            Some(true),
        )
        .unwrap();

        assert!(tape.backward(&DenseND::ones(&[1, 1, 6, 5])).is_err());
        assert!(tape.is_empty());
    }

    #[test]
    fn test_reused_tape_keeps_only_latest_gradients() {
        let mut tape = GradientTape::<f64>::new();
        let x = DenseND::ones(&[1, 2, 3, 3]);
        let mut ids = Vec::new();

        for _ in 0..50 {
            let (y, id) = interpolate_recorded(
                &mut tape,
                &x,
                Some((6.0, 6.0)),
                None,
                InterpolationMode::Bilinear,
                None,
            )
            .unwrap();
            ids.push(id.unwrap());
            tape.backward(&DenseND::ones(y.shape())).unwrap();
        }

        let (last, earlier) = ids.split_last().unwrap();
        assert!(tape.get_gradient(*last).is_some());
        assert!(earlier.iter().all(|&id| tape.get_gradient(id).is_none()));
        assert!(format!("{:?}", tape).contains("stored_gradients: 1"));
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut tape = GradientTape::<f64>::new();
        let x = DenseND::ones(&[1, 1, 2, 2]);
        let record = |tape: &mut GradientTape<f64>| {
            interpolate_recorded(tape, &x, Some((3.0, 3.0)), None, InterpolationMode::Area, None)
                .unwrap()
                .1
        };
        assert_eq!(record(&mut tape), Some(OperationId(0)));
        assert_eq!(record(&mut tape), Some(OperationId(1)));
        tape.clear();
        assert!(tape.is_empty());
        assert_eq!(record(&mut tape), Some(OperationId(0)));
    }
}
