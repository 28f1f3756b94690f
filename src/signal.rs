//! Named control signals and their level-triggered actions.
//!
//! A [`Signal`] smooths its raw input, normalizes it into [0, 1] between two
//! thresholds, and drives any number of attached [`Action`]s. Actions watch
//! the filtered value on its raw scale, so their thresholds are independent
//! of the display normalization.

use crate::{filters::FilteredValue, Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Opaque handle identifying one attached action.
///
/// Supplied by the caller so UI-level controls can replace or remove their
/// binding later without reference comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

type Callback = Box<dyn FnMut() + Send>;

/// Level-triggered state machine over a scalar value and a threshold.
///
/// Each update fires at most one of the transitions, evaluated in this
/// order:
///
/// 1. down: `value <= threshold < old_value`
/// 2. up: `value > threshold >= old_value`
/// 3. hold-high: `value > threshold` while `old_value >= threshold`
/// 4. hold-low: `value <= threshold` while `old_value <= threshold`
///
/// The ordering makes up and hold-high mutually exclusive on the crossing
/// frame. `old_value` is replaced unconditionally after evaluation.
pub struct Action {
    threshold: f64,
    old_value: f64,
    up_action: Option<Callback>,
    down_action: Option<Callback>,
    hold_high_action: Option<Callback>,
    hold_low_action: Option<Callback>,
}

impl Action {
    /// Create an action with the given threshold and no callbacks.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            old_value: 0.0,
            up_action: None,
            down_action: None,
            hold_high_action: None,
            hold_low_action: None,
        }
    }

    /// Callback for exceeding the threshold (`value > threshold >= old`)
    pub fn set_up_action(&mut self, action: impl FnMut() + Send + 'static) {
        self.up_action = Some(Box::new(action));
    }

    /// Callback for falling below the threshold (`value <= threshold < old`)
    pub fn set_down_action(&mut self, action: impl FnMut() + Send + 'static) {
        self.down_action = Some(Box::new(action));
    }

    /// Callback for staying above the threshold
    pub fn set_hold_high_action(&mut self, action: impl FnMut() + Send + 'static) {
        self.hold_high_action = Some(Box::new(action));
    }

    /// Callback for staying at or below the threshold
    pub fn set_hold_low_action(&mut self, action: impl FnMut() + Send + 'static) {
        self.hold_low_action = Some(Box::new(action));
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed a new value, firing the matching transition callback.
    pub fn update(&mut self, value: f64) {
        if value <= self.threshold && self.threshold < self.old_value {
            fire(&mut self.down_action);
        } else if value > self.threshold && self.threshold >= self.old_value {
            fire(&mut self.up_action);
        } else if value > self.threshold && self.old_value >= self.threshold {
            fire(&mut self.hold_high_action);
        } else if value <= self.threshold && self.old_value <= self.threshold {
            fire(&mut self.hold_low_action);
        }
        self.old_value = value;
    }
}

fn fire(callback: &mut Option<Callback>) {
    if let Some(callback) = callback {
        callback();
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("threshold", &self.threshold)
            .field("old_value", &self.old_value)
            .field("up", &self.up_action.is_some())
            .field("down", &self.down_action.is_some())
            .field("hold_high", &self.hold_high_action.is_some())
            .field("hold_low", &self.hold_low_action.is_some())
            .finish()
    }
}

/// One named control channel: filtered raw value, normalization thresholds,
/// derived scaled value and attached actions.
#[derive(Debug)]
pub struct Signal {
    name: String,
    raw_value: FilteredValue,
    scaled_value: f64,
    lower_threshold: f64,
    higher_threshold: f64,
    actions: HashMap<ActionId, Action>,
}

impl Signal {
    /// Create a signal mapping [0, 1] onto itself, unfiltered.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_value: FilteredValue::new(0.0),
            scaled_value: 0.0,
            lower_threshold: 0.0,
            higher_threshold: 1.0,
            actions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feed a raw value: filter, normalize, drive attached actions.
    ///
    /// Returns the new scaled value. If the higher threshold is below the
    /// lower one the mapping inverts; the result is clamped to [0, 1]
    /// either way. Actions observe the filtered (pre-normalization) value.
    pub fn set_value(&mut self, raw: f64) -> f64 {
        let filtered = self.raw_value.set(raw);
        self.scaled_value =
            ((filtered - self.lower_threshold) / (self.higher_threshold - self.lower_threshold)).clamp(0.0, 1.0);
        for action in self.actions.values_mut() {
            action.update(filtered);
        }
        self.scaled_value
    }

    /// Current scaled value in [0, 1]
    #[must_use]
    pub fn scaled_value(&self) -> f64 {
        self.scaled_value
    }

    /// Current filtered raw value
    #[must_use]
    pub fn raw_value(&self) -> f64 {
        self.raw_value.get()
    }

    /// Update the normalization thresholds; `None` keeps the old value.
    ///
    /// # Errors
    ///
    /// Rejects a configuration where both thresholds end up equal, which
    /// would divide by zero on the next frame.
    pub fn set_thresholds(&mut self, lower: Option<f64>, higher: Option<f64>) -> Result<()> {
        let lower = lower.unwrap_or(self.lower_threshold);
        let higher = higher.unwrap_or(self.higher_threshold);
        if lower == higher {
            return Err(Error::Signal(format!(
                "Signal '{}': lower and higher thresholds must differ (both {lower})",
                self.name
            )));
        }
        self.lower_threshold = lower;
        self.higher_threshold = higher;
        Ok(())
    }

    #[must_use]
    pub fn thresholds(&self) -> (f64, f64) {
        (self.lower_threshold, self.higher_threshold)
    }

    /// Reconfigure the smoothing strength of the raw value; <= 0 disables.
    pub fn set_filter_strength(&mut self, strength: f64) {
        self.raw_value.set_filter_strength(strength);
    }

    /// Attach an action under a caller-supplied id, replacing any previous
    /// action under the same id.
    pub fn add_action(&mut self, id: ActionId, action: Action) -> Option<Action> {
        self.actions.insert(id, action)
    }

    /// Detach and return the action under `id`, if any.
    pub fn remove_action(&mut self, id: ActionId) -> Option<Action> {
        self.actions.remove(&id)
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        up: AtomicUsize,
        down: AtomicUsize,
        hold_high: AtomicUsize,
        hold_low: AtomicUsize,
    }

    fn counting_action(threshold: f64, counters: &Arc<Counters>, with_hold_low: bool) -> Action {
        let mut action = Action::new(threshold);
        let c = Arc::clone(counters);
        action.set_up_action(move || {
            c.up.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        action.set_down_action(move || {
            c.down.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        action.set_hold_high_action(move || {
            c.hold_high.fetch_add(1, Ordering::SeqCst);
        });
        if with_hold_low {
            let c = Arc::clone(counters);
            action.set_hold_low_action(move || {
                c.hold_low.fetch_add(1, Ordering::SeqCst);
            });
        }
        action
    }

    #[test]
    fn test_action_precedence_sequence() {
        // [0.3, 0.6, 0.6, 0.4] against threshold 0.5 fires nothing, up,
        // hold, down.
        let counters = Arc::new(Counters::default());
        let mut action = counting_action(0.5, &counters, false);

        action.update(0.3);
        assert_eq!(counters.up.load(Ordering::SeqCst), 0);
        assert_eq!(counters.down.load(Ordering::SeqCst), 0);
        assert_eq!(counters.hold_high.load(Ordering::SeqCst), 0);

        action.update(0.6);
        assert_eq!(counters.up.load(Ordering::SeqCst), 1);
        assert_eq!(counters.hold_high.load(Ordering::SeqCst), 0);

        action.update(0.6);
        assert_eq!(counters.up.load(Ordering::SeqCst), 1);
        assert_eq!(counters.hold_high.load(Ordering::SeqCst), 1);

        action.update(0.4);
        assert_eq!(counters.down.load(Ordering::SeqCst), 1);
        assert_eq!(counters.up.load(Ordering::SeqCst), 1);
        assert_eq!(counters.hold_high.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_up_and_hold_mutually_exclusive() {
        let counters = Arc::new(Counters::default());
        let mut action = counting_action(0.5, &counters, false);
        action.update(0.9);
        // Crossing frame fires up only
        assert_eq!(counters.up.load(Ordering::SeqCst), 1);
        assert_eq!(counters.hold_high.load(Ordering::SeqCst), 0);
        action.update(0.9);
        assert_eq!(counters.hold_high.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hold_low_fires_below_threshold() {
        let counters = Arc::new(Counters::default());
        let mut action = counting_action(0.5, &counters, true);
        action.update(0.2);
        action.update(0.1);
        assert_eq!(counters.hold_low.load(Ordering::SeqCst), 2);
        assert_eq!(counters.down.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_value_at_threshold_counts_as_below() {
        let counters = Arc::new(Counters::default());
        let mut action = counting_action(0.5, &counters, false);
        action.update(0.8);
        action.update(0.5);
        // value == threshold with old above: down fires
        assert_eq!(counters.down.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scaled_value_clamped() {
        let mut signal = Signal::new("JawOpen");
        signal.set_thresholds(Some(0.2), Some(0.6)).unwrap();
        assert_eq!(signal.set_value(0.0), 0.0);
        assert_eq!(signal.set_value(1.0), 1.0);
        let mid = signal.set_value(0.4);
        assert!((mid - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_thresholds_flip_mapping() {
        let mut signal = Signal::new("Pitch");
        signal.set_thresholds(Some(0.8), Some(0.2)).unwrap();
        assert_eq!(signal.set_value(0.8), 0.0);
        assert_eq!(signal.set_value(0.2), 1.0);
        assert_eq!(signal.set_value(1.0), 0.0);
        assert_eq!(signal.set_value(0.0), 1.0);
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let mut signal = Signal::new("Yaw");
        assert!(signal.set_thresholds(Some(0.4), Some(0.4)).is_err());
        // Partial update keeping the old other bound is validated too
        signal.set_thresholds(Some(1.0), None).unwrap_err();
    }

    #[test]
    fn test_multiple_actions_independent_state() {
        let low = Arc::new(Counters::default());
        let high = Arc::new(Counters::default());
        let mut signal = Signal::new("Smile");

        signal.add_action(ActionId::new(1), counting_action(0.3, &low, false));
        signal.add_action(ActionId::new(2), counting_action(0.7, &high, false));

        signal.set_value(0.5);
        assert_eq!(low.up.load(Ordering::SeqCst), 1);
        assert_eq!(high.up.load(Ordering::SeqCst), 0);

        signal.set_value(0.9);
        assert_eq!(low.up.load(Ordering::SeqCst), 1);
        assert_eq!(low.hold_high.load(Ordering::SeqCst), 1);
        assert_eq!(high.up.load(Ordering::SeqCst), 1);

        assert!(signal.remove_action(ActionId::new(1)).is_some());
        assert!(signal.remove_action(ActionId::new(1)).is_none());
        assert_eq!(signal.action_count(), 1);
    }

    #[test]
    fn test_actions_observe_filtered_value() {
        let counters = Arc::new(Counters::default());
        let mut signal = Signal::new("MouthPuck");
        signal.set_filter_strength(2.0);
        signal.add_action(ActionId::new(7), counting_action(0.5, &counters, false));

        // Heavy smoothing from a zero estimate: one spike must not cross
        // the action threshold even though the raw value does.
        signal.set_value(1.0);
        assert_eq!(counters.up.load(Ordering::SeqCst), 0);
    }
}
