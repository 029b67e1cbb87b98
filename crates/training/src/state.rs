//! Per-run loss history and the early-stopping rule.

/// Early stopping on the rounded mean validation loss.
///
/// During the first `window` epochs the running minimum is the mean of every
/// validation loss seen so far. Afterwards the mean of the last `window` losses is
/// compared against it; the run stops once `patience` is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarlyStopping {
    pub patience: usize,
    pub window: usize,
    /// Decimal digits kept before comparing.
    pub precision: u32,
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self {
            patience: 10,
            window: 10,
            precision: 5,
        }
    }
}

/// Round half to even at `precision` decimal digits.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round_ties_even() / scale
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingState {
    train_loss: Vec<f64>,
    val_loss: Vec<f64>,
    min_val_loss: Option<f64>,
    no_improvement: usize,
}

impl TrainingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_train(&mut self, loss: f64) {
        self.train_loss.push(loss);
    }

    pub fn record_val(&mut self, loss: f64) {
        self.val_loss.push(loss);
    }

    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn val_loss(&self) -> &[f64] {
        &self.val_loss
    }

    pub fn epochs(&self) -> usize {
        self.val_loss.len()
    }

    pub fn min_val_loss(&self) -> Option<f64> {
        self.min_val_loss
    }

    pub fn no_improvement(&self) -> usize {
        self.no_improvement
    }

    /// Update the running minimum after `epoch` (zero based) and report whether
    /// training should stop now.
    pub fn update_early_stopping(&mut self, epoch: usize, rule: &EarlyStopping) -> bool {
        if self.val_loss.is_empty() {
            return false;
        }
        if epoch < rule.window {
            self.min_val_loss = Some(round_to(mean(&self.val_loss), rule.precision));
            self.no_improvement = 0;
        } else {
            let start = self.val_loss.len().saturating_sub(rule.window);
            let recent = round_to(mean(&self.val_loss[start..]), rule.precision);
            match self.min_val_loss {
                Some(min) if recent >= min => self.no_improvement += 1,
                _ => {
                    self.min_val_loss = Some(recent);
                    self.no_improvement = 0;
                }
            }
        }
        self.no_improvement > rule.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn run(rule: &EarlyStopping, losses: &[f64]) -> (TrainingState, Option<usize>) {
        let mut state = TrainingState::new();
        for (epoch, loss) in losses.iter().enumerate() {
            state.record_val(*loss);
            if state.update_early_stopping(epoch, rule) {
                return (state, Some(epoch));
            }
        }
        (state, None)
    }

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_abs_diff_eq!(round_to(0.123456, 5), 0.12346, epsilon = 1e-12);
    }

    #[test]
    fn flat_loss_stops_after_patience_is_exceeded() {
        let (state, stopped) = run(&EarlyStopping::default(), &[0.7; 100]);
        // Ten warm-up epochs, then eleven non-improving ones.
        assert_eq!(stopped, Some(20));
        assert_eq!(state.epochs(), 21);
        assert_eq!(state.no_improvement(), 11);
    }

    #[test]
    fn improving_loss_never_stops() {
        let losses: Vec<f64> = (0..60).map(|i| 1.0 - i as f64 * 0.01).collect();
        let (state, stopped) = run(&EarlyStopping::default(), &losses);
        assert_eq!(stopped, None);
        assert_eq!(state.no_improvement(), 0);
    }

    #[test]
    fn warm_up_minimum_is_prefix_mean() {
        let rule = EarlyStopping {
            patience: 5,
            window: 3,
            precision: 5,
        };
        let (state, _) = run(&rule, &[3.0, 1.0]);
        assert_eq!(state.min_val_loss(), Some(2.0));
        let (state, _) = run(&rule, &[3.0, 1.0, 2.0]);
        assert_eq!(state.min_val_loss(), Some(2.0));
        assert_eq!(state.no_improvement(), 0);
    }

    #[test]
    fn trailing_window_updates_minimum_and_counter() {
        let rule = EarlyStopping {
            patience: 1,
            window: 2,
            precision: 5,
        };
        let mut state = TrainingState::new();
        let step = |state: &mut TrainingState, epoch, loss| {
            state.record_val(loss);
            state.update_early_stopping(epoch, &rule)
        };
        assert!(!step(&mut state, 0, 4.0));
        assert!(!step(&mut state, 1, 2.0));
        assert_eq!(state.min_val_loss(), Some(3.0));
        assert!(!step(&mut state, 2, 2.0));
        assert_eq!(state.min_val_loss(), Some(2.0));
        assert!(!step(&mut state, 3, 3.0));
        assert_eq!(state.no_improvement(), 1);
        assert!(step(&mut state, 4, 3.0));
        assert_eq!(state.no_improvement(), 2);
    }

    #[test]
    fn differences_below_precision_count_as_no_improvement() {
        let rule = EarlyStopping {
            patience: 0,
            window: 1,
            precision: 2,
        };
        let (_, stopped) = run(&rule, &[0.5, 0.499]);
        assert_eq!(stopped, Some(1));
    }
}
