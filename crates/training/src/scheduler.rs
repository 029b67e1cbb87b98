//! Learning-rate schedules stepped once per epoch.

use crate::config::PlateauConfig;

pub trait EpochLrScheduler {
    /// Feed the latest epoch metric; returns the rate for the next epoch.
    fn step(&mut self, metric: f64) -> f64;

    fn learning_rate(&self) -> f64;
}

/// Multiply the rate by `factor` once the metric has not improved for more than
/// `patience` epochs. Improvement is relative: `metric < best * (1 - threshold)`.
#[derive(Debug, Clone)]
pub struct ReduceOnPlateau {
    lr: f64,
    factor: f64,
    patience: usize,
    threshold: f64,
    cooldown: usize,
    min_lr: f64,
    best: f64,
    bad_epochs: usize,
    cooldown_left: usize,
}

impl ReduceOnPlateau {
    pub fn new(initial_lr: f64, cfg: &PlateauConfig) -> Self {
        Self {
            lr: initial_lr,
            factor: cfg.factor,
            patience: cfg.patience,
            threshold: cfg.threshold,
            cooldown: cfg.cooldown,
            min_lr: cfg.min_lr,
            best: f64::INFINITY,
            bad_epochs: 0,
            cooldown_left: 0,
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

impl EpochLrScheduler for ReduceOnPlateau {
    fn step(&mut self, metric: f64) -> f64 {
        if metric < self.best * (1.0 - self.threshold) {
            self.best = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.cooldown_left > 0 {
            self.cooldown_left -= 1;
            self.bad_epochs = 0;
        }

        if self.bad_epochs > self.patience {
            let reduced = (self.lr * self.factor).max(self.min_lr);
            if self.lr - reduced > 1e-8 {
                log::info!("reducing learning rate {:.3e} -> {:.3e}", self.lr, reduced);
                self.lr = reduced;
            }
            self.cooldown_left = self.cooldown;
            self.bad_epochs = 0;
        }
        self.lr
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plateau(patience: usize, min_lr: f64, cooldown: usize) -> ReduceOnPlateau {
        ReduceOnPlateau::new(
            1.0,
            &PlateauConfig {
                patience,
                min_lr,
                cooldown,
                ..Default::default()
            },
        )
    }

    #[test]
    fn reduces_after_patience_is_exceeded() {
        let mut s = plateau(2, 0.0, 0);
        assert_eq!(s.step(1.0), 1.0);
        assert_eq!(s.step(1.0), 1.0);
        assert_eq!(s.step(1.0), 1.0);
        assert_eq!(s.step(1.0), 0.5);
        assert_eq!(s.learning_rate(), 0.5);
    }

    #[test]
    fn improvements_reset_patience() {
        let mut s = plateau(1, 0.0, 0);
        for metric in [1.0, 0.9, 0.8, 0.7, 0.6] {
            assert_eq!(s.step(metric), 1.0);
        }
        assert_eq!(s.best(), 0.6);
    }

    #[test]
    fn tiny_relative_gains_do_not_count() {
        let mut s = plateau(0, 0.0, 0);
        s.step(1.0);
        assert_eq!(s.step(1.0 - 1e-7), 0.5);
    }

    #[test]
    fn respects_min_lr() {
        let mut s = plateau(0, 0.3, 0);
        s.step(1.0);
        assert_eq!(s.step(1.0), 0.5);
        assert_eq!(s.step(1.0), 0.3);
        assert_eq!(s.step(1.0), 0.3);
    }

    #[test]
    fn cooldown_delays_next_reduction() {
        let mut s = plateau(0, 0.0, 2);
        s.step(1.0);
        assert_eq!(s.step(1.0), 0.5);
        assert_eq!(s.step(1.0), 0.5);
        assert_eq!(s.step(1.0), 0.5);
        assert_eq!(s.step(1.0), 0.25);
    }
}
