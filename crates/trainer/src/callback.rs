//! Early stopping for the boosting loop.

/// Outcome of feeding one round's metric to `EarlyStopping`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStopAction {
    /// New best value this round
    Improved,
    /// No improvement, patience not yet exhausted
    Continue,
    /// `patience` rounds passed without improvement
    Stop,
}

/// Monitors a validation metric and signals when to stop.
///
/// A patience of 0 disables stopping.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    higher_is_better: bool,
    best_value: Option<f64>,
    best_round: usize,
    current_round: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, higher_is_better: bool) -> Self {
        Self {
            patience,
            higher_is_better,
            best_value: None,
            best_round: 0,
            current_round: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.patience > 0
    }

    /// Record the metric of the current round
    pub fn update(&mut self, value: f64) -> EarlyStopAction {
        let improved = match self.best_value {
            None => !value.is_nan(),
            Some(best) if self.higher_is_better => value > best,
            Some(best) => value < best,
        };

        let round = self.current_round;
        self.current_round += 1;

        if improved {
            self.best_value = Some(value);
            self.best_round = round;
            return EarlyStopAction::Improved;
        }

        if self.is_enabled() && round - self.best_round >= self.patience {
            EarlyStopAction::Stop
        } else {
            EarlyStopAction::Continue
        }
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Zero-based round of the best value
    pub fn best_round(&self) -> usize {
        self.best_round
    }
}
