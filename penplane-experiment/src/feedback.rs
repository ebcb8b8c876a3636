use crate::config::{ExperimentConfig, FeedbackMode};
use crate::hysteresis::BinHysteresis;
use penplane_core::FeedbackCommand;

/// Turns the per-frame contact position into actuator commands.
#[derive(Debug, Clone)]
pub struct FeedbackController {
    mode: FeedbackMode,
    bins: BinHysteresis,
    driving: bool,
}

impl FeedbackController {
    pub fn new(mode: FeedbackMode, bins: BinHysteresis) -> Self {
        Self {
            mode,
            bins,
            driving: false,
        }
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(
            config.feedback,
            BinHysteresis::new(config.local_bins(), config.hysteresis_fraction),
        )
    }

    pub fn mode(&self) -> FeedbackMode {
        self.mode
    }

    pub fn is_driving(&self) -> bool {
        self.driving
    }

    /// The frame carried no usable geometry. Bin tracking restarts from the
    /// next known position; a continuous drive is held as it is.
    pub fn position_unknown(&mut self) {
        self.bins.reset();
    }

    /// `contact_x` is local `x` while the pen touches the display, `None`
    /// when it is lifted or off the display.
    pub fn observe(&mut self, contact_x: Option<f64>) -> Option<FeedbackCommand> {
        match self.mode {
            FeedbackMode::Off => None,
            FeedbackMode::MotionCoupled => self
                .bins
                .observe(contact_x)
                .map(|_| FeedbackCommand::FireBurst),
            FeedbackMode::Continuous => match (contact_x.is_some(), self.driving) {
                (true, false) => {
                    self.driving = true;
                    Some(FeedbackCommand::StartContinuous)
                }
                (false, true) => {
                    self.driving = false;
                    Some(FeedbackCommand::StopContinuous)
                }
                _ => None,
            },
        }
    }

    /// Command needed to leave the actuator idle at session end.
    pub fn finish(&mut self) -> Option<FeedbackCommand> {
        self.bins.reset();
        if self.driving {
            self.driving = false;
            Some(FeedbackCommand::StopContinuous)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BinConfig;

    fn controller(mode: FeedbackMode) -> FeedbackController {
        let bins = BinConfig {
            count: 10,
            range_min_mm: 0.0,
            range_max_mm: 100.0,
        };
        FeedbackController::new(mode, BinHysteresis::new(bins, 0.3))
    }

    #[test]
    fn off_never_commands() {
        let mut c = controller(FeedbackMode::Off);
        for x in [Some(1.0), Some(50.0), None, Some(99.0)] {
            assert_eq!(c.observe(x), None);
        }
        assert_eq!(c.finish(), None);
    }

    #[test]
    fn continuous_is_edge_triggered() {
        let mut c = controller(FeedbackMode::Continuous);
        let trace = [None, Some(10.0), Some(11.0), Some(12.0), None, None, Some(3.0)];
        let got: Vec<_> = trace.iter().map(|x| c.observe(*x)).collect();
        assert_eq!(
            got,
            vec![
                None,
                Some(FeedbackCommand::StartContinuous),
                None,
                None,
                Some(FeedbackCommand::StopContinuous),
                None,
                Some(FeedbackCommand::StartContinuous),
            ]
        );
        assert_eq!(c.finish(), Some(FeedbackCommand::StopContinuous));
        assert_eq!(c.finish(), None);
    }

    #[test]
    fn motion_coupled_bursts_on_bin_changes() {
        let mut c = controller(FeedbackMode::MotionCoupled);
        assert_eq!(c.observe(Some(5.0)), None);
        assert_eq!(c.observe(Some(15.0)), Some(FeedbackCommand::FireBurst));
        assert_eq!(c.observe(Some(16.0)), None);
        assert_eq!(c.observe(None), None);
        assert_eq!(c.observe(Some(45.0)), None);
        assert_eq!(c.observe(Some(55.0)), Some(FeedbackCommand::FireBurst));
    }

    #[test]
    fn unknown_position_holds_continuous_drive() {
        let mut c = controller(FeedbackMode::Continuous);
        assert_eq!(c.observe(Some(10.0)), Some(FeedbackCommand::StartContinuous));
        c.position_unknown();
        assert!(c.is_driving());
        assert_eq!(c.observe(Some(10.0)), None);
    }

    #[test]
    fn unknown_position_rebaselines_bins() {
        let mut c = controller(FeedbackMode::MotionCoupled);
        c.observe(Some(5.0));
        c.position_unknown();
        assert_eq!(c.observe(Some(75.0)), None);
        assert_eq!(c.observe(Some(85.0)), Some(FeedbackCommand::FireBurst));
    }
}
