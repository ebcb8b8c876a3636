use penplane_core::FeedbackCommand;
use tracing::info;

/// Something that turns feedback commands into vibration.
pub trait ActuatorDriver: Send {
    fn apply(&mut self, frame: u64, command: FeedbackCommand) -> anyhow::Result<()>;
}

/// Stand-in driver for sessions without hardware attached.
#[derive(Debug, Default)]
pub struct LoggingActuator {
    pub bursts: usize,
    pub running: bool,
}

impl ActuatorDriver for LoggingActuator {
    fn apply(&mut self, frame: u64, command: FeedbackCommand) -> anyhow::Result<()> {
        match command {
            FeedbackCommand::FireBurst => self.bursts += 1,
            FeedbackCommand::StartContinuous => self.running = true,
            FeedbackCommand::StopContinuous => self.running = false,
        }
        info!("actuator {:?} at frame {}", command, frame);
        Ok(())
    }
}
