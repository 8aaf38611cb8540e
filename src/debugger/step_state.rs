/// What the controller is busy with. Being halted is a property of the machine,
/// commands are still accepted while it is.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    #[default]
    AwaitingCommand,
    SingleStepping,
    Running,
    ProgramEditing,
    AssemblyEditing,
}

/// State of execution. Used to step per-instruction and to stop a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepState {
    /// Cleared while running, forced back on by anything that stops a run
    pub step_mode: bool,
    pub state: ControllerState,
}

impl Default for StepState {
    fn default() -> Self {
        Self {
            step_mode: true,
            state: ControllerState::AwaitingCommand,
        }
    }
}

impl StepState {
    pub fn step(&mut self) {
        self.step_mode = true;
        self.state = ControllerState::SingleStepping;
    }

    pub fn run(&mut self) {
        self.step_mode = false;
        self.state = ControllerState::Running;
    }

    /// Stop running, the next instruction only executes when asked to.
    pub fn pause(&mut self) {
        self.step_mode = true;
    }

    pub fn enter(&mut self, state: ControllerState) {
        self.state = state;
    }

    /// Back to the command prompt.
    pub fn finish(&mut self) {
        self.state = ControllerState::AwaitingCommand;
    }

    pub fn is_running(&self) -> bool {
        self.state == ControllerState::Running && !self.step_mode
    }
}
