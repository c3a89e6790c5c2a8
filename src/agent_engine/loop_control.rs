/// Step budget for one run.
pub struct LoopController {
    max_steps: u32,
    step: u32,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        Self { max_steps, step: 0 }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn record_step(&mut self) {
        self.step += 1;
    }

    pub fn is_capped(&self) -> bool {
        self.step >= self.max_steps
    }
}
