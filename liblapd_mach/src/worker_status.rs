/// Pipeline stage a worker is in, used to pick the progress bar style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Reading,
    Reducing,
    Writing,
    Done,
}

impl Stage {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Reducing => "reducing",
            Self::Writing => "writing",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_name: String,
    pub file_index: usize,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_name: &str, file_index: usize, stage: Stage) -> Self {
        Self {
            progress,
            run_name: run_name.to_string(),
            file_index,
            stage,
        }
    }
}
