/// Progress report sent by a corpus worker after each file it finishes
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub file_name: String,
    pub worker_id: usize,
}

impl WorkerStatus {
    pub fn new(progress: f32, file_name: &str, worker_id: usize) -> Self {
        Self {
            progress,
            file_name: file_name.to_string(),
            worker_id,
        }
    }
}
