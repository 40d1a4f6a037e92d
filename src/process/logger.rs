use crate::process::task_log::{
    LogLine, LoggableTaskType, NativeTaskLog, ProcessTaskLog, RETURN_CODE_UNSET,
};
use std::sync::{Arc, Mutex, PoisonError};

pub type SharedProcessLog = Arc<Mutex<ProcessTaskLog>>;
pub type SharedNativeLog = Arc<Mutex<NativeTaskLog>>;

#[derive(Debug, Clone)]
pub enum LoggedTask {
    Process(SharedProcessLog),
    Native(SharedNativeLog),
}

impl LoggedTask {
    pub fn report(&self, verbose: bool) -> Vec<LogLine> {
        match self {
            LoggedTask::Process(log) => lock(log).report(verbose),
            LoggedTask::Native(log) => lock(log).report(verbose),
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            LoggedTask::Process(log) => lock(log).is_open(),
            LoggedTask::Native(log) => lock(log).is_open(),
        }
    }
}

/// Per-manager store of task logs, in creation order
#[derive(Debug)]
pub struct ManagerLogger {
    manager: String,
    tasks: Mutex<Vec<LoggedTask>>,
}

impl ManagerLogger {
    pub fn new(manager: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn create_process(
        &self,
        task: LoggableTaskType,
        executable: &str,
        arguments: &str,
    ) -> SharedProcessLog {
        let log = Arc::new(Mutex::new(ProcessTaskLog::new(
            self.manager.clone(),
            task,
            executable,
            arguments,
        )));
        lock(&self.tasks).push(LoggedTask::Process(Arc::clone(&log)));
        log
    }

    pub fn create_native(&self, task: LoggableTaskType) -> SharedNativeLog {
        let log = Arc::new(Mutex::new(NativeTaskLog::new(self.manager.clone(), task)));
        lock(&self.tasks).push(LoggedTask::Native(Arc::clone(&log)));
        log
    }

    pub fn tasks(&self) -> Vec<LoggedTask> {
        lock(&self.tasks).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenated reports of every task, oldest first
    pub fn report(&self, verbose: bool) -> Vec<LogLine> {
        self.tasks()
            .iter()
            .flat_map(|task| task.report(verbose))
            .collect()
    }
}

impl Drop for ManagerLogger {
    // Tasks still open when the logger goes away never reported a status
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.iter() {
            let _ = match task {
                LoggedTask::Process(log) => lock(log).close(RETURN_CODE_UNSET).ok(),
                LoggedTask::Native(log) => lock(log).close(RETURN_CODE_UNSET).ok(),
            };
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_are_kept_in_order() {
        let logger = ManagerLogger::new("Npm");
        let first = logger.create_process(LoggableTaskType::FindPackages, "npm", "search x");
        let second = logger.create_native(LoggableTaskType::LoadPackageVersions);

        lock(&first).close(0).unwrap();
        lock(&second).close(0).unwrap();

        let report = logger.report(false);
        let headers: Vec<_> = report
            .iter()
            .filter(|l| l.text.starts_with("Logged"))
            .map(|l| l.text.clone())
            .collect();
        assert_eq!(headers.len(), 2);
        assert!(headers[0].contains("FindPackages"));
        assert!(headers[1].contains("LoadPackageVersions"));
    }

    #[test]
    fn test_open_tasks_are_visible() {
        let logger = ManagerLogger::new("Pip");
        let log = logger.create_process(LoggableTaskType::ListUpdates, "pip", "list");
        assert!(logger.tasks()[0].is_open());
        lock(&log).close(1).unwrap();
        assert!(!logger.tasks()[0].is_open());
    }
}
