use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimFault {
    #[error("thread `{0}` already exists")]
    ThreadExists(String),
    #[error("unknown thread `{0}`")]
    UnknownThread(String),
    #[error("thread `{0}` was already joined")]
    AlreadyJoined(String),
    #[error("unknown lock `{0}`")]
    UnknownLock(String),
    #[error("lock `{0}` is not held")]
    LockNotHeld(String),
    #[error("process `{0}` already exists")]
    ProcessExists(String),
    #[error("unknown process `{0}`")]
    UnknownProcess(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub name: String,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub name: String,
    pub priority: i64,
    pub delay_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockRecord {
    pub name: String,
    pub held: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub name: String,
    pub priority: i64,
}

/// Nothing here runs in parallel; records advance in program order.
#[derive(Debug, Default)]
pub struct Simulator {
    threads: IndexMap<String, ThreadRecord>,
    locks: IndexMap<String, LockRecord>,
    tasks: IndexMap<String, TaskRecord>,
    processes: IndexMap<String, ProcessRecord>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_thread(&mut self, name: &str) -> Result<(), SimFault> {
        if self.threads.contains_key(name) {
            return Err(SimFault::ThreadExists(name.to_string()));
        }
        self.threads.insert(
            name.to_string(),
            ThreadRecord {
                name: name.to_string(),
                alive: true,
            },
        );
        Ok(())
    }

    pub fn join_thread(&mut self, name: &str) -> Result<(), SimFault> {
        match self.threads.get_mut(name) {
            Some(thread) if thread.alive => {
                thread.alive = false;
                Ok(())
            }
            Some(_) => Err(SimFault::AlreadyJoined(name.to_string())),
            None => Err(SimFault::UnknownThread(name.to_string())),
        }
    }

    pub fn acquire_lock(&mut self, name: &str) {
        let record = self.locks.entry(name.to_string()).or_insert_with(|| LockRecord {
            name: name.to_string(),
            held: false,
        });
        record.held = true;
    }

    pub fn release_lock(&mut self, name: &str) -> Result<(), SimFault> {
        match self.locks.get_mut(name) {
            Some(lock) if lock.held => {
                lock.held = false;
                Ok(())
            }
            Some(_) => Err(SimFault::LockNotHeld(name.to_string())),
            None => Err(SimFault::UnknownLock(name.to_string())),
        }
    }

    /// Re-scheduling a task updates it in place, keeping its queue position.
    pub fn schedule_task(&mut self, name: &str, delay_seconds: f64, priority: i64) {
        self.tasks.insert(
            name.to_string(),
            TaskRecord {
                name: name.to_string(),
                priority,
                delay_seconds,
            },
        );
    }

    /// Shortest delay first; ties break by priority, then scheduling order.
    pub fn start_tasks(&mut self) -> Vec<TaskRecord> {
        let mut due: Vec<TaskRecord> = self.tasks.drain(..).map(|(_, task)| task).collect();
        due.sort_by(|a, b| {
            a.delay_seconds
                .total_cmp(&b.delay_seconds)
                .then_with(|| b.priority.cmp(&a.priority))
        });
        due
    }

    pub fn create_process(&mut self, name: &str, priority: i64) -> Result<(), SimFault> {
        if self.processes.contains_key(name) {
            return Err(SimFault::ProcessExists(name.to_string()));
        }
        self.processes.insert(
            name.to_string(),
            ProcessRecord {
                name: name.to_string(),
                priority,
            },
        );
        Ok(())
    }

    pub fn terminate_process(&mut self, name: &str) -> Result<(), SimFault> {
        match self.processes.shift_remove(name) {
            Some(_) => Ok(()),
            None => Err(SimFault::UnknownProcess(name.to_string())),
        }
    }

    pub fn thread(&self, name: &str) -> Option<&ThreadRecord> {
        self.threads.get(name)
    }

    pub fn lock(&self, name: &str) -> Option<&LockRecord> {
        self.locks.get(name)
    }

    pub fn process(&self, name: &str) -> Option<&ProcessRecord> {
        self.processes.get(name)
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }
}
