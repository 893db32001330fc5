// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Task-contract integration tests against real processes.
//!
//! A shell-backed helper task stands in for the production tasks; the
//! supervised processes are real, so these tests cover the full
//! run/status/terminate path including PID files and advisory locks.

use vchassis_node::{NodeResult, Task, TaskState};
use std::path::Path;
use supervisor::Supervisor;
use topology::CmdLine;

#[derive(Debug)]
struct HelperTask {
    name: &'static str,
    priority: u8,
    script: String,
    supervisor: Supervisor,
}

impl HelperTask {
    fn new(
        name: &'static str,
        priority: u8,
        script: impl Into<String>,
        workspace: &Path,
    ) -> HelperTask {
        HelperTask {
            name,
            priority,
            script: script.into(),
            supervisor: Supervisor::new(name, workspace),
        }
    }
}

impl Task for HelperTask {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    fn terminate(&self) -> NodeResult<()> {
        // Record teardown order the same way the script records startup.
        let marker = self
            .supervisor
            .log_path()
            .with_file_name("order.log");
        if marker.exists() {
            let mut contents = std::fs::read_to_string(&marker).unwrap();
            contents.push_str(&format!("stop {}\n", self.name));
            std::fs::write(&marker, contents).unwrap();
        }
        self.supervisor().stop()?;
        Ok(())
    }

    fn command(&self) -> NodeResult<CmdLine> {
        let mut cmd = CmdLine::new("sh");
        cmd.opt("-c", self.script.clone());
        Ok(cmd)
    }
}

fn long_runner(name: &'static str, priority: u8, workspace: &Path) -> HelperTask {
    let order = workspace.join("order.log").display().to_string();
    HelperTask::new(
        name,
        priority,
        format!("echo start {name} >> {order}; exec sleep 30"),
        workspace,
    )
}

#[test]
fn run_is_idempotent_and_status_tracks_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let task = HelperTask::new("worker", 2, "exec sleep 30", dir.path());

    assert_eq!(task.status().unwrap(), TaskState::Stopped);
    task.run().unwrap();
    let TaskState::Running { pid } = task.status().unwrap() else {
        panic!("task should be running");
    };

    // A second run observes the live process instead of spawning another.
    task.run().unwrap();
    assert_eq!(task.status().unwrap(), TaskState::Running { pid });

    task.terminate().unwrap();
    assert_eq!(task.status().unwrap(), TaskState::Stopped);
    // Terminating a stopped task is an idempotent success.
    task.terminate().unwrap();
}

#[test]
fn tasks_start_ascending_and_stop_descending() {
    let dir = tempfile::tempdir().unwrap();
    // Assembled out of order on purpose; priority decides, as it does for
    // the production task set.
    let mut tasks: Vec<Box<dyn Task>> = vec![
        Box::new(long_runner("compute", 2, dir.path())),
        Box::new(long_runner("bridge", 0, dir.path())),
        Box::new(long_runner("bmc", 1, dir.path())),
    ];
    tasks.sort_by_key(|task| task.priority());

    for task in &tasks {
        task.run().unwrap();
    }
    for task in tasks.iter().rev() {
        task.terminate().unwrap();
    }

    let order = std::fs::read_to_string(dir.path().join("order.log")).unwrap();
    let lines: Vec<&str> = order.lines().collect();
    assert_eq!(
        lines,
        vec![
            "start bridge",
            "start bmc",
            "start compute",
            "stop compute",
            "stop bmc",
            "stop bridge",
        ]
    );
    for task in &tasks {
        assert_eq!(task.status().unwrap(), TaskState::Stopped);
    }
}

#[test]
fn restart_cycle_leaves_workspace_data_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let seeded = dir.path().join("sata0-0.img");
    std::fs::write(&seeded, b"precious bytes").unwrap();

    let task = HelperTask::new("worker", 2, "exec sleep 30", dir.path());
    task.run().unwrap();
    task.terminate().unwrap();
    task.run().unwrap();
    task.terminate().unwrap();

    let contents = std::fs::read(&seeded).unwrap();
    assert_eq!(contents, b"precious bytes");
}
