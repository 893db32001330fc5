// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Node assembly and lifecycle.

use crate::tasks::{BmcTask, ComputeTask, ConsoleTask, MonitorTask, SerialBridgeTask};
use crate::workspace::Workspace;
use crate::{NodeResult, Task};
use config::node::NodeConfig;
use numa::{CpuTopology, NumaBinder};
use supervisor::TaskState;
use tracing::{debug, info};

/// One simulated machine, assembled from its configuration.
///
/// Construction is fail-fast: validation, normalization and full topology
/// resolution all happen in [`Node::init`], so a node that constructs
/// will not fail later for configuration reasons.
#[derive(Debug)]
pub struct Node {
    name: String,
    workspace: Workspace,
    tasks: Vec<Box<dyn Task>>,
}

impl Node {
    pub fn init(mut config: NodeConfig) -> NodeResult<Node> {
        config.validate()?;
        config.normalize();

        let workspace = Workspace::resolve(&config);
        let ws = workspace.path();
        let namespace = config.namespace.clone();

        // validate() rejected a missing compute section already.
        let compute_section = config.compute.clone().ok_or(config::ConfigError::EmptyCompute)?;

        // The host topology snapshot is only taken when something pins.
        let mut binder = if compute_section.cpu.numa_pinned {
            Some(NumaBinder::new(&CpuTopology::current()?))
        } else {
            None
        };

        let serial_port = config.sol_enabled.then_some(config.bmc.sol_port);
        let mut tasks: Vec<Box<dyn Task>> = Vec::new();

        let serial = SerialBridgeTask::new(ws, config.bmc.sol_port, namespace.clone());
        let serial_device = config.sol_enabled.then(|| serial.pty_link().to_path_buf());
        if config.sol_enabled {
            tasks.push(Box::new(serial));
        }

        tasks.push(Box::new(BmcTask::new(
            &config.name,
            ws,
            config.profile,
            config.bmc.clone(),
            serial_device,
            namespace.clone(),
        )));
        tasks.push(Box::new(ComputeTask::resolve(
            &config.name,
            ws,
            compute_section,
            config.bmc.clone(),
            serial_port,
            namespace.clone(),
            binder.as_mut(),
        )?));
        if config.profile.needs_console() {
            tasks.push(Box::new(ConsoleTask::new(&config.name, ws, namespace.clone())));
        }
        if let Some(monitor) = &config.monitor {
            tasks.push(Box::new(MonitorTask::new(
                &config.name,
                ws,
                monitor.port,
                namespace,
            )));
        }
        tasks.sort_by_key(|task| task.priority());

        debug!(
            "node '{}' assembled with tasks [{}]",
            config.name,
            tasks
                .iter()
                .map(|task| task.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Node {
            name: config.name,
            workspace,
            tasks,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn any_running(&self) -> NodeResult<bool> {
        for task in &self.tasks {
            if matches!(task.status()?, TaskState::Running { .. }) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Verify the environment can run every task.
    ///
    /// A node with anything running is left alone: its environment proved
    /// itself, and rechecking against a live node would report its own
    /// ports as conflicts.
    pub fn precheck(&self) -> NodeResult<()> {
        if self.any_running()? {
            debug!("node '{}' has running tasks; precheck skipped", self.name);
            return Ok(());
        }
        for task in &self.tasks {
            task.precheck()?;
        }
        Ok(())
    }

    /// Start every task in ascending priority order.
    ///
    /// Idempotent through the supervisors: already-running tasks report
    /// success and are left alone.  A task failure aborts the sequence
    /// with lower-priority tasks left running.
    pub fn start(&self) -> NodeResult<()> {
        if !self.any_running()? {
            self.workspace.ensure()?;
        }
        for task in &self.tasks {
            if matches!(task.status()?, TaskState::Running { .. }) {
                debug!("task '{}' already running", task.name());
            } else {
                task.precheck()?;
            }
            task.run()?;
        }
        info!("node '{}' started", self.name);
        Ok(())
    }

    /// Stop every task in descending priority order, so the hypervisor
    /// goes down before the BMC it talks to.
    pub fn stop(&self) -> NodeResult<()> {
        for task in self.tasks.iter().rev() {
            task.terminate()?;
        }
        info!("node '{}' stopped", self.name);
        Ok(())
    }

    /// Observed state of every task, in priority order.
    pub fn status(&self) -> NodeResult<Vec<(String, TaskState)>> {
        let mut states = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            states.push((task.name().to_string(), task.status()?));
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::compute::{ComputeSection, CpuSection, MemorySection};
    use config::node::{MonitorSection, NodeConfigBuilder};
    use config::profile::HardwareProfile;
    use config::ConfigError;
    use crate::NodeError;
    use pretty_assertions::assert_eq;

    fn compute() -> ComputeSection {
        ComputeSection {
            cpu: CpuSection {
                count: 2,
                sockets: 1,
                model: None,
                features: None,
                numa_pinned: false,
            },
            memory: MemorySection { size_mib: 1024 },
            networks: vec![],
            storage_backend: vec![],
            pci_bridge_topology: vec![],
            kvm_enabled: false,
            boot_order: None,
            vnc_display: None,
            smbios: None,
        }
    }

    #[test]
    fn tasks_assemble_in_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfigBuilder::default()
            .name("n0")
            .profile(HardwareProfile::QuantaD51)
            .sol_enabled(true)
            .compute(compute())
            .monitor(MonitorSection { port: 9005 })
            .workspace_root(dir.path().to_path_buf())
            .build()
            .unwrap();
        let node = Node::init(config).unwrap();
        let names: Vec<String> = node
            .status()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec!["serial-bridge", "bmc", "compute", "ipmi-console", "monitor"]
        );
    }

    #[test]
    fn generic_profile_has_no_console() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfigBuilder::default()
            .name("n0")
            .compute(compute())
            .workspace_root(dir.path().to_path_buf())
            .build()
            .unwrap();
        let node = Node::init(config).unwrap();
        let names: Vec<String> = node
            .status()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["bmc", "compute"]);
    }

    #[test]
    fn invalid_config_fails_at_init() {
        let err = Node::init(NodeConfigBuilder::default().name("n0").build().unwrap()).unwrap_err();
        assert!(matches!(err, NodeError::Config(ConfigError::EmptyCompute)));
    }

    #[test]
    fn fresh_node_reports_stopped_and_stops_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfigBuilder::default()
            .name("n0")
            .compute(compute())
            .workspace_root(dir.path().to_path_buf())
            .build()
            .unwrap();
        let node = Node::init(config).unwrap();
        assert!(!node.workspace().exists());
        for (_, state) in node.status().unwrap() {
            assert_eq!(state, TaskState::Stopped);
        }
        // Stopping a node that never started succeeds and creates nothing.
        node.stop().unwrap();
        assert!(!node.workspace().exists());
    }
}
