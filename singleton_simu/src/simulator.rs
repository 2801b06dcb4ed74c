use rand::Rng;
use singleton::election::Role;
use singleton::node::NodeId;
use singleton::service::ServiceId;
use singleton::{CoordinatorOptions, Event};
use std::collections::BTreeMap;

use crate::io::DeterministicIoBuilder;
use crate::process::Process;
use crate::service::RunningServices;
use crate::types::{LogicalTime, SharedClock, SharedRng};
use crate::{ErrorKind, Logger, Result, SimulatorConfig};

/// シミュレータ.
///
/// 各ループでは、設定された確率に従ってノードのクラッシュや立候補の反転を発生させた上で、
/// 全てのプロセスを一単位時間分だけ進める.
///
/// トポロジーの変化が`settle_ticks`の間途絶えた時点で、各サービスについて以下を検査する:
///
/// - プライマリを報告している生存メンバは高々一つ
/// - サービスが稼働しているメンバは高々一つ
/// - 生存している全ての候補者が、同じプライマリに合意している
/// - 候補者数がクォーラムを満たしているなら、プライマリはちょうど一つ(満たさないなら零)
pub struct Simulator {
    config: SimulatorConfig,
    options: CoordinatorOptions,
    rng: SharedRng,
    clock: SharedClock,
    processes: BTreeMap<NodeId, Process>,
    services: Vec<ServiceId>,
    running: RunningServices,
    last_change: LogicalTime,
    checks: usize,
    logger: Logger,
}
impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        track_assert!(
            config.has_deterministic_policy(),
            ErrorKind::InvalidInput,
            "A seedless random policy cannot be checked for agreement"
        );
        track_assert!(!config.nodes.is_empty(), ErrorKind::InvalidInput);
        let options = track!(config.election.build())?;
        let rng = config.make_rng();
        let clock = SharedClock::new();
        let builder = DeterministicIoBuilder::new(
            config.io.channel.clone(),
            config.io.registry.clone(),
            rng.clone(),
            clock.clone(),
        );
        let running = RunningServices::new();
        let services = config.services();

        let mut logger = Logger::new();
        logger.set_indent(1);
        let mut processes = BTreeMap::new();
        for member in config.members() {
            let mut process_logger = logger.clone();
            process_logger.set_id(member.id().clone());
            let process = track!(Process::new(
                process_logger,
                member.clone(),
                services.clone(),
                options.clone(),
                builder.clone(),
                running.clone(),
            ))?;
            processes.insert(member.id().clone(), process);
        }
        Ok(Simulator {
            config,
            options,
            rng,
            clock,
            processes,
            services,
            running,
            last_change: 0,
            checks: 0,
            logger,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        println!(
            "Initial members: {:?}",
            self.processes
                .values()
                .map(|p| p.member().to_string())
                .collect::<Vec<_>>()
        );
        for i in 0..self.config.loop_count {
            let result = track!(self.run_once());
            self.flush(i);
            result?;
        }

        let result = track!(self.settle());
        self.flush(self.config.loop_count);
        result?;
        println!(
            "Finished: ticks={}, invariant_checks={}",
            self.clock.now(),
            self.checks
        );
        Ok(())
    }

    /// 不変条件の検査が行われた回数を返す.
    pub fn checks(&self) -> usize {
        self.checks
    }

    fn flush(&mut self, i: usize) {
        if !self.logger.is_empty() {
            println!("# {}:", i);
            println!("{}", self.logger.take_buffer());
        }
    }

    fn run_once(&mut self) -> Result<()> {
        if self.config.node_down.occurred(&mut self.rng) {
            self.terminate_node();
        }
        if self.config.toggle_candidacy.occurred(&mut self.rng) {
            track!(self.toggle_candidacy())?;
        }
        track!(self.step())?;
        if self.clock.now() - self.last_change == self.config.settle_ticks {
            track!(self.check_invariants())?;
        }
        Ok(())
    }

    /// 障害を発生させずに、トポロジーが落ち着くまで進めてから検査を行う.
    fn settle(&mut self) -> Result<()> {
        log!(self.logger, "[SETTLE]");
        while self.clock.now() - self.last_change < self.config.settle_ticks {
            track!(self.step())?;
        }
        track!(self.check_invariants())
    }

    fn step(&mut self) -> Result<()> {
        self.clock.tick();
        let mut events = Vec::new();
        for process in self.processes.values_mut() {
            events.clear();
            if track!(process.step(&mut events))? {
                self.last_change = self.clock.now();
            }
            for (service, event) in &events {
                if let Event::RoleChanged { new_role, .. } = event {
                    log!(
                        self.logger,
                        "[ROLE]\tnode: {}, service: {}, role: {}",
                        process.member().id(),
                        service,
                        new_role
                    );
                }
            }
        }
        Ok(())
    }

    fn terminate_node(&mut self) {
        let i = self.rng.gen_range(0..self.processes.len());
        let restart = self.config.node_restart_interval.choose(&mut self.rng);
        let process = self.processes.values_mut().nth(i).expect("Never fails");
        if process.is_alive() {
            log!(
                self.logger,
                "[TERMINATE]\tnode: {}, restart: {}",
                process.member().id(),
                restart
            );
            process.terminate(restart);
            self.last_change = self.clock.now();
        }
    }

    fn toggle_candidacy(&mut self) -> Result<()> {
        if self.services.is_empty() {
            return Ok(());
        }
        let i = self.rng.gen_range(0..self.processes.len());
        let service = self.services[self.rng.gen_range(0..self.services.len())].clone();
        let process = self.processes.values_mut().nth(i).expect("Never fails");
        if process.is_alive() {
            log!(
                self.logger,
                "[TOGGLE]\tnode: {}, service: {}",
                process.member().id(),
                service
            );
            track!(process.toggle_candidacy(&service))?;
            self.last_change = self.clock.now();
        }
        Ok(())
    }

    fn check_invariants(&mut self) -> Result<()> {
        self.checks += 1;
        for service in &self.services {
            let mut primaries = Vec::new();
            let mut elected = BTreeMap::new();
            for process in self.processes.values() {
                if let Some(coordinator) = process.coordinator(service) {
                    if coordinator.facade().role() == Role::Primary {
                        primaries.push(process.member().id().clone());
                    }
                    if process.is_candidate(service) {
                        let id = coordinator.election_result().elected_id().cloned();
                        elected.insert(process.member().id().clone(), id);
                    }
                }
            }
            log!(
                self.logger,
                "[CHECK]\tservice: {}, primaries: {:?}, candidates: {}",
                service,
                primaries,
                elected.len()
            );

            track_assert!(
                primaries.len() <= 1,
                ErrorKind::InconsistentState,
                "Multiple primaries: service={}, primaries={:?}",
                service,
                primaries
            );

            let running = self.running.running_on(service);
            track_assert!(
                running.len() <= 1,
                ErrorKind::InconsistentState,
                "Service running on multiple members: service={}, running={:?}",
                service,
                running
            );

            let mut agreed = elected.values().collect::<Vec<_>>();
            agreed.dedup();
            track_assert!(
                agreed.len() <= 1,
                ErrorKind::InconsistentState,
                "Candidates disagree: service={}, elected={:?}",
                service,
                elected
            );

            let expected = if elected.len() >= self.options.quorum.as_usize() {
                1
            } else {
                0
            };
            track_assert_eq!(
                primaries.len(),
                expected,
                ErrorKind::InconsistentState,
                "Unexpected number of primaries: service={}, elected={:?}",
                service,
                elected
            );
        }
        Ok(())
    }
}
