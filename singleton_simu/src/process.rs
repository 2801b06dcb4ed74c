//! シミュレータ上で動作するプロセス.
use futures::task::noop_waker_ref;
use futures::Stream;
use prometrics::metrics::MetricBuilder;
use singleton::election::ElectionResult;
use singleton::node::Member;
use singleton::service::ServiceId;
use singleton::{CoordinatorOptions, ElectionCoordinator, Event};
use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::io::{DeterministicIo, DeterministicIoBuilder};
use crate::service::{RunningServices, ServiceFactory};
use crate::types::LogicalDuration;
use crate::{Logger, Result};

/// シミュレータ上で使われるコーディネータ.
pub type Coordinator = ElectionCoordinator<DeterministicIo, ServiceFactory>;

/// プロセス.
///
/// いわゆるOSの"プロセス"とは異なり、
/// シミュレータ上で使用される実行単位に過ぎない.
///
/// 各プロセスは、一つのクラスタメンバに対応し、
/// 全てのサービスについて、それぞれのコーディネータを有する.
pub struct Process {
    logger: Logger,
    member: Member,
    services: Vec<ServiceId>,
    options: CoordinatorOptions,
    builder: DeterministicIoBuilder,
    running: RunningServices,
    state: ProcessState,
}
impl Process {
    /// 新しい`Process`インスタンスを生成し、クラスタに参加させる.
    pub fn new(
        logger: Logger,
        member: Member,
        services: Vec<ServiceId>,
        options: CoordinatorOptions,
        builder: DeterministicIoBuilder,
        running: RunningServices,
    ) -> Result<Self> {
        let mut process = Process {
            logger,
            member,
            services,
            options,
            builder,
            running,
            state: ProcessState::Down(Down { restart: 0 }),
        };
        track!(process.start())?;
        Ok(process)
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.state, ProcessState::Alive(_))
    }

    /// `service`のコーディネータを返す.
    ///
    /// プロセスがダウンしている場合には`None`が返される.
    pub fn coordinator(&self, service: &ServiceId) -> Option<&Coordinator> {
        match self.state {
            ProcessState::Alive(ref s) => s.coordinators.get(service),
            ProcessState::Down(_) => None,
        }
    }

    /// `service`に立候補中かどうかを判定する.
    pub fn is_candidate(&self, service: &ServiceId) -> bool {
        match self.state {
            ProcessState::Alive(ref s) => {
                s.coordinators.contains_key(service) && !s.withdrawn.contains(service)
            }
            ProcessState::Down(_) => false,
        }
    }

    /// プロセスをクラッシュさせる.
    ///
    /// 稼働中のサービスは停止処理を経ずに消え、`restart`経過後に再起動する.
    pub fn terminate(&mut self, restart: LogicalDuration) {
        match self.state {
            ProcessState::Alive(_) => {
                log!(
                    self.logger,
                    "Terminated: This will restart after {}",
                    restart
                );
                self.state = ProcessState::Down(Down { restart });
                self.builder.leave(self.member.id());
                self.running.crash(self.member.id());
            }
            ProcessState::Down(_) => log!(self.logger, "Already terminated"),
        }
    }

    /// `service`への立候補状態を反転させる.
    pub fn toggle_candidacy(&mut self, service: &ServiceId) -> Result<()> {
        match self.state {
            ProcessState::Alive(ref mut s) => {
                if let Some(coordinator) = s.coordinators.get_mut(service) {
                    if s.withdrawn.remove(service) {
                        log!(self.logger, "Register: service={}", service);
                        track!(coordinator.register())?;
                    } else {
                        log!(self.logger, "Withdraw: service={}", service);
                        s.withdrawn.insert(service.clone());
                        track!(coordinator.withdraw())?;
                    }
                }
            }
            ProcessState::Down(_) => {
                log!(self.logger, "Cannot toggle candidacy; This process is down");
            }
        }
        Ok(())
    }

    /// プロセスを一単位時間分だけ進める.
    ///
    /// 再起動した場合には`true`が返される.
    pub fn step(&mut self, events: &mut Vec<(ServiceId, Event)>) -> Result<bool> {
        if let ProcessState::Down(ref mut s) = self.state {
            if s.restart > 0 {
                s.restart -= 1;
                return Ok(false);
            }
            log!(self.logger, "Restarted");
            track!(self.start())?;
            return Ok(true);
        }
        if let ProcessState::Alive(ref mut s) = self.state {
            track!(s.poll(events))?;
        }
        Ok(false)
    }

    fn start(&mut self) -> Result<()> {
        self.builder.join(&self.member);
        let mut coordinators = BTreeMap::new();
        for service in &self.services {
            let mut logger = self.logger.clone();
            logger.set_service(service.clone());
            let io = self.builder.build(&self.member, service);
            let factory =
                ServiceFactory::new(logger.clone(), self.member.id().clone(), self.running.clone());
            let mut coordinator = track!(ElectionCoordinator::new(
                service.clone(),
                self.member.clone(),
                self.options.clone(),
                io,
                factory,
                &MetricBuilder::new(),
            ))?;
            coordinator.set_election_listener(
                move |_: &ServiceId, previous: &ElectionResult, current: &ElectionResult| {
                    log!(logger, "Elected: {:?} => {:?}", previous, current);
                    Ok(())
                },
            );
            coordinators.insert(service.clone(), coordinator);
        }
        self.state = ProcessState::Alive(Alive {
            coordinators,
            withdrawn: BTreeSet::new(),
        });
        Ok(())
    }
}

enum ProcessState {
    Alive(Alive),
    Down(Down),
}

struct Down {
    restart: LogicalDuration,
}

struct Alive {
    coordinators: BTreeMap<ServiceId, Coordinator>,
    withdrawn: BTreeSet<ServiceId>,
}
impl Alive {
    /// 全てのコーディネータを、ペンディングになるまで駆動する.
    fn poll(&mut self, events: &mut Vec<(ServiceId, Event)>) -> Result<()> {
        let mut cx = Context::from_waker(noop_waker_ref());
        for (service, coordinator) in self.coordinators.iter_mut() {
            while let Poll::Ready(item) = Pin::new(&mut *coordinator).poll_next(&mut cx) {
                let event = track!(item.expect("Never fails"))?;
                events.push((service.clone(), event));
            }
        }
        Ok(())
    }
}
