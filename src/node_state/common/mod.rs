use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::task::Context;
use tracing::{debug, error, info, warn};

use super::dispatcher::ActivationChannel;
use crate::cluster::{CandidatePool, MembershipView};
use crate::coordinator::{CoordinatorOptions, Event};
use crate::election::{ElectionResult, Role};
use crate::facade::{SingletonFacade, SingletonState};
use crate::io::{Io, Registration};
use crate::listener::ElectionListener;
use crate::message::{ActivationCommand, CommandKind, Notification};
use crate::metrics::CoordinatorMetrics;
use crate::node::{Member, NodeId};
use crate::service::ServiceId;
use crate::Result;

/// 全ての役割に共通する処理をまとめた構造体.
pub struct Common<IO: Io> {
    local: Member,
    service: ServiceId,
    io: IO,
    transport: IO::Transport,
    registration: Option<IO::Registration>,
    view: Option<MembershipView>,
    providers: BTreeSet<Member>,
    pool: CandidatePool,
    result: ElectionResult,
    events: VecDeque<Event>,
    facade: SingletonFacade,
    listener: Option<Box<dyn ElectionListener>>,
    channel: ActivationChannel,
    options: CoordinatorOptions,
    metrics: CoordinatorMetrics,
}
impl<IO: Io> Common<IO> {
    /// 新しい`Common`インスタンスを生成し、ローカルメンバの立候補を登録する.
    pub fn new(
        service: ServiceId,
        local: Member,
        mut io: IO,
        options: CoordinatorOptions,
        metrics: CoordinatorMetrics,
    ) -> Result<Self> {
        let registration = track!(io.register_candidacy(&service, &local))?;
        let transport = io.transport();
        Ok(Common {
            facade: SingletonFacade::new(service.clone()),
            local,
            service,
            io,
            transport,
            registration: Some(registration),
            view: None,
            providers: BTreeSet::new(),
            pool: CandidatePool::default(),
            result: ElectionResult::default(),
            events: VecDeque::new(),
            listener: None,
            channel: ActivationChannel::new(),
            options,
            metrics,
        })
    }

    pub fn local(&self) -> &Member {
        &self.local
    }

    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    pub fn result(&self) -> &ElectionResult {
        &self.result
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    pub fn facade(&self) -> &SingletonFacade {
        &self.facade
    }

    pub fn metrics(&self) -> &CoordinatorMetrics {
        &self.metrics
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    pub fn set_listener(&mut self, listener: Box<dyn ElectionListener>) {
        self.listener = Some(listener);
    }

    /// 次に通知すべきイベントがあれば取り出す.
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn try_recv_notification(&mut self, cx: &mut Context) -> Result<Option<Notification>> {
        track!(self.io.try_recv_notification(cx))
    }

    pub fn set_view(&mut self, view: MembershipView) {
        self.view = Some(view);
    }

    pub fn set_providers(&mut self, providers: Vec<Member>) {
        self.providers = providers.into_iter().collect();
    }

    /// 立候補を再登録する.
    ///
    /// ローカルメンバがプールに加わるのは、登録後の通知を受け取った時点となる.
    pub fn register(&mut self) -> Result<()> {
        if self.registration.is_none() {
            let registration = track!(self.io.register_candidacy(&self.service, &self.local))?;
            self.registration = Some(registration);
            info!(service = %self.service, member = %self.local, "Candidacy registered");
        }
        Ok(())
    }

    /// 立候補の取り下げを開始する.
    ///
    /// ローカルメンバはプロバイダ群から即座に除外され、取り下げ前の登録ハンドルが返される.
    /// 呼び出し側は、サービスを停止した後にハンドルを閉じる必要がある.
    pub fn unregister(&mut self) -> Option<IO::Registration> {
        let local = self.local.id().clone();
        self.providers.retain(|m| *m.id() != local);
        self.registration.take()
    }

    pub fn close_registration(&mut self, registration: IO::Registration) -> Result<()> {
        track!(registration.close())?;
        info!(service = %self.service, member = %self.local, "Candidacy withdrawn");
        Ok(())
    }

    /// 現在のビューとプロバイダ群から選出をやり直す.
    ///
    /// 選出されるメンバが変わった場合にのみ、エポックが進められる.
    /// プールが変化していない場合には、現在の選出結果がそのまま返される.
    pub fn elect(&mut self) -> ElectionResult {
        let pool = CandidatePool::new(self.view.as_ref(), &self.providers);
        if pool == self.pool {
            return self.result.clone();
        }
        self.pool = pool;

        let quorum = self.options.quorum;
        let elected = if !quorum.admit(self.pool.members()) {
            self.metrics.no_quorum_total.increment();
            if !self.pool.is_empty() {
                warn!(
                    service = %self.service,
                    candidates = self.pool.len(),
                    quorum = quorum.as_usize(),
                    "Quorum not reached: no primary will be elected"
                );
            }
            None
        } else {
            if quorum.is_fragile(self.pool.len()) {
                warn!(
                    service = %self.service,
                    quorum = quorum.as_usize(),
                    "Quorum just reached: one more departure will leave the service without a primary"
                );
            }
            let elected = self.options.policy.elect(self.pool.members());
            if elected.is_none() {
                warn!(service = %self.service, candidates = self.pool.len(), "No primary elected");
            }
            elected
        };

        if elected == self.result.elected {
            self.result.clone()
        } else {
            ElectionResult {
                elected,
                epoch: self.result.epoch.next(),
            }
        }
    }

    /// 受信したコマンドを検査して、適用すべき選出結果を返す.
    ///
    /// 他サービス宛、他メンバ宛、古いエポック、プールの不一致、のいずれかに該当するコマンドは
    /// 破棄され`None`が返される.
    pub fn accept_command(&mut self, command: &ActivationCommand) -> Option<ElectionResult> {
        let reason = if command.service != self.service {
            Some("foreign service")
        } else if command.target != *self.local.id() {
            Some("misaddressed")
        } else if command.epoch <= self.result.epoch {
            Some("stale epoch")
        } else if !self.is_same_pool(&command.candidates) {
            Some("candidate pool mismatch")
        } else if command.kind == CommandKind::Activate && !self.is_registered() {
            Some("not a candidate")
        } else {
            None
        };
        if let Some(reason) = reason {
            self.metrics.stale_commands_total.increment();
            debug!(
                service = %self.service,
                member = %self.local,
                epoch = %command.epoch,
                origin = %command.origin,
                reason,
                "Command discarded: {:?}",
                command.kind
            );
            return None;
        }

        let elected = match command.kind {
            CommandKind::Activate => Some(self.local.clone()),
            CommandKind::Deactivate => command.primary.clone(),
        };
        Some(ElectionResult {
            elected,
            epoch: command.epoch,
        })
    }

    fn is_same_pool(&self, candidates: &[NodeId]) -> bool {
        self.pool.len() == candidates.len()
            && self
                .pool
                .members()
                .iter()
                .zip(candidates)
                .all(|(m, id)| m.id() == id)
    }

    /// 選出結果を差し替え、変更前の値を返す.
    pub fn set_result(&mut self, result: ElectionResult) -> ElectionResult {
        self.metrics.epoch.set(result.epoch.as_u64() as f64);
        std::mem::replace(&mut self.result, result)
    }

    /// `result`の下でのローカルメンバの役割を返す.
    pub fn role_for(&self, result: &ElectionResult) -> Role {
        if !self.is_registered() {
            Role::Inactive
        } else if result.is_elected(self.local.id()) {
            Role::Primary
        } else if self.pool.contains(self.local.id()) {
            Role::Backup
        } else {
            Role::Inactive
        }
    }

    /// 役割の遷移を記録する.
    pub fn record_transition(&mut self, old_role: Role, new_role: Role) {
        match new_role {
            Role::Primary => self.metrics.transit_to_primary_total.increment(),
            Role::Backup => self.metrics.transit_to_backup_total.increment(),
            Role::Inactive => self.metrics.transit_to_inactive_total.increment(),
        }
        info!(
            service = %self.service,
            member = %self.local,
            epoch = %self.result.epoch,
            "Role changed: {} -> {}",
            old_role,
            new_role
        );
        self.events.push_back(Event::RoleChanged { old_role, new_role });
    }

    /// 確定した選出結果の変化を記録し、リスナーに通知する.
    pub fn record_election(&mut self, previous: &ElectionResult) {
        let current = self.result.clone();
        if previous.elected != current.elected {
            self.metrics.elections_total.increment();
            info!(
                service = %self.service,
                member = %self.local,
                epoch = %current.epoch,
                "Elected {}",
                current
                    .elected
                    .as_ref()
                    .map_or_else(|| "no primary".to_owned(), |m| m.to_string())
            );
            self.events.push_back(Event::Elected {
                previous: previous.clone(),
                current: current.clone(),
            });
        }
        self.notify_listener(previous, &current);
    }

    fn notify_listener(&mut self, previous: &ElectionResult, current: &ElectionResult) {
        let service = &self.service;
        if let Some(listener) = self.listener.as_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                listener.on_election(service, previous, current)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.listener_failures_total.increment();
                    error!(
                        service = %self.service,
                        member = %self.local,
                        "Election listener failed: {}",
                        e
                    );
                }
                Err(_) => {
                    self.metrics.listener_failures_total.increment();
                    error!(
                        service = %self.service,
                        member = %self.local,
                        "Election listener panicked"
                    );
                }
            }
        }
    }

    /// ファサードに現在の状態を公開する.
    pub fn publish(&self, role: Role) {
        self.facade.publish(SingletonState {
            role,
            result: self.result.clone(),
            providers: self.pool.members().to_vec(),
        });
    }

    /// 選出結果の変化を、影響を受けるメンバに通知する.
    ///
    /// コマンドの重複送信を避けるために、送信を行うのはプールの先頭のメンバのみとなる.
    /// 新しいプライマリには`Activate`を、プールに残っている旧プライマリには`Deactivate`を送る.
    /// ローカルメンバ宛のコマンドは送信されない.
    pub fn dispatch_commands(&mut self, previous: &ElectionResult) {
        if self.pool.first().map(|m| m.id()) != Some(self.local.id()) {
            return;
        }
        let current = self.result.clone();
        if previous.elected == current.elected {
            return;
        }
        if let Some(elected) = current.elected.as_ref() {
            if elected.id() != self.local.id() {
                let command = self.make_command(CommandKind::Activate, elected.id().clone());
                self.dispatch(command);
            }
        }
        if let Some(old) = previous.elected.as_ref() {
            if old.id() != self.local.id() && self.pool.contains(old.id()) {
                let command = self.make_command(CommandKind::Deactivate, old.id().clone());
                self.dispatch(command);
            }
        }
    }

    fn make_command(&self, kind: CommandKind, target: NodeId) -> ActivationCommand {
        ActivationCommand {
            service: self.service.clone(),
            kind,
            origin: self.local.id().clone(),
            target,
            epoch: self.result.epoch,
            primary: self.result.elected.clone(),
            candidates: self.pool.members().iter().map(|m| m.id().clone()).collect(),
        }
    }

    fn dispatch(&mut self, command: ActivationCommand) {
        debug!(
            service = %self.service,
            target = %command.target,
            epoch = %command.epoch,
            "Dispatching {:?} command",
            command.kind
        );
        self.channel.dispatch(&self.transport, command, &self.options.backoff);
    }

    /// 送信中のコマンドの完了を処理する.
    ///
    /// 完了時点でエポックが古くなっているものの結果は破棄される.
    pub fn poll_dispatches(&mut self, cx: &mut Context) {
        for (command, result) in self.channel.poll_completions(cx) {
            if command.epoch < self.result.epoch {
                debug!(
                    service = %self.service,
                    target = %command.target,
                    epoch = %command.epoch,
                    "Stale dispatch completion discarded"
                );
                continue;
            }
            match result {
                Ok(()) => self.metrics.commands_sent_total.increment(),
                Err(e) => {
                    self.metrics.commands_deferred_total.increment();
                    warn!(
                        service = %self.service,
                        target = %command.target,
                        epoch = %command.epoch,
                        attempts = self.options.backoff.attempts(),
                        "Activation deferred: {}",
                        e
                    );
                    self.events.push_back(Event::ActivationDeferred { command });
                }
            }
        }
    }

    pub fn in_flight_commands(&self) -> usize {
        self.channel.in_flight_len()
    }
}
