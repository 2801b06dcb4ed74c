use futures::Stream;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tracing::error;

pub use self::common::Common;

use crate::coordinator::Event;
use crate::election::{ElectionResult, Role};
use crate::message::Notification;
use crate::service::ManagedServiceFactory;
use crate::{Io, Result};

mod common;
mod dispatcher;

/// ローカルメンバ用の状態(状態機械).
///
/// 状態の定義は`RoleState`であり、`Inactive`, `Backup`, `Primary`の三つがある.
/// 一つのサービスに関する通知は、このインスタンスの中で逐次的に処理される.
pub struct NodeState<IO: Io, F: ManagedServiceFactory> {
    pub common: Common<IO>,
    pub role: RoleState<F::Instance>,
    pub factory: F,
}
impl<IO: Io, F: ManagedServiceFactory> NodeState<IO, F> {
    pub fn new(common: Common<IO>, factory: F) -> Self {
        let node = NodeState {
            common,
            role: RoleState::Inactive,
            factory,
        };
        node.common.publish(Role::Inactive);
        node
    }

    /// 通知を処理する.
    ///
    /// 管理対象サービスの起動ないし停止に失敗した場合にはエラーが返されるが、
    /// その場合でも役割や選出結果の更新は完了している.
    pub fn handle_notification(&mut self, notification: Notification) -> Result<()> {
        match notification {
            Notification::ViewChanged(view) => {
                self.common.set_view(view);
                track!(self.reelect())
            }
            Notification::CandidatesChanged(providers) => {
                self.common.set_providers(providers);
                track!(self.reelect())
            }
            Notification::Command(command) => {
                if let Some(result) = self.common.accept_command(&command) {
                    track!(self.commit(result))?;
                }
                Ok(())
            }
        }
    }

    /// 選出をやり直し、結果を確定させた上で、必要なコマンドを送信する.
    pub fn reelect(&mut self) -> Result<()> {
        let current = self.common.elect();
        let previous = self.common.result().clone();
        let committed = track!(self.commit(current));
        self.common.dispatch_commands(&previous);
        committed
    }

    /// 立候補を取り下げる.
    ///
    /// プライマリであった場合には、登録を閉じる前にサービスを停止する.
    pub fn withdraw(&mut self) -> Result<()> {
        if let Some(registration) = self.common.unregister() {
            let reelected = track!(self.reelect());
            track!(self.common.close_registration(registration))?;
            reelected
        } else {
            Ok(())
        }
    }

    /// 選出結果を確定させる.
    ///
    /// ローカルで停止が必要な場合には、他の全ての処理に先立って停止が行われる.
    /// 起動が必要な場合には、起動が完了した後に、ファサードの状態が更新される.
    fn commit(&mut self, current: ElectionResult) -> Result<()> {
        let previous = self.common.set_result(current);
        let old_role = self.role.role();
        let new_role = self.common.role_for(self.common.result());
        let transited = track!(self.transit(new_role));
        if previous != *self.common.result() || old_role != new_role {
            self.common.record_election(&previous);
        }
        self.common.publish(self.role.role());
        transited
    }

    fn transit(&mut self, new_role: Role) -> Result<()> {
        let old_role = self.role.role();
        if old_role == new_role {
            return Ok(());
        }

        let mut outcome = Ok(());
        if let RoleState::Primary { instance } = mem::replace(&mut self.role, RoleState::Inactive)
        {
            if let Some(instance) = instance {
                if let Err(e) = self.factory.stop(instance) {
                    self.common.metrics().service_failures_total.increment();
                    error!(
                        service = %self.common.service(),
                        member = %self.common.local(),
                        "Cannot stop the managed service: {}",
                        e
                    );
                    outcome = Err(track!(e));
                }
            }
        }

        self.role = match new_role {
            Role::Inactive => RoleState::Inactive,
            Role::Backup => RoleState::Backup,
            Role::Primary => {
                let started_at = Instant::now();
                match self.factory.start(self.common.service()) {
                    Ok(instance) => {
                        let elapsed = started_at.elapsed().as_secs_f64();
                        self.common
                            .metrics()
                            .activation_duration_seconds
                            .observe(elapsed);
                        RoleState::Primary {
                            instance: Some(instance),
                        }
                    }
                    Err(e) => {
                        self.common.metrics().service_failures_total.increment();
                        error!(
                            service = %self.common.service(),
                            member = %self.common.local(),
                            "Cannot start the managed service: {}",
                            e
                        );
                        if outcome.is_ok() {
                            outcome = Err(track!(e));
                        }
                        RoleState::Primary { instance: None }
                    }
                }
            }
        };
        self.common.record_transition(old_role, new_role);
        outcome
    }
}
// フィールドが構造的にピン留めされることはない.
impl<IO: Io, F: ManagedServiceFactory> Unpin for NodeState<IO, F> {}
impl<IO: Io, F: ManagedServiceFactory> Stream for NodeState<IO, F> {
    type Item = Result<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(e) = this.common.next_event() {
                return Poll::Ready(Some(Ok(e)));
            }

            this.common.poll_dispatches(cx);
            if let Some(e) = this.common.next_event() {
                return Poll::Ready(Some(Ok(e)));
            }

            match track!(this.common.try_recv_notification(cx)) {
                Err(e) => return Poll::Ready(Some(Err(e))),
                Ok(None) => return Poll::Pending,
                Ok(Some(notification)) => {
                    if let Err(e) = track!(this.handle_notification(notification)) {
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }
        }
    }
}

/// 各役割固有の状態.
pub enum RoleState<T> {
    /// 候補者ではない.
    Inactive,

    /// 候補者だが選出されていない.
    Backup,

    /// 選出されている.
    ///
    /// サービスの起動に失敗した場合には`instance`は`None`となる.
    Primary { instance: Option<T> },
}
impl<T> RoleState<T> {
    pub fn role(&self) -> Role {
        match *self {
            RoleState::Inactive => Role::Inactive,
            RoleState::Backup => Role::Backup,
            RoleState::Primary { .. } => Role::Primary,
        }
    }
}
