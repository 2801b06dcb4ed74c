use futures::Stream;
use prometrics::metrics::MetricBuilder;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::election::{ElectionResult, Role};
use crate::facade::SingletonFacade;
use crate::io::Io;
use crate::listener::ElectionListener;
use crate::message::ActivationCommand;
use crate::metrics::SingletonMetrics;
use crate::node::Member;
use crate::node_state::{Common, NodeState};
use crate::policy::{ElectionPolicy, Quorum};
use crate::retry::BackoffSchedule;
use crate::service::{ManagedServiceFactory, ServiceId};
use crate::{Error, Result};

/// コーディネータの実行時オプション.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// 選出ポリシー.
    pub policy: ElectionPolicy,

    /// 選出に必要な最小の候補者数.
    pub quorum: Quorum,

    /// 活性化コマンドの再送間隔.
    pub backoff: BackoffSchedule,
}

/// 一つの論理サービスに関する選出コーディネータ.
///
/// 外部から届く通知(`Io::try_recv_notification`)を逐次的に処理して選出をやり直し、
/// ローカルメンバの役割の変化に応じて、管理対象サービスの起動と停止を行う.
///
/// `ElectionCoordinator`は`Stream`トレイトを実装しているが、
/// これは無限ストリームであり、`Io`がエラーを返した場合を除いて終了することはない.
/// 管理対象サービスの起動や停止に失敗した場合にはエラー要素が返されるが、
/// ストリーム自体はその後も継続して利用可能である.
///
/// 異なるサービスのコーディネータ同士は状態を一切共有しないので、並行して動作させて構わない.
pub struct ElectionCoordinator<IO: Io, F: ManagedServiceFactory> {
    node: NodeState<IO, F>,
    metrics: Arc<SingletonMetrics>,
}
impl<IO: Io, F: ManagedServiceFactory> ElectionCoordinator<IO, F> {
    /// `service`に関するローカルメンバ`local`用のコーディネータを生成する.
    ///
    /// 生成時に`Io::register_candidacy`によって立候補が登録されるが、
    /// ローカルメンバが候補者として扱われるのは、それを含むプロバイダ群の通知を受け取った以降となる.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        service: ServiceId,
        local: Member,
        options: CoordinatorOptions,
        io: IO,
        factory: F,
        metric_builder: &MetricBuilder,
    ) -> Result<Self> {
        let mut metric_builder = metric_builder.clone();
        metric_builder
            .namespace("singleton")
            .label("service", service.as_str());
        let metrics = track!(SingletonMetrics::new(&metric_builder))?;
        let common = track!(Common::new(
            service,
            local,
            io,
            options,
            metrics.coordinator.clone()
        ))?;
        let node = NodeState::new(common, factory);
        Ok(ElectionCoordinator {
            node,
            metrics: Arc::new(metrics),
        })
    }

    /// 監視用のファサードを返す.
    ///
    /// ファサードは複製して、他のスレッドに渡すことができる.
    pub fn facade(&self) -> SingletonFacade {
        self.node.common.facade().clone()
    }

    /// 選出結果の変化を観測するリスナーを設定する.
    ///
    /// 既に設定済みのものは置き換えられる.
    pub fn set_election_listener<L>(&mut self, listener: L)
    where
        L: ElectionListener + 'static,
    {
        self.node.common.set_listener(Box::new(listener));
    }

    /// 立候補を取り下げる.
    ///
    /// プライマリであった場合には、登録を閉じる前に管理対象サービスを停止する.
    /// 既に取り下げ済みの場合には何もしない.
    ///
    /// # Errors
    ///
    /// サービスの停止ないし登録の取り下げに失敗した場合にはエラーが返されるが、
    /// その場合でも役割は`Role::Inactive`となっている.
    pub fn withdraw(&mut self) -> Result<()> {
        track!(self.node.withdraw())
    }

    /// 立候補を(再)登録する.
    ///
    /// 既に登録済みの場合には何もしない.
    pub fn register(&mut self) -> Result<()> {
        track!(self.node.common.register())
    }

    /// 立候補を取り下げた上で、コーディネータを破棄する.
    ///
    /// 送信中のコマンドは破棄される.
    pub fn close(mut self) -> Result<()> {
        track!(self.node.withdraw())
    }

    /// 対象サービスの識別子を返す.
    pub fn service(&self) -> &ServiceId {
        self.node.common.service()
    }

    /// ローカルメンバを返す.
    pub fn local_member(&self) -> &Member {
        self.node.common.local()
    }

    /// ローカルメンバの現在の役割を返す.
    pub fn role(&self) -> Role {
        self.node.role.role()
    }

    /// 現在の選出結果を返す.
    pub fn election_result(&self) -> &ElectionResult {
        self.node.common.result()
    }

    /// 現在の候補者プールを返す.
    pub fn candidates(&self) -> &[Member] {
        self.node.common.pool().members()
    }

    /// 送信中のコマンド数を返す.
    pub fn in_flight_commands(&self) -> usize {
        self.node.common.in_flight_commands()
    }

    /// `singleton` のメトリクスを返す.
    pub fn metrics(&self) -> &Arc<SingletonMetrics> {
        &self.metrics
    }

    /// I/O実装に対する参照を返す.
    pub fn io(&self) -> &IO {
        self.node.common.io()
    }

    /// 管理対象サービスのファクトリに対する参照を返す.
    pub fn factory(&self) -> &F {
        &self.node.factory
    }
}
impl<IO: Io, F: ManagedServiceFactory> Stream for ElectionCoordinator<IO, F> {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let local = self.node.common.local().clone();
        match Pin::new(&mut self.node).poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                let e: Error = track!(e, "member={}", local);
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

/// `ElectionCoordinator`から発生するイベント一覧.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Event {
    /// ローカルメンバの役割が変わった.
    RoleChanged { old_role: Role, new_role: Role },

    /// 選出されるメンバが変わった.
    Elected {
        previous: ElectionResult,
        current: ElectionResult,
    },

    /// 再送を尽くしても活性化コマンドを届けられなかった.
    ///
    /// ローカルの役割は既に確定しており、次のメンバシップの変更時に再評価される.
    ActivationDeferred { command: ActivationCommand },
}

#[cfg(test)]
mod tests {
    use prometrics::metrics::MetricBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use trackable::error::ErrorKindExt;
    use trackable::result::TestResult;

    use super::*;
    use crate::election::Epoch;
    use crate::message::CommandKind;
    use crate::node::NodeId;
    use crate::policy::Preference;
    use crate::test_util::tests::{
        poll_events, FactoryLog, RegistrationLog, TestFactory, TestIo, TestIoHandle,
    };
    use crate::ErrorKind;

    type TestCoordinator = ElectionCoordinator<TestIo, TestFactory>;

    fn node(
        local: &str,
        options: CoordinatorOptions,
    ) -> Result<(TestCoordinator, TestIoHandle, TestFactory)> {
        let (io, handle) = TestIo::new();
        let factory = TestFactory::default();
        let coordinator = track!(ElectionCoordinator::new(
            "svc".into(),
            Member::new(local),
            options,
            io,
            factory.clone(),
            &MetricBuilder::new()
        ))?;
        factory.observe(coordinator.facade());
        Ok((coordinator, handle, factory))
    }

    fn join(io: &TestIoHandle, members: &[&str]) {
        io.view(members);
        io.candidates(members);
    }

    fn command(
        kind: CommandKind,
        target: &str,
        epoch: u64,
        primary: &str,
        pool: &[&str],
    ) -> ActivationCommand {
        ActivationCommand {
            service: "svc".into(),
            kind,
            origin: NodeId::new("a"),
            target: NodeId::new(target),
            epoch: Epoch::new(epoch),
            primary: Some(Member::new(primary)),
            candidates: pool.iter().map(|m| NodeId::new(*m)).collect(),
        }
    }

    #[test]
    fn oldest_candidate_is_elected_and_replaced() -> TestResult {
        let (mut c, io, factory) = track!(node("b", CoordinatorOptions::default()))?;
        join(&io, &["a", "b", "c"]);
        let (events, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(c.election_result().elected, Some(Member::new("a")));
        assert_eq!(c.role(), Role::Backup);
        assert!(events.contains(&Event::RoleChanged {
            old_role: Role::Inactive,
            new_role: Role::Backup
        }));
        let epoch = c.election_result().epoch;

        io.candidates(&["b", "c"]);
        let (events, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(c.election_result().elected, Some(Member::new("b")));
        assert_eq!(c.election_result().epoch, epoch.next());
        assert_eq!(c.role(), Role::Primary);
        assert!(events.contains(&Event::RoleChanged {
            old_role: Role::Backup,
            new_role: Role::Primary
        }));
        assert_eq!(factory.starts(), 1);

        let facade = c.facade();
        assert!(facade.is_primary());
        assert_eq!(facade.primary_provider(), Some(Member::new("b")));
        assert_eq!(facade.providers(), vec![Member::new("b"), Member::new("c")]);
        assert_eq!(c.metrics().coordinator().elections_total(), 2);
        Ok(())
    }

    #[test]
    fn no_primary_below_quorum() -> TestResult {
        let options = CoordinatorOptions {
            quorum: track!(Quorum::new(3))?,
            ..CoordinatorOptions::default()
        };
        for local in &["a", "b"] {
            let (mut c, io, factory) = track!(node(local, options.clone()))?;
            join(&io, &["a", "b"]);
            let (_, error) = poll_events(&mut c);
            assert!(error.is_none());

            let facade = c.facade();
            assert!(!facade.is_primary());
            assert_eq!(facade.primary_provider(), None);
            assert_eq!(facade.role(), Role::Backup);
            assert_eq!(factory.starts(), 0);

            // クォーラムを満たすと選出される
            join(&io, &["a", "b", "c"]);
            let (_, error) = poll_events(&mut c);
            assert!(error.is_none());
            assert_eq!(facade.primary_provider(), Some(Member::new("a")));
        }
        Ok(())
    }

    #[test]
    fn preference_overrides_position() -> TestResult {
        let options = CoordinatorOptions {
            policy: ElectionPolicy::preferred(
                vec![Preference::name("b")],
                ElectionPolicy::Position(0),
            ),
            ..CoordinatorOptions::default()
        };
        let (mut c, io, _) = track!(node("a", options))?;
        join(&io, &["a", "b", "c"]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(c.election_result().elected, Some(Member::new("b")));
        assert_eq!(c.role(), Role::Backup);
        Ok(())
    }

    #[test]
    fn service_starts_before_facade_reports_primary() -> TestResult {
        let (mut c, io, factory) = track!(node("b", CoordinatorOptions::default()))?;
        join(&io, &["a", "b"]);
        let _ = poll_events(&mut c);
        assert_eq!(c.role(), Role::Backup);
        assert!(factory.log().is_empty());

        io.candidates(&["b"]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(
            factory.log(),
            vec![FactoryLog::Start {
                instance: 0,
                primary_visible: false
            }]
        );
        assert!(c.facade().is_primary());
        Ok(())
    }

    #[test]
    fn stale_command_is_discarded() -> TestResult {
        let (mut c, io, factory) = track!(node("c", CoordinatorOptions::default()))?;
        join(&io, &["a", "b", "c"]);
        let _ = poll_events(&mut c);

        io.command(command(CommandKind::Deactivate, "c", 7, "a", &["a", "b", "c"]));
        let _ = poll_events(&mut c);
        assert_eq!(c.election_result().epoch, Epoch::new(7));

        let before = c.facade().snapshot();
        io.command(command(CommandKind::Activate, "c", 5, "c", &["a", "b", "c"]));
        let (events, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert!(events.is_empty());
        assert_eq!(c.election_result().elected, Some(Member::new("a")));
        assert_eq!(c.election_result().epoch, Epoch::new(7));
        assert_eq!(*c.facade().snapshot(), *before);
        assert_eq!(factory.starts(), 0);
        assert_eq!(c.metrics().coordinator().stale_commands_total(), 1);
        Ok(())
    }

    #[test]
    fn duplicated_command_is_applied_once() -> TestResult {
        let (mut c, io, factory) = track!(node("c", CoordinatorOptions::default()))?;
        join(&io, &["a", "b", "c"]);
        let _ = poll_events(&mut c);

        let activate = command(CommandKind::Activate, "c", 3, "c", &["a", "b", "c"]);
        io.command(activate.clone());
        let (events, _) = poll_events(&mut c);
        assert_eq!(c.role(), Role::Primary);
        assert_eq!(c.election_result().epoch, Epoch::new(3));
        assert!(!events.is_empty());

        io.command(activate);
        let (events, _) = poll_events(&mut c);
        assert!(events.is_empty());
        assert_eq!(c.role(), Role::Primary);
        assert_eq!(factory.starts(), 1);
        Ok(())
    }

    #[test]
    fn unrelated_commands_are_discarded() -> TestResult {
        let (mut c, io, factory) = track!(node("c", CoordinatorOptions::default()))?;
        join(&io, &["a", "b", "c"]);
        let _ = poll_events(&mut c);

        let mut foreign = command(CommandKind::Activate, "c", 3, "c", &["a", "b", "c"]);
        foreign.service = "other".into();
        io.command(foreign);
        io.command(command(CommandKind::Activate, "b", 3, "b", &["a", "b", "c"]));
        io.command(command(CommandKind::Activate, "c", 3, "c", &["a", "c"]));
        let (events, _) = poll_events(&mut c);
        assert!(events.is_empty());
        assert_eq!(factory.starts(), 0);
        assert_eq!(c.metrics().coordinator().stale_commands_total(), 3);
        Ok(())
    }

    #[test]
    fn oldest_candidate_dispatches_commands() -> TestResult {
        let options = CoordinatorOptions {
            policy: ElectionPolicy::Position(-1),
            ..CoordinatorOptions::default()
        };
        let (mut c, io, _) = track!(node("a", options))?;
        join(&io, &["a", "b"]);
        let _ = poll_events(&mut c);

        let sent = io.transport().take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, CommandKind::Activate);
        assert_eq!(sent[0].target, NodeId::new("b"));
        assert_eq!(sent[0].epoch, c.election_result().epoch);
        assert_eq!(sent[0].candidates, vec![NodeId::new("a"), NodeId::new("b")]);

        join(&io, &["a", "b", "c"]);
        let _ = poll_events(&mut c);
        let sent = io.transport().take_sent();
        let kinds = sent
            .iter()
            .map(|c| (c.kind, c.target.as_str().to_owned()))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                (CommandKind::Activate, "c".to_owned()),
                (CommandKind::Deactivate, "b".to_owned())
            ]
        );
        assert!(sent.iter().all(|s| s.primary == Some(Member::new("c"))));

        // 先頭ではないメンバは送信しない
        let (mut c, io, _) = track!(node("b", CoordinatorOptions::default()))?;
        join(&io, &["a", "b"]);
        let _ = poll_events(&mut c);
        io.candidates(&["b"]);
        let _ = poll_events(&mut c);
        assert!(io.transport().take_sent().is_empty());
        Ok(())
    }

    #[test]
    fn exhausted_retries_defer_activation() -> TestResult {
        let options = CoordinatorOptions {
            policy: ElectionPolicy::Position(-1),
            ..CoordinatorOptions::default()
        };
        let (mut c, io, _) = track!(node("a", options))?;
        io.transport().fail_next(3);
        join(&io, &["a", "b"]);
        let (events, error) = poll_events(&mut c);
        assert!(error.is_none());

        let deferred = events
            .iter()
            .filter_map(|e| match e {
                Event::ActivationDeferred { command } => Some(command.target.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(deferred, vec![NodeId::new("b")]);
        assert_eq!(
            io.transport().timeouts(),
            vec![Duration::from_millis(10), Duration::from_millis(100)]
        );
        assert_eq!(c.metrics().coordinator().commands_deferred_total(), 1);

        // ローカルの状態は確定したまま
        assert_eq!(c.election_result().elected, Some(Member::new("b")));
        assert_eq!(c.in_flight_commands(), 0);
        Ok(())
    }

    #[test]
    fn transient_failures_are_retried() -> TestResult {
        let options = CoordinatorOptions {
            policy: ElectionPolicy::Position(-1),
            ..CoordinatorOptions::default()
        };
        let (mut c, io, _) = track!(node("a", options))?;
        io.transport().fail_next(2);
        join(&io, &["a", "b"]);
        let (events, _) = poll_events(&mut c);
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::ActivationDeferred { .. })));
        assert_eq!(io.transport().take_sent().len(), 1);
        Ok(())
    }

    #[test]
    fn withdraw_stops_primary_and_closes_registration() -> TestResult {
        let (mut c, io, factory) = track!(node("a", CoordinatorOptions::default()))?;
        join(&io, &["a", "b"]);
        let _ = poll_events(&mut c);
        assert_eq!(c.role(), Role::Primary);

        track!(c.withdraw())?;
        assert_eq!(c.role(), Role::Inactive);
        assert_eq!(c.election_result().elected, Some(Member::new("b")));
        assert!(!c.facade().is_primary());
        assert_eq!(
            factory.log(),
            vec![
                FactoryLog::Start {
                    instance: 0,
                    primary_visible: false
                },
                FactoryLog::Stop { instance: 0 }
            ]
        );
        assert_eq!(
            io.registrations(),
            vec![
                RegistrationLog::Registered("svc".into(), Member::new("a")),
                RegistrationLog::Closed("svc".into())
            ]
        );

        // 取り下げ済みなら何もしない
        track!(c.withdraw())?;
        assert_eq!(io.registrations().len(), 2);

        // 取り下げ中に届いた通知ではプライマリにならない
        io.candidates(&["a", "b"]);
        let _ = poll_events(&mut c);
        assert_eq!(c.role(), Role::Inactive);

        track!(c.register())?;
        assert_eq!(io.registrations().len(), 3);
        io.candidates(&["a", "b"]);
        let _ = poll_events(&mut c);
        assert_eq!(c.role(), Role::Primary);
        assert_eq!(factory.starts(), 2);

        track!(c.close())?;
        assert_eq!(
            io.registrations().last(),
            Some(&RegistrationLog::Closed("svc".into()))
        );
        Ok(())
    }

    #[test]
    fn service_failure_still_commits_role() -> TestResult {
        let (mut c, io, factory) = track!(node("a", CoordinatorOptions::default()))?;
        factory.fail_start(true);
        join(&io, &["a"]);
        let (events, error) = poll_events(&mut c);
        assert_eq!(
            error.map(|e| *e.kind()),
            Some(ErrorKind::ServiceFailed)
        );
        assert!(events.contains(&Event::RoleChanged {
            old_role: Role::Inactive,
            new_role: Role::Primary
        }));
        assert_eq!(c.role(), Role::Primary);
        assert!(c.facade().is_primary());

        // 起動していないサービスは停止されない
        io.candidates(&[]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(c.role(), Role::Inactive);
        assert!(factory.log().is_empty());

        factory.fail_start(false);
        factory.fail_stop(true);
        io.candidates(&["a"]);
        let _ = poll_events(&mut c);
        io.candidates(&[]);
        let (_, error) = poll_events(&mut c);
        assert_eq!(
            error.map(|e| *e.kind()),
            Some(ErrorKind::ServiceFailed)
        );
        assert_eq!(c.role(), Role::Inactive);
        Ok(())
    }

    #[test]
    fn listener_failures_are_contained() -> TestResult {
        let (mut c, io, _) = track!(node("a", CoordinatorOptions::default()))?;
        let calls = Rc::new(RefCell::new(Vec::new()));
        let recorded = calls.clone();
        c.set_election_listener(
            move |_: &ServiceId, previous: &ElectionResult, current: &ElectionResult| -> Result<()> {
                recorded
                    .borrow_mut()
                    .push((previous.elected.clone(), current.elected.clone()));
                Err(ErrorKind::Other.error().into())
            },
        );
        join(&io, &["a", "b"]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(*calls.borrow(), vec![(None, Some(Member::new("a")))]);
        assert_eq!(c.metrics().coordinator().listener_failures_total(), 1);

        c.set_election_listener(
            |_: &ServiceId, _: &ElectionResult, _: &ElectionResult| -> Result<()> {
                panic!("listener panicked")
            },
        );
        io.candidates(&["b"]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(c.role(), Role::Inactive);
        assert_eq!(c.metrics().coordinator().listener_failures_total(), 2);
        Ok(())
    }

    #[test]
    fn epoch_never_decreases() -> TestResult {
        let (mut c, io, _) = track!(node("b", CoordinatorOptions::default()))?;
        io.view(&["a", "b", "c", "d"]);
        let pools: &[&[&str]] = &[
            &["a", "b"],
            &["a", "b", "c"],
            &["b", "c"],
            &["b", "c"],
            &["c"],
            &[],
            &["a", "d"],
            &["a", "b", "c", "d"],
        ];
        let mut last = c.election_result().clone();
        for pool in pools {
            io.candidates(pool);
            let _ = poll_events(&mut c);
            let current = c.election_result().clone();
            if current.elected == last.elected {
                assert_eq!(current.epoch, last.epoch);
            } else {
                assert_eq!(current.epoch, last.epoch.next());
            }
            last = current;
        }
        assert_eq!(last.epoch, Epoch::new(5));
        Ok(())
    }

    #[test]
    fn metrics_are_labeled_with_service() -> TestResult {
        let (c, _, _) = track!(node("a", CoordinatorOptions::default()))?;
        let label = c
            .metrics()
            .coordinator()
            .elections_total
            .labels()
            .get("service")
            .map(|l| l.value().to_owned());
        assert_eq!(label, Some("svc".to_owned()));
        Ok(())
    }

    #[test]
    fn unchanged_pool_keeps_random_election() -> TestResult {
        let options = CoordinatorOptions {
            policy: ElectionPolicy::Random { seed: None },
            ..CoordinatorOptions::default()
        };
        let (mut c, io, factory) = track!(node("b", options))?;
        join(&io, &["a", "b", "c", "d"]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        let result = c.election_result().clone();
        let starts = factory.starts();

        for _ in 0..50 {
            join(&io, &["a", "b", "c", "d"]);
            let (events, error) = poll_events(&mut c);
            assert!(error.is_none());
            assert!(events.is_empty());
        }
        assert_eq!(*c.election_result(), result);
        assert_eq!(factory.starts(), starts);
        assert_eq!(c.metrics().coordinator().elections_total(), 1);
        Ok(())
    }

    #[test]
    fn late_failure_of_stale_dispatch_is_discarded() -> TestResult {
        let options = CoordinatorOptions {
            policy: ElectionPolicy::Position(-1),
            backoff: track!(BackoffSchedule::new(vec![Duration::from_millis(0)]))?,
            ..CoordinatorOptions::default()
        };
        let (mut c, io, _) = track!(node("a", options))?;
        io.transport().hold_sends();
        join(&io, &["a", "b"]);
        let _ = poll_events(&mut c);
        assert_eq!(c.election_result().elected, Some(Member::new("b")));
        assert_eq!(c.in_flight_commands(), 1);

        // 送信の完了前にエポックが進む
        io.candidates(&["a"]);
        let (_, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert_eq!(c.election_result().elected, Some(Member::new("a")));
        assert_eq!(c.election_result().epoch, Epoch::new(2));
        assert_eq!(c.in_flight_commands(), 1);

        assert_eq!(io.transport().fail_held(), 1);
        let (events, error) = poll_events(&mut c);
        assert!(error.is_none());
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::ActivationDeferred { .. })));
        assert_eq!(c.in_flight_commands(), 0);
        assert_eq!(c.metrics().coordinator().commands_deferred_total(), 0);
        assert!(io.transport().take_sent().is_empty());
        Ok(())
    }
}
