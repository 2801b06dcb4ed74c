//! テスト用のユーティリティ群。
#[cfg(test)]
pub mod tests {
    use futures::channel::oneshot;
    use futures::future::{self, Ready};
    use futures::task::noop_waker_ref;
    use futures::{Future, Stream};
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use trackable::error::ErrorKindExt;

    use crate::cluster::MembershipView;
    use crate::facade::SingletonFacade;
    use crate::io::{Io, Registration, Transport};
    use crate::message::{ActivationCommand, Notification};
    use crate::node::Member;
    use crate::service::{ManagedServiceFactory, ServiceId};
    use crate::{ElectionCoordinator, ErrorKind, Event, Result};

    /// `TestIo` を操作するためのハンドル。
    #[derive(Clone, Default)]
    pub struct TestIoHandle {
        notifications: Arc<Mutex<VecDeque<Notification>>>,
        registrations: Arc<Mutex<Vec<RegistrationLog>>>,
        transport: TestTransport,
    }
    impl TestIoHandle {
        /// 新しいメンバシップビューを通知する。
        pub fn view(&self, members: &[&str]) {
            let view = MembershipView::new(members.iter().map(|m| Member::new(*m)));
            self.push(Notification::ViewChanged(view));
        }

        /// 新しいプロバイダ群を通知する。
        pub fn candidates(&self, members: &[&str]) {
            let members = members.iter().map(|m| Member::new(*m)).collect();
            self.push(Notification::CandidatesChanged(members));
        }

        /// 他メンバからのコマンドを届ける。
        pub fn command(&self, command: ActivationCommand) {
            self.push(Notification::Command(command));
        }

        pub fn push(&self, notification: Notification) {
            self.notifications
                .lock()
                .expect("Never fails")
                .push_back(notification);
        }

        pub fn registrations(&self) -> Vec<RegistrationLog> {
            self.registrations.lock().expect("Never fails").clone()
        }

        pub fn transport(&self) -> &TestTransport {
            &self.transport
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RegistrationLog {
        Registered(ServiceId, Member),
        Closed(ServiceId),
    }

    /// テスト用の`Io`実装。
    ///
    /// 通知は`TestIoHandle`経由で積まれた順に返される。
    pub struct TestIo {
        handle: TestIoHandle,
    }
    impl TestIo {
        pub fn new() -> (Self, TestIoHandle) {
            let handle = TestIoHandle::default();
            (
                TestIo {
                    handle: handle.clone(),
                },
                handle,
            )
        }
    }
    impl Io for TestIo {
        type Registration = TestRegistration;
        type Transport = TestTransport;

        fn try_recv_notification(&mut self, _cx: &mut Context) -> Result<Option<Notification>> {
            Ok(self
                .handle
                .notifications
                .lock()
                .expect("Never fails")
                .pop_front())
        }

        fn register_candidacy(
            &mut self,
            service: &ServiceId,
            local: &Member,
        ) -> Result<Self::Registration> {
            self.handle
                .registrations
                .lock()
                .expect("Never fails")
                .push(RegistrationLog::Registered(service.clone(), local.clone()));
            Ok(TestRegistration {
                service: service.clone(),
                log: self.handle.registrations.clone(),
            })
        }

        fn transport(&self) -> Self::Transport {
            self.handle.transport.clone()
        }
    }

    pub struct TestRegistration {
        service: ServiceId,
        log: Arc<Mutex<Vec<RegistrationLog>>>,
    }
    impl Registration for TestRegistration {
        fn close(self) -> Result<()> {
            self.log
                .lock()
                .expect("Never fails")
                .push(RegistrationLog::Closed(self.service));
            Ok(())
        }
    }

    /// テスト用の`Transport`実装。
    ///
    /// 送信とタイムアウトは即座に完了する。
    /// `fail_next`で指定した回数だけ、送信は`ErrorKind::Unreachable`で失敗する。
    /// `hold_sends`の後の送信は、`fail_held`が呼ばれるまで完了しない。
    #[derive(Clone, Default)]
    pub struct TestTransport {
        sent: Arc<Mutex<Vec<ActivationCommand>>>,
        failures: Arc<Mutex<usize>>,
        timeouts: Arc<Mutex<Vec<Duration>>>,
        hold: Arc<Mutex<bool>>,
        held: Arc<Mutex<Vec<oneshot::Sender<Result<()>>>>>,
    }
    impl TestTransport {
        pub fn fail_next(&self, count: usize) {
            *self.failures.lock().expect("Never fails") = count;
        }

        pub fn hold_sends(&self) {
            *self.hold.lock().expect("Never fails") = true;
        }

        /// 保留中の送信を全て`ErrorKind::Unreachable`で失敗させ、その数を返す。
        ///
        /// 以降の送信は保留されない。
        pub fn fail_held(&self) -> usize {
            *self.hold.lock().expect("Never fails") = false;
            let held = std::mem::replace(&mut *self.held.lock().expect("Never fails"), Vec::new());
            let count = held.len();
            for tx in held {
                let _ = tx.send(Err(ErrorKind::Unreachable.error().into()));
            }
            count
        }

        /// 送信に成功したコマンド群を取り出す。
        pub fn take_sent(&self) -> Vec<ActivationCommand> {
            std::mem::replace(&mut *self.sent.lock().expect("Never fails"), Vec::new())
        }

        pub fn timeouts(&self) -> Vec<Duration> {
            self.timeouts.lock().expect("Never fails").clone()
        }
    }
    impl Transport for TestTransport {
        type SendCommand = TestSend;
        type Timeout = Ready<Result<()>>;

        fn send_command(&mut self, command: ActivationCommand) -> Self::SendCommand {
            if *self.hold.lock().expect("Never fails") {
                let (tx, rx) = oneshot::channel();
                self.held.lock().expect("Never fails").push(tx);
                return TestSend::Held(rx);
            }
            let mut failures = self.failures.lock().expect("Never fails");
            if *failures > 0 {
                *failures -= 1;
                return TestSend::Ready(future::ready(Err(ErrorKind::Unreachable.error().into())));
            }
            self.sent.lock().expect("Never fails").push(command);
            TestSend::Ready(future::ready(Ok(())))
        }

        fn create_timeout(&mut self, duration: Duration) -> Self::Timeout {
            self.timeouts.lock().expect("Never fails").push(duration);
            future::ready(Ok(()))
        }
    }

    /// `TestTransport::send_command`が返す`Future`。
    pub enum TestSend {
        Ready(Ready<Result<()>>),
        Held(oneshot::Receiver<Result<()>>),
    }
    impl Future for TestSend {
        type Output = Result<()>;

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
            match self.get_mut() {
                TestSend::Ready(f) => Pin::new(f).poll(cx),
                TestSend::Held(rx) => match Pin::new(rx).poll(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(Ok(result)) => Poll::Ready(result),
                    Poll::Ready(Err(_)) => {
                        Poll::Ready(Err(ErrorKind::Unreachable.cause("Canceled").into()))
                    }
                },
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum FactoryLog {
        /// `primary_visible`は起動時点でファサードがプライマリを報告していたかどうか。
        Start { instance: usize, primary_visible: bool },
        Stop { instance: usize },
    }

    /// テスト用の`ManagedServiceFactory`実装。
    #[derive(Clone, Default)]
    pub struct TestFactory {
        log: Arc<Mutex<Vec<FactoryLog>>>,
        fail_start: Arc<Mutex<bool>>,
        fail_stop: Arc<Mutex<bool>>,
        facade: Arc<Mutex<Option<SingletonFacade>>>,
    }
    impl TestFactory {
        pub fn log(&self) -> Vec<FactoryLog> {
            self.log.lock().expect("Never fails").clone()
        }

        pub fn starts(&self) -> usize {
            self.log()
                .iter()
                .filter(|l| matches!(l, FactoryLog::Start { .. }))
                .count()
        }

        pub fn fail_start(&self, fail: bool) {
            *self.fail_start.lock().expect("Never fails") = fail;
        }

        pub fn fail_stop(&self, fail: bool) {
            *self.fail_stop.lock().expect("Never fails") = fail;
        }

        /// 起動時点のファサードの状態を記録するようにする。
        pub fn observe(&self, facade: SingletonFacade) {
            *self.facade.lock().expect("Never fails") = Some(facade);
        }
    }
    impl ManagedServiceFactory for TestFactory {
        type Instance = usize;

        fn start(&mut self, _service: &ServiceId) -> Result<Self::Instance> {
            if *self.fail_start.lock().expect("Never fails") {
                track_panic!(ErrorKind::ServiceFailed, "Injected start failure");
            }
            let primary_visible = self
                .facade
                .lock()
                .expect("Never fails")
                .as_ref()
                .map_or(false, |f| f.is_primary());
            let mut log = self.log.lock().expect("Never fails");
            let instance = log.len();
            log.push(FactoryLog::Start {
                instance,
                primary_visible,
            });
            Ok(instance)
        }

        fn stop(&mut self, instance: Self::Instance) -> Result<()> {
            self.log
                .lock()
                .expect("Never fails")
                .push(FactoryLog::Stop { instance });
            if *self.fail_stop.lock().expect("Never fails") {
                track_panic!(ErrorKind::ServiceFailed, "Injected stop failure");
            }
            Ok(())
        }
    }

    /// `coordinator`をペンディングになるまで駆動し、発生したイベントと最初のエラーを返す。
    pub fn poll_events(
        coordinator: &mut ElectionCoordinator<TestIo, TestFactory>,
    ) -> (Vec<Event>, Option<crate::Error>) {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut events = Vec::new();
        let mut error = None;
        while let Poll::Ready(Some(item)) = Pin::new(&mut *coordinator).poll_next(&mut cx) {
            match item {
                Ok(event) => events.push(event),
                Err(e) => {
                    if error.is_none() {
                        error = Some(e);
                    }
                }
            }
        }
        (events, error)
    }
}
