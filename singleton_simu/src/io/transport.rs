use singleton::message::ActivationCommand;
use singleton::node::NodeId;
use singleton::service::ServiceId;
use singleton::{ErrorKind, Transport};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;
use trackable::error::ErrorKindExt;

use crate::io::configs::ChannelConfig;
use crate::io::futures::{DelayedResult, SendCommand, Timeout};
use crate::types::{LogicalTime, SharedClock, SharedRng};

/// シミュレータ用のコマンドブローカー.
///
/// シミュレータにおいては、全てのノードは同じプロセス内に存在するので、
/// ネットワークを跨いだデータ転送は発生しない.
///
/// 各コマンドは構成に従って消失、重複、遅延し得る.
/// 宛先が接続していない(i.e., ダウンしている)場合には、遅延の後に送信が失敗する.
#[derive(Clone)]
pub struct MessageBroker {
    config: ChannelConfig,
    rng: SharedRng,
    clock: SharedClock,
    inner: Rc<RefCell<BrokerInner>>,
}
impl MessageBroker {
    /// 新しい`MessageBroker`インスタンスを生成する.
    pub fn new(config: ChannelConfig, rng: SharedRng, clock: SharedClock) -> Self {
        MessageBroker {
            config,
            rng,
            clock,
            inner: Rc::new(RefCell::new(BrokerInner::default())),
        }
    }

    /// `node`を宛先として到達可能にする.
    pub fn connect(&mut self, node: &NodeId) {
        self.inner.borrow_mut().connected.insert(node.clone());
    }

    /// `node`を到達不能にし、配送待ちのコマンドを全て破棄する.
    pub fn disconnect(&mut self, node: &NodeId) {
        let mut inner = self.inner.borrow_mut();
        inner.connected.remove(node);
        inner.channels.retain(|(n, _), _| n != node);
    }

    /// `node`上の`service`宛に配送されたコマンドがあるなら取得する.
    pub fn try_recv_command(
        &mut self,
        node: &NodeId,
        service: &ServiceId,
    ) -> Option<ActivationCommand> {
        let now = self.clock.now();
        let mut inner = self.inner.borrow_mut();
        let channel = inner.channels.get_mut(&(node.clone(), service.clone()))?;
        let key = *channel.keys().next()?;
        if key.0 <= now {
            channel.remove(&key)
        } else {
            None
        }
    }

    /// 配送待ちのコマンドの数を返す.
    pub fn pending_commands(&self) -> usize {
        self.inner
            .borrow()
            .channels
            .values()
            .map(|c| c.len())
            .sum()
    }

    fn enqueue(&mut self, command: ActivationCommand, arrival_time: LogicalTime) {
        let mut inner = self.inner.borrow_mut();
        inner.seqno += 1;
        let seqno = inner.seqno;
        inner
            .channels
            .entry((command.target.clone(), command.service.clone()))
            .or_insert_with(BTreeMap::new)
            .insert((arrival_time, seqno), command);
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        self.inner.borrow().connected.contains(node)
    }
}
impl Transport for MessageBroker {
    type SendCommand = SendCommand;
    type Timeout = Timeout;

    fn send_command(&mut self, command: ActivationCommand) -> Self::SendCommand {
        let delay = self.config.delay.choose(&mut self.rng);
        if !self.is_connected(&command.target) {
            let e = ErrorKind::Unreachable.cause(format!("{} is down", command.target));
            return DelayedResult::err(e.into(), delay);
        }
        if !self.config.drop.occurred(&mut self.rng) {
            if self.config.duplicate.occurred(&mut self.rng) {
                let delay = self.config.delay.choose(&mut self.rng);
                self.enqueue(command.clone(), self.clock.now() + delay);
            }
            self.enqueue(command, self.clock.now() + delay);
        }
        DelayedResult::ok((), delay)
    }

    /// 一ミリ秒を論理時間の一単位として扱う.
    fn create_timeout(&mut self, duration: Duration) -> Self::Timeout {
        DelayedResult::ok((), duration.as_millis() as u64)
    }
}

#[derive(Default)]
struct BrokerInner {
    connected: BTreeSet<NodeId>,
    channels: BTreeMap<(NodeId, ServiceId), BTreeMap<(LogicalTime, u64), ActivationCommand>>,
    seqno: u64,
}
