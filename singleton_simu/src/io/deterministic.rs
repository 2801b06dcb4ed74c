use singleton::message::Notification;
use singleton::node::{Member, NodeId};
use singleton::service::ServiceId;
use singleton::{Io, Registration};
use std::task::Context;

use crate::io::configs::{ChannelConfig, RegistryConfig};
use crate::io::{MessageBroker, Registry};
use crate::types::{SharedClock, SharedRng};
use crate::Result;

/// `DeterministicIo`のビルダ.
///
/// 複製されたビルダ同士は、同じレジストリとブローカーを共有する.
#[derive(Clone)]
pub struct DeterministicIoBuilder {
    registry: Registry,
    broker: MessageBroker,
}
impl DeterministicIoBuilder {
    /// 新しい`DeterministicIoBuilder`インスタンスを生成する.
    pub fn new(
        channel: ChannelConfig,
        registry: RegistryConfig,
        rng: SharedRng,
        clock: SharedClock,
    ) -> Self {
        DeterministicIoBuilder {
            registry: Registry::new(registry, rng.clone(), clock.clone()),
            broker: MessageBroker::new(channel, rng, clock),
        }
    }

    /// 全ノードで共有されるレジストリを返す.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 全ノードで共有されるブローカーを返す.
    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    /// `member`をクラスタに参加させる.
    pub fn join(&mut self, member: &Member) {
        self.broker.connect(member.id());
        self.registry.join(member.clone());
    }

    /// `node`をクラスタから(クラッシュにより)離脱させる.
    pub fn leave(&mut self, node: &NodeId) {
        self.broker.disconnect(node);
        self.registry.leave(node);
    }

    /// `member`上の`service`用の`DeterministicIo`インスタンスを生成する.
    pub fn build(&mut self, member: &Member, service: &ServiceId) -> DeterministicIo {
        self.registry.subscribe(member, service);
        DeterministicIo {
            node: member.id().clone(),
            service: service.clone(),
            registry: self.registry.clone(),
            broker: self.broker.clone(),
        }
    }
}

/// 決定論的な`Io`トレイト実装.
///
/// 構築時に指定した乱数生成器も含めて、全ての操作・入力列が等しいなら、
/// この`Io`実装は、常に同一の出力列を生成する.
///
/// 起床の通知は行わないので、利用側が毎周ポーリングする必要がある.
pub struct DeterministicIo {
    node: NodeId,
    service: ServiceId,
    registry: Registry,
    broker: MessageBroker,
}
impl Io for DeterministicIo {
    type Registration = DeterministicRegistration;
    type Transport = MessageBroker;

    fn try_recv_notification(&mut self, _cx: &mut Context) -> Result<Option<Notification>> {
        if let Some(n) = self.registry.try_recv_notification(&self.node, &self.service) {
            return Ok(Some(n));
        }
        let command = self.broker.try_recv_command(&self.node, &self.service);
        Ok(command.map(Notification::Command))
    }

    fn register_candidacy(
        &mut self,
        service: &ServiceId,
        local: &Member,
    ) -> Result<Self::Registration> {
        self.registry.register(service, local);
        Ok(DeterministicRegistration {
            service: service.clone(),
            node: local.id().clone(),
            registry: self.registry.clone(),
        })
    }

    fn transport(&self) -> Self::Transport {
        self.broker.clone()
    }
}

/// `DeterministicIo`用の立候補登録.
pub struct DeterministicRegistration {
    service: ServiceId,
    node: NodeId,
    registry: Registry,
}
impl Registration for DeterministicRegistration {
    fn close(mut self) -> Result<()> {
        self.registry.unregister(&self.service, &self.node);
        Ok(())
    }
}
