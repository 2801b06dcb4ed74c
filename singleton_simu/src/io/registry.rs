use singleton::cluster::MembershipView;
use singleton::message::Notification;
use singleton::node::{Member, NodeId};
use singleton::service::ServiceId;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use crate::io::configs::RegistryConfig;
use crate::types::{LogicalTime, SharedClock, SharedRng};

/// シミュレータ用のメンバシップレジストリ.
///
/// クラスタのメンバシップビュー(参加順)と、サービス毎のプロバイダ群を保持し、
/// 変更があれば全ての購読者に通知を配送する.
///
/// 通知は購読者毎に遅延されるが、一つの購読者に届く順序は変更の発生順と一致する.
#[derive(Clone)]
pub struct Registry {
    config: RegistryConfig,
    rng: SharedRng,
    clock: SharedClock,
    inner: Rc<RefCell<RegistryInner>>,
}
impl Registry {
    /// 新しい`Registry`インスタンスを生成する.
    pub fn new(config: RegistryConfig, rng: SharedRng, clock: SharedClock) -> Self {
        Registry {
            config,
            rng,
            clock,
            inner: Rc::new(RefCell::new(RegistryInner::default())),
        }
    }

    /// 現在のメンバシップビューを返す.
    pub fn view(&self) -> MembershipView {
        MembershipView::new(self.inner.borrow().view.iter().cloned())
    }

    /// `service`の現在のプロバイダ群を返す.
    pub fn providers(&self, service: &ServiceId) -> BTreeSet<Member> {
        self.inner
            .borrow()
            .providers
            .get(service)
            .cloned()
            .unwrap_or_default()
    }

    /// `member`をビューの末尾(最も若いメンバ)に加える.
    pub fn join(&mut self, member: Member) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.view.iter().any(|m| m.id() == member.id()) {
                return;
            }
            inner.view.push(member);
        }
        self.broadcast_view();
    }

    /// `node`をビューから除き、その購読と全てのプロバイダ登録を破棄する.
    pub fn leave(&mut self, node: &NodeId) {
        let affected = {
            let mut inner = self.inner.borrow_mut();
            inner.view.retain(|m| m.id() != node);
            inner.subscribers.retain(|(n, _), _| n != node);
            let mut affected = Vec::new();
            for (service, providers) in inner.providers.iter_mut() {
                let before = providers.len();
                providers.retain(|m| m.id() != node);
                if before != providers.len() {
                    affected.push(service.clone());
                }
            }
            affected
        };
        self.broadcast_view();
        for service in affected {
            self.broadcast_providers(&service);
        }
    }

    /// `member`上の`service`用の購読を開始する.
    ///
    /// 購読者には、まず現在のビューとプロバイダ群が配送される.
    pub fn subscribe(&mut self, member: &Member, service: &ServiceId) {
        let key = (member.id().clone(), service.clone());
        self.inner
            .borrow_mut()
            .subscribers
            .insert(key.clone(), Mailbox::default());
        let view = self.view();
        let providers = self.providers(service).into_iter().collect();
        self.deliver(&key, Notification::ViewChanged(view));
        self.deliver(&key, Notification::CandidatesChanged(providers));
    }

    /// `member`を`service`のプロバイダとして登録する.
    pub fn register(&mut self, service: &ServiceId, member: &Member) {
        let inserted = self
            .inner
            .borrow_mut()
            .providers
            .entry(service.clone())
            .or_insert_with(BTreeSet::new)
            .insert(member.clone());
        if inserted {
            self.broadcast_providers(service);
        }
    }

    /// `service`のプロバイダから`node`を除く.
    pub fn unregister(&mut self, service: &ServiceId, node: &NodeId) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let providers = inner
                .providers
                .entry(service.clone())
                .or_insert_with(BTreeSet::new);
            let before = providers.len();
            providers.retain(|m| m.id() != node);
            before != providers.len()
        };
        if removed {
            self.broadcast_providers(service);
        }
    }

    /// `node`上の`service`の購読者に配送済みの通知があるなら取得する.
    pub fn try_recv_notification(
        &mut self,
        node: &NodeId,
        service: &ServiceId,
    ) -> Option<Notification> {
        let now = self.clock.now();
        let mut inner = self.inner.borrow_mut();
        let mailbox = inner.subscribers.get_mut(&(node.clone(), service.clone()))?;
        if mailbox.queue.front().map_or(false, |(t, _)| *t <= now) {
            mailbox.queue.pop_front().map(|(_, n)| n)
        } else {
            None
        }
    }

    /// 配送待ちの通知の数を返す.
    pub fn pending_notifications(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .values()
            .map(|m| m.queue.len())
            .sum()
    }

    fn broadcast_view(&mut self) {
        let view = self.view();
        let keys = self
            .inner
            .borrow()
            .subscribers
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        for key in keys {
            self.deliver(&key, Notification::ViewChanged(view.clone()));
        }
    }

    fn broadcast_providers(&mut self, service: &ServiceId) {
        let providers = self.providers(service).into_iter().collect::<Vec<_>>();
        let keys = self
            .inner
            .borrow()
            .subscribers
            .keys()
            .filter(|(_, s)| s == service)
            .cloned()
            .collect::<Vec<_>>();
        for key in keys {
            self.deliver(&key, Notification::CandidatesChanged(providers.clone()));
        }
    }

    fn deliver(&mut self, key: &(NodeId, ServiceId), notification: Notification) {
        let delay = self.config.delay.choose(&mut self.rng);
        let now = self.clock.now();
        if let Some(mailbox) = self.inner.borrow_mut().subscribers.get_mut(key) {
            let arrival_time = (now + delay).max(mailbox.last_arrival);
            mailbox.last_arrival = arrival_time;
            mailbox.queue.push_back((arrival_time, notification));
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    view: Vec<Member>,
    providers: BTreeMap<ServiceId, BTreeSet<Member>>,
    subscribers: BTreeMap<(NodeId, ServiceId), Mailbox>,
}

#[derive(Default)]
struct Mailbox {
    last_arrival: LogicalTime,
    queue: VecDeque<(LogicalTime, Notification)>,
}
