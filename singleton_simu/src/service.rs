//! シミュレータ上で管理される(ダミーの)サービス.
use singleton::node::NodeId;
use singleton::service::{ManagedServiceFactory, ServiceId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::{ErrorKind, Logger, Result};

/// 各サービスが、どのノード上で稼働中かを記録するためのテーブル.
#[derive(Debug, Clone, Default)]
pub struct RunningServices(Rc<RefCell<BTreeMap<ServiceId, BTreeSet<NodeId>>>>);
impl RunningServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// `service`が稼働中のノード群を返す.
    pub fn running_on(&self, service: &ServiceId) -> BTreeSet<NodeId> {
        self.0.borrow().get(service).cloned().unwrap_or_default()
    }

    /// `node`のクラッシュにより、そのノード上のサービスが全て消えたことを記録する.
    pub fn crash(&self, node: &NodeId) {
        for nodes in self.0.borrow_mut().values_mut() {
            nodes.remove(node);
        }
    }

    fn start(&self, service: &ServiceId, node: &NodeId) -> bool {
        self.0
            .borrow_mut()
            .entry(service.clone())
            .or_insert_with(BTreeSet::new)
            .insert(node.clone())
    }

    fn stop(&self, service: &ServiceId, node: &NodeId) -> bool {
        self.0
            .borrow_mut()
            .get_mut(service)
            .map_or(false, |nodes| nodes.remove(node))
    }
}

/// 起動中のサービス.
#[derive(Debug)]
pub struct ServiceInstance {
    service: ServiceId,
}

/// `RunningServices`に起動と停止を記録するだけのファクトリ.
pub struct ServiceFactory {
    logger: Logger,
    node: NodeId,
    running: RunningServices,
}
impl ServiceFactory {
    pub fn new(logger: Logger, node: NodeId, running: RunningServices) -> Self {
        ServiceFactory {
            logger,
            node,
            running,
        }
    }
}
impl ManagedServiceFactory for ServiceFactory {
    type Instance = ServiceInstance;

    fn start(&mut self, service: &ServiceId) -> Result<Self::Instance> {
        let started = self.running.start(service, &self.node);
        track_assert!(
            started,
            ErrorKind::InconsistentState,
            "Already running: service={}, node={}",
            service,
            self.node
        );
        log!(
            self.logger,
            "Service started (running on: {:?})",
            self.running.running_on(service)
        );
        Ok(ServiceInstance {
            service: service.clone(),
        })
    }

    fn stop(&mut self, instance: Self::Instance) -> Result<()> {
        let stopped = self.running.stop(&instance.service, &self.node);
        track_assert!(
            stopped,
            ErrorKind::InconsistentState,
            "Not running: service={}, node={}",
            instance.service,
            self.node
        );
        log!(self.logger, "Service stopped");
        Ok(())
    }
}
