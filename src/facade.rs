//! 監視用の読み取り専用ハンドル.
use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::election::{ElectionResult, Epoch, Role};
use crate::node::Member;
use crate::service::ServiceId;

/// ある時点におけるコーディネータの状態.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SingletonState {
    /// ローカルメンバの役割.
    pub role: Role,

    /// 選出結果.
    pub result: ElectionResult,

    /// 候補者プール(ビュー順).
    pub providers: Vec<Member>,
}

/// コーディネータの状態を外部から参照するためのハンドル.
///
/// 状態は丸ごと不変のスナップショットとして差し替えられるので、
/// 各メソッドは一回のアトミックな読み込みで整合性のとれた値を返し、ブロックすることはない.
///
/// 複数の値を組み合わせて参照したい場合には`snapshot`メソッドを利用すること.
#[derive(Debug, Clone)]
pub struct SingletonFacade {
    service: ServiceId,
    state: Arc<ArcSwap<SingletonState>>,
}
impl SingletonFacade {
    pub(crate) fn new(service: ServiceId) -> Self {
        SingletonFacade {
            service,
            state: Arc::new(ArcSwap::from_pointee(SingletonState::default())),
        }
    }

    /// 対象サービスの識別子を返す.
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// ローカルメンバがプライマリかどうかを判定する.
    pub fn is_primary(&self) -> bool {
        self.state.load().role.is_primary()
    }

    /// 現在のプライマリを返す.
    pub fn primary_provider(&self) -> Option<Member> {
        self.state.load().result.elected.clone()
    }

    /// 現在の候補者プールを返す.
    pub fn providers(&self) -> Vec<Member> {
        self.state.load().providers.clone()
    }

    /// ローカルメンバの役割を返す.
    pub fn role(&self) -> Role {
        self.state.load().role
    }

    /// 現在のエポックを返す.
    pub fn epoch(&self) -> Epoch {
        self.state.load().result.epoch
    }

    /// 現在の状態のスナップショットを返す.
    pub fn snapshot(&self) -> Arc<SingletonState> {
        self.state.load_full()
    }

    pub(crate) fn publish(&self, state: SingletonState) {
        self.state.store(Arc::new(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_state_is_visible_from_clones() {
        let facade = SingletonFacade::new("svc".into());
        let observer = facade.clone();
        assert!(!observer.is_primary());
        assert_eq!(observer.primary_provider(), None);

        let before = observer.snapshot();
        facade.publish(SingletonState {
            role: Role::Primary,
            result: ElectionResult {
                elected: Some(Member::new("a")),
                epoch: Epoch::new(1),
            },
            providers: vec![Member::new("a"), Member::new("b")],
        });
        assert!(observer.is_primary());
        assert_eq!(observer.primary_provider(), Some(Member::new("a")));
        assert_eq!(observer.providers().len(), 2);
        assert_eq!(observer.epoch(), Epoch::new(1));

        // 取得済みのスナップショットは変化しない
        assert_eq!(before.role, Role::Inactive);
    }
}
