//! クラスタ構成関連.
//!
//! メンバシップビュー(到達可能なメンバ群)と、
//! サービス毎の候補者プール(ビューの内でそのサービスをホスト可能なメンバ群)を扱う.
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::node::{Member, NodeId};

/// ある時点で到達可能なメンバ群のスナップショット.
///
/// メンバの並びはクラスタ全体で共通(典型的には参加順)であり、
/// 選出の決定性はこの順序に依存している.
///
/// 一度生成されたビューが変更されることはなく、
/// トポロジの変更時には、新しいビュー全体で置き換えられる.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipView {
    members: Arc<Vec<Member>>,
}
impl MembershipView {
    /// 新しい`MembershipView`インスタンスを生成する.
    ///
    /// 同じIDを持つメンバが複数含まれている場合には、最初のもののみが採用される.
    pub fn new<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Member>,
    {
        let mut seen = BTreeSet::new();
        let members = members
            .into_iter()
            .filter(|m| seen.insert(m.id().clone()))
            .collect();
        MembershipView {
            members: Arc::new(members),
        }
    }

    /// ビューに含まれるメンバ群を返す.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// ビューに含まれるメンバ数を返す.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// ビューが空かどうかを判定する.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `node`がビューに含まれるかどうかを判定する.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.iter().any(|m| m.id() == node)
    }
}
impl Default for MembershipView {
    fn default() -> Self {
        MembershipView::new(Vec::new())
    }
}

/// あるサービスの候補者プール.
///
/// サービスのホストを表明しているメンバ群(プロバイダ)の内、
/// 現在のビューに含まれるものを、ビューの順序で並べたもの.
///
/// まだビューを一度も受け取っていない場合には、プロバイダ群を`Member`の順序で並べる.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CandidatePool {
    members: Vec<Member>,
}
impl CandidatePool {
    /// `view`と`providers`から候補者プールを構築する.
    pub fn new(view: Option<&MembershipView>, providers: &BTreeSet<Member>) -> Self {
        let members = if let Some(view) = view {
            view.members()
                .iter()
                .filter(|m| providers.iter().any(|p| p.id() == m.id()))
                .cloned()
                .collect()
        } else {
            providers.iter().cloned().collect()
        };
        CandidatePool { members }
    }

    /// プール内のメンバ群を返す.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// プール内のメンバ数を返す.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// プールが空かどうかを判定する.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `node`がプールに含まれるかどうかを判定する.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.iter().any(|m| m.id() == node)
    }

    /// プールの先頭(最古)のメンバを返す.
    pub fn first(&self) -> Option<&Member> {
        self.members.first()
    }
}
impl From<Vec<Member>> for CandidatePool {
    fn from(f: Vec<Member>) -> Self {
        CandidatePool { members: f }
    }
}
