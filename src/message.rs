//! コーディネータが受け取るメッセージ群.
use crate::cluster::MembershipView;
use crate::election::Epoch;
use crate::node::{Member, NodeId};
use crate::service::ServiceId;

/// 活性化コマンドの種類.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// 宛先にプライマリになることを指示する.
    Activate,

    /// 宛先にプライマリを降りることを指示する.
    Deactivate,
}

/// 選出結果を、影響を受ける一つのメンバに伝えるためのコマンド.
///
/// コマンドは常にちょうど一つのメンバ(`target`)宛に送信され、ブロードキャストされることはない.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationCommand {
    /// 対象サービス.
    pub service: ServiceId,

    /// コマンドの種類.
    pub kind: CommandKind,

    /// 送信元.
    pub origin: NodeId,

    /// 宛先.
    pub target: NodeId,

    /// 送信元がコマンドを発行した時点のエポック.
    pub epoch: Epoch,

    /// 送信元が認識している新しいプライマリ.
    pub primary: Option<Member>,

    /// 送信元が選出に用いた候補者プール(ビュー順).
    ///
    /// 受信側は、自身のプールと一致する場合にのみコマンドを適用する.
    pub candidates: Vec<NodeId>,
}

/// 外部の協調者からコーディネータに届く通知.
///
/// 同一サービスに関する通知は、発生順に届くことが前提となっている.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// メンバシップビューが更新された.
    ViewChanged(MembershipView),

    /// サービスのプロバイダ(ホストを表明しているメンバ)群が変わった.
    CandidatesChanged(Vec<Member>),

    /// 他のメンバから活性化コマンドが届いた.
    Command(ActivationCommand),
}
