//! 選出関連の構成要素群.
use std::fmt;

use crate::node::{Member, NodeId};

/// あるサービスの選出結果の世代を識別するための番号.
///
/// 番号の値は`0`から始まり、選出されたメンバが変わる度に増加する.
/// なお、この番号は一つのサービスに関して常に増加していき、減少することはない.
///
/// 活性化コマンドには送信時のエポックが埋め込まれ、
/// 受信側は自分のエポック以下のコマンドを古いものとして破棄する.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(u64);
impl Epoch {
    /// 値が`number`となる`Epoch`インスタンスを生成する.
    pub fn new(number: u64) -> Self {
        Epoch(number)
    }

    /// このインスタンスのエポック番号の値を返す.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// 次のエポックを返す.
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}
impl From<u64> for Epoch {
    fn from(f: u64) -> Self {
        Epoch::new(f)
    }
}
impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// あるサービスに関するローカルメンバの役割.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// 候補者ではない.
    Inactive,

    /// 選出されてサービスを実行している.
    Primary,

    /// 候補者ではあるが、選出されていない.
    Backup,
}
impl Role {
    /// プライマリかどうかを判定する.
    pub fn is_primary(self) -> bool {
        self == Role::Primary
    }

    /// 候補者(プライマリないしバックアップ)かどうかを判定する.
    pub fn is_candidate(self) -> bool {
        self != Role::Inactive
    }

    /// ログ出力用の名前を返す.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Inactive => "inactive",
            Role::Primary => "primary",
            Role::Backup => "backup",
        }
    }
}
impl Default for Role {
    fn default() -> Self {
        Role::Inactive
    }
}
impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 選出結果.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ElectionResult {
    /// 選出されたメンバ.
    ///
    /// 候補者がいない場合や、クォーラムを満たさない場合には`None`となる.
    pub elected: Option<Member>,

    /// この結果のエポック.
    pub epoch: Epoch,
}
impl ElectionResult {
    /// 選出されたメンバのIDを返す.
    pub fn elected_id(&self) -> Option<&NodeId> {
        self.elected.as_ref().map(|m| m.id())
    }

    /// `node`が選出されているかどうかを判定する.
    pub fn is_elected(&self, node: &NodeId) -> bool {
        self.elected_id() == Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_only_moves_forward() {
        let e = Epoch::default();
        assert_eq!(e.as_u64(), 0);
        assert!(e.next() > e);
        assert_eq!(e.next().next(), Epoch::from(2));
    }

    #[test]
    fn election_result_works() {
        let result = ElectionResult {
            elected: Some(Member::new("a")),
            epoch: Epoch::new(3),
        };
        assert!(result.is_elected(&"a".into()));
        assert!(!result.is_elected(&"b".into()));
        assert!(!ElectionResult::default().is_elected(&"a".into()));
    }
}
