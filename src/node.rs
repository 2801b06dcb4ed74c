//! ノード(クラスタメンバ)関連の構成要素.
use std::fmt;
use std::net::SocketAddr;

/// ノードのID.
///
/// クラスタ全体で一意かつ、全メンバで共通の全順序を持つ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);
impl NodeId {
    /// 新しい`NodeId`インスタンスを生成する.
    pub fn new<T: Into<String>>(id: T) -> Self {
        NodeId(id.into())
    }

    /// IDに対応する文字列を返す.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// IDの所有権を放棄して、対応する文字列を返す.
    pub fn into_string(self) -> String {
        self.0
    }
}
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<String> for NodeId {
    fn from(f: String) -> Self {
        NodeId::new(f)
    }
}
impl<'a> From<&'a str> for NodeId {
    fn from(f: &'a str) -> Self {
        NodeId::new(f)
    }
}
impl From<NodeId> for String {
    fn from(f: NodeId) -> Self {
        f.into_string()
    }
}

/// クラスタのメンバ.
///
/// IDに加えて、(もしあれば)メンバが公開しているネットワークアドレスを保持する.
/// アドレスは`Preference::Location`による優先選出に利用される.
///
/// 順序は、まずIDで比較され、IDが等しい場合にのみアドレスが比較される.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Member {
    id: NodeId,
    address: Option<SocketAddr>,
}
impl Member {
    /// アドレスを持たない`Member`インスタンスを生成する.
    pub fn new<T: Into<NodeId>>(id: T) -> Self {
        Member {
            id: id.into(),
            address: None,
        }
    }

    /// `address`を公開しているメンバを生成する.
    pub fn with_address<T: Into<NodeId>>(id: T, address: SocketAddr) -> Self {
        Member {
            id: id.into(),
            address: Some(address),
        }
    }

    /// メンバのIDを返す.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// メンバが公開しているアドレスを返す.
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }
}
impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(address) = self.address {
            write!(f, "{}@{}", self.id, address)
        } else {
            write!(f, "{}", self.id)
        }
    }
}
impl<'a> From<&'a str> for Member {
    fn from(f: &'a str) -> Self {
        Member::new(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_ordered_by_id_first() {
        let a = Member::with_address("a", "127.0.0.1:9000".parse().unwrap());
        let b = Member::new("b");
        assert!(a < b);

        let a2 = Member::with_address("a", "127.0.0.1:8000".parse().unwrap());
        assert!(a2 < a);
        assert_eq!(a.to_string(), "a@127.0.0.1:9000");
        assert_eq!(b.to_string(), "b");
    }
}
