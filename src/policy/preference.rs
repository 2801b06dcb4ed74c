use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::node::Member;
use crate::{Error, ErrorKind, Result};

/// 選出時の優先条件.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// IDが一致するメンバを優先する.
    Name(String),

    /// 公開アドレスが一致するメンバを優先する.
    Location(SocketAddr),
}
impl Preference {
    /// `Preference::Name`を生成する.
    pub fn name<T: Into<String>>(name: T) -> Self {
        Preference::Name(name.into())
    }

    /// `member`がこの条件に合致するかどうかを判定する.
    pub fn matches(&self, member: &Member) -> bool {
        match *self {
            Preference::Name(ref name) => member.id().as_str() == name,
            Preference::Location(addr) => member.address() == Some(addr),
        }
    }
}
impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Preference::Name(ref name) => write!(f, "name={}", name),
            Preference::Location(addr) => write!(f, "location={}", addr),
        }
    }
}
impl FromStr for Preference {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.splitn(2, '=');
        match (tokens.next(), tokens.next()) {
            (Some("name"), Some(name)) if !name.is_empty() => Ok(Preference::name(name)),
            (Some("location"), Some(addr)) => {
                let addr = track!(addr.parse::<SocketAddr>().map_err(Error::from))?;
                Ok(Preference::Location(addr))
            }
            _ => track_panic!(ErrorKind::InvalidInput, "Unknown preference: {:?}", s),
        }
    }
}
