//! 管理対象サービス関連.
use std::fmt;

use crate::Result;

/// 論理サービスの識別子.
///
/// コーディネータは、この識別子毎に独立して選出を行う.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(String);
impl ServiceId {
    /// 新しい`ServiceId`インスタンスを生成する.
    pub fn new<T: Into<String>>(id: T) -> Self {
        ServiceId(id.into())
    }

    /// 識別子に対応する文字列を返す.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<String> for ServiceId {
    fn from(f: String) -> Self {
        ServiceId::new(f)
    }
}
impl<'a> From<&'a str> for ServiceId {
    fn from(f: &'a str) -> Self {
        ServiceId::new(f)
    }
}

/// 管理対象サービスの起動と停止を担うトレイト.
///
/// ローカルメンバがプライマリに選出された際に`start`が、
/// プライマリではなくなった際に`stop`が呼び出される.
///
/// どちらの呼び出しも同期的であり、実行中はそのサービスのコーディネータの処理は進まない.
/// コーディネータ自体は、サービスが何を行うかについては一切関知しない.
pub trait ManagedServiceFactory {
    /// 起動中のサービスを表すハンドル.
    type Instance;

    /// サービスを起動する.
    ///
    /// 失敗した場合には`ErrorKind::ServiceFailed`を返すことが望ましい.
    fn start(&mut self, service: &ServiceId) -> Result<Self::Instance>;

    /// 起動中のサービスを停止する.
    fn stop(&mut self, instance: Self::Instance) -> Result<()>;
}
