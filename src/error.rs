use trackable::error::TrackableError;
use trackable::error::{ErrorKind as TrackableErrorKind, ErrorKindExt};

/// クレート固有の`Error`型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(TrackableError<ErrorKind>);
impl From<std::io::Error> for Error {
    fn from(f: std::io::Error) -> Self {
        ErrorKind::Other.cause(f).into()
    }
}
impl From<prometrics::Error> for Error {
    fn from(f: prometrics::Error) -> Self {
        ErrorKind::Other.cause(f).into()
    }
}
impl From<std::net::AddrParseError> for Error {
    fn from(f: std::net::AddrParseError) -> Self {
        ErrorKind::InvalidInput.cause(f).into()
    }
}
impl From<std::num::ParseIntError> for Error {
    fn from(f: std::num::ParseIntError) -> Self {
        ErrorKind::InvalidInput.cause(f).into()
    }
}

/// 発生し得るエラーの種類.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力が不正.
    ///
    /// 典型的には、クォーラムに`0`が指定された場合や、
    /// 選出ポリシーの文字列表現が解釈できなかった場合に返される.
    InvalidInput,

    /// コマンドの宛先に到達できなかった.
    ///
    /// 宛先がクラスタから離脱した直後や、まだ直前の構成変更を処理し終えていない
    /// 場合に発生し得る一時的なエラーであり、送信側は(回数制限付きで)再送を試みる.
    Unreachable,

    /// 管理対象サービスの起動ないし停止に失敗した.
    ///
    /// このエラーが返された場合でも、コーディネータ自体の役割の更新は完了している.
    ServiceFailed,

    /// 不整合な状態に陥った.
    ///
    /// プログラムのバグにより、本来発生するはずのない状態が生じてしまった.
    InconsistentState,

    /// その他エラー.
    ///
    /// 主に`Io`トレイトの実装のために設けられたエラー区分.
    Other,
}
impl TrackableErrorKind for ErrorKind {}
