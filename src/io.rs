use futures::Future;
use std::task::Context;
use std::time::Duration;

use crate::message::{ActivationCommand, Notification};
use crate::node::Member;
use crate::service::ServiceId;
use crate::Result;

/// コーディネータの実行に必要なI/O機能を提供するためのトレイト.
///
/// 機能としてはおおまかに以下の三つに区分される:
///
/// - **通知の受信**
///   - メンバシップビューの変更、プロバイダ群の変更、他メンバからのコマンド
///   - 同一サービスに関する通知は発生順に届く必要がある
/// - **立候補の登録**
///   - ローカルメンバをサービスのプロバイダとして登録し、登録ハンドルを返す
/// - **コマンドの送信とタイマー**
///   - `Transport`を参照
pub trait Io {
    /// 立候補登録のハンドル.
    type Registration: Registration;

    /// コマンド送信用のトランスポート.
    type Transport: Transport;

    /// ローカルメンバに対する通知の受信を試みる.
    ///
    /// 通知が無い場合には、次の通知が届いた際に`cx`が起床されるようにした上で`Ok(None)`を返すこと.
    ///
    /// # 注意
    ///
    /// このメソッドが`Err`を返した場合には、コーディネータが停止してしまうので、
    /// 致命的なものを除いては`Err`は返さないことが望ましい.
    fn try_recv_notification(&mut self, cx: &mut Context) -> Result<Option<Notification>>;

    /// `local`を`service`のプロバイダとして登録する.
    fn register_candidacy(
        &mut self,
        service: &ServiceId,
        local: &Member,
    ) -> Result<Self::Registration>;

    /// コマンド送信用のトランスポートを返す.
    fn transport(&self) -> Self::Transport;
}

/// 立候補登録のハンドル.
pub trait Registration {
    /// 登録を取り下げる.
    fn close(self) -> Result<()>;
}

/// 単一の宛先へのコマンド送信と、再送間隔のためのタイマーを提供するトレイト.
///
/// 送信処理は非同期に行われ、コーディネータは完了を待たずに通知の処理を続ける.
pub trait Transport: Clone + 'static {
    /// コマンド送信を表現するための`Future`.
    ///
    /// 宛先に到達できなかった場合には`ErrorKind::Unreachable`で失敗すること.
    type SendCommand: Future<Output = Result<()>> + 'static;

    /// タイムアウトを表現するための`Future`.
    type Timeout: Future<Output = Result<()>> + 'static;

    /// `command.target`宛にコマンドを送信する.
    fn send_command(&mut self, command: ActivationCommand) -> Self::SendCommand;

    /// `duration`後に完了するタイムアウトオブジェクトを生成する.
    fn create_timeout(&mut self, duration: Duration) -> Self::Timeout;
}
