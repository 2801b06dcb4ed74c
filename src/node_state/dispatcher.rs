use futures::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::io::Transport;
use crate::message::ActivationCommand;
use crate::retry::{retry, BackoffSchedule};
use crate::Result;

type SendCommand = Pin<Box<dyn Future<Output = Result<()>>>>;

/// 活性化コマンドの送信チャンネル.
///
/// 各コマンドは`BackoffSchedule`に従った再送付きで非同期に送信され、
/// 完了は`poll_completions`メソッドで回収される.
/// 完了を待つ間も、コーディネータは通知の処理を継続できる.
pub struct ActivationChannel {
    in_flight: Vec<InFlight>,
}
impl ActivationChannel {
    pub fn new() -> Self {
        ActivationChannel {
            in_flight: Vec::new(),
        }
    }

    /// `command`の送信を開始する.
    pub fn dispatch<T: Transport>(
        &mut self,
        transport: &T,
        command: ActivationCommand,
        schedule: &BackoffSchedule,
    ) {
        let mut sender = transport.clone();
        let mut timer = transport.clone();
        let c = command.clone();
        let future = retry(
            move |_| sender.send_command(c.clone()),
            schedule,
            move |delay| timer.create_timeout(delay),
        );
        self.in_flight.push(InFlight {
            command,
            future: Box::pin(future),
        });
    }

    /// 完了した送信を取り出す.
    ///
    /// 未完了のものについては`cx`の起床が予約される.
    pub fn poll_completions(&mut self, cx: &mut Context) -> Vec<(ActivationCommand, Result<()>)> {
        let mut completed = Vec::new();
        let mut i = 0;
        while i < self.in_flight.len() {
            if let Poll::Ready(result) = self.in_flight[i].future.as_mut().poll(cx) {
                let done = self.in_flight.swap_remove(i);
                completed.push((done.command, result));
            } else {
                i += 1;
            }
        }
        completed
    }

    /// 送信中のコマンド数を返す.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

struct InFlight {
    command: ActivationCommand,
    future: SendCommand,
}
