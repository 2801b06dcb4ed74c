//! 再送制御.
use futures::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use std::vec;
use trackable::error::ErrorKindExt;

use crate::{Error, ErrorKind, Result};

/// 再送間隔のスケジュール.
///
/// `i`番目の要素は`i`回目の試行の前に待機する時間であり、要素数が最大試行回数となる.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}
impl BackoffSchedule {
    /// 新しい`BackoffSchedule`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `delays`が空の場合には`ErrorKind::InvalidInput`が返される.
    pub fn new(delays: Vec<Duration>) -> Result<Self> {
        track_assert!(
            !delays.is_empty(),
            ErrorKind::InvalidInput,
            "Empty backoff schedule"
        );
        Ok(BackoffSchedule { delays })
    }

    /// 最大試行回数を返す.
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    /// 各試行前の待機時間を返す.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}
impl Default for BackoffSchedule {
    /// 即時、`10ms`後、`100ms`後の三回.
    fn default() -> Self {
        BackoffSchedule {
            delays: vec![
                Duration::from_millis(0),
                Duration::from_millis(10),
                Duration::from_millis(100),
            ],
        }
    }
}

/// `schedule`に従って`action`を成功するまで繰り返す`Future`を返す.
///
/// `action`には試行番号(`0`始まり)が渡される.
/// 待機には`sleep`が返す`Future`が用いられるが、待機時間が`0`の場合には省略される.
///
/// 全ての試行が失敗した場合には、最後の試行のエラーで失敗する.
pub fn retry<A, F, S, T, V>(action: A, schedule: &BackoffSchedule, sleep: S) -> Retry<A, F, S, T>
where
    A: FnMut(usize) -> F,
    F: Future<Output = Result<V>>,
    S: FnMut(Duration) -> T,
    T: Future<Output = Result<()>>,
{
    Retry {
        action,
        sleep,
        delays: schedule.delays.clone().into_iter(),
        attempt: 0,
        state: RetryState::Idle,
    }
}

/// `retry`関数が返す`Future`.
pub struct Retry<A, F, S, T> {
    action: A,
    sleep: S,
    delays: vec::IntoIter<Duration>,
    attempt: usize,
    state: RetryState<F, T>,
}
impl<A, F, S, T> Retry<A, F, S, T> {
    /// これまでに開始された試行の数を返す.
    pub fn attempts(&self) -> usize {
        self.attempt
    }
}
impl<A, F, S, T, V> Future for Retry<A, F, S, T>
where
    A: FnMut(usize) -> F,
    F: Future<Output = Result<V>>,
    S: FnMut(Duration) -> T,
    T: Future<Output = Result<()>>,
{
    type Output = Result<V>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match mem::replace(&mut this.state, RetryState::Done) {
                RetryState::Idle => match this.delays.next() {
                    Some(delay) if delay == Duration::from_millis(0) => {
                        this.state = RetryState::Running(Box::pin((this.action)(this.attempt)));
                        this.attempt += 1;
                    }
                    Some(delay) => {
                        this.state = RetryState::Sleeping(Box::pin((this.sleep)(delay)));
                    }
                    None => {
                        let e = Error::from(ErrorKind::InconsistentState.error());
                        return Poll::Ready(Err(track!(e, "No attempts are scheduled")));
                    }
                },
                RetryState::Sleeping(mut f) => match f.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = RetryState::Sleeping(f);
                        return Poll::Pending;
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(track!(e))),
                    Poll::Ready(Ok(())) => {
                        this.state = RetryState::Running(Box::pin((this.action)(this.attempt)));
                        this.attempt += 1;
                    }
                },
                RetryState::Running(mut f) => match f.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = RetryState::Running(f);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(v)) => return Poll::Ready(Ok(v)),
                    Poll::Ready(Err(e)) => {
                        if this.delays.len() == 0 {
                            return Poll::Ready(Err(track!(e, "attempts={}", this.attempt)));
                        }
                        this.state = RetryState::Idle;
                    }
                },
                RetryState::Done => {
                    let e = Error::from(ErrorKind::InconsistentState.error());
                    return Poll::Ready(Err(track!(e, "Polled after completion")));
                }
            }
        }
    }
}

// 内部の`Future`は全てボックス化されているため、`Retry`自体は移動しても問題ない.
impl<A, F, S, T> Unpin for Retry<A, F, S, T> {}

enum RetryState<F, T> {
    Idle,
    Sleeping(Pin<Box<T>>),
    Running(Pin<Box<F>>),
    Done,
}
