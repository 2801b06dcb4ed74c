//! `Future`トレイトの実装群.
use futures::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::types::LogicalDuration;
use crate::Error;

pub type Timeout = DelayedResult<(), Error>;
pub type SendCommand = DelayedResult<(), Error>;

/// 結果を得られるまでに、生成時に指定された論理時間の経過が必要となる`Result`型.
///
/// ポーリング一回が、論理時間の一単位に相当する.
#[derive(Debug)]
pub struct DelayedResult<T, E> {
    result: Option<Result<T, E>>,
    delay: LogicalDuration,
}
impl<T, E> DelayedResult<T, E> {
    /// `value`を値とする、遅延された成功結果を返す.
    pub fn ok(value: T, delay: LogicalDuration) -> Self {
        DelayedResult::done(Ok(value), delay)
    }

    /// `error`を失敗理由とする、遅延された結果を返す.
    pub fn err(error: E, delay: LogicalDuration) -> Self {
        DelayedResult::done(Err(error), delay)
    }

    /// 遅延された結果を返す.
    pub fn done(result: Result<T, E>, delay: LogicalDuration) -> Self {
        DelayedResult {
            result: Some(result),
            delay,
        }
    }
}
impl<T, E> Unpin for DelayedResult<T, E> {}
impl<T, E> Future for DelayedResult<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.delay == 0 {
            let result = this
                .result
                .take()
                .expect("Cannot poll DelayedResult twice");
            Poll::Ready(result)
        } else {
            this.delay -= 1;
            Poll::Pending
        }
    }
}
