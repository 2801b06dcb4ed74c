//! 選出結果の変化を観測するためのフック.
use crate::election::ElectionResult;
use crate::service::ServiceId;
use crate::Result;

/// 確定した選出結果の変化毎に、同期的に呼び出されるオブザーバ.
///
/// 診断やメトリクス収集用.
/// 返されたエラーやパニックはコーディネータ内で捕捉されてログに出力されるのみで、
/// 状態機械の動作には影響しない.
pub trait ElectionListener {
    /// 選出結果が`previous`から`current`に変わった.
    fn on_election(
        &mut self,
        service: &ServiceId,
        previous: &ElectionResult,
        current: &ElectionResult,
    ) -> Result<()>;
}
impl<F> ElectionListener for F
where
    F: FnMut(&ServiceId, &ElectionResult, &ElectionResult) -> Result<()>,
{
    fn on_election(
        &mut self,
        service: &ServiceId,
        previous: &ElectionResult,
        current: &ElectionResult,
    ) -> Result<()> {
        self(service, previous, current)
    }
}
