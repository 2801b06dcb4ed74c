//! プライマリオーナー主導のエントリ失効スケジューリング.
//!
//! 複製キャッシュの各エントリの失効処理は、そのエントリのプライマリオーナーとなっている
//! メンバのみが行う.
//! オーナーの決定はキャッシュ側の責務であり、このモジュールは`Locality`を通してそれを参照する.
//! シングルトンの選出と同様に「一つのオーナーを決めて、そのオーナーを通して処理し、
//! オーナーの変化に追従する」という構造を持つ.
pub use self::scheduler::PrimaryOwnerScheduler;
pub use self::tracker::ExpirationTracker;

mod scheduler;
mod tracker;

/// あるキーのプライマリオーナーが、ローカルメンバかどうかを判定するためのトレイト.
pub trait Locality<K> {
    /// ローカルメンバが`key`のプライマリオーナーの場合に`true`を返す.
    fn is_local(&self, key: &K) -> bool;
}
impl<K, F> Locality<K> for F
where
    F: Fn(&K) -> bool,
{
    fn is_local(&self, key: &K) -> bool {
        self(key)
    }
}
