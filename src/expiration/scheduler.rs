use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ExpirationTracker, Locality};

/// プライマリオーナーとなっているキーのみの失効を管理するスケジューラ.
///
/// オーナーの変化は`topology_changed`メソッドで伝える必要がある.
/// その呼び出しが遅れた場合でも、`poll_expired`はオーナーでなくなったキーを返さない.
pub struct PrimaryOwnerScheduler<K, L> {
    tracker: ExpirationTracker<K>,
    locality: L,
}
impl<K, L> PrimaryOwnerScheduler<K, L>
where
    K: Clone + Eq + Hash + fmt::Debug,
    L: Locality<K>,
{
    /// 新しい`PrimaryOwnerScheduler`インスタンスを生成する.
    pub fn new(timeout: Duration, locality: L) -> Self {
        PrimaryOwnerScheduler {
            tracker: ExpirationTracker::new(timeout),
            locality,
        }
    }

    /// `key`の失効をスケジュールする.
    ///
    /// ローカルメンバがオーナーではない場合には何もせずに`false`を返す.
    pub fn schedule(&mut self, key: K, now: Instant) -> bool {
        if self.locality.is_local(&key) {
            self.tracker.track(key, now);
            true
        } else {
            self.tracker.forget(&key);
            false
        }
    }

    /// `key`のスケジュールを取り消す.
    pub fn cancel(&mut self, key: &K) {
        self.tracker.forget(key);
    }

    /// `key`を使用中として、次に`schedule`されるまで失効を保留する.
    pub fn touch(&mut self, key: &K) {
        self.tracker.invalidate(key);
    }

    /// 取り出した`key`の失効処理に失敗した場合に、再試行を予約する.
    ///
    /// その間にオーナーが移っていた場合には、予約せずに破棄する.
    pub fn retry(&mut self, key: &K) {
        if self.locality.is_local(key) {
            self.tracker.retry(key);
        } else {
            self.tracker.confirm(key);
        }
    }

    /// 取り出した`key`の失効処理が完了したことを伝える.
    pub fn confirm(&mut self, key: &K) {
        self.tracker.confirm(key);
    }

    /// 期限切れのキーを一つ取り出す.
    ///
    /// その間にオーナーが移ったキーは、返さずに破棄する.
    pub fn poll_expired(&mut self, now: Instant) -> Option<K> {
        while let Some(key) = self.tracker.poll_expired(now) {
            if self.locality.is_local(&key) {
                return Some(key);
            }
            self.tracker.confirm(&key);
            debug!("Expiration of {:?} skipped: no longer the primary owner", key);
        }
        None
    }

    /// オーナーの変化を反映する.
    ///
    /// `keys`はローカルから見える全てのキーであり、
    /// 新たにオーナーとなったキーは`now`を起点にスケジュールされ、
    /// オーナーでなくなったキーのスケジュールは取り消される.
    pub fn topology_changed<I>(&mut self, keys: I, now: Instant)
    where
        I: IntoIterator<Item = K>,
    {
        let moved = self
            .tracker
            .tracked_keys()
            .filter(|k| !self.locality.is_local(k))
            .cloned()
            .collect::<Vec<_>>();
        for key in moved {
            debug!("Expiration of {:?} cancelled: ownership moved away", key);
            self.tracker.forget(&key);
        }
        for key in keys {
            if self.locality.is_local(&key) && !self.tracker.is_tracked(&key) {
                self.tracker.track(key, now);
            }
        }
    }

    /// 最も早い期限を返す.
    pub fn next_expiration(&self) -> Option<Instant> {
        self.tracker.next_expiration()
    }

    /// スケジュール済み(保留中を含む)のキー群を返す.
    pub fn scheduled_keys(&self) -> impl Iterator<Item = &K> {
        self.tracker.tracked_keys()
    }

    /// `Locality`の実装に対する参照を返す.
    pub fn locality(&self) -> &L {
        &self.locality
    }
}
