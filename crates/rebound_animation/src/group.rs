//! Spring groups
//!
//! An [`AnimatedGroup`] animates a fixed set of named channels, each an
//! independent [`AnimatedValue`]. Partial updates touch only the named
//! channels. Aggregate subscribers receive the whole map, coalesced to at most
//! one notification per scheduler tick no matter how many channels changed.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::{Equivalent, IndexMap};
use rebound_core::{Callback, SubscriptionId, Subscribers};
use slotmap::Key;

use crate::animated::{AnimatedValue, SpringState};
use crate::config::SpringOptions;
use crate::finished::{Finished, GroupFinished};
use crate::scheduler::{FrameInfo, SchedulerHandle, Tickable};

/// Bounds required of group channel keys
pub trait ChannelKey: Hash + Eq + Clone + Send + Sync + 'static {}

impl<K: Hash + Eq + Clone + Send + Sync + 'static> ChannelKey for K {}

struct GroupInner<K: ChannelKey> {
    channels: IndexMap<K, AnimatedValue>,
    subscribers: Subscribers<IndexMap<K, f64>>,
    flush: Arc<GroupFlush<K>>,
    scheduler: SchedulerHandle,
    destroyed: AtomicBool,
}

impl<K: ChannelKey> GroupInner<K> {
    fn snapshot(&self) -> IndexMap<K, f64> {
        self.channels
            .iter()
            .map(|(key, channel)| (key.clone(), channel.get()))
            .collect()
    }

    fn any_animating(&self) -> bool {
        self.channels.values().any(AnimatedValue::is_animating)
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// Emits one aggregate notification per tick in which any channel changed.
///
/// Stays scheduled while a channel runs so it updates after the channels
/// registered before it.
struct GroupFlush<K: ChannelKey> {
    dirty: AtomicBool,
    group: Weak<GroupInner<K>>,
}

impl<K: ChannelKey> Tickable for GroupFlush<K> {
    fn update(&self, _frame: &FrameInfo) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(group) = self.group.upgrade() else {
            return;
        };
        if group.is_destroyed() {
            return;
        }

        let values = group.snapshot();
        group.subscribers.notify(&values);
    }

    fn is_complete(&self) -> bool {
        if self.dirty.load(Ordering::Acquire) {
            return false;
        }
        match self.group.upgrade() {
            Some(group) => group.is_destroyed() || !group.any_animating(),
            None => true,
        }
    }
}

/// A set of springs addressed by key
///
/// ```rust
/// use rebound_animation::{AnimatedGroup, AnimationScheduler, SpringConfig};
///
/// let scheduler = AnimationScheduler::new();
/// let position = AnimatedGroup::new(
///     scheduler.handle(),
///     [("x", 0.0), ("y", 0.0)],
///     SpringConfig::snappy(),
/// );
///
/// position.set([("x", 100.0)]);
/// let mut now = 0.0;
/// while scheduler.tick(now) {
///     now += 16.0;
/// }
///
/// assert_eq!(position.get_value("x"), 100.0);
/// assert_eq!(position.get_value("y"), 0.0);
/// ```
pub struct AnimatedGroup<K: ChannelKey> {
    inner: Arc<GroupInner<K>>,
}

impl<K: ChannelKey> Clone for AnimatedGroup<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: ChannelKey> AnimatedGroup<K> {
    /// A group with one channel per entry of `initial`, all sharing `options`
    pub fn new(
        scheduler: SchedulerHandle,
        initial: impl IntoIterator<Item = (K, f64)>,
        options: impl Into<SpringOptions>,
    ) -> Self {
        let options = options.into();
        let channels: IndexMap<K, AnimatedValue> = initial
            .into_iter()
            .map(|(key, value)| {
                let channel = AnimatedValue::new(scheduler.clone(), value, options.clone());
                (key, channel)
            })
            .collect();

        let inner = Arc::new_cyclic(|weak| GroupInner {
            channels,
            subscribers: Subscribers::new(),
            flush: Arc::new(GroupFlush {
                dirty: AtomicBool::new(false),
                group: weak.clone(),
            }),
            scheduler: scheduler.clone(),
            destroyed: AtomicBool::new(false),
        });

        for channel in inner.channels.values() {
            let flush = Arc::downgrade(&inner.flush);
            let scheduler = scheduler.clone();
            channel.watch(Arc::new(move |_: &f64| {
                if let Some(flush) = flush.upgrade() {
                    flush.dirty.store(true, Ordering::Release);
                    if let Err(err) = scheduler.register(&flush) {
                        tracing::debug!("group notification dropped: {}", err);
                    }
                }
            }));
        }

        Self { inner }
    }

    /// Retarget the named channels; others keep their value and motion
    pub fn set(&self, partial: impl IntoIterator<Item = (K, f64)>) {
        self.set_with(partial, SpringOptions::default());
    }

    /// Retarget the named channels with a per-call configuration override
    pub fn set_with(&self, partial: impl IntoIterator<Item = (K, f64)>, options: SpringOptions) {
        if self.inner.is_destroyed() {
            return;
        }

        let mut touched = false;
        for (key, target) in partial {
            match self.inner.channels.get(&key) {
                Some(channel) => {
                    channel.set_with(target, options.clone());
                    touched = true;
                }
                None => tracing::debug!("ignoring target for unknown group channel"),
            }
        }

        if touched && self.inner.any_animating() {
            self.schedule_flush();
        }
    }

    /// Place the named channels immediately.
    ///
    /// Subscribers see the new values on the next tick.
    pub fn jump(&self, partial: impl IntoIterator<Item = (K, f64)>) {
        if self.inner.is_destroyed() {
            return;
        }

        for (key, value) in partial {
            match self.inner.channels.get(&key) {
                Some(channel) => channel.jump(value),
                None => tracing::debug!("ignoring jump for unknown group channel"),
            }
        }
    }

    /// Current value of every channel, in creation order
    pub fn get(&self) -> IndexMap<K, f64> {
        self.inner.snapshot()
    }

    /// Current value of one channel, `0.0` if there is no such channel
    pub fn get_value<Q>(&self, key: &Q) -> f64
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.inner
            .channels
            .get(key)
            .map_or(0.0, AnimatedValue::get)
    }

    pub fn channel<Q>(&self, key: &Q) -> Option<&AnimatedValue>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.inner.channels.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.inner.channels.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.channels.is_empty()
    }

    /// Whether any channel is running
    pub fn is_animating(&self) -> bool {
        self.inner.any_animating()
    }

    /// Resolves once every channel that is running or paused now has settled
    pub fn finished(&self) -> GroupFinished<K> {
        let channels = self
            .inner
            .channels
            .iter()
            .map(|(key, channel)| {
                let finished = match channel.state() {
                    SpringState::Running | SpringState::Paused => channel.finished(),
                    SpringState::Idle | SpringState::Complete => Finished::resolved(channel.get()),
                };
                (key.clone(), finished)
            })
            .collect();
        GroupFinished::new(channels)
    }

    /// Observe the whole map; called immediately, then at most once per tick
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&IndexMap<K, f64>) + Send + Sync + 'static,
    {
        if self.inner.is_destroyed() {
            return SubscriptionId::default();
        }
        let callback: Callback<IndexMap<K, f64>> = Arc::new(callback);
        let id = self.inner.subscribers.insert(callback);
        self.inner.subscribers.notify_one(id, &self.get());
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        !id.is_null() && self.inner.subscribers.remove(id)
    }

    pub fn pause(&self) {
        self.inner.channels.values().for_each(AnimatedValue::pause);
    }

    pub fn resume(&self) {
        self.inner.channels.values().for_each(AnimatedValue::resume);
        if self.inner.any_animating() {
            self.schedule_flush();
        }
    }

    pub fn stop(&self) {
        self.inner.channels.values().for_each(AnimatedValue::stop);
    }

    /// Merge `options` into every channel's configuration
    pub fn set_config(&self, options: SpringOptions) {
        for channel in self.inner.channels.values() {
            channel.set_config(options.clone());
        }
    }

    /// Destroy every channel. Repeated calls have no effect.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.channels.values().for_each(AnimatedValue::destroy);
        self.inner.subscribers.clear();
        let _ = self.inner.scheduler.unregister_unit(&self.inner.flush);
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    fn schedule_flush(&self) {
        if let Err(err) = self.inner.scheduler.register(&self.inner.flush) {
            tracing::debug!("group notification dropped: {}", err);
        }
    }
}

impl<K: ChannelKey + std::fmt::Debug> std::fmt::Debug for AnimatedGroup<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedGroup")
            .field("values", &self.get())
            .field("animating", &self.is_animating())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
