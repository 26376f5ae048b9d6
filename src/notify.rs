// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lifecycle notifications for API calls.

use std::fmt;
use std::sync::{Arc, RwLock};

type Subscriber<E> = Box<dyn Fn(&E) + Send + Sync>;

/// A channel for lifecycle notifications.
///
/// Subscribers are invoked synchronously in subscription order. The handle
/// is cheap to clone and all clones share the same subscriber list, which is
/// how decorators re-emit inner events to their own subscribers.
pub struct Channel<E> {
    subscribers: Arc<RwLock<Vec<Subscriber<E>>>>,
}

impl<E> Default for Channel<E> {
    fn default() -> Channel<E> {
        Channel {
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<E> Clone for Channel<E> {
    fn clone(&self) -> Channel<E> {
        Channel {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let count = self.subscribers.read().expect("subscriber list").len();
        f.debug_struct("Channel").field("subscribers", &count).finish()
    }
}

impl<E> Channel<E> {
    /// Add a subscriber.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .expect("subscriber list")
            .push(Box::new(subscriber));
    }

    /// Deliver an event to every subscriber.
    pub fn emit(&self, event: &E) {
        for subscriber in self.subscribers.read().expect("subscriber list").iter() {
            subscriber(event);
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::Channel;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let channel = Channel::<u32>::default();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            channel.subscribe(move |event| {
                let _ = counter.fetch_add(*event as usize, Ordering::SeqCst);
            });
        }
        channel.emit(&2);
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_subscription_order() {
        let channel = Channel::<&'static str>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            channel.subscribe(move |event: &&str| {
                seen.lock().unwrap().push(format!("{}:{}", tag, event));
            });
        }
        channel.emit(&"x");
        assert_eq!(*seen.lock().unwrap(), vec!["first:x", "second:x"]);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let channel = Channel::<()>::default();
        let clone = channel.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let counter = Arc::clone(&counter);
            clone.subscribe(move |_| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        channel.emit(&());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
