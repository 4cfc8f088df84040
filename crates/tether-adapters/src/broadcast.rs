#![forbid(unsafe_code)]

//! In-process broadcast channel.
//!
//! A [`BroadcastHub`] relays writes between peers. Each [`adapter`] call
//! creates a new peer with its own key area, so peers never share a cache
//! cell: they learn about each other's writes only through push updates.
//! Messages travel as JSON, as they would between processes; a message a
//! peer cannot decode is reported through `Updater::fail`.
//!
//! [`adapter`]: BroadcastHub::adapter

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tether_core::{KeyArea, Pending, Raw, StorageAdapter, StorageError, StorageHandle, Updater, Value};

/// Message sent over the hub.
#[derive(Clone, Debug, PartialEq, Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Set { key: String, value: Json },
    Remove { key: String },
}

impl Message {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }
}

struct Subscriber<T> {
    peer: u64,
    key: String,
    updater: Updater<T>,
}

struct HubInner<T> {
    subscribers: RefCell<Vec<Subscriber<T>>>,
    next_peer: Cell<u64>,
    sent: Cell<usize>,
}

/// A set of peers exchanging values per key.
pub struct BroadcastHub<T> {
    inner: Rc<HubInner<T>>,
}

impl<T> Clone for BroadcastHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Value + Serialize + DeserializeOwned> Default for BroadcastHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value + Serialize + DeserializeOwned> BroadcastHub<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HubInner {
                subscribers: RefCell::new(Vec::new()),
                next_peer: Cell::new(0),
                sent: Cell::new(0),
            }),
        }
    }

    /// A new peer on this hub.
    #[must_use]
    pub fn adapter(&self) -> BroadcastPeer<T> {
        let peer = self.inner.next_peer.get();
        self.inner.next_peer.set(peer + 1);
        BroadcastPeer {
            hub: self.clone(),
            peer,
            area: KeyArea::unique("broadcast"),
        }
    }

    /// Deliver an encoded message to every peer, as if from outside the hub.
    pub fn post_raw(&self, message: Message) -> usize {
        self.deliver(None, &message)
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.inner.sent.get()
    }

    /// Open handles across all peers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Hand `message` to every subscriber of its key except `from`.
    fn deliver(&self, from: Option<u64>, message: &Message) -> usize {
        self.inner.sent.set(self.inner.sent.get() + 1);
        let receivers: Vec<Updater<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|s| Some(s.peer) != from && s.key == message.key())
            .map(|s| s.updater.clone())
            .collect();
        tracing::trace!(key = message.key(), receivers = receivers.len(), "broadcast");
        let decoded = match message {
            Message::Set { value, .. } => {
                serde_json::from_value::<T>(value.clone()).map(Raw::Value).map_err(StorageError::from)
            }
            Message::Remove { .. } => Ok(Raw::Cleared),
        };
        for updater in &receivers {
            match &decoded {
                Ok(raw) => updater.push(raw.clone()),
                Err(err) => updater.fail(err.clone()),
            };
        }
        receivers.len()
    }
}

impl<T> fmt::Debug for BroadcastHub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field("sent", &self.inner.sent.get())
            .finish()
    }
}

/// One participant of a [`BroadcastHub`].
pub struct BroadcastPeer<T> {
    hub: BroadcastHub<T>,
    peer: u64,
    area: KeyArea,
}

impl<T> Clone for BroadcastPeer<T> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            peer: self.peer,
            area: self.area.clone(),
        }
    }
}

impl<T> fmt::Debug for BroadcastPeer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastPeer")
            .field("peer", &self.peer)
            .field("area", &self.area)
            .finish()
    }
}

struct PeerHandle<T> {
    hub: BroadcastHub<T>,
    peer: u64,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> StorageHandle<T, C> for PeerHandle<T>
where
    T: Value + Serialize + DeserializeOwned,
{
    /// A channel holds no state: only pushed messages carry a value.
    fn get(&self, raw: Option<Raw<T>>, _ctx: Option<&C>) -> Pending<Option<T>> {
        Pending::ok(raw.and_then(Raw::into_option))
    }

    fn set(&self, value: &T, _ctx: Option<&C>) -> Pending<()> {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => return Pending::err(err.into()),
        };
        let message = Message::Set {
            key: self.key.clone(),
            value,
        };
        self.hub.deliver(Some(self.peer), &message);
        Pending::ok(())
    }

    fn remove(&self, _ctx: Option<&C>) -> Option<Pending<()>> {
        let message = Message::Remove {
            key: self.key.clone(),
        };
        self.hub.deliver(Some(self.peer), &message);
        Some(Pending::ok(()))
    }

    fn dispose(&self) {
        self.hub
            .inner
            .subscribers
            .borrow_mut()
            .retain(|s| !(s.peer == self.peer && s.key == self.key));
    }
}

impl<T, C> StorageAdapter<T, C> for BroadcastPeer<T>
where
    T: Value + Serialize + DeserializeOwned,
    C: 'static,
{
    fn open(&self, key: &str, updater: Updater<T>) -> Box<dyn StorageHandle<T, C>> {
        self.hub.inner.subscribers.borrow_mut().push(Subscriber {
            peer: self.peer,
            key: key.to_owned(),
            updater,
        });
        Box::new(PeerHandle {
            hub: self.hub.clone(),
            peer: self.peer,
            key: key.to_owned(),
            _marker: PhantomData,
        })
    }

    fn key_area(&self) -> KeyArea {
        self.area.clone()
    }
}
