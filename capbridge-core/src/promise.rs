//! Single-threaded promises resolved by the native scheduler.
//!
//! A [`Promise`] is a boxed, `!Send` future yielding `Result<T, Fault>`. It
//! resolves exactly once; dropping it before resolution cancels every
//! continuation chained onto it, and whatever those continuations captured
//! is dropped without being run.

use crate::error::Fault;
use crate::host::HostRuntime;
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub struct Promise<T> {
    inner: LocalBoxFuture<'static, Result<T, Fault>>,
}

impl<T: 'static> Promise<T> {
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Fault>> + 'static,
    {
        Promise {
            inner: future.boxed_local(),
        }
    }

    pub fn ready(value: T) -> Self {
        Self::from_future(futures::future::ready(Ok(value)))
    }

    pub fn rejected(fault: Fault) -> Self {
        Self::from_future(futures::future::ready(Err(fault)))
    }

    pub fn from_result(result: Result<T, Fault>) -> Self {
        Self::from_future(futures::future::ready(result))
    }

    /// Create a promise resolved through the returned [`Fulfiller`].
    pub fn pair() -> (Self, Fulfiller<T>) {
        let (tx, rx) = oneshot::channel();
        let promise = Self::from_future(async move {
            match rx.await {
                Ok(result) => result,
                Err(oneshot::Canceled) => Err(Fault::disconnected(
                    file!(),
                    line!(),
                    "promise fulfiller was dropped without resolving",
                )),
            }
        });
        (promise, Fulfiller { tx })
    }

    /// Chain a success continuation; a fault skips it and propagates as-is.
    pub fn then<U, F>(self, on_success: F) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        Promise::from_future(async move {
            let value = self.await?;
            on_success(value).await
        })
    }

    /// Chain a success and an error continuation. Exactly one of them runs.
    /// The error continuation only sees faults of `self`, never faults
    /// raised by `on_success`.
    pub fn then_else<U, F, E>(self, on_success: F, on_error: E) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
        E: FnOnce(Fault) -> Promise<U> + 'static,
    {
        Promise::from_future(async move {
            match self.await {
                Ok(value) => {
                    drop(on_error);
                    on_success(value).await
                }
                Err(fault) => {
                    drop(on_success);
                    on_error(fault).await
                }
            }
        })
    }

    pub fn map<U, F>(self, f: F) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        Promise::from_future(async move { self.await.map(f) })
    }

    /// Discard the resolved value, keeping only completion or failure.
    pub fn ignore_result(self) -> Promise<()> {
        self.map(|_| ())
    }

    /// Split into a promise that several continuations can observe.
    pub fn fork(self) -> ForkedPromise<T>
    where
        T: Clone,
    {
        ForkedPromise {
            shared: self.inner.shared(),
        }
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T, Fault>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// Resolves the promise it was created with.
pub struct Fulfiller<T> {
    tx: oneshot::Sender<Result<T, Fault>>,
}

impl<T> Fulfiller<T> {
    pub fn fulfill(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn reject(self, fault: Fault) {
        self.resolve(Err(fault));
    }

    pub fn resolve(self, result: Result<T, Fault>) {
        // The receiving promise may already have been dropped.
        let _ = self.tx.send(result);
    }

    /// True while the paired promise still exists.
    pub fn is_waiting(&self) -> bool {
        !self.tx.is_canceled()
    }
}

impl<T> fmt::Debug for Fulfiller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fulfiller")
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

/// A promise whose single resolution is observed by every branch.
pub struct ForkedPromise<T> {
    shared: Shared<LocalBoxFuture<'static, Result<T, Fault>>>,
}

impl<T: Clone + 'static> ForkedPromise<T> {
    pub fn add_branch(&self) -> Promise<T> {
        Promise::from_future(self.shared.clone())
    }
}

impl<T> fmt::Debug for ForkedPromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkedPromise").finish_non_exhaustive()
    }
}

/// The four promise shapes the bridge knows how to continue from.
pub enum NativePromise<R: HostRuntime> {
    /// Resolves to a host value.
    Value(Promise<R::Value>),
    /// Resolves to a raw RPC response.
    Response(Promise<R::Payload>),
    /// Completes without a value.
    Void(Promise<()>),
    /// Resolves to several host values.
    Array(Promise<Vec<R::Value>>),
}

impl<R: HostRuntime> NativePromise<R> {
    pub fn value(promise: Promise<R::Value>) -> Self {
        NativePromise::Value(promise)
    }

    pub fn response(promise: Promise<R::Payload>) -> Self {
        NativePromise::Response(promise)
    }

    pub fn void(promise: Promise<()>) -> Self {
        NativePromise::Void(promise)
    }

    pub fn array(promise: Promise<Vec<R::Value>>) -> Self {
        NativePromise::Array(promise)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NativePromise::Value(_) => "value",
            NativePromise::Response(_) => "response",
            NativePromise::Void(_) => "void",
            NativePromise::Array(_) => "array",
        }
    }
}

impl<R: HostRuntime> fmt::Debug for NativePromise<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativePromise").field(&self.kind()).finish()
    }
}
