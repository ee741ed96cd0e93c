//! Fan-out/fan-in over a batch of sibling fetches.
//!
//! Siblings run concurrently on the calling task and complete in any order.
//! A `FanIn` counts them back in, keeps every successful value and retains a
//! single representative error: a cancellation is sticky, otherwise the most
//! recent error wins. The gate is consumed by `finish`, so a level can only
//! be finalized once.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, warn};

use crate::error::Error;

#[derive(Debug)]
pub(crate) struct FanIn<T> {
    pending: usize,
    error: Option<Error>,
    values: Vec<T>,
}

impl<T> FanIn<T> {
    pub(crate) fn new(pending: usize) -> Self {
        Self {
            pending,
            error: None,
            values: Vec::new(),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    /// Records one child completion. Returns true once the last pending
    /// child has completed.
    pub(crate) fn complete(&mut self, result: Result<T, Error>) -> bool {
        if self.pending == 0 {
            warn!("Ignoring completion of a fan-in that already finished");
            return false;
        }
        self.pending -= 1;
        match result {
            Ok(value) => self.values.push(value),
            Err(e) => self.record_error(e),
        }
        self.pending == 0
    }

    fn record_error(&mut self, error: Error) {
        if matches!(self.error, Some(Error::Cancelled)) {
            return;
        }
        if let Some(previous) = &self.error {
            debug!("Replacing error \"{}\" with \"{}\"", previous, error);
        }
        self.error = Some(error);
    }

    /// Finalizes the gate. Any successful child makes the whole batch
    /// successful and drops the retained error.
    pub(crate) fn finish(self, empty: Error) -> Result<Vec<T>, Error> {
        if !self.values.is_empty() {
            return Ok(self.values);
        }
        Err(self.error.unwrap_or(empty))
    }
}

/// Starts one future per item, drives them all to completion and returns
/// the filled gate.
pub(crate) async fn fan_out<I, F, Fut, T>(items: I, f: F) -> FanIn<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut tasks: FuturesUnordered<Fut> = items.into_iter().map(f).collect();
    let mut gate = FanIn::new(tasks.len());
    debug!("Waiting for {} requests", gate.pending());
    while let Some(result) = tasks.next().await {
        if gate.complete(result) {
            break;
        }
    }
    gate
}
