//! The pipelined request queue (spec §4.4: "several exchanges may be
//! concurrently processing... responses are written back in the same
//! order requests arrived").
//!
//! [`Slot`] holds one dispatched exchange's `Controller::call` future until
//! it resolves; [`PumpQueue`] advances every still-running slot on each
//! wakeup and reports readiness once the front of the queue is done, so the
//! connection writes responses out strictly in arrival order regardless of
//! which handler actually finishes first.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use http::HeaderMap;

use crate::body::incoming::Sender;
use crate::controller::{ControllerFuture, ControllerOutcome};
use crate::proto::h1::decode::{Decoded, Decoder};
use crate::Error;

pub(super) enum Slot<Ctx> {
    Running(ControllerFuture<Ctx>),
    Done(ControllerOutcome<Ctx>),
}

impl<Ctx> Slot<Ctx> {
    pub(super) fn new(fut: ControllerFuture<Ctx>) -> Self {
        Slot::Running(fut)
    }
}

/// Tracks the one request body currently being decoded off the wire. Only
/// one can be in progress at a time: HTTP/1.x framing requires a request's
/// body to be fully delimited before the next request's start line can even
/// be located in the stream.
pub(super) struct Receiving {
    pub(super) sender: Sender,
    pub(super) decoder: Decoder,
    pub(super) acc: BytesMut,
    pub(super) trailers: Option<HeaderMap>,
    /// The request's `Content-Encoding`, captured before the body starts
    /// streaming (spec §4.6): applied to `acc` once the body is fully
    /// buffered, since HTTP/1.x only ever has one `Receiving` in flight and
    /// always accumulates the whole body before handing it to the sender.
    #[cfg(feature = "compression")]
    pub(super) content_encoding: Option<crate::negotiator::compression::Coding>,
}

impl Receiving {
    pub(super) fn new(sender: Sender, decoder: Decoder) -> Self {
        Receiving {
            sender,
            decoder,
            acc: BytesMut::new(),
            trailers: None,
            #[cfg(feature = "compression")]
            content_encoding: None,
        }
    }

    /// Pulls whatever complete chunks/trailers `buf` already has buffered.
    /// Returns `Ok(true)` once the body is fully decoded (the caller then
    /// delivers `acc`/`trailers` to `sender` and drops this `Receiving`).
    pub(super) fn advance(&mut self, buf: &mut BytesMut) -> Result<bool, Error> {
        loop {
            match self.decoder.decode(buf, false)? {
                Decoded::Data(chunk) => self.acc.extend_from_slice(&chunk),
                Decoded::Trailers(t) => self.trailers = Some(t),
                Decoded::Done => return Ok(true),
                Decoded::NeedMore => return Ok(false),
            }
        }
    }
}

/// Polls every still-running slot once per wakeup; ready once the
/// front-of-queue slot has a result.
pub(super) struct PumpQueue<'q, Ctx> {
    pub(super) queue: &'q mut VecDeque<Slot<Ctx>>,
}

impl<'q, Ctx> Future for PumpQueue<'q, Ctx> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        for slot in this.queue.iter_mut() {
            if let Slot::Running(fut) = slot {
                if let Poll::Ready(outcome) = fut.as_mut().poll(cx) {
                    *slot = Slot::Done(outcome);
                }
            }
        }
        match this.queue.front() {
            Some(Slot::Done(_)) => Poll::Ready(()),
            _ => Poll::Pending,
        }
    }
}
