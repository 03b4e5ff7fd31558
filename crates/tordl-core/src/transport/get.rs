//! Streaming GET and small-page fetch.

use std::cell::{Cell, RefCell};

use super::parse::{HeaderCollector, ResponseHead};
use super::{new_easy, TransportOptions};
use crate::control::CancelToken;
use crate::retry::TransportError;
use crate::session::WorkerSession;

/// Whether the transfer should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFlow {
    Continue,
    Stop,
}

/// Receives a streamed response.
pub trait BodyHandler {
    /// Called exactly once with the final response head, before any body byte
    /// (or after the transfer when the body is empty).
    fn on_head(&mut self, head: &ResponseHead) -> BodyFlow;

    /// Called with body bytes in arrival order, in whatever sizes curl delivers.
    fn on_data(&mut self, data: &[u8]) -> BodyFlow;
}

/// How a streamed GET ended when curl itself did not fail.
#[derive(Debug, Clone)]
pub struct GetOutcome {
    pub head: ResponseHead,
    /// True if the handler stopped the transfer early.
    pub stopped: bool,
}

/// GET `url` (optionally with a curl `range` like `1024-`), following redirects.
///
/// The cancel token is polled by curl's progress callback, so a stalled
/// transfer is aborted promptly; the error then reports
/// `is_aborted_by_callback`, and the caller decides how to surface it.
pub fn stream_get(
    session: &WorkerSession,
    url: &str,
    range: Option<&str>,
    opts: &TransportOptions,
    cancel: &CancelToken,
    handler: &mut dyn BodyHandler,
) -> Result<GetOutcome, TransportError> {
    let collector = RefCell::new(HeaderCollector::new());
    let head_sent = Cell::new(false);
    let stopped = Cell::new(false);
    let handler = RefCell::new(handler);

    let mut easy = new_easy(session, url, opts)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    if let Some(r) = range {
        easy.range(r)?;
    }
    easy.progress(true)?;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            collector.borrow_mut().push_line(data);
            true
        })?;
        transfer.write_function(|data| {
            let mut h = handler.borrow_mut();
            if !head_sent.get() {
                head_sent.set(true);
                if h.on_head(collector.borrow().head()) == BodyFlow::Stop {
                    stopped.set(true);
                    return Ok(0);
                }
            }
            match h.on_data(data) {
                BodyFlow::Continue => Ok(data.len()),
                BodyFlow::Stop => {
                    stopped.set(true);
                    // Short count makes curl abort with a write error.
                    Ok(0)
                }
            }
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.perform()
    };

    let mut head = collector.into_inner().into_head();
    if head.status == 0 {
        head.status = easy.response_code().unwrap_or(0);
    }

    match perform_result {
        Ok(()) => {
            if !head_sent.get() && handler.into_inner().on_head(&head) == BodyFlow::Stop {
                stopped.set(true);
            }
            Ok(GetOutcome {
                head,
                stopped: stopped.get(),
            })
        }
        Err(e) if e.is_write_error() && stopped.get() => Ok(GetOutcome {
            head,
            stopped: true,
        }),
        Err(e) => Err(TransportError::Curl(e)),
    }
}

/// Largest page `fetch_text` will buffer.
const MAX_TEXT_BYTES: usize = 16 * 1024 * 1024;

/// GET a page and return its body as text. Non-2xx is an error.
pub fn fetch_text(
    session: &WorkerSession,
    url: &str,
    opts: &TransportOptions,
) -> Result<String, TransportError> {
    let mut body: Vec<u8> = Vec::new();

    let mut easy = new_easy(session, url, opts)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if body.len() + data.len() > MAX_TEXT_BYTES {
                return Ok(0);
            }
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransportError::Http(code));
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
