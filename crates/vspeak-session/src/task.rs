//! The background task: a single-threaded
//! cooperative message loop owned by an engine. Every socket operation in
//! this design runs here, never on a host media/request thread.
//!
//! The loop lives on a dedicated OS thread running a single-threaded tokio
//! runtime ("maps naturally to a task loop or a
//! single-threaded async executor with explicit yield points"). Messages
//! are plain data sent over an unbounded channel; a handler re-posts
//! "next-tick" work (`RecvPoll`, `RecvResult`) to the same channel instead
//! of looping synchronously, which is what lets one engine's task
//! interleave work across many open sessions without any one of them
//! hogging the thread.

use std::thread;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use vspeak_core::ChannelId;

/// Tagged message variants. `Req` is the resource's own
/// request type (`SynthRequest`/`RecogRequest`) so `RequestDispatch` can
/// carry it without this module depending on either resource.
#[derive(Debug, Clone)]
pub enum TaskMessage<Req> {
    OpenChannel,
    CloseChannel,
    RequestDispatch(Req),
    SpeakStart(Req),
    RecvPoll,
    SendAudioBatch,
    StreamAudioChunk(Vec<u8>),
    RecvResult,
}

/// A message plus the channel it targets — every `TaskMessage` carries the
/// target session reference; here that reference is the [`ChannelId`] the
/// engine's session map is keyed by.
#[derive(Debug, Clone)]
pub struct Envelope<Req> {
    pub channel: ChannelId,
    pub message: TaskMessage<Req>,
}

/// Implemented once per resource (synth, recog) to process one envelope at
/// a time. `resubmit` is how a handler posts a follow-up message to
/// itself (`RecvPoll` re-posting, batched audio kicking off `RecvResult`,
/// etc.) without blocking the loop on a synchronous recursive call.
pub trait TaskHandler<Req>: Send {
    fn handle(&mut self, envelope: Envelope<Req>, resubmit: &TaskSender<Req>);
}

/// Cloneable handle for posting messages into a running [`Task`], held by
/// both the engine (to post `OpenChannel`/`RequestDispatch`/...) and the
/// handler itself (to post self-ticks).
#[derive(Clone)]
pub struct TaskSender<Req> {
    inner: UnboundedSender<Envelope<Req>>,
}

impl<Req> TaskSender<Req> {
    /// Build a sender around a bare channel half, bypassing [`Task::spawn`].
    /// Used by `vspeak-session`'s own unit tests, which exercise a
    /// session's `request`/`stream_read` methods without running a real
    /// background task loop.
    #[cfg(test)]
    pub(crate) fn from_raw_for_tests(inner: UnboundedSender<Envelope<Req>>) -> Self {
        Self { inner }
    }

    /// Enqueue an envelope. The queue is unbounded in principle; an
    /// implementation MAY apply back-pressure by dropping idempotent
    /// self-posts instead of bounding the channel outright, which is what
    /// callers that want that policy should do before calling `post`.
    pub fn post(&self, channel: ChannelId, message: TaskMessage<Req>) {
        // A closed receiver only happens after the engine has shut the
        // task down; posting to a dead task is a no-op rather than a
        // panic; the relevant session is being torn down anyway.
        let _ = self.inner.send(Envelope { channel, message });
    }
}

/// An engine's background task: one OS thread, one single-threaded
/// runtime, one FIFO queue, running until the engine drops its
/// [`TaskSender`]s and the thread's last sender goes away.
pub struct Task<Req> {
    sender: TaskSender<Req>,
    join: Option<thread::JoinHandle<()>>,
}

impl<Req: Send + 'static> Task<Req> {
    /// Start the loop with `handler` as the sole consumer of messages.
    pub fn spawn<H>(mut handler: H) -> Self
    where
        H: TaskHandler<Req> + 'static,
    {
        let (tx, rx): (UnboundedSender<Envelope<Req>>, UnboundedReceiver<Envelope<Req>>) = mpsc::unbounded_channel();
        let sender = TaskSender { inner: tx };
        let loop_sender = sender.clone();

        let join = thread::Builder::new()
            .name("vspeak-bg-task".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to start background task runtime");
                rt.block_on(run_loop(rx, &mut handler, &loop_sender));
            })
            .expect("failed to spawn background task thread");

        Self { sender, join: Some(join) }
    }

    #[must_use]
    pub fn sender(&self) -> TaskSender<Req> {
        self.sender.clone()
    }

    /// Post a message without waiting for it to be processed — every
    /// public synth/recog operation that touches the task is non-blocking.
    pub fn post(&self, channel: ChannelId, message: TaskMessage<Req>) {
        self.sender.post(channel, message);
    }
}

impl<Req> Drop for Task<Req> {
    fn drop(&mut self) {
        // Dropping `self.sender` closes the channel once this was the last
        // clone held outside the loop thread itself; the loop drains
        // whatever is already queued, then exits and the thread joins.
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

async fn run_loop<Req, H>(mut rx: UnboundedReceiver<Envelope<Req>>, handler: &mut H, _self_sender: &TaskSender<Req>)
where
    H: TaskHandler<Req>,
{
    while let Some(envelope) = rx.recv().await {
        handler.handle(envelope, _self_sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        Open,
        Poll(u32),
    }

    struct RecordingHandler {
        log: Arc<Mutex<Vec<Seen>>>,
        poll_count: u32,
    }

    impl TaskHandler<()> for RecordingHandler {
        fn handle(&mut self, envelope: Envelope<()>, resubmit: &TaskSender<()>) {
            match envelope.message {
                TaskMessage::OpenChannel => self.log.lock().unwrap().push(Seen::Open),
                TaskMessage::RecvPoll => {
                    self.poll_count += 1;
                    self.log.lock().unwrap().push(Seen::Poll(self.poll_count));
                    if self.poll_count < 3 {
                        resubmit.post(envelope.channel, TaskMessage::RecvPoll);
                    }
                }
                _ => {}
            }
        }
    }

    #[test]
    fn messages_are_processed_in_fifo_order_and_self_posts_work() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = RecordingHandler { log: log.clone(), poll_count: 0 };
        let task = Task::spawn(handler);

        let chan = ChannelId(1);
        task.post(chan, TaskMessage::OpenChannel);
        task.post(chan, TaskMessage::RecvPoll);

        // Give the loop thread a chance to drain — re-posts happen
        // in-thread so three polls will have landed well within this.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let seen = log.lock().unwrap().clone();
        assert_eq!(seen[0], Seen::Open);
        assert_eq!(seen.last(), Some(&Seen::Poll(3)));
    }
}
