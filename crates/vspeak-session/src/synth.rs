//! Synthesizer session state machine (§4.4).
//!
//! `Idle → Speaking → (Completing | Cancelling) → Idle`, with `Paused` a
//! sub-state of `Speaking` that suppresses drain but leaves the buffer
//! filling. The host-facing methods (`open`, `close`, `request`,
//! `stream_read`) are the only ones a media/request thread may call, and
//! none of them may suspend; everything that touches the socket runs
//! in the `task_*` methods, invoked only from the engine's background
//! task.

use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use vspeak_core::{ChannelHost, ChannelId, CodecDescriptor, CompletionCause, HostMessage, SynthRequest};
use vspeak_ws::client::ConnectableFresh;
use vspeak_ws::{Opcode, WsClient};
use vspeak_ws::transport::WsTransport;

use crate::buffer::AudioBuffer;
use crate::task::{TaskMessage, TaskSender};
use crate::wire::TtsRequest;

/// Wall-clock budget for a single `SPEAK` (§5).
const MAX_SPEAK_DURATION: Duration = Duration::from_secs(300);

/// Consecutive empty `receive_frame` polls before giving up: "≈ 5 s
/// of quiet" at the default 100 ms `recv_poll_timeout`.
const MAX_IDLE_POLLS: u32 = 50;

struct SynthState {
    speak_active: bool,
    stop_pending: bool,
    paused: bool,
    receiving: bool,
    codec: CodecDescriptor,
    speak_start: Instant,
    idle_polls: u32,
}

impl Default for SynthState {
    fn default() -> Self {
        Self {
            speak_active: false,
            stop_pending: false,
            paused: false,
            receiving: false,
            codec: CodecDescriptor::pcm_8k(),
            speak_start: Instant::now(),
            idle_polls: 0,
        }
    }
}

/// One synthesizer channel's session state (`SynthSession`). Generic
/// over the transport so tests can drive it with
/// [`vspeak_ws::transport::mock::MockTransport`] instead of a real TCP
/// socket.
pub struct SynthSession<H: ChannelHost, T: WsTransport = TcpStream> {
    channel: ChannelId,
    host: Arc<H>,
    ws: Mutex<WsClient<T>>,
    audio: AudioBuffer,
    state: Mutex<SynthState>,
    task: TaskSender<SynthRequest>,
}

impl<H: ChannelHost, T: WsTransport> SynthSession<H, T> {
    pub fn new(channel: ChannelId, host: Arc<H>, ws: WsClient<T>, audio_capacity: usize, task: TaskSender<SynthRequest>) -> Self {
        Self {
            channel,
            host,
            ws: Mutex::new(ws),
            audio: AudioBuffer::new(audio_capacity),
            state: Mutex::new(SynthState::default()),
            task,
        }
    }

    #[must_use]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    // ---- host-facing, non-blocking ----------------------------------

    /// `open()`: signals `OpenChannel` to the background task.
    pub fn open(&self) {
        self.task.post(self.channel, TaskMessage::OpenChannel);
    }

    /// `close()`: signals `CloseChannel` to the background task.
    pub fn close(&self) {
        self.task.post(self.channel, TaskMessage::CloseChannel);
    }

    /// `request(msg)`. `codec` is the source-stream codec
    /// descriptor the host hands over at `SPEAK` time — out of
    /// scope collaborators live outside this crate, so the caller (the
    /// plugin adapter) resolves it and passes it in rather than this
    /// session reaching back into the host for it.
    pub fn request(&self, msg: SynthRequest, codec: CodecDescriptor) {
        match msg {
            SynthRequest::SetParams { .. } | SynthRequest::GetParams => {
                // §9 Open Question: values are logged for introspection
                // only; they do not flow into the next SPEAK, whose
                // envelope is built from headers on that request itself.
                self.host.message_send(HostMessage::Complete);
            }
            SynthRequest::Pause => {
                self.state.lock().unwrap().paused = true;
                self.host.message_send(HostMessage::Complete);
            }
            SynthRequest::Resume => {
                self.state.lock().unwrap().paused = false;
                self.host.message_send(HostMessage::Complete);
            }
            SynthRequest::Stop | SynthRequest::BargeIn => {
                // No immediate response — flushed by the next stream_read.
                self.state.lock().unwrap().stop_pending = true;
            }
            speak @ SynthRequest::Speak { .. } => {
                {
                    let mut st = self.state.lock().unwrap();
                    st.codec = codec;
                    st.receiving = true;
                    st.speak_active = true;
                    st.paused = false;
                    st.stop_pending = false;
                    st.speak_start = Instant::now();
                    st.idle_polls = 0;
                }
                self.audio.clear();
                self.host.message_send(HostMessage::SpeakInProgress);
                self.task.post(self.channel, TaskMessage::SpeakStart(speak));
            }
        }
    }

    /// `stream_read(frame_out)`: MUST NOT block. Called by the
    /// host's audio source-stream read callback once per audio frame.
    #[must_use]
    pub fn stream_read(&self, frame_size: usize) -> Vec<u8> {
        if self.flush_stop_if_pending() {
            return vec![0u8; frame_size];
        }

        let (speak_active, paused) = {
            let st = self.state.lock().unwrap();
            (st.speak_active, st.paused)
        };
        if !speak_active || paused {
            return vec![0u8; frame_size];
        }

        let available = self.audio.available();
        let complete = self.audio.is_complete();

        if available >= frame_size {
            let (_, data) = self.audio.read(frame_size);
            return data;
        }

        if complete && available == 0 {
            self.finish_speak(CompletionCause::Normal);
            return vec![0u8; frame_size];
        }

        if complete && available > 0 {
            let (_, mut data) = self.audio.read(available);
            data.resize(frame_size, 0);
            return data;
        }

        // Underrun: still speaking, not enough buffered yet. Wait in
        // silence rather than consuming a partial, premature chunk.
        vec![0u8; frame_size]
    }

    fn flush_stop_if_pending(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if !st.stop_pending {
            return false;
        }
        st.stop_pending = false;
        st.speak_active = false;
        st.receiving = false;
        st.paused = false;
        drop(st);
        self.audio.clear();
        self.host.message_send(HostMessage::Complete);
        true
    }

    /// Emits `SPEAK-COMPLETE` exactly once: a no-op if the request was
    /// already finished (by a STOP flush, a task-side failure, or a prior
    /// call racing on another thread).
    fn finish_speak(&self, cause: CompletionCause) {
        {
            let mut st = self.state.lock().unwrap();
            if !st.speak_active {
                return;
            }
            st.speak_active = false;
            st.receiving = false;
        }
        self.host.message_send(HostMessage::SpeakComplete { cause });
    }

    // ---- background-task-facing --------------------------------------
    //
    // Crate-public rather than crate-private: the engine adapter (outside
    // this crate) owns the `TaskHandler` impl that routes queued messages
    // to these methods, since it's the one holding the channel registry.

    pub fn task_open_channel(&self) {
        self.host.open_respond(true);
    }

    pub fn task_close_channel(&self) {
        self.ws.lock().unwrap().disconnect(true);
        self.host.close_respond();
    }
}

impl<H: ChannelHost, T: WsTransport + ConnectableFresh> SynthSession<H, T> {
    pub fn task_speak_start(&self, req: SynthRequest, resubmit: &TaskSender<SynthRequest>) {
        let SynthRequest::Speak { text, voice, speed, pitch, volume, session_id } = req else {
            return;
        };

        let connected = self.ws.lock().unwrap().ensure_connected();
        if !matches!(connected, Ok(true)) {
            self.finish_speak(CompletionCause::Error);
            return;
        }

        let sample_rate = self.state.lock().unwrap().codec.sample_rate;
        let sid = session_id.unwrap_or_default();
        let envelope = TtsRequest::new(&text, sample_rate, &sid)
        .with_voice(voice.as_deref())
        .with_speed(speed)
        .with_pitch(pitch)
        .with_volume(volume)
        .to_json();

        let sent = self.ws.lock().unwrap().send_text(envelope.into_bytes());
        if matches!(sent, Ok(true)) {
            resubmit.post(self.channel, TaskMessage::RecvPoll);
        } else {
            self.finish_speak(CompletionCause::Error);
        }
    }

    pub fn task_recv_poll(&self, resubmit: &TaskSender<SynthRequest>) {
        {
            let st = self.state.lock().unwrap();
            if st.stop_pending || !st.receiving {
                return;
            }
            if st.speak_start.elapsed() > MAX_SPEAK_DURATION {
                drop(st);
                self.audio.mark_complete();
                self.state.lock().unwrap().receiving = false;
                return;
            }
        }

        match self.ws.lock().unwrap().receive_frame() {
            Ok(Some(frame)) => {
                match frame.opcode {
                    Opcode::Binary | Opcode::Continuation => {
                        self.audio.write(&frame.payload);
                        self.state.lock().unwrap().idle_polls = 0;
                    }
                    Opcode::Text if frame.text_marks_complete() => {
                        self.audio.mark_complete();
                        self.state.lock().unwrap().receiving = false;
                        return;
                    }
                    Opcode::Close => {
                        self.audio.mark_complete();
                        self.state.lock().unwrap().receiving = false;
                        return;
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                let idle_polls = {
                    let mut st = self.state.lock().unwrap();
                    st.idle_polls += 1;
                    st.idle_polls
                };
                if idle_polls > MAX_IDLE_POLLS {
                    if self.audio.has_received_any() {
                        self.audio.mark_complete();
                    } else {
                        self.finish_speak(CompletionCause::Error);
                    }
                    self.state.lock().unwrap().receiving = false;
                    return;
                }
            }
            Err(_) => {
                self.finish_speak(CompletionCause::Error);
                self.state.lock().unwrap().receiving = false;
                return;
            }
        }

        resubmit.post(self.channel, TaskMessage::RecvPoll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use vspeak_core::WsConfig;
    use vspeak_ws::transport::mock::MockTransport;

    #[derive(Default)]
    struct RecordingHost {
        messages: StdMutex<Vec<HostMessage>>,
        open_ok: StdMutex<Vec<bool>>,
    }

    impl ChannelHost for RecordingHost {
        fn open_respond(&self, ok: bool) {
            self.open_ok.lock().unwrap().push(ok);
        }
        fn close_respond(&self) {}
        fn message_send(&self, msg: HostMessage) {
            self.messages.lock().unwrap().push(msg);
        }
    }

    fn session_with_server() -> (SynthSession<RecordingHost, MockTransport>, MockTransport, Arc<RecordingHost>) {
        let (client_side, mut server_side) = MockTransport::pair();
        // Seed the handshake response before the client reads it — the mock
        // transport is a plain queue, so writing it up front is equivalent
        // to a peer that answers instantly.
        server_side
        .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n")
        .unwrap();
        let ws = WsClient::from_transport(WsConfig::default(), client_side).unwrap();
        let host = Arc::new(RecordingHost::default());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let task = TaskSender::from_raw_for_tests(tx);
        let session = SynthSession::new(ChannelId(1), host.clone(), ws, 64 * 1024, task);
        (session, server_side, host)
    }

    #[test]
    fn speak_emits_in_progress_and_resets_buffer() {
        let (session, _server, host) = session_with_server();
        session.request(
            SynthRequest::Speak {
                text: "hi".into(),
                voice: None,
                speed: None,
                pitch: None,
                volume: None,
                session_id: Some("sid".into()),
            },
            CodecDescriptor::pcm_8k(),
        );
        assert!(matches!(host.messages.lock().unwrap()[0], HostMessage::SpeakInProgress));
    }

    #[test]
    fn stream_read_underrun_returns_silence_without_consuming() {
        let (session, _server, _host) = session_with_server();
        session.state.lock().unwrap().speak_active = true;
        let out = session.stream_read(320);
        assert_eq!(out, vec![0u8; 320]);
        assert_eq!(session.audio.available(), 0);
    }

    #[test]
    fn stream_read_drains_full_frames_then_completes() {
        let (session, _server, host) = session_with_server();
        session.state.lock().unwrap().speak_active = true;
        session.audio.write(&[1u8; 320]);
        session.audio.write(&[2u8; 320]);
        session.audio.mark_complete();

        let first = session.stream_read(320);
        assert_eq!(first, vec![1u8; 320]);
        let second = session.stream_read(320);
        assert_eq!(second, vec![2u8; 320]);

        // available == 0 && complete -> SPEAK-COMPLETE(Normal), silence frame
        let third = session.stream_read(320);
        assert_eq!(third, vec![0u8; 320]);
        let messages = host.messages.lock().unwrap();
        assert!(matches!(
                messages.last(),
                Some(HostMessage::SpeakComplete { cause: CompletionCause::Normal })
        ));
    }

    #[test]
    fn stream_read_pads_partial_tail_frame() {
        let (session, _server, _host) = session_with_server();
        session.state.lock().unwrap().speak_active = true;
        session.audio.write(&[7u8; 100]);
        session.audio.mark_complete();

        let frame = session.stream_read(320);
        assert_eq!(&frame[..100], &[7u8; 100]);
        assert_eq!(&frame[100..], &vec![0u8; 220][..]);
    }

    #[test]
    fn stop_flushes_response_and_clears_buffer_without_complete_event() {
        let (session, _server, host) = session_with_server();
        session.state.lock().unwrap().speak_active = true;
        session.audio.write(&[9u8; 2000]);
        session.request(SynthRequest::Stop, CodecDescriptor::pcm_8k());

        let frame = session.stream_read(320);
        assert_eq!(frame, vec![0u8; 320]);
        assert_eq!(session.audio.available(), 0);
        assert!(host
            .messages
            .lock()
            .unwrap()
            .iter()
            .all(|m| !matches!(m, HostMessage::SpeakComplete { .. })));
    }

    #[test]
    fn pause_suppresses_drain_but_keeps_buffer_filling() {
        let (session, _server, _host) = session_with_server();
        session.state.lock().unwrap().speak_active = true;
        session.request(SynthRequest::Pause, CodecDescriptor::pcm_8k());
        session.audio.write(&[1u8; 320]);

        let frame = session.stream_read(320);
        assert_eq!(frame, vec![0u8; 320]);
        assert_eq!(session.audio.available(), 320);
    }
}
