//! Recognizer session state machine.
//!
//! `Idle → Listening → (Recognising | Cancelling) → Idle`. `Listening`
//! begins at `RECOGNIZE`; `Recognising` starts once the detector reports
//! `Activity`. As with the synthesizer, host-facing methods
//! (`open`/`close`/`request`/`stream_write`) never suspend; socket work
//! happens only in the `task_*` methods the engine's background task
//! calls.

use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use vspeak_core::{ActivityDetector, ChannelHost, ChannelId, CodecDescriptor, CompletionCause, DetectorEvent, HostMessage, RecogRequest};
use vspeak_ws::client::ConnectableFresh;
use vspeak_ws::transport::WsTransport;
use vspeak_ws::{Opcode, WsClient};

use crate::buffer::AudioBuffer;
use crate::task::{TaskMessage, TaskSender};

/// Wall-clock budget for a single `RECOGNIZE`.
const MAX_RECOGNIZE_DURATION: Duration = Duration::from_secs(60);

/// 200 ms of audio at 8 kHz, 16-bit mono.
pub const STREAM_CHUNK_SIZE: usize = 3200;

/// Baseline no-input timeout absent a `No-Input-Timeout` header.
const DEFAULT_NO_INPUT_TIMEOUT_MS: u32 = 5_000;

struct RecogState {
    recog_active: bool,
    stop_pending: bool,
    timers_started: bool,
    speech_started: bool,
    waiting_result: bool,
    stream_pos: u64,
    recog_start: Instant,
    no_input_timeout_ms: u32,
}

impl Default for RecogState {
    fn default() -> Self {
        Self {
            recog_active: false,
            stop_pending: false,
            timers_started: false,
            speech_started: false,
            waiting_result: false,
            stream_pos: 0,
            recog_start: Instant::now(),
            no_input_timeout_ms: DEFAULT_NO_INPUT_TIMEOUT_MS,
        }
    }
}

/// One recognizer channel's session state (`RecogSession`).
pub struct RecogSession<H: ChannelHost, D: ActivityDetector, T: WsTransport = TcpStream> {
    channel: ChannelId,
    host: Arc<H>,
    ws: Mutex<WsClient<T>>,
    audio: AudioBuffer,
    detector: Mutex<D>,
    state: Mutex<RecogState>,
    task: TaskSender<RecogRequest>,
    /// `streaming` engine parameter: chunked streaming vs batch.
    streaming_enabled: bool,
}

impl<H: ChannelHost, D: ActivityDetector, T: WsTransport> RecogSession<H, D, T> {
    pub fn new(
        channel: ChannelId,
        host: Arc<H>,
        ws: WsClient<T>,
        detector: D,
        audio_capacity: usize,
        streaming_enabled: bool,
        task: TaskSender<RecogRequest>,
    ) -> Self {
        Self {
            channel,
            host,
            ws: Mutex::new(ws),
            audio: AudioBuffer::new(audio_capacity),
            detector: Mutex::new(detector),
            state: Mutex::new(RecogState::default()),
            task,
            streaming_enabled,
        }
    }

    #[must_use]
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    // ---- host-facing, non-blocking ----------------------------------

    pub fn open(&self) {
        self.task.post(self.channel, TaskMessage::OpenChannel);
    }

    pub fn close(&self) {
        self.task.post(self.channel, TaskMessage::CloseChannel);
    }

    /// `request(msg)`. `codec` mirrors the synthesizer's contract: the host
    /// resolves the sink-stream codec descriptor and hands it in at
    /// `RECOGNIZE` time; `None` is rejected with `MethodFailed` before
    /// anything else happens (require a non-null sink-stream codec
    /// descriptor; reject with `MethodFailed` otherwise).
    pub fn request(&self, msg: RecogRequest, codec: Option<CodecDescriptor>) {
        match msg {
            recognize @ RecogRequest::Recognize { .. } => {
                if codec.is_none() {
                    self.host.message_send(HostMessage::MethodFailed {
                        reason: "no sink-stream codec descriptor".into(),
                    });
                    return;
                }
                // ensure_connected() may block on a reconnect; the rest of
                // this dispatch runs entirely on the background task (host
                // request threads must not suspend).
                self.task.post(self.channel, TaskMessage::RequestDispatch(recognize));
            }
            RecogRequest::Stop => {
                // No immediate response — flushed by the next stream_write.
                self.state.lock().unwrap().stop_pending = true;
            }
            RecogRequest::StartInputTimers => {
                let no_input_ms = self.state.lock().unwrap().no_input_timeout_ms;
                self.state.lock().unwrap().timers_started = true;
                self.detector.lock().unwrap().start_input_timers(no_input_ms);
                self.host.message_send(HostMessage::Complete);
            }
            RecogRequest::SetParams | RecogRequest::GetParams | RecogRequest::DefineGrammar => {
                // The recognizer ignores grammar content — the external
                // ASR is considered ambient.
                self.host.message_send(HostMessage::Complete);
            }
        }
    }

    /// `stream_write(frame_in)`: MUST NOT block. Called by the host's audio
    /// sink-stream write callback once per inbound audio frame.
    pub fn stream_write(&self, frame_in: &[u8]) {
        if self.flush_stop_if_pending() {
            return;
        }

        let active = self.state.lock().unwrap().recog_active;
        if !active || !self.ws.lock().unwrap().is_connected() {
            return;
        }

        let event = self.detector.lock().unwrap().process_frame(frame_in);
        self.audio.write(frame_in);

        match event {
            Some(DetectorEvent::Activity) => {
                let already_started = {
                    let mut st = self.state.lock().unwrap();
                    let was = st.speech_started;
                    st.speech_started = true;
                    was
                };
                if !already_started {
                    self.host.message_send(HostMessage::StartOfInput);
                }
            }
            Some(DetectorEvent::Inactivity) => {
                let stream_pos = self.state.lock().unwrap().stream_pos as usize;
                if self.audio.len_from(stream_pos) > 0 {
                    self.task.post(self.channel, TaskMessage::SendAudioBatch);
                } else {
                    self.finish_recognition(CompletionCause::Normal, None, None);
                }
            }
            Some(DetectorEvent::NoInput) => {
                if self.state.lock().unwrap().timers_started {
                    self.finish_recognition(CompletionCause::NoInputTimeout, None, None);
                }
            }
            None => {}
        }

        if self.streaming_enabled {
            let speech_started = self.state.lock().unwrap().speech_started;
            if speech_started {
                loop {
                    let stream_pos = self.state.lock().unwrap().stream_pos as usize;
                    if self.audio.len_from(stream_pos) < STREAM_CHUNK_SIZE {
                        break;
                    }
                    let chunk = self.audio.slice_len(stream_pos, STREAM_CHUNK_SIZE);
                    self.task.post(self.channel, TaskMessage::StreamAudioChunk(chunk));
                    self.state.lock().unwrap().stream_pos += STREAM_CHUNK_SIZE as u64;
                }
            }
        }
    }

    fn flush_stop_if_pending(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if !st.stop_pending {
            return false;
        }
        st.stop_pending = false;
        st.recog_active = false;
        st.waiting_result = false;
        st.speech_started = false;
        st.stream_pos = 0;
        drop(st);
        self.audio.clear();
        self.detector.lock().unwrap().reset();
        self.host.message_send(HostMessage::Complete);
        true
    }

    /// Emits `RECOGNITION-COMPLETE` exactly once per accepted `RECOGNIZE`.
    fn finish_recognition(&self, cause: CompletionCause, body: Option<String>, content_type: Option<&'static str>) {
        {
            let mut st = self.state.lock().unwrap();
            if !st.recog_active {
                return;
            }
            st.recog_active = false;
            st.waiting_result = false;
            st.speech_started = false;
        }
        self.host.message_send(HostMessage::RecognitionComplete { cause, body, content_type });
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

    pub fn task_send_audio_batch(&self) {
        let stream_pos = self.state.lock().unwrap().stream_pos as usize;
        let tail = self.audio.slice_from(stream_pos);
        let connected = self.ws.lock().unwrap().is_connected();

        if !tail.is_empty() {
            if connected {
                let sent = self.ws.lock().unwrap().send_binary(tail);
                if matches!(sent, Ok(true)) {
                    self.state.lock().unwrap().waiting_result = true;
                    self.task.post(self.channel, TaskMessage::RecvResult);
                } else {
                    self.finish_recognition(CompletionCause::Error, None, None);
                }
            } else {
                self.finish_recognition(CompletionCause::Error, None, None);
            }
        }

        self.audio.clear();
        self.state.lock().unwrap().stream_pos = 0;
    }

    pub fn task_stream_audio_chunk(&self, chunk: Vec<u8>) {
        if self.ws.lock().unwrap().is_connected() {
            // Do not wait for a result here — the final Inactivity signal
            // drives `SendAudioBatch`/`RecvResult`.
            let _ = self.ws.lock().unwrap().send_binary(chunk);
        }
    }

    pub fn task_recv_result(&self) {
        {
            let st = self.state.lock().unwrap();
            if !st.waiting_result || !st.recog_active {
                return;
            }
            if st.recog_start.elapsed() > MAX_RECOGNIZE_DURATION {
                drop(st);
                self.finish_recognition(CompletionCause::Error, None, None);
                return;
            }
        }

        match self.ws.lock().unwrap().receive_frame() {
            Ok(Some(frame)) => match frame.opcode {
                Opcode::Text if !frame.payload.is_empty() => {
                    let body = String::from_utf8_lossy(&frame.payload).into_owned();
                    self.finish_recognition(CompletionCause::Normal, Some(body), Some("application/x-nlsml"));
                    return;
                }
                Opcode::Close => {
                    self.finish_recognition(CompletionCause::Error, None, None);
                    return;
                }
                _ => {}
            },
            Ok(None) => {}
            Err(_) => {
                self.finish_recognition(CompletionCause::Error, None, None);
                return;
            }
        }

        self.task.post(self.channel, TaskMessage::RecvResult);
    }
}

impl<H: ChannelHost, D: ActivityDetector, T: WsTransport + ConnectableFresh> RecogSession<H, D, T> {
    pub fn task_recognize(
        &self,
        start_input_timers: bool,
        no_input_timeout_ms: Option<u32>,
        speech_complete_timeout_ms: Option<u32>,
    ) {
        let no_input_ms = no_input_timeout_ms.unwrap_or(DEFAULT_NO_INPUT_TIMEOUT_MS);
        {
            let mut detector = self.detector.lock().unwrap();
            detector.reset();
            if let Some(ms) = speech_complete_timeout_ms {
                detector.set_speech_complete_timeout(ms);
            }
            if start_input_timers {
                detector.start_input_timers(no_input_ms);
            }
        }

        let connected = self.ws.lock().unwrap().ensure_connected();
        if !matches!(connected, Ok(true)) {
            self.host.message_send(HostMessage::MethodFailed {
                reason: "websocket unavailable".into(),
            });
            return;
        }

        self.audio.clear();
        {
            let mut st = self.state.lock().unwrap();
            st.recog_active = true;
            st.stop_pending = false;
            st.timers_started = start_input_timers;
            st.speech_started = false;
            st.waiting_result = false;
            st.stream_pos = 0;
            st.recog_start = Instant::now();
            st.no_input_timeout_ms = no_input_ms;
        }
        self.host.message_send(HostMessage::RecognizeInProgress);
    }
}
