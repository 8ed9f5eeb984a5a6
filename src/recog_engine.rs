//! The recognizer engine (`EngineHost` capability set): mirrors
//! [`crate::synth_engine::SynthEngine`] but additionally owns a detector
//! factory, since each [`RecogSession`] needs its own
//! [`ActivityDetector`](vspeak_core::ActivityDetector) instance.

use std::net::TcpStream;
use std::sync::Arc;

use vspeak_core::{ActivityDetector, ChannelHost, ChannelId, RecogRequest};
use vspeak_ws::WsClient;

use vspeak_session::task::{Envelope, Task, TaskHandler, TaskMessage, TaskSender};
use vspeak_session::RecogSession;

use crate::detector::EnergyDetector;
use crate::engine::ChannelIdAllocator;
use crate::params::EngineParams;
use crate::registry::ChannelRegistry;

type Session<H, D> = RecogSession<H, D, TcpStream>;

struct RecogTaskHandler<H: ChannelHost + 'static, D: ActivityDetector + 'static> {
    channels: Arc<ChannelRegistry<Session<H, D>>>,
}

impl<H: ChannelHost + 'static, D: ActivityDetector + 'static> TaskHandler<RecogRequest> for RecogTaskHandler<H, D> {
    fn handle(&mut self, envelope: Envelope<RecogRequest>, resubmit: &TaskSender<RecogRequest>) {
        let Some(session) = self.channels.get(envelope.channel) else {
            return;
        };
        match envelope.message {
            TaskMessage::OpenChannel => session.task_open_channel(),
            TaskMessage::CloseChannel => session.task_close_channel(),
            TaskMessage::RequestDispatch(RecogRequest::Recognize {
                start_input_timers,
                no_input_timeout_ms,
                speech_complete_timeout_ms,
            }) => session.task_recognize(start_input_timers, no_input_timeout_ms, speech_complete_timeout_ms),
            TaskMessage::RequestDispatch(_) => {}
            TaskMessage::SendAudioBatch => session.task_send_audio_batch(),
            TaskMessage::StreamAudioChunk(chunk) => session.task_stream_audio_chunk(chunk),
            TaskMessage::RecvResult => session.task_recv_result(),
            // The recognizer never posts these; they're synthesizer-only
            // variants of the shared `TaskMessage` enum.
            TaskMessage::SpeakStart(_) | TaskMessage::RecvPoll => {
                let _ = resubmit;
            }
        }
    }
}

/// One running recognizer engine instance, generic over the detector type
/// so a deployment can plug in a neural VAD; defaults to the crate's
/// energy-based [`EnergyDetector`].
pub struct RecogEngine<H: ChannelHost + 'static, D: ActivityDetector + 'static = EnergyDetector> {
    task: Task<RecogRequest>,
    channels: Arc<ChannelRegistry<Session<H, D>>>,
    ids: ChannelIdAllocator,
    detector_factory: Box<dyn Fn() -> D + Send + Sync>,
}

impl<H: ChannelHost + 'static, D: ActivityDetector + 'static> RecogEngine<H, D> {
    /// Build an engine with a caller-supplied detector factory — one fresh
    /// detector instance per channel (each session exclusively owns its own
    /// detector).
    pub fn with_detector_factory<F>(factory: F) -> Self
    where
        F: Fn() -> D + Send + Sync + 'static,
    {
        let channels: Arc<ChannelRegistry<Session<H, D>>> = Arc::new(ChannelRegistry::new());
        let task = Task::spawn(RecogTaskHandler { channels: channels.clone() });
        Self {
            task,
            channels,
            ids: ChannelIdAllocator::new(),
            detector_factory: Box::new(factory),
        }
    }

    /// `create_channel(engine, pool)`.
    pub fn create_channel(&self, host: Arc<H>, params: &EngineParams) -> Arc<Session<H, D>> {
        let channel = self.ids.next();
        let ws = WsClient::new(params.ws.clone());
        let detector = (self.detector_factory)();
        let session = Arc::new(RecogSession::new(
            channel,
            host,
            ws,
            detector,
            params.audio.capacity,
            params.streaming,
            self.task.sender(),
        ));
        self.channels.insert(channel, session.clone());
        session
    }

    pub fn destroy_channel(&self, channel: ChannelId) {
        self.channels.remove(channel);
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl<H: ChannelHost + 'static> RecogEngine<H, EnergyDetector> {
    /// Default engine using [`EnergyDetector::default`] per channel.
    #[must_use]
    pub fn new() -> Self {
        Self::with_detector_factory(EnergyDetector::default)
    }
}

impl<H: ChannelHost + 'static> Default for RecogEngine<H, EnergyDetector> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::time::Duration;

    use vspeak_core::{CodecDescriptor, CompletionCause, HostMessage};

    #[derive(Default)]
    struct RecordingHost {
        messages: Mutex<Vec<HostMessage>>,
    }

    impl ChannelHost for RecordingHost {
        fn open_respond(&self, _ok: bool) {}
        fn close_respond(&self) {}
        fn message_send(&self, msg: HostMessage) {
            self.messages.lock().unwrap().push(msg);
        }
    }

    /// A minimal loopback ASR server: accepts a connection, answers the
    /// handshake, waits for one BIN frame, then replies with a fixed NLSML
    /// TEXT result.
    fn spawn_echo_asr_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
            }
            stream
                .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n")
                .unwrap();

            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);

            let result = vspeak_ws::frame::encode(&vspeak_ws::Frame::text(
                b"<result><interpretation><input>hello</input></interpretation></result>".to_vec(),
            ));
            stream.write_all(&result).unwrap();
        });
        port
    }

    #[test]
    fn create_channel_registers_and_destroy_removes() {
        let engine: RecogEngine<RecordingHost> = RecogEngine::new();
        let host = Arc::new(RecordingHost::default());
        let params = EngineParams::recog_defaults();
        let session = engine.create_channel(host, &params);
        assert_eq!(engine.channel_count(), 1);
        engine.destroy_channel(session.channel());
        assert_eq!(engine.channel_count(), 0);
    }

    #[test]
    fn recognize_batch_happy_path_completes_with_nlsml_body() {
        let port = spawn_echo_asr_server();
        let engine: RecogEngine<RecordingHost, EnergyDetector> =
            RecogEngine::with_detector_factory(|| EnergyDetector::new(500.0, Duration::from_millis(50)));
        let host = Arc::new(RecordingHost::default());
        let mut params = EngineParams::recog_defaults();
        params.ws.host = "127.0.0.1".into();
        params.ws.port = port;

        let session = engine.create_channel(host.clone(), &params);
        session.open();
        std::thread::sleep(Duration::from_millis(50));

        session.request(
            vspeak_core::RecogRequest::Recognize {
                start_input_timers: true,
                no_input_timeout_ms: None,
                speech_complete_timeout_ms: None,
            },
            Some(CodecDescriptor::pcm_8k()),
        );
        std::thread::sleep(Duration::from_millis(100));

        // One loud frame to trigger Activity, then silence spaced out in
        // real time so the detector's min-silence window actually elapses.
        session.stream_write(&vec![0x7Fu8, 0x10u8].repeat(160));
        for _ in 0..6 {
            session.stream_write(&[0u8; 320]);
            std::thread::sleep(Duration::from_millis(20));
        }

        std::thread::sleep(Duration::from_millis(300));

        let messages = host.messages.lock().unwrap();
        assert!(messages.iter().any(|m| matches!(m, HostMessage::StartOfInput)));
        assert!(messages.iter().any(|m| matches!(
            m,
            HostMessage::RecognitionComplete { cause: CompletionCause::Normal, body: Some(b), .. } if b.contains("hello")
        )));
    }
}
